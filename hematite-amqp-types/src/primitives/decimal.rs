//! Decimal types are transported as opaque IEEE 754-2008 BID payloads.
//! The crate does not do decimal arithmetic; the wrappers preserve the
//! exact wire bytes.

/// 32-bit decimal number (IEEE 754-2008 decimal32).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec32([u8; 4]);

/// 64-bit decimal number (IEEE 754-2008 decimal64).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec64([u8; 8]);

/// 128-bit decimal number (IEEE 754-2008 decimal128).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec128([u8; 16]);

macro_rules! impl_decimal {
    ($name:ident, $width:literal) => {
        impl $name {
            /// View of the raw BID bytes.
            pub fn as_inner(&self) -> &[u8; $width] {
                &self.0
            }

            /// Consumes the wrapper into the raw BID bytes.
            pub fn into_inner(self) -> [u8; $width] {
                self.0
            }
        }

        impl From<[u8; $width]> for $name {
            fn from(val: [u8; $width]) -> Self {
                Self(val)
            }
        }
    };
}

impl_decimal!(Dec32, 4);
impl_decimal!(Dec64, 8);
impl_decimal!(Dec128, 16);
