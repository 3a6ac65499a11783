//! Primitive types that need a newtype to be distinguishable on the wire

mod array;
mod decimal;
mod map;
mod symbol;
mod timestamp;
mod uuid;

pub use self::uuid::Uuid;
pub use array::Array;
pub use decimal::{Dec128, Dec32, Dec64};
pub use map::OrderedMap;
pub use symbol::Symbol;
pub use timestamp::Timestamp;

/// Alias for the AMQP binary type.
///
/// `Bytes` already gives the retain/release and zero-copy slice
/// semantics the codec needs.
pub type Binary = bytes::Bytes;

/// 8-bit unsigned integer
pub type UByte = u8;

/// 16-bit unsigned integer
pub type UShort = u16;

/// 32-bit unsigned integer
pub type UInt = u32;

/// 64-bit unsigned integer
pub type ULong = u64;
