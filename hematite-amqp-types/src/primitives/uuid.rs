use crate::error::Error;

/// A universally unique identifier as defined by RFC-4122 in section 4.1.2.
///
/// encoding code = 0x98,
/// category = fixed, width = 16
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uuid([u8; 16]);

impl Uuid {
    /// View of the inner bytes.
    pub fn as_inner(&self) -> &[u8; 16] {
        &self.0
    }

    /// Consumes the wrapper into the inner bytes.
    pub fn into_inner(self) -> [u8; 16] {
        self.0
    }
}

impl From<[u8; 16]> for Uuid {
    fn from(val: [u8; 16]) -> Self {
        Self(val)
    }
}

impl From<uuid::Uuid> for Uuid {
    fn from(val: uuid::Uuid) -> Self {
        Self(val.into_bytes())
    }
}

impl From<Uuid> for uuid::Uuid {
    fn from(val: Uuid) -> Self {
        uuid::Uuid::from_bytes(val.0)
    }
}

impl TryFrom<&[u8]> for Uuid {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 16] = value.try_into().map_err(|_| Error::InvalidLength)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_and_from_the_uuid_crate() {
        let generated = uuid::Uuid::new_v4();
        let wrapped = Uuid::from(generated);
        assert_eq!(uuid::Uuid::from(wrapped), generated);
        assert_eq!(wrapped.as_inner(), generated.as_bytes());
    }

    #[test]
    fn rejects_slices_of_the_wrong_length() {
        assert_eq!(Uuid::try_from(&[0u8; 15][..]), Err(Error::InvalidLength));
    }
}
