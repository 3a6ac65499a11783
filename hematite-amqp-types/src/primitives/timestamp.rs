/// An absolute point in time.
///
/// encoding name = "ms64", code = 0x83,
/// category = fixed, width = 8
/// label = "64-bit two's-complement integer representing milliseconds since the unix epoch"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a new [`Timestamp`] from milliseconds since the unix epoch.
    pub fn from_milliseconds(milliseconds: i64) -> Self {
        Self(milliseconds)
    }

    /// The timestamp value as milliseconds since the unix epoch.
    pub fn milliseconds(&self) -> i64 {
        self.0
    }

    /// Consumes the wrapper into the inner i64.
    pub fn into_inner(self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(val: i64) -> Self {
        Self(val)
    }
}

impl From<Timestamp> for i64 {
    fn from(val: Timestamp) -> Self {
        val.0
    }
}
