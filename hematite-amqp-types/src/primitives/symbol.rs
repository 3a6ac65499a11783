/// Symbolic values from a constrained domain.
///
/// Symbols are restricted to 7-bit ASCII on the wire; the wrapper keeps a
/// `String` and the codec enforces the restriction at encode/decode time.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub String);

impl Symbol {
    /// Creates a new symbol.
    pub fn new(val: impl Into<String>) -> Self {
        Self(val.into())
    }

    /// Consumes the wrapper into the inner String.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// View of the symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0[..]
    }

    /// Whether every byte is within the 7-bit ASCII range.
    pub fn is_ascii(&self) -> bool {
        self.0.as_bytes().iter().all(u8::is_ascii)
    }
}

impl From<String> for Symbol {
    fn from(val: String) -> Self {
        Self(val)
    }
}

impl From<&str> for Symbol {
    fn from(val: &str) -> Self {
        Self(val.into())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
