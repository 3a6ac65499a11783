//! Descriptor of a described type

use crate::primitives::Symbol;

/// Descriptor of a described type.
///
/// The specification allows any primitive value as a descriptor but
/// reserves the symbolic and numeric forms for standard types; the codec
/// accepts only those two.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Descriptor {
    /// A symbolic descriptor, e.g. `amqp:open:list`.
    Name(Symbol),

    /// A numeric descriptor: domain-id in the upper 32 bits, descriptor-id
    /// in the lower 32 bits.
    Code(u64),
}

impl Descriptor {
    /// Creates a symbolic descriptor.
    pub fn name(name: impl Into<Symbol>) -> Self {
        Self::Name(name.into())
    }

    /// Creates a numeric descriptor.
    pub fn code(code: u64) -> Self {
        Self::Code(code)
    }
}

impl From<u64> for Descriptor {
    fn from(code: u64) -> Self {
        Self::Code(code)
    }
}

impl From<Symbol> for Descriptor {
    fn from(name: Symbol) -> Self {
        Self::Name(name)
    }
}

impl From<&str> for Descriptor {
    fn from(name: &str) -> Self {
        Self::Name(Symbol::from(name))
    }
}
