//! Generic described type

use crate::descriptor::Descriptor;

/// A (descriptor, value) pair.
///
/// Known described types decode into their concrete structs through the
/// registry; this generic form is what unknown descriptors decode to and
/// what ad-hoc described values encode from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Described<T> {
    /// The descriptor identifying the type of the value.
    pub descriptor: Descriptor,

    /// The described value itself.
    pub value: T,
}

impl<T> Described<T> {
    /// Creates a new described value.
    pub fn new(descriptor: impl Into<Descriptor>, value: T) -> Self {
        Self {
            descriptor: descriptor.into(),
            value,
        }
    }
}
