use crate::error::Error;
use crate::primitives::Symbol;
use crate::value::Value;

/// Link distribution policy of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionMode {
    /// Once successfully transferred over the link, the message will no
    /// longer be available to other links from the same node.
    Move,

    /// Once successfully transferred over the link, the message is still
    /// available for other links from the same node.
    Copy,
}

impl From<DistributionMode> for Symbol {
    fn from(val: DistributionMode) -> Self {
        let s = match val {
            DistributionMode::Move => "move",
            DistributionMode::Copy => "copy",
        };
        Symbol::from(s)
    }
}

impl From<DistributionMode> for Value {
    fn from(val: DistributionMode) -> Self {
        Value::Symbol(val.into())
    }
}

impl TryFrom<Value> for DistributionMode {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let symbol = Symbol::try_from(value)?;
        match symbol.as_str() {
            "move" => Ok(DistributionMode::Move),
            "copy" => Ok(DistributionMode::Copy),
            _ => Err(Error::InvalidFieldType("distribution-mode")),
        }
    }
}
