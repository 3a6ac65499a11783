use crate::error::Error;
use crate::value::Value;

/// Durability policy for a terminus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminusDurability {
    /// No terminus state is retained durably.
    #[default]
    None = 0,

    /// Only the existence and configuration of the terminus is retained durably.
    Configuration = 1,

    /// In addition to the existence and configuration of the terminus, the
    /// unsettled state for durable messages is retained durably.
    UnsettledState = 2,
}

impl From<TerminusDurability> for Value {
    fn from(val: TerminusDurability) -> Self {
        Value::UInt(val as u32)
    }
}

impl TryFrom<Value> for TerminusDurability {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match u32::try_from(value)? {
            0 => Ok(TerminusDurability::None),
            1 => Ok(TerminusDurability::Configuration),
            2 => Ok(TerminusDurability::UnsettledState),
            _ => Err(Error::InvalidFieldType("durable")),
        }
    }
}
