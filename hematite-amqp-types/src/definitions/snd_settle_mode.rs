use crate::error::Error;
use crate::value::Value;

/// Settlement policy of a sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SenderSettleMode {
    /// The sender will send all deliveries initially unsettled to the receiver.
    Unsettled = 0,

    /// The sender will send all deliveries settled to the receiver.
    Settled = 1,

    /// The sender MAY send a mixture of settled and unsettled deliveries.
    #[default]
    Mixed = 2,
}

impl From<SenderSettleMode> for Value {
    fn from(val: SenderSettleMode) -> Self {
        Value::UByte(val as u8)
    }
}

impl TryFrom<Value> for SenderSettleMode {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match u8::try_from(value)? {
            0 => Ok(SenderSettleMode::Unsettled),
            1 => Ok(SenderSettleMode::Settled),
            2 => Ok(SenderSettleMode::Mixed),
            _ => Err(Error::InvalidFieldType("snd-settle-mode")),
        }
    }
}
