use crate::error::Error;
use crate::value::Value;

/// Settlement policy of a receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReceiverSettleMode {
    /// The receiver will spontaneously settle all incoming transfers.
    #[default]
    First = 0,

    /// The receiver will only settle after sending the disposition to
    /// the sender and receiving a disposition indicating settlement of
    /// the delivery from the sender.
    Second = 1,
}

impl From<ReceiverSettleMode> for Value {
    fn from(val: ReceiverSettleMode) -> Self {
        Value::UByte(val as u8)
    }
}

impl TryFrom<Value> for ReceiverSettleMode {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match u8::try_from(value)? {
            0 => Ok(ReceiverSettleMode::First),
            1 => Ok(ReceiverSettleMode::Second),
            _ => Err(Error::InvalidFieldType("rcv-settle-mode")),
        }
    }
}
