//! Types defined in AMQP 1.0 specification Part 2.8: Definitions

use crate::error::Error as CodecError;
use crate::primitives::{Binary, OrderedMap, Symbol};
use crate::value::Value;

/// 2.8.1 Role
mod role;
pub use role::Role;

/// 2.8.2 Sender Settle Mode
mod snd_settle_mode;
pub use snd_settle_mode::SenderSettleMode;

/// 2.8.3 Receiver Settle Mode
mod rcv_settle_mode;
pub use rcv_settle_mode::ReceiverSettleMode;

/// 2.8.4 Handle
///
/// The handle of a link is an unsigned 32-bit integer scoped to the
/// session in which the link was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub u32);

impl Default for Handle {
    fn default() -> Self {
        Handle(u32::MAX)
    }
}

impl From<u32> for Handle {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl From<Handle> for u32 {
    fn from(val: Handle) -> Self {
        val.0
    }
}

impl From<Handle> for Value {
    fn from(val: Handle) -> Self {
        Value::UInt(val.0)
    }
}

impl TryFrom<Value> for Handle {
    type Error = CodecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        u32::try_from(value).map(Handle)
    }
}

/// 2.8.5 Seconds
pub type Seconds = u32;

/// 2.8.6 Milliseconds
pub type Milliseconds = u32;

/// 2.8.7 Delivery Tag
///
/// A delivery-tag can be up to 32 octets of binary data.
pub type DeliveryTag = Binary;

/// 2.8.8 Delivery Number
pub type DeliveryNumber = SequenceNo;

/// 2.8.9 Transfer Number
pub type TransferNumber = SequenceNo;

/// 2.8.10 Sequence No
///
/// RFC-1982 serial number arithmetic applies on the wire; the engine
/// relies on wrapping u32 operations for it.
pub type SequenceNo = u32;

/// 2.8.11 Message Format
pub type MessageFormat = u32;

/// 2.8.12 IETF Language Tag
pub type IetfLanguageTag = Symbol;

/// 2.8.13 Fields
pub type Fields = OrderedMap<Symbol, Value>;

/// 2.8.14 Error
mod error;
pub use error::Error;

mod error_cond;
pub use error_cond::ErrorCondition;

/// 2.8.15 AMQP Error
mod amqp_error;
pub use amqp_error::AmqpError;

/// 2.8.16 Connection Error
mod conn_error;
pub use conn_error::ConnectionError;

/// 2.8.17 Session Error
mod session_error;
pub use session_error::SessionError;

/// 2.8.18 Link Error
mod link_error;
pub use link_error::LinkError;

/// 2.8.19 Constant definition
mod constant_def;
pub use constant_def::{MAJOR, MINOR, MIN_MAX_FRAME_SIZE, PORT, REVISION, SECURE_PORT};
