use crate::error::Error;
use crate::value::Value;

/// Link endpoint role.
///
/// Encoded as a boolean: false for the sender, true for the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The link endpoint sends messages.
    Sender,

    /// The link endpoint receives messages.
    Receiver,
}

impl Role {
    /// The opposite role, as carried by the peer's frames.
    pub fn peer(&self) -> Self {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }
}

impl From<Role> for bool {
    fn from(val: Role) -> Self {
        matches!(val, Role::Receiver)
    }
}

impl From<bool> for Role {
    fn from(val: bool) -> Self {
        if val {
            Role::Receiver
        } else {
            Role::Sender
        }
    }
}

impl From<Role> for Value {
    fn from(val: Role) -> Self {
        Value::Bool(val.into())
    }
}

impl TryFrom<Value> for Role {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        bool::try_from(value).map(Role::from)
    }
}
