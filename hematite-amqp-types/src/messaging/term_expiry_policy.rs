use crate::error::Error;
use crate::primitives::Symbol;
use crate::value::Value;

/// When the expiry timer of a terminus starts counting down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminusExpiryPolicy {
    /// The expiry timer starts when the terminus is detached.
    LinkDetach,

    /// The expiry timer starts when the most recently associated session
    /// is ended.
    #[default]
    SessionEnd,

    /// The expiry timer starts when most recently associated connection
    /// is closed.
    ConnectionClose,

    /// The terminus never expires.
    Never,
}

impl From<TerminusExpiryPolicy> for Symbol {
    fn from(val: TerminusExpiryPolicy) -> Self {
        let s = match val {
            TerminusExpiryPolicy::LinkDetach => "link-detach",
            TerminusExpiryPolicy::SessionEnd => "session-end",
            TerminusExpiryPolicy::ConnectionClose => "connection-close",
            TerminusExpiryPolicy::Never => "never",
        };
        Symbol::from(s)
    }
}

impl From<TerminusExpiryPolicy> for Value {
    fn from(val: TerminusExpiryPolicy) -> Self {
        Value::Symbol(val.into())
    }
}

impl TryFrom<Value> for TerminusExpiryPolicy {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let symbol = Symbol::try_from(value)?;
        match symbol.as_str() {
            "link-detach" => Ok(TerminusExpiryPolicy::LinkDetach),
            "session-end" => Ok(TerminusExpiryPolicy::SessionEnd),
            "connection-close" => Ok(TerminusExpiryPolicy::ConnectionClose),
            "never" => Ok(TerminusExpiryPolicy::Never),
            _ => Err(Error::InvalidFieldType("expiry-policy")),
        }
    }
}
