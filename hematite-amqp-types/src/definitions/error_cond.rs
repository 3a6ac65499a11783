use std::fmt::Display;

use crate::error::Error as CodecError;
use crate::primitives::Symbol;
use crate::value::Value;

use super::{AmqpError, ConnectionError, LinkError, SessionError};

/// Archetype for error condition symbols.
///
/// Conditions outside the four standard families round-trip untouched
/// through the `Custom` variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCondition {
    /// Shared error conditions
    AmqpError(AmqpError),

    /// Connection-scoped error conditions
    ConnectionError(ConnectionError),

    /// Session-scoped error conditions
    SessionError(SessionError),

    /// Link-scoped error conditions
    LinkError(LinkError),

    /// Any other condition symbol
    Custom(Symbol),
}

impl Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Symbol::from(self))
    }
}

impl From<&ErrorCondition> for Symbol {
    fn from(value: &ErrorCondition) -> Self {
        match value {
            ErrorCondition::AmqpError(err) => Symbol::from(err),
            ErrorCondition::ConnectionError(err) => Symbol::from(err),
            ErrorCondition::SessionError(err) => Symbol::from(err),
            ErrorCondition::LinkError(err) => Symbol::from(err),
            ErrorCondition::Custom(symbol) => symbol.clone(),
        }
    }
}

impl From<Symbol> for ErrorCondition {
    fn from(symbol: Symbol) -> Self {
        let s = symbol.as_str();
        if let Ok(err) = AmqpError::try_from(s) {
            return ErrorCondition::AmqpError(err);
        }
        if let Ok(err) = ConnectionError::try_from(s) {
            return ErrorCondition::ConnectionError(err);
        }
        if let Ok(err) = SessionError::try_from(s) {
            return ErrorCondition::SessionError(err);
        }
        if let Ok(err) = LinkError::try_from(s) {
            return ErrorCondition::LinkError(err);
        }
        ErrorCondition::Custom(symbol)
    }
}

impl From<ErrorCondition> for Value {
    fn from(val: ErrorCondition) -> Self {
        Value::Symbol(Symbol::from(&val))
    }
}

impl TryFrom<Value> for ErrorCondition {
    type Error = CodecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Symbol::try_from(value).map(ErrorCondition::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_conditions_round_trip() {
        for s in [
            "amqp:internal-error",
            "amqp:not-found",
            "amqp:decode-error",
            "amqp:resource-limit-exceeded",
            "amqp:connection:framing-error",
            "amqp:session:window-violation",
            "amqp:link:transfer-limit-exceeded",
        ] {
            let cond = ErrorCondition::from(Symbol::from(s));
            assert!(!matches!(cond, ErrorCondition::Custom(_)), "{s}");
            assert_eq!(Symbol::from(&cond).as_str(), s);
        }
    }

    #[test]
    fn unknown_condition_is_custom() {
        let cond = ErrorCondition::from(Symbol::from("vendor:oops"));
        assert_eq!(cond, ErrorCondition::Custom(Symbol::from("vendor:oops")));
    }
}
