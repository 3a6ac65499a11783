use hematite_amqp_types::definitions::{
    self, AmqpError, ErrorCondition, SessionError,
};

/// Fatal engine error.
///
/// Any of these fails the whole connection: the engine transitions to
/// its failed state, emits a Close with the mapped condition when the
/// handshake allows it, and the driver fails every pending operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// A value failed to decode.
    #[error(transparent)]
    Codec(#[from] hematite_amqp_types::Error),

    /// A frame failed to decode or violated the size limits.
    #[error(transparent)]
    Framing(#[from] crate::frames::Error),

    /// The peer violated the protocol state machine.
    #[error("{condition}: {description}")]
    Protocol {
        /// Condition reported on the outgoing Close
        condition: ErrorCondition,
        /// Human readable description
        description: String,
    },

    /// The peer closed the connection with an error.
    #[error("remote closed connection: {0}")]
    RemoteClosed(definitions::Error),

    /// No traffic arrived within twice the advertised idle timeout.
    #[error("idle timeout elapsed without inbound traffic")]
    IdleTimeout,

    /// The transport reported failure or EOF.
    #[error("transport failed")]
    TransportFailed,
}

impl EngineError {
    pub(crate) fn illegal_state(description: impl Into<String>) -> Self {
        EngineError::Protocol {
            condition: AmqpError::IllegalState.into(),
            description: description.into(),
        }
    }

    pub(crate) fn not_found(description: impl Into<String>) -> Self {
        EngineError::Protocol {
            condition: AmqpError::NotFound.into(),
            description: description.into(),
        }
    }

    pub(crate) fn unattached_handle() -> Self {
        EngineError::Protocol {
            condition: SessionError::UnattachedHandle.into(),
            description: "frame references a handle with no attached link".to_string(),
        }
    }

    pub(crate) fn window_violation() -> Self {
        EngineError::Protocol {
            condition: SessionError::WindowViolation.into(),
            description: "transfer received outside the incoming window".to_string(),
        }
    }

    pub(crate) fn invalid_field(description: impl Into<String>) -> Self {
        EngineError::Protocol {
            condition: AmqpError::InvalidField.into(),
            description: description.into(),
        }
    }

    /// The condition carried on the Close frame this error produces.
    pub fn condition(&self) -> ErrorCondition {
        match self {
            EngineError::Codec(_) => AmqpError::DecodeError.into(),
            EngineError::Framing(err) => err.condition(),
            EngineError::Protocol { condition, .. } => condition.clone(),
            EngineError::RemoteClosed(err) => err.condition.clone(),
            EngineError::IdleTimeout => AmqpError::ResourceLimitExceeded.into(),
            EngineError::TransportFailed => AmqpError::InternalError.into(),
        }
    }

    /// The error description carried on the Close frame.
    pub fn description(&self) -> Option<String> {
        match self {
            EngineError::Protocol { description, .. } => Some(description.clone()),
            EngineError::IdleTimeout => {
                Some("no frame received within twice the idle timeout".to_string())
            }
            other => Some(other.to_string()),
        }
    }
}
