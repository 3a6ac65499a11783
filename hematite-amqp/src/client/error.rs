//! Client-facing error taxonomy.

use std::sync::Arc;

use hematite_amqp_types::definitions;
use hematite_amqp_types::messaging::DeliveryState;

use crate::engine::EngineError;
use crate::transport::NegotiationError;

/// Errors surfaced through the client API.
///
/// Engine-side failures never unwind across the driver boundary; they
/// are converted here and delivered through per-operation futures, the
/// endpoint close path, or both.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Transport I/O failure.
    #[error("transport error: {0}")]
    Io(Arc<std::io::Error>),

    /// Header exchange or SASL dialog failed.
    #[error("negotiation failed: {0}")]
    Negotiation(Arc<NegotiationError>),

    /// The protocol engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The peer closed the connection, possibly with an error.
    #[error("connection closed by remote peer")]
    RemoteClosed {
        /// Error the peer attached to its Close.
        error: Option<definitions::Error>,
    },

    /// The operation is not valid in the endpoint's current state, or
    /// the endpoint is already closed.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A blocking operation ran past its timeout. The underlying
    /// protocol action is not cancelled.
    #[error("operation timed out: {0}")]
    OperationTimedOut(&'static str),

    /// A close with a timeout elapsed and the endpoint was shut down
    /// locally instead.
    #[error("resource closed forcibly: {0}")]
    ResourceClosed(&'static str),

    /// The link was detached while operations were outstanding.
    #[error("link detached")]
    LinkDetached {
        /// True for a closing detach.
        closed: bool,
        /// Error the peer attached to its Detach.
        error: Option<definitions::Error>,
    },

    /// The sender aborted an in-flight streamed delivery.
    #[error("delivery aborted by the sender")]
    DeliveryAborted,

    /// The peer refused the link attach (null terminus plus detach).
    #[error("link attach refused by remote peer")]
    LinkRefused {
        /// Error the peer attached to its Detach.
        error: Option<definitions::Error>,
    },

    /// `await_accepted` observed a terminal outcome other than accepted.
    #[error("delivery reached a non-accepted outcome")]
    DeliveryState {
        /// The outcome the peer reported.
        state: Option<DeliveryState>,
    },
}

impl ClientError {
    pub(crate) fn illegal_state(description: impl Into<String>) -> Self {
        ClientError::IllegalState(description.into())
    }

    pub(crate) fn from_io(error: std::io::Error) -> Self {
        ClientError::Io(Arc::new(error))
    }

    pub(crate) fn dropped() -> Self {
        ClientError::illegal_state("connection driver terminated")
    }
}

impl From<std::io::Error> for ClientError {
    fn from(error: std::io::Error) -> Self {
        ClientError::from_io(error)
    }
}

impl From<NegotiationError> for ClientError {
    fn from(error: NegotiationError) -> Self {
        ClientError::Negotiation(Arc::new(error))
    }
}
