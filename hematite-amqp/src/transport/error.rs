use super::protocol_header::ProtocolHeader;

/// Error during connection negotiation (header exchange or SASL).
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    /// Transport failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The remote header does not match the proposed one.
    #[error("protocol header mismatch, proposed {proposed:?}, received {received:?}")]
    ProtocolHeaderMismatch {
        /// Header this peer proposed
        proposed: ProtocolHeader,
        /// Header the remote answered with
        received: [u8; 8],
    },

    /// The requested SASL mechanism is not offered by the peer.
    #[error("sasl mechanism \"{0}\" is not offered by the peer")]
    MechanismNotOffered(String),

    /// The SASL dialog ended with a non-ok outcome code.
    #[error("sasl outcome code {code}: {additional:?}")]
    SaslOutcome {
        /// Numeric outcome code from the peer
        code: u8,
        /// Additional data the peer attached to the outcome
        additional: Option<String>,
    },

    /// A frame-level error before the connection was up.
    #[error(transparent)]
    Frames(#[from] crate::frames::Error),

    /// The remote closed the transport mid-negotiation.
    #[error("transport closed during negotiation")]
    TransportClosed,
}
