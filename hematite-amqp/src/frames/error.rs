use hematite_amqp_types::definitions::{AmqpError, ConnectionError, ErrorCondition};

/// Frame encode/decode error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Frame size field below the 8-byte frame header size.
    #[error("frame size {0} is smaller than the frame header")]
    FrameSizeTooSmall(u32),

    /// Frame size field above the negotiated max-frame-size.
    #[error("frame size {size} exceeds the max frame size {max}")]
    FrameSizeExceeded {
        /// Declared frame size
        size: u32,
        /// Negotiated limit
        max: u32,
    },

    /// A data offset that would place the body outside the frame.
    #[error("invalid data offset {0}")]
    InvalidDataOffset(u8),

    /// Frame type byte that is neither AMQP nor SASL.
    #[error("frame type 0x{0:02x} is not implemented")]
    NotImplemented(u8),

    /// A SASL frame on a channel other than 0.
    #[error("sasl frames are restricted to channel 0")]
    InvalidChannel,

    /// The frame body failed to decode.
    #[error(transparent)]
    Codec(#[from] hematite_amqp_types::Error),

    /// The frame body was not the kind of described type the frame type
    /// allows.
    #[error("unexpected frame body")]
    UnexpectedBody,

    /// Underlying I/O error surfaced through the codec traits.
    #[error(transparent)]
    Io(std::sync::Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(std::sync::Arc::new(err))
    }
}

impl Error {
    /// The wire condition this error maps onto.
    pub fn condition(&self) -> ErrorCondition {
        match self {
            Error::FrameSizeTooSmall(_) => AmqpError::FrameSizeTooSmall.into(),
            Error::FrameSizeExceeded { .. } => ConnectionError::FramingError.into(),
            Error::InvalidDataOffset(_) => ConnectionError::FramingError.into(),
            Error::NotImplemented(_) => AmqpError::NotImplemented.into(),
            Error::InvalidChannel => ConnectionError::FramingError.into(),
            Error::Codec(_) => AmqpError::DecodeError.into(),
            Error::UnexpectedBody => AmqpError::DecodeError.into(),
            Error::Io(_) => AmqpError::InternalError.into(),
        }
    }
}
