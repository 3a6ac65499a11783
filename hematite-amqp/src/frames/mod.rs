//! Frame encoders and decoders.
//!
//! Frame layout:
//!
//! ```text
//! [size:u32][doff:u8][type:u8][channel:u16][extended header][body]
//! ```
//!
//! The decoder buffers until the declared size is available, so partial
//! reads never produce partial frames. A size below 8 or above the
//! negotiated max-frame-size is fatal to the connection.

mod amqp;
mod error;
mod sasl;

pub use amqp::{Frame, FrameBody, FrameCodec};
pub use error::Error;
pub use sasl::{SaslCodec, SaslFrame};

/// Type byte of an AMQP frame.
pub const FRAME_TYPE_AMQP: u8 = 0x00;

/// Type byte of a SASL frame.
pub const FRAME_TYPE_SASL: u8 = 0x01;

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

pub(crate) fn peek_frame_size(src: &bytes::BytesMut) -> Option<u32> {
    if src.len() < 4 {
        return None;
    }
    Some(u32::from_be_bytes([src[0], src[1], src[2], src[3]]))
}
