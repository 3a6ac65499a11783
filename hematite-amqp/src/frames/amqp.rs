//! AMQP frame type and the corresponding encoder and decoder.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use hematite_amqp_types::buffer::ByteReader;
use hematite_amqp_types::codec::write_value;
use hematite_amqp_types::composite::composite_value;
use hematite_amqp_types::performatives::Performative;
use hematite_amqp_types::registry::{CompositeValue, Registry};
use hematite_amqp_types::Value;
use tokio_util::codec::{Decoder, Encoder};

use crate::Payload;

use super::{peek_frame_size, Error, FRAME_HEADER_SIZE, FRAME_TYPE_AMQP};

/// An AMQP frame.
#[derive(Debug)]
pub struct Frame {
    /// The channel the frame is sent on.
    pub channel: u16,

    /// The frame body.
    pub body: FrameBody,
}

impl Frame {
    /// Creates a new AMQP frame.
    pub fn new(channel: u16, body: FrameBody) -> Self {
        Self { channel, body }
    }

    /// Creates a frame carrying a performative without payload.
    pub fn performative(channel: u16, performative: Performative) -> Self {
        Self::new(
            channel,
            FrameBody::Performative {
                performative,
                payload: Payload::new(),
            },
        )
    }

    /// Creates an empty frame, used only to reset the remote idle
    /// timeout.
    pub fn empty() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Empty,
        }
    }
}

/// The body of an AMQP frame.
#[derive(Debug)]
pub enum FrameBody {
    /// A performative and, for transfers, the payload bytes that follow
    /// it inside the frame.
    Performative {
        /// The performative.
        performative: Performative,

        /// Payload following the performative; empty for every
        /// performative except transfer.
        payload: Payload,
    },

    /// An empty frame (heartbeat).
    Empty,
}

/// Encoder and decoder of AMQP frames.
#[derive(Debug)]
pub struct FrameCodec {
    registry: Arc<Registry>,
    max_frame_size: usize,
}

impl FrameCodec {
    /// Creates a codec decoding through `registry`, rejecting inbound
    /// frames larger than `max_frame_size`.
    pub fn new(registry: Arc<Registry>, max_frame_size: usize) -> Self {
        Self {
            registry,
            max_frame_size,
        }
    }

    /// Updates the inbound frame size limit after Open negotiation.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        if let FrameBody::Performative {
            performative,
            payload,
        } = item.body
        {
            let value: Value = match performative {
                Performative::Open(p) => composite_value(&p),
                Performative::Begin(p) => composite_value(&p),
                Performative::Attach(p) => composite_value(&p),
                Performative::Flow(p) => composite_value(&p),
                Performative::Transfer(p) => composite_value(&p),
                Performative::Disposition(p) => composite_value(&p),
                Performative::Detach(p) => composite_value(&p),
                Performative::End(p) => composite_value(&p),
                Performative::Close(p) => composite_value(&p),
            };
            write_value(&mut body, &value);
            body.put_slice(&payload);
        }

        dst.reserve(FRAME_HEADER_SIZE + body.len());
        dst.put_u32((FRAME_HEADER_SIZE + body.len()) as u32);
        // AMQP frames carry no extended header, so doff is always 2
        dst.put_u8(2);
        dst.put_u8(FRAME_TYPE_AMQP);
        dst.put_u16(item.channel);
        dst.put_slice(&body);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let size = match peek_frame_size(src) {
            Some(size) => size,
            None => return Ok(None),
        };
        if (size as usize) < FRAME_HEADER_SIZE {
            return Err(Error::FrameSizeTooSmall(size));
        }
        if size as usize > self.max_frame_size {
            return Err(Error::FrameSizeExceeded {
                size,
                max: self.max_frame_size as u32,
            });
        }
        if src.len() < size as usize {
            src.reserve(size as usize - src.len());
            return Ok(None);
        }

        let frame: Bytes = src.split_to(size as usize).freeze();
        let doff = frame[4];
        let ftype = frame[5];
        let channel = u16::from_be_bytes([frame[6], frame[7]]);

        if ftype != FRAME_TYPE_AMQP {
            return Err(Error::NotImplemented(ftype));
        }
        let body_offset = doff as usize * 4;
        if !(FRAME_HEADER_SIZE..=frame.len()).contains(&body_offset) {
            return Err(Error::InvalidDataOffset(doff));
        }

        let body = frame.slice(body_offset..);
        if body.is_empty() {
            return Ok(Some(Frame::new(channel, FrameBody::Empty)));
        }

        let mut reader = ByteReader::new(&body);
        let performative = match self.registry.read_described(&mut reader)? {
            CompositeValue::Performative(performative) => performative,
            _ => return Err(Error::UnexpectedBody),
        };
        let payload = body.slice(reader.position()..);
        Ok(Some(Frame::new(
            channel,
            FrameBody::Performative {
                performative,
                payload,
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use hematite_amqp_types::performatives::Open;

    use super::*;

    fn codec() -> FrameCodec {
        FrameCodec::new(Arc::new(Registry::amqp()), 4096)
    }

    #[test]
    fn empty_frame_round_trips() {
        let mut codec = codec();
        let mut buf = BytesMut::new();
        codec.encode(Frame::empty(), &mut buf).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 8, 2, 0, 0, 0]);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(decoded.body, FrameBody::Empty));
        assert!(buf.is_empty());
    }

    #[test]
    fn open_frame_round_trips() {
        let mut codec = codec();
        let mut buf = BytesMut::new();
        codec
            .encode(
                Frame::performative(0, Performative::Open(Open::new("c1"))),
                &mut buf,
            )
            .unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        match decoded.body {
            FrameBody::Performative {
                performative: Performative::Open(open),
                payload,
            } => {
                assert_eq!(open.container_id, "c1");
                assert!(payload.is_empty());
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn partial_frames_are_withheld() {
        let mut codec = codec();
        let mut buf = BytesMut::new();
        codec
            .encode(
                Frame::performative(0, Performative::Open(Open::new("container-id"))),
                &mut buf,
            )
            .unwrap();

        let full = buf.clone();
        let mut partial = BytesMut::from(&full[..5]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[5..]);
        assert!(codec.decode(&mut partial).unwrap().is_some());
    }

    #[test]
    fn undersized_frame_is_fatal() {
        let mut codec = codec();
        let mut buf = BytesMut::from(&[0u8, 0, 0, 7, 2, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::FrameSizeTooSmall(7))
        ));
    }

    #[test]
    fn oversized_frame_is_fatal() {
        let mut codec = codec();
        let mut buf = BytesMut::from(&[0u8, 0, 0x20, 0, 2, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::FrameSizeExceeded { .. })
        ));
    }
}
