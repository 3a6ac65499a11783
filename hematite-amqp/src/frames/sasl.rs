//! SASL frame type and the corresponding encoder and decoder.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use hematite_amqp_types::buffer::ByteReader;
use hematite_amqp_types::codec::write_value;
use hematite_amqp_types::composite::composite_value;
use hematite_amqp_types::registry::{CompositeValue, Registry};
use hematite_amqp_types::sasl::SaslFrameBody;
use hematite_amqp_types::Value;
use tokio_util::codec::{Decoder, Encoder};

use super::{peek_frame_size, Error, FRAME_HEADER_SIZE, FRAME_TYPE_SASL};

/// A SASL frame. SASL frames are only ever sent on channel 0.
#[derive(Debug)]
pub struct SaslFrame {
    /// The frame body.
    pub body: SaslFrameBody,
}

impl SaslFrame {
    /// Creates a new SASL frame.
    pub fn new(body: impl Into<SaslFrameBody>) -> Self {
        Self { body: body.into() }
    }
}

impl From<SaslFrameBody> for SaslFrame {
    fn from(body: SaslFrameBody) -> Self {
        Self { body }
    }
}

/// Encoder and decoder of SASL frames.
#[derive(Debug)]
pub struct SaslCodec {
    registry: Arc<Registry>,
}

impl SaslCodec {
    /// Creates a codec decoding through `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Encoder<SaslFrame> for SaslCodec {
    type Error = Error;

    fn encode(&mut self, item: SaslFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let value: Value = match item.body {
            SaslFrameBody::Mechanisms(b) => composite_value(&b),
            SaslFrameBody::Init(b) => composite_value(&b),
            SaslFrameBody::Challenge(b) => composite_value(&b),
            SaslFrameBody::Response(b) => composite_value(&b),
            SaslFrameBody::Outcome(b) => composite_value(&b),
        };
        let mut body = BytesMut::new();
        write_value(&mut body, &value);

        dst.reserve(FRAME_HEADER_SIZE + body.len());
        dst.put_u32((FRAME_HEADER_SIZE + body.len()) as u32);
        dst.put_u8(2);
        dst.put_u8(FRAME_TYPE_SASL);
        dst.put_u16(0);
        dst.put_slice(&body);
        Ok(())
    }
}

impl Decoder for SaslCodec {
    type Item = SaslFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let size = match peek_frame_size(src) {
            Some(size) => size,
            None => return Ok(None),
        };
        if (size as usize) < FRAME_HEADER_SIZE {
            return Err(Error::FrameSizeTooSmall(size));
        }
        if src.len() < size as usize {
            src.reserve(size as usize - src.len());
            return Ok(None);
        }

        let frame: Bytes = src.split_to(size as usize).freeze();
        let doff = frame[4];
        let ftype = frame[5];
        let channel = u16::from_be_bytes([frame[6], frame[7]]);

        if ftype != FRAME_TYPE_SASL {
            return Err(Error::NotImplemented(ftype));
        }
        if channel != 0 {
            return Err(Error::InvalidChannel);
        }
        let body_offset = doff as usize * 4;
        if !(FRAME_HEADER_SIZE..=frame.len()).contains(&body_offset) {
            return Err(Error::InvalidDataOffset(doff));
        }

        let body = frame.slice(body_offset..);
        let mut reader = ByteReader::new(&body);
        match self.registry.read_described(&mut reader)? {
            CompositeValue::Sasl(body) => Ok(Some(SaslFrame { body })),
            _ => Err(Error::UnexpectedBody),
        }
    }
}

#[cfg(test)]
mod tests {
    use hematite_amqp_types::primitives::Symbol;
    use hematite_amqp_types::sasl::{SaslCode, SaslInit, SaslOutcome};

    use super::*;

    #[test]
    fn init_frame_round_trips() {
        let mut codec = SaslCodec::new(Arc::new(Registry::amqp()));
        let mut buf = BytesMut::new();
        codec
            .encode(
                SaslFrame::from(SaslFrameBody::Init(SaslInit {
                    mechanism: Symbol::from("PLAIN"),
                    initial_response: Some(Bytes::from_static(b"\x00user\x00pass")),
                    hostname: None,
                })),
                &mut buf,
            )
            .unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        match decoded.body {
            SaslFrameBody::Init(init) => {
                assert_eq!(init.mechanism.as_str(), "PLAIN");
                assert_eq!(
                    init.initial_response,
                    Some(Bytes::from_static(b"\x00user\x00pass"))
                );
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn outcome_frame_round_trips() {
        let mut codec = SaslCodec::new(Arc::new(Registry::amqp()));
        let mut buf = BytesMut::new();
        codec
            .encode(
                SaslFrame::from(SaslFrameBody::Outcome(SaslOutcome {
                    code: SaslCode::Ok,
                    additional_data: None,
                })),
                &mut buf,
            )
            .unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(
            decoded.body,
            SaslFrameBody::Outcome(SaslOutcome {
                code: SaslCode::Ok,
                ..
            })
        ));
    }
}
