//! The byte-pipe boundary.
//!
//! Everything above this module works against `AsyncRead + AsyncWrite`,
//! so raw TCP, TLS and WebSocket byte pipes are interchangeable. This
//! module implements the parts of connection establishment that happen
//! before the engine takes over: the protocol header exchange and, when
//! credentials are configured, the SASL dialog.

use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use hematite_amqp_types::registry::Registry;
use hematite_amqp_types::sasl::SaslFrameBody;

use crate::frames::{SaslCodec, SaslFrame};
use crate::sasl_profile::SaslProfile;

mod error;
pub mod protocol_header;

pub use error::NegotiationError;
pub use protocol_header::{ProtocolHeader, ProtocolId};

/// Writes the proposed header and awaits the remote one; a mismatch
/// fails the negotiation.
pub async fn negotiate_header<Io>(
    io: &mut Io,
    proposed: ProtocolHeader,
) -> Result<ProtocolHeader, NegotiationError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    let outbound: [u8; 8] = proposed.into();
    io.write_all(&outbound).await?;

    let mut inbound = [0u8; 8];
    io.read_exact(&mut inbound).await?;
    trace!(?inbound, "protocol header received");

    match ProtocolHeader::try_from(inbound) {
        Ok(header) if header == proposed => Ok(header),
        _ => Err(NegotiationError::ProtocolHeaderMismatch {
            proposed,
            received: inbound,
        }),
    }
}

/// Runs the SASL dialog over `io` with the given profile.
///
/// The SASL protocol header is exchanged first; on a successful outcome
/// the caller proceeds to the AMQP header exchange on the same pipe.
pub async fn negotiate_sasl<Io>(
    io: &mut Io,
    registry: Arc<Registry>,
    profile: &SaslProfile,
    hostname: Option<&str>,
) -> Result<(), NegotiationError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    negotiate_header(io, ProtocolHeader::sasl()).await?;

    let mut codec = SaslCodec::new(registry);
    let mut read_buf = BytesMut::with_capacity(512);
    let mut write_buf = BytesMut::new();

    loop {
        let frame = read_sasl_frame(io, &mut codec, &mut read_buf).await?;
        match frame.body {
            SaslFrameBody::Mechanisms(mechanisms) => {
                let mechanism = profile.mechanism();
                let offered = mechanisms
                    .sasl_server_mechanisms
                    .iter()
                    .any(|m| *m == mechanism);
                if !offered {
                    return Err(NegotiationError::MechanismNotOffered(
                        mechanism.into_inner(),
                    ));
                }
                let init = profile.sasl_init(hostname);
                codec.encode(SaslFrame::from(SaslFrameBody::Init(init)), &mut write_buf)?;
                io.write_all(&write_buf.split()).await?;
            }
            SaslFrameBody::Outcome(outcome) => {
                debug!(code = ?outcome.code, "sasl outcome");
                return match outcome.code as u8 {
                    0 => Ok(()),
                    code => Err(NegotiationError::SaslOutcome {
                        code,
                        additional: outcome
                            .additional_data
                            .map(|data| String::from_utf8_lossy(&data).into_owned()),
                    }),
                };
            }
            // ANONYMOUS and PLAIN are single-round mechanisms
            SaslFrameBody::Challenge(_) => {
                return Err(NegotiationError::MechanismNotOffered(
                    profile.mechanism().into_inner(),
                ))
            }
            SaslFrameBody::Init(_) | SaslFrameBody::Response(_) => {
                return Err(crate::frames::Error::UnexpectedBody.into())
            }
        }
    }
}

async fn read_sasl_frame<Io>(
    io: &mut Io,
    codec: &mut SaslCodec,
    read_buf: &mut BytesMut,
) -> Result<SaslFrame, NegotiationError>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        if let Some(frame) = codec.decode(read_buf)? {
            return Ok(frame);
        }
        if io.read_buf(read_buf).await? == 0 {
            return Err(NegotiationError::TransportClosed);
        }
    }
}

#[cfg(test)]
mod tests {
    use hematite_amqp_types::primitives::{Array, Symbol};
    use hematite_amqp_types::sasl::{SaslCode, SaslMechanisms, SaslOutcome};

    use super::*;

    #[tokio::test]
    async fn header_exchange_succeeds_on_match() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let server_task = tokio::spawn(async move {
            let mut inbound = [0u8; 8];
            server.read_exact(&mut inbound).await.unwrap();
            server.write_all(&inbound).await.unwrap();
        });

        let header = negotiate_header(&mut client, ProtocolHeader::amqp())
            .await
            .unwrap();
        assert_eq!(header, ProtocolHeader::amqp());
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn header_mismatch_fails() {
        let (mut client, mut server) = tokio::io::duplex(64);

        tokio::spawn(async move {
            let mut inbound = [0u8; 8];
            server.read_exact(&mut inbound).await.unwrap();
            server.write_all(b"AMQP\x03\x01\x00\x00").await.unwrap();
        });

        let result = negotiate_header(&mut client, ProtocolHeader::amqp()).await;
        assert!(matches!(
            result,
            Err(NegotiationError::ProtocolHeaderMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn plain_sasl_dialog_succeeds() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let registry = Arc::new(Registry::amqp());
        let server_registry = registry.clone();

        let server_task = tokio::spawn(async move {
            let mut inbound = [0u8; 8];
            server.read_exact(&mut inbound).await.unwrap();
            assert_eq!(&inbound, b"AMQP\x03\x01\x00\x00");
            server.write_all(&inbound).await.unwrap();

            let mut codec = SaslCodec::new(server_registry);
            let mut write_buf = BytesMut::new();
            codec
                .encode(
                    SaslFrame::from(SaslFrameBody::Mechanisms(SaslMechanisms {
                        sasl_server_mechanisms: Array::from(vec![
                            Symbol::from("PLAIN"),
                            Symbol::from("ANONYMOUS"),
                        ]),
                    })),
                    &mut write_buf,
                )
                .unwrap();
            server.write_all(&write_buf.split()).await.unwrap();

            let mut read_buf = BytesMut::new();
            let init = loop {
                if let Some(frame) = codec.decode(&mut read_buf).unwrap() {
                    break frame;
                }
                server.read_buf(&mut read_buf).await.unwrap();
            };
            match init.body {
                SaslFrameBody::Init(init) => {
                    assert_eq!(init.mechanism.as_str(), "PLAIN");
                    assert_eq!(
                        init.initial_response.as_deref(),
                        Some(&b"\x00guest\x00secret"[..])
                    );
                }
                other => panic!("expected init, got {:?}", other),
            }

            codec
                .encode(
                    SaslFrame::from(SaslFrameBody::Outcome(SaslOutcome {
                        code: SaslCode::Ok,
                        additional_data: None,
                    })),
                    &mut write_buf,
                )
                .unwrap();
            server.write_all(&write_buf.split()).await.unwrap();
        });

        let profile = SaslProfile::Plain {
            username: "guest".to_string(),
            password: "secret".to_string(),
        };
        negotiate_sasl(&mut client, registry, &profile, None)
            .await
            .unwrap();
        server_task.await.unwrap();
    }
}
