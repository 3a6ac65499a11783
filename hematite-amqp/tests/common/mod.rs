//! A scripted AMQP peer speaking raw frames over an in-process duplex
//! pipe.

use std::sync::Arc;

use bytes::BytesMut;
use hematite_amqp::frames::{Frame, FrameBody, FrameCodec};
use hematite_amqp::Payload;
use hematite_amqp_types::definitions::{DeliveryNumber, Handle, Role};
use hematite_amqp_types::messaging::{Accepted, DeliveryState, Source, Target};
use hematite_amqp_types::performatives::{
    Attach, Begin, ChannelMax, Disposition, Flow, MaxFrameSize, Open, Performative,
};
use hematite_amqp_types::registry::Registry;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Decoder, Encoder};

pub struct MockPeer {
    io: DuplexStream,
    codec: FrameCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl MockPeer {
    pub fn new(io: DuplexStream) -> Self {
        Self {
            io,
            codec: FrameCodec::new(Arc::new(Registry::amqp()), 1024 * 1024),
            read_buf: BytesMut::new(),
            write_buf: BytesMut::new(),
        }
    }

    /// Reads the client's AMQP header and echoes it back.
    pub async fn exchange_header(&mut self) {
        let mut header = [0u8; 8];
        self.io.read_exact(&mut header).await.unwrap();
        assert_eq!(&header, b"AMQP\x00\x01\x00\x00");
        self.io.write_all(&header).await.unwrap();
    }

    pub async fn send(&mut self, frame: Frame) {
        self.codec.encode(frame, &mut self.write_buf).unwrap();
        self.io.write_all_buf(&mut self.write_buf).await.unwrap();
    }

    pub async fn send_performative(&mut self, channel: u16, performative: Performative) {
        self.send(Frame::performative(channel, performative)).await;
    }

    pub async fn read_frame(&mut self) -> Frame {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buf).unwrap() {
                return frame;
            }
            let n = self.io.read_buf(&mut self.read_buf).await.unwrap();
            assert!(n > 0, "transport closed while the peer expected a frame");
        }
    }

    /// Next performative, skipping empty (heartbeat) frames.
    pub async fn read_performative(&mut self) -> (u16, Performative, Payload) {
        loop {
            let frame = self.read_frame().await;
            match frame.body {
                FrameBody::Performative {
                    performative,
                    payload,
                } => return (frame.channel, performative, payload),
                FrameBody::Empty => continue,
            }
        }
    }

    /// Waits for an empty (heartbeat) frame, failing on anything else.
    pub async fn read_empty_frame(&mut self) {
        let frame = self.read_frame().await;
        assert!(
            matches!(frame.body, FrameBody::Empty),
            "expected an empty frame, got {:?}",
            frame.body
        );
    }

    pub async fn expect_open(&mut self) -> Open {
        match self.read_performative().await {
            (0, Performative::Open(open), _) => open,
            (channel, other, _) => panic!("expected open, got {} on {}", other.name(), channel),
        }
    }

    /// Answers the client's Open.
    pub async fn answer_open(&mut self, max_frame_size: u32, idle_time_out: Option<u32>) -> Open {
        let open = self.expect_open().await;
        self.send_performative(
            0,
            Performative::Open(Open {
                container_id: "mock-peer".to_string(),
                hostname: None,
                max_frame_size: MaxFrameSize(max_frame_size),
                channel_max: ChannelMax::default(),
                idle_time_out,
                outgoing_locales: None,
                incoming_locales: None,
                offered_capabilities: None,
                desired_capabilities: None,
                properties: None,
            }),
        )
        .await;
        open
    }

    /// Answers the client's Begin on the same channel.
    pub async fn answer_begin(&mut self) -> u16 {
        let (channel, performative, _) = self.read_performative().await;
        let Performative::Begin(_begin) = performative else {
            panic!("expected begin, got {}", performative.name());
        };
        self.send_performative(
            channel,
            Performative::Begin(Begin {
                remote_channel: Some(channel),
                next_outgoing_id: 0,
                incoming_window: 1000,
                outgoing_window: 1000,
                handle_max: Handle::default(),
                offered_capabilities: None,
                desired_capabilities: None,
                properties: None,
            }),
        )
        .await;
        channel
    }

    /// Answers the client's Attach with the mirrored half of the link,
    /// using `handle` as the peer's handle.
    pub async fn answer_attach(&mut self, handle: u32) -> (u16, Attach) {
        let (channel, performative, _) = self.read_performative().await;
        let Performative::Attach(attach) = performative else {
            panic!("expected attach, got {}", performative.name());
        };
        let role = attach.role.peer();
        self.send_performative(
            channel,
            Performative::Attach(Attach {
                name: attach.name.clone(),
                handle: Handle(handle),
                role,
                snd_settle_mode: attach.snd_settle_mode,
                rcv_settle_mode: attach.rcv_settle_mode,
                source: attach.source.clone().or_else(|| Some(Source::default())),
                target: attach.target.clone().or_else(|| Some(Target::default())),
                unsettled: None,
                incomplete_unsettled: false,
                initial_delivery_count: match role {
                    Role::Sender => Some(0),
                    Role::Receiver => None,
                },
                max_message_size: None,
                offered_capabilities: None,
                desired_capabilities: None,
                properties: None,
            }),
        )
        .await;
        (channel, attach)
    }

    /// Grants `credit` to the client's sender link.
    pub async fn grant_credit(&mut self, channel: u16, handle: u32, credit: u32) {
        self.send_performative(
            channel,
            Performative::Flow(Flow {
                next_incoming_id: Some(0),
                incoming_window: 1000,
                next_outgoing_id: 0,
                outgoing_window: 1000,
                handle: Some(Handle(handle)),
                delivery_count: Some(0),
                link_credit: Some(credit),
                available: None,
                drain: false,
                echo: false,
                properties: None,
            }),
        )
        .await;
    }

    /// Settles a delivery range with the accepted outcome.
    pub async fn accept_delivery(&mut self, channel: u16, delivery_id: DeliveryNumber) {
        self.send_performative(
            channel,
            Performative::Disposition(Disposition {
                role: Role::Receiver,
                first: delivery_id,
                last: Some(delivery_id),
                settled: true,
                state: Some(DeliveryState::Accepted(Accepted {})),
                batchable: false,
            }),
        )
        .await;
    }

    /// Answers the client's Close.
    pub async fn answer_close(&mut self) {
        let (_, performative, _) = self.read_performative().await;
        let Performative::Close(_) = performative else {
            panic!("expected close, got {}", performative.name());
        };
        self.send_performative(0, Performative::Close(Default::default()))
            .await;
    }
}
