//! Driving the sans-I/O engine directly, no sockets involved.

use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use hematite_amqp::engine::{
    ConnectionState, Engine, EngineConfig, EngineEvent, LinkConfig, LinkId,
};
use hematite_amqp::frames::{Frame, FrameBody, FrameCodec};
use hematite_amqp_types::definitions::{Handle, ReceiverSettleMode, Role, SenderSettleMode};
use hematite_amqp_types::messaging::{Accepted, DeliveryState, Source, Target};
use hematite_amqp_types::performatives::{
    Attach, Begin, ChannelMax, Close, Disposition, Flow, MaxFrameSize, Open, Performative,
    Transfer,
};
use hematite_amqp_types::registry::Registry;
use tokio_util::codec::Decoder;

fn new_engine() -> Engine {
    Engine::new(
        EngineConfig {
            container_id: "test-engine".to_string(),
            ..Default::default()
        },
        Instant::now(),
    )
}

/// Pulls all queued outbound frames back out through the frame codec.
fn drain_frames(engine: &mut Engine) -> Vec<Frame> {
    let mut buf = BytesMut::new();
    engine.drain_outbound(&mut buf, Instant::now()).unwrap();
    let mut codec = FrameCodec::new(Arc::new(Registry::amqp()), 1024 * 1024);
    let mut frames = Vec::new();
    while let Some(frame) = codec.decode(&mut buf).unwrap() {
        frames.push(frame);
    }
    assert!(buf.is_empty());
    frames
}

fn remote_open() -> Open {
    Open {
        container_id: "remote".to_string(),
        hostname: None,
        max_frame_size: MaxFrameSize(65536),
        channel_max: ChannelMax::default(),
        idle_time_out: None,
        outgoing_locales: None,
        incoming_locales: None,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    }
}

fn feed(engine: &mut Engine, channel: u16, performative: Performative) {
    engine
        .handle_frame(Frame::performative(channel, performative), Instant::now())
        .unwrap();
}

fn feed_transfer(engine: &mut Engine, channel: u16, transfer: Transfer, payload: &'static [u8]) {
    engine
        .handle_frame(
            Frame::new(
                channel,
                FrameBody::Performative {
                    performative: Performative::Transfer(transfer),
                    payload: Bytes::from_static(payload),
                },
            ),
            Instant::now(),
        )
        .unwrap();
}

/// Runs the handshake up to Opened.
fn opened_engine() -> Engine {
    let mut engine = new_engine();
    engine.on_header_sent();
    engine.on_header_received();
    engine.open().unwrap();

    let frames = drain_frames(&mut engine);
    assert_eq!(frames.len(), 1);
    assert!(matches!(
        frames[0].body,
        FrameBody::Performative {
            performative: Performative::Open(_),
            ..
        }
    ));

    feed(&mut engine, 0, Performative::Open(remote_open()));
    assert!(matches!(engine.poll_event(), Some(EngineEvent::Opened)));
    assert!(matches!(engine.state(), ConnectionState::Opened));
    engine
}

/// Opens a session and answers the Begin, returning the session id.
fn mapped_session(engine: &mut Engine) -> usize {
    let sid = engine.begin_session().unwrap();
    let frames = drain_frames(engine);
    assert!(matches!(
        frames[0].body,
        FrameBody::Performative {
            performative: Performative::Begin(_),
            ..
        }
    ));
    feed(
        engine,
        0,
        Performative::Begin(Begin {
            remote_channel: Some(sid as u16),
            next_outgoing_id: 0,
            incoming_window: 1000,
            outgoing_window: 1000,
            handle_max: Handle::default(),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }),
    );
    assert!(matches!(
        engine.poll_event(),
        Some(EngineEvent::SessionBegun { .. })
    ));
    sid
}

fn receiver_config(name: &str) -> LinkConfig {
    LinkConfig {
        name: name.to_string(),
        role: Role::Receiver,
        snd_settle_mode: SenderSettleMode::Unsettled,
        rcv_settle_mode: ReceiverSettleMode::First,
        source: Some(Source::builder().address("q1").build()),
        target: Some(Target::default()),
        max_message_size: None,
        streaming: false,
    }
}

fn sender_config(name: &str) -> LinkConfig {
    LinkConfig {
        name: name.to_string(),
        role: Role::Sender,
        snd_settle_mode: SenderSettleMode::Unsettled,
        rcv_settle_mode: ReceiverSettleMode::First,
        source: Some(Source::default()),
        target: Some(Target::builder().address("q1").build()),
        max_message_size: None,
        streaming: false,
    }
}

/// Attaches a link and answers the Attach with the mirrored half.
fn attached_link(engine: &mut Engine, sid: usize, config: LinkConfig) -> LinkId {
    let role = config.role;
    let name = config.name.clone();
    let lid = engine.attach(sid, config).unwrap();
    drain_frames(engine);
    feed(
        engine,
        sid as u16,
        Performative::Attach(Attach {
            name,
            handle: Handle(0),
            role: role.peer(),
            snd_settle_mode: SenderSettleMode::Unsettled,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: Some(Source::builder().address("q1").build()),
            target: Some(Target::builder().address("q1").build()),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: match role.peer() {
                Role::Sender => Some(0),
                Role::Receiver => None,
            },
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }),
    );
    assert!(matches!(
        engine.poll_event(),
        Some(EngineEvent::LinkAttached { .. })
    ));
    lid
}

#[test]
fn simultaneous_close_completes_both_sides() {
    let mut engine = opened_engine();

    engine.close(None);
    assert!(matches!(engine.state(), ConnectionState::CloseSent));
    let frames = drain_frames(&mut engine);
    assert!(matches!(
        frames[0].body,
        FrameBody::Performative {
            performative: Performative::Close(_),
            ..
        }
    ));

    // The peer's own close crosses ours on the wire
    feed(&mut engine, 0, Performative::Close(Close::default()));
    assert!(matches!(engine.state(), ConnectionState::End));
    match engine.poll_event() {
        Some(EngineEvent::Closed { error, remote }) => {
            assert!(error.is_none());
            assert!(!remote);
        }
        other => panic!("expected closed event, got {:?}", other),
    }
    // No echo close goes out; ours was already sent
    assert!(drain_frames(&mut engine).is_empty());
}

#[test]
fn remote_initiated_close_is_answered() {
    let mut engine = opened_engine();
    feed(&mut engine, 0, Performative::Close(Close::default()));

    match engine.poll_event() {
        Some(EngineEvent::Closed { remote, .. }) => assert!(remote),
        other => panic!("expected closed event, got {:?}", other),
    }
    let frames = drain_frames(&mut engine);
    assert!(matches!(
        frames[0].body,
        FrameBody::Performative {
            performative: Performative::Close(_),
            ..
        }
    ));
}

#[test]
fn next_incoming_id_mismatch_is_fatal() {
    let mut engine = opened_engine();
    let sid = mapped_session(&mut engine);
    let lid = attached_link(&mut engine, sid, receiver_config("r1"));
    engine.add_credit(lid, 10).unwrap();
    drain_frames(&mut engine);

    let mut transfer = Transfer::continuation(Handle(0), false);
    transfer.delivery_id = Some(5);
    transfer.delivery_tag = Some(Bytes::from_static(b"\x00"));
    let result = engine.handle_frame(
        Frame::new(
            sid as u16,
            FrameBody::Performative {
                performative: Performative::Transfer(transfer),
                payload: Bytes::new(),
            },
        ),
        Instant::now(),
    );
    assert!(result.is_err());
    assert!(engine.failure().is_some());

    // The failure produces a Close carrying the error condition
    let frames = drain_frames(&mut engine);
    let close = frames
        .iter()
        .find_map(|frame| match &frame.body {
            FrameBody::Performative {
                performative: Performative::Close(close),
                ..
            } => Some(close.clone()),
            _ => None,
        })
        .expect("engine must close on fatal error");
    assert!(close.error.is_some());
}

#[test]
fn transfer_reassembly_concatenates_payload_slices() {
    let mut engine = opened_engine();
    let sid = mapped_session(&mut engine);
    let lid = attached_link(&mut engine, sid, receiver_config("r1"));
    engine.add_credit(lid, 10).unwrap();
    drain_frames(&mut engine);

    let mut first = Transfer::continuation(Handle(0), true);
    first.delivery_id = Some(0);
    first.delivery_tag = Some(Bytes::from_static(b"\x07"));
    first.message_format = Some(0);
    feed_transfer(&mut engine, sid as u16, first, b"AAAAA");
    feed_transfer(
        &mut engine,
        sid as u16,
        Transfer::continuation(Handle(0), true),
        b"BBBBB",
    );
    feed_transfer(
        &mut engine,
        sid as u16,
        Transfer::continuation(Handle(0), false),
        b"CCCCC",
    );

    match engine.poll_event() {
        Some(EngineEvent::DeliveryReady { delivery, .. }) => {
            assert_eq!(delivery.delivery_id, 0);
            assert_eq!(delivery.delivery_tag.as_ref(), b"\x07");
            assert_eq!(delivery.payload.as_ref(), b"AAAAABBBBBCCCCC");
            assert!(!delivery.settled);
        }
        other => panic!("expected delivery, got {:?}", other),
    }
}

#[test]
fn disposition_range_applies_to_every_delivery() {
    let mut engine = opened_engine();
    let sid = mapped_session(&mut engine);
    let lid = attached_link(&mut engine, sid, sender_config("s1"));

    // Grant credit so the queued sends go out
    feed(
        &mut engine,
        sid as u16,
        Performative::Flow(Flow {
            next_incoming_id: Some(0),
            incoming_window: 1000,
            next_outgoing_id: 0,
            outgoing_window: 1000,
            handle: Some(Handle(0)),
            delivery_count: Some(0),
            link_credit: Some(10),
            available: None,
            drain: false,
            echo: false,
            properties: None,
        }),
    );

    for body in [b"m0", b"m1", b"m2"] {
        engine
            .send(lid, Bytes::from_static(body), 0, false)
            .unwrap();
    }
    let frames = drain_frames(&mut engine);
    let transfers = frames
        .iter()
        .filter(|frame| {
            matches!(
                frame.body,
                FrameBody::Performative {
                    performative: Performative::Transfer(_),
                    ..
                }
            )
        })
        .count();
    assert_eq!(transfers, 3);
    for expected in 0..3u64 {
        match engine.poll_event() {
            Some(EngineEvent::TransferSent {
                send_id,
                delivery_id,
                ..
            }) => {
                assert_eq!(send_id, expected);
                assert_eq!(delivery_id, expected as u32);
            }
            other => panic!("expected transfer-sent, got {:?}", other),
        }
    }

    feed(
        &mut engine,
        sid as u16,
        Performative::Disposition(Disposition {
            role: Role::Receiver,
            first: 0,
            last: Some(2),
            settled: true,
            state: Some(DeliveryState::Accepted(Accepted {})),
            batchable: false,
        }),
    );

    for expected in 0..3u32 {
        match engine.poll_event() {
            Some(EngineEvent::Disposition {
                delivery_id,
                settled,
                state,
                ..
            }) => {
                assert_eq!(delivery_id, expected);
                assert!(settled);
                assert!(matches!(state, Some(DeliveryState::Accepted(_))));
            }
            other => panic!("expected disposition, got {:?}", other),
        }
    }
}

#[test]
fn sender_without_credit_stalls_until_flow() {
    let mut engine = opened_engine();
    let sid = mapped_session(&mut engine);
    let lid = attached_link(&mut engine, sid, sender_config("s1"));

    engine
        .send(lid, Bytes::from_static(b"queued"), 0, false)
        .unwrap();
    // No credit yet: nothing must go out
    assert!(drain_frames(&mut engine).is_empty());
    assert!(engine.poll_event().is_none());

    feed(
        &mut engine,
        sid as u16,
        Performative::Flow(Flow {
            next_incoming_id: Some(0),
            incoming_window: 1000,
            next_outgoing_id: 0,
            outgoing_window: 1000,
            handle: Some(Handle(0)),
            delivery_count: Some(0),
            link_credit: Some(1),
            available: None,
            drain: false,
            echo: false,
            properties: None,
        }),
    );
    let frames = drain_frames(&mut engine);
    assert!(frames.iter().any(|frame| matches!(
        frame.body,
        FrameBody::Performative {
            performative: Performative::Transfer(_),
            ..
        }
    )));
}

#[test]
fn large_delivery_is_split_at_the_remote_max_frame_size() {
    let mut engine = opened_engine();
    // remote max-frame-size is 65536 from the handshake
    let sid = mapped_session(&mut engine);
    let lid = attached_link(&mut engine, sid, sender_config("s1"));

    feed(
        &mut engine,
        sid as u16,
        Performative::Flow(Flow {
            next_incoming_id: Some(0),
            incoming_window: 1000,
            next_outgoing_id: 0,
            outgoing_window: 1000,
            handle: Some(Handle(0)),
            delivery_count: Some(0),
            link_credit: Some(1),
            available: None,
            drain: false,
            echo: false,
            properties: None,
        }),
    );

    let payload = Bytes::from(vec![0x42u8; 200_000]);
    engine.send(lid, payload, 0, false).unwrap();
    let frames = drain_frames(&mut engine);

    let mut reassembled = Vec::new();
    let mut more_flags = Vec::new();
    for frame in &frames {
        if let FrameBody::Performative {
            performative: Performative::Transfer(transfer),
            payload,
        } = &frame.body
        {
            more_flags.push(transfer.more);
            reassembled.extend_from_slice(payload);
        }
    }
    assert!(more_flags.len() > 1, "delivery must span several frames");
    assert_eq!(more_flags.last(), Some(&false));
    assert!(more_flags[..more_flags.len() - 1].iter().all(|more| *more));
    assert_eq!(reassembled.len(), 200_000);
}
