//! End-to-end client scenarios against a scripted peer.

mod common;

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use hematite_amqp::client::{Client, ClientError, ConnectionOptions, ReceiverOptions};
use hematite_amqp::frames::FrameBody;
use hematite_amqp_types::codec::write_value;
use hematite_amqp_types::definitions::Handle;
use hematite_amqp_types::messaging::{AmqpValue, Body, Data, DeliveryState, Message};
use hematite_amqp_types::performatives::{Flow, Performative, Transfer};
use hematite_amqp_types::Value;

use common::MockPeer;

fn encoded_data_message(content: &'static [u8]) -> Bytes {
    let mut buf = BytesMut::new();
    write_value(&mut buf, &Value::from(Data(Bytes::from_static(content))));
    buf.freeze()
}

#[tokio::test]
async fn open_close_round_trip() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        let open = peer.answer_open(4096, Some(30_000)).await;
        assert!(!open.container_id.is_empty());
        peer.answer_close().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, Some("localhost"), ConnectionOptions::default())
        .await
        .unwrap();
    connection.close().await.unwrap();
    assert!(connection.is_closed());
    assert!(connection.failure_cause().is_none());
    peer.await.unwrap();
}

#[tokio::test]
async fn single_frame_send_accepted() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;
        let channel = peer.answer_begin().await;
        let (_, _attach) = peer.answer_attach(0).await;
        peer.grant_credit(channel, 0, 10).await;

        let (_, performative, payload) = peer.read_performative().await;
        let Performative::Transfer(transfer) = performative else {
            panic!("expected transfer, got {}", performative.name());
        };
        assert_eq!(transfer.delivery_id, Some(0));
        assert!(!transfer.more);
        let message = Message::decode(&hematite_amqp_types::registry::Registry::amqp(), &payload)
            .unwrap();
        assert_eq!(
            message.body,
            Body::Value(AmqpValue(Value::String("hello".to_string())))
        );

        peer.accept_delivery(channel, 0).await;
        peer.answer_close().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();
    let sender = connection.open_sender("q1").await.unwrap();

    let mut tracker = sender.send("hello").await.unwrap();
    tracker
        .await_accepted(Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert!(tracker.remote_settled());
    assert!(matches!(
        tracker.remote_state(),
        Some(DeliveryState::Accepted(_))
    ));

    connection.close().await.unwrap();
    peer.await.unwrap();
}

#[tokio::test]
async fn sends_complete_in_call_order() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;
        let channel = peer.answer_begin().await;
        let (_, _attach) = peer.answer_attach(0).await;
        peer.grant_credit(channel, 0, 10).await;

        for expected_id in 0..2u32 {
            let (_, performative, _) = peer.read_performative().await;
            let Performative::Transfer(transfer) = performative else {
                panic!("expected transfer, got {}", performative.name());
            };
            assert_eq!(transfer.delivery_id, Some(expected_id));
        }
        peer.accept_delivery(channel, 0).await;
        peer.accept_delivery(channel, 1).await;
        peer.answer_close().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();
    let sender = connection.open_sender("q1").await.unwrap();

    let (first, second) = futures_util::join!(sender.send("one"), sender.send("two"));
    let mut first = first.unwrap();
    let mut second = second.unwrap();
    assert_eq!(first.delivery_id(), 0);
    assert_eq!(second.delivery_id(), 1);
    first
        .await_accepted(Some(Duration::from_secs(5)))
        .await
        .unwrap();
    second
        .await_accepted(Some(Duration::from_secs(5)))
        .await
        .unwrap();

    connection.close().await.unwrap();
    peer.await.unwrap();
}

#[tokio::test]
async fn multi_frame_receive_reassembles_in_order() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);

    // One data-section message split across three transfer frames
    let encoded = encoded_data_message(b"AAAAABBBBBCCCCC");
    let cut_one = encoded.len() / 3;
    let cut_two = 2 * encoded.len() / 3;

    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;
        let channel = peer.answer_begin().await;
        let (_, _attach) = peer.answer_attach(0).await;

        // Initial credit window grant
        let (_, performative, _) = peer.read_performative().await;
        let Performative::Flow(flow) = performative else {
            panic!("expected flow, got {}", performative.name());
        };
        assert_eq!(flow.link_credit, Some(10));

        let slices = [
            (encoded.slice(..cut_one), true),
            (encoded.slice(cut_one..cut_two), true),
            (encoded.slice(cut_two..), false),
        ];
        for (index, (slice, more)) in slices.into_iter().enumerate() {
            let mut transfer = Transfer::continuation(Handle(0), more);
            if index == 0 {
                transfer.delivery_id = Some(0);
                transfer.delivery_tag = Some(Bytes::from_static(b"\x00"));
                transfer.message_format = Some(0);
            }
            peer.send(hematite_amqp::frames::Frame::new(
                channel,
                FrameBody::Performative {
                    performative: Performative::Transfer(transfer),
                    payload: slice,
                },
            ))
            .await;
        }

        // Auto-accept disposition for the delivery, then the close; no
        // extra flow may appear in between (9 credits remain, above the
        // half-window threshold)
        let (_, performative, _) = peer.read_performative().await;
        let Performative::Disposition(disposition) = performative else {
            panic!("expected disposition, got {}", performative.name());
        };
        assert_eq!(disposition.first, 0);
        assert!(disposition.settled);

        let (_, performative, _) = peer.read_performative().await;
        assert!(
            matches!(performative, Performative::Close(_)),
            "expected close, got {}",
            performative.name()
        );
        peer.send_performative(0, Performative::Close(Default::default()))
            .await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();
    let mut receiver = connection
        .open_receiver_with_options("q1", ReceiverOptions::default().credit_window(10))
        .await
        .unwrap();

    let delivery = receiver.receive().await.unwrap();
    assert_eq!(
        delivery.body(),
        &Body::Data(Data(Bytes::from_static(b"AAAAABBBBBCCCCC")))
    );
    assert_eq!(delivery.delivery_id(), 0);

    connection.close().await.unwrap();
    peer.await.unwrap();
}

#[tokio::test]
async fn aborted_delivery_is_discarded() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;
        let channel = peer.answer_begin().await;
        let (_, _attach) = peer.answer_attach(0).await;
        let (_, _flow, _) = peer.read_performative().await;

        let mut first = Transfer::continuation(Handle(0), true);
        first.delivery_id = Some(0);
        first.delivery_tag = Some(Bytes::from_static(b"\x01"));
        first.message_format = Some(0);
        peer.send(hematite_amqp::frames::Frame::new(
            channel,
            FrameBody::Performative {
                performative: Performative::Transfer(first),
                payload: Bytes::from_static(b"X"),
            },
        ))
        .await;

        let mut abort = Transfer::continuation(Handle(0), false);
        abort.aborted = true;
        peer.send_performative(channel, Performative::Transfer(abort))
            .await;

        peer.answer_close().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();
    let mut receiver = connection
        .open_receiver_with_options("q1", ReceiverOptions::default().credit_window(10))
        .await
        .unwrap();

    let delivery = receiver
        .receive_timeout(Duration::from_millis(100))
        .await
        .unwrap();
    assert!(delivery.is_none());

    connection.close().await.unwrap();
    peer.await.unwrap();
}

#[tokio::test]
async fn drain_completes_on_flow_echo() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;
        let channel = peer.answer_begin().await;
        let (_, _attach) = peer.answer_attach(0).await;

        let (_, performative, _) = peer.read_performative().await;
        let Performative::Flow(flow) = performative else {
            panic!("expected flow, got {}", performative.name());
        };
        assert_eq!(flow.link_credit, Some(5));
        assert!(!flow.drain);

        let (_, performative, _) = peer.read_performative().await;
        let Performative::Flow(flow) = performative else {
            panic!("expected drain flow, got {}", performative.name());
        };
        assert!(flow.drain);
        assert_eq!(flow.link_credit, Some(5));

        // Consume the credit by advancing delivery-count and echo back
        peer.send_performative(
            channel,
            Performative::Flow(Flow {
                next_incoming_id: Some(0),
                incoming_window: 1000,
                next_outgoing_id: 0,
                outgoing_window: 1000,
                handle: Some(Handle(0)),
                delivery_count: Some(5),
                link_credit: Some(0),
                available: Some(0),
                drain: true,
                echo: false,
                properties: None,
            }),
        )
        .await;

        peer.answer_close().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();
    let mut receiver = connection
        .open_receiver_with_options("q1", ReceiverOptions::default().credit_window(0))
        .await
        .unwrap();

    receiver.add_credit(5).await.unwrap();
    receiver.drain().await.unwrap();

    connection.close().await.unwrap();
    peer.await.unwrap();
}

#[tokio::test]
async fn manual_credit_is_illegal_with_credit_window() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;
        peer.answer_begin().await;
        peer.answer_attach(0).await;
        let (_, _flow, _) = peer.read_performative().await;
        peer.answer_close().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();
    let mut receiver = connection
        .open_receiver_with_options("q1", ReceiverOptions::default().credit_window(10))
        .await
        .unwrap();

    let result = receiver.add_credit(1).await;
    assert!(matches!(result, Err(ClientError::IllegalState(_))));

    connection.close().await.unwrap();
    peer.await.unwrap();
}

#[tokio::test]
async fn heartbeats_are_sent_for_remote_idle_timeout() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        // Advertise a 400ms idle timeout; the client must heartbeat at
        // half of it
        peer.answer_open(65536, Some(400)).await;
        peer.read_empty_frame().await;
        peer.read_empty_frame().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), peer)
        .await
        .expect("no heartbeat within the idle window")
        .unwrap();
    drop(connection);
}

#[tokio::test]
async fn local_idle_timeout_fails_the_connection() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;

        // Stay silent; the client must give up and close with
        // amqp:resource-limit-exceeded
        let (_, performative, _) = peer.read_performative().await;
        let Performative::Close(close) = performative else {
            panic!("expected close, got {}", performative.name());
        };
        let error = close.error.expect("close must carry the idle-timeout error");
        assert_eq!(error.condition.to_string(), "amqp:resource-limit-exceeded");
    });

    let client = Client::new();
    let connection = client
        .connect_over(
            client_io,
            None,
            ConnectionOptions::default().idle_timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), peer)
        .await
        .expect("connection did not fail on idle timeout")
        .unwrap();

    // The failure is observable and close is still clean
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(connection.failure_cause().is_some());
    connection.close().await.unwrap();
}

#[tokio::test]
async fn streamed_message_arrives_in_data_chunks() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;
        let channel = peer.answer_begin().await;
        let (_, _attach) = peer.answer_attach(0).await;
        peer.grant_credit(channel, 0, 10).await;

        let mut delivery_id = None;
        let mut chunks = Vec::new();
        loop {
            let (_, performative, payload) = peer.read_performative().await;
            let Performative::Transfer(transfer) = performative else {
                panic!("expected transfer, got {}", performative.name());
            };
            if let Some(id) = transfer.delivery_id {
                delivery_id = Some(id);
            }
            if !payload.is_empty() {
                chunks.push(payload);
            }
            if !transfer.more {
                break;
            }
        }
        assert_eq!(chunks.len(), 2);
        assert_eq!(delivery_id, Some(0));

        peer.accept_delivery(channel, 0).await;
        peer.answer_close().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();
    let stream_sender = connection.open_stream_sender("q1").await.unwrap();

    let mut message = stream_sender.begin_message().await.unwrap();
    message.write_chunk(Bytes::from_static(b"first")).await.unwrap();
    message.write_chunk(Bytes::from_static(b"second")).await.unwrap();
    let mut tracker = message.complete().await.unwrap();
    tracker
        .await_accepted(Some(Duration::from_secs(5)))
        .await
        .unwrap();

    connection.close().await.unwrap();
    peer.await.unwrap();
}

#[tokio::test]
async fn stream_receiver_yields_chunks_until_final_transfer() {
    let (client_io, peer_io) = tokio::io::duplex(64 * 1024);
    let peer = tokio::spawn(async move {
        let mut peer = MockPeer::new(peer_io);
        peer.exchange_header().await;
        peer.answer_open(65536, None).await;
        let channel = peer.answer_begin().await;
        let (_, _attach) = peer.answer_attach(0).await;
        let (_, _flow, _) = peer.read_performative().await;

        let parts: [(&[u8], bool); 3] = [(b"AAAAA", true), (b"BBBBB", true), (b"CCCCC", false)];
        for (index, (part, more)) in parts.into_iter().enumerate() {
            let mut transfer = Transfer::continuation(Handle(0), more);
            if index == 0 {
                transfer.delivery_id = Some(0);
                transfer.delivery_tag = Some(Bytes::from_static(b"\x00"));
                transfer.message_format = Some(0);
            }
            peer.send(hematite_amqp::frames::Frame::new(
                channel,
                FrameBody::Performative {
                    performative: Performative::Transfer(transfer),
                    payload: Bytes::from_static(part),
                },
            ))
            .await;
        }

        // the stream delivery is accepted when fully read
        let (_, performative, _) = peer.read_performative().await;
        assert!(matches!(performative, Performative::Disposition(_)));
        peer.answer_close().await;
    });

    let client = Client::new();
    let connection = client
        .connect_over(client_io, None, ConnectionOptions::default())
        .await
        .unwrap();
    let mut stream_receiver = connection
        .open_stream_receiver_with_options("q1", ReceiverOptions::default().credit_window(10))
        .await
        .unwrap();

    let mut delivery = stream_receiver.receive().await.unwrap();
    let mut collected = Vec::new();
    while let Some(chunk) = delivery.next_chunk().await.unwrap() {
        collected.extend_from_slice(&chunk);
    }
    assert_eq!(collected, b"AAAAABBBBBCCCCC");
    delivery.accept().await.unwrap();

    connection.close().await.unwrap();
    peer.await.unwrap();
}
