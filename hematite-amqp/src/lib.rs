#![deny(missing_docs, missing_debug_implementations)]

//! An AMQP 1.0 protocol engine and imperative messaging client.
//!
//! The crate is split the way the protocol is layered:
//!
//! - [`frames`] — frame header encode/decode and incomplete-frame
//!   buffering, as [`tokio_util::codec`] implementations,
//! - [`transport`] — the protocol header exchange and the byte-pipe
//!   boundary (`AsyncRead + AsyncWrite`; TCP, TLS and WebSocket wrappers
//!   all look the same from here),
//! - [`engine`] — the sans-I/O connection/session/link state machine:
//!   bytes in, bytes out, events out, no sockets and no tasks,
//! - [`client`] — the imperative API (Connection, Session, Sender,
//!   Receiver, streaming variants, Tracker, Delivery) that drives one
//!   engine per connection on a dedicated tokio task.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use hematite_amqp::client::{Client, ConnectionOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new();
//!     let connection = client
//!         .connect("localhost", 5672, ConnectionOptions::default())
//!         .await
//!         .unwrap();
//!
//!     let sender = connection.open_sender("q1").await.unwrap();
//!     let tracker = sender.send("hello AMQP").await.unwrap();
//!     tracker.await_accepted(None).await.unwrap();
//!
//!     let receiver = connection.open_receiver("q1").await.unwrap();
//!     let delivery = receiver.receive().await.unwrap();
//!     println!("{:?}", delivery.body());
//!
//!     connection.close().await.unwrap();
//! }
//! ```

pub(crate) mod control;

pub mod client;
pub mod engine;
pub mod frames;
pub mod sasl_profile;
pub mod transport;

pub use client::{Client, Connection, Receiver, Sender, Session};

/// Type alias for a delivery payload.
pub type Payload = bytes::Bytes;
