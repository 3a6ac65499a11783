//! The session handle.

use std::sync::Arc;

use hematite_amqp_types::definitions;
use hematite_amqp_types::registry::Registry;
use tokio::sync::{mpsc, oneshot};

use crate::control::Control;
use crate::engine::SessionId;

use super::driver::ConnShared;
use super::error::ClientError;
use super::options::{ConnectionOptions, ReceiverOptions, SenderOptions};
use super::receiver::Receiver;
use super::sender::Sender;
use super::with_timeout;

/// An explicitly opened session.
#[derive(Debug)]
pub struct Session {
    control: mpsc::Sender<Control>,
    session: SessionId,
    shared: Arc<ConnShared>,
    registry: Arc<Registry>,
    options: ConnectionOptions,
}

impl Session {
    pub(crate) fn new(
        control: mpsc::Sender<Control>,
        session: SessionId,
        shared: Arc<ConnShared>,
        registry: Arc<Registry>,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            control,
            session,
            shared,
            registry,
            options,
        }
    }

    /// Opens a sender to `address` on this session.
    pub async fn open_sender(&self, address: &str) -> Result<Sender, ClientError> {
        self.open_sender_with_options(address, SenderOptions::default())
            .await
    }

    /// Opens a sender with explicit options.
    pub async fn open_sender_with_options(
        &self,
        address: &str,
        sender_options: SenderOptions,
    ) -> Result<Sender, ClientError> {
        Sender::attach(
            self.control.clone(),
            self.shared.clone(),
            self.session,
            address,
            sender_options,
            &self.options,
        )
        .await
    }

    /// Opens a receiver from `address` on this session.
    pub async fn open_receiver(&self, address: &str) -> Result<Receiver, ClientError> {
        self.open_receiver_with_options(address, ReceiverOptions::default())
            .await
    }

    /// Opens a receiver with explicit options.
    pub async fn open_receiver_with_options(
        &self,
        address: &str,
        receiver_options: ReceiverOptions,
    ) -> Result<Receiver, ClientError> {
        Receiver::attach(
            self.control.clone(),
            self.shared.clone(),
            self.registry.clone(),
            self.session,
            address,
            receiver_options,
            &self.options,
        )
        .await
    }

    /// Ends the session and awaits the end handshake.
    pub async fn end(&self) -> Result<(), ClientError> {
        self.end_with_error(None).await
    }

    /// Ends the session conveying an error to the peer.
    pub async fn end_with_error(
        &self,
        error: Option<definitions::Error>,
    ) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::EndSession {
                session: self.session,
                error,
                responder: tx,
            })
            .await
            .map_err(|_| ClientError::dropped())?;
        with_timeout("end session", self.options.request_timeout, async {
            rx.await.map_err(|_| ClientError::dropped())?
        })
        .await
    }
}
