//! The sender link handle.

use std::sync::Arc;
use std::time::Duration;

use hematite_amqp_types::definitions::{ReceiverSettleMode, Role, SenderSettleMode};
use hematite_amqp_types::messaging::{Message, Source, Target, MESSAGE_FORMAT};
use hematite_amqp_types::primitives::Array;
use tokio::sync::{mpsc, oneshot};

use crate::control::Control;
use crate::engine::{LinkConfig, LinkId, SessionId};

use super::driver::ConnShared;
use super::error::ClientError;
use super::options::{ConnectionOptions, DeliveryMode, SenderOptions, SourceOptions, TargetOptions};
use super::tracker::{Tracker, TrackerShared};
use super::with_timeout;

/// A sender link.
#[derive(Debug)]
pub struct Sender {
    control: mpsc::Sender<Control>,
    link: LinkId,
    shared: Arc<ConnShared>,
    delivery_mode: DeliveryMode,
    send_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl Sender {
    pub(crate) async fn attach(
        control: mpsc::Sender<Control>,
        shared: Arc<ConnShared>,
        session: SessionId,
        address: &str,
        options: SenderOptions,
        connection_options: &ConnectionOptions,
    ) -> Result<Self, ClientError> {
        let name = options
            .link_name
            .clone()
            .unwrap_or_else(|| format!("sender-{}", uuid::Uuid::new_v4()));
        let snd_settle_mode = match options.delivery_mode {
            DeliveryMode::AtMostOnce => SenderSettleMode::Settled,
            DeliveryMode::AtLeastOnce => SenderSettleMode::Unsettled,
        };

        let config = LinkConfig {
            name,
            role: Role::Sender,
            snd_settle_mode,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: Some(build_source(None, &options.source)),
            target: Some(build_target(Some(address), &options.target)),
            max_message_size: None,
            streaming: false,
        };

        let link = attach_link(
            &control,
            session,
            config,
            options.auto_settle,
            connection_options.request_timeout,
        )
        .await?;

        Ok(Self {
            control,
            link,
            shared,
            delivery_mode: options.delivery_mode,
            send_timeout: options.send_timeout.or(connection_options.send_timeout),
            request_timeout: connection_options.request_timeout,
        })
    }

    /// Sends a message and returns a tracker for its settlement.
    ///
    /// The call completes when the transfer goes out, which may wait for
    /// link credit up to the configured send timeout.
    pub async fn send(&self, message: impl Into<Message>) -> Result<Tracker, ClientError> {
        let message = message.into();
        self.send_raw(message.to_bytes()).await
    }

    /// Sends already-encoded message bytes.
    pub async fn send_raw(&self, payload: bytes::Bytes) -> Result<Tracker, ClientError> {
        if let Some(failure) = self.shared.failure_cause() {
            return Err(failure);
        }
        let settled = matches!(self.delivery_mode, DeliveryMode::AtMostOnce);
        let shared = Arc::new(TrackerShared::default());
        let (sent_tx, sent_rx) = oneshot::channel();
        let (settlement_tx, settlement_rx) = oneshot::channel();

        self.control
            .send(Control::Send {
                link: self.link,
                payload,
                message_format: MESSAGE_FORMAT,
                settled,
                shared: shared.clone(),
                sent: sent_tx,
                settlement: settlement_tx,
            })
            .await
            .map_err(|_| ClientError::dropped())?;

        let delivery_id = with_timeout("send", self.send_timeout, async {
            sent_rx.await.map_err(|_| ClientError::dropped())?
        })
        .await?;

        Ok(Tracker::new(
            self.control.clone(),
            self.link,
            delivery_id,
            shared,
            settlement_rx,
        ))
    }

    /// Detaches the link without closing it.
    pub async fn detach(&self) -> Result<(), ClientError> {
        detach_link(&self.control, self.link, false, self.request_timeout).await
    }

    /// Closes the link.
    pub async fn close(&self) -> Result<(), ClientError> {
        detach_link(&self.control, self.link, true, self.request_timeout).await
    }
}

pub(crate) fn build_source(address: Option<&str>, options: &SourceOptions) -> Source {
    let mut builder = Source::builder();
    if let Some(address) = address {
        builder = builder.address(address);
    }
    if let Some(mode) = options.distribution_mode {
        builder = builder.distribution_mode(mode);
    }
    if let Some(filters) = &options.filters {
        builder = builder.filter(filters.clone());
    }
    if let Some(durability) = options.durability_mode {
        builder = builder.durable(durability);
    }
    if let Some(policy) = options.expiry_policy {
        builder = builder.expiry_policy(policy);
    }
    if !options.capabilities.is_empty() {
        builder = builder.capabilities(Array::from(options.capabilities.clone()));
    }
    builder.build()
}

pub(crate) fn build_target(address: Option<&str>, options: &TargetOptions) -> Target {
    let mut builder = Target::builder();
    if let Some(address) = address {
        builder = builder.address(address);
    }
    if let Some(durability) = options.durability_mode {
        builder = builder.durable(durability);
    }
    if let Some(policy) = options.expiry_policy {
        builder = builder.expiry_policy(policy);
    }
    if !options.capabilities.is_empty() {
        builder = builder.capabilities(Array::from(options.capabilities.clone()));
    }
    builder.build()
}

pub(crate) async fn attach_link(
    control: &mpsc::Sender<Control>,
    session: SessionId,
    config: LinkConfig,
    auto_settle: bool,
    request_timeout: Option<Duration>,
) -> Result<LinkId, ClientError> {
    let (tx, rx) = oneshot::channel();
    control
        .send(Control::Attach {
            session,
            config,
            registration: None,
            auto_settle,
            responder: tx,
        })
        .await
        .map_err(|_| ClientError::dropped())?;
    with_timeout("attach link", request_timeout, async {
        rx.await.map_err(|_| ClientError::dropped())?
    })
    .await
}

pub(crate) async fn detach_link(
    control: &mpsc::Sender<Control>,
    link: LinkId,
    closed: bool,
    request_timeout: Option<Duration>,
) -> Result<(), ClientError> {
    let (tx, rx) = oneshot::channel();
    if control
        .send(Control::Detach {
            link,
            closed,
            error: None,
            responder: tx,
        })
        .await
        .is_err()
    {
        // Connection already closed; the link is gone with it
        return Ok(());
    }
    let result = with_timeout("detach link", request_timeout, async {
        rx.await.map_err(|_| ClientError::dropped())?
    })
    .await;
    match result {
        Err(ClientError::OperationTimedOut(_)) => {
            Err(ClientError::ResourceClosed("detach handshake timed out"))
        }
        other => other,
    }
}
