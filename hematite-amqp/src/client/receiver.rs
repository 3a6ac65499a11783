//! The receiver link handle.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hematite_amqp_types::definitions::{ReceiverSettleMode, Role, SenderSettleMode};
use hematite_amqp_types::messaging::Message;
use hematite_amqp_types::registry::Registry;
use tokio::sync::{mpsc, oneshot};

use crate::control::{Control, ReceiverItem, ReceiverRegistration};
use crate::engine::{EngineError, LinkConfig, LinkId, RawDelivery, SessionId};

use super::delivery::Delivery;
use super::driver::ConnShared;
use super::error::ClientError;
use super::options::{ConnectionOptions, DeliveryMode, ReceiverOptions};
use super::sender::{build_source, build_target, detach_link};
use super::with_timeout;

/// A receiver link.
///
/// With a non-zero credit window the receiver keeps the sender supplied
/// with credit automatically; with `credit_window = 0` the application
/// manages credit through [`Receiver::add_credit`] and
/// [`Receiver::drain`].
#[derive(Debug)]
pub struct Receiver {
    control: mpsc::Sender<Control>,
    link: LinkId,
    shared: Arc<ConnShared>,
    registry: Arc<Registry>,
    items: mpsc::UnboundedReceiver<ReceiverItem>,
    queued: Arc<AtomicU32>,
    options: ReceiverOptions,
    request_timeout: Option<Duration>,
    drain_pending: bool,
    detached: Option<ClientError>,
}

impl Receiver {
    pub(crate) async fn attach(
        control: mpsc::Sender<Control>,
        shared: Arc<ConnShared>,
        registry: Arc<Registry>,
        session: SessionId,
        address: &str,
        options: ReceiverOptions,
        connection_options: &ConnectionOptions,
    ) -> Result<Self, ClientError> {
        let (link, items, queued) = attach_receiver_link(
            &control,
            session,
            address,
            &options,
            connection_options,
            false,
        )
        .await?;

        Ok(Self {
            control,
            link,
            shared,
            registry,
            items,
            queued,
            options,
            request_timeout: connection_options.request_timeout,
            drain_pending: false,
            detached: None,
        })
    }

    /// Receives the next delivery, waiting for it indefinitely.
    ///
    /// With `auto_accept` on, the accepted disposition is applied before
    /// the delivery is returned.
    pub async fn receive(&mut self) -> Result<Delivery, ClientError> {
        loop {
            if let Some(err) = &self.detached {
                return Err(err.clone());
            }
            let item = match self.items.recv().await {
                Some(item) => item,
                None => {
                    return Err(self
                        .shared
                        .failure_cause()
                        .unwrap_or_else(ClientError::dropped))
                }
            };
            match item {
                ReceiverItem::Delivery(raw) => {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    let mut delivery = self.make_delivery(raw)?;
                    if self.options.auto_accept {
                        delivery.accept().await?;
                    }
                    self.replenish().await;
                    return Ok(delivery);
                }
                // An aborted delivery is discarded silently; keep waiting
                ReceiverItem::Aborted(_) => continue,
                // Chunks only flow on streaming links
                ReceiverItem::Chunk(_) => continue,
                ReceiverItem::Detached { closed, error } => {
                    let err = ClientError::LinkDetached { closed, error };
                    self.detached = Some(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Receives the next delivery, or `None` when the timeout elapses.
    pub async fn receive_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Delivery>, ClientError> {
        match tokio::time::timeout(timeout, self.receive()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Grants the sender `credit` more deliveries.
    ///
    /// Illegal when a credit window is configured or while a drain is in
    /// progress.
    pub async fn add_credit(&mut self, credit: u32) -> Result<(), ClientError> {
        if self.options.credit_window > 0 {
            return Err(ClientError::illegal_state(
                "manual credit with a credit window configured",
            ));
        }
        if self.drain_pending {
            return Err(ClientError::illegal_state("credit while drain is pending"));
        }
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::AddCredit {
                link: self.link,
                credit,
                responder: tx,
            })
            .await
            .map_err(|_| ClientError::dropped())?;
        rx.await.map_err(|_| ClientError::dropped())?
    }

    /// Drains outstanding credit: completes once link credit reaches
    /// zero, whether through deliveries or the sender's flow echo.
    pub async fn drain(&mut self) -> Result<(), ClientError> {
        self.drain_pending = true;
        let result = self.drain_inner().await;
        self.drain_pending = false;
        result
    }

    async fn drain_inner(&mut self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Drain {
                link: self.link,
                responder: tx,
            })
            .await
            .map_err(|_| ClientError::dropped())?;
        with_timeout("drain", self.options.drain_timeout, async {
            rx.await.map_err(|_| ClientError::dropped())?
        })
        .await
    }

    /// Detaches the link without closing it.
    pub async fn detach(&mut self) -> Result<(), ClientError> {
        detach_link(&self.control, self.link, false, self.request_timeout).await
    }

    /// Closes the link.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        detach_link(&self.control, self.link, true, self.request_timeout).await
    }

    fn make_delivery(&self, raw: RawDelivery) -> Result<Delivery, ClientError> {
        let message = Message::decode(&self.registry, &raw.payload)
            .map_err(|err| ClientError::Engine(EngineError::Codec(err)))?;
        Ok(Delivery::new(
            self.control.clone(),
            self.link,
            raw.delivery_id,
            raw.delivery_tag,
            raw.message_format,
            raw.settled,
            raw.payload,
            message,
            // A delivery the peer sent settled needs no disposition
            raw.settled,
        ))
    }

    async fn replenish(&self) {
        if self.options.credit_window > 0 {
            let _ = self
                .control
                .send(Control::ReplenishWindow { link: self.link })
                .await;
        }
    }
}

pub(crate) async fn attach_receiver_link(
    control: &mpsc::Sender<Control>,
    session: SessionId,
    address: &str,
    options: &ReceiverOptions,
    connection_options: &ConnectionOptions,
    streaming: bool,
) -> Result<
    (
        LinkId,
        mpsc::UnboundedReceiver<ReceiverItem>,
        Arc<AtomicU32>,
    ),
    ClientError,
> {
    let name = options.link_name.clone().unwrap_or_else(|| {
        let kind = if streaming { "stream-receiver" } else { "receiver" };
        format!("{}-{}", kind, uuid::Uuid::new_v4())
    });
    let snd_settle_mode = match options.delivery_mode {
        DeliveryMode::AtMostOnce => SenderSettleMode::Settled,
        DeliveryMode::AtLeastOnce => SenderSettleMode::Unsettled,
    };

    let config = LinkConfig {
        name,
        role: Role::Receiver,
        snd_settle_mode,
        rcv_settle_mode: ReceiverSettleMode::First,
        source: Some(build_source(Some(address), &options.source)),
        target: Some(build_target(None, &options.target)),
        max_message_size: None,
        streaming,
    };

    let (items_tx, items_rx) = mpsc::unbounded_channel();
    let queued = Arc::new(AtomicU32::new(0));
    let registration = ReceiverRegistration {
        items: items_tx,
        queued: queued.clone(),
        credit_window: options.credit_window,
    };

    let (tx, rx) = oneshot::channel();
    control
        .send(Control::Attach {
            session,
            config,
            registration: Some(registration),
            auto_settle: true,
            responder: tx,
        })
        .await
        .map_err(|_| ClientError::dropped())?;
    let link = with_timeout("attach link", connection_options.request_timeout, async {
        rx.await.map_err(|_| ClientError::dropped())?
    })
    .await?;

    Ok((link, items_rx, queued))
}
