//! Streaming senders and receivers.
//!
//! A streaming send writes a large message as a series of Data-section
//! chunks, one transfer per chunk; closing the stream marks the final
//! transfer. A streaming receive reads transfer payload slices as they
//! arrive instead of waiting for reassembly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use hematite_amqp_types::codec::write_value;
use hematite_amqp_types::definitions::{
    DeliveryNumber, DeliveryTag, ReceiverSettleMode, Role, SenderSettleMode,
};
use hematite_amqp_types::messaging::{Data, DeliveryState, Outcome, MESSAGE_FORMAT};
use hematite_amqp_types::Value;
use tokio::sync::{mpsc, oneshot};

use crate::control::{Control, ReceiverItem};
use crate::engine::{LinkConfig, LinkId, SessionId};
use crate::Payload;

use super::driver::ConnShared;
use super::error::ClientError;
use super::options::{ConnectionOptions, DeliveryMode, ReceiverOptions, SenderOptions};
use super::receiver::attach_receiver_link;
use super::sender::{build_source, build_target, attach_link, detach_link};
use super::tracker::TrackerShared;
use super::with_timeout;

/// A sender link for streamed messages.
#[derive(Debug)]
pub struct StreamSender {
    control: mpsc::Sender<Control>,
    link: LinkId,
    delivery_mode: DeliveryMode,
    request_timeout: Option<Duration>,
}

impl StreamSender {
    pub(crate) async fn attach(
        control: mpsc::Sender<Control>,
        _shared: Arc<ConnShared>,
        session: SessionId,
        address: &str,
        options: SenderOptions,
        connection_options: &ConnectionOptions,
    ) -> Result<Self, ClientError> {
        let name = options
            .link_name
            .clone()
            .unwrap_or_else(|| format!("stream-sender-{}", uuid::Uuid::new_v4()));
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
            delivery_mode: options.delivery_mode,
            request_timeout: connection_options.request_timeout,
        })
    }

    /// Begins a streamed message. One streamed message is in flight per
    /// sender at a time.
    pub async fn begin_message(&self) -> Result<StreamSenderMessage, ClientError> {
        let settled = matches!(self.delivery_mode, DeliveryMode::AtMostOnce);
        let shared = Arc::new(TrackerShared::default());
        let (settlement_tx, settlement_rx) = oneshot::channel();
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::StreamOpen {
                link: self.link,
                message_format: MESSAGE_FORMAT,
                settled,
                shared: shared.clone(),
                settlement: settlement_tx,
                responder: tx,
            })
            .await
            .map_err(|_| ClientError::dropped())?;
        rx.await.map_err(|_| ClientError::dropped())??;

        Ok(StreamSenderMessage {
            control: self.control.clone(),
            link: self.link,
            shared,
            settlement: Some(settlement_rx),
            finished: false,
        })
    }

    /// Closes the link.
    pub async fn close(&self) -> Result<(), ClientError> {
        detach_link(&self.control, self.link, true, self.request_timeout).await
    }
}

/// An in-progress streamed message: a byte sink whose writes become
/// Data sections across multiple transfers.
#[derive(Debug)]
pub struct StreamSenderMessage {
    control: mpsc::Sender<Control>,
    link: LinkId,
    shared: Arc<TrackerShared>,
    settlement: Option<oneshot::Receiver<Result<Option<DeliveryState>, ClientError>>>,
    finished: bool,
}

impl StreamSenderMessage {
    /// Writes one chunk, framed as a Data section in its own transfer.
    pub async fn write_chunk(&mut self, chunk: impl Into<Bytes>) -> Result<(), ClientError> {
        if self.finished {
            return Err(ClientError::illegal_state("streamed message is finished"));
        }
        let mut payload = BytesMut::new();
        write_value(&mut payload, &Value::from(Data(chunk.into())));
        self.chunk_inner(payload.freeze(), true, false).await
    }

    /// Marks the final transfer and returns the tracker for settlement.
    pub async fn complete(mut self) -> Result<StreamTracker, ClientError> {
        self.finished = true;
        self.chunk_inner(Payload::new(), false, false).await?;
        Ok(StreamTracker {
            shared: self.shared.clone(),
            settlement: self.settlement.take(),
            outcome: None,
        })
    }

    /// Aborts the streamed message; the receiver discards it.
    pub async fn abort(mut self) -> Result<(), ClientError> {
        self.finished = true;
        self.chunk_inner(Payload::new(), false, true).await
    }

    async fn chunk_inner(
        &mut self,
        payload: Payload,
        more: bool,
        aborted: bool,
    ) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::StreamChunk {
                link: self.link,
                payload,
                more,
                aborted,
                responder: tx,
            })
            .await
            .map_err(|_| ClientError::dropped())?;
        rx.await.map_err(|_| ClientError::dropped())?
    }
}

/// Settlement handle for a completed streamed message.
#[derive(Debug)]
pub struct StreamTracker {
    shared: Arc<TrackerShared>,
    settlement: Option<oneshot::Receiver<Result<Option<DeliveryState>, ClientError>>>,
    outcome: Option<Result<Option<DeliveryState>, ClientError>>,
}

impl StreamTracker {
    /// The delivery state most recently reported by the peer.
    pub fn remote_state(&self) -> Option<DeliveryState> {
        self.shared.state.lock().remote_state.clone()
    }

    /// Whether the peer has settled the delivery.
    pub fn remote_settled(&self) -> bool {
        self.shared.state.lock().remote_settled
    }

    /// Waits for the peer to settle the delivery.
    pub async fn await_settlement(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<DeliveryState>, ClientError> {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let settlement = self
            .settlement
            .take()
            .ok_or_else(|| ClientError::illegal_state("settlement already awaited"))?;
        let outcome = with_timeout("await settlement", timeout, async {
            settlement.await.map_err(|_| ClientError::dropped())?
        })
        .await;
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Waits for settlement and fails unless the outcome is accepted.
    pub async fn await_accepted(&mut self, timeout: Option<Duration>) -> Result<(), ClientError> {
        let state = self.await_settlement(timeout).await?;
        match &state {
            Some(state) if state.is_accepted() => Ok(()),
            None => Ok(()),
            _ => Err(ClientError::DeliveryState { state }),
        }
    }
}

/// A receiver link delivering transfer payload slices as they arrive.
#[derive(Debug)]
pub struct StreamReceiver {
    control: mpsc::Sender<Control>,
    link: LinkId,
    shared: Arc<ConnShared>,
    items: mpsc::UnboundedReceiver<ReceiverItem>,
    queued: Arc<AtomicU32>,
    options: ReceiverOptions,
    request_timeout: Option<Duration>,
    detached: Option<ClientError>,
}

impl StreamReceiver {
    pub(crate) async fn attach(
        control: mpsc::Sender<Control>,
        shared: Arc<ConnShared>,
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
            true,
        )
        .await?;
        Ok(Self {
            control,
            link,
            shared,
            items,
            queued,
            options,
            request_timeout: connection_options.request_timeout,
            detached: None,
        })
    }

    /// Waits for the next incoming streamed delivery: resolves on its
    /// first transfer.
    pub async fn receive(&mut self) -> Result<StreamDelivery<'_>, ClientError> {
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
                ReceiverItem::Chunk(chunk) if chunk.first => {
                    let delivery_id = chunk.delivery_id;
                    let delivery_tag = chunk.delivery_tag.clone().unwrap_or_default();
                    let done = !chunk.more;
                    if done {
                        self.queued.fetch_sub(1, Ordering::SeqCst);
                    }
                    let pending = Some(chunk.payload);
                    return Ok(StreamDelivery {
                        receiver: self,
                        delivery_id,
                        delivery_tag,
                        pending,
                        done,
                        disposed: false,
                    });
                }
                // Continuation chunks without a live StreamDelivery
                // belong to a delivery the application dropped
                ReceiverItem::Chunk(_) => continue,
                ReceiverItem::Delivery(_) => continue,
                ReceiverItem::Aborted(_) => continue,
                ReceiverItem::Detached { closed, error } => {
                    let err = ClientError::LinkDetached { closed, error };
                    self.detached = Some(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Grants the sender `credit` more deliveries.
    pub async fn add_credit(&mut self, credit: u32) -> Result<(), ClientError> {
        if self.options.credit_window > 0 {
            return Err(ClientError::illegal_state(
                "manual credit with a credit window configured",
            ));
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

    /// Closes the link.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        detach_link(&self.control, self.link, true, self.request_timeout).await
    }
}

/// An incoming streamed delivery: an input byte source that yields each
/// transfer's payload slice, ending at the final transfer.
#[derive(Debug)]
pub struct StreamDelivery<'r> {
    receiver: &'r mut StreamReceiver,
    delivery_id: DeliveryNumber,
    delivery_tag: DeliveryTag,
    pending: Option<Payload>,
    done: bool,
    disposed: bool,
}

impl StreamDelivery<'_> {
    /// The delivery-id the peer assigned.
    pub fn delivery_id(&self) -> DeliveryNumber {
        self.delivery_id
    }

    /// The delivery-tag the peer assigned.
    pub fn delivery_tag(&self) -> &DeliveryTag {
        &self.delivery_tag
    }

    /// The next payload slice, or `None` after the final transfer.
    pub async fn next_chunk(&mut self) -> Result<Option<Payload>, ClientError> {
        if let Some(chunk) = self.pending.take() {
            return Ok(Some(chunk));
        }
        if self.done {
            return Ok(None);
        }
        loop {
            let item = match self.receiver.items.recv().await {
                Some(item) => item,
                None => {
                    return Err(self
                        .receiver
                        .shared
                        .failure_cause()
                        .unwrap_or_else(ClientError::dropped))
                }
            };
            match item {
                ReceiverItem::Chunk(chunk) => {
                    if !chunk.more {
                        self.done = true;
                        self.receiver.queued.fetch_sub(1, Ordering::SeqCst);
                    }
                    return Ok(Some(chunk.payload));
                }
                ReceiverItem::Aborted(delivery_id) if delivery_id == self.delivery_id => {
                    self.done = true;
                    return Err(ClientError::DeliveryAborted);
                }
                ReceiverItem::Aborted(_) => continue,
                ReceiverItem::Delivery(_) => continue,
                ReceiverItem::Detached { closed, error } => {
                    let err = ClientError::LinkDetached { closed, error };
                    self.receiver.detached = Some(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Applies an outcome and settles the delivery.
    pub async fn dispose(&mut self, outcome: Outcome) -> Result<(), ClientError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        let (tx, rx) = oneshot::channel();
        self.receiver
            .control
            .send(Control::Dispose {
                link: self.receiver.link,
                delivery_id: self.delivery_id,
                settled: true,
                state: Some(DeliveryState::from(outcome)),
                responder: Some(tx),
            })
            .await
            .map_err(|_| ClientError::dropped())?;
        rx.await.map_err(|_| ClientError::dropped())?
    }

    /// Accepts and settles the delivery.
    pub async fn accept(&mut self) -> Result<(), ClientError> {
        self.dispose(Outcome::accepted()).await
    }
}
