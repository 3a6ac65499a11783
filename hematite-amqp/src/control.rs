//! Control messages from client handles to the connection driver.

use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use hematite_amqp_types::definitions::{self, DeliveryNumber, MessageFormat};
use hematite_amqp_types::messaging::DeliveryState;
use tokio::sync::{mpsc, oneshot};

use crate::client::error::ClientError;
use crate::client::tracker::TrackerShared;
use crate::engine::{DeliveryChunk, LinkConfig, LinkId, RawDelivery, SessionId};
use crate::Payload;

/// Completion channel for one control operation.
pub(crate) type Responder<T> = oneshot::Sender<Result<T, ClientError>>;

/// What the driver pushes into a receiver handle's queue.
#[derive(Debug)]
pub(crate) enum ReceiverItem {
    /// A reassembled delivery.
    Delivery(RawDelivery),

    /// A payload slice on a streaming link.
    Chunk(DeliveryChunk),

    /// An in-flight delivery was aborted by the peer.
    Aborted(DeliveryNumber),

    /// The link went away.
    Detached {
        closed: bool,
        error: Option<definitions::Error>,
    },
}

/// Receiver-side state the driver needs for routing and credit.
#[derive(Debug)]
pub(crate) struct ReceiverRegistration {
    pub items: mpsc::UnboundedSender<ReceiverItem>,
    /// Deliveries buffered but not yet handed to the application.
    pub queued: Arc<AtomicU32>,
    pub credit_window: u32,
}

#[derive(Debug)]
pub(crate) enum Control {
    BeginSession {
        responder: Responder<SessionId>,
    },
    EndSession {
        session: SessionId,
        error: Option<definitions::Error>,
        responder: Responder<()>,
    },
    Attach {
        session: SessionId,
        config: LinkConfig,
        /// Present when the link is a receiver.
        registration: Option<ReceiverRegistration>,
        /// Settle remotely-disposed deliveries automatically.
        auto_settle: bool,
        responder: Responder<LinkId>,
    },
    Detach {
        link: LinkId,
        closed: bool,
        error: Option<definitions::Error>,
        responder: Responder<()>,
    },
    Send {
        link: LinkId,
        payload: Payload,
        message_format: MessageFormat,
        settled: bool,
        shared: Arc<TrackerShared>,
        /// Completes when the transfer is emitted (credit granted).
        sent: Responder<DeliveryNumber>,
        /// Completes on remote settlement.
        settlement: Responder<Option<DeliveryState>>,
    },
    StreamOpen {
        link: LinkId,
        message_format: MessageFormat,
        settled: bool,
        shared: Arc<TrackerShared>,
        settlement: Responder<Option<DeliveryState>>,
        responder: Responder<()>,
    },
    StreamChunk {
        link: LinkId,
        payload: Payload,
        more: bool,
        aborted: bool,
        responder: Responder<()>,
    },
    Dispose {
        link: LinkId,
        delivery_id: DeliveryNumber,
        settled: bool,
        state: Option<DeliveryState>,
        responder: Option<Responder<()>>,
    },
    AddCredit {
        link: LinkId,
        credit: u32,
        responder: Responder<()>,
    },
    Drain {
        link: LinkId,
        responder: Responder<()>,
    },
    /// Re-run the credit-window policy for a receiver link.
    ReplenishWindow {
        link: LinkId,
    },
    Close {
        error: Option<definitions::Error>,
        responder: Responder<Option<definitions::Error>>,
    },
}
