use hematite_amqp_types::definitions::{
    self, DeliveryNumber, DeliveryTag, MessageFormat,
};
use hematite_amqp_types::messaging::DeliveryState;

use crate::Payload;

use super::{LinkId, SendId, SessionId};

/// Protocol events surfaced by the engine, drained by the driver.
#[derive(Debug)]
pub enum EngineEvent {
    /// The open handshake completed.
    Opened,

    /// The connection reached its end state.
    ///
    /// `remote` is true when the peer initiated the close. A
    /// simultaneous close on both sides reports the locally initiated
    /// form; either way the close completes successfully.
    Closed {
        /// Error the peer attached to its Close, if any.
        error: Option<definitions::Error>,
        /// Whether the close was initiated by the peer.
        remote: bool,
    },

    /// The begin handshake for a session completed.
    SessionBegun {
        /// The session.
        session: SessionId,
    },

    /// A session reached its unmapped state.
    SessionEnded {
        /// The session.
        session: SessionId,
        /// Error the peer attached to its End, if any.
        error: Option<definitions::Error>,
        /// Whether the end was initiated by the peer.
        remote: bool,
    },

    /// The attach handshake for a link completed with a live terminus.
    LinkAttached {
        /// The link.
        link: LinkId,
    },

    /// A link was detached.
    ///
    /// An attach answered with a null terminus followed by a detach
    /// surfaces here too; the driver maps it to a link-open failure.
    LinkDetached {
        /// The link.
        link: LinkId,
        /// True for a closing detach.
        closed: bool,
        /// Error the peer attached, if any.
        error: Option<definitions::Error>,
        /// Whether the detach was initiated by the peer.
        remote: bool,
    },

    /// A drain cycle completed: link credit reached zero.
    DrainCompleted {
        /// The link.
        link: LinkId,
    },

    /// A queued send went out on the wire.
    TransferSent {
        /// The link.
        link: LinkId,
        /// Identifier returned by [`super::Engine::send`].
        send_id: SendId,
        /// Delivery-id assigned on the first transfer frame.
        delivery_id: DeliveryNumber,
        /// Whether the delivery was sent pre-settled.
        settled: bool,
    },

    /// The peer changed the state of an outgoing delivery.
    Disposition {
        /// The link.
        link: LinkId,
        /// The delivery the state applies to.
        delivery_id: DeliveryNumber,
        /// The reported state, if any.
        state: Option<DeliveryState>,
        /// Whether the peer settled the delivery.
        settled: bool,
    },

    /// An incoming delivery completed reassembly.
    DeliveryReady {
        /// The link.
        link: LinkId,
        /// The reassembled delivery.
        delivery: RawDelivery,
    },

    /// A payload slice arrived on a streaming receiver link.
    DeliveryChunk {
        /// The link.
        link: LinkId,
        /// The slice.
        chunk: DeliveryChunk,
    },

    /// The peer aborted an in-flight incoming delivery.
    DeliveryAborted {
        /// The link.
        link: LinkId,
        /// The aborted delivery.
        delivery_id: DeliveryNumber,
    },
}

/// A fully reassembled incoming delivery, payload still undecoded.
#[derive(Debug)]
pub struct RawDelivery {
    /// Delivery-id assigned by the peer.
    pub delivery_id: DeliveryNumber,

    /// Delivery-tag assigned by the peer.
    pub delivery_tag: DeliveryTag,

    /// Message format code from the first transfer.
    pub message_format: MessageFormat,

    /// Whether the peer sent the delivery settled.
    pub settled: bool,

    /// Concatenation of the transfer payload slices.
    pub payload: Payload,
}

/// One transfer's payload slice on a streaming receiver link.
#[derive(Debug)]
pub struct DeliveryChunk {
    /// Delivery-id of the delivery the slice belongs to.
    pub delivery_id: DeliveryNumber,

    /// Delivery-tag, present on the first slice.
    pub delivery_tag: Option<DeliveryTag>,

    /// Whether this is the first slice of the delivery.
    pub first: bool,

    /// The payload slice.
    pub payload: Payload,

    /// Whether more slices follow.
    pub more: bool,
}
