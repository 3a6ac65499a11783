//! Link state and flow state.

use std::collections::VecDeque;

use hematite_amqp_types::buffer::Composite;
use hematite_amqp_types::definitions::{
    DeliveryNumber, DeliveryTag, Handle, MessageFormat, ReceiverSettleMode, Role,
    SenderSettleMode, SequenceNo,
};
use hematite_amqp_types::messaging::{Source, Target};
use hematite_amqp_types::performatives::Flow;

use crate::Payload;

use super::SendId;

/// Link state.
///
/// There is no official definition of link state in the specification;
/// these mirror the attach/detach handshake the way connection and
/// session states mirror theirs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// The initial state after initialization.
    Unattached,

    /// An attach frame has been sent.
    AttachSent,

    /// The link is attached.
    Attached,

    /// A detach frame has been sent.
    DetachSent,

    /// The link is detached or closed.
    Detached,
}

/// Configuration for a link created by [`super::Engine::attach`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Link name, unique per direction per session pair.
    pub name: String,

    /// Local role.
    pub role: Role,

    /// Sender settle mode proposed on attach.
    pub snd_settle_mode: SenderSettleMode,

    /// Receiver settle mode proposed on attach.
    pub rcv_settle_mode: ReceiverSettleMode,

    /// Source terminus.
    pub source: Option<Source>,

    /// Target terminus.
    pub target: Option<Target>,

    /// Largest message this endpoint accepts.
    pub max_message_size: Option<u64>,

    /// Deliver payload slices as they arrive instead of reassembling.
    pub streaming: bool,
}

pub(crate) struct PendingSend {
    pub send_id: SendId,
    pub payload: Payload,
    pub message_format: MessageFormat,
    pub settled: bool,
}

/// An outgoing streaming delivery in progress.
pub(crate) struct OutgoingStream {
    pub send_id: SendId,
    pub delivery_id: Option<DeliveryNumber>,
    pub message_format: MessageFormat,
    pub settled: bool,
    pub chunks: VecDeque<StreamChunk>,
}

/// One queued chunk of an outgoing streaming delivery.
pub(crate) struct StreamChunk {
    pub payload: Payload,
    pub more: bool,
    pub aborted: bool,
}

/// An incoming delivery that has not seen its final transfer yet.
pub(crate) struct IncompleteDelivery {
    pub delivery_id: DeliveryNumber,
    pub delivery_tag: DeliveryTag,
    pub message_format: MessageFormat,
    pub settled: bool,
    pub payload: Composite,
}

pub(crate) struct LinkInner {
    pub name: String,
    pub role: Role,
    pub state: LinkState,
    pub output_handle: Handle,
    pub input_handle: Option<Handle>,
    pub snd_settle_mode: SenderSettleMode,
    pub rcv_settle_mode: ReceiverSettleMode,
    pub source: Option<Source>,
    pub target: Option<Target>,
    pub max_message_size: Option<u64>,
    pub streaming: bool,

    // Flow state. For a sender, delivery_count is this endpoint's count
    // and link_credit is what the peer granted. For a receiver,
    // delivery_count tracks the sender's count and link_credit is what
    // this endpoint granted.
    pub delivery_count: SequenceNo,
    pub link_credit: u32,
    pub drain: bool,

    pub next_tag: u64,
    pub pending_sends: VecDeque<PendingSend>,
    pub outgoing_stream: Option<OutgoingStream>,
    pub incomplete: Option<IncompleteDelivery>,

    // Peer answered the attach with a null terminus; a detach carrying
    // the refusal error is expected next.
    pub refused: bool,
}

impl std::fmt::Debug for LinkInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkInner")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("output_handle", &self.output_handle)
            .field("input_handle", &self.input_handle)
            .field("delivery_count", &self.delivery_count)
            .field("link_credit", &self.link_credit)
            .field("drain", &self.drain)
            .finish_non_exhaustive()
    }
}

impl LinkInner {
    pub fn new(config: LinkConfig, output_handle: Handle) -> Self {
        Self {
            name: config.name,
            role: config.role,
            state: LinkState::Unattached,
            output_handle,
            input_handle: None,
            snd_settle_mode: config.snd_settle_mode,
            rcv_settle_mode: config.rcv_settle_mode,
            source: config.source,
            target: config.target,
            max_message_size: config.max_message_size,
            streaming: config.streaming,
            delivery_count: 0,
            link_credit: 0,
            drain: false,
            next_tag: 0,
            pending_sends: VecDeque::new(),
            outgoing_stream: None,
            incomplete: None,
            refused: false,
        }
    }

    /// Allocates the next delivery-tag for an outgoing delivery.
    pub fn allocate_tag(&mut self) -> DeliveryTag {
        let tag = self.next_tag.to_be_bytes();
        self.next_tag = self.next_tag.wrapping_add(1);
        DeliveryTag::copy_from_slice(&tag)
    }

    /// Applies the link fields of an incoming flow to a sender link.
    ///
    /// Returns true when the peer requested a drain, which the sender
    /// answers by advancing its delivery-count over the unused credit.
    pub fn apply_sender_flow(&mut self, flow: &Flow) -> bool {
        if let Some(link_credit) = flow.link_credit {
            let flow_delivery_count = flow.delivery_count.unwrap_or(0);
            self.link_credit = flow_delivery_count
                .wrapping_add(link_credit)
                .wrapping_sub(self.delivery_count);
        }
        self.drain = flow.drain;
        flow.drain
    }

    /// Consumes all remaining credit to answer a drain request.
    pub fn drain_credit(&mut self) {
        self.delivery_count = self.delivery_count.wrapping_add(self.link_credit);
        self.link_credit = 0;
        self.drain = false;
    }
}
