//! Session state and window arithmetic.

use std::collections::{BTreeMap, HashMap};

use hematite_amqp_types::definitions::{DeliveryNumber, Handle, TransferNumber};
use hematite_amqp_types::performatives::{Begin, Flow};
use slab::Slab;

use super::link::LinkInner;
use super::SendId;

/// Default incoming and outgoing window, in transfer frames.
pub const DEFAULT_WINDOW: u32 = 2048;

/// 2.5.5 Session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// UNMAPPED
    Unmapped,

    /// BEGIN SENT
    BeginSent,

    /// MAPPED
    Mapped,

    /// END SENT
    EndSent,

    /// Session ended
    Ended,
}

pub(crate) struct SessionInner {
    pub state: SessionState,
    pub outgoing_channel: u16,
    pub remote_channel: Option<u16>,

    pub next_outgoing_id: TransferNumber,
    pub incoming_window: u32,
    pub outgoing_window: u32,

    pub next_incoming_id: TransferNumber,
    pub remote_incoming_window: u32,
    pub remote_outgoing_window: u32,

    pub links: Slab<LinkInner>,
    pub link_by_name: HashMap<String, usize>,
    pub link_by_input_handle: HashMap<u32, usize>,

    // Unsettled outgoing deliveries, for routing incoming dispositions
    // back to the owning link.
    pub outgoing_unsettled: BTreeMap<DeliveryNumber, (usize, SendId)>,
}

impl std::fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInner")
            .field("state", &self.state)
            .field("outgoing_channel", &self.outgoing_channel)
            .field("remote_channel", &self.remote_channel)
            .field("next_outgoing_id", &self.next_outgoing_id)
            .field("next_incoming_id", &self.next_incoming_id)
            .field("remote_incoming_window", &self.remote_incoming_window)
            .finish_non_exhaustive()
    }
}

impl SessionInner {
    pub fn new(outgoing_channel: u16) -> Self {
        Self {
            state: SessionState::Unmapped,
            outgoing_channel,
            remote_channel: None,
            next_outgoing_id: 0,
            incoming_window: DEFAULT_WINDOW,
            outgoing_window: DEFAULT_WINDOW,
            next_incoming_id: 0,
            remote_incoming_window: 0,
            remote_outgoing_window: 0,
            links: Slab::new(),
            link_by_name: HashMap::new(),
            link_by_input_handle: HashMap::new(),
            outgoing_unsettled: BTreeMap::new(),
        }
    }

    /// The Begin announcing this session.
    pub fn local_begin(&self) -> Begin {
        Begin {
            remote_channel: None,
            next_outgoing_id: self.next_outgoing_id,
            incoming_window: self.incoming_window,
            outgoing_window: self.outgoing_window,
            handle_max: Handle::default(),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    /// Applies the peer's Begin.
    pub fn apply_remote_begin(&mut self, channel: u16, begin: &Begin) {
        self.remote_channel = Some(channel);
        self.next_incoming_id = begin.next_outgoing_id;
        self.remote_incoming_window = begin.incoming_window;
        self.remote_outgoing_window = begin.outgoing_window;
        self.state = SessionState::Mapped;
    }

    /// Applies the session fields of an incoming Flow.
    pub fn apply_remote_flow(&mut self, flow: &Flow) {
        self.next_incoming_id = flow.next_outgoing_id;
        self.remote_outgoing_window = flow.outgoing_window;

        match flow.next_incoming_id {
            Some(flow_next_incoming_id) => {
                self.remote_incoming_window = flow_next_incoming_id
                    .wrapping_add(flow.incoming_window)
                    .wrapping_sub(self.next_outgoing_id);
            }
            None => {
                // The peer has not seen any of our transfers yet, so its
                // window is anchored at our initial outgoing id of 0.
                self.remote_incoming_window =
                    flow.incoming_window.wrapping_sub(self.next_outgoing_id);
            }
        }
    }

    /// Session fields for an outgoing Flow.
    pub fn session_flow(&self) -> Flow {
        Flow {
            next_incoming_id: Some(self.next_incoming_id),
            incoming_window: self.incoming_window,
            next_outgoing_id: self.next_outgoing_id,
            outgoing_window: self.outgoing_window,
            ..Default::default()
        }
    }

    /// Accounts for one outgoing transfer frame.
    pub fn consume_outgoing_window(&mut self) {
        self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
        self.remote_incoming_window = self.remote_incoming_window.saturating_sub(1);
    }

    /// Accounts for one incoming transfer frame. Returns a replenishing
    /// Flow when the local window has dropped below half.
    pub fn consume_incoming_window(&mut self) -> Option<Flow> {
        self.next_incoming_id = self.next_incoming_id.wrapping_add(1);
        self.remote_outgoing_window = self.remote_outgoing_window.saturating_sub(1);
        self.incoming_window = self.incoming_window.saturating_sub(1);

        if self.incoming_window <= DEFAULT_WINDOW / 2 {
            self.incoming_window = DEFAULT_WINDOW;
            return Some(self.session_flow());
        }
        None
    }

    pub fn link_index_by_input_handle(&self, handle: &Handle) -> Option<usize> {
        self.link_by_input_handle.get(&handle.0).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_begin_seeds_windows() {
        let mut session = SessionInner::new(0);
        let begin = Begin {
            remote_channel: Some(0),
            next_outgoing_id: 7,
            incoming_window: 100,
            outgoing_window: 50,
            handle_max: Handle::default(),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        session.apply_remote_begin(5, &begin);
        assert_eq!(session.remote_channel, Some(5));
        assert_eq!(session.next_incoming_id, 7);
        assert_eq!(session.remote_incoming_window, 100);
        assert_eq!(session.state, SessionState::Mapped);
    }

    #[test]
    fn incoming_transfer_advances_ids_monotonically() {
        let mut session = SessionInner::new(0);
        session.apply_remote_begin(
            0,
            &Begin {
                remote_channel: None,
                next_outgoing_id: 0,
                incoming_window: 10,
                outgoing_window: 10,
                handle_max: Handle::default(),
                offered_capabilities: None,
                desired_capabilities: None,
                properties: None,
            },
        );
        for expected in 0..5u32 {
            assert_eq!(session.next_incoming_id, expected);
            session.consume_incoming_window();
        }
    }

    #[test]
    fn flow_reanchors_remote_incoming_window() {
        let mut session = SessionInner::new(0);
        session.next_outgoing_id = 4;
        let flow = Flow {
            next_incoming_id: Some(2),
            incoming_window: 10,
            next_outgoing_id: 0,
            outgoing_window: 100,
            ..Default::default()
        };
        session.apply_remote_flow(&flow);
        // peer will accept ids [2, 12); we are at 4, so 8 remain
        assert_eq!(session.remote_incoming_window, 8);
    }
}
