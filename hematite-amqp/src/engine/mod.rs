//! The sans-I/O protocol engine.
//!
//! The engine owns the Connection → Sessions → Links → Deliveries state
//! tree (arena-indexed, no cross-references) and is driven entirely by
//! its caller, one thread at a time:
//!
//! - [`Engine::ingest`] feeds it transport bytes and totally consumes
//!   complete frames from the input buffer,
//! - [`Engine::drain_outbound`] moves queued outbound frames into a
//!   write buffer,
//! - [`Engine::poll_event`] yields protocol events for the client layer,
//! - [`Engine::handle_timer`] drives idle-timeout and heartbeats from an
//!   explicit clock.
//!
//! No sockets, no tasks, no clocks of its own; the client's driver task
//! supplies all three.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use hematite_amqp_types::buffer::Composite;
use hematite_amqp_types::definitions::{
    self, DeliveryNumber, Fields, Handle, MessageFormat, Milliseconds, Role, MIN_MAX_FRAME_SIZE,
};
use hematite_amqp_types::messaging::DeliveryState;
use hematite_amqp_types::performatives::{
    Attach, Begin, ChannelMax, Close, Detach, Disposition, End, Flow, MaxFrameSize, Open,
    Performative, Transfer,
};
use hematite_amqp_types::registry::Registry;
use slab::Slab;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::frames::{Frame, FrameBody, FrameCodec};
use crate::Payload;

mod error;
mod event;
mod link;
mod session;

pub use error::EngineError;
pub use event::{DeliveryChunk, EngineEvent, RawDelivery};
pub use link::{LinkConfig, LinkState};
pub use session::SessionState;

use link::{IncompleteDelivery, LinkInner, OutgoingStream, PendingSend, StreamChunk};
use session::SessionInner;

/// Identifier of a session within one engine.
pub type SessionId = usize;

/// Identifier of a queued send, for correlating [`EngineEvent::TransferSent`].
pub type SendId = u64;

/// Identifier of a link within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId {
    /// The owning session.
    pub session: SessionId,

    /// Index of the link within the session.
    pub link: usize,
}

/// Connection states as defined in the AMQP 1.0 specification Part 2.4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing has been sent or received.
    Start,

    /// The connection header has been sent, nothing received.
    HeaderSent,

    /// The connection header has been received, none sent.
    HeaderReceived,

    /// Connection headers have been exchanged both ways.
    HeaderExchange,

    /// An open frame has been sent, none received.
    OpenSent,

    /// An open frame has been received, none sent.
    OpenReceived,

    /// Open frames have been exchanged both ways.
    Opened,

    /// A close frame has been sent; writing anything further is illegal.
    CloseSent,

    /// A close frame has been received; no further frames are expected.
    CloseReceived,

    /// A close was sent because of an error; incoming frames are
    /// silently discarded until the peer's close arrives.
    Discarding,

    /// The connection is finished.
    End,
}

/// Parameters of the local Open.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Container id announced in Open.
    pub container_id: String,

    /// Hostname announced in Open (virtual host).
    pub hostname: Option<String>,

    /// Largest frame this endpoint accepts.
    pub max_frame_size: u32,

    /// Highest channel number this endpoint will use.
    pub channel_max: u16,

    /// Idle timeout advertised to the peer, in milliseconds.
    pub idle_time_out: Option<Milliseconds>,

    /// Open properties.
    pub properties: Option<Fields>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            container_id: String::new(),
            hostname: None,
            max_frame_size: 65536,
            channel_max: u16::MAX,
            idle_time_out: None,
            properties: None,
        }
    }
}

// Conservative room for the transfer performative ahead of the payload
// inside one frame.
const TRANSFER_OVERHEAD: usize = 128;

/// The protocol engine for one connection.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<Registry>,
    codec: FrameCodec,

    state: ConnectionState,
    local_open: Open,
    remote_open: Option<Open>,
    channel_max: u16,
    remote_max_frame_size: usize,

    sessions: Slab<SessionInner>,
    session_by_remote_channel: HashMap<u16, SessionId>,

    outgoing: VecDeque<Frame>,
    events: VecDeque<EngineEvent>,
    failure: Option<EngineError>,
    next_send_id: SendId,

    last_incoming: Instant,
    last_outgoing: Instant,
    heartbeat_period: Option<Duration>,
    idle_deadline: Option<Duration>,
}

impl Engine {
    /// Creates an engine in the `Start` state.
    pub fn new(config: EngineConfig, now: Instant) -> Self {
        let registry = Arc::new(Registry::amqp());
        let codec = FrameCodec::new(registry.clone(), config.max_frame_size as usize);

        let local_open = Open {
            container_id: config.container_id,
            hostname: config.hostname,
            max_frame_size: MaxFrameSize(config.max_frame_size),
            channel_max: ChannelMax(config.channel_max),
            idle_time_out: config.idle_time_out,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: config.properties,
        };

        // Enforcement threshold for the locally advertised idle timeout
        let idle_deadline = config
            .idle_time_out
            .map(|millis| Duration::from_millis(millis as u64 * 2));

        Self {
            registry,
            codec,
            state: ConnectionState::Start,
            channel_max: local_open.channel_max.0,
            local_open,
            remote_open: None,
            remote_max_frame_size: MIN_MAX_FRAME_SIZE,
            sessions: Slab::new(),
            session_by_remote_channel: HashMap::new(),
            outgoing: VecDeque::new(),
            events: VecDeque::new(),
            failure: None,
            next_send_id: 0,
            last_incoming: now,
            last_outgoing: now,
            heartbeat_period: None,
            idle_deadline,
        }
    }

    /// The registry this engine decodes described types through.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The failure that killed the engine, if any.
    pub fn failure(&self) -> Option<&EngineError> {
        self.failure.as_ref()
    }

    /// The peer's Open, once received.
    pub fn remote_open(&self) -> Option<&Open> {
        self.remote_open.as_ref()
    }

    /// Next protocol event, if any.
    pub fn poll_event(&mut self) -> Option<EngineEvent> {
        self.events.pop_front()
    }

    /* ---------------------------- handshake ---------------------------- */

    /// Records that the protocol header went out.
    pub fn on_header_sent(&mut self) {
        if matches!(self.state, ConnectionState::Start) {
            self.state = ConnectionState::HeaderSent;
        }
    }

    /// Records that the matching remote header arrived.
    pub fn on_header_received(&mut self) {
        self.state = match self.state {
            ConnectionState::HeaderSent => ConnectionState::HeaderExchange,
            _ => ConnectionState::HeaderReceived,
        };
    }

    /// Queues the local Open.
    pub fn open(&mut self) -> Result<(), EngineError> {
        match self.state {
            ConnectionState::HeaderExchange => {
                self.queue(Frame::performative(
                    0,
                    Performative::Open(self.local_open.clone()),
                ));
                self.state = ConnectionState::OpenSent;
                Ok(())
            }
            _ => Err(EngineError::illegal_state("open before header exchange")),
        }
    }

    /// Queues a Close. Closing an already-closing connection is a no-op.
    pub fn close(&mut self, error: Option<definitions::Error>) {
        match self.state {
            ConnectionState::Opened | ConnectionState::OpenSent => {
                self.queue(Frame::performative(0, Performative::Close(Close { error })));
                self.state = ConnectionState::CloseSent;
            }
            ConnectionState::CloseReceived => {
                self.queue(Frame::performative(0, Performative::Close(Close { error })));
                self.state = ConnectionState::End;
            }
            _ => {}
        }
    }

    /// Fails the connection: records the failure, sends a Close carrying
    /// the mapped condition, and moves to the discarding state.
    pub fn fail(&mut self, error: EngineError) {
        if self.failure.is_some() {
            return;
        }
        debug!(%error, "engine failed");
        let close_error = definitions::Error::new(error.condition(), error.description(), None);
        self.failure = Some(error);
        if matches!(
            self.state,
            ConnectionState::HeaderExchange
                | ConnectionState::OpenSent
                | ConnectionState::OpenReceived
                | ConnectionState::Opened
        ) {
            self.queue(Frame::performative(
                0,
                Performative::Close(Close {
                    error: Some(close_error),
                }),
            ));
            self.state = ConnectionState::Discarding;
        }
    }

    /* ----------------------------- sessions ---------------------------- */

    /// Allocates the smallest free channel and queues a Begin on it.
    pub fn begin_session(&mut self) -> Result<SessionId, EngineError> {
        if !matches!(self.state, ConnectionState::Opened) {
            return Err(EngineError::illegal_state("begin on unopened connection"));
        }
        let remote_channel_max = self
            .remote_open
            .as_ref()
            .map(|open| open.channel_max.0)
            .unwrap_or(u16::MAX);
        let channel_max = self.channel_max.min(remote_channel_max);

        let entry = self.sessions.vacant_entry();
        let sid = entry.key();
        if sid > channel_max as usize {
            return Err(EngineError::Protocol {
                condition: definitions::AmqpError::ResourceLimitExceeded.into(),
                description: "channel-max reached".to_string(),
            });
        }
        let mut session = SessionInner::new(sid as u16);
        session.state = SessionState::BeginSent;
        let begin = session.local_begin();
        entry.insert(session);

        self.queue(Frame::performative(sid as u16, Performative::Begin(begin)));
        Ok(sid)
    }

    /// Queues an End for the session.
    pub fn end_session(&mut self, sid: SessionId, error: Option<definitions::Error>) {
        let Some(session) = self.sessions.get_mut(sid) else {
            return;
        };
        if matches!(session.state, SessionState::Mapped | SessionState::BeginSent) {
            session.state = SessionState::EndSent;
            let channel = session.outgoing_channel;
            self.queue(Frame::performative(channel, Performative::End(End { error })));
        }
    }

    /* ------------------------------ links ------------------------------ */

    /// Allocates a handle on the session and queues an Attach.
    pub fn attach(&mut self, sid: SessionId, config: LinkConfig) -> Result<LinkId, EngineError> {
        let session = self
            .sessions
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found("session"))?;
        if session.state != SessionState::Mapped {
            return Err(EngineError::illegal_state("attach on unmapped session"));
        }

        let entry = session.links.vacant_entry();
        let index = entry.key();
        let output_handle = Handle(index as u32);
        let mut link = LinkInner::new(config, output_handle);
        link.state = LinkState::AttachSent;

        let attach = Attach {
            name: link.name.clone(),
            handle: output_handle,
            role: link.role,
            snd_settle_mode: link.snd_settle_mode,
            rcv_settle_mode: link.rcv_settle_mode,
            source: link.source.clone(),
            target: link.target.clone(),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: match link.role {
                Role::Sender => Some(0),
                Role::Receiver => None,
            },
            max_message_size: link.max_message_size,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };

        session.link_by_name.insert(link.name.clone(), index);
        entry.insert(link);
        let channel = session.outgoing_channel;

        self.queue(Frame::performative(channel, Performative::Attach(attach)));
        Ok(LinkId {
            session: sid,
            link: index,
        })
    }

    /// Queues a Detach for the link.
    pub fn detach(&mut self, lid: LinkId, closed: bool, error: Option<definitions::Error>) {
        let Some(session) = self.sessions.get_mut(lid.session) else {
            return;
        };
        let Some(link) = session.links.get_mut(lid.link) else {
            return;
        };
        if !matches!(link.state, LinkState::Attached | LinkState::AttachSent) {
            return;
        }
        link.state = LinkState::DetachSent;
        let handle = link.output_handle;
        let channel = session.outgoing_channel;
        self.queue(Frame::performative(
            channel,
            Performative::Detach(Detach {
                handle,
                closed,
                error,
            }),
        ));
    }

    /// Grants additional credit on a receiver link and announces it.
    pub fn add_credit(&mut self, lid: LinkId, credit: u32) -> Result<(), EngineError> {
        let session = self
            .sessions
            .get_mut(lid.session)
            .ok_or_else(|| EngineError::not_found("session"))?;
        let link = session
            .links
            .get_mut(lid.link)
            .ok_or_else(|| EngineError::not_found("link"))?;
        link.link_credit = link.link_credit.saturating_add(credit);
        link.drain = false;

        let flow = link_flow(session, &session.links[lid.link]);
        let channel = session.outgoing_channel;
        self.queue(Frame::performative(channel, Performative::Flow(flow)));
        Ok(())
    }

    /// Starts a drain cycle on a receiver link.
    ///
    /// Completion is reported as [`EngineEvent::DrainCompleted`] when
    /// credit reaches zero, either through deliveries or through the
    /// peer's flow echo.
    pub fn drain(&mut self, lid: LinkId) -> Result<(), EngineError> {
        let session = self
            .sessions
            .get_mut(lid.session)
            .ok_or_else(|| EngineError::not_found("session"))?;
        let link = session
            .links
            .get_mut(lid.link)
            .ok_or_else(|| EngineError::not_found("link"))?;
        if link.link_credit == 0 {
            self.events
                .push_back(EngineEvent::DrainCompleted { link: lid });
            return Ok(());
        }
        link.drain = true;

        let mut flow = link_flow(session, &session.links[lid.link]);
        flow.drain = true;
        let channel = session.outgoing_channel;
        self.queue(Frame::performative(channel, Performative::Flow(flow)));
        Ok(())
    }

    /// Queues an outgoing delivery. Transfers go out as soon as link
    /// credit and the session window allow.
    pub fn send(
        &mut self,
        lid: LinkId,
        payload: Payload,
        message_format: MessageFormat,
        settled: bool,
    ) -> Result<SendId, EngineError> {
        let send_id = self.allocate_send_id();
        let session = self
            .sessions
            .get_mut(lid.session)
            .ok_or_else(|| EngineError::not_found("session"))?;
        let link = session
            .links
            .get_mut(lid.link)
            .ok_or_else(|| EngineError::not_found("link"))?;
        if link.role != Role::Sender {
            return Err(EngineError::illegal_state("send on a receiver link"));
        }
        if link.state != LinkState::Attached {
            return Err(EngineError::illegal_state("send on a detached link"));
        }
        if let Some(max) = link.max_message_size {
            if max > 0 && payload.len() as u64 > max {
                return Err(EngineError::Protocol {
                    condition: definitions::LinkError::MessageSizeExceeded.into(),
                    description: format!("message of {} bytes exceeds {}", payload.len(), max),
                });
            }
        }
        link.pending_sends.push_back(PendingSend {
            send_id,
            payload,
            message_format,
            settled,
        });
        self.try_emit_session(lid.session);
        Ok(send_id)
    }

    /// Opens an outgoing streaming delivery on a sender link.
    pub fn stream_open(
        &mut self,
        lid: LinkId,
        message_format: MessageFormat,
        settled: bool,
    ) -> Result<SendId, EngineError> {
        let send_id = self.allocate_send_id();
        let session = self
            .sessions
            .get_mut(lid.session)
            .ok_or_else(|| EngineError::not_found("session"))?;
        let link = session
            .links
            .get_mut(lid.link)
            .ok_or_else(|| EngineError::not_found("link"))?;
        if link.role != Role::Sender || link.state != LinkState::Attached {
            return Err(EngineError::illegal_state("stream on an unattached link"));
        }
        if link.outgoing_stream.is_some() {
            return Err(EngineError::illegal_state(
                "a streaming delivery is already in progress",
            ));
        }
        link.outgoing_stream = Some(OutgoingStream {
            send_id,
            delivery_id: None,
            message_format,
            settled,
            chunks: VecDeque::new(),
        });
        Ok(send_id)
    }

    /// Queues one chunk of the current streaming delivery.
    ///
    /// `more = false` finishes the delivery; `aborted = true` discards it
    /// at the receiver.
    pub fn stream_chunk(
        &mut self,
        lid: LinkId,
        payload: Payload,
        more: bool,
        aborted: bool,
    ) -> Result<(), EngineError> {
        let session = self
            .sessions
            .get_mut(lid.session)
            .ok_or_else(|| EngineError::not_found("session"))?;
        let link = session
            .links
            .get_mut(lid.link)
            .ok_or_else(|| EngineError::not_found("link"))?;
        let stream = link
            .outgoing_stream
            .as_mut()
            .ok_or_else(|| EngineError::illegal_state("no streaming delivery in progress"))?;
        stream.chunks.push_back(StreamChunk {
            payload,
            more,
            aborted,
        });
        self.try_emit_session(lid.session);
        Ok(())
    }

    /// Queues a Disposition for one delivery.
    pub fn dispose(
        &mut self,
        lid: LinkId,
        delivery_id: DeliveryNumber,
        settled: bool,
        state: Option<DeliveryState>,
    ) -> Result<(), EngineError> {
        let session = self
            .sessions
            .get_mut(lid.session)
            .ok_or_else(|| EngineError::not_found("session"))?;
        let link = session
            .links
            .get(lid.link)
            .ok_or_else(|| EngineError::not_found("link"))?;
        let role = link.role;
        if role == Role::Sender && settled {
            session.outgoing_unsettled.remove(&delivery_id);
        }
        let channel = session.outgoing_channel;
        self.queue(Frame::performative(
            channel,
            Performative::Disposition(Disposition {
                role,
                first: delivery_id,
                last: None,
                settled,
                state,
                batchable: false,
            }),
        ));
        Ok(())
    }

    /// Current link credit on a link; the client's credit-window policy
    /// reads this snapshot on the engine thread.
    pub fn link_credit(&self, lid: LinkId) -> u32 {
        self.sessions
            .get(lid.session)
            .and_then(|session| session.links.get(lid.link))
            .map(|link| link.link_credit)
            .unwrap_or(0)
    }

    /* ------------------------------ ingress ---------------------------- */

    /// Consumes every complete frame from `src`.
    ///
    /// Partial trailing bytes stay in `src` for the next call, so the
    /// input is always fully drained from the engine's point of view.
    pub fn ingest(&mut self, src: &mut BytesMut, now: Instant) -> Result<(), EngineError> {
        loop {
            match self.codec.decode(src) {
                Ok(Some(frame)) => self.handle_frame(frame, now)?,
                Ok(None) => return Ok(()),
                Err(err) => {
                    let err = EngineError::from(err);
                    self.fail(err.clone());
                    return Err(err);
                }
            }
        }
    }

    /// Applies one already-decoded frame.
    pub fn handle_frame(&mut self, frame: Frame, now: Instant) -> Result<(), EngineError> {
        self.last_incoming = now;

        let Frame { channel, body } = frame;
        let (performative, payload) = match body {
            FrameBody::Empty => return Ok(()),
            FrameBody::Performative {
                performative,
                payload,
            } => (performative, payload),
        };
        trace!(channel, performative = performative.name(), "RECV");

        if matches!(self.state, ConnectionState::Discarding) {
            // Silently discard everything but the answering Close
            if let Performative::Close(close) = performative {
                return self.on_incoming_close(close);
            }
            return Ok(());
        }

        let result = match performative {
            Performative::Open(open) => self.on_incoming_open(open),
            Performative::Close(close) => self.on_incoming_close(close),
            Performative::Begin(begin) => self.on_incoming_begin(channel, begin),
            Performative::End(end) => self.on_incoming_end(channel, end),
            Performative::Attach(attach) => {
                self.with_session(channel, |engine, sid| engine.on_incoming_attach(sid, attach))
            }
            Performative::Flow(flow) => {
                self.with_session(channel, |engine, sid| engine.on_incoming_flow(sid, flow))
            }
            Performative::Transfer(transfer) => self.with_session(channel, |engine, sid| {
                engine.on_incoming_transfer(sid, transfer, payload)
            }),
            Performative::Disposition(disposition) => self.with_session(channel, |engine, sid| {
                engine.on_incoming_disposition(sid, disposition)
            }),
            Performative::Detach(detach) => {
                self.with_session(channel, |engine, sid| engine.on_incoming_detach(sid, detach))
            }
        };

        if let Err(err) = &result {
            self.fail(err.clone());
        }
        result
    }

    fn with_session<F>(&mut self, channel: u16, f: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut Self, SessionId) -> Result<(), EngineError>,
    {
        let sid = self
            .session_by_remote_channel
            .get(&channel)
            .copied()
            .ok_or_else(|| EngineError::not_found("no session mapped to incoming channel"))?;
        f(self, sid)
    }

    fn on_incoming_open(&mut self, open: Open) -> Result<(), EngineError> {
        if !matches!(self.state, ConnectionState::OpenSent) {
            return Err(EngineError::illegal_state("unexpected open"));
        }

        self.remote_max_frame_size = (open.max_frame_size.0 as usize).max(MIN_MAX_FRAME_SIZE);
        self.heartbeat_period = open
            .idle_time_out
            .filter(|millis| *millis > 0)
            .map(|millis| Duration::from_millis(millis as u64 / 2));
        self.remote_open = Some(open);
        self.state = ConnectionState::Opened;
        self.events.push_back(EngineEvent::Opened);
        Ok(())
    }

    fn on_incoming_close(&mut self, close: Close) -> Result<(), EngineError> {
        let remote = !matches!(
            self.state,
            ConnectionState::CloseSent | ConnectionState::Discarding
        );
        if remote {
            self.queue(Frame::performative(
                0,
                Performative::Close(Close { error: None }),
            ));
        }
        self.state = ConnectionState::End;
        self.events.push_back(EngineEvent::Closed {
            error: close.error,
            remote,
        });
        Ok(())
    }

    fn on_incoming_begin(&mut self, channel: u16, begin: Begin) -> Result<(), EngineError> {
        // The client never accepts remotely initiated sessions, so the
        // begin must answer one of ours.
        let sid = begin
            .remote_channel
            .ok_or_else(|| EngineError::illegal_state("begin without remote-channel"))?
            as usize;
        let session = self
            .sessions
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found("begin answers no local session"))?;
        if session.state != SessionState::BeginSent {
            return Err(EngineError::illegal_state("unexpected begin"));
        }
        session.apply_remote_begin(channel, &begin);
        self.session_by_remote_channel.insert(channel, sid);
        self.events
            .push_back(EngineEvent::SessionBegun { session: sid });
        Ok(())
    }

    fn on_incoming_end(&mut self, channel: u16, end: End) -> Result<(), EngineError> {
        let sid = self
            .session_by_remote_channel
            .remove(&channel)
            .ok_or_else(|| EngineError::not_found("end on unmapped channel"))?;
        let session = self
            .sessions
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found("session"))?;

        let remote = session.state != SessionState::EndSent;
        session.state = SessionState::Ended;
        let outgoing_channel = session.outgoing_channel;
        if remote {
            self.queue(Frame::performative(
                outgoing_channel,
                Performative::End(End { error: None }),
            ));
        }
        self.events.push_back(EngineEvent::SessionEnded {
            session: sid,
            error: end.error,
            remote,
        });
        Ok(())
    }

    fn on_incoming_attach(&mut self, sid: SessionId, attach: Attach) -> Result<(), EngineError> {
        let session = self
            .sessions
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found("session"))?;
        let index = *session
            .link_by_name
            .get(&attach.name)
            .ok_or_else(|| EngineError::not_found("attach names no local link"))?;
        session.link_by_input_handle.insert(attach.handle.0, index);

        let link = session
            .links
            .get_mut(index)
            .ok_or_else(|| EngineError::not_found("link"))?;
        if link.state != LinkState::AttachSent {
            return Err(EngineError::illegal_state("unexpected attach"));
        }

        link.input_handle = Some(attach.handle);
        // Adopt the negotiated settle modes from the answer
        link.snd_settle_mode = attach.snd_settle_mode;
        link.rcv_settle_mode = attach.rcv_settle_mode;
        link.state = LinkState::Attached;

        match link.role {
            Role::Sender => match attach.target {
                Some(target) => {
                    link.target = Some(target);
                    if attach.source.is_some() {
                        link.source = attach.source;
                    }
                }
                // Peer refused the target node; a closing detach with
                // the reason follows.
                None => {
                    link.refused = true;
                    return Ok(());
                }
            },
            Role::Receiver => match attach.source {
                Some(source) => {
                    link.source = Some(source);
                    if attach.target.is_some() {
                        link.target = attach.target;
                    }
                    link.delivery_count = attach.initial_delivery_count.unwrap_or(0);
                }
                None => {
                    link.refused = true;
                    return Ok(());
                }
            },
        }

        self.events.push_back(EngineEvent::LinkAttached {
            link: LinkId {
                session: sid,
                link: index,
            },
        });
        Ok(())
    }

    fn on_incoming_flow(&mut self, sid: SessionId, flow: Flow) -> Result<(), EngineError> {
        let mut echoes: Vec<Flow> = Vec::new();
        let mut drained = None;
        let channel;
        let link_index;
        {
            let session = self
                .sessions
                .get_mut(sid)
                .ok_or_else(|| EngineError::not_found("session"))?;
            channel = session.outgoing_channel;
            session.apply_remote_flow(&flow);

            link_index = match &flow.handle {
                Some(handle) => Some(
                    session
                        .link_index_by_input_handle(handle)
                        .ok_or_else(EngineError::unattached_handle)?,
                ),
                None => None,
            };

            if let Some(index) = link_index {
                let link = &mut session.links[index];
                match link.role {
                    Role::Sender => {
                        link.apply_sender_flow(&flow);
                    }
                    Role::Receiver => {
                        if let Some(delivery_count) = flow.delivery_count {
                            link.delivery_count = delivery_count;
                        }
                        if link.drain && flow.drain && flow.link_credit == Some(0) {
                            link.link_credit = 0;
                            link.drain = false;
                            drained = Some(LinkId {
                                session: sid,
                                link: index,
                            });
                        }
                        if flow.echo {
                            let link = &session.links[index];
                            echoes.push(link_flow(session, link));
                        }
                    }
                }
            }
        }

        if let Some(link) = drained {
            self.events.push_back(EngineEvent::DrainCompleted { link });
        }

        // Emit anything that was stalled on credit or window
        self.try_emit_session(sid);

        // Answer a sender-side drain request after emitting what credit
        // allowed: consume the remainder and echo the flow state.
        if let Some(index) = link_index {
            if let Some(session) = self.sessions.get_mut(sid) {
                let wants_drain = {
                    let link = &mut session.links[index];
                    if link.role == Role::Sender && link.drain {
                        link.drain_credit();
                        true
                    } else {
                        false
                    }
                };
                if wants_drain {
                    let mut echo = link_flow(session, &session.links[index]);
                    echo.drain = true;
                    echoes.push(echo);
                }
            }
        }

        for flow in echoes {
            self.queue(Frame::performative(channel, Performative::Flow(flow)));
        }
        Ok(())
    }

    fn on_incoming_transfer(
        &mut self,
        sid: SessionId,
        transfer: Transfer,
        payload: Payload,
    ) -> Result<(), EngineError> {
        let session = self
            .sessions
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found("session"))?;
        if session.incoming_window == 0 {
            return Err(EngineError::window_violation());
        }

        let index = session
            .link_index_by_input_handle(&transfer.handle)
            .ok_or_else(EngineError::unattached_handle)?;

        let next_incoming_id = session.next_incoming_id;
        let replenish = session.consume_incoming_window();

        let link = &mut session.links[index];
        if link.role != Role::Receiver {
            return Err(EngineError::illegal_state("transfer on a sender link"));
        }

        let lid = LinkId {
            session: sid,
            link: index,
        };

        let first = link.incomplete.is_none();
        if first {
            let delivery_id = transfer
                .delivery_id
                .ok_or_else(|| EngineError::invalid_field("transfer without delivery-id"))?;
            if delivery_id != next_incoming_id {
                return Err(EngineError::Protocol {
                    condition: definitions::SessionError::ErrantLink.into(),
                    description: format!(
                        "delivery-id {} does not match next-incoming-id {}",
                        delivery_id, next_incoming_id
                    ),
                });
            }
            let delivery_tag = transfer
                .delivery_tag
                .clone()
                .ok_or_else(|| EngineError::invalid_field("transfer without delivery-tag"))?;
            link.incomplete = Some(IncompleteDelivery {
                delivery_id,
                delivery_tag,
                message_format: transfer.message_format.unwrap_or(0),
                settled: transfer.settled.unwrap_or(false),
                payload: Composite::new(),
            });
        } else if let (Some(delivery_id), Some(incomplete)) =
            (transfer.delivery_id, link.incomplete.as_ref())
        {
            if delivery_id != incomplete.delivery_id {
                return Err(EngineError::invalid_field(
                    "delivery-id changed on a continuation transfer",
                ));
            }
        }

        if let Some(incomplete) = link.incomplete.as_mut() {
            if transfer.settled == Some(true) {
                incomplete.settled = true;
            }
        }

        if transfer.aborted {
            if let Some(incomplete) = link.incomplete.take() {
                self.events.push_back(EngineEvent::DeliveryAborted {
                    link: lid,
                    delivery_id: incomplete.delivery_id,
                });
            }
        } else if transfer.more {
            if link.streaming {
                let incomplete = link.incomplete.as_ref().expect("created on first transfer");
                let chunk = DeliveryChunk {
                    delivery_id: incomplete.delivery_id,
                    delivery_tag: first.then(|| incomplete.delivery_tag.clone()),
                    first,
                    payload,
                    more: true,
                };
                self.events
                    .push_back(EngineEvent::DeliveryChunk { link: lid, chunk });
            } else if let Some(incomplete) = link.incomplete.as_mut() {
                incomplete.payload.push(payload);
            }
        } else {
            // Final transfer of the delivery
            let incomplete = link.incomplete.take().expect("created on first transfer");
            link.delivery_count = link.delivery_count.wrapping_add(1);
            link.link_credit = link.link_credit.saturating_sub(1);
            let drained = link.drain && link.link_credit == 0;
            if drained {
                link.drain = false;
            }

            if link.streaming {
                let chunk = DeliveryChunk {
                    delivery_id: incomplete.delivery_id,
                    delivery_tag: first.then(|| incomplete.delivery_tag.clone()),
                    first,
                    payload,
                    more: false,
                };
                self.events
                    .push_back(EngineEvent::DeliveryChunk { link: lid, chunk });
            } else {
                let mut accumulated = incomplete.payload;
                accumulated.push(payload);
                self.events.push_back(EngineEvent::DeliveryReady {
                    link: lid,
                    delivery: RawDelivery {
                        delivery_id: incomplete.delivery_id,
                        delivery_tag: incomplete.delivery_tag,
                        message_format: incomplete.message_format,
                        settled: incomplete.settled,
                        payload: accumulated.freeze(),
                    },
                });
            }
            if drained {
                self.events
                    .push_back(EngineEvent::DrainCompleted { link: lid });
            }
        }

        if let Some(flow) = replenish {
            let channel = self.sessions[sid].outgoing_channel;
            self.queue(Frame::performative(channel, Performative::Flow(flow)));
        }
        Ok(())
    }

    fn on_incoming_disposition(
        &mut self,
        sid: SessionId,
        disposition: Disposition,
    ) -> Result<(), EngineError> {
        // A disposition from the peer's receiver role applies to our
        // outgoing (sender) deliveries. The sender-role form would act
        // on receiver-side unsettled state, which the first-settle-mode
        // client never waits on.
        if disposition.role != Role::Receiver {
            return Ok(());
        }
        let session = self
            .sessions
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found("session"))?;

        let first = disposition.first;
        let last = disposition.last.unwrap_or(first);
        let in_range: Vec<(DeliveryNumber, usize)> = session
            .outgoing_unsettled
            .range(first..=last)
            .map(|(id, (index, _))| (*id, *index))
            .collect();

        for (delivery_id, index) in in_range {
            if disposition.settled {
                session.outgoing_unsettled.remove(&delivery_id);
            }
            self.events.push_back(EngineEvent::Disposition {
                link: LinkId {
                    session: sid,
                    link: index,
                },
                delivery_id,
                state: disposition.state.clone(),
                settled: disposition.settled,
            });
        }
        Ok(())
    }

    fn on_incoming_detach(&mut self, sid: SessionId, detach: Detach) -> Result<(), EngineError> {
        let session = self
            .sessions
            .get_mut(sid)
            .ok_or_else(|| EngineError::not_found("session"))?;
        let index = session
            .link_index_by_input_handle(&detach.handle)
            .ok_or_else(EngineError::unattached_handle)?;
        session.link_by_input_handle.remove(&detach.handle.0);

        let link = &mut session.links[index];
        let remote = link.state != LinkState::DetachSent;
        link.state = LinkState::Detached;
        let output_handle = link.output_handle;
        let channel = session.outgoing_channel;

        if remote {
            self.queue(Frame::performative(
                channel,
                Performative::Detach(Detach {
                    handle: output_handle,
                    closed: detach.closed,
                    error: None,
                }),
            ));
        }
        self.events.push_back(EngineEvent::LinkDetached {
            link: LinkId {
                session: sid,
                link: index,
            },
            closed: detach.closed,
            error: detach.error,
            remote,
        });
        Ok(())
    }

    /* ------------------------------ egress ----------------------------- */

    /// Emits transfers for every link in the session that has pending
    /// sends, as far as link credit and the remote incoming window allow.
    fn try_emit_session(&mut self, sid: SessionId) {
        let max_payload = self
            .remote_max_frame_size
            .saturating_sub(TRANSFER_OVERHEAD)
            .max(MIN_MAX_FRAME_SIZE / 2);

        let Some(session) = self.sessions.get_mut(sid) else {
            return;
        };
        let channel = session.outgoing_channel;
        let mut frames = Vec::new();
        let mut events = Vec::new();

        let indices: Vec<usize> = session.links.iter().map(|(index, _)| index).collect();
        for index in indices {
            emit_link_transfers(
                session,
                index,
                sid,
                channel,
                max_payload,
                &mut frames,
                &mut events,
            );
        }

        self.outgoing.extend(frames);
        self.events.extend(events);
    }

    fn allocate_send_id(&mut self) -> SendId {
        let id = self.next_send_id;
        self.next_send_id += 1;
        id
    }

    fn queue(&mut self, frame: Frame) {
        self.outgoing.push_back(frame);
    }

    /* --------------------------- timer & drain ------------------------- */

    /// Encodes every queued outbound frame into `dst`.
    pub fn drain_outbound(&mut self, dst: &mut BytesMut, now: Instant) -> Result<(), EngineError> {
        let mut wrote = false;
        while let Some(frame) = self.outgoing.pop_front() {
            self.codec.encode(frame, dst)?;
            wrote = true;
        }
        if wrote {
            self.last_outgoing = now;
        }
        Ok(())
    }

    /// Whether outbound frames are queued.
    pub fn has_outbound(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Drives heartbeats and idle-timeout enforcement.
    ///
    /// Returns the instant at which the timer wants to run next, if any
    /// timer is armed.
    pub fn handle_timer(&mut self, now: Instant) -> Result<Option<Instant>, EngineError> {
        if self.failure.is_some() || !matches!(self.state, ConnectionState::Opened) {
            return Ok(None);
        }

        if let Some(deadline) = self.idle_deadline {
            if now.duration_since(self.last_incoming) >= deadline {
                let err = EngineError::IdleTimeout;
                self.fail(err.clone());
                return Err(err);
            }
        }

        if let Some(period) = self.heartbeat_period {
            if now.duration_since(self.last_outgoing) >= period {
                trace!("queueing empty heartbeat frame");
                self.queue(Frame::empty());
                self.last_outgoing = now;
            }
        }

        let heartbeat_at = self
            .heartbeat_period
            .map(|period| self.last_outgoing + period);
        let idle_at = self
            .idle_deadline
            .map(|deadline| self.last_incoming + deadline);
        Ok(match (heartbeat_at, idle_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        })
    }
}

/// Link fields merged with session fields for an outgoing Flow.
fn link_flow(session: &SessionInner, link: &LinkInner) -> Flow {
    let mut flow = session.session_flow();
    flow.handle = Some(link.output_handle);
    flow.delivery_count = Some(link.delivery_count);
    flow.link_credit = Some(link.link_credit);
    flow.drain = link.drain;
    flow
}

// Free function so try_emit_session hands out disjoint borrows of the
// session instead of fighting the borrow checker through `self`.
#[allow(clippy::too_many_arguments)]
fn emit_link_transfers(
    session: &mut SessionInner,
    index: usize,
    sid: SessionId,
    channel: u16,
    max_payload: usize,
    frames: &mut Vec<Frame>,
    events: &mut Vec<EngineEvent>,
) {
    loop {
        {
            let link = match session.links.get(index) {
                Some(link) if link.role == Role::Sender && link.state == LinkState::Attached => {
                    link
                }
                _ => return,
            };
            if link.outgoing_stream.is_none() && link.pending_sends.is_empty() {
                return;
            }
        }

        // Streaming chunks of an announced delivery only need window;
        // starting any delivery needs credit too.
        let is_stream = session.links[index].outgoing_stream.is_some();
        if is_stream {
            let (first, chunk, handle) = {
                let link = &mut session.links[index];
                let stream = link.outgoing_stream.as_mut().expect("checked above");
                if stream.chunks.is_empty() {
                    return;
                }
                let first = stream.delivery_id.is_none();
                if first && link.link_credit == 0 {
                    return;
                }
                if session.remote_incoming_window == 0 {
                    return;
                }
                let chunk = stream.chunks.pop_front().expect("checked non-empty");
                (first, chunk, link.output_handle)
            };

            let delivery_id = session.next_outgoing_id;
            let mut transfer = Transfer::continuation(handle, chunk.more);
            transfer.aborted = chunk.aborted;

            let (send_id, settled, delivery_id) = {
                let link = &mut session.links[index];
                if first {
                    let tag = link.allocate_tag();
                    link.delivery_count = link.delivery_count.wrapping_add(1);
                    link.link_credit = link.link_credit.saturating_sub(1);
                    let stream = link.outgoing_stream.as_mut().expect("stream in progress");
                    stream.delivery_id = Some(delivery_id);
                    transfer.delivery_id = Some(delivery_id);
                    transfer.delivery_tag = Some(tag);
                    transfer.message_format = Some(stream.message_format);
                    transfer.settled = Some(stream.settled);
                }
                let stream = link.outgoing_stream.as_ref().expect("stream in progress");
                (
                    stream.send_id,
                    stream.settled,
                    stream.delivery_id.expect("assigned on first chunk"),
                )
            };
            let done = !chunk.more || chunk.aborted;

            session.consume_outgoing_window();
            frames.push(Frame::new(
                channel,
                FrameBody::Performative {
                    performative: Performative::Transfer(transfer),
                    payload: chunk.payload,
                },
            ));

            if first {
                if !settled {
                    session
                        .outgoing_unsettled
                        .insert(delivery_id, (index, send_id));
                }
                events.push(EngineEvent::TransferSent {
                    link: LinkId {
                        session: sid,
                        link: index,
                    },
                    send_id,
                    delivery_id,
                    settled,
                });
            }
            if done {
                session.links[index].outgoing_stream = None;
            }
            continue;
        }

        // Plain queued sends: start only when the whole delivery fits in
        // the remote incoming window.
        let pending = {
            let link = &session.links[index];
            let Some(front) = link.pending_sends.front() else {
                return;
            };
            let frames_needed = front.payload.len().max(1).div_ceil(max_payload) as u32;
            if link.link_credit == 0 || session.remote_incoming_window < frames_needed {
                return;
            }
            session.links[index]
                .pending_sends
                .pop_front()
                .expect("checked non-empty")
        };

        let (tag, handle) = {
            let link = &mut session.links[index];
            let tag = link.allocate_tag();
            link.delivery_count = link.delivery_count.wrapping_add(1);
            link.link_credit -= 1;
            (tag, link.output_handle)
        };

        let delivery_id = session.next_outgoing_id;
        let total = pending.payload.len();
        let mut offset = 0;
        let mut first_frame = true;
        loop {
            let end = (offset + max_payload).min(total);
            let slice = pending.payload.slice(offset..end);
            let more = end < total;

            let mut transfer = Transfer::continuation(handle, more);
            if first_frame {
                transfer.delivery_id = Some(delivery_id);
                transfer.delivery_tag = Some(tag.clone());
                transfer.message_format = Some(pending.message_format);
                transfer.settled = Some(pending.settled);
            }
            session.consume_outgoing_window();
            frames.push(Frame::new(
                channel,
                FrameBody::Performative {
                    performative: Performative::Transfer(transfer),
                    payload: slice,
                },
            ));
            first_frame = false;
            if !more {
                break;
            }
            offset = end;
        }

        if !pending.settled {
            session
                .outgoing_unsettled
                .insert(delivery_id, (index, pending.send_id));
        }
        events.push(EngineEvent::TransferSent {
            link: LinkId {
                session: sid,
                link: index,
            },
            send_id: pending.send_id,
            delivery_id,
            settled: pending.settled,
        });
    }
}
