//! The connection driver.
//!
//! One driver task runs per connection: the single-threaded scheduler
//! that owns the engine and the socket. Every engine-state mutation
//! happens on this task; caller threads reach it through the control
//! channel and get answers back over oneshot completions, so nothing
//! ever blocks the engine and the engine never throws across the
//! scheduler boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use hematite_amqp_types::definitions::{self, DeliveryNumber};
use hematite_amqp_types::messaging::{Accepted, DeliveryState};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, trace};

use crate::control::{Control, ReceiverItem, ReceiverRegistration, Responder};
use crate::engine::{
    ConnectionState, Engine, EngineError, EngineEvent, LinkId, SendId, SessionId,
};

use super::error::ClientError;
use super::tracker::TrackerShared;

const SHUTDOWN_FLUSH: std::time::Duration = std::time::Duration::from_secs(5);

/// State shared between the driver and the connection handles.
#[derive(Debug, Default)]
pub(crate) struct ConnShared {
    pub failure: Mutex<Option<ClientError>>,
    pub closed: AtomicBool,
}

impl ConnShared {
    pub fn failure_cause(&self) -> Option<ClientError> {
        self.failure.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct SendEntry {
    link: LinkId,
    sent: Option<Responder<DeliveryNumber>>,
    settlement: Option<Responder<Option<DeliveryState>>>,
    shared: Arc<TrackerShared>,
}

pub(crate) struct Driver<Io> {
    io: Io,
    engine: Engine,
    control: mpsc::Receiver<Control>,
    control_closed: bool,
    shared: Arc<ConnShared>,

    read_buf: BytesMut,
    write_buf: BytesMut,

    pending_open: Option<Responder<()>>,
    pending_begin: HashMap<SessionId, Responder<SessionId>>,
    pending_end: HashMap<SessionId, Responder<()>>,
    pending_attach: HashMap<LinkId, Responder<LinkId>>,
    pending_detach: HashMap<LinkId, Responder<()>>,
    pending_drain: HashMap<LinkId, Responder<()>>,
    pending_close: Option<Responder<Option<definitions::Error>>>,

    sends: HashMap<SendId, SendEntry>,
    send_by_delivery: HashMap<(LinkId, DeliveryNumber), SendId>,
    receivers: HashMap<LinkId, ReceiverRegistration>,
    auto_settle: HashMap<LinkId, bool>,

    remote_close_error: Option<definitions::Error>,
}

impl<Io> Driver<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(
        io: Io,
        engine: Engine,
        control: mpsc::Receiver<Control>,
        shared: Arc<ConnShared>,
        pending_open: Responder<()>,
    ) -> Self {
        Self {
            io,
            engine,
            control,
            control_closed: false,
            shared,
            read_buf: BytesMut::with_capacity(8 * 1024),
            write_buf: BytesMut::with_capacity(8 * 1024),
            pending_open: Some(pending_open),
            pending_begin: HashMap::new(),
            pending_end: HashMap::new(),
            pending_attach: HashMap::new(),
            pending_detach: HashMap::new(),
            pending_drain: HashMap::new(),
            pending_close: None,
            sends: HashMap::new(),
            send_by_delivery: HashMap::new(),
            receivers: HashMap::new(),
            auto_settle: HashMap::new(),
            remote_close_error: None,
        }
    }

    #[instrument(name = "driver", skip_all)]
    pub(crate) async fn run(mut self) {
        let result = self.run_loop().await;
        if let Err(err) = &result {
            error!(%err, "connection driver stopped");
        }
        self.shutdown(result.err()).await;
    }

    async fn run_loop(&mut self) -> Result<(), ClientError> {
        loop {
            let now = Instant::now();
            self.engine.drain_outbound(&mut self.write_buf, now)?;
            if !self.write_buf.is_empty() {
                self.io.write_all_buf(&mut self.write_buf).await?;
            }

            self.dispatch_events();

            if matches!(self.engine.state(), ConnectionState::End) {
                return match self.engine.failure() {
                    Some(err) => Err(err.clone().into()),
                    None => Ok(()),
                };
            }

            let deadline = self.engine.handle_timer(Instant::now())?;
            if self.engine.has_outbound() {
                // a heartbeat got queued; flush before sleeping
                continue;
            }

            tokio::select! {
                maybe = self.control.recv(), if !self.control_closed => match maybe {
                    Some(control) => self.on_control(control),
                    None => {
                        // every handle is gone; close the connection
                        self.control_closed = true;
                        self.engine.close(None);
                    }
                },
                read = self.io.read_buf(&mut self.read_buf) => {
                    if read? == 0 {
                        return Err(EngineError::TransportFailed.into());
                    }
                    self.engine.ingest(&mut self.read_buf, Instant::now())?;
                }
                _ = sleep_until_deadline(deadline) => {}
            }
        }
    }

    /* ------------------------------ events ----------------------------- */

    fn dispatch_events(&mut self) {
        while let Some(event) = self.engine.poll_event() {
            trace!(?event, "engine event");
            match event {
                EngineEvent::Opened => {
                    if let Some(responder) = self.pending_open.take() {
                        let _ = responder.send(Ok(()));
                    }
                }
                EngineEvent::Closed { error, remote } => {
                    self.shared.closed.store(true, Ordering::SeqCst);
                    if remote {
                        if error.is_some() {
                            let mut failure = self.shared.failure.lock();
                            if failure.is_none() {
                                *failure = Some(ClientError::RemoteClosed {
                                    error: error.clone(),
                                });
                            }
                        }
                    }
                    self.remote_close_error = error.clone();
                    if let Some(responder) = self.pending_close.take() {
                        let _ = responder.send(Ok(error));
                    }
                }
                EngineEvent::SessionBegun { session } => {
                    if let Some(responder) = self.pending_begin.remove(&session) {
                        let _ = responder.send(Ok(session));
                    }
                }
                EngineEvent::SessionEnded { session, .. } => {
                    if let Some(responder) = self.pending_end.remove(&session) {
                        let _ = responder.send(Ok(()));
                    }
                }
                EngineEvent::LinkAttached { link } => {
                    // Seed the credit window before the application sees
                    // the attached receiver
                    if let Some(registration) = self.receivers.get(&link) {
                        if registration.credit_window > 0 {
                            let _ = self.engine.add_credit(link, registration.credit_window);
                        }
                    }
                    if let Some(responder) = self.pending_attach.remove(&link) {
                        let _ = responder.send(Ok(link));
                    }
                }
                EngineEvent::LinkDetached {
                    link,
                    closed,
                    error,
                    remote: _,
                } => {
                    if let Some(responder) = self.pending_attach.remove(&link) {
                        // Attach answered with a null terminus, then the
                        // refusing detach: a link-open failure
                        let _ = responder.send(Err(ClientError::LinkRefused { error }));
                        continue;
                    }
                    if let Some(responder) = self.pending_detach.remove(&link) {
                        let _ = responder.send(Ok(()));
                    }
                    if let Some(responder) = self.pending_drain.remove(&link) {
                        let _ = responder.send(Err(ClientError::illegal_state(
                            "link detached while draining",
                        )));
                    }
                    if let Some(registration) = self.receivers.remove(&link) {
                        let _ = registration.items.send(ReceiverItem::Detached {
                            closed,
                            error: error.clone(),
                        });
                    }
                    let stale: Vec<SendId> = self
                        .sends
                        .iter()
                        .filter(|(_, entry)| entry.link == link)
                        .map(|(send_id, _)| *send_id)
                        .collect();
                    for send_id in stale {
                        if let Some(entry) = self.sends.remove(&send_id) {
                            fail_send(entry, ClientError::ResourceClosed("link detached"));
                        }
                    }
                }
                EngineEvent::TransferSent {
                    link,
                    send_id,
                    delivery_id,
                    settled,
                } => {
                    let Some(entry) = self.sends.get_mut(&send_id) else {
                        continue;
                    };
                    if let Some(sent) = entry.sent.take() {
                        let _ = sent.send(Ok(delivery_id));
                    }
                    if settled {
                        // Sender-settled deliveries settle at send time;
                        // the presumed outcome is accepted
                        let state = DeliveryState::Accepted(Accepted {});
                        {
                            let mut snapshot = entry.shared.state.lock();
                            snapshot.remote_settled = true;
                            snapshot.locally_settled = true;
                            snapshot.remote_state = Some(state.clone());
                        }
                        if let Some(settlement) = entry.settlement.take() {
                            let _ = settlement.send(Ok(Some(state)));
                        }
                        self.sends.remove(&send_id);
                    } else {
                        self.send_by_delivery.insert((link, delivery_id), send_id);
                    }
                }
                EngineEvent::Disposition {
                    link,
                    delivery_id,
                    state,
                    settled,
                } => {
                    let Some(send_id) = self.send_by_delivery.get(&(link, delivery_id)).copied()
                    else {
                        continue;
                    };
                    let auto_settle = self.auto_settle.get(&link).copied().unwrap_or(true);
                    let Some(entry) = self.sends.get_mut(&send_id) else {
                        continue;
                    };
                    {
                        let mut snapshot = entry.shared.state.lock();
                        snapshot.remote_state = state.clone();
                        snapshot.remote_settled = settled;
                    }
                    let terminal = state.as_ref().map(DeliveryState::is_terminal).unwrap_or(false);
                    if settled || (terminal && auto_settle) {
                        if !settled && auto_settle {
                            let _ = self.engine.dispose(link, delivery_id, true, state.clone());
                        }
                        entry.shared.state.lock().locally_settled = true;
                        if let Some(settlement) = entry.settlement.take() {
                            let _ = settlement.send(Ok(state));
                        }
                        self.sends.remove(&send_id);
                        self.send_by_delivery.remove(&(link, delivery_id));
                    }
                }
                EngineEvent::DeliveryReady { link, delivery } => {
                    if let Some(registration) = self.receivers.get(&link) {
                        registration.queued.fetch_add(1, Ordering::SeqCst);
                        let _ = registration.items.send(ReceiverItem::Delivery(delivery));
                    }
                }
                EngineEvent::DeliveryChunk { link, chunk } => {
                    if let Some(registration) = self.receivers.get(&link) {
                        if !chunk.more {
                            registration.queued.fetch_add(1, Ordering::SeqCst);
                        }
                        let _ = registration.items.send(ReceiverItem::Chunk(chunk));
                    }
                }
                EngineEvent::DeliveryAborted { link, delivery_id } => {
                    if let Some(registration) = self.receivers.get(&link) {
                        let _ = registration.items.send(ReceiverItem::Aborted(delivery_id));
                    }
                }
                EngineEvent::DrainCompleted { link } => {
                    if let Some(responder) = self.pending_drain.remove(&link) {
                        let _ = responder.send(Ok(()));
                    }
                }
            }
        }
    }

    /* ------------------------------ control ---------------------------- */

    fn on_control(&mut self, control: Control) {
        match control {
            Control::BeginSession { responder } => match self.engine.begin_session() {
                Ok(session) => {
                    self.pending_begin.insert(session, responder);
                }
                Err(err) => {
                    let _ = responder.send(Err(err.into()));
                }
            },
            Control::EndSession {
                session,
                error,
                responder,
            } => {
                self.engine.end_session(session, error);
                self.pending_end.insert(session, responder);
            }
            Control::Attach {
                session,
                config,
                registration,
                auto_settle,
                responder,
            } => match self.engine.attach(session, config) {
                Ok(link) => {
                    if let Some(registration) = registration {
                        self.receivers.insert(link, registration);
                    }
                    self.auto_settle.insert(link, auto_settle);
                    self.pending_attach.insert(link, responder);
                }
                Err(err) => {
                    let _ = responder.send(Err(err.into()));
                }
            },
            Control::Detach {
                link,
                closed,
                error,
                responder,
            } => {
                self.engine.detach(link, closed, error);
                self.pending_detach.insert(link, responder);
            }
            Control::Send {
                link,
                payload,
                message_format,
                settled,
                shared,
                sent,
                settlement,
            } => match self.engine.send(link, payload, message_format, settled) {
                Ok(send_id) => {
                    self.sends.insert(
                        send_id,
                        SendEntry {
                            link,
                            sent: Some(sent),
                            settlement: Some(settlement),
                            shared,
                        },
                    );
                }
                Err(err) => {
                    let _ = sent.send(Err(err.clone().into()));
                    let _ = settlement.send(Err(err.into()));
                }
            },
            Control::StreamOpen {
                link,
                message_format,
                settled,
                shared,
                settlement,
                responder,
            } => match self.engine.stream_open(link, message_format, settled) {
                Ok(send_id) => {
                    self.sends.insert(
                        send_id,
                        SendEntry {
                            link,
                            sent: None,
                            settlement: Some(settlement),
                            shared,
                        },
                    );
                    let _ = responder.send(Ok(()));
                }
                Err(err) => {
                    let _ = settlement.send(Err(err.clone().into()));
                    let _ = responder.send(Err(err.into()));
                }
            },
            Control::StreamChunk {
                link,
                payload,
                more,
                aborted,
                responder,
            } => {
                let result = self.engine.stream_chunk(link, payload, more, aborted);
                let _ = responder.send(result.map_err(Into::into));
            }
            Control::Dispose {
                link,
                delivery_id,
                settled,
                state,
                responder,
            } => {
                let result = self.engine.dispose(link, delivery_id, settled, state);
                if let Some(responder) = responder {
                    let _ = responder.send(result.map_err(Into::into));
                }
            }
            Control::AddCredit {
                link,
                credit,
                responder,
            } => {
                let result = self.engine.add_credit(link, credit);
                let _ = responder.send(result.map_err(Into::into));
            }
            Control::Drain { link, responder } => match self.engine.drain(link) {
                Ok(()) => {
                    self.pending_drain.insert(link, responder);
                }
                Err(err) => {
                    let _ = responder.send(Err(err.into()));
                }
            },
            Control::ReplenishWindow { link } => self.replenish(link),
            Control::Close { error, responder } => {
                if matches!(self.engine.state(), ConnectionState::End)
                    || self.engine.failure().is_some()
                {
                    // Closing a failed or finished connection succeeds
                    let _ = responder.send(Ok(self.remote_close_error.clone()));
                } else {
                    self.engine.close(error);
                    self.pending_close = Some(responder);
                }
            }
        }
    }

    /// The credit-window policy: with window W, credit C and queued Q,
    /// top up by W − (C + Q) when C ≤ 0.5·W and C + Q ≤ 0.7·W.
    fn replenish(&mut self, link: LinkId) {
        let Some(registration) = self.receivers.get(&link) else {
            return;
        };
        let window = registration.credit_window;
        if window == 0 {
            return;
        }
        let credit = self.engine.link_credit(link);
        let queued = registration.queued.load(Ordering::SeqCst);
        let potential = credit.saturating_add(queued);
        if 2 * credit <= window && 10 * potential <= 7 * window {
            debug!(?link, credit, queued, grant = window - potential, "replenishing credit window");
            let _ = self.engine.add_credit(link, window - potential);
        }
    }

    /* ----------------------------- shutdown ---------------------------- */

    async fn shutdown(mut self, error: Option<ClientError>) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(err) = &error {
            let mut failure = self.shared.failure.lock();
            if failure.is_none() {
                *failure = Some(err.clone());
            }
        }

        // Give a Close queued by the failing engine a chance to go out
        let _ = self
            .engine
            .drain_outbound(&mut self.write_buf, Instant::now());
        if !self.write_buf.is_empty() {
            let _ = tokio::time::timeout(SHUTDOWN_FLUSH, self.io.write_all_buf(&mut self.write_buf))
                .await;
        }
        self.dispatch_events();

        let cause = error.unwrap_or_else(|| ClientError::illegal_state("connection closed"));

        if let Some(responder) = self.pending_open.take() {
            let _ = responder.send(Err(cause.clone()));
        }
        // Idempotent close: closing a failed connection still succeeds
        if let Some(responder) = self.pending_close.take() {
            let _ = responder.send(Ok(self.remote_close_error.clone()));
        }
        for (_, responder) in self.pending_begin.drain() {
            let _ = responder.send(Err(cause.clone()));
        }
        for (_, responder) in self.pending_end.drain() {
            let _ = responder.send(Err(cause.clone()));
        }
        for (_, responder) in self.pending_attach.drain() {
            let _ = responder.send(Err(cause.clone()));
        }
        for (_, responder) in self.pending_detach.drain() {
            let _ = responder.send(Err(cause.clone()));
        }
        for (_, responder) in self.pending_drain.drain() {
            let _ = responder.send(Err(cause.clone()));
        }
        for (_, entry) in self.sends.drain() {
            fail_send(entry, cause.clone());
        }
        for (_, registration) in self.receivers.drain() {
            let _ = registration.items.send(ReceiverItem::Detached {
                closed: true,
                error: None,
            });
        }

        self.control.close();
        while let Ok(control) = self.control.try_recv() {
            fail_control(control, &cause, self.remote_close_error.clone());
        }
    }
}

fn fail_send(entry: SendEntry, cause: ClientError) {
    if let Some(sent) = entry.sent {
        let _ = sent.send(Err(cause.clone()));
    }
    if let Some(settlement) = entry.settlement {
        let _ = settlement.send(Err(cause));
    }
}

fn fail_control(
    control: Control,
    cause: &ClientError,
    remote_close_error: Option<definitions::Error>,
) {
    match control {
        Control::BeginSession { responder } => {
            let _ = responder.send(Err(cause.clone()));
        }
        Control::EndSession { responder, .. } => {
            let _ = responder.send(Err(cause.clone()));
        }
        Control::Attach { responder, .. } => {
            let _ = responder.send(Err(cause.clone()));
        }
        Control::Detach { responder, .. } => {
            let _ = responder.send(Err(cause.clone()));
        }
        Control::Send { sent, settlement, .. } => {
            let _ = sent.send(Err(cause.clone()));
            let _ = settlement.send(Err(cause.clone()));
        }
        Control::StreamOpen {
            settlement,
            responder,
            ..
        } => {
            let _ = settlement.send(Err(cause.clone()));
            let _ = responder.send(Err(cause.clone()));
        }
        Control::StreamChunk { responder, .. } => {
            let _ = responder.send(Err(cause.clone()));
        }
        Control::Dispose { responder, .. } => {
            if let Some(responder) = responder {
                let _ = responder.send(Err(cause.clone()));
            }
        }
        Control::AddCredit { responder, .. } => {
            let _ = responder.send(Err(cause.clone()));
        }
        Control::Drain { responder, .. } => {
            let _ = responder.send(Err(cause.clone()));
        }
        Control::ReplenishWindow { .. } => {}
        Control::Close { responder, .. } => {
            // Close of an already-failed connection completes cleanly
            let _ = responder.send(Ok(remote_close_error));
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
        }
        None => std::future::pending().await,
    }
}
