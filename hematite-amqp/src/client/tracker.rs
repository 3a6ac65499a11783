//! Tracking of outgoing deliveries.

use std::sync::Arc;
use std::time::Duration;

use hematite_amqp_types::definitions::DeliveryNumber;
use hematite_amqp_types::messaging::DeliveryState;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::control::Control;
use crate::engine::LinkId;

use super::error::ClientError;
use super::with_timeout;

/// Snapshot of an outgoing delivery's state, updated by the driver and
/// read by caller threads.
#[derive(Debug, Default)]
pub(crate) struct TrackerShared {
    pub state: Mutex<TrackerSnapshot>,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct TrackerSnapshot {
    pub remote_state: Option<DeliveryState>,
    pub remote_settled: bool,
    pub locally_settled: bool,
}

/// Handle onto an outgoing delivery.
///
/// The settlement future completes when the peer settles the delivery
/// (or immediately, for deliveries sent pre-settled).
#[derive(Debug)]
pub struct Tracker {
    control: mpsc::Sender<Control>,
    link: LinkId,
    delivery_id: DeliveryNumber,
    shared: Arc<TrackerShared>,
    settlement: Option<oneshot::Receiver<Result<Option<DeliveryState>, ClientError>>>,
    outcome: Option<Result<Option<DeliveryState>, ClientError>>,
}

impl Tracker {
    pub(crate) fn new(
        control: mpsc::Sender<Control>,
        link: LinkId,
        delivery_id: DeliveryNumber,
        shared: Arc<TrackerShared>,
        settlement: oneshot::Receiver<Result<Option<DeliveryState>, ClientError>>,
    ) -> Self {
        Self {
            control,
            link,
            delivery_id,
            shared,
            settlement: Some(settlement),
            outcome: None,
        }
    }

    /// The delivery-id assigned on the first transfer.
    pub fn delivery_id(&self) -> DeliveryNumber {
        self.delivery_id
    }

    /// The delivery state most recently reported by the peer.
    pub fn remote_state(&self) -> Option<DeliveryState> {
        self.shared.state.lock().remote_state.clone()
    }

    /// Whether the peer has settled the delivery.
    pub fn remote_settled(&self) -> bool {
        self.shared.state.lock().remote_settled
    }

    /// Whether this endpoint has settled the delivery.
    pub fn settled(&self) -> bool {
        self.shared.state.lock().locally_settled
    }

    /// Settles the delivery locally. Settling an already-settled
    /// delivery is a no-op.
    pub async fn settle(&mut self) -> Result<(), ClientError> {
        {
            let mut snapshot = self.shared.state.lock();
            if snapshot.locally_settled {
                return Ok(());
            }
            snapshot.locally_settled = true;
        }
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Dispose {
                link: self.link,
                delivery_id: self.delivery_id,
                settled: true,
                state: None,
                responder: Some(tx),
            })
            .await
            .map_err(|_| ClientError::dropped())?;
        rx.await.map_err(|_| ClientError::dropped())?
    }

    /// Waits for the peer to settle the delivery and returns the final
    /// remote state.
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
            // A settled delivery with no explicit state is treated as
            // accepted; the peer has forgotten it either way.
            None => Ok(()),
            _ => Err(ClientError::DeliveryState { state }),
        }
    }
}
