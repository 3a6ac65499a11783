//! Incoming deliveries.

use hematite_amqp_types::definitions::{self, DeliveryNumber, DeliveryTag, MessageFormat};
use hematite_amqp_types::messaging::{
    Accepted, Body, DeliveryState, Message, Modified, Outcome, Rejected, Released,
};
use tokio::sync::{mpsc, oneshot};

use crate::control::Control;
use crate::engine::LinkId;
use crate::Payload;

use super::error::ClientError;

/// An incoming delivery: the decoded message plus the state needed to
/// disposition it.
#[derive(Debug)]
pub struct Delivery {
    control: mpsc::Sender<Control>,
    link: LinkId,
    delivery_id: DeliveryNumber,
    delivery_tag: DeliveryTag,
    message_format: MessageFormat,
    remote_settled: bool,
    payload: Payload,
    message: Message,
    disposed: bool,
}

impl Delivery {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        control: mpsc::Sender<Control>,
        link: LinkId,
        delivery_id: DeliveryNumber,
        delivery_tag: DeliveryTag,
        message_format: MessageFormat,
        remote_settled: bool,
        payload: Payload,
        message: Message,
        disposed: bool,
    ) -> Self {
        Self {
            control,
            link,
            delivery_id,
            delivery_tag,
            message_format,
            remote_settled,
            payload,
            message,
            disposed,
        }
    }

    /// The delivery-id the peer assigned.
    pub fn delivery_id(&self) -> DeliveryNumber {
        self.delivery_id
    }

    /// The delivery-tag the peer assigned.
    pub fn delivery_tag(&self) -> &DeliveryTag {
        &self.delivery_tag
    }

    /// The message-format code from the first transfer.
    pub fn message_format(&self) -> MessageFormat {
        self.message_format
    }

    /// Whether the peer sent the delivery already settled.
    pub fn remote_settled(&self) -> bool {
        self.remote_settled
    }

    /// The decoded message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The message body.
    pub fn body(&self) -> &Body {
        &self.message.body
    }

    /// The raw payload bytes as received.
    pub fn raw_bytes(&self) -> &Payload {
        &self.payload
    }

    /// Consumes the delivery into its decoded message.
    pub fn into_message(self) -> Message {
        self.message
    }

    /// Applies the accepted outcome and settles.
    pub async fn accept(&mut self) -> Result<(), ClientError> {
        self.dispose(Outcome::Accepted(Accepted {})).await
    }

    /// Applies the rejected outcome and settles.
    pub async fn reject(&mut self, error: Option<definitions::Error>) -> Result<(), ClientError> {
        self.dispose(Outcome::Rejected(Rejected { error })).await
    }

    /// Applies the released outcome and settles.
    pub async fn release(&mut self) -> Result<(), ClientError> {
        self.dispose(Outcome::Released(Released {})).await
    }

    /// Applies the modified outcome and settles.
    pub async fn modify(
        &mut self,
        delivery_failed: bool,
        undeliverable_here: bool,
    ) -> Result<(), ClientError> {
        self.dispose(Outcome::Modified(Modified {
            delivery_failed: Some(delivery_failed),
            undeliverable_here: Some(undeliverable_here),
            message_annotations: None,
        }))
        .await
    }

    /// Applies an outcome and settles the delivery. Disposing twice is a
    /// no-op.
    pub async fn dispose(&mut self, outcome: Outcome) -> Result<(), ClientError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Dispose {
                link: self.link,
                delivery_id: self.delivery_id,
                settled: true,
                state: Some(DeliveryState::from(outcome)),
                responder: Some(tx),
            })
            .await
            .map_err(|_| ClientError::dropped())?;
        rx.await.map_err(|_| ClientError::dropped())?
    }
}
