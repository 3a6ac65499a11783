use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{DeliveryNumber, DeliveryTag, Handle, MessageFormat, ReceiverSettleMode};
use crate::error::Error;
use crate::messaging::DeliveryState;
use crate::value::Value;

/// Transfer a message.
///
/// <type name="transfer" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:transfer:list" code="0x00000000:0x00000014"/>
/// </type>
#[derive(Debug, Clone)]
pub struct Transfer {
    /// <field name="handle" type="handle" mandatory="true"/>
    ///
    /// Specifies the link on which the message is transferred.
    pub handle: Handle,

    /// <field name="delivery-id" type="delivery-number"/>
    ///
    /// MUST be supplied on the first transfer of a multi-transfer
    /// delivery; continuation transfers MAY omit it and MUST NOT change
    /// it.
    pub delivery_id: Option<DeliveryNumber>,

    /// <field name="delivery-tag" type="delivery-tag"/>
    ///
    /// Uniquely identifies the delivery attempt for a given message on
    /// this link. Same first/continuation rules as delivery-id.
    pub delivery_tag: Option<DeliveryTag>,

    /// <field name="message-format" type="message-format"/>
    pub message_format: Option<MessageFormat>,

    /// <field name="settled" type="boolean"/>
    ///
    /// Unset on the first transfer means false; unset on continuation
    /// transfers inherits the value of preceding transfers.
    pub settled: Option<bool>,

    /// <field name="more" type="boolean" default="false"/>
    ///
    /// If both more and aborted are set, aborted takes precedence.
    pub more: bool,

    /// <field name="rcv-settle-mode" type="receiver-settle-mode"/>
    pub rcv_settle_mode: Option<ReceiverSettleMode>,

    /// <field name="state" type="*" requires="delivery-state"/>
    pub state: Option<DeliveryState>,

    /// <field name="resume" type="boolean" default="false"/>
    pub resume: bool,

    /// <field name="aborted" type="boolean" default="false"/>
    ///
    /// Aborted messages SHOULD be discarded by the recipient; an aborted
    /// message is implicitly settled.
    pub aborted: bool,

    /// <field name="batchable" type="boolean" default="false"/>
    pub batchable: bool,
}

impl Transfer {
    /// A continuation transfer for an already-announced delivery.
    pub fn continuation(handle: Handle, more: bool) -> Self {
        Self {
            handle,
            delivery_id: None,
            delivery_tag: None,
            message_format: None,
            settled: None,
            more,
            rcv_settle_mode: None,
            state: None,
            resume: false,
            aborted: false,
            batchable: false,
        }
    }
}

impl Composite for Transfer {
    const CODE: u64 = 0x0000_0000_0000_0014;
    const NAME: &'static str = "amqp:transfer:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.handle);
        enc.optional(self.delivery_id);
        enc.optional(self.delivery_tag.clone());
        enc.optional(self.message_format);
        enc.optional(self.settled);
        enc.skippable(self.more, false);
        enc.optional(self.rcv_settle_mode);
        enc.optional(self.state.clone());
        enc.skippable(self.resume, false);
        enc.skippable(self.aborted, false);
        enc.skippable(self.batchable, false);
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            handle: decoder.required("handle")?,
            delivery_id: decoder.optional()?,
            delivery_tag: decoder.optional()?,
            message_format: decoder.optional()?,
            settled: decoder.optional()?,
            more: decoder.or_default()?,
            rcv_settle_mode: decoder.optional()?,
            state: decoder.optional()?,
            resume: decoder.or_default()?,
            aborted: decoder.or_default()?,
            batchable: decoder.or_default()?,
        })
    }
}
