use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{Fields, Handle, ReceiverSettleMode, Role, SenderSettleMode, SequenceNo};
use crate::error::Error;
use crate::messaging::{Source, Target};
use crate::primitives::{Array, OrderedMap, Symbol};
use crate::value::Value;

/// Attach a link to a session.
///
/// <type name="attach" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:attach:list" code="0x00000000:0x00000012"/>
/// </type>
#[derive(Debug, Clone)]
pub struct Attach {
    /// <field name="name" type="string" mandatory="true"/>
    ///
    /// Link names MUST be unique per direction between the two
    /// containers; both halves of a link carry the same name.
    pub name: String,

    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="role" type="role" mandatory="true"/>
    pub role: Role,

    /// <field name="snd-settle-mode" type="sender-settle-mode" default="mixed"/>
    pub snd_settle_mode: SenderSettleMode,

    /// <field name="rcv-settle-mode" type="receiver-settle-mode" default="first"/>
    pub rcv_settle_mode: ReceiverSettleMode,

    /// <field name="source" type="*" requires="source"/>
    pub source: Option<Source>,

    /// <field name="target" type="*" requires="target"/>
    pub target: Option<Target>,

    /// <field name="unsettled" type="map"/>
    ///
    /// Deliveries still unsettled on a resumed link, keyed by
    /// delivery-tag.
    pub unsettled: Option<OrderedMap<Value, Value>>,

    /// <field name="incomplete-unsettled" type="boolean" default="false"/>
    pub incomplete_unsettled: bool,

    /// <field name="initial-delivery-count" type="sequence-no"/>
    ///
    /// This MUST NOT be null if role is sender, and it is ignored if the
    /// role is receiver.
    pub initial_delivery_count: Option<SequenceNo>,

    /// <field name="max-message-size" type="ulong"/>
    pub max_message_size: Option<u64>,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Attach {
    const CODE: u64 = 0x0000_0000_0000_0012;
    const NAME: &'static str = "amqp:attach:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.name.clone());
        enc.field(self.handle);
        enc.field(self.role);
        enc.skippable(self.snd_settle_mode, SenderSettleMode::Mixed);
        enc.skippable(self.rcv_settle_mode, ReceiverSettleMode::First);
        enc.optional(self.source.clone());
        enc.optional(self.target.clone());
        enc.optional(self.unsettled.clone());
        enc.skippable(self.incomplete_unsettled, false);
        enc.optional(self.initial_delivery_count);
        enc.optional(self.max_message_size);
        enc.optional(self.offered_capabilities.clone());
        enc.optional(self.desired_capabilities.clone());
        enc.optional(self.properties.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            name: decoder.required("name")?,
            handle: decoder.required("handle")?,
            role: decoder.required("role")?,
            snd_settle_mode: decoder.or_default()?,
            rcv_settle_mode: decoder.or_default()?,
            source: decoder.optional()?,
            target: decoder.optional()?,
            unsettled: decoder.optional()?,
            incomplete_unsettled: decoder.or_default()?,
            initial_delivery_count: decoder.optional()?,
            max_message_size: decoder.optional()?,
            offered_capabilities: decoder.optional()?,
            desired_capabilities: decoder.optional()?,
            properties: decoder.optional()?,
        })
    }
}
