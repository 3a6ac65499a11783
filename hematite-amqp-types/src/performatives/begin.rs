use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{Fields, Handle, TransferNumber};
use crate::error::Error;
use crate::primitives::{Array, Symbol};
use crate::value::Value;

/// Begin a session on a channel.
///
/// <type name="begin" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:begin:list" code="0x00000000:0x00000011"/>
/// </type>
#[derive(Debug, Clone)]
pub struct Begin {
    /// <field name="remote-channel" type="ushort"/>
    ///
    /// On a locally initiated session this field is unset; when a peer
    /// answers, it carries the channel of the session being answered.
    pub remote_channel: Option<u16>,

    /// <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
    pub next_outgoing_id: TransferNumber,

    /// <field name="incoming-window" type="uint" mandatory="true"/>
    pub incoming_window: u32,

    /// <field name="outgoing-window" type="uint" mandatory="true"/>
    pub outgoing_window: u32,

    /// <field name="handle-max" type="handle" default="4294967295"/>
    pub handle_max: Handle,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Begin {
    const CODE: u64 = 0x0000_0000_0000_0011;
    const NAME: &'static str = "amqp:begin:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.optional(self.remote_channel);
        enc.field(self.next_outgoing_id);
        enc.field(self.incoming_window);
        enc.field(self.outgoing_window);
        enc.skippable(self.handle_max.0, u32::MAX);
        enc.optional(self.offered_capabilities.clone());
        enc.optional(self.desired_capabilities.clone());
        enc.optional(self.properties.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            remote_channel: decoder.optional()?,
            next_outgoing_id: decoder.required("next-outgoing-id")?,
            incoming_window: decoder.required("incoming-window")?,
            outgoing_window: decoder.required("outgoing-window")?,
            handle_max: decoder.optional()?.unwrap_or_default(),
            offered_capabilities: decoder.optional()?,
            desired_capabilities: decoder.optional()?,
            properties: decoder.optional()?,
        })
    }
}
