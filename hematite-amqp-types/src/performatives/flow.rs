use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{Fields, Handle, SequenceNo, TransferNumber};
use crate::error::Error;
use crate::value::Value;

/// Update link and session flow state.
///
/// <type name="flow" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:flow:list" code="0x00000000:0x00000013"/>
/// </type>
#[derive(Debug, Clone, Default)]
pub struct Flow {
    /// <field name="next-incoming-id" type="transfer-number"/>
    ///
    /// Unset only on a flow sent before the first incoming transfer of a
    /// session; afterwards it MUST be set.
    pub next_incoming_id: Option<TransferNumber>,

    /// <field name="incoming-window" type="uint" mandatory="true"/>
    pub incoming_window: u32,

    /// <field name="next-outgoing-id" type="transfer-number" mandatory="true"/>
    pub next_outgoing_id: TransferNumber,

    /// <field name="outgoing-window" type="uint" mandatory="true"/>
    pub outgoing_window: u32,

    /// <field name="handle" type="handle"/>
    ///
    /// Absent when the flow carries only session flow state.
    pub handle: Option<Handle>,

    /// <field name="delivery-count" type="sequence-no"/>
    pub delivery_count: Option<SequenceNo>,

    /// <field name="link-credit" type="uint"/>
    pub link_credit: Option<u32>,

    /// <field name="available" type="uint"/>
    pub available: Option<u32>,

    /// <field name="drain" type="boolean" default="false"/>
    pub drain: bool,

    /// <field name="echo" type="boolean" default="false"/>
    pub echo: bool,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Composite for Flow {
    const CODE: u64 = 0x0000_0000_0000_0013;
    const NAME: &'static str = "amqp:flow:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.optional(self.next_incoming_id);
        enc.field(self.incoming_window);
        enc.field(self.next_outgoing_id);
        enc.field(self.outgoing_window);
        enc.optional(self.handle);
        enc.optional(self.delivery_count);
        enc.optional(self.link_credit);
        enc.optional(self.available);
        enc.skippable(self.drain, false);
        enc.skippable(self.echo, false);
        enc.optional(self.properties.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            next_incoming_id: decoder.optional()?,
            incoming_window: decoder.required("incoming-window")?,
            next_outgoing_id: decoder.required("next-outgoing-id")?,
            outgoing_window: decoder.required("outgoing-window")?,
            handle: decoder.optional()?,
            delivery_count: decoder.optional()?,
            link_credit: decoder.optional()?,
            available: decoder.optional()?,
            drain: decoder.or_default()?,
            echo: decoder.or_default()?,
            properties: decoder.optional()?,
        })
    }
}
