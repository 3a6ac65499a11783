use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{self, Handle};
use crate::error::Error;
use crate::value::Value;

/// Detach the link endpoint from the session.
///
/// <type name="detach" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:detach:list" code="0x00000000:0x00000016"/>
/// </type>
#[derive(Debug, Clone)]
pub struct Detach {
    /// <field name="handle" type="handle" mandatory="true"/>
    pub handle: Handle,

    /// <field name="closed" type="boolean" default="false"/>
    ///
    /// A closing detach ends the link permanently; a non-closing detach
    /// leaves the link name available for resumption.
    pub closed: bool,

    /// <field name="error" type="error"/>
    pub error: Option<definitions::Error>,
}

impl Composite for Detach {
    const CODE: u64 = 0x0000_0000_0000_0016;
    const NAME: &'static str = "amqp:detach:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.handle);
        enc.skippable(self.closed, false);
        enc.optional(self.error.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            handle: decoder.required("handle")?,
            closed: decoder.or_default()?,
            error: decoder.optional()?,
        })
    }
}
