use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions;
use crate::error::Error;
use crate::value::Value;

/// Signal closing of the connection.
///
/// <type name="close" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:close:list" code="0x00000000:0x00000018"/>
/// </type>
#[derive(Debug, Clone, Default)]
pub struct Close {
    /// <field name="error" type="error"/>
    pub error: Option<definitions::Error>,
}

impl Composite for Close {
    const CODE: u64 = 0x0000_0000_0000_0018;
    const NAME: &'static str = "amqp:close:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.optional(self.error.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            error: decoder.optional()?,
        })
    }
}
