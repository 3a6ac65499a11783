use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions;
use crate::error::Error;
use crate::value::Value;

/// End the session.
///
/// <type name="end" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:end:list" code="0x00000000:0x00000017"/>
/// </type>
#[derive(Debug, Clone, Default)]
pub struct End {
    /// <field name="error" type="error"/>
    pub error: Option<definitions::Error>,
}

impl Composite for End {
    const CODE: u64 = 0x0000_0000_0000_0017;
    const NAME: &'static str = "amqp:end:list";

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
