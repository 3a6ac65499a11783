use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::Milliseconds;
use crate::error::Error;
use crate::value::Value;

/// Transport headers for a message.
///
/// <type name="header" class="composite" source="list" provides="section">
///     <descriptor name="amqp:header:list" code="0x00000000:0x00000070"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// <field name="durable" type="boolean" default="false"/>
    pub durable: bool,

    /// <field name="priority" type="ubyte" default="4"/>
    pub priority: Priority,

    /// <field name="ttl" type="milliseconds"/>
    pub ttl: Option<Milliseconds>,

    /// <field name="first-acquirer" type="boolean" default="false"/>
    pub first_acquirer: bool,

    /// <field name="delivery-count" type="uint" default="0"/>
    pub delivery_count: u32,
}

/// Relative message priority, defaulting to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority(pub u8);

impl Default for Priority {
    fn default() -> Self {
        Self(4)
    }
}

impl From<u8> for Priority {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

impl Composite for Header {
    const CODE: u64 = 0x0000_0000_0000_0070;
    const NAME: &'static str = "amqp:header:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.skippable(self.durable, false);
        enc.skippable(self.priority.0, 4);
        enc.optional(self.ttl);
        enc.skippable(self.first_acquirer, false);
        enc.skippable(self.delivery_count, 0);
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            durable: decoder.or_default()?,
            priority: decoder.optional::<u8>()?.map(Priority).unwrap_or_default(),
            ttl: decoder.optional()?,
            first_acquirer: decoder.or_default()?,
            delivery_count: decoder.or_default()?,
        })
    }
}
