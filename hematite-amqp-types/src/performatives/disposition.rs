use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{DeliveryNumber, Role};
use crate::error::Error;
use crate::messaging::DeliveryState;
use crate::value::Value;

/// Inform the remote peer of delivery state changes.
///
/// <type name="disposition" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:disposition:list" code="0x00000000:0x00000015"/>
/// </type>
#[derive(Debug, Clone)]
pub struct Disposition {
    /// <field name="role" type="role" mandatory="true"/>
    ///
    /// The role of the issuing endpoint; the frame applies to deliveries
    /// on links with the matching role at the receiving peer.
    pub role: Role,

    /// <field name="first" type="delivery-number" mandatory="true"/>
    pub first: DeliveryNumber,

    /// <field name="last" type="delivery-number"/>
    ///
    /// Absent means the frame applies to `first` alone.
    pub last: Option<DeliveryNumber>,

    /// <field name="settled" type="boolean" default="false"/>
    pub settled: bool,

    /// <field name="state" type="*" requires="delivery-state"/>
    pub state: Option<DeliveryState>,

    /// <field name="batchable" type="boolean" default="false"/>
    pub batchable: bool,
}

impl Composite for Disposition {
    const CODE: u64 = 0x0000_0000_0000_0015;
    const NAME: &'static str = "amqp:disposition:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.role);
        enc.field(self.first);
        enc.optional(self.last);
        enc.skippable(self.settled, false);
        enc.optional(self.state.clone());
        enc.skippable(self.batchable, false);
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            role: decoder.required("role")?,
            first: decoder.required("first")?,
            last: decoder.optional()?,
            settled: decoder.or_default()?,
            state: decoder.optional()?,
            batchable: decoder.or_default()?,
        })
    }
}
