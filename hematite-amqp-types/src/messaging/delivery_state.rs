use crate::composite::{
    composite_from_value, composite_value, Composite, ListDecoder, ListEncoder,
};
use crate::definitions::{self, Fields};
use crate::described::Described;
use crate::descriptor::Descriptor;
use crate::error::Error;
use crate::value::Value;

/// Partial message data received and spontaneously settled.
///
/// <descriptor name="amqp:received:list" code="0x00000000:0x00000023"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Received {
    /// <field name="section-number" type="uint" mandatory="true"/>
    pub section_number: u32,

    /// <field name="section-offset" type="ulong" mandatory="true"/>
    pub section_offset: u64,
}

impl Composite for Received {
    const CODE: u64 = 0x0000_0000_0000_0023;
    const NAME: &'static str = "amqp:received:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.section_number);
        enc.field(self.section_offset);
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            section_number: decoder.required("section-number")?,
            section_offset: decoder.required("section-offset")?,
        })
    }
}

/// The delivery reached its terminal outcome successfully.
///
/// <descriptor name="amqp:accepted:list" code="0x00000000:0x00000024"/>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accepted {}

impl Composite for Accepted {
    const CODE: u64 = 0x0000_0000_0000_0024;
    const NAME: &'static str = "amqp:accepted:list";

    fn to_list(&self) -> Vec<Value> {
        Vec::new()
    }

    fn from_list(_: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {})
    }
}

/// The delivery cannot be processed by the receiving node.
///
/// <descriptor name="amqp:rejected:list" code="0x00000000:0x00000025"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejected {
    /// <field name="error" type="error"/>
    pub error: Option<definitions::Error>,
}

impl Composite for Rejected {
    const CODE: u64 = 0x0000_0000_0000_0025;
    const NAME: &'static str = "amqp:rejected:list";

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

/// The delivery was not and will not be acted upon.
///
/// <descriptor name="amqp:released:list" code="0x00000000:0x00000026"/>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Released {}

impl Composite for Released {
    const CODE: u64 = 0x0000_0000_0000_0026;
    const NAME: &'static str = "amqp:released:list";

    fn to_list(&self) -> Vec<Value> {
        Vec::new()
    }

    fn from_list(_: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {})
    }
}

/// The delivery was modified but not processed.
///
/// <descriptor name="amqp:modified:list" code="0x00000000:0x00000027"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modified {
    /// <field name="delivery-failed" type="boolean"/>
    pub delivery_failed: Option<bool>,

    /// <field name="undeliverable-here" type="boolean"/>
    pub undeliverable_here: Option<bool>,

    /// <field name="message-annotations" type="fields"/>
    pub message_annotations: Option<Fields>,
}

impl Composite for Modified {
    const CODE: u64 = 0x0000_0000_0000_0027;
    const NAME: &'static str = "amqp:modified:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.optional(self.delivery_failed);
        enc.optional(self.undeliverable_here);
        enc.optional(self.message_annotations.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            delivery_failed: decoder.optional()?,
            undeliverable_here: decoder.optional()?,
            message_annotations: decoder.optional()?,
        })
    }
}

/// Any delivery state, terminal or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    /// 3.4.1 Received
    Received(Received),

    /// 3.4.2 Accepted
    Accepted(Accepted),

    /// 3.4.3 Rejected
    Rejected(Rejected),

    /// 3.4.4 Released
    Released(Released),

    /// 3.4.5 Modified
    Modified(Modified),
}

impl DeliveryState {
    /// Whether this state is a terminal outcome.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryState::Received(_))
    }

    /// Whether this state is the accepted outcome.
    pub fn is_accepted(&self) -> bool {
        matches!(self, DeliveryState::Accepted(_))
    }
}

impl From<Outcome> for DeliveryState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Accepted(v) => DeliveryState::Accepted(v),
            Outcome::Rejected(v) => DeliveryState::Rejected(v),
            Outcome::Released(v) => DeliveryState::Released(v),
            Outcome::Modified(v) => DeliveryState::Modified(v),
        }
    }
}

impl From<DeliveryState> for Value {
    fn from(val: DeliveryState) -> Self {
        match val {
            DeliveryState::Received(v) => composite_value(&v),
            DeliveryState::Accepted(v) => composite_value(&v),
            DeliveryState::Rejected(v) => composite_value(&v),
            DeliveryState::Released(v) => composite_value(&v),
            DeliveryState::Modified(v) => composite_value(&v),
        }
    }
}

impl TryFrom<Value> for DeliveryState {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let described = match value {
            Value::Described(described) => *described,
            _ => return Err(Error::InvalidFieldType("delivery-state")),
        };
        let code = match &described.descriptor {
            Descriptor::Code(code) => *code,
            Descriptor::Name(name) => match name.as_str() {
                Received::NAME => Received::CODE,
                Accepted::NAME => Accepted::CODE,
                Rejected::NAME => Rejected::CODE,
                Released::NAME => Released::CODE,
                Modified::NAME => Modified::CODE,
                _ => return Err(Error::InvalidFieldType("delivery-state")),
            },
        };
        // Re-wrap under the numeric descriptor so one dispatch path serves
        // both descriptor forms.
        let value = Value::Described(Box::new(Described::new(code, described.value)));
        match code {
            Received::CODE => composite_from_value(value).map(DeliveryState::Received),
            Accepted::CODE => composite_from_value(value).map(DeliveryState::Accepted),
            Rejected::CODE => composite_from_value(value).map(DeliveryState::Rejected),
            Released::CODE => composite_from_value(value).map(DeliveryState::Released),
            Modified::CODE => composite_from_value(value).map(DeliveryState::Modified),
            _ => Err(Error::InvalidFieldType("delivery-state")),
        }
    }
}

/// Terminal delivery outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 3.4.2 Accepted
    Accepted(Accepted),

    /// 3.4.3 Rejected
    Rejected(Rejected),

    /// 3.4.4 Released
    Released(Released),

    /// 3.4.5 Modified
    Modified(Modified),
}

impl Outcome {
    /// The accepted outcome.
    pub fn accepted() -> Self {
        Outcome::Accepted(Accepted {})
    }
}

impl TryFrom<DeliveryState> for Outcome {
    type Error = DeliveryState;

    fn try_from(state: DeliveryState) -> Result<Self, Self::Error> {
        match state {
            DeliveryState::Accepted(v) => Ok(Outcome::Accepted(v)),
            DeliveryState::Rejected(v) => Ok(Outcome::Rejected(v)),
            DeliveryState::Released(v) => Ok(Outcome::Released(v)),
            DeliveryState::Modified(v) => Ok(Outcome::Modified(v)),
            state @ DeliveryState::Received(_) => Err(state),
        }
    }
}

impl From<Outcome> for Value {
    fn from(val: Outcome) -> Self {
        DeliveryState::from(val).into()
    }
}

impl TryFrom<Value> for Outcome {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        DeliveryState::try_from(value)?
            .try_into()
            .map_err(|_| Error::InvalidFieldType("outcome"))
    }
}
