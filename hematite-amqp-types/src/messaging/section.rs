use crate::error::Error;
use crate::primitives::{Binary, OrderedMap};
use crate::value::Value;

use super::{
    DeliveryAnnotations, Footer, Header, MessageAnnotations, Properties,
};

/// A data section: opaque binary application data.
///
/// <descriptor name="amqp:data:binary" code="0x00000000:0x00000075"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Data(pub Binary);

impl Data {
    /// Numeric descriptor of the section.
    pub const CODE: u64 = 0x0000_0000_0000_0075;

    /// Symbolic descriptor of the section.
    pub const NAME: &'static str = "amqp:data:binary";
}

impl From<Data> for Value {
    fn from(val: Data) -> Self {
        Value::described(Data::CODE, Value::Binary(val.0))
    }
}

impl TryFrom<Value> for Data {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Binary::try_from(value).map(Data)
    }
}

/// A sequence section: one or more structured application data values.
///
/// <descriptor name="amqp:amqp-sequence:list" code="0x00000000:0x00000076"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmqpSequence(pub Vec<Value>);

impl AmqpSequence {
    /// Numeric descriptor of the section.
    pub const CODE: u64 = 0x0000_0000_0000_0076;

    /// Symbolic descriptor of the section.
    pub const NAME: &'static str = "amqp:amqp-sequence:list";
}

impl From<AmqpSequence> for Value {
    fn from(val: AmqpSequence) -> Self {
        Value::described(AmqpSequence::CODE, Value::List(val.0))
    }
}

impl TryFrom<Value> for AmqpSequence {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Vec::<Value>::try_from(value).map(AmqpSequence)
    }
}

/// A value section: a single structured application data value.
///
/// <descriptor name="amqp:amqp-value:*" code="0x00000000:0x00000077"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmqpValue(pub Value);

impl AmqpValue {
    /// Numeric descriptor of the section.
    pub const CODE: u64 = 0x0000_0000_0000_0077;

    /// Symbolic descriptor of the section.
    pub const NAME: &'static str = "amqp:amqp-value:*";
}

impl From<AmqpValue> for Value {
    fn from(val: AmqpValue) -> Self {
        Value::described(AmqpValue::CODE, val.0)
    }
}

/// Application-defined message properties with string keys.
///
/// <descriptor name="amqp:application-properties:map" code="0x00000000:0x00000074"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationProperties(pub OrderedMap<String, Value>);

impl ApplicationProperties {
    /// Numeric descriptor of the section.
    pub const CODE: u64 = 0x0000_0000_0000_0074;

    /// Symbolic descriptor of the section.
    pub const NAME: &'static str = "amqp:application-properties:map";
}

impl From<ApplicationProperties> for Value {
    fn from(val: ApplicationProperties) -> Self {
        Value::described(ApplicationProperties::CODE, Value::from(val.0))
    }
}

impl TryFrom<Value> for ApplicationProperties {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        OrderedMap::<String, Value>::try_from(value).map(ApplicationProperties)
    }
}

/// Any one message section.
#[derive(Debug, Clone)]
pub enum Section {
    /// 3.2.1 Header
    Header(Header),

    /// 3.2.2 Delivery Annotations
    DeliveryAnnotations(DeliveryAnnotations),

    /// 3.2.3 Message Annotations
    MessageAnnotations(MessageAnnotations),

    /// 3.2.4 Properties
    Properties(Properties),

    /// 3.2.5 Application Properties
    ApplicationProperties(ApplicationProperties),

    /// 3.2.6 Data
    Data(Data),

    /// 3.2.7 Amqp Sequence
    AmqpSequence(AmqpSequence),

    /// 3.2.8 Amqp Value
    AmqpValue(AmqpValue),

    /// 3.2.9 Footer
    Footer(Footer),
}
