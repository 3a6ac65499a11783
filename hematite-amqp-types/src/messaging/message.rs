use bytes::{Bytes, BytesMut};

use crate::buffer::ByteReader;
use crate::codec::write_value;
use crate::composite::composite_value;
use crate::error::Error;
use crate::registry::{CompositeValue, Registry};
use crate::value::Value;

use super::{
    AmqpSequence, AmqpValue, ApplicationProperties, Data, DeliveryAnnotations, Footer, Header,
    MessageAnnotations, Properties, Section,
};

/// The application data carried by a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    /// A single data section.
    Data(Data),

    /// A single sequence section.
    Sequence(AmqpSequence),

    /// A single value section.
    Value(AmqpValue),

    /// No body section at all.
    #[default]
    Empty,
}

/// An annotated message: the sections of Part 3.2 in order.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Transport headers.
    pub header: Option<Header>,

    /// Delivery annotations.
    pub delivery_annotations: Option<DeliveryAnnotations>,

    /// Message annotations.
    pub message_annotations: Option<MessageAnnotations>,

    /// Immutable bare-message properties.
    pub properties: Option<Properties>,

    /// Application-defined properties.
    pub application_properties: Option<ApplicationProperties>,

    /// The application data.
    pub body: Body,

    /// Footer.
    pub footer: Option<Footer>,
}

impl Message {
    /// A message whose body is a single [`AmqpValue`] section.
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            body: Body::Value(AmqpValue(value.into())),
            ..Default::default()
        }
    }

    /// A message whose body is a single [`Data`] section.
    pub fn data(data: impl Into<Bytes>) -> Self {
        Self {
            body: Body::Data(Data(data.into())),
            ..Default::default()
        }
    }

    /// A message whose body is a single [`AmqpSequence`] section.
    pub fn sequence(items: Vec<Value>) -> Self {
        Self {
            body: Body::Sequence(AmqpSequence(items)),
            ..Default::default()
        }
    }

    /// Encodes all present sections in specification order.
    pub fn encode(&self, buf: &mut BytesMut) {
        if let Some(header) = &self.header {
            write_value(buf, &composite_value(header));
        }
        if let Some(delivery_annotations) = &self.delivery_annotations {
            write_value(buf, &Value::from(delivery_annotations.clone()));
        }
        if let Some(message_annotations) = &self.message_annotations {
            write_value(buf, &Value::from(message_annotations.clone()));
        }
        if let Some(properties) = &self.properties {
            write_value(buf, &composite_value(properties));
        }
        if let Some(application_properties) = &self.application_properties {
            write_value(buf, &Value::from(application_properties.clone()));
        }
        match &self.body {
            Body::Data(data) => write_value(buf, &Value::from(data.clone())),
            Body::Sequence(sequence) => write_value(buf, &Value::from(sequence.clone())),
            Body::Value(value) => write_value(buf, &Value::from(value.clone())),
            Body::Empty => {}
        }
        if let Some(footer) = &self.footer {
            write_value(buf, &Value::from(footer.clone()));
        }
    }

    /// Encoded form of the message as a frozen buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes a payload into its sections.
    ///
    /// Sections with unknown descriptors are skipped, matching the
    /// forward-compatibility rule for described types.
    pub fn decode(registry: &Registry, payload: &[u8]) -> Result<Self, Error> {
        let mut reader = ByteReader::new(payload);
        let mut message = Message::default();
        while !reader.is_empty() {
            match registry.read_described(&mut reader)? {
                CompositeValue::Section(section) => match section {
                    Section::Header(v) => message.header = Some(v),
                    Section::DeliveryAnnotations(v) => message.delivery_annotations = Some(v),
                    Section::MessageAnnotations(v) => message.message_annotations = Some(v),
                    Section::Properties(v) => message.properties = Some(v),
                    Section::ApplicationProperties(v) => {
                        message.application_properties = Some(v)
                    }
                    Section::Data(v) => message.body = Body::Data(v),
                    Section::AmqpSequence(v) => message.body = Body::Sequence(v),
                    Section::AmqpValue(v) => message.body = Body::Value(v),
                    Section::Footer(v) => message.footer = Some(v),
                },
                CompositeValue::Unknown(_) => {}
                _ => return Err(Error::InvalidFieldType("section")),
            }
        }
        Ok(message)
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Message::value(value)
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Message::value(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::messaging::Priority;
    use crate::primitives::Symbol;

    use super::*;

    #[test]
    fn value_body_round_trips() {
        let registry = Registry::amqp();
        let message = Message::value("hello");
        let bytes = message.to_bytes();

        let decoded = Message::decode(&registry, &bytes).unwrap();
        assert_eq!(
            decoded.body,
            Body::Value(AmqpValue(Value::String("hello".into())))
        );
    }

    #[test]
    fn all_sections_round_trip() {
        let registry = Registry::amqp();
        let mut message = Message::data(Bytes::from_static(b"\x01\x02\x03"));
        message.header = Some(Header {
            durable: true,
            priority: Priority(9),
            ttl: Some(5_000),
            ..Default::default()
        });
        message.properties = Some(Properties {
            message_id: Some("m-1".into()),
            subject: Some("greeting".into()),
            content_type: Some(Symbol::from("application/octet-stream")),
            ..Default::default()
        });
        let mut application_properties = ApplicationProperties::default();
        application_properties
            .0
            .insert("retries".to_string(), Value::UInt(3));
        message.application_properties = Some(application_properties);

        let bytes = message.to_bytes();
        let decoded = Message::decode(&registry, &bytes).unwrap();

        let header = decoded.header.unwrap();
        assert!(header.durable);
        assert_eq!(header.priority, Priority(9));
        assert_eq!(header.ttl, Some(5_000));

        let properties = decoded.properties.unwrap();
        assert_eq!(properties.subject.as_deref(), Some("greeting"));

        assert_eq!(
            decoded.body,
            Body::Data(Data(Bytes::from_static(b"\x01\x02\x03")))
        );
        assert_eq!(
            decoded
                .application_properties
                .unwrap()
                .0
                .get("retries"),
            Some(&Value::UInt(3))
        );
    }

    #[test]
    fn empty_payload_decodes_to_empty_message() {
        let registry = Registry::amqp();
        let decoded = Message::decode(&registry, &[]).unwrap();
        assert_eq!(decoded.body, Body::Empty);
        assert!(decoded.header.is_none());
    }
}
