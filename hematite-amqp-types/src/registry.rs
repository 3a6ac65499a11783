//! Runtime registry of described types.
//!
//! Decoding a frame body or a message section starts from a descriptor
//! read off the wire. The registry maps numeric descriptors to decode
//! functions, with a parallel symbol index so the symbolic aliases
//! dispatch to the same entry. Unknown descriptors do not fail: they
//! decode to the generic [`Described`] form.
//!
//! A registry instance is built per engine at construction time; there
//! is no process-global state.

use std::collections::HashMap;

use crate::buffer::ByteReader;
use crate::codec::read_value;
use crate::composite::{decode_composite_body, Composite};
use crate::described::Described;
use crate::descriptor::Descriptor;
use crate::error::Error;
use crate::messaging::{
    AmqpSequence, AmqpValue, ApplicationProperties, Data, DeliveryAnnotations, Footer, Header,
    Message, MessageAnnotations, Properties, Section,
};
use crate::performatives::{
    Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Performative, Transfer,
};
use crate::primitives::Symbol;
use crate::sasl::{
    SaslChallenge, SaslFrameBody, SaslInit, SaslMechanisms, SaslOutcome, SaslResponse,
};
use crate::value::Value;

/// A value decoded through the registry.
#[derive(Debug, Clone)]
pub enum CompositeValue {
    /// An AMQP frame body.
    Performative(Performative),

    /// A message section.
    Section(Section),

    /// A SASL frame body.
    Sasl(SaslFrameBody),

    /// A described type the registry has no decoder for.
    Unknown(Described<Value>),
}

type DecodeFn = fn(Value) -> Result<CompositeValue, Error>;

/// Descriptor-keyed dispatch table for described-type decoding.
#[derive(Debug, Default)]
pub struct Registry {
    by_code: HashMap<u64, DecodeFn>,
    code_by_name: HashMap<Symbol, u64>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every AMQP 1.0 transport, messaging and
    /// SASL type registered.
    pub fn amqp() -> Self {
        let mut registry = Self::new();

        registry.register(Open::CODE, Open::NAME, |body| {
            decode_composite_body(body).map(|p| CompositeValue::Performative(Performative::Open(p)))
        });
        registry.register(Begin::CODE, Begin::NAME, |body| {
            decode_composite_body(body)
                .map(|p| CompositeValue::Performative(Performative::Begin(p)))
        });
        registry.register(Attach::CODE, Attach::NAME, |body| {
            decode_composite_body(body)
                .map(|p| CompositeValue::Performative(Performative::Attach(p)))
        });
        registry.register(Flow::CODE, Flow::NAME, |body| {
            decode_composite_body(body).map(|p| CompositeValue::Performative(Performative::Flow(p)))
        });
        registry.register(Transfer::CODE, Transfer::NAME, |body| {
            decode_composite_body(body)
                .map(|p| CompositeValue::Performative(Performative::Transfer(p)))
        });
        registry.register(Disposition::CODE, Disposition::NAME, |body| {
            decode_composite_body(body)
                .map(|p| CompositeValue::Performative(Performative::Disposition(p)))
        });
        registry.register(Detach::CODE, Detach::NAME, |body| {
            decode_composite_body(body)
                .map(|p| CompositeValue::Performative(Performative::Detach(p)))
        });
        registry.register(End::CODE, End::NAME, |body| {
            decode_composite_body(body).map(|p| CompositeValue::Performative(Performative::End(p)))
        });
        registry.register(Close::CODE, Close::NAME, |body| {
            decode_composite_body(body)
                .map(|p| CompositeValue::Performative(Performative::Close(p)))
        });

        registry.register(Header::CODE, Header::NAME, |body| {
            decode_composite_body(body).map(|s| CompositeValue::Section(Section::Header(s)))
        });
        registry.register(DeliveryAnnotations::CODE, DeliveryAnnotations::NAME, |body| {
            DeliveryAnnotations::try_from(body)
                .map(|s| CompositeValue::Section(Section::DeliveryAnnotations(s)))
        });
        registry.register(MessageAnnotations::CODE, MessageAnnotations::NAME, |body| {
            MessageAnnotations::try_from(body)
                .map(|s| CompositeValue::Section(Section::MessageAnnotations(s)))
        });
        registry.register(Properties::CODE, Properties::NAME, |body| {
            decode_composite_body(body).map(|s| CompositeValue::Section(Section::Properties(s)))
        });
        registry.register(
            ApplicationProperties::CODE,
            ApplicationProperties::NAME,
            |body| {
                ApplicationProperties::try_from(body)
                    .map(|s| CompositeValue::Section(Section::ApplicationProperties(s)))
            },
        );
        registry.register(Data::CODE, Data::NAME, |body| {
            Data::try_from(body).map(|s| CompositeValue::Section(Section::Data(s)))
        });
        registry.register(AmqpSequence::CODE, AmqpSequence::NAME, |body| {
            AmqpSequence::try_from(body).map(|s| CompositeValue::Section(Section::AmqpSequence(s)))
        });
        registry.register(AmqpValue::CODE, AmqpValue::NAME, |body| {
            Ok(CompositeValue::Section(Section::AmqpValue(AmqpValue(body))))
        });
        registry.register(Footer::CODE, Footer::NAME, |body| {
            Footer::try_from(body).map(|s| CompositeValue::Section(Section::Footer(s)))
        });

        registry.register(SaslMechanisms::CODE, SaslMechanisms::NAME, |body| {
            decode_composite_body(body)
                .map(|s| CompositeValue::Sasl(SaslFrameBody::Mechanisms(s)))
        });
        registry.register(SaslInit::CODE, SaslInit::NAME, |body| {
            decode_composite_body(body).map(|s| CompositeValue::Sasl(SaslFrameBody::Init(s)))
        });
        registry.register(SaslChallenge::CODE, SaslChallenge::NAME, |body| {
            decode_composite_body(body).map(|s| CompositeValue::Sasl(SaslFrameBody::Challenge(s)))
        });
        registry.register(SaslResponse::CODE, SaslResponse::NAME, |body| {
            decode_composite_body(body).map(|s| CompositeValue::Sasl(SaslFrameBody::Response(s)))
        });
        registry.register(SaslOutcome::CODE, SaslOutcome::NAME, |body| {
            decode_composite_body(body).map(|s| CompositeValue::Sasl(SaslFrameBody::Outcome(s)))
        });

        registry
    }

    /// Registers a decoder under its numeric descriptor and symbolic alias.
    pub fn register(&mut self, code: u64, name: &str, decode: DecodeFn) {
        self.by_code.insert(code, decode);
        self.code_by_name.insert(Symbol::from(name), code);
    }

    /// Dispatches a described body to the registered decoder, or wraps
    /// it unchanged when the descriptor is unknown.
    pub fn decode(&self, descriptor: Descriptor, body: Value) -> Result<CompositeValue, Error> {
        let code = match &descriptor {
            Descriptor::Code(code) => Some(*code),
            Descriptor::Name(name) => self.code_by_name.get(name).copied(),
        };
        match code.and_then(|code| self.by_code.get(&code)) {
            Some(decode) => decode(body),
            None => Ok(CompositeValue::Unknown(Described { descriptor, value: body })),
        }
    }

    /// Reads one described value off the wire and dispatches it.
    pub fn read_described(&self, reader: &mut ByteReader<'_>) -> Result<CompositeValue, Error> {
        match read_value(reader)? {
            Value::Described(described) => {
                let Described { descriptor, value } = *described;
                self.decode(descriptor, value)
            }
            _ => Err(Error::UnexpectedFormatCode {
                code: 0,
                expecting: "a described type",
            }),
        }
    }

    /// Decodes a message payload: a sequence of sections.
    pub fn decode_message(&self, payload: &[u8]) -> Result<Message, Error> {
        Message::decode(self, payload)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use crate::codec::write_value;
    use crate::composite::composite_value;

    use super::*;

    #[test]
    fn dispatches_numeric_and_symbolic_descriptors() {
        let registry = Registry::amqp();
        let open = Open::new("c1");

        let by_code = registry
            .decode(Descriptor::Code(Open::CODE), Value::List(open.to_list()))
            .unwrap();
        assert!(matches!(
            by_code,
            CompositeValue::Performative(Performative::Open(_))
        ));

        let by_name = registry
            .decode(Descriptor::from(Open::NAME), Value::List(open.to_list()))
            .unwrap();
        assert!(matches!(
            by_name,
            CompositeValue::Performative(Performative::Open(_))
        ));
    }

    #[test]
    fn unknown_descriptor_decodes_to_generic_described() {
        let registry = Registry::amqp();
        let decoded = registry
            .decode(Descriptor::Code(0xdead_beef), Value::String("x".into()))
            .unwrap();
        match decoded {
            CompositeValue::Unknown(described) => {
                assert_eq!(described.descriptor, Descriptor::Code(0xdead_beef));
                assert_eq!(described.value, Value::String("x".into()));
            }
            other => panic!("expected unknown, got {:?}", other),
        }
    }

    #[test]
    fn reads_described_values_off_the_wire() {
        let registry = Registry::amqp();
        let mut buf = BytesMut::new();
        write_value(&mut buf, &composite_value(&End::default()));

        let mut reader = ByteReader::new(&buf);
        let decoded = registry.read_described(&mut reader).unwrap();
        assert!(matches!(
            decoded,
            CompositeValue::Performative(Performative::End(_))
        ));
        assert!(reader.is_empty());
    }
}
