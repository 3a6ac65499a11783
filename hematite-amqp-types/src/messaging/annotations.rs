use crate::error::Error;
use crate::primitives::{OrderedMap, Symbol};
use crate::value::Value;

/// Keys into an annotation map are restricted to symbols.
pub type Annotations = OrderedMap<Symbol, Value>;

macro_rules! annotation_section {
    ($(#[$docs:meta])* $name:ident, $code:literal, $descriptor:literal) => {
        $(#[$docs])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(pub Annotations);

        impl $name {
            /// Numeric descriptor of the section.
            pub const CODE: u64 = $code;

            /// Symbolic descriptor of the section.
            pub const NAME: &'static str = $descriptor;
        }

        impl From<Annotations> for $name {
            fn from(val: Annotations) -> Self {
                Self(val)
            }
        }

        impl From<$name> for Value {
            fn from(val: $name) -> Self {
                Value::described($name::CODE, Value::from(val.0))
            }
        }

        impl TryFrom<Value> for $name {
            type Error = Error;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                Annotations::try_from(value).map(Self)
            }
        }
    };
}

annotation_section!(
    /// Delivery-specific non-standard properties at the head of the message.
    ///
    /// <descriptor name="amqp:delivery-annotations:map" code="0x00000000:0x00000071"/>
    DeliveryAnnotations,
    0x0000_0000_0000_0071,
    "amqp:delivery-annotations:map"
);

annotation_section!(
    /// Message attributes aimed at the infrastructure.
    ///
    /// <descriptor name="amqp:message-annotations:map" code="0x00000000:0x00000072"/>
    MessageAnnotations,
    0x0000_0000_0000_0072,
    "amqp:message-annotations:map"
);

annotation_section!(
    /// Details about the message or delivery that can only be calculated
    /// or evaluated once the whole bare message has been constructed.
    ///
    /// <descriptor name="amqp:footer:map" code="0x00000000:0x00000078"/>
    Footer,
    0x0000_0000_0000_0078,
    "amqp:footer:map"
);
