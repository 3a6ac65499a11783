use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::error::Error as CodecError;
use crate::value::Value;

use super::{ErrorCondition, Fields};

/// Details of an error.
///
/// <type name="error" class="composite" source="list">
///     <descriptor name="amqp:error:list" code="0x00000000:0x0000001d"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// <field name="condition" type="symbol" requires="error-condition" mandatory="true"/>
    pub condition: ErrorCondition,

    /// <field name="description" type="string"/>
    pub description: Option<String>,

    /// <field name="info" type="fields"/>
    pub info: Option<Fields>,
}

impl Error {
    /// Creates a new error description.
    pub fn new(
        condition: impl Into<ErrorCondition>,
        description: impl Into<Option<String>>,
        info: impl Into<Option<Fields>>,
    ) -> Self {
        Self {
            condition: condition.into(),
            description: description.into(),
            info: info.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.condition)?;
        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

macro_rules! impl_from_condition {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Error {
                fn from(condition: $ty) -> Self {
                    Self {
                        condition: condition.into(),
                        description: None,
                        info: None,
                    }
                }
            }
        )*
    };
}

impl_from_condition!(
    ErrorCondition,
    super::AmqpError,
    super::ConnectionError,
    super::SessionError,
    super::LinkError
);

impl Composite for Error {
    const CODE: u64 = 0x0000_0000_0000_001d;
    const NAME: &'static str = "amqp:error:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.condition.clone());
        enc.optional(self.description.clone());
        enc.optional(self.info.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, CodecError> {
        Ok(Self {
            condition: decoder.required("condition")?,
            description: decoder.optional()?,
            info: decoder.optional()?,
        })
    }
}

impl From<Error> for Value {
    fn from(val: Error) -> Self {
        crate::composite::composite_value(&val)
    }
}

impl TryFrom<Value> for Error {
    type Error = CodecError;

    fn try_from(value: Value) -> Result<Self, CodecError> {
        crate::composite::composite_from_value(value)
    }
}
