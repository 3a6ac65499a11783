//! List framing shared by all composite (described-list) types.
//!
//! Every performative, messaging list section and terminus type is a
//! described list with positional, nullable fields. [`ListEncoder`]
//! writes exactly the highest-index non-absent field plus everything
//! below it; [`ListDecoder`] treats null and missing trailing positions
//! as absent and ignores extra trailing positions it does not know.

use bytes::BytesMut;

use crate::codec::{write_value, read_value};
use crate::buffer::ByteReader;
use crate::codec::FormatCode;
use crate::described::Described;
use crate::descriptor::Descriptor;
use crate::error::Error;
use crate::primitives::{Array, Binary, OrderedMap, Symbol, Timestamp, Uuid};
use crate::value::Value;

/// A composite type: a described list with a fixed field order.
pub trait Composite: Sized {
    /// Numeric descriptor (domain-id shifted into the upper 32 bits).
    const CODE: u64;

    /// Symbolic descriptor, e.g. `amqp:open:list`.
    const NAME: &'static str;

    /// Encodes the fields in positional order.
    fn to_list(&self) -> Vec<Value>;

    /// Decodes the fields from positional order.
    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error>;
}

/// Positional field writer with trailing-null truncation.
#[derive(Debug, Default)]
pub struct ListEncoder {
    fields: Vec<Value>,
}

impl ListEncoder {
    /// Creates an empty field list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a mandatory field.
    pub fn field(&mut self, value: impl Into<Value>) {
        self.fields.push(value.into());
    }

    /// Appends an optional field, null when absent.
    pub fn optional<T: Into<Value>>(&mut self, value: Option<T>) {
        match value {
            Some(value) => self.fields.push(value.into()),
            None => self.fields.push(Value::Null),
        }
    }

    /// Appends a defaulted field, null when the value equals its default.
    pub fn skippable<T: Into<Value> + PartialEq>(&mut self, value: T, default: T) {
        if value == default {
            self.fields.push(Value::Null);
        } else {
            self.fields.push(value.into());
        }
    }

    /// Finishes the list, dropping trailing nulls.
    pub fn into_list(mut self) -> Vec<Value> {
        while matches!(self.fields.last(), Some(Value::Null)) {
            self.fields.pop();
        }
        self.fields
    }
}

/// Positional field reader tolerating absent trailing fields.
#[derive(Debug)]
pub struct ListDecoder {
    iter: std::vec::IntoIter<Value>,
}

impl ListDecoder {
    /// Wraps an already-decoded field list.
    pub fn new(fields: Vec<Value>) -> Self {
        Self {
            iter: fields.into_iter(),
        }
    }

    /// Wraps a described-list body. Null decodes as the empty list,
    /// which some peers send for composites with no populated fields.
    pub fn from_body(body: Value) -> Result<Self, Error> {
        match body {
            Value::List(fields) => Ok(Self::new(fields)),
            Value::Null => Ok(Self::new(Vec::new())),
            _ => Err(Error::UnexpectedFormatCode {
                code: FormatCode::Described as u8,
                expecting: "a described list",
            }),
        }
    }

    /// Next field as a raw value, if present.
    pub fn next_raw(&mut self) -> Option<Value> {
        self.iter.next()
    }

    /// Next field, absent when null or past the encoded count.
    pub fn optional<T>(&mut self) -> Result<Option<T>, Error>
    where
        T: TryFrom<Value, Error = Error>,
    {
        match self.iter.next() {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::try_from(value).map(Some),
        }
    }

    /// Next field, which the specification marks mandatory.
    pub fn required<T>(&mut self, name: &'static str) -> Result<T, Error>
    where
        T: TryFrom<Value, Error = Error>,
    {
        self.optional()?.ok_or(Error::MandatoryFieldIsNull(name))
    }

    /// Next field, falling back to the type's default when absent.
    pub fn or_default<T>(&mut self) -> Result<T, Error>
    where
        T: TryFrom<Value, Error = Error> + Default,
    {
        Ok(self.optional()?.unwrap_or_default())
    }
}

/// Wraps a composite into its described-list [`Value`] form.
pub fn composite_value<T: Composite>(item: &T) -> Value {
    Value::described(T::CODE, Value::List(item.to_list()))
}

/// Encodes a composite onto the wire.
pub fn encode_composite<T: Composite>(buf: &mut BytesMut, item: &T) {
    write_value(buf, &composite_value(item));
}

/// Decodes a composite from its described-list body.
pub fn decode_composite_body<T: Composite>(body: Value) -> Result<T, Error> {
    let mut decoder = ListDecoder::from_body(body)?;
    T::from_list(&mut decoder)
}

/// Decodes a composite from a full described value, checking the
/// descriptor in either its numeric or symbolic form.
pub fn composite_from_value<T: Composite>(value: Value) -> Result<T, Error> {
    match value {
        Value::Described(described) => {
            let Described { descriptor, value } = *described;
            match descriptor {
                Descriptor::Code(code) if code == T::CODE => decode_composite_body(value),
                Descriptor::Name(name) if name.as_str() == T::NAME => decode_composite_body(value),
                _ => Err(Error::InvalidFieldType(T::NAME)),
            }
        }
        _ => Err(Error::InvalidFieldType(T::NAME)),
    }
}

/// Decodes a composite straight off the wire.
pub fn read_composite<T: Composite>(reader: &mut ByteReader<'_>) -> Result<T, Error> {
    composite_from_value(read_value(reader)?)
}

macro_rules! try_from_value {
    ($ty:ty, $variant:ident, $expecting:literal) => {
        impl TryFrom<Value> for $ty {
            type Error = Error;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    Value::$variant(v) => Ok(v),
                    _ => Err(Error::UnexpectedFormatCode {
                        code: 0,
                        expecting: $expecting,
                    }),
                }
            }
        }
    };
}

try_from_value!(bool, Bool, "a boolean");
try_from_value!(u8, UByte, "an unsigned byte");
try_from_value!(u16, UShort, "an unsigned short");
try_from_value!(u64, ULong, "an unsigned long");
try_from_value!(String, String, "a string");
try_from_value!(Symbol, Symbol, "a symbol");
try_from_value!(Binary, Binary, "a binary value");
try_from_value!(Timestamp, Timestamp, "a timestamp");
try_from_value!(Uuid, Uuid, "a uuid");
try_from_value!(Vec<Value>, List, "a list");
try_from_value!(OrderedMap<Value, Value>, Map, "a map");

// Some peers encode small unsigned fields with a narrower type than the
// spec'd one, so widen rather than reject.
impl TryFrom<Value> for u32 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::UInt(v) => Ok(v),
            Value::UShort(v) => Ok(v as u32),
            Value::UByte(v) => Ok(v as u32),
            _ => Err(Error::UnexpectedFormatCode {
                code: 0,
                expecting: "an unsigned int",
            }),
        }
    }
}

impl TryFrom<Value> for Array<Symbol> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let items = match value {
            Value::Array(array) => array.into_inner(),
            // A single symbol where "multiple" is allowed means one element
            Value::Symbol(symbol) => return Ok(Array::from(vec![symbol])),
            _ => {
                return Err(Error::UnexpectedFormatCode {
                    code: 0,
                    expecting: "an array of symbols",
                })
            }
        };
        items
            .into_iter()
            .map(Symbol::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Array::from)
    }
}

impl From<Array<Symbol>> for Value {
    fn from(val: Array<Symbol>) -> Self {
        Value::Array(Array::from(
            val.into_inner().into_iter().map(Value::Symbol).collect::<Vec<_>>(),
        ))
    }
}

impl TryFrom<Value> for OrderedMap<Symbol, Value> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let map = OrderedMap::<Value, Value>::try_from(value)?;
        map.into_iter()
            .map(|(k, v)| Symbol::try_from(k).map(|k| (k, v)))
            .collect()
    }
}

impl From<OrderedMap<Symbol, Value>> for Value {
    fn from(val: OrderedMap<Symbol, Value>) -> Self {
        Value::Map(
            val.into_iter()
                .map(|(k, v)| (Value::Symbol(k), v))
                .collect(),
        )
    }
}

impl TryFrom<Value> for OrderedMap<String, Value> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let map = OrderedMap::<Value, Value>::try_from(value)?;
        map.into_iter()
            .map(|(k, v)| String::try_from(k).map(|k| (k, v)))
            .collect()
    }
}

impl From<OrderedMap<String, Value>> for Value {
    fn from(val: OrderedMap<String, Value>) -> Self {
        Value::Map(
            val.into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_nulls_are_truncated() {
        let mut enc = ListEncoder::new();
        enc.field("container".to_string());
        enc.optional(None::<String>);
        enc.skippable(0u32, 0u32);
        assert_eq!(enc.into_list(), vec![Value::String("container".into())]);
    }

    #[test]
    fn interior_nulls_are_kept() {
        let mut enc = ListEncoder::new();
        enc.optional(None::<String>);
        enc.field(5u32);
        assert_eq!(enc.into_list(), vec![Value::Null, Value::UInt(5)]);
    }

    #[test]
    fn missing_trailing_fields_decode_as_absent() {
        let mut dec = ListDecoder::new(vec![Value::String("x".into())]);
        assert_eq!(dec.required::<String>("name").unwrap(), "x");
        assert_eq!(dec.optional::<u32>().unwrap(), None);
        assert_eq!(dec.or_default::<u32>().unwrap(), 0);
    }

    #[test]
    fn mandatory_null_is_an_error() {
        let mut dec = ListDecoder::new(vec![Value::Null]);
        assert_eq!(
            dec.required::<String>("name"),
            Err(Error::MandatoryFieldIsNull("name"))
        );
    }
}
