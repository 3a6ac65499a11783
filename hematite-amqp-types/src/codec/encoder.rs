//! Writers for the primitive encodings.

use bytes::{BufMut, BytesMut};

use crate::described::Described;
use crate::descriptor::Descriptor;
use crate::primitives::{
    Array, Dec128, Dec32, Dec64, OrderedMap, Symbol, Timestamp, Uuid,
};
use crate::value::Value;

use super::format_code::FormatCode;

/// Writes a null value.
pub fn write_null(buf: &mut BytesMut) {
    buf.put_u8(FormatCode::Null as u8);
}

/// Writes a boolean using the contracted true/false encodings.
pub fn write_bool(buf: &mut BytesMut, val: bool) {
    let code = if val {
        FormatCode::BooleanTrue
    } else {
        FormatCode::BooleanFalse
    };
    buf.put_u8(code as u8);
}

/// Writes an 8-bit unsigned integer.
pub fn write_ubyte(buf: &mut BytesMut, val: u8) {
    buf.put_u8(FormatCode::UByte as u8);
    buf.put_u8(val);
}

/// Writes a 16-bit unsigned integer.
pub fn write_ushort(buf: &mut BytesMut, val: u16) {
    buf.put_u8(FormatCode::UShort as u8);
    buf.put_u16(val);
}

/// Writes a 32-bit unsigned integer with the smallest legal width.
pub fn write_uint(buf: &mut BytesMut, val: u32) {
    if val == 0 {
        buf.put_u8(FormatCode::UInt0 as u8);
    } else if val <= u8::MAX as u32 {
        buf.put_u8(FormatCode::SmallUInt as u8);
        buf.put_u8(val as u8);
    } else {
        buf.put_u8(FormatCode::UInt as u8);
        buf.put_u32(val);
    }
}

/// Writes a 64-bit unsigned integer with the smallest legal width.
pub fn write_ulong(buf: &mut BytesMut, val: u64) {
    if val == 0 {
        buf.put_u8(FormatCode::ULong0 as u8);
    } else if val <= u8::MAX as u64 {
        buf.put_u8(FormatCode::SmallULong as u8);
        buf.put_u8(val as u8);
    } else {
        buf.put_u8(FormatCode::ULong as u8);
        buf.put_u64(val);
    }
}

/// Writes an 8-bit signed integer.
pub fn write_byte(buf: &mut BytesMut, val: i8) {
    buf.put_u8(FormatCode::Byte as u8);
    buf.put_i8(val);
}

/// Writes a 16-bit signed integer.
pub fn write_short(buf: &mut BytesMut, val: i16) {
    buf.put_u8(FormatCode::Short as u8);
    buf.put_i16(val);
}

/// Writes a 32-bit signed integer with the smallest legal width.
pub fn write_int(buf: &mut BytesMut, val: i32) {
    if (i8::MIN as i32..=i8::MAX as i32).contains(&val) {
        buf.put_u8(FormatCode::SmallInt as u8);
        buf.put_i8(val as i8);
    } else {
        buf.put_u8(FormatCode::Int as u8);
        buf.put_i32(val);
    }
}

/// Writes a 64-bit signed integer with the smallest legal width.
pub fn write_long(buf: &mut BytesMut, val: i64) {
    if (i8::MIN as i64..=i8::MAX as i64).contains(&val) {
        buf.put_u8(FormatCode::SmallLong as u8);
        buf.put_i8(val as i8);
    } else {
        buf.put_u8(FormatCode::Long as u8);
        buf.put_i64(val);
    }
}

/// Writes an IEEE 754 binary32.
pub fn write_float(buf: &mut BytesMut, val: f32) {
    buf.put_u8(FormatCode::Float as u8);
    buf.put_f32(val);
}

/// Writes an IEEE 754 binary64.
pub fn write_double(buf: &mut BytesMut, val: f64) {
    buf.put_u8(FormatCode::Double as u8);
    buf.put_f64(val);
}

/// Writes a decimal32 payload.
pub fn write_decimal32(buf: &mut BytesMut, val: &Dec32) {
    buf.put_u8(FormatCode::Decimal32 as u8);
    buf.put_slice(val.as_inner());
}

/// Writes a decimal64 payload.
pub fn write_decimal64(buf: &mut BytesMut, val: &Dec64) {
    buf.put_u8(FormatCode::Decimal64 as u8);
    buf.put_slice(val.as_inner());
}

/// Writes a decimal128 payload.
pub fn write_decimal128(buf: &mut BytesMut, val: &Dec128) {
    buf.put_u8(FormatCode::Decimal128 as u8);
    buf.put_slice(val.as_inner());
}

/// Writes a single unicode character as UTF-32BE.
pub fn write_char(buf: &mut BytesMut, val: char) {
    buf.put_u8(FormatCode::Char as u8);
    buf.put_u32(val as u32);
}

/// Writes a timestamp as milliseconds since the unix epoch.
pub fn write_timestamp(buf: &mut BytesMut, val: Timestamp) {
    buf.put_u8(FormatCode::Timestamp as u8);
    buf.put_i64(val.milliseconds());
}

/// Writes a uuid.
pub fn write_uuid(buf: &mut BytesMut, val: &Uuid) {
    buf.put_u8(FormatCode::Uuid as u8);
    buf.put_slice(val.as_inner());
}

/// Writes a binary value with the smallest legal width.
pub fn write_binary(buf: &mut BytesMut, val: &[u8]) {
    if val.len() <= u8::MAX as usize {
        buf.put_u8(FormatCode::VBin8 as u8);
        buf.put_u8(val.len() as u8);
    } else {
        buf.put_u8(FormatCode::VBin32 as u8);
        buf.put_u32(val.len() as u32);
    }
    buf.put_slice(val);
}

/// Writes a string with the smallest legal width.
pub fn write_string(buf: &mut BytesMut, val: &str) {
    let bytes = val.as_bytes();
    if bytes.len() <= u8::MAX as usize {
        buf.put_u8(FormatCode::Str8 as u8);
        buf.put_u8(bytes.len() as u8);
    } else {
        buf.put_u8(FormatCode::Str32 as u8);
        buf.put_u32(bytes.len() as u32);
    }
    buf.put_slice(bytes);
}

/// Writes a symbol with the smallest legal width.
pub fn write_symbol(buf: &mut BytesMut, val: &Symbol) {
    let bytes = val.as_str().as_bytes();
    if bytes.len() <= u8::MAX as usize {
        buf.put_u8(FormatCode::Sym8 as u8);
        buf.put_u8(bytes.len() as u8);
    } else {
        buf.put_u8(FormatCode::Sym32 as u8);
        buf.put_u32(bytes.len() as u32);
    }
    buf.put_slice(bytes);
}

/// Writes the compound header for a list/map given the encoded body.
fn put_compound(buf: &mut BytesMut, code8: FormatCode, code32: FormatCode, count: usize, body: &[u8]) {
    // size counts the count field plus the body
    if body.len() + 1 <= u8::MAX as usize && count <= u8::MAX as usize {
        buf.put_u8(code8 as u8);
        buf.put_u8((body.len() + 1) as u8);
        buf.put_u8(count as u8);
    } else {
        buf.put_u8(code32 as u8);
        buf.put_u32((body.len() + 4) as u32);
        buf.put_u32(count as u32);
    }
    buf.put_slice(body);
}

/// Writes a list, choosing `list0`/`list8`/`list32`.
pub fn write_list(buf: &mut BytesMut, items: &[Value]) {
    if items.is_empty() {
        buf.put_u8(FormatCode::List0 as u8);
        return;
    }
    let mut body = BytesMut::new();
    for item in items {
        write_value(&mut body, item);
    }
    put_compound(buf, FormatCode::List8, FormatCode::List32, items.len(), &body);
}

/// Writes a map, choosing `map8`/`map32`. The count is the number of
/// keys plus the number of values.
pub fn write_map(buf: &mut BytesMut, map: &OrderedMap<Value, Value>) {
    let mut body = BytesMut::new();
    for (key, value) in map {
        write_value(&mut body, key);
        write_value(&mut body, value);
    }
    put_compound(buf, FormatCode::Map8, FormatCode::Map32, map.len() * 2, &body);
}

/// Element constructor for an array, derived from the first element.
///
/// Array elements share one constructor, so the widest encoding of the
/// element type is used regardless of individual values.
fn array_constructor(buf: &mut BytesMut, first: &Value) {
    let code = match first {
        Value::Null => FormatCode::Null,
        Value::Bool(_) => FormatCode::Boolean,
        Value::UByte(_) => FormatCode::UByte,
        Value::UShort(_) => FormatCode::UShort,
        Value::UInt(_) => FormatCode::UInt,
        Value::ULong(_) => FormatCode::ULong,
        Value::Byte(_) => FormatCode::Byte,
        Value::Short(_) => FormatCode::Short,
        Value::Int(_) => FormatCode::Int,
        Value::Long(_) => FormatCode::Long,
        Value::Float(_) => FormatCode::Float,
        Value::Double(_) => FormatCode::Double,
        Value::Decimal32(_) => FormatCode::Decimal32,
        Value::Decimal64(_) => FormatCode::Decimal64,
        Value::Decimal128(_) => FormatCode::Decimal128,
        Value::Char(_) => FormatCode::Char,
        Value::Timestamp(_) => FormatCode::Timestamp,
        Value::Uuid(_) => FormatCode::Uuid,
        Value::Binary(_) => FormatCode::VBin32,
        Value::String(_) => FormatCode::Str32,
        Value::Symbol(_) => FormatCode::Sym32,
        Value::List(_) => FormatCode::List32,
        Value::Map(_) => FormatCode::Map32,
        Value::Array(_) => FormatCode::Array32,
        Value::Described(described) => {
            buf.put_u8(FormatCode::Described as u8);
            write_descriptor(buf, &described.descriptor);
            array_constructor(buf, &described.value);
            return;
        }
    };
    buf.put_u8(code as u8);
}

/// Writes one array element body (no constructor) using the widest
/// encoding of its type.
fn write_array_element(body: &mut BytesMut, item: &Value) {
    match item {
        Value::Null => {}
        Value::Bool(v) => body.put_u8(u8::from(*v)),
        Value::UByte(v) => body.put_u8(*v),
        Value::UShort(v) => body.put_u16(*v),
        Value::UInt(v) => body.put_u32(*v),
        Value::ULong(v) => body.put_u64(*v),
        Value::Byte(v) => body.put_i8(*v),
        Value::Short(v) => body.put_i16(*v),
        Value::Int(v) => body.put_i32(*v),
        Value::Long(v) => body.put_i64(*v),
        Value::Float(v) => body.put_f32(v.into_inner()),
        Value::Double(v) => body.put_f64(v.into_inner()),
        Value::Decimal32(v) => body.put_slice(v.as_inner()),
        Value::Decimal64(v) => body.put_slice(v.as_inner()),
        Value::Decimal128(v) => body.put_slice(v.as_inner()),
        Value::Char(v) => body.put_u32(*v as u32),
        Value::Timestamp(v) => body.put_i64(v.milliseconds()),
        Value::Uuid(v) => body.put_slice(v.as_inner()),
        Value::Binary(v) => {
            body.put_u32(v.len() as u32);
            body.put_slice(v);
        }
        Value::String(v) => {
            body.put_u32(v.len() as u32);
            body.put_slice(v.as_bytes());
        }
        Value::Symbol(v) => {
            body.put_u32(v.as_str().len() as u32);
            body.put_slice(v.as_str().as_bytes());
        }
        Value::List(items) => {
            let mut inner = BytesMut::new();
            for item in items {
                write_value(&mut inner, item);
            }
            body.put_u32((inner.len() + 4) as u32);
            body.put_u32(items.len() as u32);
            body.put_slice(&inner);
        }
        Value::Map(map) => {
            let mut inner = BytesMut::new();
            for (key, value) in map {
                write_value(&mut inner, key);
                write_value(&mut inner, value);
            }
            body.put_u32((inner.len() + 4) as u32);
            body.put_u32((map.len() * 2) as u32);
            body.put_slice(&inner);
        }
        Value::Array(array) => {
            let mut inner = BytesMut::new();
            write_array_body(&mut inner, array);
            body.put_u32((inner.len() + 4) as u32);
            body.put_u32(array.len() as u32);
            body.put_slice(&inner);
        }
        Value::Described(described) => write_array_element(body, &described.value),
    }
}

fn write_array_body(buf: &mut BytesMut, array: &Array<Value>) {
    match array.0.first() {
        Some(first) => array_constructor(buf, first),
        None => {
            buf.put_u8(FormatCode::Null as u8);
            return;
        }
    }
    for item in &array.0 {
        write_array_element(buf, item);
    }
}

/// Writes an array, choosing `array8`/`array32`.
fn write_array(buf: &mut BytesMut, array: &Array<Value>) {
    let mut body = BytesMut::new();
    write_array_body(&mut body, array);
    // size counts the count field, the element constructor and the body
    if body.len() + 1 <= u8::MAX as usize && array.len() <= u8::MAX as usize {
        buf.put_u8(FormatCode::Array8 as u8);
        buf.put_u8((body.len() + 1) as u8);
        buf.put_u8(array.len() as u8);
    } else {
        buf.put_u8(FormatCode::Array32 as u8);
        buf.put_u32((body.len() + 4) as u32);
        buf.put_u32(array.len() as u32);
    }
    buf.put_slice(&body);
}

/// Writes a descriptor in its symbolic or numeric form.
pub fn write_descriptor(buf: &mut BytesMut, descriptor: &Descriptor) {
    match descriptor {
        Descriptor::Name(name) => write_symbol(buf, name),
        Descriptor::Code(code) => write_ulong(buf, *code),
    }
}

/// Writes a described value: marker, descriptor, then the value.
pub fn write_described(buf: &mut BytesMut, described: &Described<Value>) {
    buf.put_u8(FormatCode::Described as u8);
    write_descriptor(buf, &described.descriptor);
    write_value(buf, &described.value);
}

/// Writes any [`Value`] with its self-describing constructor.
pub fn write_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Described(described) => write_described(buf, described),
        Value::Null => write_null(buf),
        Value::Bool(v) => write_bool(buf, *v),
        Value::UByte(v) => write_ubyte(buf, *v),
        Value::UShort(v) => write_ushort(buf, *v),
        Value::UInt(v) => write_uint(buf, *v),
        Value::ULong(v) => write_ulong(buf, *v),
        Value::Byte(v) => write_byte(buf, *v),
        Value::Short(v) => write_short(buf, *v),
        Value::Int(v) => write_int(buf, *v),
        Value::Long(v) => write_long(buf, *v),
        Value::Float(v) => write_float(buf, v.into_inner()),
        Value::Double(v) => write_double(buf, v.into_inner()),
        Value::Decimal32(v) => write_decimal32(buf, v),
        Value::Decimal64(v) => write_decimal64(buf, v),
        Value::Decimal128(v) => write_decimal128(buf, v),
        Value::Char(v) => write_char(buf, *v),
        Value::Timestamp(v) => write_timestamp(buf, *v),
        Value::Uuid(v) => write_uuid(buf, v),
        Value::Binary(v) => write_binary(buf, v),
        Value::String(v) => write_string(buf, v),
        Value::Symbol(v) => write_symbol(buf, v),
        Value::List(v) => write_list(buf, v),
        Value::Map(v) => write_map(buf, v),
        Value::Array(v) => write_array(buf, v),
    }
}
