//! Readers for the primitive encodings.

use bytes::Bytes;

use crate::buffer::ByteReader;
use crate::described::Described;
use crate::descriptor::Descriptor;
use crate::error::Error;
use crate::primitives::{Dec128, Dec32, Dec64, OrderedMap, Symbol, Timestamp, Uuid};
use crate::value::Value;

use super::format_code::FormatCode;

fn read_variable<'a>(
    reader: &mut ByteReader<'a>,
    wide: bool,
) -> Result<&'a [u8], Error> {
    let len = if wide {
        reader.read_u32()? as usize
    } else {
        reader.read_u8()? as usize
    };
    reader.read_bytes(len)
}

fn utf8(bytes: &[u8]) -> Result<String, Error> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| Error::NotUtf8)
}

fn ascii_symbol(bytes: &[u8]) -> Result<Symbol, Error> {
    if !bytes.iter().all(u8::is_ascii) {
        return Err(Error::NotAscii);
    }
    // ASCII is a UTF-8 subset, checked above
    Ok(Symbol::new(utf8(bytes).map_err(|_| Error::NotAscii)?))
}

fn read_char(reader: &mut ByteReader<'_>) -> Result<char, Error> {
    let raw = reader.read_u32()?;
    char::from_u32(raw).ok_or(Error::InvalidChar(raw))
}

struct CompoundHeader {
    size: usize,
    count: usize,
}

fn read_compound_header(
    reader: &mut ByteReader<'_>,
    wide: bool,
) -> Result<CompoundHeader, Error> {
    let (size, count) = if wide {
        let size = reader.read_u32()? as usize;
        let count = reader.read_u32()? as usize;
        (size.checked_sub(4).ok_or(Error::InvalidLength)?, count)
    } else {
        let size = reader.read_u8()? as usize;
        let count = reader.read_u8()? as usize;
        (size.checked_sub(1).ok_or(Error::InvalidLength)?, count)
    };
    Ok(CompoundHeader { size, count })
}

fn read_list(reader: &mut ByteReader<'_>, wide: bool) -> Result<Vec<Value>, Error> {
    let header = read_compound_header(reader, wide)?;
    let end = reader
        .position()
        .checked_add(header.size)
        .ok_or(Error::InvalidLength)?;
    let mut items = Vec::with_capacity(header.count.min(64));
    for _ in 0..header.count {
        items.push(read_value(reader)?);
    }
    if reader.position() != end {
        return Err(Error::InvalidLength);
    }
    Ok(items)
}

fn read_map(reader: &mut ByteReader<'_>, wide: bool) -> Result<OrderedMap<Value, Value>, Error> {
    let header = read_compound_header(reader, wide)?;
    if header.count % 2 != 0 {
        return Err(Error::InvalidLength);
    }
    let end = reader
        .position()
        .checked_add(header.size)
        .ok_or(Error::InvalidLength)?;
    let mut map = OrderedMap::new();
    for _ in 0..header.count / 2 {
        let key = read_value(reader)?;
        let value = read_value(reader)?;
        map.insert(key, value);
    }
    if reader.position() != end {
        return Err(Error::InvalidLength);
    }
    Ok(map)
}

fn read_array(reader: &mut ByteReader<'_>, wide: bool) -> Result<Vec<Value>, Error> {
    let header = read_compound_header(reader, wide)?;
    let end = reader
        .position()
        .checked_add(header.size)
        .ok_or(Error::InvalidLength)?;

    // One constructor shared by every element. An array of described
    // types carries the descriptor once, in the constructor.
    let mut constructor = reader.read_u8()?;
    let mut descriptor = None;
    if constructor == FormatCode::Described as u8 {
        descriptor = Some(read_descriptor(reader)?);
        constructor = reader.read_u8()?;
    }
    let code = FormatCode::try_from(constructor)?;

    let mut items = Vec::with_capacity(header.count.min(64));
    for _ in 0..header.count {
        let element = read_value_with_code(reader, code)?;
        let element = match &descriptor {
            Some(descriptor) => {
                Value::Described(Box::new(Described::new(descriptor.clone(), element)))
            }
            None => element,
        };
        items.push(element);
    }
    if reader.position() != end {
        return Err(Error::InvalidLength);
    }
    Ok(items)
}

/// Reads a descriptor, which must be a symbol or an unsigned long.
pub(crate) fn read_descriptor(reader: &mut ByteReader<'_>) -> Result<Descriptor, Error> {
    match read_value(reader)? {
        Value::ULong(code) => Ok(Descriptor::Code(code)),
        Value::Symbol(name) => Ok(Descriptor::Name(name)),
        _ => Err(Error::InvalidDescriptor),
    }
}

/// Reads a value whose constructor byte has already been consumed.
pub fn read_value_with_code(reader: &mut ByteReader<'_>, code: FormatCode) -> Result<Value, Error> {
    let value = match code {
        FormatCode::Described => {
            let descriptor = read_descriptor(reader)?;
            let value = read_value(reader)?;
            Value::Described(Box::new(Described::new(descriptor, value)))
        }

        FormatCode::Null => Value::Null,

        FormatCode::Boolean => match reader.read_u8()? {
            0x00 => Value::Bool(false),
            0x01 => Value::Bool(true),
            _ => return Err(Error::InvalidLength),
        },
        FormatCode::BooleanTrue => Value::Bool(true),
        FormatCode::BooleanFalse => Value::Bool(false),

        FormatCode::UByte => Value::UByte(reader.read_u8()?),
        FormatCode::UShort => Value::UShort(reader.read_u16()?),

        FormatCode::UInt => Value::UInt(reader.read_u32()?),
        FormatCode::SmallUInt => Value::UInt(reader.read_u8()? as u32),
        FormatCode::UInt0 => Value::UInt(0),

        FormatCode::ULong => Value::ULong(reader.read_u64()?),
        FormatCode::SmallULong => Value::ULong(reader.read_u8()? as u64),
        FormatCode::ULong0 => Value::ULong(0),

        FormatCode::Byte => Value::Byte(reader.read_i8()?),
        FormatCode::Short => Value::Short(reader.read_i16()?),

        FormatCode::Int => Value::Int(reader.read_i32()?),
        FormatCode::SmallInt => Value::Int(reader.read_i8()? as i32),

        FormatCode::Long => Value::Long(reader.read_i64()?),
        FormatCode::SmallLong => Value::Long(reader.read_i8()? as i64),

        FormatCode::Float => Value::Float(reader.read_f32()?.into()),
        FormatCode::Double => Value::Double(reader.read_f64()?.into()),

        FormatCode::Decimal32 => Value::Decimal32(Dec32::from(reader.read_array::<4>()?)),
        FormatCode::Decimal64 => Value::Decimal64(Dec64::from(reader.read_array::<8>()?)),
        FormatCode::Decimal128 => Value::Decimal128(Dec128::from(reader.read_array::<16>()?)),

        FormatCode::Char => Value::Char(read_char(reader)?),

        FormatCode::Timestamp => Value::Timestamp(Timestamp::from_milliseconds(reader.read_i64()?)),

        FormatCode::Uuid => Value::Uuid(Uuid::from(reader.read_array::<16>()?)),

        FormatCode::VBin8 => Value::Binary(Bytes::copy_from_slice(read_variable(reader, false)?)),
        FormatCode::VBin32 => Value::Binary(Bytes::copy_from_slice(read_variable(reader, true)?)),

        FormatCode::Str8 => Value::String(utf8(read_variable(reader, false)?)?),
        FormatCode::Str32 => Value::String(utf8(read_variable(reader, true)?)?),

        FormatCode::Sym8 => Value::Symbol(ascii_symbol(read_variable(reader, false)?)?),
        FormatCode::Sym32 => Value::Symbol(ascii_symbol(read_variable(reader, true)?)?),

        FormatCode::List0 => Value::List(Vec::new()),
        FormatCode::List8 => Value::List(read_list(reader, false)?),
        FormatCode::List32 => Value::List(read_list(reader, true)?),

        FormatCode::Map8 => Value::Map(read_map(reader, false)?),
        FormatCode::Map32 => Value::Map(read_map(reader, true)?),

        FormatCode::Array8 => Value::Array(read_array(reader, false)?.into()),
        FormatCode::Array32 => Value::Array(read_array(reader, true)?.into()),
    };
    Ok(value)
}

/// Reads any value, dispatching on its constructor byte.
pub fn read_value(reader: &mut ByteReader<'_>) -> Result<Value, Error> {
    let code = FormatCode::try_from(reader.read_u8()?)?;
    read_value_with_code(reader, code)
}

/// Skips over one encoded value using only its declared size.
///
/// Sub-elements of compound values are never visited, so nothing is
/// allocated.
pub fn skip_value(reader: &mut ByteReader<'_>) -> Result<(), Error> {
    let code = FormatCode::try_from(reader.read_u8()?)?;
    match code {
        FormatCode::Described => {
            skip_value(reader)?;
            skip_value(reader)
        }

        FormatCode::Null
        | FormatCode::BooleanTrue
        | FormatCode::BooleanFalse
        | FormatCode::UInt0
        | FormatCode::ULong0
        | FormatCode::List0 => Ok(()),

        FormatCode::Boolean
        | FormatCode::UByte
        | FormatCode::SmallUInt
        | FormatCode::SmallULong
        | FormatCode::Byte
        | FormatCode::SmallInt
        | FormatCode::SmallLong => reader.advance(1),

        FormatCode::UShort | FormatCode::Short => reader.advance(2),

        FormatCode::UInt
        | FormatCode::Int
        | FormatCode::Float
        | FormatCode::Decimal32
        | FormatCode::Char => reader.advance(4),

        FormatCode::ULong
        | FormatCode::Long
        | FormatCode::Double
        | FormatCode::Decimal64
        | FormatCode::Timestamp => reader.advance(8),

        FormatCode::Decimal128 | FormatCode::Uuid => reader.advance(16),

        FormatCode::VBin8
        | FormatCode::Str8
        | FormatCode::Sym8
        | FormatCode::List8
        | FormatCode::Map8
        | FormatCode::Array8 => {
            let size = reader.read_u8()? as usize;
            reader.advance(size)
        }

        FormatCode::VBin32
        | FormatCode::Str32
        | FormatCode::Sym32
        | FormatCode::List32
        | FormatCode::Map32
        | FormatCode::Array32 => {
            let size = reader.read_u32()? as usize;
            reader.advance(size)
        }
    }
}
