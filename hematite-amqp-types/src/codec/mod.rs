//! Encoder and decoder of the primitive type system.
//!
//! The encoder always chooses the smallest legal format code for a value
//! (`uint0`/`smalluint`/`uint`, `list0`/`list8`/`list32`, ...). The
//! decoder dispatches on the constructor byte and tolerates any legal
//! encoding. [`skip_value`] advances over one encoded value using only
//! its declared size, allocating nothing.

mod decoder;
mod encoder;
mod format_code;

pub use decoder::{read_value, read_value_with_code, skip_value};
pub use encoder::{
    write_binary, write_bool, write_byte, write_char, write_decimal128, write_decimal32,
    write_decimal64, write_described, write_descriptor, write_double, write_float, write_int,
    write_list, write_long, write_map, write_null, write_short, write_string, write_symbol,
    write_timestamp, write_ubyte, write_uint, write_ulong, write_ushort, write_uuid, write_value,
};
pub use format_code::FormatCode;

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use ordered_float::OrderedFloat;

    use crate::buffer::ByteReader;
    use crate::error::Error;
    use crate::primitives::{Array, Dec64, OrderedMap, Symbol, Timestamp, Uuid};
    use crate::value::Value;

    use super::*;

    fn round_trip(value: Value) -> Value {
        let mut buf = BytesMut::new();
        write_value(&mut buf, &value);
        let mut reader = ByteReader::new(&buf);
        let decoded = read_value(&mut reader).unwrap();
        assert!(reader.is_empty(), "trailing bytes after {:?}", decoded);
        decoded
    }

    #[test]
    fn scalars_round_trip() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::UByte(0xab),
            Value::UShort(0xabcd),
            Value::UInt(0),
            Value::UInt(255),
            Value::UInt(1 << 20),
            Value::ULong(0),
            Value::ULong(255),
            Value::ULong(u64::MAX),
            Value::Byte(-1),
            Value::Short(-12345),
            Value::Int(-1),
            Value::Int(i32::MIN),
            Value::Long(-1),
            Value::Long(i64::MIN),
            Value::Float(OrderedFloat(1.5)),
            Value::Double(OrderedFloat(-2.25)),
            Value::Decimal64(Dec64::from([1, 2, 3, 4, 5, 6, 7, 8])),
            Value::Char('\u{1F980}'),
            Value::Timestamp(Timestamp::from_milliseconds(1_600_000_000_000)),
            Value::Uuid(Uuid::from([7u8; 16])),
            Value::Binary(Bytes::from_static(b"\x00\x01\x02")),
            Value::String("hello".to_string()),
            Value::String("\u{00e9}\u{00e8}".repeat(200)),
            Value::Symbol(Symbol::from("amqp:decode-error")),
        ];
        for value in values {
            assert_eq!(round_trip(value.clone()), value);
        }
    }

    #[test]
    fn smallest_encoding_is_chosen() {
        let mut buf = BytesMut::new();
        write_uint(&mut buf, 0);
        assert_eq!(&buf[..], &[0x43]);

        buf.clear();
        write_uint(&mut buf, 255);
        assert_eq!(&buf[..], &[0x52, 0xff]);

        buf.clear();
        write_ulong(&mut buf, 10);
        assert_eq!(&buf[..], &[0x53, 0x0a]);

        buf.clear();
        write_long(&mut buf, -1);
        assert_eq!(&buf[..], &[0x55, 0xff]);

        buf.clear();
        write_list(&mut buf, &[]);
        assert_eq!(&buf[..], &[0x45]);
    }

    #[test]
    fn compound_values_round_trip() {
        let list = Value::List(vec![
            Value::UInt(1),
            Value::String("two".to_string()),
            Value::Null,
            Value::List(vec![Value::Bool(true)]),
        ]);
        assert_eq!(round_trip(list.clone()), list);

        let mut map = OrderedMap::new();
        map.insert(Value::Symbol(Symbol::from("k1")), Value::Int(1));
        map.insert(Value::Symbol(Symbol::from("k2")), list);
        let map = Value::Map(map);
        assert_eq!(round_trip(map.clone()), map);

        let array = Value::Array(Array::from(vec![
            Value::UInt(1),
            Value::UInt(2),
            Value::UInt(3),
        ]));
        assert_eq!(round_trip(array.clone()), array);
    }

    #[test]
    fn long_list_uses_list32() {
        let list = Value::List(vec![Value::ULong(u64::MAX); 64]);
        let mut buf = BytesMut::new();
        write_value(&mut buf, &list);
        assert_eq!(buf[0], 0xd0);
        assert_eq!(round_trip(list.clone()), list);
    }

    #[test]
    fn described_values_round_trip() {
        let value = Value::described(0x75u64, Value::Binary(Bytes::from_static(b"payload")));
        assert_eq!(round_trip(value.clone()), value);

        let value = Value::described("amqp:custom:type", Value::String("x".into()));
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn skip_value_advances_without_decoding() {
        let mut buf = BytesMut::new();
        write_value(
            &mut buf,
            &Value::List(vec![Value::String("abc".into()), Value::UInt(7)]),
        );
        write_value(&mut buf, &Value::Bool(true));

        let mut reader = ByteReader::new(&buf);
        skip_value(&mut reader).unwrap();
        assert_eq!(read_value(&mut reader).unwrap(), Value::Bool(true));
        assert!(reader.is_empty());
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        // str8 of length 2 with invalid continuation bytes
        let bytes = [0xa1, 0x02, 0xc3, 0x28];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_value(&mut reader), Err(Error::NotUtf8));
    }

    #[test]
    fn truncated_compound_is_a_decode_error() {
        // list8 claiming 10 bytes of content but providing none
        let bytes = [0xc0, 0x0a];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_value(&mut reader), Err(Error::IndexOutOfRange));
    }

    #[test]
    fn odd_map_count_is_rejected() {
        let mut buf = BytesMut::new();
        // map8 with count 1: one key, no value
        buf.extend_from_slice(&[0xc1, 0x03, 0x01, 0x40]);
        let mut reader = ByteReader::new(&buf);
        assert_eq!(read_value(&mut reader), Err(Error::InvalidLength));
    }
}
