//! Codec error type

/// Error decoding or encoding AMQP values.
///
/// All variants map onto the `amqp:decode-error` condition when surfaced
/// to a peer, except [`Error::IndexOutOfRange`] which indicates a short
/// buffer rather than malformed input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A constructor byte that is not defined by the specification.
    #[error("invalid format code 0x{0:02x}")]
    InvalidFormatCode(u8),

    /// A defined format code in a position where it is not legal.
    #[error("unexpected format code 0x{code:02x}, expecting {expecting}")]
    UnexpectedFormatCode {
        /// The format code found on the wire
        code: u8,
        /// Human readable description of what was expected
        expecting: &'static str,
    },

    /// Read past the writable end of the buffer.
    #[error("read index is out of range")]
    IndexOutOfRange,

    /// A size prefix that disagrees with the bytes that follow it.
    #[error("declared size is inconsistent with encoded content")]
    InvalidLength,

    /// String bytes that are not valid UTF-8.
    #[error("str bytes are not valid utf-8")]
    NotUtf8,

    /// Symbol bytes outside the 7-bit ASCII range.
    #[error("symbol bytes are not valid ascii")]
    NotAscii,

    /// A char encoding that is not a valid unicode code point.
    #[error("0x{0:08x} is not a valid char")]
    InvalidChar(u32),

    /// A mandatory composite field was null or absent.
    #[error("field \"{0}\" is mandatory")]
    MandatoryFieldIsNull(&'static str),

    /// A field decoded to a value of the wrong type.
    #[error("invalid value for field \"{0}\"")]
    InvalidFieldType(&'static str),

    /// A described-type descriptor that is neither symbol nor ulong.
    #[error("descriptor must be a symbol or an unsigned long")]
    InvalidDescriptor,

    /// Array elements must share one element constructor.
    #[error("array elements must be homogeneous")]
    HeterogeneousArray,
}
