//! The connection preamble.

use hematite_amqp_types::definitions::{MAJOR, MINOR, REVISION};

const PROTOCOL_HEADER_PREFIX: &[u8; 4] = b"AMQP";

/// The 8-byte header exchanged before any frame:
/// `"AMQP"` followed by protocol-id, major, minor and revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolHeader {
    /// Protocol ID
    pub id: ProtocolId,

    /// Major number
    pub major: u8,

    /// Minor number
    pub minor: u8,

    /// Revision number
    pub revision: u8,
}

impl Default for ProtocolHeader {
    fn default() -> Self {
        Self {
            id: ProtocolId::Amqp,
            major: MAJOR,
            minor: MINOR,
            revision: REVISION,
        }
    }
}

impl ProtocolHeader {
    /// Creates a new protocol header.
    pub fn new(id: ProtocolId, major: u8, minor: u8, revision: u8) -> Self {
        Self {
            id,
            major,
            minor,
            revision,
        }
    }

    /// Creates an AMQP protocol header.
    pub fn amqp() -> Self {
        Self {
            id: ProtocolId::Amqp,
            ..Default::default()
        }
    }

    /// Creates a SASL protocol header.
    pub fn sasl() -> Self {
        Self {
            id: ProtocolId::Sasl,
            ..Default::default()
        }
    }
}

impl From<ProtocolHeader> for [u8; 8] {
    fn from(value: ProtocolHeader) -> Self {
        [
            PROTOCOL_HEADER_PREFIX[0],
            PROTOCOL_HEADER_PREFIX[1],
            PROTOCOL_HEADER_PREFIX[2],
            PROTOCOL_HEADER_PREFIX[3],
            value.id as u8,
            value.major,
            value.minor,
            value.revision,
        ]
    }
}

impl TryFrom<[u8; 8]> for ProtocolHeader {
    type Error = [u8; 8];

    fn try_from(v: [u8; 8]) -> Result<Self, Self::Error> {
        if &v[..4] != PROTOCOL_HEADER_PREFIX {
            return Err(v);
        }
        let id = match v[4].try_into() {
            Ok(id) => id,
            Err(_) => return Err(v),
        };

        Ok(Self::new(id, v[5], v[6], v[7]))
    }
}

/// Protocol ID of the preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolId {
    /// AMQP
    Amqp = 0x0,

    /// TLS
    Tls = 0x2,

    /// SASL
    Sasl = 0x3,
}

impl TryFrom<u8> for ProtocolId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let id = match value {
            0x0 => Self::Amqp,
            0x2 => Self::Tls,
            0x3 => Self::Sasl,
            _ => return Err(value),
        };
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = ProtocolHeader::amqp();
        let bytes: [u8; 8] = header.into();
        assert_eq!(&bytes, b"AMQP\x00\x01\x00\x00");
        assert_eq!(ProtocolHeader::try_from(bytes).unwrap(), header);
    }

    #[test]
    fn sasl_header_has_protocol_id_3() {
        let bytes: [u8; 8] = ProtocolHeader::sasl().into();
        assert_eq!(&bytes, b"AMQP\x03\x01\x00\x00");
    }

    #[test]
    fn non_amqp_prefix_is_rejected() {
        assert!(ProtocolHeader::try_from(*b"HTTP\x00\x01\x00\x00").is_err());
    }
}
