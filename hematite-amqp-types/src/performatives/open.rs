use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{Fields, IetfLanguageTag, Milliseconds};
use crate::error::Error;
use crate::primitives::{Array, Symbol};
use crate::value::Value;

/// Negotiate connection parameters.
///
/// <type name="open" class="composite" source="list" provides="frame">
///     <descriptor name="amqp:open:list" code="0x00000000:0x00000010"/>
/// </type>
#[derive(Debug, Clone)]
pub struct Open {
    /// <field name="container-id" type="string" mandatory="true"/>
    pub container_id: String,

    /// <field name="hostname" type="string"/>
    pub hostname: Option<String>,

    /// <field name="max-frame-size" type="uint" default="4294967295"/>
    pub max_frame_size: MaxFrameSize,

    /// <field name="channel-max" type="ushort" default="65535"/>
    pub channel_max: ChannelMax,

    /// <field name="idle-time-out" type="milliseconds"/>
    pub idle_time_out: Option<Milliseconds>,

    /// <field name="outgoing-locales" type="ietf-language-tag" multiple="true"/>
    pub outgoing_locales: Option<Array<IetfLanguageTag>>,

    /// <field name="incoming-locales" type="ietf-language-tag" multiple="true"/>
    pub incoming_locales: Option<Array<IetfLanguageTag>>,

    /// <field name="offered-capabilities" type="symbol" multiple="true"/>
    pub offered_capabilities: Option<Array<Symbol>>,

    /// <field name="desired-capabilities" type="symbol" multiple="true"/>
    pub desired_capabilities: Option<Array<Symbol>>,

    /// <field name="properties" type="fields"/>
    pub properties: Option<Fields>,
}

impl Open {
    /// Creates an `Open` with the given container-id and every other
    /// field at its default.
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            hostname: None,
            max_frame_size: MaxFrameSize::default(),
            channel_max: ChannelMax::default(),
            idle_time_out: None,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }
}

impl Composite for Open {
    const CODE: u64 = 0x0000_0000_0000_0010;
    const NAME: &'static str = "amqp:open:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.container_id.clone());
        enc.optional(self.hostname.clone());
        enc.skippable(self.max_frame_size.0, u32::MAX);
        enc.skippable(self.channel_max.0, u16::MAX);
        enc.optional(self.idle_time_out);
        enc.optional(self.outgoing_locales.clone());
        enc.optional(self.incoming_locales.clone());
        enc.optional(self.offered_capabilities.clone());
        enc.optional(self.desired_capabilities.clone());
        enc.optional(self.properties.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            container_id: decoder.required("container-id")?,
            hostname: decoder.optional()?,
            max_frame_size: decoder.optional()?.map(MaxFrameSize).unwrap_or_default(),
            channel_max: decoder.optional()?.map(ChannelMax).unwrap_or_default(),
            idle_time_out: decoder.optional()?,
            outgoing_locales: decoder.optional()?,
            incoming_locales: decoder.optional()?,
            offered_capabilities: decoder.optional()?,
            desired_capabilities: decoder.optional()?,
            properties: decoder.optional()?,
        })
    }
}

/// Proposed maximum frame size.
///
/// The largest frame size that the sending peer is able to accept on
/// this connection. A peer MUST NOT send frames larger than its partner
/// can handle; both peers MUST accept frames of up to 512 octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxFrameSize(pub u32);

impl Default for MaxFrameSize {
    fn default() -> Self {
        MaxFrameSize(u32::MAX)
    }
}

impl From<u32> for MaxFrameSize {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<MaxFrameSize> for u32 {
    fn from(value: MaxFrameSize) -> Self {
        value.0
    }
}

impl From<MaxFrameSize> for usize {
    fn from(value: MaxFrameSize) -> Self {
        value.0 as usize
    }
}

/// The highest channel number that can be used on the connection.
///
/// This value plus one is the maximum number of sessions that can be
/// simultaneously active on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMax(pub u16);

impl Default for ChannelMax {
    fn default() -> Self {
        Self(u16::MAX)
    }
}

impl From<u16> for ChannelMax {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<ChannelMax> for u16 {
    fn from(value: ChannelMax) -> Self {
        value.0
    }
}
