use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::SequenceNo;
use crate::error::Error;
use crate::primitives::{Binary, Symbol, Timestamp, Uuid};
use crate::value::Value;

/// Immutable properties of the bare message.
///
/// <type name="properties" class="composite" source="list" provides="section">
///     <descriptor name="amqp:properties:list" code="0x00000000:0x00000073"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    /// <field name="message-id" type="*" requires="message-id"/>
    pub message_id: Option<MessageId>,

    /// <field name="user-id" type="binary"/>
    pub user_id: Option<Binary>,

    /// <field name="to" type="*" requires="address"/>
    pub to: Option<String>,

    /// <field name="subject" type="string"/>
    pub subject: Option<String>,

    /// <field name="reply-to" type="*" requires="address"/>
    pub reply_to: Option<String>,

    /// <field name="correlation-id" type="*" requires="message-id"/>
    pub correlation_id: Option<MessageId>,

    /// <field name="content-type" type="symbol"/>
    pub content_type: Option<Symbol>,

    /// <field name="content-encoding" type="symbol"/>
    pub content_encoding: Option<Symbol>,

    /// <field name="absolute-expiry-time" type="timestamp"/>
    pub absolute_expiry_time: Option<Timestamp>,

    /// <field name="creation-time" type="timestamp"/>
    pub creation_time: Option<Timestamp>,

    /// <field name="group-id" type="string"/>
    pub group_id: Option<String>,

    /// <field name="group-sequence" type="sequence-no"/>
    pub group_sequence: Option<SequenceNo>,

    /// <field name="reply-to-group-id" type="string"/>
    pub reply_to_group_id: Option<String>,
}

impl Composite for Properties {
    const CODE: u64 = 0x0000_0000_0000_0073;
    const NAME: &'static str = "amqp:properties:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.optional(self.message_id.clone());
        enc.optional(self.user_id.clone());
        enc.optional(self.to.clone());
        enc.optional(self.subject.clone());
        enc.optional(self.reply_to.clone());
        enc.optional(self.correlation_id.clone());
        enc.optional(self.content_type.clone());
        enc.optional(self.content_encoding.clone());
        enc.optional(self.absolute_expiry_time);
        enc.optional(self.creation_time);
        enc.optional(self.group_id.clone());
        enc.optional(self.group_sequence);
        enc.optional(self.reply_to_group_id.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            message_id: decoder.optional()?,
            user_id: decoder.optional()?,
            to: decoder.optional()?,
            subject: decoder.optional()?,
            reply_to: decoder.optional()?,
            correlation_id: decoder.optional()?,
            content_type: decoder.optional()?,
            content_encoding: decoder.optional()?,
            absolute_expiry_time: decoder.optional()?,
            creation_time: decoder.optional()?,
            group_id: decoder.optional()?,
            group_sequence: decoder.optional()?,
            reply_to_group_id: decoder.optional()?,
        })
    }
}

/// A message-id in one of the four allowed forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// 3.2.11 Message ID ulong
    ULong(u64),

    /// 3.2.12 Message ID uuid
    Uuid(Uuid),

    /// 3.2.13 Message ID binary
    Binary(Binary),

    /// 3.2.14 Message ID string
    String(String),
}

impl From<u64> for MessageId {
    fn from(val: u64) -> Self {
        MessageId::ULong(val)
    }
}

impl From<String> for MessageId {
    fn from(val: String) -> Self {
        MessageId::String(val)
    }
}

impl From<&str> for MessageId {
    fn from(val: &str) -> Self {
        MessageId::String(val.to_string())
    }
}

impl From<MessageId> for Value {
    fn from(val: MessageId) -> Self {
        match val {
            MessageId::ULong(v) => Value::ULong(v),
            MessageId::Uuid(v) => Value::Uuid(v),
            MessageId::Binary(v) => Value::Binary(v),
            MessageId::String(v) => Value::String(v),
        }
    }
}

impl TryFrom<Value> for MessageId {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::ULong(v) => Ok(MessageId::ULong(v)),
            Value::Uuid(v) => Ok(MessageId::Uuid(v)),
            Value::Binary(v) => Ok(MessageId::Binary(v)),
            Value::String(v) => Ok(MessageId::String(v)),
            _ => Err(Error::InvalidFieldType("message-id")),
        }
    }
}
