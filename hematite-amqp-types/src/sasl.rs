//! Types defined in AMQP 1.0 specification Part 5.3: SASL

use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::error::Error;
use crate::primitives::{Array, Binary, Symbol};
use crate::value::Value;

/// Advertise available sasl mechanisms.
///
/// <type name="sasl-mechanisms" class="composite" source="list" provides="sasl-frame">
///     <descriptor name="amqp:sasl-mechanisms:list" code="0x00000000:0x00000040"/>
/// </type>
#[derive(Debug, Clone, Default)]
pub struct SaslMechanisms {
    /// <field name="sasl-server-mechanisms" type="symbol" multiple="true" mandatory="true"/>
    pub sasl_server_mechanisms: Array<Symbol>,
}

impl Composite for SaslMechanisms {
    const CODE: u64 = 0x0000_0000_0000_0040;
    const NAME: &'static str = "amqp:sasl-mechanisms:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.sasl_server_mechanisms.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            sasl_server_mechanisms: decoder.required("sasl-server-mechanisms")?,
        })
    }
}

/// Initiate sasl exchange.
///
/// <type name="sasl-init" class="composite" source="list" provides="sasl-frame">
///     <descriptor name="amqp:sasl-init:list" code="0x00000000:0x00000041"/>
/// </type>
#[derive(Debug, Clone)]
pub struct SaslInit {
    /// <field name="mechanism" type="symbol" mandatory="true"/>
    pub mechanism: Symbol,

    /// <field name="initial-response" type="binary"/>
    pub initial_response: Option<Binary>,

    /// <field name="hostname" type="string"/>
    pub hostname: Option<String>,
}

impl Composite for SaslInit {
    const CODE: u64 = 0x0000_0000_0000_0041;
    const NAME: &'static str = "amqp:sasl-init:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.mechanism.clone());
        enc.optional(self.initial_response.clone());
        enc.optional(self.hostname.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            mechanism: decoder.required("mechanism")?,
            initial_response: decoder.optional()?,
            hostname: decoder.optional()?,
        })
    }
}

/// Security mechanism challenge.
///
/// <type name="sasl-challenge" class="composite" source="list" provides="sasl-frame">
///     <descriptor name="amqp:sasl-challenge:list" code="0x00000000:0x00000042"/>
/// </type>
#[derive(Debug, Clone)]
pub struct SaslChallenge {
    /// <field name="challenge" type="binary" mandatory="true"/>
    pub challenge: Binary,
}

impl Composite for SaslChallenge {
    const CODE: u64 = 0x0000_0000_0000_0042;
    const NAME: &'static str = "amqp:sasl-challenge:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.challenge.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            challenge: decoder.required("challenge")?,
        })
    }
}

/// Security mechanism response.
///
/// <type name="sasl-response" class="composite" source="list" provides="sasl-frame">
///     <descriptor name="amqp:sasl-response:list" code="0x00000000:0x00000043"/>
/// </type>
#[derive(Debug, Clone)]
pub struct SaslResponse {
    /// <field name="response" type="binary" mandatory="true"/>
    pub response: Binary,
}

impl Composite for SaslResponse {
    const CODE: u64 = 0x0000_0000_0000_0043;
    const NAME: &'static str = "amqp:sasl-response:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.response.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            response: decoder.required("response")?,
        })
    }
}

/// Indicates the outcome of the sasl dialog.
///
/// <type name="sasl-outcome" class="composite" source="list" provides="sasl-frame">
///     <descriptor name="amqp:sasl-outcome:list" code="0x00000000:0x00000044"/>
/// </type>
#[derive(Debug, Clone)]
pub struct SaslOutcome {
    /// <field name="code" type="sasl-code" mandatory="true"/>
    pub code: SaslCode,

    /// <field name="additional-data" type="binary"/>
    pub additional_data: Option<Binary>,
}

impl Composite for SaslOutcome {
    const CODE: u64 = 0x0000_0000_0000_0044;
    const NAME: &'static str = "amqp:sasl-outcome:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.field(self.code);
        enc.optional(self.additional_data.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            code: decoder.required("code")?,
            additional_data: decoder.optional()?,
        })
    }
}

/// Codes to indicate the outcome of the sasl dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslCode {
    /// Connection authentication succeeded.
    Ok = 0,

    /// Connection authentication failed due to an unspecified problem
    /// with the supplied credentials.
    Auth = 1,

    /// Connection authentication failed due to a system error.
    Sys = 2,

    /// Connection authentication failed due to a system error that is
    /// unlikely to be corrected without intervention.
    SysPerm = 3,

    /// Connection authentication failed due to a transient system error.
    SysTemp = 4,
}

impl From<SaslCode> for Value {
    fn from(val: SaslCode) -> Self {
        Value::UByte(val as u8)
    }
}

impl TryFrom<Value> for SaslCode {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match u8::try_from(value)? {
            0 => Ok(SaslCode::Ok),
            1 => Ok(SaslCode::Auth),
            2 => Ok(SaslCode::Sys),
            3 => Ok(SaslCode::SysPerm),
            4 => Ok(SaslCode::SysTemp),
            _ => Err(Error::InvalidFieldType("code")),
        }
    }
}

/// The body of a SASL frame.
#[derive(Debug, Clone)]
pub enum SaslFrameBody {
    /// sasl-mechanisms
    Mechanisms(SaslMechanisms),

    /// sasl-init
    Init(SaslInit),

    /// sasl-challenge
    Challenge(SaslChallenge),

    /// sasl-response
    Response(SaslResponse),

    /// sasl-outcome
    Outcome(SaslOutcome),
}
