use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{Fields, Seconds};
use crate::error::Error;
use crate::primitives::{Array, Symbol};
use crate::value::Value;

use super::{TerminusDurability, TerminusExpiryPolicy};

/// A terminus at the target of a link.
///
/// <type name="target" class="composite" source="list" provides="target">
///     <descriptor name="amqp:target:list" code="0x00000000:0x00000029"/>
/// </type>
#[derive(Debug, Clone, Default)]
pub struct Target {
    /// <field name="address" type="*" requires="address"/>
    pub address: Option<String>,

    /// <field name="durable" type="terminus-durability" default="none"/>
    pub durable: TerminusDurability,

    /// <field name="expiry-policy" type="terminus-expiry-policy" default="session-end"/>
    pub expiry_policy: TerminusExpiryPolicy,

    /// <field name="timeout" type="seconds" default="0"/>
    pub timeout: Seconds,

    /// <field name="dynamic" type="boolean" default="false"/>
    pub dynamic: bool,

    /// <field name="dynamic-node-properties" type="node-properties"/>
    pub dynamic_node_properties: Option<Fields>,

    /// <field name="capabilities" type="symbol" multiple="true"/>
    pub capabilities: Option<Array<Symbol>>,
}

impl Target {
    /// Creates a builder for a target.
    pub fn builder() -> TargetBuilder {
        TargetBuilder::default()
    }
}

impl Composite for Target {
    const CODE: u64 = 0x0000_0000_0000_0029;
    const NAME: &'static str = "amqp:target:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.optional(self.address.clone());
        enc.skippable(self.durable, TerminusDurability::None);
        enc.skippable(self.expiry_policy, TerminusExpiryPolicy::SessionEnd);
        enc.skippable(self.timeout, 0);
        enc.skippable(self.dynamic, false);
        enc.optional(self.dynamic_node_properties.clone());
        enc.optional(self.capabilities.clone());
        enc.into_list()
    }

    fn from_list(decoder: &mut ListDecoder) -> Result<Self, Error> {
        Ok(Self {
            address: decoder.optional()?,
            durable: decoder.or_default()?,
            expiry_policy: decoder.or_default()?,
            timeout: decoder.or_default()?,
            dynamic: decoder.or_default()?,
            dynamic_node_properties: decoder.optional()?,
            capabilities: decoder.optional()?,
        })
    }
}

impl From<Target> for Value {
    fn from(val: Target) -> Self {
        crate::composite::composite_value(&val)
    }
}

impl TryFrom<Value> for Target {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        crate::composite::composite_from_value(value)
    }
}

/// Builder for [`Target`].
#[derive(Debug, Clone, Default)]
pub struct TargetBuilder {
    inner: Target,
}

impl TargetBuilder {
    /// The address of the target node.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.inner.address = Some(address.into());
        self
    }

    /// Terminus durability.
    pub fn durable(mut self, durable: TerminusDurability) -> Self {
        self.inner.durable = durable;
        self
    }

    /// Terminus expiry policy.
    pub fn expiry_policy(mut self, policy: TerminusExpiryPolicy) -> Self {
        self.inner.expiry_policy = policy;
        self
    }

    /// Request a dynamically created node.
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.inner.dynamic = dynamic;
        self
    }

    /// Extension capabilities the sender supports/desires.
    pub fn capabilities(mut self, capabilities: Array<Symbol>) -> Self {
        self.inner.capabilities = Some(capabilities);
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Target {
        self.inner
    }
}
