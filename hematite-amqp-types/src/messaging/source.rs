use crate::composite::{Composite, ListDecoder, ListEncoder};
use crate::definitions::{Fields, Seconds};
use crate::error::Error;
use crate::primitives::{Array, Symbol};
use crate::value::Value;

use super::{DistributionMode, Outcome, TerminusDurability, TerminusExpiryPolicy};

/// A terminus at the source of a link.
///
/// <type name="source" class="composite" source="list" provides="source">
///     <descriptor name="amqp:source:list" code="0x00000000:0x00000028"/>
/// </type>
#[derive(Debug, Clone, Default)]
pub struct Source {
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

    /// <field name="distribution-mode" type="symbol" requires="distribution-mode"/>
    pub distribution_mode: Option<DistributionMode>,

    /// <field name="filter" type="filter-set"/>
    pub filter: Option<Fields>,

    /// <field name="default-outcome" type="*" requires="outcome"/>
    pub default_outcome: Option<Outcome>,

    /// <field name="outcomes" type="symbol" multiple="true"/>
    pub outcomes: Option<Array<Symbol>>,

    /// <field name="capabilities" type="symbol" multiple="true"/>
    pub capabilities: Option<Array<Symbol>>,
}

impl Source {
    /// Creates a builder for a source.
    pub fn builder() -> SourceBuilder {
        SourceBuilder::default()
    }
}

impl Composite for Source {
    const CODE: u64 = 0x0000_0000_0000_0028;
    const NAME: &'static str = "amqp:source:list";

    fn to_list(&self) -> Vec<Value> {
        let mut enc = ListEncoder::new();
        enc.optional(self.address.clone());
        enc.skippable(self.durable, TerminusDurability::None);
        enc.skippable(self.expiry_policy, TerminusExpiryPolicy::SessionEnd);
        enc.skippable(self.timeout, 0);
        enc.skippable(self.dynamic, false);
        enc.optional(self.dynamic_node_properties.clone());
        enc.optional(self.distribution_mode);
        enc.optional(self.filter.clone());
        enc.optional(self.default_outcome.clone());
        enc.optional(self.outcomes.clone());
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
            distribution_mode: decoder.optional()?,
            filter: decoder.optional()?,
            default_outcome: decoder.optional()?,
            outcomes: decoder.optional()?,
            capabilities: decoder.optional()?,
        })
    }
}

impl From<Source> for Value {
    fn from(val: Source) -> Self {
        crate::composite::composite_value(&val)
    }
}

impl TryFrom<Value> for Source {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        crate::composite::composite_from_value(value)
    }
}

/// Builder for [`Source`].
#[derive(Debug, Clone, Default)]
pub struct SourceBuilder {
    inner: Source,
}

impl SourceBuilder {
    /// The address of the source node.
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

    /// Link distribution mode.
    pub fn distribution_mode(mut self, mode: DistributionMode) -> Self {
        self.inner.distribution_mode = Some(mode);
        self
    }

    /// Predicates to filter messages admitted onto the link.
    pub fn filter(mut self, filter: Fields) -> Self {
        self.inner.filter = Some(filter);
        self
    }

    /// Extension capabilities the sender supports/desires.
    pub fn capabilities(mut self, capabilities: Array<Symbol>) -> Self {
        self.inner.capabilities = Some(capabilities);
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Source {
        self.inner
    }
}
