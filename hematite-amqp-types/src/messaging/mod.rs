//! Types defined in AMQP 1.0 specification Part 3: Messaging

mod annotations;
mod delivery_state;
mod dist_mode;
mod header;
mod message;
mod properties;
mod section;
mod source;
mod target;
mod term_expiry_policy;
mod terminus_durability;

pub use annotations::{Annotations, DeliveryAnnotations, Footer, MessageAnnotations};
pub use delivery_state::{
    Accepted, DeliveryState, Modified, Outcome, Received, Rejected, Released,
};
pub use dist_mode::DistributionMode;
pub use header::{Header, Priority};
pub use message::{Body, Message};
pub use properties::{MessageId, Properties};
pub use section::{AmqpSequence, AmqpValue, ApplicationProperties, Data, Section};
pub use source::{Source, SourceBuilder};
pub use target::{Target, TargetBuilder};
pub use term_expiry_policy::TerminusExpiryPolicy;
pub use terminus_durability::TerminusDurability;

/// The message-format value for the bare AMQP message format.
pub const MESSAGE_FORMAT: u32 = 0;
