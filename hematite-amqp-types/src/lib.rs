#![deny(missing_docs, missing_debug_implementations)]

//! AMQP 1.0 data types and the self-describing binary codec.
//!
//! This crate implements the bottom half of an AMQP 1.0 protocol stack:
//!
//! - the primitive type system ([`Value`], [`primitives`]) and its
//!   format-code prefixed wire encoding ([`codec`]),
//! - described types ([`Described`], [`Descriptor`]) and the runtime
//!   [`registry::Registry`] that dispatches decoding by descriptor,
//! - the transport performatives ([`performatives`]), messaging sections
//!   ([`messaging`]), SASL frame bodies ([`sasl`]) and the shared
//!   definitions of Part 2.8 of the specification ([`definitions`]).
//!
//! Everything on the wire is big-endian and length-recoverable without
//! type context; [`codec::skip_value`] walks any encoded value without
//! allocating its sub-elements.

pub mod buffer;
pub mod codec;
pub mod composite;
pub mod definitions;
pub mod described;
pub mod descriptor;
pub mod error;
pub mod messaging;
pub mod performatives;
pub mod primitives;
pub mod registry;
pub mod sasl;
pub mod value;

pub use described::Described;
pub use descriptor::Descriptor;
pub use error::Error;
pub use value::Value;

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, Error>;
