//! # Netsync
//!
//! Runtime half of property and method replication. Woven objects report
//! setter and method invocations through a [`NetworkInterceptor`]; the
//! [`DefaultInterceptor`] turns those reports into bus messages and applies
//! inbound messages back onto the object without echoing them.
//!
//! ## Philosophy
//!
//! - **Capability, not inheritance**: an object opts in by exposing a
//!   property of the capability type. No base class.
//! - **Counter, not flag**: echo suppression counts pending applies per
//!   member, so nested and repeated applies stay correct.
//! - **Transport-agnostic**: the bus is in-process. Crossing a network is a
//!   [`relay::Link`]'s job.

pub mod apply;
pub mod bus;
pub mod capability;
pub mod collections;
pub mod echo;
pub mod error;
pub mod interceptor;
pub mod message;
pub mod reflect;
pub mod relay;
pub mod value;

pub use apply::ApplyMode;
pub use bus::Bus;
pub use bus::BusExt;
pub use bus::LocalBus;
pub use bus::SubscriptionId;
pub use capability::InterceptorSlot;
pub use capability::NetworkInterceptor;
pub use collections::SyncDictionary;
pub use collections::SyncList;
pub use collections::SyncSet;
pub use error::Error;
pub use error::Result;
pub use interceptor::DefaultInterceptor;
pub use interceptor::InterceptorConfig;
pub use message::MemberCommandMessage;
pub use message::Message;
pub use message::MethodCallMessage;
pub use message::PropertyChangeMessage;
pub use reflect::MethodId;
pub use reflect::PropertyId;
pub use reflect::Replicated;
pub use reflect::TypeDescriptor;
pub use relay::DuplexLink;
pub use relay::Envelope;
pub use relay::Link;
pub use relay::Relay;
pub use value::Dynamic;
pub use value::ObjectRef;
pub use value::Value;

#[cfg(test)]
mod tests;
