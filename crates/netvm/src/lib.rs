//! # Netvm
//!
//! Runs the types of a woven module so the rewritten members can be driven
//! like ordinary objects: set a property, call a method, and watch the
//! attached capability receive the interception.
//!
//! ## Philosophy
//!
//! - **Small instruction set**: exactly the opcodes the weaver and the
//!   module builder produce. Nothing else is accepted.
//! - **Faults, not panics**: a malformed body surfaces as an [`Error`] on
//!   the member that ran it.
//! - **Bounded**: step and depth limits come from [`HostConfig`].
//!
//! An [`Instance`] implements [`netsync::Replicated`], so it plugs straight
//! into a [`netsync::DefaultInterceptor`].

pub mod error;
pub mod host;
pub mod instance;
mod machine;
pub mod slot;

pub use error::Error;
pub use error::Result;
pub use host::Host;
pub use host::HostConfig;
pub use instance::Instance;
pub use slot::ArrayRef;
pub use slot::Slot;
