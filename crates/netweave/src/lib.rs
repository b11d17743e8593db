//! # Netweave
//!
//! Offline weaver. Reads a module image, finds every class that exposes a
//! property of the network capability type, and inserts a guarded prologue
//! into its setters and synchronized methods that reports the call through
//! that capability before the original body runs.
//!
//! ## Philosophy
//!
//! - **Additive only**: the original instructions are never touched. With no
//!   capability attached, a woven member behaves exactly as before.
//! - **Verify before write**: every rewritten body is checked for stack
//!   balance. A module that fails is never persisted.
//! - **Plain instruction model**: weaving is expressed over a small
//!   stack-machine instruction set ([`il`]) with stable instruction ids.

pub mod builder;
pub mod capability;
pub mod config;
pub mod error;
pub mod il;
pub mod image;
pub mod module;
pub mod processor;
pub mod resolver;
pub mod verify;
pub mod weave;

pub use builder::MethodBuilder;
pub use builder::ModuleBuilder;
pub use builder::PropertyBuilder;
pub use builder::TypeBuilder;
pub use capability::Capability;
pub use config::WeaveConfig;
pub use error::Error;
pub use error::Result;
pub use module::ModuleDef;
pub use resolver::ModuleResolver;
pub use weave::Outcome;
pub use weave::WeaveReport;
pub use weave::Weaver;
