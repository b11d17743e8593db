//! # Error Definitions
//!
//! Failures surfaced by the replication runtime. Everything here is
//! returned to the caller of the operation that hit it: a woven call, a bus
//! trigger, or a collection mutation.

/// Runtime replication failures.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// An inbound property change named a member the object cannot set.
    /// Indicates a protocol/version mismatch between peers.
    UnknownProperty { object: String, member: String },
    /// A member command named an operation the collection does not know.
    InvalidOperation { object: String, member: String, operation: String },
    /// The operation cannot be replicated as a single primitive.
    NotSupported { operation: &'static str },
    /// Arguments of a replicated operation did not match the expected shape.
    ArgumentMismatch { operation: String, details: String },
    /// Positional operation outside the collection bounds.
    IndexOutOfRange { index: usize, len: usize },
    /// Dictionary add with a key that is already present.
    DuplicateKey(String),
    /// Two synchronized methods resolved to the same logical alias.
    DuplicateAlias { object: String, alias: String },
    /// A collection was activated before a bus was assigned.
    NoBus { object: String, member: String },
    /// The object host failed while running a member.
    Host { object: String, member: String, details: String },
    /// The relay link is closed or failed.
    Link(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProperty { object, member } => {
                write!(f, "object '{}' has no writable property named '{}'", object, member)
            }
            Self::InvalidOperation { object, member, operation } => {
                write!(f, "component {}.{} has no operation named '{}'", object, member, operation)
            }
            Self::NotSupported { operation } => {
                write!(f, "can't do {} on a synchronized set", operation)
            }
            Self::ArgumentMismatch { operation, details } => {
                write!(f, "bad arguments for '{}': {}", operation, details)
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {} is out of range for length {}", index, len)
            }
            Self::DuplicateKey(key) => write!(f, "an item with key {} has already been added", key),
            Self::DuplicateAlias { object, alias } => {
                write!(f, "object '{}' declares more than one synchronized method aliased '{}'", object, alias)
            }
            Self::NoBus { object, member } => {
                write!(f, "{}.{} was activated without a bus", object, member)
            }
            Self::Host { object, member, details } => {
                write!(f, "host failure in {}.{}: {}", object, member, details)
            }
            Self::Link(msg) => write!(f, "relay link error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
