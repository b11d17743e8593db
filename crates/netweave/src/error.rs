//! # Error Definitions
//!
//! Weave-time failures. Every variant is fatal for the module being woven:
//! nothing is written back when one is returned.

use crate::image;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A type was selected for weaving but exposes no capability property.
    MissingCapability { ty: String },
    /// A type exposes more than one capability property.
    AmbiguousCapability { ty: String, count: usize },
    /// A synchronized method has more parameters than the call prologue can pack.
    TooManyParameters { method: String, alias: String, object: String, max: usize },
    /// Two synchronized methods of one type share an alias.
    DuplicateAlias { object: String, alias: String },
    /// A member that must be rewritten has no body.
    NoBody { ty: String, method: String },
    /// A rewritten body does not verify.
    UnbalancedStack { method: String, at: usize, details: String },
    /// The capability definition found on the search path is not the expected shape.
    CapabilityMismatch(String),
    Io { path: String, details: String },
    Image(image::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCapability { ty } => {
                write!(f, "type {} has no property of the network capability type", ty)
            }
            Self::AmbiguousCapability { ty, count } => {
                write!(f, "type {} has {} properties of the network capability type, expected exactly one", ty, count)
            }
            Self::TooManyParameters { method, alias, object, max } => write!(
                f,
                "Method {}({}) in object {} marked as NetSync but has too many parameters, \
                 remove NetSync marker or use less than {} parameters!",
                method,
                alias,
                object,
                max + 1
            ),
            Self::DuplicateAlias { object, alias } => {
                write!(f, "object {} has more than one synchronized method aliased '{}'", object, alias)
            }
            Self::NoBody { ty, method } => write!(f, "{}::{} has no body to rewrite", ty, method),
            Self::UnbalancedStack { method, at, details } => {
                write!(f, "rewritten body of {} fails verification at instruction {}: {}", method, at, details)
            }
            Self::CapabilityMismatch(msg) => write!(f, "capability definition mismatch: {}", msg),
            Self::Io { path, details } => write!(f, "I/O error on {}: {}", path, details),
            Self::Image(e) => write!(f, "module image error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::Error> for Error {
    fn from(e: image::Error) -> Self {
        Self::Image(e)
    }
}

impl Error {
    pub(crate) fn io(path: &std::path::Path, e: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), details: e.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
