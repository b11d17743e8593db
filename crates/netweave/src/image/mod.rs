//! # Module Image
//!
//! Binary persistence for [`ModuleDef`](crate::module::ModuleDef).
//!
//! ## Format
//!
//! - **Header**: `NSYM` magic, then the format version as a little-endian `u16`.
//! - **Body**: one TLV list holding the module.
//!   - Scalars: `[Tag: 1b][Data: N]`
//!   - Strings: `[Tag: 1b][Len: 4b][UTF-8: Len]`
//!   - Containers: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! Branch operands are written as instruction indices and re-bound to fresh
//! instruction ids on load.

mod codec;
mod decoder;
mod encoder;

pub use codec::decode_module;
pub use codec::encode_module;
pub use decoder::Decoder;
pub use decoder::ListIter;
pub use encoder::Encoder;

use std::path::Path;

use crate::module::ModuleDef;

pub const MAGIC: &[u8; 4] = b"NSYM";
pub const VERSION: u16 = 1;
/// File extension of module images.
pub const EXTENSION: &str = "nsym";

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Byte does not correspond to a valid `Tag`, or not the tag expected here.
    InvalidTag(u8),
    InvalidUtf8,
    ScopeMismatch { expected: Scope, actual: Scope },
    ScopeUnderflow,
    ScopeStillOpen,
    UnexpectedEnd,
    BlobTooLarge(usize),
    /// More than one payload written into a variant.
    TooManyItems(Scope),
    /// Variant closed without a payload.
    EmptyVariant,
    BadMagic,
    UnsupportedVersion(u16),
    UnknownVariant { context: &'static str, name: String },
    /// Bytes left over after the module body.
    TrailingBytes(usize),
    /// A branch names an instruction that is not in the body.
    DanglingBranch(u32),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "invalid tag byte: {:#04x}", b),
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "scope mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::TooManyItems(s) => write!(f, "too many items in scope {:?}; expected exactly 1", s),
            Error::BadMagic => write!(f, "not a module image (bad magic)"),
            Error::UnsupportedVersion(v) => write!(f, "unsupported image version {}", v),
            Error::UnknownVariant { context, name } => write!(f, "unknown {} '{}'", context, name),
            Error::TrailingBytes(n) => write!(f, "{} trailing bytes after module body", n),
            Error::DanglingBranch(i) => write!(f, "branch to missing instruction {}", i),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    U8 = 0x03,
    U16 = 0x04,
    U32 = 0x05,
    S32 = 0x09,
    S64 = 0x0A,
    F64 = 0x0C,
    Unit = 0x0E,
    None = 0x0F,
    String = 0x10,
    List = 0x20,
    Variant = 0x33,
}

impl Tag {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::U8),
            0x04 => Some(Tag::U16),
            0x05 => Some(Tag::U32),
            0x09 => Some(Tag::S32),
            0x0A => Some(Tag::S64),
            0x0C => Some(Tag::F64),
            0x0E => Some(Tag::Unit),
            0x0F => Some(Tag::None),
            0x10 => Some(Tag::String),
            0x20 => Some(Tag::List),
            0x33 => Some(Tag::Variant),
            _ => None,
        }
    }
}

/// Open container kinds on the encoder stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Root,
    List,
    /// Exactly one payload after the name.
    Variant,
}

/// Reads and decodes the image at `path`.
pub fn read_file(path: &Path) -> crate::error::Result<ModuleDef> {
    let bytes = std::fs::read(path).map_err(|e| crate::error::Error::io(path, e))?;
    Ok(decode_module(&bytes)?)
}

/// Encodes `module` and writes it to `path`, replacing any existing file.
pub fn write_file(path: &Path, module: &ModuleDef) -> crate::error::Result<()> {
    let bytes = encode_module(module)?;
    std::fs::write(path, bytes).map_err(|e| crate::error::Error::io(path, e))
}
