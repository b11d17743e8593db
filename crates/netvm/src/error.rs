//! # Error Definitions
//!
//! Runtime faults of the interpreter. A fault aborts the member being run
//! and every frame above it; fields written before the fault stay written.

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    MissingType(String),
    MissingMethod { ty: String, method: String },
    MissingField { ty: String, field: String },
    MissingProperty { ty: String, property: String },
    /// An operand had the wrong shape for the instruction.
    TypeMismatch { op: &'static str, expected: &'static str, found: String },
    NullReference { op: &'static str },
    StackUnderflow { method: String, at: usize },
    BadBranch { method: String, target: u32 },
    BadSlot { method: String, slot: u16 },
    /// Control ran past the last instruction.
    FellThrough { method: String },
    IndexOutOfRange { index: i64, len: usize },
    DivideByZero,
    StepLimit(u64),
    CallDepth(usize),
    /// The attached capability failed.
    Interceptor(netsync::Error),
    Image(netweave::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingType(name) => write!(f, "no type named {}", name),
            Self::MissingMethod { ty, method } => write!(f, "{} has no method {}", ty, method),
            Self::MissingField { ty, field } => write!(f, "{} has no field {}", ty, field),
            Self::MissingProperty { ty, property } => write!(f, "{} has no property {}", ty, property),
            Self::TypeMismatch { op, expected, found } => {
                write!(f, "{} expected {}, found {}", op, expected, found)
            }
            Self::NullReference { op } => write!(f, "{} on a null reference", op),
            Self::StackUnderflow { method, at } => write!(f, "stack underflow in {} at {}", method, at),
            Self::BadBranch { method, target } => write!(f, "branch to missing IL_{:04} in {}", target, method),
            Self::BadSlot { method, slot } => write!(f, "slot {} out of range in {}", slot, method),
            Self::FellThrough { method } => write!(f, "control ran off the end of {}", method),
            Self::IndexOutOfRange { index, len } => write!(f, "index {} out of range for length {}", index, len),
            Self::DivideByZero => write!(f, "integer division by zero"),
            Self::StepLimit(n) => write!(f, "step limit of {} instructions exceeded", n),
            Self::CallDepth(n) => write!(f, "call depth limit of {} exceeded", n),
            Self::Interceptor(e) => write!(f, "interceptor error: {}", e),
            Self::Image(e) => write!(f, "image error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Interceptor(e) => Some(e),
            Self::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netsync::Error> for Error {
    fn from(e: netsync::Error) -> Self {
        Self::Interceptor(e)
    }
}

impl From<netweave::Error> for Error {
    fn from(e: netweave::Error) -> Self {
        Self::Image(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
