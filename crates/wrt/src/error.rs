//! The closed error taxonomy of spec.md §7.

use crate::module::Section;
use alloc::string::String;
use core::fmt::{self, Display};
use wrt_core::{Trap, TrapCode};

/// A module failed to decode: malformed bytes, naming the offending section
/// and byte offset (spec.md §4.1, §7.1).
#[derive(Debug)]
pub struct DecodeError {
    pub section: Section,
    pub offset: usize,
    pub message: String,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "decode error in {} section at offset {}: {}",
            self.section, self.offset, self.message
        )
    }
}

/// A function body failed type-checking (spec.md §4.2, §7.2).
#[derive(Debug)]
pub struct ValidationError {
    pub func_index: u32,
    pub offset: usize,
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "validation error in function {} at offset {}: {}",
            self.func_index, self.offset, self.message
        )
    }
}

/// An import could not be resolved or its type didn't match (spec.md §4.5, §7.3).
#[derive(Debug)]
pub enum LinkError {
    ImportNotFound {
        module: String,
        field: String,
    },
    ImportTypeMismatch {
        module: String,
        field: String,
        expected: String,
        found: String,
    },
    ElementOutOfRange {
        segment: u32,
    },
    DataOutOfRange {
        segment: u32,
    },
    TrapInStart(Trap),
    DuplicateModuleName(String),
    InvalidModuleConfig(String),
}

impl Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImportNotFound { module, field } => {
                write!(f, "import not found: {module}.{field}")
            }
            Self::ImportTypeMismatch {
                module,
                field,
                expected,
                found,
            } => write!(
                f,
                "import type mismatch for {module}.{field}: expected {expected}, found {found}"
            ),
            Self::ElementOutOfRange { segment } => {
                write!(f, "element segment {segment} is out of range of its table")
            }
            Self::DataOutOfRange { segment } => {
                write!(f, "data segment {segment} is out of range of its memory")
            }
            Self::TrapInStart(trap) => write!(f, "trap in start function: {trap}"),
            Self::DuplicateModuleName(name) => write!(f, "duplicate module name: {name}"),
            Self::InvalidModuleConfig(reason) => write!(f, "invalid module configuration: {reason}"),
        }
    }
}

/// The top-level error type returned across the library boundary. Decode and
/// validation errors surface at `compile`; link errors at `instantiate`;
/// traps (including exit and closed) surface from `call` (spec.md §7).
#[derive(Debug)]
pub enum Error {
    Decode(DecodeError),
    Validation(ValidationError),
    Link(LinkError),
    Trap(Trap),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => Display::fmt(e, f),
            Self::Validation(e) => Display::fmt(e, f),
            Self::Link(e) => Display::fmt(e, f),
            Self::Trap(e) => Display::fmt(e, f),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}

impl From<Trap> for Error {
    fn from(e: Trap) -> Self {
        Error::Trap(e)
    }
}

impl From<TrapCode> for Error {
    fn from(e: TrapCode) -> Self {
        Error::Trap(Trap::from(e))
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
