use crate::HostError;
use alloc::{boxed::Box, string::String};
use core::fmt::{self, Display};

/// The taxonomy of runtime faults an instruction can raise, per spec.md §4.3.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum TrapCode {
    /// The `unreachable` instruction was executed.
    Unreachable = 1,
    /// A memory access fell outside `[0, byte_length)`.
    MemoryOutOfBounds = 2,
    /// A table access fell outside `[0, length)`.
    TableOutOfBounds = 3,
    /// `call_indirect` (or a bulk-memory table op) hit a `null` element.
    UndefinedElement = 4,
    /// `i32`/`i64` `div`/`rem` by zero.
    IntegerDivisionByZero = 5,
    /// Signed division overflow: `INT_MIN / -1`.
    IntegerOverflow = 6,
    /// A non-saturating float-to-int conversion saw NaN or an out-of-range value.
    BadConversionToInteger = 7,
    /// The configured maximum call-frame count was exceeded.
    StackOverflow = 8,
    /// `call_indirect`'s table entry has a different function type than expected.
    IndirectCallTypeMismatch = 9,
    /// A call was dispatched into a module instance that has been closed.
    Closed = 10,
}

impl TrapCode {
    pub fn message(self) -> &'static str {
        match self {
            Self::Unreachable => "wasm `unreachable` instruction executed",
            Self::MemoryOutOfBounds => "out of bounds memory access",
            Self::TableOutOfBounds => "out of bounds table access",
            Self::UndefinedElement => "uninitialized element",
            Self::IntegerDivisionByZero => "integer divide by zero",
            Self::IntegerOverflow => "integer overflow",
            Self::BadConversionToInteger => "invalid conversion to integer",
            Self::StackOverflow => "call stack exhausted",
            Self::IndirectCallTypeMismatch => "indirect call type mismatch",
            Self::Closed => "call into closed module instance",
        }
    }
}

impl Display for TrapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One (function address, program counter) pair in a captured call stack.
///
/// `func` is an opaque `u64` encoding of a function address (the engine
/// crate is the one that knows how to format it meaningfully); keeping it
/// untyped here avoids a dependency cycle between `wrt-core` and the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub func: u64,
    pub program_counter: u32,
}

/// A recoverable runtime failure, carrying enough context to build the "wasm
/// stack trace" described in spec.md §6.
#[derive(Debug)]
pub struct Trap {
    reason: Box<TrapReason>,
    trace: alloc::vec::Vec<TraceFrame>,
}

#[derive(Debug)]
enum TrapReason {
    Code(TrapCode),
    Exit(i32),
    Message(String),
    Host(Box<dyn HostError>),
}

impl Trap {
    fn with_reason(reason: TrapReason) -> Self {
        Self {
            reason: Box::new(reason),
            trace: alloc::vec::Vec::new(),
        }
    }

    pub fn code(code: TrapCode) -> Self {
        Self::with_reason(TrapReason::Code(code))
    }

    pub fn exit(status: i32) -> Self {
        Self::with_reason(TrapReason::Exit(status))
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::with_reason(TrapReason::Message(message.into()))
    }

    pub fn host(error: impl HostError) -> Self {
        Self::with_reason(TrapReason::Host(Box::new(error)))
    }

    /// Attaches the captured call stack, innermost frame first.
    pub fn with_trace(mut self, trace: alloc::vec::Vec<TraceFrame>) -> Self {
        self.trace = trace;
        self
    }

    pub fn trace(&self) -> &[TraceFrame] {
        &self.trace
    }

    pub fn trap_code(&self) -> Option<TrapCode> {
        match &*self.reason {
            TrapReason::Code(code) => Some(*code),
            _ => None,
        }
    }

    pub fn i32_exit_status(&self) -> Option<i32> {
        match &*self.reason {
            TrapReason::Exit(status) => Some(*status),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(&*self.reason, TrapReason::Code(TrapCode::Closed))
    }

    pub fn downcast_ref<T: HostError>(&self) -> Option<&T> {
        match &*self.reason {
            TrapReason::Host(host) => host.downcast_ref(),
            _ => None,
        }
    }
}

impl From<TrapCode> for Trap {
    fn from(code: TrapCode) -> Self {
        Trap::code(code)
    }
}

impl Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.reason {
            TrapReason::Code(code) => Display::fmt(code, f),
            TrapReason::Exit(status) => write!(f, "exited with status {status}"),
            TrapReason::Message(message) => f.write_str(message),
            TrapReason::Host(host) => Display::fmt(host, f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Trap {}
