//! `wrt`'s internal instruction set.
//!
//! Grounded on the teacher's legacy bytecode (`src/isa.rs`, `src/runner.rs`):
//! WebAssembly is a *structured* stack machine (blocks, loops, ifs); this is a
//! *plain* one (flattened gotos). The validator-cum-translator (`module::translate`)
//! walks the already-validated operator stream once and lowers every structured
//! control construct to an absolute jump target plus a precomputed
//! [`DropKeep`], so the interpreter never has to re-scan for a matching `end`.
//!
//! Differences from the Wasm operand encoding, mirroring the teacher's own
//! list:
//! - control structures are flattened to plain `br`/`br_if`/`br_table` with
//!   resolved absolute instruction indices;
//! - locals live on the value stack and are addressed by absolute slot index
//!   within the current frame rather than a relative depth;
//! - `br`/`return` carry the number of values to drop and how many to keep,
//!   resolved once at translation time instead of walking the control stack
//!   at run time.

use alloc::vec::Vec;
use wrt_core::{RefType, ValueType};

/// How many of the top-of-stack values survive a branch or return, and how
/// many beneath them are discarded. Spec.md §4.2 calls this "precomputed
/// stack-drop counts"; unlike the teacher's MVP-only version (which keeps at
/// most one value), `keep` is a count to support the multi-value feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DropKeep {
    pub drop: u32,
    pub keep: u32,
}

impl DropKeep {
    pub const fn new(drop: u32, keep: u32) -> Self {
        Self { drop, keep }
    }
}

/// A resolved branch target: an absolute instruction index within the
/// function body plus the drop/keep to apply when taking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrTarget {
    pub pc: u32,
    pub drop_keep: DropKeep,
}

pub type FuncIdx = u32;
pub type TypeIdx = u32;
pub type TableIdx = u32;
pub type MemIdx = u32;
pub type GlobalIdx = u32;
pub type DataIdx = u32;
pub type ElemIdx = u32;
pub type LocalIdx = u32;

/// A memory access immediate: a constant byte offset added to the dynamic
/// operand (spec.md §4.3 `effective_address = base + offset_immediate`).
/// Alignment hints are validated but carry no runtime meaning for the
/// interpreter, so they are not retained in the bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    pub offset: u32,
    pub memory_index: MemIdx,
}

macro_rules! instr_enum {
    ($( $(#[$attr:meta])* $variant:ident $( ( $($field:ty),+ ) )? ),* $(,)?) => {
        /// One flattened bytecode instruction.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Instr {
            $( $(#[$attr])* $variant $( ( $($field),+ ) )?, )*
        }
    };
}

instr_enum! {
    Unreachable,
    Br(BrTarget),
    BrIfEqz(BrTarget),
    BrIfNez(BrTarget),
    BrTable(Vec<BrTarget>, BrTarget),
    Return(DropKeep),
    Call(FuncIdx),
    CallIndirect(TypeIdx, TableIdx),
    ReturnCall(FuncIdx),
    ReturnCallIndirect(TypeIdx, TableIdx),

    /// Drops the top operand; the field is its slot width (1, or 2 for `v128`).
    Drop(u32),
    /// Selects between the top two operands of the given slot width.
    Select(u32),
    TypedSelect(ValueType),

    LocalGet(LocalIdx),
    LocalSet(LocalIdx),
    LocalTee(LocalIdx),
    GlobalGet(GlobalIdx),
    GlobalSet(GlobalIdx),

    I32Load(MemArg),
    I64Load(MemArg),
    F32Load(MemArg),
    F64Load(MemArg),
    I32Load8S(MemArg),
    I32Load8U(MemArg),
    I32Load16S(MemArg),
    I32Load16U(MemArg),
    I64Load8S(MemArg),
    I64Load8U(MemArg),
    I64Load16S(MemArg),
    I64Load16U(MemArg),
    I64Load32S(MemArg),
    I64Load32U(MemArg),
    I32Store(MemArg),
    I64Store(MemArg),
    F32Store(MemArg),
    F64Store(MemArg),
    I32Store8(MemArg),
    I32Store16(MemArg),
    I64Store8(MemArg),
    I64Store16(MemArg),
    I64Store32(MemArg),
    MemorySize(MemIdx),
    MemoryGrow(MemIdx),
    MemoryFill(MemIdx),
    MemoryCopy(MemIdx, MemIdx),
    MemoryInit(DataIdx, MemIdx),
    DataDrop(DataIdx),

    TableGet(TableIdx),
    TableSet(TableIdx),
    TableSize(TableIdx),
    TableGrow(TableIdx),
    TableFill(TableIdx),
    TableCopy(TableIdx, TableIdx),
    TableInit(ElemIdx, TableIdx),
    ElemDrop(ElemIdx),

    RefNull(RefType),
    RefIsNull,
    RefFunc(FuncIdx),

    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),

    // --- i32 ---
    I32Eqz, I32Eq, I32Ne, I32LtS, I32LtU, I32GtS, I32GtU, I32LeS, I32LeU, I32GeS, I32GeU,
    I32Clz, I32Ctz, I32Popcnt,
    I32Add, I32Sub, I32Mul, I32DivS, I32DivU, I32RemS, I32RemU,
    I32And, I32Or, I32Xor, I32Shl, I32ShrS, I32ShrU, I32Rotl, I32Rotr,
    // --- i64 ---
    I64Eqz, I64Eq, I64Ne, I64LtS, I64LtU, I64GtS, I64GtU, I64LeS, I64LeU, I64GeS, I64GeU,
    I64Clz, I64Ctz, I64Popcnt,
    I64Add, I64Sub, I64Mul, I64DivS, I64DivU, I64RemS, I64RemU,
    I64And, I64Or, I64Xor, I64Shl, I64ShrS, I64ShrU, I64Rotl, I64Rotr,
    // --- f32 ---
    F32Eq, F32Ne, F32Lt, F32Gt, F32Le, F32Ge,
    F32Abs, F32Neg, F32Ceil, F32Floor, F32Trunc, F32Nearest, F32Sqrt,
    F32Add, F32Sub, F32Mul, F32Div, F32Min, F32Max, F32Copysign,
    // --- f64 ---
    F64Eq, F64Ne, F64Lt, F64Gt, F64Le, F64Ge,
    F64Abs, F64Neg, F64Ceil, F64Floor, F64Trunc, F64Nearest, F64Sqrt,
    F64Add, F64Sub, F64Mul, F64Div, F64Min, F64Max, F64Copysign,

    // --- conversions ---
    I32WrapI64,
    I32TruncF32S, I32TruncF32U, I32TruncF64S, I32TruncF64U,
    I64ExtendI32S, I64ExtendI32U,
    I64TruncF32S, I64TruncF32U, I64TruncF64S, I64TruncF64U,
    F32ConvertI32S, F32ConvertI32U, F32ConvertI64S, F32ConvertI64U, F32DemoteF64,
    F64ConvertI32S, F64ConvertI32U, F64ConvertI64S, F64ConvertI64U, F64PromoteF32,
    I32ReinterpretF32, I64ReinterpretF64, F32ReinterpretI32, F64ReinterpretI64,

    // --- sign-extension feature ---
    I32Extend8S, I32Extend16S, I64Extend8S, I64Extend16S, I64Extend32S,

    // --- saturating truncation feature ---
    I32TruncSatF32S, I32TruncSatF32U, I32TruncSatF64S, I32TruncSatF64U,
    I64TruncSatF32S, I64TruncSatF32U, I64TruncSatF64S, I64TruncSatF64U,

    // --- v128 (value type + memory only; see DESIGN.md) ---
    V128Load(MemArg),
    V128Store(MemArg),
    V128Const(u128),
}
