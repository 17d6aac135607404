//! The validated, in-memory shape of a decoded module (spec.md §3, §4.1).
//!
//! `ModuleDescriptor` is the output of [`decode`] and the input to
//! [`translate`] and the linker; it owns no runtime state (no memories, no
//! tables) — those only come into being at instantiation.

pub mod decode;
pub mod translate;

use crate::isa::{FuncIdx, Instr};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Display};
use wrt_core::{FuncType, Limits, RefType, ValueType};

/// Which section a decode error was found in, named for error messages
/// (spec.md §7.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Type,
    Import,
    Function,
    Table,
    Memory,
    Global,
    Export,
    Start,
    Element,
    Code,
    Data,
    DataCount,
    Custom,
}

impl Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Type => "type",
            Self::Import => "import",
            Self::Function => "function",
            Self::Table => "table",
            Self::Memory => "memory",
            Self::Global => "global",
            Self::Export => "export",
            Self::Start => "start",
            Self::Element => "element",
            Self::Code => "code",
            Self::Data => "data",
            Self::DataCount => "data count",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub element: RefType,
    pub limits: Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub limits: Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub content: ValueType,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    Func(u32),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternKind {
    Func,
    Table,
    Memory,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExternKind,
    /// Index into the kind's own index space (funcs, tables, memories,
    /// globals), counting imports first as the binary format requires.
    pub index: u32,
}

/// A constant initializer expression, restricted to the MVP/extended set of
/// producers valid in this position (spec.md §4.1): a single constant, or a
/// `global.get` of an imported immutable global.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstExpr {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
    V128(u128),
    RefNull(RefType),
    RefFunc(FuncIdx),
    GlobalGet(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementMode {
    Active { table_index: u32, offset: ConstExpr },
    Passive,
    Declared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub ty: RefType,
    pub items: Vec<ConstExpr>,
    pub mode: ElementMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataMode {
    Active { memory_index: u32, offset: ConstExpr },
    Passive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub bytes: Vec<u8>,
    pub mode: DataMode,
}

/// A function body after translation: its locals (beyond the params, which
/// occupy the first `FuncType::params().len()` slots) and flattened bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    pub locals: Vec<ValueType>,
    pub instrs: Vec<Instr>,
    /// Maximum value-stack depth reached while executing this function,
    /// computed during translation so the interpreter can pre-size its stack
    /// (spec.md §4.2 "statically computable maximum stack height").
    pub max_stack_height: u32,
}

/// The fully decoded and validated shape of a module, prior to
/// instantiation. Shared read-only between every instance created from it
/// (spec.md §3 "a compiled module is immutable and may be instantiated
/// multiple times").
#[derive(Debug, Clone, Default)]
pub struct ModuleDescriptor {
    pub types: Vec<FuncType>,
    pub imports: Vec<Import>,
    /// Type index for every locally defined (non-imported) function.
    pub functions: Vec<u32>,
    pub tables: Vec<TableType>,
    pub memories: Vec<MemoryType>,
    pub globals: Vec<(GlobalType, ConstExpr)>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment>,
    pub code: Vec<FuncBody>,
    pub data_count: Option<u32>,
}

impl ModuleDescriptor {
    pub fn imported_funcs(&self) -> impl Iterator<Item = u32> + '_ {
        self.imports.iter().filter_map(|import| match import.kind {
            ImportKind::Func(ty) => Some(ty),
            _ => None,
        })
    }

    /// Number of imported functions, i.e. the offset at which locally defined
    /// function indices begin in the function index space.
    pub fn imported_func_count(&self) -> u32 {
        self.imported_funcs().count() as u32
    }

    /// Resolves a function index (imports first, then locally defined) to
    /// its type index.
    pub fn func_type_index(&self, func_index: u32) -> Option<u32> {
        let imported = self.imported_func_count();
        if func_index < imported {
            self.imported_funcs().nth(func_index as usize)
        } else {
            self.functions.get((func_index - imported) as usize).copied()
        }
    }
}
