//! The store: arena-indexed owner of every address space (spec.md §3, §9;
//! ground: modern `crates/wasmi/src/store/mod.rs` + `crates/collections/src/arena`).
//!
//! Nothing in this crate holds an `Rc`/`Weak` pointer into another entity.
//! Every cross-reference — a function's owning instance, a table's element,
//! an instance's exports — is a plain integer index into one of the store's
//! arenas. This is a deliberate departure from the teacher's older
//! `Rc<ModuleInstance>` graph (`src/module.rs`), per spec.md §9's own design
//! note calling for index-based ownership.

pub mod global;
pub mod instance;
pub mod memory;
pub mod table;

use crate::config::StackLimits;
use crate::engine::listener::{FunctionListener, ListenerRegistry};
use crate::func::HostFunc;
use crate::limiter::ResourceLimiter;
use crate::module::ModuleDescriptor;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use wrt_collections::{Arena, ArenaIndex};
use wrt_core::FuncType;

pub use global::GlobalEntity;
pub use instance::InstanceEntity;
pub use memory::MemoryEntity;
pub use table::TableEntity;

macro_rules! arena_index {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl ArenaIndex for $name {
            fn into_usize(self) -> usize {
                self.0 as usize
            }
            fn from_usize(value: usize) -> Self {
                $name(value as u32)
            }
        }
    };
}

arena_index!(FuncIdx);
arena_index!(TableIdx);
arena_index!(MemoryIdx);
arena_index!(GlobalIdx);
arena_index!(InstanceIdx);
arena_index!(FuncTypeIdx);

/// Encodes a reference for storage in an [`wrt_core::UntypedVal`] slot:
/// `u64::MAX` is the null sentinel, matching `ref.null`'s representation.
pub(crate) fn encode_func_ref(addr: Option<FuncIdx>) -> u64 {
    match addr {
        Some(addr) => addr.into_usize() as u64,
        None => u64::MAX,
    }
}

pub(crate) fn decode_func_ref(raw: u64) -> Option<FuncIdx> {
    if raw == u64::MAX {
        None
    } else {
        Some(FuncIdx::from_usize(raw as usize))
    }
}

pub(crate) fn encode_extern_ref(handle: Option<u64>) -> u64 {
    handle.unwrap_or(u64::MAX)
}

pub(crate) fn decode_extern_ref(raw: u64) -> Option<u64> {
    if raw == u64::MAX {
        None
    } else {
        Some(raw)
    }
}

/// A function defined inside some instantiated module.
pub struct WasmFuncEntity {
    pub ty: FuncTypeIdx,
    pub module: Arc<ModuleDescriptor>,
    /// Index of this function's body within `module.code` (i.e. excluding
    /// imports, matching `ModuleDescriptor::func_type_index`'s addressing).
    pub body_index: u32,
    pub instance: InstanceIdx,
}

/// A function provided by the embedder (spec.md §4.6).
pub struct HostFuncEntity<T> {
    pub ty: FuncTypeIdx,
    pub func: Arc<dyn HostFunc<T>>,
}

pub enum FuncEntity<T> {
    Wasm(WasmFuncEntity),
    Host(HostFuncEntity<T>),
}

impl<T> FuncEntity<T> {
    pub fn ty(&self) -> FuncTypeIdx {
        match self {
            Self::Wasm(f) => f.ty,
            Self::Host(f) => f.ty,
        }
    }
}

/// An exported item, as resolved at `instantiate` time and handed back to
/// the embedder or used as the provided definition for another module's
/// import (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternVal {
    Func(FuncIdx),
    Table(TableIdx),
    Memory(MemoryIdx),
    Global(GlobalIdx),
}

/// A point-in-time length of every arena, used to roll back a failed
/// instantiation (see [`Store::mark`]/[`Store::rollback_to`]).
pub(crate) struct ArenaMark {
    funcs: usize,
    tables: usize,
    memories: usize,
    globals: usize,
    instances: usize,
}

/// Owns every live function, table, memory, global and instance, plus the
/// embedder's own data `T` (spec.md §4.4, §4.6's "host context").
pub struct Store<T> {
    funcs: Arena<FuncIdx, FuncEntity<T>>,
    tables: Arena<TableIdx, TableEntity>,
    memories: Arena<MemoryIdx, MemoryEntity>,
    globals: Arena<GlobalIdx, GlobalEntity>,
    instances: Arena<InstanceIdx, InstanceEntity>,
    /// Function-type interner: structural lookup on first sight
    /// (SPEC_FULL.md §3 — simplified from the teacher's separate
    /// `FuncTypeRegistry` service to one store-global table).
    func_types: Vec<FuncType>,
    pub(crate) limiter: Option<Arc<dyn ResourceLimiter>>,
    stack_limits: StackLimits,
    /// Named module instances (spec.md §4.4 `register_module_instance`/
    /// `lookup_module`); unnamed instances are never entered here.
    module_names: BTreeMap<String, InstanceIdx>,
    /// Function-call observation hooks (spec.md §4.3's listener contract);
    /// empty unless an embedder calls [`Store::register_listener`].
    listeners: ListenerRegistry,
    pub data: T,
}

impl<T> Store<T> {
    pub fn new(data: T) -> Self {
        Self {
            funcs: Arena::new(),
            tables: Arena::new(),
            memories: Arena::new(),
            globals: Arena::new(),
            instances: Arena::new(),
            func_types: Vec::new(),
            limiter: None,
            stack_limits: StackLimits::default(),
            module_names: BTreeMap::new(),
            listeners: ListenerRegistry::default(),
            data,
        }
    }

    /// Registers a function-call observer (spec.md §4.3); the interpreter
    /// calls its `before`/`after` hooks around every Wasm-to-Wasm call.
    pub fn register_listener(&mut self, listener: Arc<dyn FunctionListener>) {
        self.listeners.register(listener);
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    pub(crate) fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn set_limiter(&mut self, limiter: Arc<dyn ResourceLimiter>) {
        self.limiter = Some(limiter);
    }

    /// Value-stack and call-depth bounds the interpreter enforces while
    /// running functions in this store (spec.md §5).
    pub fn stack_limits(&self) -> StackLimits {
        self.stack_limits
    }

    pub fn set_stack_limits(&mut self, limits: StackLimits) {
        self.stack_limits = limits;
    }

    /// Interns a function type, returning the same index for structurally
    /// equal types seen before (spec.md §3).
    pub fn intern_func_type(&mut self, ty: FuncType) -> FuncTypeIdx {
        if let Some(pos) = self.func_types.iter().position(|existing| *existing == ty) {
            return FuncTypeIdx::from_usize(pos);
        }
        let idx = self.func_types.len();
        self.func_types.push(ty);
        FuncTypeIdx::from_usize(idx)
    }

    pub fn func_type(&self, idx: FuncTypeIdx) -> &FuncType {
        &self.func_types[idx.into_usize()]
    }

    pub fn alloc_func(&mut self, entity: FuncEntity<T>) -> FuncIdx {
        self.funcs.alloc(entity)
    }

    pub fn alloc_table(&mut self, entity: TableEntity) -> TableIdx {
        self.tables.alloc(entity)
    }

    pub fn alloc_memory(&mut self, entity: MemoryEntity) -> MemoryIdx {
        self.memories.alloc(entity)
    }

    pub fn alloc_global(&mut self, entity: GlobalEntity) -> GlobalIdx {
        self.globals.alloc(entity)
    }

    /// The index the next [`Store::alloc_instance`] call will return. Lets
    /// the linker allocate an instance's own functions before the instance
    /// entity itself exists, since each function needs to point back at its
    /// owning instance (spec.md §4.5).
    pub fn next_instance_idx(&self) -> InstanceIdx {
        self.instances.next_index()
    }

    pub fn alloc_instance(&mut self, entity: InstanceEntity) -> InstanceIdx {
        self.instances.alloc(entity)
    }

    pub fn func(&self, idx: FuncIdx) -> &FuncEntity<T> {
        &self.funcs[idx]
    }

    pub fn table(&self, idx: TableIdx) -> &TableEntity {
        &self.tables[idx]
    }

    pub fn table_mut(&mut self, idx: TableIdx) -> &mut TableEntity {
        &mut self.tables[idx]
    }

    pub fn memory(&self, idx: MemoryIdx) -> &MemoryEntity {
        &self.memories[idx]
    }

    pub fn memory_mut(&mut self, idx: MemoryIdx) -> &mut MemoryEntity {
        &mut self.memories[idx]
    }

    pub fn global(&self, idx: GlobalIdx) -> &GlobalEntity {
        &self.globals[idx]
    }

    pub fn global_mut(&mut self, idx: GlobalIdx) -> &mut GlobalEntity {
        &mut self.globals[idx]
    }

    pub fn instance(&self, idx: InstanceIdx) -> &InstanceEntity {
        &self.instances[idx]
    }

    pub fn instance_mut(&mut self, idx: InstanceIdx) -> &mut InstanceEntity {
        &mut self.instances[idx]
    }

    /// Registers `instance` under `name`, failing if the name is already
    /// taken (spec.md §4.4). Called by the linker for a non-empty
    /// [`crate::config::ModuleConfig::name`].
    pub fn register_module_instance(&mut self, name: String, instance: InstanceIdx) -> Result<(), crate::error::LinkError> {
        if self.module_names.contains_key(&name) {
            return Err(crate::error::LinkError::DuplicateModuleName(name));
        }
        self.module_names.insert(name, instance);
        Ok(())
    }

    pub fn lookup_module(&self, name: &str) -> Option<InstanceIdx> {
        self.module_names.get(name).copied()
    }

    /// A snapshot of every arena's length, taken before a multi-step
    /// allocation (module instantiation) begins.
    pub(crate) fn mark(&self) -> ArenaMark {
        ArenaMark {
            funcs: self.funcs.len(),
            tables: self.tables.len(),
            memories: self.memories.len(),
            globals: self.globals.len(),
            instances: self.instances.len(),
        }
    }

    /// Discards every func/table/memory/global/instance entity allocated
    /// since `mark` (spec.md §4.5, §8 scenario 4: a trapping start function
    /// must leave the store with no new memories, tables, globals or
    /// exports). Only safe to call before any of those new indices have
    /// been handed to the embedder or written into an entity that survives
    /// the rollback.
    pub(crate) fn rollback_to(&mut self, mark: ArenaMark) {
        self.funcs.truncate(mark.funcs);
        self.tables.truncate(mark.tables);
        self.memories.truncate(mark.memories);
        self.globals.truncate(mark.globals);
        self.instances.truncate(mark.instances);
    }

    /// Closes every live instance with `code` (spec.md §4.4, §9 "closing the
    /// store closes every module it holds"). Idempotent per instance.
    pub fn close_with_exit_code(&self, code: i32) {
        for (_, instance) in self.instances.iter() {
            instance.close_with_exit_code(code);
        }
    }
}
