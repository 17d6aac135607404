//! The engine: compiles modules and runs them (spec.md §4.3).
//!
//! Exactly one back-end is implemented, [`interpreter`] — a goto-threaded
//! stack machine over the bytecode [`crate::module::translate`] produces.
//! A second, compiling back-end is named in spec.md as a future engine
//! behind the same trait but is a documented contract only here (Non-goal:
//! compiler-backend code generation). `Engine` itself owns the in-process
//! registry of compiled modules (SPEC_FULL.md §6); persisting that registry
//! to a file-backed cache is the out-of-scope external collaborator —
//! [`crate::cache::cache_key`] is the one piece of that story implemented.

pub mod interpreter;
pub mod listener;

use crate::config::Config;
use crate::error::{DecodeError, Error};
use crate::module::ModuleDescriptor;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use spin::Mutex;

/// A decoded, validated and translated module, ready to be instantiated any
/// number of times (spec.md §3 "a compiled module is immutable").
pub struct CompiledModule {
    pub(crate) descriptor: Arc<ModuleDescriptor>,
    pub(crate) cache_key: [u8; 32],
}

impl CompiledModule {
    pub fn cache_key(&self) -> [u8; 32] {
        self.cache_key
    }

    pub fn descriptor(&self) -> &Arc<ModuleDescriptor> {
        &self.descriptor
    }
}

/// Opaque handle into the engine's compiled-module registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ModuleHandle(u64);

struct Registry {
    next_id: u64,
    modules: BTreeMap<u64, Arc<CompiledModule>>,
}

/// Compiles and runs modules under a shared [`Config`] (spec.md §4.3's five
/// engine operations).
pub struct Engine {
    config: Config,
    registry: Mutex<Registry>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: Mutex::new(Registry {
                next_id: 0,
                modules: BTreeMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decodes, validates and translates `bytes`, registering the result in
    /// this engine's compiled-module table.
    pub fn compile(&self, bytes: &[u8]) -> Result<ModuleHandle, DecodeError> {
        let descriptor = crate::module::decode::decode(bytes, self.config.features)?;
        let cache_key = crate::cache::cache_key(&self.config.engine_version, self.config.features, bytes);
        let compiled = Arc::new(CompiledModule {
            descriptor: Arc::new(descriptor),
            cache_key,
        });
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.modules.insert(id, compiled);
        Ok(ModuleHandle(id))
    }

    pub fn module(&self, handle: ModuleHandle) -> Option<Arc<CompiledModule>> {
        self.registry.lock().modules.get(&handle.0).cloned()
    }

    /// Instantiates a compiled module against the given imports (spec.md
    /// §4.5's atomic pipeline), allocating whatever the store doesn't
    /// already own.
    pub fn instantiate<T>(
        &self,
        store: &mut crate::store::Store<T>,
        handle: ModuleHandle,
        imports: &[crate::store::ExternVal],
        config: &crate::config::ModuleConfig,
    ) -> Result<crate::store::InstanceIdx, Error> {
        let compiled = self.module(handle).ok_or_else(|| {
            Error::Link(crate::error::LinkError::InvalidModuleConfig(
                "unknown compiled module handle".into(),
            ))
        })?;
        crate::linker::instantiate(store, &compiled, imports, config)
    }

    pub fn compiled_module_count(&self) -> usize {
        self.registry.lock().modules.len()
    }

    /// Removes a module from the registry. Instances already created from
    /// it remain valid — they hold their own `Arc<ModuleDescriptor>` clone
    /// (spec.md §4.3: "deleting a compiled module does not invalidate its
    /// instances").
    pub fn delete(&self, handle: ModuleHandle) -> bool {
        self.registry.lock().modules.remove(&handle.0).is_some()
    }
}
