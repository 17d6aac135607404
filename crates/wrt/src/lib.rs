//! `wrt`: an embeddable WebAssembly 1.0 runtime core — binary decoder and
//! validator, module linker/instantiation pipeline, a goto-threaded stack
//! interpreter, and the host-function call convention that lets embedder Rust
//! code and guest Wasm code call each other (spec.md §1).
//!
//! A minimal end-to-end flow:
//!
//! ```ignore
//! use wrt::{Config, Engine, Func, ModuleConfig, Store, Value};
//!
//! let engine = Engine::new(Config::default());
//! let handle = engine.compile(&wasm_bytes)?;
//! let mut store = Store::new(());
//! let instance = engine.instantiate(&mut store, handle, &[], &ModuleConfig::default())?;
//! let add = match store.instance(instance).export("add").unwrap() {
//!     wrt::ExternVal::Func(f) => wrt::Func::from(f),
//!     _ => unreachable!(),
//! };
//! let mut results = [Value::I32(0)];
//! add.call(&mut store, &[Value::I32(1), Value::I32(2)], &mut results)?;
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod func;
pub mod isa;
pub mod limiter;
pub mod linker;
pub mod module;
pub mod store;

pub use cache::cache_key;
pub use config::{Config, Features, ModuleConfig, StackLimits};
pub use engine::listener::{FunctionListener, StackFrameInfo, StackIterator};
pub use engine::{CompiledModule, Engine, ModuleHandle};
pub use error::{DecodeError, Error, LinkError, ValidationError};
pub use func::{Caller, Func, HostFunc, IntoFunc, WasmResults, WasmTy};
pub use limiter::{NoLimiter, ResourceLimiter};
pub use linker::instantiate;
pub use module::ModuleDescriptor;
pub use store::{ExternVal, FuncIdx, FuncTypeIdx, GlobalIdx, InstanceIdx, MemoryIdx, Store, TableIdx};
pub use wrt_core::{FuncType, Limits, RefType, Trap, TrapCode, Value, ValueType, F32, F64, V128};
