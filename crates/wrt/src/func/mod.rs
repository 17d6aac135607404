//! The host-function bridge (spec.md §4.6).

pub mod caller;
pub mod into_func;

pub use caller::Caller;
pub use into_func::{IntoFunc, WasmResults, WasmTy};

use crate::error::Error;
use crate::store::{ExternVal, FuncEntity, FuncIdx, HostFuncEntity, Store};
use alloc::sync::Arc;
use wrt_core::{FuncType, Trap, Value};

/// A type-erased host function body, called with already-type-checked
/// arguments and a results buffer pre-sized to the function's result arity.
pub trait HostFunc<T>: Send + Sync {
    fn call(&self, caller: Caller<'_, T>, args: &[Value], results: &mut [Value]) -> Result<(), Trap>;
}

/// A callable function address — either defined inside a guest module or
/// provided by the embedder (spec.md §3 "function address").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Func(pub(crate) FuncIdx);

impl From<FuncIdx> for Func {
    /// Recovers a callable [`Func`] from a [`crate::store::ExternVal::Func`]
    /// address, e.g. one returned by [`crate::store::InstanceEntity::export`].
    fn from(idx: FuncIdx) -> Self {
        Func(idx)
    }
}

impl From<Func> for ExternVal {
    /// Lets a host function created with [`Func::wrap`] be passed straight
    /// into [`crate::linker::instantiate`]'s `imports` list (spec.md §4.6).
    fn from(f: Func) -> Self {
        ExternVal::Func(f.0)
    }
}

impl Func {
    /// Wraps a Rust closure as a host function, inferring its [`FuncType`]
    /// from the closure's own Rust signature (spec.md §4.6).
    pub fn wrap<T: 'static, Params, Results>(
        store: &mut Store<T>,
        f: impl IntoFunc<T, Params, Results>,
    ) -> Self {
        let (ty, host) = f.into_func();
        let ty_idx = store.intern_func_type(ty);
        let idx = store.alloc_func(FuncEntity::Host(HostFuncEntity { ty: ty_idx, func: host }));
        Func(idx)
    }

    pub fn ty<T>(self, store: &Store<T>) -> FuncType {
        let ty_idx = store.func(self.0).ty();
        store.func_type(ty_idx).clone()
    }

    /// Invokes the function with the given arguments (spec.md §4.6
    /// call convention): validates arity/types, dispatches to the guest
    /// interpreter or the host closure, and returns the results.
    pub fn call<T>(self, store: &mut Store<T>, args: &[Value], results: &mut [Value]) -> Result<(), Error> {
        let ty = self.ty(store);
        if args.len() != ty.params().len() || results.len() != ty.results().len() {
            return Err(Error::Trap(Trap::message("argument or result arity mismatch")));
        }
        for (arg, expected) in args.iter().zip(ty.params()) {
            if arg.ty() != *expected {
                return Err(Error::Trap(Trap::message("argument type mismatch")));
            }
        }
        crate::engine::interpreter::invoke(store, self.0, args, results)
    }
}

pub(crate) fn ty_of<T>(store: &Store<T>, idx: FuncIdx) -> FuncType {
    let ty_idx = match store.func(idx) {
        FuncEntity::Wasm(f) => f.ty,
        FuncEntity::Host(f) => f.ty,
    };
    store.func_type(ty_idx).clone()
}

pub(crate) fn call_any<T>(
    store: &mut Store<T>,
    idx: FuncIdx,
    caller_instance: Option<crate::store::InstanceIdx>,
    args: &[Value],
    results: &mut [Value],
) -> Result<(), Trap> {
    match store.func(idx) {
        FuncEntity::Host(host) => {
            let host = Arc::clone(&host.func);
            let caller = Caller::new(store, caller_instance);
            host.call(caller, args, results)
        }
        FuncEntity::Wasm(_) => crate::engine::interpreter::invoke(store, idx, args, results)
            .map_err(|e| match e {
                Error::Trap(t) => t,
                other => Trap::message(alloc::format!("{other}")),
            }),
    }
}
