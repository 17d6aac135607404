//! The host-context handle passed to every host function call (spec.md §4.6;
//! ground: `crates/wasmi/src/func/caller.rs`).

use crate::store::{ExternVal, InstanceIdx, Store};
use wrt_core::Trap;

/// Gives a host function access to the store's generic data `T` and, when
/// the call originated from a specific instance, that instance's exports —
/// the mechanism by which a host function can call back into the guest
/// (e.g. to read an exported memory) without the embedder threading it
/// through manually.
pub struct Caller<'a, T> {
    pub(crate) store: &'a mut Store<T>,
    pub(crate) instance: Option<InstanceIdx>,
}

impl<'a, T> Caller<'a, T> {
    pub(crate) fn new(store: &'a mut Store<T>, instance: Option<InstanceIdx>) -> Self {
        Self { store, instance }
    }

    pub fn data(&self) -> &T {
        &self.store.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.store.data
    }

    pub fn store(&mut self) -> &mut Store<T> {
        self.store
    }

    /// Looks up an export of the instance that is making this call, or
    /// `None` for a call with no originating instance (e.g. a direct
    /// `Func::call` from the embedder).
    pub fn get_export(&self, name: &str) -> Option<ExternVal> {
        let instance = self.instance?;
        self.store.instance(instance).export(name)
    }

    /// Requests termination of the calling instance with the given exit
    /// code (spec.md §4.6 step 4, §8 scenario 5): marks it closed (first
    /// close wins) and returns the exit trap the host function should
    /// return from its own `call` to unwind the rest of the call stack.
    pub fn close_with_exit_code(&mut self, code: i32) -> Trap {
        if let Some(instance) = self.instance {
            self.store.instance(instance).close_with_exit_code(code);
        }
        Trap::exit(code)
    }
}
