//! Global variables (spec.md §3, §4.3 `global.get`/`global.set`).

use crate::module::GlobalType;
use wrt_core::UntypedVal;

pub struct GlobalEntity {
    ty: GlobalType,
    value: UntypedVal,
}

impl GlobalEntity {
    pub fn new(ty: GlobalType, value: UntypedVal) -> Self {
        Self { ty, value }
    }

    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    pub fn get(&self) -> UntypedVal {
        self.value
    }

    /// Sets the global's value. Callers must have already checked
    /// `ty().mutable` — spec.md §4.2 rejects `global.set` to an immutable
    /// global at validation time, so this never needs to trap.
    pub fn set(&mut self, value: UntypedVal) {
        self.value = value;
    }
}
