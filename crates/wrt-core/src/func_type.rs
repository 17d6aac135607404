use crate::value::ValueType;
use alloc::{sync::Arc, vec::Vec};

/// An ordered parameter and result type sequence (spec.md §3 "Function type").
///
/// Structural equality is what matters for `call_indirect` type checks, not
/// identity — two `FuncType`s with the same params/results compare equal and
/// hash equal, which is what lets the store's type interner (spec.md §4.4)
/// assign the same id to structurally identical types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncTypeInner {
    params: Vec<ValueType>,
    results: Vec<ValueType>,
}

/// Cheaply-cloneable handle to a [`FuncTypeInner`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType(Arc<FuncTypeInner>);

impl FuncType {
    pub fn new(params: impl IntoIterator<Item = ValueType>, results: impl IntoIterator<Item = ValueType>) -> Self {
        FuncType(Arc::new(FuncTypeInner {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }))
    }

    pub fn params(&self) -> &[ValueType] {
        &self.0.params
    }

    pub fn results(&self) -> &[ValueType] {
        &self.0.results
    }
}
