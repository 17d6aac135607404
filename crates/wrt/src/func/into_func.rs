//! Static-reflection host-function signatures (spec.md §4.6, §9's redesign
//! note; ground: `crates/wasmi/src/func/into_func.rs`'s `IntoFunc` over
//! tuples). No runtime type reflection is used: a host closure's Rust
//! signature is turned into a [`wrt_core::FuncType`] entirely at compile
//! time via trait dispatch over tuples of [`WasmTy`].

use super::caller::Caller;
use super::HostFunc;
use crate::error::Error;
use alloc::sync::Arc;
use alloc::vec::Vec;
use wrt_core::{FuncType, Trap, Value, ValueType};

/// A Rust type that can cross the host/guest boundary as a single Wasm value.
pub trait WasmTy: Sized + Send + 'static {
    const VALUE_TYPE: ValueType;
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Self;
}

macro_rules! impl_wasm_ty {
    ($ty:ty, $variant:ident, $vt:ident) => {
        impl WasmTy for $ty {
            const VALUE_TYPE: ValueType = ValueType::$vt;
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
            fn from_value(value: Value) -> Self {
                match value {
                    Value::$variant(v) => v,
                    _ => unreachable!("argument type checked against FuncType at call time"),
                }
            }
        }
    };
}

impl_wasm_ty!(i32, I32, I32);
impl_wasm_ty!(i64, I64, I64);

impl WasmTy for u32 {
    const VALUE_TYPE: ValueType = ValueType::I32;
    fn into_value(self) -> Value {
        Value::I32(self as i32)
    }
    fn from_value(value: Value) -> Self {
        match value {
            Value::I32(v) => v as u32,
            _ => unreachable!(),
        }
    }
}

impl WasmTy for u64 {
    const VALUE_TYPE: ValueType = ValueType::I64;
    fn into_value(self) -> Value {
        Value::I64(self as i64)
    }
    fn from_value(value: Value) -> Self {
        match value {
            Value::I64(v) => v as u64,
            _ => unreachable!(),
        }
    }
}

impl WasmTy for f32 {
    const VALUE_TYPE: ValueType = ValueType::F32;
    fn into_value(self) -> Value {
        Value::F32(wrt_core::F32::from_float(self))
    }
    fn from_value(value: Value) -> Self {
        match value {
            Value::F32(v) => v.to_float(),
            _ => unreachable!(),
        }
    }
}

impl WasmTy for f64 {
    const VALUE_TYPE: ValueType = ValueType::F64;
    fn into_value(self) -> Value {
        Value::F64(wrt_core::F64::from_float(self))
    }
    fn from_value(value: Value) -> Self {
        match value {
            Value::F64(v) => v.to_float(),
            _ => unreachable!(),
        }
    }
}

/// The result side of a host function signature: `()`, a single
/// [`WasmTy`], or a tuple of them (multi-value).
pub trait WasmResults: Send + 'static {
    fn types() -> Vec<ValueType>;
    fn into_values(self, out: &mut [Value]);
}

impl WasmResults for () {
    fn types() -> Vec<ValueType> {
        Vec::new()
    }
    fn into_values(self, _out: &mut [Value]) {}
}

impl<A: WasmTy> WasmResults for A {
    fn types() -> Vec<ValueType> {
        alloc::vec![A::VALUE_TYPE]
    }
    fn into_values(self, out: &mut [Value]) {
        out[0] = self.into_value();
    }
}

impl<A: WasmTy, B: WasmTy> WasmResults for (A, B) {
    fn types() -> Vec<ValueType> {
        alloc::vec![A::VALUE_TYPE, B::VALUE_TYPE]
    }
    fn into_values(self, out: &mut [Value]) {
        out[0] = self.0.into_value();
        out[1] = self.1.into_value();
    }
}

/// Turns a Rust closure `Fn(Caller<T>, Params...) -> Result<Results, Error>`
/// into a [`FuncType`] plus a type-erased [`HostFunc`] (spec.md §4.6).
pub trait IntoFunc<T, Params, Results> {
    fn into_func(self) -> (FuncType, Arc<dyn HostFunc<T>>);
}

struct HostClosure<F> {
    closure: F,
}

macro_rules! impl_into_func {
    ($( $param:ident ),*) => {
        impl<T, F, $($param),*, R> IntoFunc<T, ($($param,)*), R> for F
        where
            F: Fn(Caller<'_, T>, $($param),*) -> Result<R, Error> + Send + Sync + 'static,
            $($param: WasmTy,)*
            R: WasmResults,
            T: 'static,
        {
            #[allow(non_snake_case)]
            fn into_func(self) -> (FuncType, Arc<dyn HostFunc<T>>) {
                let ty = FuncType::new([$($param::VALUE_TYPE),*], R::types());
                let host = HostClosure { closure: self };
                (ty, Arc::new(host))
            }
        }

        impl<F, T, $($param),*, R> HostFunc<T> for HostClosure<F>
        where
            F: Fn(Caller<'_, T>, $($param),*) -> Result<R, Error> + Send + Sync + 'static,
            $($param: WasmTy,)*
            R: WasmResults,
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, caller: Caller<'_, T>, args: &[Value], results: &mut [Value]) -> Result<(), Trap> {
                let mut iter = args.iter().cloned();
                $(let $param = <$param as WasmTy>::from_value(iter.next().expect("argument count checked against FuncType"));)*
                match (self.closure)(caller, $($param),*) {
                    Ok(r) => {
                        r.into_values(results);
                        Ok(())
                    }
                    Err(Error::Trap(trap)) => Err(trap),
                    Err(other) => Err(Trap::message(alloc::format!("{other}"))),
                }
            }
        }
    };
}

impl_into_func!();
impl_into_func!(P0);
impl_into_func!(P0, P1);
impl_into_func!(P0, P1, P2);
impl_into_func!(P0, P1, P2, P3);
