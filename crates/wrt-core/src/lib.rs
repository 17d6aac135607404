//! Core value, trap and numeric primitives shared across the `wrt` WebAssembly
//! runtime crates.
//!
//! This crate has no knowledge of modules, stores or instances: it only
//! defines the engine-agnostic vocabulary (value types, the untyped 64-bit
//! stack slot, traps, function types and resource limits) that both the
//! decoder/validator and the interpreter build on.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod float;
mod func_type;
mod host_error;
mod limits;
mod trap;
mod untyped;
mod value;

pub use self::{
    float::{F32, F64},
    func_type::FuncType,
    host_error::HostError,
    limits::{Limits, Pages, DEFAULT_MAX_FRAMES, MAX_PAGES, PAGE_SIZE},
    trap::{TraceFrame, Trap, TrapCode},
    untyped::UntypedVal,
    value::{RefType, Value, ValueType, V128},
};
