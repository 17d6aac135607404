//! Engine configuration: feature bitset, stack limits and cache-key salt
//! (SPEC_FULL.md §2, §4.3, ground: `crates/wasmi/src/engine/config.rs`).

use alloc::string::String;
use wrt_core::DEFAULT_MAX_FRAMES;

/// Which post-MVP proposals are accepted by the decoder/validator.
///
/// Mirrors the teacher's `WasmFeatures` bitset field-for-field; translated to
/// `wasmparser::WasmFeatures` at decode time via `From<Features>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub mutable_global: bool,
    pub sign_extension: bool,
    pub saturating_float_to_int: bool,
    pub multi_value: bool,
    pub bulk_memory: bool,
    pub reference_types: bool,
    pub tail_call: bool,
    pub simd: bool,
}

impl Default for Features {
    /// The MVP plus the proposals that had shipped and stabilized by the
    /// time Wasm 1.0 embedders typically turn them on by default (matching
    /// the teacher's own `Features::default()`).
    fn default() -> Self {
        Self {
            mutable_global: true,
            sign_extension: true,
            saturating_float_to_int: true,
            multi_value: true,
            bulk_memory: true,
            reference_types: true,
            tail_call: false,
            simd: false,
        }
    }
}

impl From<Features> for wasmparser::WasmFeatures {
    fn from(f: Features) -> Self {
        let mut out = wasmparser::WasmFeatures::empty();
        out.set(wasmparser::WasmFeatures::MUTABLE_GLOBAL, f.mutable_global);
        out.set(wasmparser::WasmFeatures::SIGN_EXTENSION, f.sign_extension);
        out.set(
            wasmparser::WasmFeatures::SATURATING_FLOAT_TO_INT,
            f.saturating_float_to_int,
        );
        out.set(wasmparser::WasmFeatures::MULTI_VALUE, f.multi_value);
        out.set(wasmparser::WasmFeatures::BULK_MEMORY, f.bulk_memory);
        out.set(wasmparser::WasmFeatures::REFERENCE_TYPES, f.reference_types);
        out.set(wasmparser::WasmFeatures::TAIL_CALL, f.tail_call);
        out.set(wasmparser::WasmFeatures::SIMD, f.simd);
        out.set(wasmparser::WasmFeatures::FLOATS, true);
        out
    }
}

/// Value-stack and call-stack sizing (spec.md §5 "a bounded ≈2000-frame call
/// stack").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLimits {
    pub initial_value_stack_height: usize,
    pub maximum_value_stack_height: usize,
    pub maximum_recursion_depth: usize,
}

impl Default for StackLimits {
    fn default() -> Self {
        Self {
            initial_value_stack_height: 1024,
            maximum_value_stack_height: 1024 * 1024,
            maximum_recursion_depth: DEFAULT_MAX_FRAMES,
        }
    }
}

/// Top-level engine configuration (ground: `engine/config.rs`'s `Config`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub features: Features,
    pub stack_limits: StackLimits,
    /// Salted into `cache_key` so a compiled-module cache is invalidated
    /// across incompatible engine versions (SPEC_FULL.md §6).
    pub engine_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            features: Features::default(),
            stack_limits: StackLimits::default(),
            engine_version: String::from(env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Module-instantiation options (spec.md §6). `name` is acted on here (the
/// store's module registry); `args`/`env` are validated here but otherwise
/// inert configuration for the out-of-scope system-interface collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Registers the instance under this name in the store (spec.md §4.4
    /// `register_module_instance`); empty means anonymous and unregistered.
    pub name: String,
    pub args: alloc::vec::Vec<String>,
    pub env: alloc::vec::Vec<(String, String)>,
}

impl ModuleConfig {
    /// Validates the shape spec.md's Testable Property (6) requires: no `=`
    /// or NUL byte in an environment key, and no empty argument strings.
    pub fn validate(&self) -> Result<(), crate::error::LinkError> {
        for (key, _) in &self.env {
            if key.contains('=') || key.contains('\0') {
                return Err(crate::error::LinkError::InvalidModuleConfig(alloc::format!(
                    "invalid environment variable name: {key:?}"
                )));
            }
        }
        for arg in &self.args {
            if arg.is_empty() {
                return Err(crate::error::LinkError::InvalidModuleConfig(
                    "arguments must not be empty strings".into(),
                ));
            }
        }
        Ok(())
    }
}
