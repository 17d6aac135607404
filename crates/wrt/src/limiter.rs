//! The embedder hook that caps memory/table growth beyond what the module
//! itself declares (SPEC_FULL.md §5; ground: teacher's `ResourceLimiter`
//! trait, corroborated by wazero's `RuntimeConfig` memory-limit knob in
//! `original_source`).

/// Consulted on every `memory.grow`/`table.grow` and at instantiation time,
/// in addition to — never instead of — the module's own declared maximum.
pub trait ResourceLimiter: Send + Sync {
    /// Called before a memory grows from `current` to `desired` pages.
    /// Returning `false` makes the grow fail exactly as if the module's own
    /// maximum had been exceeded (spec.md §4.3: observable failure, not a trap).
    fn memory_growing(&self, current_pages: u32, desired_pages: u32, declared_max: Option<u32>) -> bool {
        let _ = (current_pages, declared_max);
        desired_pages <= declared_max.unwrap_or(u32::MAX)
    }

    /// Called before a table grows from `current` to `desired` elements.
    fn table_growing(&self, current_elements: u32, desired_elements: u32, declared_max: Option<u32>) -> bool {
        let _ = (current_elements, declared_max);
        desired_elements <= declared_max.unwrap_or(u32::MAX)
    }
}

/// A limiter that only ever enforces the module's own declared maximum
/// (the default when no embedder limiter is installed).
pub struct NoLimiter;

impl ResourceLimiter for NoLimiter {}
