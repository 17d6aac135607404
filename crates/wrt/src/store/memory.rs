//! Linear memory (spec.md §3, §4.3 memory instructions).

use crate::error::LinkError;
use crate::module::MemoryType;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use wrt_core::{Limits, Pages, TrapCode, MAX_PAGES, PAGE_SIZE};

use crate::limiter::ResourceLimiter;

pub struct MemoryEntity {
    ty: MemoryType,
    data: Vec<u8>,
}

impl MemoryEntity {
    pub fn new(ty: MemoryType) -> Result<Self, LinkError> {
        if ty.limits.min > MAX_PAGES || ty.limits.max.is_some_and(|m| m > MAX_PAGES) {
            return Err(LinkError::InvalidModuleConfig("memory limits exceed the 4 GiB maximum".into()));
        }
        let bytes = Pages(ty.limits.min).to_bytes().unwrap_or(0) as usize;
        Ok(Self {
            ty,
            data: vec![0u8; bytes],
        })
    }

    pub fn ty(&self) -> MemoryType {
        self.ty
    }

    pub fn size_pages(&self) -> u32 {
        (self.data.len() / PAGE_SIZE as usize) as u32
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Grows the memory by `delta` pages, returning the previous size on
    /// success or `u32::MAX` on failure (spec.md §4.3 `memory.grow`:
    /// "failure is observable, never a trap").
    pub fn grow(&mut self, delta: u32, limiter: Option<&Arc<dyn ResourceLimiter>>) -> u32 {
        let current = self.size_pages();
        let Some(new_size) = current.checked_add(delta) else {
            return u32::MAX;
        };
        if new_size > self.ty.limits.max.unwrap_or(MAX_PAGES) || new_size > MAX_PAGES {
            return u32::MAX;
        }
        if let Some(limiter) = limiter {
            if !limiter.memory_growing(current, new_size, self.ty.limits.max) {
                return u32::MAX;
            }
        }
        let Some(new_bytes) = Pages(new_size).to_bytes() else {
            return u32::MAX;
        };
        self.data.resize(new_bytes as usize, 0);
        current
    }

    fn check_bounds(&self, offset: u64, len: usize) -> Result<usize, TrapCode> {
        let end = offset.checked_add(len as u64).ok_or(TrapCode::MemoryOutOfBounds)?;
        if end > self.data.len() as u64 {
            return Err(TrapCode::MemoryOutOfBounds);
        }
        Ok(offset as usize)
    }

    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), TrapCode> {
        let start = self.check_bounds(offset, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), TrapCode> {
        let start = self.check_bounds(offset, bytes.len())?;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill(&mut self, offset: u64, len: u64, value: u8) -> Result<(), TrapCode> {
        let start = self.check_bounds(offset, len as usize)?;
        self.data[start..start + len as usize].fill(value);
        Ok(())
    }

    pub fn copy_within(&mut self, dst: u64, src: u64, len: u64) -> Result<(), TrapCode> {
        let dst_start = self.check_bounds(dst, len as usize)?;
        let src_start = self.check_bounds(src, len as usize)?;
        self.data.copy_within(src_start..src_start + len as usize, dst_start);
        Ok(())
    }

    pub fn copy_from(&mut self, dst: u64, src: &[u8], src_offset: u64, len: u64) -> Result<(), TrapCode> {
        let dst_start = self.check_bounds(dst, len as usize)?;
        let src_end = src_offset.checked_add(len).ok_or(TrapCode::MemoryOutOfBounds)?;
        if src_end > src.len() as u64 {
            return Err(TrapCode::MemoryOutOfBounds);
        }
        self.data[dst_start..dst_start + len as usize]
            .copy_from_slice(&src[src_offset as usize..src_end as usize]);
        Ok(())
    }
}

pub fn checked_limits(limits: Limits) -> Result<Limits, LinkError> {
    if let Some(max) = limits.max {
        if max < limits.min {
            return Err(LinkError::InvalidModuleConfig("limits maximum is below minimum".into()));
        }
    }
    Ok(limits)
}
