//! Tables of opaque references (spec.md §3, §4.3 table instructions).

use super::FuncIdx;
use crate::module::TableType;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use wrt_core::{RefType, TrapCode};

use crate::limiter::ResourceLimiter;

/// A table element. `externref`s are opaque 64-bit host handles (spec.md §3);
/// the store never dereferences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableElement {
    Func(Option<FuncIdx>),
    Extern(Option<u64>),
}

impl TableElement {
    fn null_for(ty: RefType) -> Self {
        match ty {
            RefType::Func => Self::Func(None),
            RefType::Extern => Self::Extern(None),
        }
    }
}

pub struct TableEntity {
    ty: TableType,
    elements: Vec<TableElement>,
}

impl TableEntity {
    pub fn new(ty: TableType) -> Self {
        Self {
            ty,
            elements: vec![TableElement::null_for(ty.element); ty.limits.min as usize],
        }
    }

    pub fn ty(&self) -> TableType {
        self.ty
    }

    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn get(&self, index: u32) -> Result<TableElement, TrapCode> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or(TrapCode::TableOutOfBounds)
    }

    pub fn set(&mut self, index: u32, value: TableElement) -> Result<(), TrapCode> {
        *self
            .elements
            .get_mut(index as usize)
            .ok_or(TrapCode::TableOutOfBounds)? = value;
        Ok(())
    }

    pub fn grow(&mut self, delta: u32, init: TableElement, limiter: Option<&Arc<dyn ResourceLimiter>>) -> u32 {
        let current = self.size();
        let Some(new_size) = current.checked_add(delta) else {
            return u32::MAX;
        };
        if new_size > self.ty.limits.max.unwrap_or(u32::MAX) {
            return u32::MAX;
        }
        if let Some(limiter) = limiter {
            if !limiter.table_growing(current, new_size, self.ty.limits.max) {
                return u32::MAX;
            }
        }
        self.elements.resize(new_size as usize, init);
        current
    }

    pub fn fill(&mut self, offset: u32, len: u32, value: TableElement) -> Result<(), TrapCode> {
        let end = offset.checked_add(len).ok_or(TrapCode::TableOutOfBounds)?;
        if end as usize > self.elements.len() {
            return Err(TrapCode::TableOutOfBounds);
        }
        self.elements[offset as usize..end as usize].fill(value);
        Ok(())
    }

    pub fn copy_within(&mut self, dst: u32, src: u32, len: u32) -> Result<(), TrapCode> {
        let dst_end = dst.checked_add(len).ok_or(TrapCode::TableOutOfBounds)?;
        let src_end = src.checked_add(len).ok_or(TrapCode::TableOutOfBounds)?;
        if dst_end as usize > self.elements.len() || src_end as usize > self.elements.len() {
            return Err(TrapCode::TableOutOfBounds);
        }
        self.elements.copy_within(src as usize..src_end as usize, dst as usize);
        Ok(())
    }

    pub fn init_from(&mut self, dst: u32, items: &[TableElement], src: u32, len: u32) -> Result<(), TrapCode> {
        let dst_end = dst.checked_add(len).ok_or(TrapCode::TableOutOfBounds)?;
        let src_end = src.checked_add(len).ok_or(TrapCode::TableOutOfBounds)?;
        if dst_end as usize > self.elements.len() || src_end as usize > items.len() {
            return Err(TrapCode::TableOutOfBounds);
        }
        self.elements[dst as usize..dst_end as usize]
            .copy_from_slice(&items[src as usize..src_end as usize]);
        Ok(())
    }
}
