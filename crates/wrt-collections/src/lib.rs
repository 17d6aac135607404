//! Fast arena data structures specialized for the `wrt` store.
//!
//! They cannot deallocate single entities — this is the backbone spec.md §9
//! asks for: "instances and function addresses hold stable integer indices
//! into the store's vectors, never direct ownership." Grounded on the
//! teacher's `wasmi_collections::arena` module.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod arena;
mod dedup;

pub use self::{
    arena::{Arena, ArenaIndex, Iter, IterMut},
    dedup::DedupArena,
};
