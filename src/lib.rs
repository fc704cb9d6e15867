//! Entity-component storage engine.
//!
//! This crate provides the dense/sparse data structure, identifier scheme, and
//! element-lifecycle machinery that sit beneath an Entity-Component-System
//! (ECS) runtime. Given a generational entity identifier ([`Entity`]), it
//! maintains, per component type, a contiguous packed array of components
//! alongside a paged sparse index enabling O(1) membership, insertion,
//! removal, and iteration.
//!
//! # Layers
//!
//! - [`SparseSet`]: type-erased entity membership — the map from entity to
//!   dense packed position, with no component storage attached.
//! - [`Storage<T>`]: a [`SparseSet`] plus a parallel paged array of `T`,
//!   giving typed insertion, retrieval, and patching.
//!
//! Everything above these two (registries, views, groups, observers) is
//! deliberately out of scope: this crate fixes the memory model, iteration
//! contract, and identifier algebra that such a layer would be built on.
//!
//! # Deletion policies
//!
//! Both layers are parameterized by [`DeletionPolicy`]: `swap_and_pop` (the
//! default, keeps `packed` contiguous by moving the last element into any
//! erased slot), `in_place` (keeps indices stable, leaving a tombstone behind
//! threaded into an intrusive free list), and `swap_only` (defers destruction,
//! bumping the erased entity's version instead of dropping its component
//! immediately). See the `sparse_set` module for the exact contract of each.

extern crate self as rusty_storage;

pub mod component;
pub mod entity;
pub mod policy;
pub mod sparse_set;
pub mod storage;

pub use component::Component;
pub use entity::Entity;
pub use policy::DeletionPolicy;
pub use rusty_macros::Component;
pub use sparse_set::SparseSet;
pub use storage::{ReserveError, Storage};
