//! Type-erased sparse set: entity membership with no component storage attached.
//!
//! A [`SparseSet`] answers exactly one question — "is this entity a member,
//! and if so at what position in a contiguous packed array?" — in O(1), and
//! supports O(1) insertion and removal under all three [`DeletionPolicy`]
//! variants. [`crate::Storage<T>`] is built on top of one of these by holding
//! a parallel paged array of `T` addressed by packed position.
//!
//! # Layout
//!
//! ```text
//! packed: [ E(3) , E(42) , E(9)  , ... ]   ← contiguous, walked in reverse
//!            ▲       ▲       ▲
//!            │       │       │
//! sparse:  page-addressed by entity index, each live cell holds
//!          (position-in-packed, version), lazily materialized
//! ```
//!
//! # Deletion policies
//!
//! | Policy | `packed` after erase | Indices of survivors | Free list |
//! |---|---|---|---|
//! | `swap_and_pop` (default) | last element moved into the hole, then popped | may change | none (`free_list() == entity_mask`) |
//! | `in_place` | hole left behind as a tombstone | unchanged | intrusive, threaded through tombstones, rooted at `head` |
//! | `swap_only` | element moved to a "reserved" tail region, version bumped, **not dropped** | unchanged among still-live elements | `head` is the live/reserved boundary |
//!
//! `swap_and_pop` is the right default for most component types: iteration
//! stays contiguous and cache-friendly, at the cost of reordering on erase.
//! `in_place` trades that reordering away for index stability, at the cost of
//! iterating over (and periodically [`SparseSet::compact`]ing away) tombstones.
//! `swap_only` additionally defers destruction of the erased element itself —
//! see [`crate::Storage`] for why that matters once a payload is attached.
//!
//! # Iteration
//!
//! [`SparseSet::iter`] walks `packed` from the last element to the first.
//! This is deliberate, not incidental: `swap_and_pop` erase moves the *last*
//! element into the erased slot, so iterating high-to-low means an in-progress
//! iteration that erases its current element never skips the element that got
//! moved into that slot. [`SparseSet::iter_rev`] walks the other direction.

mod page;

use std::cmp::Ordering;

use crate::entity::{ENTITY_MASK, Entity, VERSION_MASK};
use crate::policy::DeletionPolicy;
use page::PagedSparse;

/// Type-erased map from [`Entity`] to a position in a contiguous packed array.
///
/// See the module documentation for the layout and the three deletion
/// policies this type supports.
#[derive(Debug)]
pub struct SparseSet {
    packed: Vec<Entity>,
    sparse: PagedSparse,
    policy: DeletionPolicy,
    /// Free-list head (`in_place`) or live/reserved boundary (`swap_only`).
    /// Unused under `swap_and_pop`, where it stays pinned at `ENTITY_MASK`.
    head: u32,
}

impl SparseSet {
    /// Default sparse-page granularity, matching the width used throughout
    /// the scenarios this crate's tests are built from.
    pub const DEFAULT_PAGE_SIZE: usize = 4096;

    /// A new, empty set using [`DeletionPolicy::SwapAndPop`] and the default page size.
    pub fn new() -> Self {
        Self::with_policy(DeletionPolicy::default())
    }

    /// A new, empty set using the given policy and the default page size.
    pub fn with_policy(policy: DeletionPolicy) -> Self {
        Self::with_policy_and_page_size(policy, Self::DEFAULT_PAGE_SIZE)
    }

    /// A new, empty set using the given policy and sparse page size.
    pub fn with_policy_and_page_size(policy: DeletionPolicy, page_size: usize) -> Self {
        let head = match policy {
            DeletionPolicy::SwapAndPop | DeletionPolicy::InPlace => ENTITY_MASK,
            DeletionPolicy::SwapOnly => 0,
        };
        Self {
            packed: Vec::new(),
            sparse: PagedSparse::new(page_size),
            policy,
            head,
        }
    }

    /// The deletion policy this set was constructed with.
    #[inline]
    pub fn policy(&self) -> DeletionPolicy {
        self.policy
    }

    /// Free-list head (`in_place`) or live/reserved boundary (`swap_only`);
    /// `ENTITY_MASK` as the "no list" sentinel for `swap_and_pop` and for an
    /// empty `in_place` free list.
    #[inline]
    pub fn free_list(&self) -> u32 {
        self.head
    }

    /// Length of `packed`, including tombstones under `in_place` and the
    /// reserved-but-erased tail under `swap_only`.
    #[inline]
    pub fn size(&self) -> usize {
        self.packed.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }

    /// Length of the *live* prefix/region of `packed` that iteration walks.
    fn live_len(&self) -> usize {
        match self.policy {
            DeletionPolicy::SwapOnly => self.head as usize,
            DeletionPolicy::SwapAndPop | DeletionPolicy::InPlace => self.packed.len(),
        }
    }

    /// `true` iff `packed` holds no tombstones (`swap_and_pop` is always
    /// contiguous; `in_place` only once its free list is empty; `swap_only`
    /// only once nothing remains in the reserved region).
    pub fn contiguous(&self) -> bool {
        match self.policy {
            DeletionPolicy::SwapAndPop => true,
            DeletionPolicy::InPlace => self.head == ENTITY_MASK,
            DeletionPolicy::SwapOnly => self.head as usize == self.packed.len(),
        }
    }

    /// Version currently associated with `to_entity(e)`, or the tombstone
    /// version (`VERSION_MASK`) if that index was never pushed or has since
    /// been erased under a policy that invalidates it outright.
    #[inline]
    pub fn current(&self, e: Entity) -> u32 {
        self.sparse.get(e.to_entity()).to_version()
    }

    /// `true` iff `e` occupies `packed` under its current version.
    ///
    /// A saturated version field (shared by `Entity::NULL` and
    /// `Entity::TOMBSTONE`) can never match a legitimately pushed entity's
    /// version, since [`Entity::next`] never produces it — so this check
    /// alone is sufficient to exclude both sentinels without special-casing
    /// either.
    #[inline]
    pub fn contains(&self, e: Entity) -> bool {
        e.to_version() != VERSION_MASK && self.current(e) == e.to_version()
    }

    /// Position of `e` in `packed`.
    ///
    /// # Panics (debug only)
    /// If `!contains(e)`.
    #[inline]
    pub fn index(&self, e: Entity) -> usize {
        debug_assert!(self.contains(e), "index: entity not contained");
        self.sparse.get(e.to_entity()).to_entity() as usize
    }

    /// `packed[pos]` if `pos` is in range and not a tombstone, else `Entity::NULL`.
    pub fn at(&self, pos: usize) -> Entity {
        match self.packed.get(pos) {
            Some(&e) if !e.is_tombstone() => e,
            _ => Entity::NULL,
        }
    }

    /// Unchecked `packed[pos]`. Rust rendering of the original `operator[]`.
    ///
    /// # Panics
    /// If `pos >= self.size()`.
    #[inline]
    pub fn get_unchecked(&self, pos: usize) -> Entity {
        self.packed[pos]
    }

    /// Position of `e`, or `None` if not contained.
    pub fn find(&self, e: Entity) -> Option<usize> {
        self.contains(e).then(|| self.index(e))
    }

    /// The packed position a call to `push` would land `e` at right now,
    /// without mutating anything. Lets a caller (e.g. [`crate::Storage::emplace`])
    /// prepare a parallel structure addressed by that position *before*
    /// actually recording membership.
    pub(crate) fn next_push_position(&self) -> usize {
        match self.policy {
            DeletionPolicy::InPlace if self.head != ENTITY_MASK => self.head as usize,
            DeletionPolicy::SwapOnly if (self.head as usize) < self.packed.len() => self.head as usize,
            _ => self.packed.len(),
        }
    }

    /// Insert `e`. Returns its position in `packed`.
    ///
    /// # Panics (debug only)
    /// If `e` is null/tombstone, or already contained.
    pub fn push(&mut self, e: Entity) -> usize {
        debug_assert!(
            e.to_version() != VERSION_MASK,
            "push: cannot push a null or tombstone entity"
        );
        debug_assert!(!self.contains(e), "push: entity already contained");

        match self.policy {
            DeletionPolicy::InPlace if self.head != ENTITY_MASK => {
                let pos = self.head as usize;
                let next_head = self.packed[pos].to_entity();
                self.head = next_head;
                self.packed[pos] = e;
                self.sparse.set(e.to_entity(), Entity::construct(pos as u32, e.to_version()));
                pos
            }
            DeletionPolicy::SwapOnly if (self.head as usize) < self.packed.len() => {
                let pos = self.head as usize;
                let stale = self.packed[pos];
                if stale.to_entity() != e.to_entity() {
                    self.sparse.set(stale.to_entity(), Entity::TOMBSTONE);
                }
                self.packed[pos] = e;
                self.sparse.set(e.to_entity(), Entity::construct(pos as u32, e.to_version()));
                self.head += 1;
                pos
            }
            _ => {
                let pos = self.packed.len();
                self.packed.push(e);
                self.sparse.set(e.to_entity(), Entity::construct(pos as u32, e.to_version()));
                if self.policy == DeletionPolicy::SwapOnly {
                    self.head += 1;
                }
                pos
            }
        }
    }

    /// Insert each entity in turn. Returns the position of the first
    /// inserted element, or `None` if `entities` was empty.
    pub fn push_range(&mut self, entities: impl IntoIterator<Item = Entity>) -> Option<usize> {
        let mut first = None;
        for e in entities {
            let pos = self.push(e);
            first.get_or_insert(pos);
        }
        first
    }

    /// Overwrite the stored version for `to_entity(e)` with `to_version(e)`.
    /// Returns the previous version.
    ///
    /// # Panics (debug only)
    /// If `to_version(e) == VERSION_MASK`.
    pub fn bump(&mut self, e: Entity) -> u32 {
        debug_assert!(
            e.to_version() != VERSION_MASK,
            "bump: new version must not be the tombstone version"
        );
        let stored = self.sparse.get(e.to_entity());
        self.sparse.set(e.to_entity(), Entity::construct(stored.to_entity(), e.to_version()));
        stored.to_version()
    }

    /// Erase `e`, applying this set's deletion policy.
    ///
    /// # Panics (debug only)
    /// If `!contains(e)`.
    pub fn erase(&mut self, e: Entity) {
        debug_assert!(self.contains(e), "erase: entity not contained");
        match self.policy {
            DeletionPolicy::SwapAndPop => self.erase_swap_and_pop(e),
            DeletionPolicy::InPlace => self.erase_in_place(e),
            DeletionPolicy::SwapOnly => self.erase_swap_only(e),
        }
    }

    /// Erase every entity yielded by `entities`, in order, against `self`'s
    /// own policy — independent of whatever set (if any) `entities` came from.
    pub fn erase_range(&mut self, entities: impl IntoIterator<Item = Entity>) {
        for e in entities {
            self.erase(e);
        }
    }

    /// As [`SparseSet::erase`] but tolerant of absence. Returns whether `e` was removed.
    pub fn remove(&mut self, e: Entity) -> bool {
        if self.contains(e) {
            self.erase(e);
            true
        } else {
            false
        }
    }

    /// As [`SparseSet::erase_range`] but tolerant of absence. Returns the count removed.
    pub fn remove_range(&mut self, entities: impl IntoIterator<Item = Entity>) -> usize {
        entities.into_iter().filter(|&e| self.remove(e)).count()
    }

    fn erase_swap_and_pop(&mut self, e: Entity) {
        let i = self.index(e);
        let last = self.packed.len() - 1;
        if i != last {
            let moved = self.packed[last];
            self.packed[i] = moved;
            let version = self.sparse.get(moved.to_entity()).to_version();
            self.sparse.set(moved.to_entity(), Entity::construct(i as u32, version));
        }
        self.packed.pop();
        self.sparse.set(e.to_entity(), Entity::TOMBSTONE);
    }

    fn erase_in_place(&mut self, e: Entity) {
        let i = self.index(e);
        // The tombstone's entity field threads the previous free-list head.
        self.packed[i] = Entity::construct(self.head, VERSION_MASK);
        self.head = i as u32;
        self.sparse.set(e.to_entity(), Entity::TOMBSTONE);
    }

    fn erase_swap_only(&mut self, e: Entity) {
        let i = self.index(e);
        self.head -= 1;
        let boundary = self.head as usize;
        let other = self.packed[boundary];
        let bumped = e.next();
        self.packed[i] = other;
        self.packed[boundary] = bumped;
        if i != boundary {
            let other_version = self.sparse.get(other.to_entity()).to_version();
            self.sparse.set(other.to_entity(), Entity::construct(i as u32, other_version));
        }
        self.sparse.set(e.to_entity(), Entity::construct(boundary as u32, bumped.to_version()));
    }

    /// Exchange the packed positions of `a` and `b`. Both must be contained.
    ///
    /// # Panics (debug only)
    /// If either is not contained.
    pub fn swap_elements(&mut self, a: Entity, b: Entity) {
        let ia = self.index(a);
        let ib = self.index(b);
        self.swap_positions(ia, ib);
    }

    /// Raw position swap, updating both entities' sparse mappings. Only safe
    /// to call with positions that hold live (non-tombstone) entities.
    fn swap_positions(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        self.packed.swap(i, j);
        let ei = self.packed[i];
        let ej = self.packed[j];
        let vi = self.sparse.get(ei.to_entity()).to_version();
        let vj = self.sparse.get(ej.to_entity()).to_version();
        self.sparse.set(ei.to_entity(), Entity::construct(i as u32, vi));
        self.sparse.set(ej.to_entity(), Entity::construct(j as u32, vj));
    }

    /// Empty the set. Under `in_place`, resets the free list; under
    /// `swap_only`, resets the live/reserved boundary to zero.
    pub fn clear(&mut self) {
        for &e in self.packed.iter() {
            if !e.is_tombstone() {
                self.sparse.set(e.to_entity(), Entity::TOMBSTONE);
            }
        }
        self.packed.clear();
        self.head = match self.policy {
            DeletionPolicy::SwapOnly => 0,
            DeletionPolicy::SwapAndPop | DeletionPolicy::InPlace => ENTITY_MASK,
        };
    }

    /// Remove all tombstones from `packed`, preserving the relative order of
    /// live elements. A no-op for policies other than `in_place`, since only
    /// `in_place` ever leaves tombstones behind.
    pub fn compact(&mut self) {
        if self.policy != DeletionPolicy::InPlace {
            return;
        }
        let mut write = 0;
        for read in 0..self.packed.len() {
            let e = self.packed[read];
            if !e.is_tombstone() {
                if write != read {
                    self.packed[write] = e;
                    let version = self.sparse.get(e.to_entity()).to_version();
                    self.sparse.set(e.to_entity(), Entity::construct(write as u32, version));
                }
                write += 1;
            }
        }
        self.packed.truncate(write);
        self.head = ENTITY_MASK;
    }

    /// Sort `packed[0..n)` by `cmp`, leaving `packed[n..]` untouched.
    ///
    /// # Panics (debug only)
    /// If `n > self.size()`, or the prefix contains a tombstone.
    pub fn sort_n(&mut self, n: usize, mut cmp: impl FnMut(Entity, Entity) -> Ordering) {
        debug_assert!(n <= self.size(), "sort_n: n exceeds size()");
        debug_assert!(
            self.packed[..n].iter().all(|e| !e.is_tombstone()),
            "sort_n: prefix must be tombstone-free"
        );
        // Selection sort: simplest algorithm compatible with updating the
        // sparse table through `swap_positions` on every move. Not tuned for
        // large n.
        for i in 0..n {
            let mut best = i;
            for j in (i + 1)..n {
                if cmp(self.packed[j], self.packed[best]) == Ordering::Less {
                    best = j;
                }
            }
            if best != i {
                self.swap_positions(i, best);
            }
        }
    }

    /// Sort the whole set by `cmp`.
    ///
    /// # Panics (debug only)
    /// If the set is not [`SparseSet::contiguous`].
    pub fn sort(&mut self, cmp: impl FnMut(Entity, Entity) -> Ordering) {
        debug_assert!(self.contiguous(), "sort: set must be contiguous");
        let n = self.size();
        self.sort_n(n, cmp);
    }

    /// Reorder so that elements shared with `other` appear in the same
    /// relative order as they do in `other`'s own iteration order, with
    /// elements unique to `self` left ahead of them.
    ///
    /// Algorithm: walk `other` from its highest packed position to its
    /// lowest. For each entity also contained in `self`, swap it into
    /// position `pos` (starting at `self.size() - 1` and
    /// decreasing by one per match) if it isn't already there.
    pub fn sort_as(&mut self, other: &SparseSet) {
        if self.packed.is_empty() {
            return;
        }
        let mut pos = self.packed.len() - 1;
        for e in other.iter() {
            if self.contains(e) {
                let i = self.index(e);
                if i != pos {
                    self.swap_positions(i, pos);
                }
                match pos.checked_sub(1) {
                    Some(p) => pos = p,
                    None => break,
                }
            }
        }
    }

    /// Total addressable entity-index range across all materialized sparse pages.
    pub fn extent(&self) -> usize {
        self.sparse.extent()
    }

    /// Sparse page size this set was constructed with.
    pub fn page_size(&self) -> usize {
        self.sparse.page_size()
    }

    /// Grow `packed`'s capacity to at least `n`. Never invalidates existing
    /// positions: `packed` holds `Entity` by value, not references into it, so
    /// growth here has no address-stability implications of its own (those
    /// live one layer up, in `Storage<T>`'s paged payload).
    pub fn reserve(&mut self, n: usize) {
        if n > self.packed.len() {
            self.packed.reserve(n - self.packed.len());
        }
    }

    /// Fallible counterpart to [`SparseSet::reserve`].
    pub fn try_reserve(&mut self, n: usize) -> Result<(), std::collections::TryReserveError> {
        if n > self.packed.len() {
            self.packed.try_reserve(n - self.packed.len())?;
        }
        Ok(())
    }

    /// Release unused `packed` capacity and trailing all-null sparse pages.
    pub fn shrink_to_fit(&mut self) {
        self.packed.shrink_to_fit();
        self.sparse.shrink_to_fit();
    }

    /// Iterate live entities from the last packed position to the first —
    /// the primary iteration order (see the module docs for why).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Entity> + '_ {
        self.packed[..self.live_len()]
            .iter()
            .rev()
            .copied()
            .filter(|e| !e.is_tombstone())
    }

    /// Iterate live entities from the first packed position to the last.
    pub fn iter_rev(&self) -> impl DoubleEndedIterator<Item = Entity> + '_ {
        self.packed[..self.live_len()]
            .iter()
            .copied()
            .filter(|e| !e.is_tombstone())
    }
}

impl Default for SparseSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Unchecked `packed[pos]`, the Rust rendering of the original `operator[]`.
/// Prefer [`SparseSet::at`] at a boundary where `pos` might be out of range.
impl std::ops::Index<usize> for SparseSet {
    type Output = Entity;

    #[inline]
    fn index(&self, pos: usize) -> &Entity {
        &self.packed[pos]
    }
}
