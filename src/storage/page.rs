//! Paged payload array: packed position → component value, materialized lazily.
//!
//! Mirrors `sparse_set::page::PagedSparse`'s layout exactly, but keyed by
//! packed *position* rather than entity *index*, and holding `Option<T>`
//! rather than `Entity`. See `crate::storage` for why `Option<T>` rather than
//! raw uninitialized storage.

use log::warn;

use crate::component::Component;

/// Mirrors `sparse_set::page::LARGE_PAGE_RUN` for the payload side of paging.
const LARGE_PAGE_RUN: usize = 64;

pub(crate) struct PagedPayload<T> {
    pages: Vec<Option<Box<[Option<T>]>>>,
    page_size: usize,
}

impl<T: Component> PagedPayload<T> {
    pub(crate) fn new(page_size: usize) -> Self {
        debug_assert!(page_size.is_power_of_two(), "page_size must be a power of two");
        Self {
            pages: Vec::new(),
            page_size,
        }
    }

    #[inline]
    fn page_of(&self, pos: usize) -> usize {
        pos / self.page_size
    }

    #[inline]
    fn offset_of(&self, pos: usize) -> usize {
        pos % self.page_size
    }

    fn materialize(&mut self, page: usize) {
        if page >= self.pages.len() {
            let added = page + 1 - self.pages.len();
            if added > LARGE_PAGE_RUN {
                warn!("materializing {added} component pages (page_size={}) in one call", self.page_size);
            }
            self.pages.resize_with(page + 1, || None);
        }
        self.pages[page].get_or_insert_with(|| {
            let mut cells = Vec::with_capacity(self.page_size);
            cells.resize_with(self.page_size, || None);
            cells.into_boxed_slice()
        });
    }

    /// The value at `pos`, or `None` if absent or its page was never materialized.
    pub(crate) fn get(&self, pos: usize) -> Option<&T> {
        let page = self.page_of(pos);
        let cells = self.pages.get(page)?.as_ref()?;
        cells[self.offset_of(pos)].as_ref()
    }

    /// Mutably borrow the slot at `pos`, materializing its page first if needed.
    pub(crate) fn get_mut(&mut self, pos: usize) -> &mut Option<T> {
        let page = self.page_of(pos);
        self.materialize(page);
        &mut self.pages[page].as_mut().unwrap()[self.offset_of(pos)]
    }

    /// Overwrite the slot at `pos`, materializing its page first if needed.
    pub(crate) fn set(&mut self, pos: usize, value: Option<T>) {
        *self.get_mut(pos) = value;
    }

    /// Replace the slot at `pos` with `None`, returning what was there.
    pub(crate) fn take(&mut self, pos: usize) -> Option<T> {
        self.get_mut(pos).take()
    }

    /// Exchange the slots at `i` and `j`.
    pub(crate) fn swap(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        let a = self.take(i);
        let b = self.take(j);
        self.set(i, b);
        self.set(j, a);
    }

    /// Materialize every page needed to address `pos`, without writing to any of them.
    pub(crate) fn reserve_through(&mut self, pos: usize) {
        let page = self.page_of(pos);
        self.materialize(page);
    }

    /// Drop trailing pages that hold no live value.
    pub(crate) fn shrink_to_fit(&mut self) {
        let before = self.pages.len();
        while matches!(self.pages.last(), Some(None)) {
            self.pages.pop();
        }
        while let Some(Some(cells)) = self.pages.last() {
            if cells.iter().all(Option::is_none) {
                self.pages.pop();
            } else {
                break;
            }
        }
        let released = before - self.pages.len();
        if released > LARGE_PAGE_RUN {
            warn!("shrink_to_fit released {released} component pages");
        }
        self.pages.shrink_to_fit();
    }

    /// Raw page references, for [`crate::Storage::raw`]. Each entry is
    /// `None` if that page index was never materialized.
    pub(crate) fn raw(&self) -> &[Option<Box<[Option<T>]>>] {
        &self.pages
    }

    /// Drop every materialized page.
    pub(crate) fn clear(&mut self) {
        self.pages.clear();
    }
}
