//! Priority list of pending items.
//!
//! The list sorts lazily: inserts only mark it dirty, and the next read
//! operation (peek/pop/top_n/iterate) performs one stable sort. The packer
//! and its skipped-item queue are the only mutators.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use crate::model::Item;

/// Strategy for the dominant scalar of the item comparator.
///
/// The observed production ordering mixes the weight into an extent
/// comparison; both variants are selectable so callers can choose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ItemSortKey {
    /// Largest extent of the item, `max(width, length, depth)`.
    #[default]
    MaxDimension,
    /// `max(length, weight, depth)` — compares a weight against two
    /// lengths, reproduced for compatibility with existing deployments.
    Legacy,
}

impl ItemSortKey {
    fn dominant_scalar(&self, item: &Item) -> u32 {
        match self {
            ItemSortKey::MaxDimension => item.dims.max_dimension(),
            ItemSortKey::Legacy => item.dims.length.max(item.weight).max(item.dims.depth),
        }
    }
}

impl FromStr for ItemSortKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "max-dimension" | "max_dimension" => Ok(ItemSortKey::MaxDimension),
            "legacy" => Ok(ItemSortKey::Legacy),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

/// Mutable priority container of items awaiting placement.
///
/// Cloning produces a deep snapshot of the list itself; the items stay
/// shared by reference.
#[derive(Clone, Debug)]
pub struct ItemList {
    items: Vec<Arc<Item>>,
    sort_key: ItemSortKey,
    dirty: bool,
}

impl ItemList {
    /// Creates an empty list with the given comparator strategy.
    pub fn new(sort_key: ItemSortKey) -> Self {
        Self {
            items: Vec::new(),
            sort_key,
            dirty: false,
        }
    }

    /// Creates a list from existing items.
    pub fn from_items(items: impl IntoIterator<Item = Arc<Item>>, sort_key: ItemSortKey) -> Self {
        let items: Vec<Arc<Item>> = items.into_iter().collect();
        let dirty = !items.is_empty();
        Self {
            items,
            sort_key,
            dirty,
        }
    }

    /// Adds an item at the end and marks the list unsorted.
    pub fn insert(&mut self, item: Arc<Item>) {
        self.items.push(item);
        self.dirty = true;
    }

    /// Removes the first entry identical to `item` (pointer identity).
    pub fn remove(&mut self, item: &Arc<Item>) {
        if let Some(pos) = self.items.iter().position(|i| Arc::ptr_eq(i, item)) {
            self.items.remove(pos);
        }
    }

    /// Current number of pending items.
    #[inline]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the greatest item per comparator without removing it.
    pub fn peek(&mut self) -> Option<&Arc<Item>> {
        self.sort_if_dirty();
        self.items.first()
    }

    /// Returns and removes the greatest item per comparator.
    pub fn pop(&mut self) -> Option<Arc<Item>> {
        self.sort_if_dirty();
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Snapshot of the `n` greatest items as a new, already-sorted list.
    pub fn top_n(&mut self, n: usize) -> ItemList {
        self.sort_if_dirty();
        ItemList {
            items: self.items.iter().take(n).cloned().collect(),
            sort_key: self.sort_key,
            dirty: false,
        }
    }

    /// Iterates greatest-first over a snapshot of the current contents.
    #[allow(dead_code)]
    pub fn iterate(&mut self) -> std::vec::IntoIter<Arc<Item>> {
        self.sort_if_dirty();
        self.items.clone().into_iter()
    }

    /// Comparator strategy this list was built with.
    #[inline]
    pub fn sort_key(&self) -> ItemSortKey {
        self.sort_key
    }

    fn sort_if_dirty(&mut self) {
        if self.dirty {
            let key = self.sort_key;
            // stable: ties keep insertion order
            self.items.sort_by(|a, b| compare_items(key, a, b));
            self.dirty = false;
        }
    }
}

/// Descending priority order: the item that should pop first compares as
/// `Less`.
///
/// Keys, first nonzero difference wins:
/// 1. dominant scalar per strategy, larger first
/// 2. weight, heavier first
/// 3. description, lexicographically earlier first
fn compare_items(key: ItemSortKey, a: &Item, b: &Item) -> Ordering {
    key.dominant_scalar(b)
        .cmp(&key.dominant_scalar(a))
        .then_with(|| b.weight.cmp(&a.weight))
        .then_with(|| a.description.cmp(&b.description))
}
