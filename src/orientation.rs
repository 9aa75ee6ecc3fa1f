//! Orientation selection for a single placement slot.
//!
//! Given an item and a free cuboid inside a box, enumerate the valid
//! axis-aligned orientations, score them and return the best one. Scoring
//! prefers orientations that keep the current row flush, then orientations
//! under which more of the following items still fit (verified by a nested
//! trial packing), then the snuggest fit.

use std::cmp::Reverse;
use std::sync::Arc;

use tracing::debug;

use crate::itemlist::ItemList;
use crate::model::{BoxType, Item};
use crate::packed::PackedItem;
use crate::packer::{PackerConfig, VolumePacker};
use crate::types::Dimensions;

/// An item with its raw extents permuted onto the box's X/Y/Z axes.
#[derive(Clone, Debug)]
pub struct OrientatedItem {
    pub item: Arc<Item>,
    pub width: u32,
    pub length: u32,
    pub depth: u32,
}

impl OrientatedItem {
    pub fn new(item: Arc<Item>, width: u32, length: u32, depth: u32) -> Self {
        Self {
            item,
            width,
            length,
            depth,
        }
    }

    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.length, self.depth)
    }
}

/// Picks orientations for one box.
///
/// `single_pass` marks a look-ahead factory: it skips the nested trial
/// packing so look-ahead never recurses.
pub struct OrientationFactory {
    box_type: BoxType,
    single_pass: bool,
}

impl OrientationFactory {
    pub fn new(box_type: BoxType, single_pass: bool) -> Self {
        Self {
            box_type,
            single_pass,
        }
    }

    /// Whether any orientation of the item fits the empty box at all.
    ///
    /// Used to reject oversized items before any placement is attempted.
    pub fn fits_in_empty_box(&self, item: &Item) -> bool {
        orientation_candidates(item)
            .iter()
            .any(|dims| dims.fits_within(&self.box_type.inner))
    }

    /// All orientations of the item that fit the free cuboid and pass the
    /// item's placement rule against the items packed so far.
    pub fn possible_orientations(
        &self,
        item: &Arc<Item>,
        space: Dimensions,
        already_packed: &[PackedItem],
    ) -> Vec<OrientatedItem> {
        if !item.can_be_packed(already_packed, &self.box_type) {
            return Vec::new();
        }
        orientation_candidates(item)
            .into_iter()
            .filter(|dims| dims.fits_within(&space))
            .map(|dims| OrientatedItem::new(item.clone(), dims.width, dims.length, dims.depth))
            .collect()
    }

    /// Picks the best orientation for the free cuboid, or none.
    ///
    /// # Parameters
    /// * `item` - The candidate item
    /// * `prev_item` - The previously placed orientation in this row
    /// * `next_items` - Items still pending after the candidate
    /// * `is_last_item` - Whether the candidate is the final pending item
    /// * `space` - Extents of the free cuboid
    /// * `row_length` - Y extent of the current row, 0 for a fresh row
    /// * `already_packed` - Placements so far, for constrained items
    #[allow(clippy::too_many_arguments)]
    pub fn best_orientation(
        &self,
        item: &Arc<Item>,
        prev_item: Option<&OrientatedItem>,
        next_items: &ItemList,
        is_last_item: bool,
        space: Dimensions,
        row_length: u32,
        already_packed: &[PackedItem],
        config: &PackerConfig,
    ) -> Option<OrientatedItem> {
        // An identical neighbour keeps its orientation: rows of same-sized
        // items stay flush without any scoring.
        if let Some(prev) = prev_item {
            if prev.item.dims == item.dims
                && prev.dimensions().fits_within(&space)
                && item.can_be_packed(already_packed, &self.box_type)
            {
                return Some(OrientatedItem::new(
                    item.clone(),
                    prev.width,
                    prev.length,
                    prev.depth,
                ));
            }
        }

        let orientations = self.possible_orientations(item, space, already_packed);
        if orientations.is_empty() {
            return None;
        }

        let stable_fit: Vec<&OrientatedItem> = orientations
            .iter()
            .filter(|o| row_length > 0 && o.length <= row_length)
            .collect();
        let pool: Vec<&OrientatedItem> = if stable_fit.is_empty() {
            orientations.iter().collect()
        } else {
            stable_fit
        };

        if pool.len() == 1 {
            return Some(pool[0].clone());
        }

        let mut scored: Vec<(usize, u64, u32, &OrientatedItem)> = pool
            .into_iter()
            .map(|o| {
                let lookahead = if self.single_pass || is_last_item {
                    0
                } else {
                    self.lookahead_count(o, next_items, space, row_length, config)
                };
                let wasted = space.volume() - o.dimensions().volume();
                (lookahead, wasted, o.length, o)
            })
            .collect();
        // stable: equal scores keep enumeration order
        scored.sort_by_key(|&(lookahead, wasted, length, _)| (Reverse(lookahead), wasted, length));

        let best = scored[0].3.clone();
        debug!(
            item = %best.item.description,
            orientation = %best.dimensions(),
            space = %space,
            "orientation chosen"
        );
        Some(best)
    }

    /// Counts how many of the following items a nested trial packing still
    /// places when the candidate takes this orientation.
    ///
    /// Two working volumes approximate the leftover space: the rest of the
    /// current row and the untouched remainder of the layer. The nested
    /// packers run in look-ahead mode and never recurse further.
    fn lookahead_count(
        &self,
        orientation: &OrientatedItem,
        next_items: &ItemList,
        space: Dimensions,
        row_length: u32,
        config: &PackerConfig,
    ) -> usize {
        if next_items.is_empty() {
            return 0;
        }
        let sample = next_items.clone().top_n(config.lookahead_items);
        let row_len = row_length.max(orientation.length);

        let mut count = 0;
        if space.width > orientation.width {
            let rest_of_row =
                Dimensions::new(space.width - orientation.width, row_len, space.depth);
            count += self.pack_working_volume(rest_of_row, sample.clone(), config);
        }
        if space.length > row_len {
            let rest_of_layer =
                Dimensions::new(space.width, space.length - row_len, space.depth);
            count += self.pack_working_volume(rest_of_layer, sample, config);
        }
        count
    }

    fn pack_working_volume(
        &self,
        dims: Dimensions,
        items: ItemList,
        config: &PackerConfig,
    ) -> usize {
        let volume = BoxType::working_volume(dims);
        VolumePacker::new_look_ahead(volume, items, *config)
            .pack()
            .item_count()
    }
}

/// Distinct axis-aligned permutations of the item's raw extents.
///
/// `keep_flat` restricts to the two orientations whose vertical extent is
/// the item's original depth. Order is fixed for determinism; duplicate
/// triples (square or cubic items) keep their first occurrence.
fn orientation_candidates(item: &Item) -> Vec<Dimensions> {
    let Dimensions {
        width: w,
        length: l,
        depth: d,
    } = item.dims;
    let all = [
        Dimensions::new(w, l, d),
        Dimensions::new(l, w, d),
        Dimensions::new(w, d, l),
        Dimensions::new(d, w, l),
        Dimensions::new(l, d, w),
        Dimensions::new(d, l, w),
    ];
    let mut seen: Vec<Dimensions> = Vec::with_capacity(6);
    for candidate in all {
        if item.keep_flat && candidate.depth != d {
            continue;
        }
        if !seen.contains(&candidate) {
            seen.push(candidate);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itemlist::ItemSortKey;

    fn item(dims: (u32, u32, u32), keep_flat: bool) -> Arc<Item> {
        Arc::new(
            Item::new(
                "test",
                Dimensions::new(dims.0, dims.1, dims.2),
                1,
                keep_flat,
            )
            .unwrap(),
        )
    }

    fn factory(inner: (u32, u32, u32)) -> OrientationFactory {
        let bt = BoxType::new(
            "box",
            Dimensions::new(inner.0, inner.1, inner.2),
            0,
            u32::MAX,
        )
        .unwrap();
        OrientationFactory::new(bt, true)
    }

    #[test]
    fn six_distinct_orientations_for_a_scalene_item() {
        let candidates = orientation_candidates(&item((2, 3, 4), false));
        assert_eq!(candidates.len(), 6);
        for dims in &candidates {
            let mut sorted = [dims.width, dims.length, dims.depth];
            sorted.sort_unstable();
            assert_eq!(sorted, [2, 3, 4]);
        }
    }

    #[test]
    fn cubes_collapse_to_one_orientation() {
        assert_eq!(orientation_candidates(&item((5, 5, 5), false)).len(), 1);
        assert_eq!(orientation_candidates(&item((5, 5, 2), false)).len(), 3);
    }

    #[test]
    fn keep_flat_pins_the_vertical_axis() {
        let candidates = orientation_candidates(&item((2, 3, 4), true));
        assert_eq!(candidates.len(), 2);
        for dims in &candidates {
            assert_eq!(dims.depth, 4);
        }
    }

    #[test]
    fn fits_in_empty_box_tries_rotations() {
        let factory = factory((10, 5, 5));
        // only fits lying along X
        assert!(factory.fits_in_empty_box(&item((5, 5, 10), false)));
        assert!(!factory.fits_in_empty_box(&item((6, 6, 6), false)));
    }

    #[test]
    fn keep_flat_limits_empty_box_check() {
        let factory = factory((10, 5, 5));
        // would fit rotated upright, but keep_flat forbids tipping it over
        assert!(!factory.fits_in_empty_box(&item((5, 5, 10), true)));
    }

    #[test]
    fn best_orientation_respects_free_space() {
        let factory = factory((10, 10, 10));
        let list = ItemList::new(ItemSortKey::MaxDimension);
        let candidate = item((8, 2, 2), false);

        let best = factory
            .best_orientation(
                &candidate,
                None,
                &list,
                true,
                Dimensions::new(4, 10, 10),
                0,
                &[],
                &PackerConfig::default(),
            )
            .unwrap();
        // 8 cannot lie along X in a 4-wide slot
        assert_ne!(best.width, 8);
    }

    #[test]
    fn stable_fit_tier_wins_over_fresh() {
        let factory = factory((20, 20, 20));
        let list = ItemList::new(ItemSortKey::MaxDimension);
        // 6x3 footprint: lying "long side along Y" would be fresh (6 > 3),
        // the stable-fit tier keeps the row at length 3.
        let candidate = item((6, 3, 3), false);

        let best = factory
            .best_orientation(
                &candidate,
                None,
                &list,
                true,
                Dimensions::new(20, 20, 3),
                3,
                &[],
                &PackerConfig::default(),
            )
            .unwrap();
        assert!(best.length <= 3);
    }

    #[test]
    fn identical_neighbour_reuses_orientation() {
        let factory = factory((20, 20, 20));
        let list = ItemList::new(ItemSortKey::MaxDimension);
        let first = item((2, 3, 4), false);
        let second = item((2, 3, 4), false);
        let prev = OrientatedItem::new(first, 3, 2, 4);

        let best = factory
            .best_orientation(
                &second,
                Some(&prev),
                &list,
                true,
                Dimensions::new(20, 20, 20),
                2,
                &[],
                &PackerConfig::default(),
            )
            .unwrap();
        assert_eq!((best.width, best.length, best.depth), (3, 2, 4));
    }

    #[test]
    fn constrained_item_yields_no_orientation() {
        let factory = factory((10, 10, 10));
        let blocked = Arc::new(
            Item::new("blocked", Dimensions::new(2, 2, 2), 1, false)
                .unwrap()
                .with_constraint(Arc::new(|_, _| false)),
        );
        assert!(factory
            .possible_orientations(&blocked, Dimensions::new(10, 10, 10), &[])
            .is_empty());
    }
}
