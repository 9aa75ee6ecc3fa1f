//! Outer packing loop: distributes items over candidate box types.
//!
//! Each round runs a volume packer per available box type on a snapshot of
//! the pending items, keeps the best candidate (most items packed, the
//! smallest sufficient box on ties) and commits it. Items no box can take
//! are surfaced with a machine-readable reason.

use std::sync::Arc;

use tracing::debug;

use crate::itemlist::ItemList;
use crate::model::{BoxType, Item};
use crate::orientation::OrientationFactory;
use crate::packed::PackedBox;
use crate::packer::{PackerConfig, VolumePacker};

/// Result of a complete packing run.
#[derive(Debug)]
pub struct PackingResult {
    pub boxes: Vec<PackedBox>,
    pub unpacked: Vec<UnpackedItem>,
}

impl PackingResult {
    /// Whether every item found a box.
    pub fn is_complete(&self) -> bool {
        self.unpacked.is_empty()
    }

    /// Number of boxes used.
    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    /// Number of items no box could take.
    pub fn unpacked_count(&self) -> usize {
        self.unpacked.len()
    }
}

/// An item that could not be placed, with the reason.
#[derive(Clone, Debug)]
pub struct UnpackedItem {
    pub item: Arc<Item>,
    pub reason: UnpackedReason,
}

/// Why an item ended up outside every box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnpackedReason {
    TooHeavyForAnyBox,
    TooLargeForAnyBox,
    NoSpaceLeft,
}

impl UnpackedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnpackedReason::TooHeavyForAnyBox => "too_heavy_for_any_box",
            UnpackedReason::TooLargeForAnyBox => "too_large_for_any_box",
            UnpackedReason::NoSpaceLeft => "no_space_left",
        }
    }
}

impl std::fmt::Display for UnpackedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnpackedReason::TooHeavyForAnyBox => {
                write!(f, "Item exceeds the weight limit of every box type")
            }
            UnpackedReason::TooLargeForAnyBox => {
                write!(f, "Item does not fit any box type in any orientation")
            }
            UnpackedReason::NoSpaceLeft => {
                write!(f, "No remaining box had space for the item")
            }
        }
    }
}

/// Events emitted while packing, for live visualisation.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    /// A new box has been committed.
    BoxStarted {
        index: usize,
        reference: String,
        dims: (u32, u32, u32),
        max_weight: u32,
    },
    /// An item was placed into the current box.
    ItemPacked {
        box_index: usize,
        description: String,
        pos: (u32, u32, u32),
        dims: (u32, u32, u32),
        weight: u32,
    },
    /// An item could not be placed anywhere.
    ItemRejected {
        description: String,
        dims: (u32, u32, u32),
        weight: u32,
        reason_code: String,
        reason_text: String,
    },
    /// Packing finished.
    Finished { boxes: usize, unpacked: usize },
}

/// Packs items into boxes with the default configuration.
pub fn pack_items(items: Vec<Item>, box_types: Vec<BoxType>) -> PackingResult {
    pack_items_with_config(items, box_types, PackerConfig::default())
}

/// Packs items into boxes with a custom configuration.
pub fn pack_items_with_config(
    items: Vec<Item>,
    box_types: Vec<BoxType>,
    config: PackerConfig,
) -> PackingResult {
    pack_items_with_progress(items, box_types, config, |_| {})
}

/// Packs items into boxes, reporting each step through `on_event`
/// (suitable for SSE/WebSocket streaming).
pub fn pack_items_with_progress(
    items: Vec<Item>,
    box_types: Vec<BoxType>,
    config: PackerConfig,
    mut on_event: impl FnMut(&PackEvent),
) -> PackingResult {
    if items.is_empty() {
        on_event(&PackEvent::Finished {
            boxes: 0,
            unpacked: 0,
        });
        return PackingResult {
            boxes: Vec::new(),
            unpacked: Vec::new(),
        };
    }

    if box_types.is_empty() {
        let unpacked: Vec<UnpackedItem> = items
            .into_iter()
            .map(Arc::new)
            .map(|item| {
                let reason = UnpackedReason::TooLargeForAnyBox;
                on_event(&rejection_event(&item, &reason));
                UnpackedItem { item, reason }
            })
            .collect();
        on_event(&PackEvent::Finished {
            boxes: 0,
            unpacked: unpacked.len(),
        });
        return PackingResult {
            boxes: Vec::new(),
            unpacked,
        };
    }

    // Cheapest-first: the first box type that swallows everything wins.
    let mut box_types = box_types;
    box_types.sort_by(|a, b| {
        a.inner
            .volume()
            .cmp(&b.inner.volume())
            .then_with(|| a.max_weight.cmp(&b.max_weight))
    });
    let mut inventory: Vec<Option<u32>> = box_types.iter().map(|b| b.remaining_amount).collect();

    let mut pending: Vec<Arc<Item>> = items.into_iter().map(Arc::new).collect();
    let mut boxes: Vec<PackedBox> = Vec::new();

    while !pending.is_empty() {
        let mut best: Option<(usize, PackedBox)> = None;

        for (idx, box_type) in box_types.iter().enumerate() {
            if inventory[idx] == Some(0) {
                continue;
            }
            let list = ItemList::from_items(pending.iter().cloned(), config.sort_key);
            let candidate = VolumePacker::new(box_type.clone(), list, config).pack();
            if candidate.item_count() == 0 {
                continue;
            }
            let packs_everything = candidate.item_count() == pending.len();
            let improves = best
                .as_ref()
                .is_none_or(|(_, current)| candidate.item_count() > current.item_count());
            if improves {
                best = Some((idx, candidate));
            }
            if packs_everything {
                break;
            }
        }

        let Some((idx, chosen)) = best else {
            break;
        };
        if let Some(amount) = inventory[idx].as_mut() {
            *amount -= 1;
        }

        let box_index = boxes.len() + 1;
        let box_type = chosen.box_type();
        debug!(
            box_ref = %box_type.reference,
            items = chosen.item_count(),
            "box committed"
        );
        on_event(&PackEvent::BoxStarted {
            index: box_index,
            reference: box_type.reference.clone(),
            dims: box_type.inner.as_tuple(),
            max_weight: box_type.max_weight,
        });
        for placed in chosen.items() {
            if let Some(pos) = pending.iter().position(|i| Arc::ptr_eq(i, &placed.item)) {
                pending.remove(pos);
            }
            on_event(&PackEvent::ItemPacked {
                box_index,
                description: placed.item.description.clone(),
                pos: (placed.x, placed.y, placed.z),
                dims: (placed.width, placed.length, placed.depth),
                weight: placed.item.weight,
            });
        }
        boxes.push(chosen);
    }

    let unpacked: Vec<UnpackedItem> = pending
        .drain(..)
        .map(|item| {
            let reason = classify_unpacked(&box_types, &item);
            debug!(item = %item.description, reason = reason.code(), "item left unpacked");
            on_event(&rejection_event(&item, &reason));
            UnpackedItem { item, reason }
        })
        .collect();

    on_event(&PackEvent::Finished {
        boxes: boxes.len(),
        unpacked: unpacked.len(),
    });
    PackingResult { boxes, unpacked }
}

fn rejection_event(item: &Arc<Item>, reason: &UnpackedReason) -> PackEvent {
    PackEvent::ItemRejected {
        description: item.description.clone(),
        dims: item.dims.as_tuple(),
        weight: item.weight,
        reason_code: reason.code().to_string(),
        reason_text: reason.to_string(),
    }
}

/// Distinguishes inherent misfits (weight, size) from plain exhaustion.
fn classify_unpacked(box_types: &[BoxType], item: &Item) -> UnpackedReason {
    if box_types
        .iter()
        .all(|bt| item.weight > bt.max_payload())
    {
        return UnpackedReason::TooHeavyForAnyBox;
    }
    if box_types
        .iter()
        .all(|bt| !OrientationFactory::new(bt.clone(), true).fits_in_empty_box(item))
    {
        return UnpackedReason::TooLargeForAnyBox;
    }
    UnpackedReason::NoSpaceLeft
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::types::Dimensions;

    fn item(description: &str, dims: (u32, u32, u32), weight: u32) -> Item {
        Item::new(
            description,
            Dimensions::new(dims.0, dims.1, dims.2),
            weight,
            false,
        )
        .unwrap()
    }

    fn box_type(reference: &str, dims: (u32, u32, u32), max_weight: u32) -> BoxType {
        BoxType::new(
            reference,
            Dimensions::new(dims.0, dims.1, dims.2),
            0,
            max_weight,
        )
        .unwrap()
    }

    #[test]
    fn everything_fits_into_one_box() {
        let result = pack_items(
            vec![item("a", (5, 5, 5), 1), item("b", (5, 5, 5), 1)],
            vec![box_type("standard", (10, 10, 10), 100)],
        );
        assert!(result.is_complete());
        assert_eq!(result.box_count(), 1);
        assert_eq!(result.boxes[0].item_count(), 2);
    }

    #[test]
    fn weight_limit_spills_into_additional_boxes() {
        let items = (0..3)
            .map(|i| item(&format!("pallet-{}", i), (10, 10, 10), 300))
            .collect();
        let result = pack_items(items, vec![box_type("crate", (20, 20, 20), 400)]);

        assert!(result.is_complete());
        assert_eq!(result.box_count(), 3);
        for packed in &result.boxes {
            assert_eq!(packed.item_count(), 1);
        }
    }

    #[test]
    fn smallest_sufficient_box_is_chosen() {
        let result = pack_items(
            vec![item("small", (10, 10, 10), 15)],
            vec![
                box_type("large", (40, 40, 40), 100),
                box_type("small", (12, 12, 12), 30),
            ],
        );
        assert!(result.is_complete());
        assert_eq!(result.box_count(), 1);
        assert_eq!(result.boxes[0].box_type().reference, "small");
    }

    #[test]
    fn mixed_order_selects_matching_box_types() {
        let result = pack_items(
            vec![
                item("bulky", (30, 30, 20), 90),
                item("mid", (10, 10, 10), 15),
                item("small", (8, 8, 8), 10),
            ],
            vec![
                box_type("small", (12, 12, 12), 30),
                box_type("large", (40, 40, 40), 100),
            ],
        );

        assert!(result.is_complete());
        assert_eq!(result.box_count(), 2);
        let mut refs: Vec<&str> = result
            .boxes
            .iter()
            .map(|b| b.box_type().reference.as_str())
            .collect();
        refs.sort_unstable();
        assert_eq!(refs, vec!["large", "small"]);
    }

    #[test_case((12, 9, 8), 5, 100, UnpackedReason::TooLargeForAnyBox ; "too large for any box")]
    #[test_case((5, 5, 5), 25, 10, UnpackedReason::TooHeavyForAnyBox ; "too heavy for any box")]
    fn reports_why_an_item_stayed_behind(
        dims: (u32, u32, u32),
        weight: u32,
        max_weight: u32,
        expected: UnpackedReason,
    ) {
        let result = pack_items(
            vec![item("misfit", dims, weight)],
            vec![box_type("crate", (10, 10, 10), max_weight)],
        );
        assert_eq!(result.box_count(), 0);
        assert_eq!(result.unpacked_count(), 1);
        assert_eq!(result.unpacked[0].reason, expected);
    }

    #[test]
    fn exhausted_inventory_leaves_items_behind() {
        let items = (0..3)
            .map(|i| item(&format!("cube-{}", i), (5, 5, 5), 1))
            .collect();
        let limited = box_type("crate", (10, 10, 10), 2).with_amount(1);
        let result = pack_items(items, vec![limited]);

        assert_eq!(result.box_count(), 1);
        assert_eq!(result.boxes[0].item_count(), 2);
        assert_eq!(result.unpacked_count(), 1);
        assert_eq!(result.unpacked[0].reason, UnpackedReason::NoSpaceLeft);
    }

    #[test]
    fn no_box_types_rejects_everything() {
        let result = pack_items(vec![item("a", (1, 1, 1), 1)], Vec::new());
        assert_eq!(result.box_count(), 0);
        assert_eq!(result.unpacked_count(), 1);
    }

    #[test]
    fn no_items_is_a_complete_result() {
        let result = pack_items(Vec::new(), vec![box_type("crate", (10, 10, 10), 100)]);
        assert!(result.is_complete());
        assert_eq!(result.box_count(), 0);
    }

    #[test]
    fn progress_events_follow_the_run() {
        let mut events = Vec::new();
        let result = pack_items_with_progress(
            vec![item("a", (5, 5, 5), 1), item("b", (5, 5, 5), 1)],
            vec![box_type("crate", (10, 10, 10), 100)],
            PackerConfig::default(),
            |event| events.push(event.clone()),
        );

        assert!(result.is_complete());
        assert!(matches!(events.first(), Some(PackEvent::BoxStarted { .. })));
        let packed_events = events
            .iter()
            .filter(|e| matches!(e, PackEvent::ItemPacked { .. }))
            .count();
        assert_eq!(packed_events, 2);
        assert!(matches!(
            events.last(),
            Some(PackEvent::Finished {
                boxes: 1,
                unpacked: 0
            })
        ));
    }

    #[test]
    fn events_serialize_with_type_tags() {
        let event = PackEvent::Finished {
            boxes: 2,
            unpacked: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Finished\""));
    }
}
