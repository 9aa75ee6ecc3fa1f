//! Single-box volume packing.
//!
//! The packer fills one box from a prioritized item list, building
//! horizontal layers bottom-up. Within a layer it works in rows along X,
//! stacks shorter items into the leftover height above a placed item,
//! defers items that do not fit the current row, and re-offers them at row
//! and layer boundaries. Finished layers are re-ordered so the largest
//! footprint ends up at the bottom.

use std::sync::Arc;

use tracing::debug;

use crate::itemlist::{ItemList, ItemSortKey};
use crate::model::{BoxType, Item};
use crate::orientation::{OrientatedItem, OrientationFactory};
use crate::packed::{PackedBox, PackedItem, PackedItemList, PackedLayer};
use crate::types::Dimensions;

/// Tuning knobs for the packing heuristic.
#[derive(Clone, Copy, Debug)]
pub struct PackerConfig {
    /// Comparator strategy of the pending-item list.
    pub sort_key: ItemSortKey,
    /// How many of the following items a look-ahead trial packing may
    /// consider.
    pub lookahead_items: usize,
}

impl PackerConfig {
    pub const DEFAULT_LOOKAHEAD_ITEMS: usize = 8;

    /// Creates a builder for customized configuration.
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::default()
    }
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            sort_key: ItemSortKey::default(),
            lookahead_items: Self::DEFAULT_LOOKAHEAD_ITEMS,
        }
    }
}

/// Builder for `PackerConfig`.
#[derive(Clone, Debug, Default)]
pub struct PackerConfigBuilder {
    config: PackerConfig,
}

impl PackerConfigBuilder {
    /// Sets the item comparator strategy.
    pub fn sort_key(mut self, sort_key: ItemSortKey) -> Self {
        self.config.sort_key = sort_key;
        self
    }

    /// Sets the look-ahead sample size.
    pub fn lookahead_items(mut self, lookahead_items: usize) -> Self {
        self.config.lookahead_items = lookahead_items;
        self
    }

    /// Builds the final configuration.
    pub fn build(self) -> PackerConfig {
        self.config
    }
}

/// Packs one box from one item list.
///
/// Not safe for concurrent use; independent instances are.
pub struct VolumePacker {
    box_type: BoxType,
    items: ItemList,
    skipped: ItemList,
    layers: Vec<PackedLayer>,
    packed: PackedItemList,
    remaining_weight: u32,
    frame: Dimensions,
    box_rotated: bool,
    single_pass: bool,
    factory: OrientationFactory,
    config: PackerConfig,
}

impl VolumePacker {
    /// Creates a packer for `box_type` over the given pending items.
    pub fn new(box_type: BoxType, items: ItemList, config: PackerConfig) -> Self {
        Self::with_mode(box_type, items, config, false)
    }

    /// Creates a look-ahead packer: single pass, no layer stabilisation,
    /// no further look-ahead recursion.
    pub(crate) fn new_look_ahead(box_type: BoxType, items: ItemList, config: PackerConfig) -> Self {
        Self::with_mode(box_type, items, config, true)
    }

    fn with_mode(
        box_type: BoxType,
        items: ItemList,
        config: PackerConfig,
        single_pass: bool,
    ) -> Self {
        // Pack in a normalized frame with the wider side along X; results
        // are mapped back to the original frame at the end.
        let frame_w = box_type.inner.width.max(box_type.inner.length);
        let frame_l = box_type.inner.width.min(box_type.inner.length);
        let box_rotated = box_type.inner.width != frame_w;
        let remaining_weight = box_type.max_payload();
        let skipped = ItemList::new(items.sort_key());
        let factory = OrientationFactory::new(box_type.clone(), single_pass);
        Self {
            frame: Dimensions::new(frame_w, frame_l, box_type.inner.depth),
            box_type,
            items,
            skipped,
            layers: Vec::new(),
            packed: PackedItemList::new(),
            remaining_weight,
            box_rotated,
            single_pass,
            factory,
            config,
        }
    }

    /// Packs as many items as possible and returns the result.
    ///
    /// Never fails: items that do not fit are left out and the returned
    /// box may be empty. The caller diffs the result against its pending
    /// set to learn which items remain.
    pub fn pack(mut self) -> PackedBox {
        debug!(
            box_ref = %self.box_type.reference,
            pending = self.items.count(),
            "packing box"
        );

        while self.items.count() > 0 {
            let start_depth: u32 = self.layers.iter().map(PackedLayer::depth).sum();
            if start_depth >= self.box_type.inner.depth {
                break;
            }
            let depth_left = self.box_type.inner.depth - start_depth;
            self.pack_layer(start_depth, self.frame.width, self.frame.length, depth_left);
        }

        if self.box_rotated {
            self.rotate_layers_to_original_frame();
        }
        if !self.single_pass {
            self.layers = stabilise_layers(std::mem::take(&mut self.layers));
        }

        let items: PackedItemList = self
            .layers
            .iter()
            .flat_map(|layer| layer.items().iter().cloned())
            .collect();
        debug!(
            box_ref = %self.box_type.reference,
            packed = items.len(),
            layers = self.layers.len(),
            "box packed"
        );
        PackedBox::new(self.box_type, items)
    }

    /// Builds one layer starting at `start_depth`.
    fn pack_layer(
        &mut self,
        start_depth: u32,
        mut width_left: u32,
        mut length_left: u32,
        depth_left: u32,
    ) {
        let mut layer = PackedLayer::new();
        let mut x = 0u32;
        let mut y = 0u32;
        let mut row_width = 0u32;
        let mut row_length = 0u32;
        let mut layer_depth = 0u32;
        let mut prev_item: Option<OrientatedItem> = None;

        while let Some(item) = self.items.pop() {
            if item.weight > self.remaining_weight || !self.factory.fits_in_empty_box(&item) {
                debug!(item = %item.description, "item exceeds box capacity, dropped");
                self.rebuild_item_list(None);
                continue;
            }

            let space = Dimensions::new(width_left, length_left, depth_left);
            let is_last_item = self.items.count() == 0 && self.skipped.count() == 0;
            let best = self.factory.best_orientation(
                &item,
                prev_item.as_ref(),
                &self.items,
                is_last_item,
                space,
                row_length,
                self.packed.as_slice(),
                &self.config,
            );

            match best {
                Some(orientation) => {
                    let placed = PackedItem::new(orientation.clone(), x, y, start_depth);
                    debug!(
                        item = %item.description,
                        x, y, z = start_depth,
                        dims = %orientation.dimensions(),
                        "item placed"
                    );
                    self.remaining_weight -= item.weight;
                    width_left -= orientation.width;
                    row_width += orientation.width;
                    row_length = row_length.max(orientation.length);
                    layer_depth = layer_depth.max(orientation.depth);
                    layer.insert(placed.clone());
                    self.packed.insert(placed);

                    // fill the leftover height above a shorter item
                    self.stack_into_slot(
                        &mut layer,
                        x,
                        y,
                        start_depth + orientation.depth,
                        orientation.width,
                        orientation.length,
                        layer_depth - orientation.depth,
                    );

                    x += orientation.width;
                    prev_item = Some(orientation);
                    self.rebuild_item_list(None);
                }
                None if layer.is_empty() => {
                    // nothing else can make it fit this depth budget
                    debug!(item = %item.description, "no placement in empty layer, dropped");
                    self.rebuild_item_list(None);
                }
                None if width_left > 0 && self.items.count() > 0 => {
                    self.skipped.insert(item);
                }
                None if x > 0 && item.dims.min_dimension() <= length_left => {
                    // start a new row within the same layer
                    width_left += row_width;
                    length_left -= row_length;
                    y += row_length;
                    x = 0;
                    row_width = 0;
                    row_length = 0;
                    prev_item = None;
                    self.rebuild_item_list(Some(item));
                }
                None => {
                    // no more rows fit, the layer is done
                    self.rebuild_item_list(Some(item));
                    break;
                }
            }
        }

        if !layer.is_empty() {
            self.layers.push(layer);
        }
    }

    /// Stacks further items into the vertical slot left above a placed
    /// item, up to the current layer depth.
    fn stack_into_slot(
        &mut self,
        layer: &mut PackedLayer,
        x: u32,
        y: u32,
        mut z: u32,
        max_width: u32,
        max_length: u32,
        mut max_depth: u32,
    ) {
        while max_depth > 0 {
            let Some(next) = self.items.peek().cloned() else {
                break;
            };
            if next.weight > self.remaining_weight {
                break;
            }

            let slot = Dimensions::new(max_width, max_length, max_depth);
            let is_last_item = self.items.count() <= 1 && self.skipped.count() == 0;
            let Some(orientation) = self.factory.best_orientation(
                &next,
                None,
                &self.items,
                is_last_item,
                slot,
                0,
                self.packed.as_slice(),
                &self.config,
            ) else {
                break;
            };

            self.items.remove(&next);
            let placed = PackedItem::new(orientation.clone(), x, y, z);
            debug!(item = %next.description, x, y, z, "item stacked in place");
            self.remaining_weight -= next.weight;
            max_depth -= orientation.depth;
            z += orientation.depth;
            layer.insert(placed.clone());
            self.packed.insert(placed);
        }
    }

    /// Swaps the skipped queue back in once the pending list runs dry, and
    /// reinserts the current item if one was handed back.
    fn rebuild_item_list(&mut self, current: Option<Arc<Item>>) {
        if self.items.count() == 0 {
            std::mem::swap(&mut self.items, &mut self.skipped);
        }
        if let Some(item) = current {
            self.items.insert(item);
        }
    }

    /// Maps all placements from the packing frame back into the box's
    /// original frame by swapping the X and Y axes.
    fn rotate_layers_to_original_frame(&mut self) {
        let layers = std::mem::take(&mut self.layers);
        self.layers = layers
            .into_iter()
            .map(|layer| {
                let mut rotated = PackedLayer::new();
                for item in layer.into_items() {
                    rotated.insert(item.rotated_xy());
                }
                rotated
            })
            .collect();
    }
}

/// Re-orders finalized layers so greater footprint supports lesser
/// footprint, rewriting the vertical offsets accordingly.
///
/// Ties in footprint preserve the original order; items keep their `(x, y)`
/// and their relative height within the layer.
pub fn stabilise_layers(layers: Vec<PackedLayer>) -> Vec<PackedLayer> {
    let mut ordered = layers;
    // stable: equal footprints keep build order
    ordered.sort_by(|a, b| b.footprint().cmp(&a.footprint()));

    let mut current_depth = 0u32;
    ordered
        .into_iter()
        .map(|layer| {
            let bottom = layer.bottom();
            let depth = layer.depth();
            let mut rebuilt = PackedLayer::new();
            for item in layer.into_items() {
                let offset = item.z - bottom;
                rebuilt.insert(item.at_z(current_depth + offset));
            }
            current_depth += depth;
            rebuilt
        })
        .collect()
}
