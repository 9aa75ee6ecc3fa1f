//! Domain inputs for the bin-packing service.
//!
//! This module defines the immutable input records:
//! - `Item`: a thing to pack, with dimensions, weight and placement rules
//! - `BoxType`: a candidate box with inner dimensions and capacity limits
//!
//! Items are shared by reference (`Arc`) between the pending list, the
//! skipped queue and look-ahead snapshots; identity is pointer identity.

use std::fmt;
use std::sync::Arc;

use crate::packed::PackedItem;
use crate::types::{Dimensions, Volumetric};

/// Validation error for input data.
#[derive(Debug, Clone)]
pub enum ValidationError {
    InvalidDimension(String),
    InvalidWeight(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            ValidationError::InvalidWeight(msg) => write!(f, "Invalid weight: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates that every extent of a dimension triple is nonzero.
fn validate_dimensions(dims: Dimensions, name: &str) -> Result<(), ValidationError> {
    if dims.width == 0 || dims.length == 0 || dims.depth == 0 {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must have nonzero extents, got: {}",
            name, dims
        )));
    }
    Ok(())
}

/// Placement rule of a constrained item.
///
/// Evaluated against the items already placed in the box before the
/// candidate; must be side-effect-free. This is the only dynamic dispatch
/// in the item model.
pub type PlacementPredicate = Arc<dyn Fn(&[PackedItem], &BoxType) -> bool + Send + Sync>;

/// An item to pack.
///
/// `dims` are the item's raw extents; the packer may permute them into any
/// of the six axis-aligned orientations unless `keep_flat` is set, which
/// pins the original depth axis as "up".
#[derive(Clone)]
pub struct Item {
    pub description: String,
    pub dims: Dimensions,
    pub weight: u32,
    pub keep_flat: bool,
    constraint: Option<PlacementPredicate>,
}

impl Item {
    /// Creates a new item with validation.
    ///
    /// # Parameters
    /// * `description` - Human-readable label, also the final sort tie-break
    /// * `dims` - Raw extents (width, length, depth)
    /// * `weight` - Weight in the caller's unit; zero is allowed
    /// * `keep_flat` - Disallow rotations that change which axis is "up"
    pub fn new(
        description: impl Into<String>,
        dims: Dimensions,
        weight: u32,
        keep_flat: bool,
    ) -> Result<Self, ValidationError> {
        validate_dimensions(dims, "Item")?;
        Ok(Self {
            description: description.into(),
            dims,
            weight,
            keep_flat,
            constraint: None,
        })
    }

    /// Attaches a placement predicate, turning this into a constrained item.
    pub fn with_constraint(mut self, constraint: PlacementPredicate) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Evaluates the placement rule against the items packed so far.
    ///
    /// Unconstrained items can always be packed.
    pub fn can_be_packed(&self, already_packed: &[PackedItem], box_type: &BoxType) -> bool {
        match &self.constraint {
            Some(predicate) => predicate(already_packed, box_type),
            None => true,
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("description", &self.description)
            .field("dims", &self.dims)
            .field("weight", &self.weight)
            .field("keep_flat", &self.keep_flat)
            .field("constrained", &self.constraint.is_some())
            .finish()
    }
}

impl Volumetric for Item {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }
}

/// A candidate box with inner dimensions and capacity limits.
#[derive(Clone, Debug)]
pub struct BoxType {
    pub reference: String,
    pub inner: Dimensions,
    pub empty_weight: u32,
    pub max_weight: u32,
    pub remaining_amount: Option<u32>,
}

impl BoxType {
    /// Creates a new box type with validation.
    ///
    /// # Parameters
    /// * `reference` - Identifier printed on labels and results
    /// * `inner` - Usable inner dimensions
    /// * `empty_weight` - Weight of the empty box
    /// * `max_weight` - Maximum gross weight including the box itself
    pub fn new(
        reference: impl Into<String>,
        inner: Dimensions,
        empty_weight: u32,
        max_weight: u32,
    ) -> Result<Self, ValidationError> {
        validate_dimensions(inner, "Box")?;
        if max_weight < empty_weight {
            return Err(ValidationError::InvalidWeight(format!(
                "Box max weight {} is below its empty weight {}",
                max_weight, empty_weight
            )));
        }
        Ok(Self {
            reference: reference.into(),
            inner,
            empty_weight,
            max_weight,
            remaining_amount: None,
        })
    }

    /// Limits the available stock of this box type.
    pub fn with_amount(mut self, amount: u32) -> Self {
        self.remaining_amount = Some(amount);
        self
    }

    /// Weight budget left for items once the box's own weight is accounted.
    #[inline]
    pub fn max_payload(&self) -> u32 {
        self.max_weight - self.empty_weight
    }

    /// Synthetic box used for look-ahead trial packing: a bare cuboid with
    /// an unlimited weight budget.
    pub(crate) fn working_volume(dims: Dimensions) -> Self {
        Self {
            reference: String::new(),
            inner: dims,
            empty_weight: 0,
            max_weight: u32::MAX,
            remaining_amount: None,
        }
    }
}

impl Volumetric for BoxType {
    fn dimensions(&self) -> Dimensions {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_rejects_zero_extents() {
        assert!(Item::new("ok", Dimensions::new(1, 2, 3), 5, false).is_ok());
        assert!(Item::new("bad", Dimensions::new(0, 2, 3), 5, false).is_err());
        assert!(Item::new("bad", Dimensions::new(1, 0, 3), 5, false).is_err());
        assert!(Item::new("bad", Dimensions::new(1, 2, 0), 5, false).is_err());
    }

    #[test]
    fn item_allows_zero_weight() {
        let item = Item::new("leaflet", Dimensions::new(210, 297, 1), 0, false);
        assert!(item.is_ok());
    }

    #[test]
    fn box_rejects_max_weight_below_empty_weight() {
        let err = BoxType::new("b", Dimensions::new(10, 10, 10), 50, 40);
        assert!(err.is_err());
        assert!(BoxType::new("b", Dimensions::new(10, 10, 10), 50, 50).is_ok());
    }

    #[test]
    fn max_payload_subtracts_empty_weight() {
        let bt = BoxType::new("b", Dimensions::new(10, 10, 10), 100, 1000).unwrap();
        assert_eq!(bt.max_payload(), 900);
    }

    #[test]
    fn unconstrained_item_is_always_packable() {
        let item = Item::new("plain", Dimensions::new(1, 1, 1), 1, false).unwrap();
        let bt = BoxType::new("b", Dimensions::new(10, 10, 10), 0, 100).unwrap();
        assert!(item.can_be_packed(&[], &bt));
    }

    #[test]
    fn constraint_sees_already_packed_items() {
        let item = Item::new("limited", Dimensions::new(1, 1, 1), 1, false)
            .unwrap()
            .with_constraint(Arc::new(|packed, _| packed.len() < 1));
        let bt = BoxType::new("b", Dimensions::new(10, 10, 10), 0, 100).unwrap();

        assert!(item.can_be_packed(&[], &bt));

        let other = Arc::new(Item::new("other", Dimensions::new(1, 1, 1), 1, false).unwrap());
        let packed = vec![PackedItem::at_origin_for_test(other)];
        assert!(!item.can_be_packed(&packed, &bt));
    }
}
