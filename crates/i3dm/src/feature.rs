//! Per-instance feature handles.

use std::sync::Arc;

use glam::Vec4;
use i3dm_decode::PropertyValue;

use crate::batch_table::BatchTable;
use crate::error::Result;

/// One instance of a tile, exposed for inspection and styling.
///
/// Features are created by [`crate::InstancedTileContent::get_feature`] and
/// indexed by instance order. The batch id selects the batch table row.
#[derive(Debug)]
pub struct TileFeature {
    index: usize,
    batch_id: u32,
    batch_table: Arc<BatchTable>,
}

impl TileFeature {
    pub(crate) fn new(index: usize, batch_id: u32, batch_table: Arc<BatchTable>) -> Self {
        Self {
            index,
            batch_id,
            batch_table,
        }
    }

    /// Position of the instance in decode order.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn batch_id(&self) -> u32 {
        self.batch_id
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.batch_table.has_property(name)
    }

    pub fn get_property(&self, name: &str) -> Result<PropertyValue> {
        self.batch_table.get_property(self.batch_id, name)
    }

    pub fn color(&self) -> Result<Vec4> {
        self.batch_table.color(self.batch_id)
    }

    pub fn set_color(&self, color: Vec4) -> Result<()> {
        self.batch_table.set_color(self.batch_id, color)
    }
}
