//! Per-feature metadata and display state.

use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::Vec4;
use i3dm_decode::{BinaryBuffer, BinaryPropertyStore, PropertyValue};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::FrameContext;

/// Opaque white, the default feature colour.
pub const WHITE: Vec4 = Vec4::ONE;

/// The batch table of one tile content.
///
/// Shared by reference between the content and its feature wrappers, so all
/// access goes through an internal lock.
#[derive(Debug)]
pub struct BatchTable {
    inner: Mutex<BatchTableInner>,
}

#[derive(Debug)]
struct BatchTableInner {
    store: BinaryPropertyStore,
    has_json: bool,
    colors: Vec<Vec4>,
    colors_dirty: bool,
    destroyed: bool,
}

impl BatchTable {
    /// Create a batch table with `features_length` rows.
    ///
    /// Version 1 tiles carry only the JSON part, so the binary body is empty.
    #[must_use]
    pub fn new(json: Option<Map<String, Value>>, features_length: usize) -> Self {
        let has_json = json.is_some();
        let store = BinaryPropertyStore::new(
            json.unwrap_or_default(),
            BinaryBuffer::empty(),
            features_length,
        );

        Self {
            inner: Mutex::new(BatchTableInner {
                store,
                has_json,
                colors: vec![WHITE; features_length],
                colors_dirty: false,
                destroyed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BatchTableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> Result<MutexGuard<'_, BatchTableInner>> {
        let inner = self.lock();
        if inner.destroyed {
            return Err(Error::Destroyed);
        }
        Ok(inner)
    }

    #[must_use]
    pub fn features_length(&self) -> usize {
        self.lock().store.features_length()
    }

    /// Whether the tile carried batch table JSON at all.
    #[must_use]
    pub fn has_json(&self) -> bool {
        self.lock().has_json
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        let inner = self.lock();
        !inner.destroyed && inner.store.has_property(name)
    }

    /// Property names in the batch table, sorted.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().store.json().keys().cloned().collect();
        names.sort();
        names
    }

    /// Read property `name` for row `batch_id`.
    pub fn get_property(&self, batch_id: u32, name: &str) -> Result<PropertyValue> {
        let mut inner = self.live()?;
        Ok(inner
            .store
            .get_property(name, i64::from(batch_id), None, 1)?)
    }

    pub fn color(&self, batch_id: u32) -> Result<Vec4> {
        let inner = self.live()?;
        color_index(batch_id, inner.colors.len()).map(|i| inner.colors[i])
    }

    pub fn set_color(&self, batch_id: u32, color: Vec4) -> Result<()> {
        let mut inner = self.live()?;
        let i = color_index(batch_id, inner.colors.len())?;
        if inner.colors[i] != color {
            inner.colors[i] = color;
            inner.colors_dirty = true;
        }
        Ok(())
    }

    /// Set every row to `color`.
    pub fn set_all_color(&self, color: Vec4) {
        let mut inner = self.lock();
        if inner.destroyed {
            return;
        }
        inner.colors.fill(color);
        inner.colors_dirty = true;
    }

    /// Flush colour changes for a render frame. Returns whether anything
    /// changed since the previous flush.
    ///
    /// Frames that do not render leave pending changes in place.
    pub fn update(&self, frame: &FrameContext) -> bool {
        let mut inner = self.lock();
        let flushed = frame.render && inner.colors_dirty && !inner.destroyed;
        if flushed {
            tracing::trace!(frame = frame.frame_number, "flushing feature colours");
            inner.colors_dirty = false;
        }
        flushed
    }

    /// Release the property store and colours. Later reads fail with
    /// [`Error::Destroyed`].
    pub fn destroy(&self) {
        let mut inner = self.lock();
        inner.store = BinaryPropertyStore::default();
        inner.colors = Vec::new();
        inner.colors_dirty = false;
        inner.destroyed = true;
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }
}

fn color_index(batch_id: u32, len: usize) -> Result<usize> {
    usize::try_from(batch_id)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| Error::InvalidArgument {
            context: "batch id",
            detail: format!("{batch_id} is not in [0, {len})"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use i3dm_decode::DecodeError;
    use serde_json::json;

    fn table(json: Value, features_length: usize) -> BatchTable {
        let Value::Object(map) = json else {
            panic!("test json must be an object");
        };
        BatchTable::new(Some(map), features_length)
    }

    #[test]
    fn test_properties() {
        let batch_table = table(json!({ "height": [10, 20, 30] }), 3);

        assert!(batch_table.has_json());
        assert!(batch_table.has_property("height"));
        assert!(!batch_table.has_property("name"));
        assert_eq!(
            batch_table.get_property(1, "height").unwrap(),
            PropertyValue::Json(json!(20))
        );
        assert_eq!(
            batch_table.get_property(3, "height"),
            Err(Error::Decode(DecodeError::IndexOutOfRange { index: 3, len: 3 }))
        );
    }

    #[test]
    fn test_without_json() {
        let batch_table = BatchTable::new(None, 2);
        assert!(!batch_table.has_json());
        assert!(!batch_table.has_property("anything"));
        assert!(batch_table.property_names().is_empty());
    }

    #[test]
    fn test_colors_and_dirty_flag() {
        let batch_table = BatchTable::new(None, 2);
        let frame = FrameContext {
            frame_number: 1,
            render: true,
        };

        assert_eq!(batch_table.color(0).unwrap(), WHITE);
        assert!(!batch_table.update(&frame));

        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        batch_table.set_color(1, red).unwrap();
        assert_eq!(batch_table.color(1).unwrap(), red);
        assert!(batch_table.update(&frame));
        assert!(!batch_table.update(&frame));

        batch_table.set_all_color(WHITE);
        assert_eq!(batch_table.color(1).unwrap(), WHITE);
        assert!(batch_table.update(&frame));

        assert!(matches!(
            batch_table.set_color(2, red),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_flush_waits_for_render_pass() {
        let batch_table = BatchTable::new(None, 1);
        batch_table.set_all_color(Vec4::new(0.0, 1.0, 0.0, 1.0));

        let pick = FrameContext {
            frame_number: 1,
            render: false,
        };
        assert!(!batch_table.update(&pick));

        let render = FrameContext {
            frame_number: 2,
            render: true,
        };
        assert!(batch_table.update(&render));
        assert!(!batch_table.update(&render));
    }

    #[test]
    fn test_destroy() {
        let batch_table = table(json!({ "height": [1] }), 1);
        batch_table.destroy();

        assert!(batch_table.is_destroyed());
        assert!(!batch_table.has_property("height"));
        assert_eq!(batch_table.get_property(0, "height"), Err(Error::Destroyed));
        assert_eq!(batch_table.color(0), Err(Error::Destroyed));
    }
}
