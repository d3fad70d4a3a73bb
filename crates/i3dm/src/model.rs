//! The instanced model handed to the renderer.
//!
//! Building GPU resources is outside this crate. Content decodes instances,
//! describes the model to instance, and hands both to a [`ModelBuilder`],
//! which answers with a readiness future.

use std::{future::Future, pin::Pin, sync::Arc};

use glam::DVec3;
use i3dm_decode::{Instance, ModelPayload};

use crate::error::Result;

/// Future resolving once the builder's resources are usable.
pub type BuildFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Bounding sphere of the tile's content, forwarded to the builder as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: DVec3::ZERO,
            radius: 0.0,
        }
    }
}

/// Where the builder should take the model from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// An external model, already resolved against the tileset base URL.
    Url(String),
    /// Model bytes embedded in the tile, with the tile URL for resolving any
    /// relative references inside the model.
    Embedded { data: Arc<[u8]>, base_path: String },
}

impl ModelSource {
    /// Build the source for `payload` of the tile at `content_url`.
    #[must_use]
    pub fn from_payload(payload: ModelPayload, base_url: &str, content_url: &str) -> Self {
        match payload {
            ModelPayload::Uri(uri) => Self::Url(join_url(base_url, &uri)),
            ModelPayload::Embedded(data) => Self::Embedded {
                data: data.into(),
                base_path: content_url.to_string(),
            },
        }
    }
}

/// Resolve `relative` against `base`.
///
/// Absolute bases use URL resolution. Anything else is joined as a path.
#[must_use]
pub fn join_url(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.to_string();
    }

    if let Ok(mut base_url) = reqwest::Url::parse(base) {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        if let Ok(joined) = base_url.join(relative) {
            return joined.to_string();
        }
    }

    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Everything the builder needs to create the instanced model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Instances in decode order.
    pub instances: Arc<[Instance]>,
    pub source: ModelSource,
    pub bounding_volume: BoundingSphere,
}

/// Creates renderable resources for an instanced model.
pub trait ModelBuilder: Send + Sync {
    /// Start building. The returned future resolves when the model is ready
    /// to draw, or fails with [`crate::Error::BuildFailed`].
    fn build(&self, request: ModelRequest) -> BuildFuture;
}

/// Per-frame context passed to `update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameContext {
    pub frame_number: u64,
    /// Whether this frame renders (as opposed to e.g. a picking pass).
    pub render: bool,
}

/// The decoded instances and model source owned by one tile content.
#[derive(Debug, Clone)]
pub struct ModelInstanceCollection {
    instances: Arc<[Instance]>,
    source: ModelSource,
    ready: bool,
    last_frame: Option<u64>,
}

impl ModelInstanceCollection {
    #[must_use]
    pub fn new(instances: Vec<Instance>, source: ModelSource) -> Self {
        Self {
            instances: instances.into(),
            source,
            ready: false,
            last_frame: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    #[must_use]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    #[must_use]
    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The last frame this collection was updated in.
    #[must_use]
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    pub(crate) fn request(&self, bounding_volume: BoundingSphere) -> ModelRequest {
        ModelRequest {
            instances: Arc::clone(&self.instances),
            source: self.source.clone(),
            bounding_volume,
        }
    }

    pub(crate) fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub(crate) fn update(&mut self, frame: &FrameContext) {
        self.last_frame = Some(frame.frame_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_absolute_base() {
        assert_eq!(
            join_url("https://example.com/tiles/tileset", "models/box.gltf"),
            "https://example.com/tiles/tileset/models/box.gltf"
        );
        assert_eq!(
            join_url("https://example.com/tiles/", "../box.gltf"),
            "https://example.com/box.gltf"
        );
    }

    #[test]
    fn test_join_url_absolute_relative_wins() {
        assert_eq!(
            join_url("https://example.com/tiles/", "https://cdn.example.com/box.glb"),
            "https://cdn.example.com/box.glb"
        );
    }

    #[test]
    fn test_join_url_path_base() {
        assert_eq!(join_url("data/tiles/", "box.gltf"), "data/tiles/box.gltf");
        assert_eq!(join_url("data/tiles", "/box.gltf"), "data/tiles/box.gltf");
        assert_eq!(join_url("", "box.gltf"), "box.gltf");
    }

    #[test]
    fn test_source_from_payload() {
        let source = ModelSource::from_payload(
            ModelPayload::Uri("box.gltf".to_string()),
            "https://example.com/set/",
            "https://example.com/set/0.i3dm",
        );
        assert_eq!(
            source,
            ModelSource::Url("https://example.com/set/box.gltf".to_string())
        );

        let source = ModelSource::from_payload(
            ModelPayload::Embedded(vec![1, 2, 3]),
            "",
            "https://example.com/set/0.i3dm",
        );
        assert_eq!(
            source,
            ModelSource::Embedded {
                data: Arc::from(vec![1, 2, 3]),
                base_path: "https://example.com/set/0.i3dm".to_string(),
            }
        );
    }

    #[test]
    fn test_collection_update_records_frame() {
        let mut collection =
            ModelInstanceCollection::new(Vec::new(), ModelSource::Url(String::new()));
        assert!(collection.is_empty());
        assert_eq!(collection.last_frame(), None);

        collection.update(&FrameContext {
            frame_number: 12,
            render: true,
        });
        assert_eq!(collection.last_frame(), Some(12));
    }
}
