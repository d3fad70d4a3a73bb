//! Load lifecycle for one instanced tile.
//!
//! ```text
//! Unloaded --request()--> Loading --bytes--> Processing --build--> Ready
//!                            |                   |
//!                            +--> Failed <-------+
//! ```
//!
//! The content never spawns. [`InstancedTileContent::request`] and
//! [`InstancedTileContent::initialize`] hand back a [`ContentTask`] that the
//! caller drives on whatever executor it uses. Each suspension point checks
//! whether the content was destroyed in the meantime.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use glam::Vec4;
use i3dm_decode::{Instance, TileHeader, decode_tile};

use crate::batch_table::{BatchTable, WHITE};
use crate::error::{Error, Result};
use crate::feature::TileFeature;
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::{
    BoundingSphere, FrameContext, ModelBuilder, ModelInstanceCollection, ModelSource,
};
use crate::promise::{Deferred, Promise};

/// Continuation of a load, to be polled to completion by the caller.
pub type ContentTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Where a tile content is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentState {
    #[default]
    Unloaded,
    /// Bytes have been requested.
    Loading,
    /// Decoded; waiting for the model builder.
    Processing,
    Ready,
    Failed,
}

/// Per-content settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentOptions {
    /// Base URL of the tileset, for resolving external model URIs.
    pub base_url: String,
    /// Distance from the camera, passed to the fetcher as a priority hint.
    pub distance_to_camera: f64,
    /// Forwarded to the model builder.
    pub bounding_volume: BoundingSphere,
}

impl ContentOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_distance_to_camera(mut self, distance: f64) -> Self {
        self.distance_to_camera = distance;
        self
    }

    #[must_use]
    pub fn with_bounding_volume(mut self, bounding_volume: BoundingSphere) -> Self {
        self.bounding_volume = bounding_volume;
        self
    }
}

/// Instanced 3D model content of one tile.
///
/// Cloning yields another handle to the same content.
#[derive(Clone)]
pub struct InstancedTileContent {
    shared: Arc<Shared>,
}

struct Shared {
    url: String,
    options: ContentOptions,
    fetcher: Arc<dyn Fetcher>,
    builder: Arc<dyn ModelBuilder>,
    destroyed: AtomicBool,
    inner: Mutex<Inner>,
    ready: Deferred<()>,
    content_ready_to_process: Deferred<()>,
}

#[derive(Default)]
struct Inner {
    state: ContentState,
    header: Option<TileHeader>,
    collection: Option<ModelInstanceCollection>,
    batch_table: Option<Arc<BatchTable>>,
    /// Built on first `get_feature`, one per instance.
    features: Option<Vec<Arc<TileFeature>>>,
}

impl fmt::Debug for InstancedTileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstancedTileContent")
            .field("url", &self.shared.url)
            .field("state", &self.state())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl InstancedTileContent {
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        fetcher: Arc<dyn Fetcher>,
        builder: Arc<dyn ModelBuilder>,
        options: ContentOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                options,
                fetcher,
                builder,
                destroyed: AtomicBool::new(false),
                inner: Mutex::new(Inner::default()),
                ready: Deferred::new(),
                content_ready_to_process: Deferred::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    #[must_use]
    pub fn options(&self) -> &ContentOptions {
        &self.shared.options
    }

    #[must_use]
    pub fn state(&self) -> ContentState {
        self.lock().state
    }

    /// Settles once the model is ready to draw, or the load failed.
    #[must_use]
    pub fn ready_promise(&self) -> Promise<()> {
        self.shared.ready.promise()
    }

    /// Settles once the tile bytes are decoded and the model build has
    /// started.
    #[must_use]
    pub fn content_ready_to_process_promise(&self) -> Promise<()> {
        self.shared.content_ready_to_process.promise()
    }

    /// Start loading.
    ///
    /// Returns `None` if the content is not [`ContentState::Unloaded`].
    /// Otherwise the fetch has been issued and the returned task carries the
    /// load through decode and build.
    pub fn request(&self) -> Option<ContentTask> {
        {
            let mut inner = self.lock();
            if inner.state != ContentState::Unloaded || self.is_destroyed() {
                return None;
            }
            inner.state = ContentState::Loading;
        }

        let url = self.shared.url.clone();
        let fetch = self.shared.fetcher.fetch(&FetchRequest {
            url: url.clone(),
            distance: self.shared.options.distance_to_camera,
        });
        tracing::debug!(url, "fetch started");

        let content = self.clone();
        Some(Box::pin(async move {
            let fetched = fetch.await;
            if content.is_destroyed() {
                content.abandon();
                return;
            }

            let bytes = match fetched {
                Ok(bytes) => bytes,
                Err(e) => {
                    content.fail(e);
                    return;
                }
            };
            tracing::debug!(url, byte_length = bytes.len(), "tile bytes arrived");

            match content.initialize(&bytes, 0) {
                Ok(build) => build.await,
                Err(e) => content.fail(e),
            }
        }))
    }

    /// Decode `bytes` from `byte_offset` and start building the model.
    ///
    /// Decoding happens before this returns. On success the content is
    /// [`ContentState::Processing`] and the returned task waits for the
    /// builder.
    ///
    /// # Errors
    ///
    /// - [`Error::Decode`] if the tile is malformed; the state is unchanged
    /// - [`Error::InvalidState`] if the content was already initialized
    /// - [`Error::Destroyed`] if the content was destroyed
    pub fn initialize(&self, bytes: &[u8], byte_offset: usize) -> Result<ContentTask> {
        let state = self.state();
        if !matches!(state, ContentState::Unloaded | ContentState::Loading) {
            return Err(Error::InvalidState {
                operation: "initialize",
                state,
            });
        }
        if self.is_destroyed() {
            return Err(Error::Destroyed);
        }

        let tile = decode_tile(bytes, byte_offset)?;
        let url = self.shared.url.as_str();
        tracing::debug!(
            url,
            instances = tile.instances.len(),
            batch_table = tile.batch_table.is_some(),
            payload = ?tile.header.payload_format,
            "decoded tile"
        );

        // Features address the batch table by batch id, which may exceed the
        // instance count.
        let batch_rows = tile
            .instances
            .iter()
            .map(|instance| instance.batch_id as usize + 1)
            .max()
            .unwrap_or(0)
            .max(tile.instances.len());
        let batch_table = Arc::new(BatchTable::new(tile.batch_table, batch_rows));
        let source = ModelSource::from_payload(tile.payload, &self.shared.options.base_url, url);
        let collection = ModelInstanceCollection::new(tile.instances, source);
        let bounding_volume = self.shared.options.bounding_volume;
        let model_request = (!collection.is_empty()).then(|| collection.request(bounding_volume));

        {
            let mut inner = self.lock();
            if self.is_destroyed() {
                return Err(Error::Destroyed);
            }
            inner.header = Some(tile.header);
            inner.collection = Some(collection);
            inner.batch_table = Some(batch_table);
            inner.state = ContentState::Processing;
            // Still under the lock so `destroy` cannot interleave.
            self.shared.content_ready_to_process.resolve(());
        }

        let Some(model_request) = model_request else {
            tracing::debug!(url, "tile has no instances, nothing to build");
            return Ok(Box::pin(async {}));
        };

        let build = self.shared.builder.build(model_request);
        let content = self.clone();
        Ok(Box::pin(async move {
            let built = build.await;
            if content.is_destroyed() {
                content.abandon();
                return;
            }

            match built {
                Ok(()) => content.finish(),
                Err(e) => content.fail(e),
            }
        }))
    }

    fn finish(&self) {
        {
            let mut inner = self.lock();
            if let Some(collection) = inner.collection.as_mut() {
                collection.mark_ready();
            }
            inner.state = ContentState::Ready;
        }
        tracing::info!(url = self.shared.url, "content ready");
        self.shared.ready.resolve(());
    }

    fn fail(&self, error: Error) {
        tracing::error!(url = self.shared.url, %error, "content failed");
        self.lock().state = ContentState::Failed;
        self.shared.content_ready_to_process.reject(error.clone());
        self.shared.ready.reject(error);
    }

    fn abandon(&self) {
        tracing::warn!(url = self.shared.url, "content destroyed while loading");
        self.lock().state = ContentState::Failed;
        self.shared.content_ready_to_process.reject(Error::Destroyed);
        self.shared.ready.reject(Error::Destroyed);
    }

    /// Per-frame update. Does nothing unless processing or ready.
    pub fn update(&self, frame: &FrameContext) {
        let mut inner = self.lock();
        if !matches!(inner.state, ContentState::Processing | ContentState::Ready) {
            return;
        }

        tracing::trace!(url = self.shared.url, frame = frame.frame_number, "update");
        if let Some(batch_table) = &inner.batch_table {
            batch_table.update(frame);
        }
        if let Some(collection) = inner.collection.as_mut() {
            collection.update(frame);
        }
    }

    /// Tint every feature with `color`, or reset them to white.
    pub fn apply_debug_tint(&self, enabled: bool, color: Vec4) {
        let batch_table = self.lock().batch_table.clone();
        if let Some(batch_table) = batch_table {
            batch_table.set_all_color(if enabled { color } else { WHITE });
        }
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.lock()
            .batch_table
            .as_ref()
            .is_some_and(|batch_table| batch_table.has_property(name))
    }

    /// Number of features, which is the number of decoded instances.
    #[must_use]
    pub fn features_length(&self) -> usize {
        self.lock()
            .collection
            .as_ref()
            .map_or(0, ModelInstanceCollection::len)
    }

    /// The feature for instance `index`, in decode order.
    ///
    /// The same handle is returned for repeated calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `index` is `None` or outside
    /// `[0, features_length)`, and [`Error::Destroyed`] after
    /// [`destroy`](Self::destroy).
    pub fn get_feature(&self, index: Option<i64>) -> Result<Arc<TileFeature>> {
        let mut inner = self.lock();
        if self.is_destroyed() {
            return Err(Error::Destroyed);
        }

        let features_length = inner
            .collection
            .as_ref()
            .map_or(0, ModelInstanceCollection::len);
        let invalid = || Error::InvalidArgument {
            context: "feature index",
            detail: match index {
                Some(index) => format!("{index} is not in [0, {features_length})"),
                None => "no index given".to_string(),
            },
        };
        let i = index
            .and_then(|index| usize::try_from(index).ok())
            .filter(|&i| i < features_length)
            .ok_or_else(invalid)?;

        if inner.features.is_none() {
            let features = match (&inner.collection, &inner.batch_table) {
                (Some(collection), Some(batch_table)) => collection
                    .instances()
                    .iter()
                    .enumerate()
                    .map(|(index, instance)| {
                        Arc::new(TileFeature::new(
                            index,
                            instance.batch_id,
                            Arc::clone(batch_table),
                        ))
                    })
                    .collect(),
                _ => Vec::new(),
            };
            inner.features = Some(features);
        }

        inner
            .features
            .as_ref()
            .and_then(|features| features.get(i))
            .cloned()
            .ok_or_else(invalid)
    }

    #[must_use]
    pub fn batch_table(&self) -> Option<Arc<BatchTable>> {
        self.lock().batch_table.clone()
    }

    #[must_use]
    pub fn header(&self) -> Option<TileHeader> {
        self.lock().header
    }

    /// Decoded instances, empty before decode and after destroy.
    #[must_use]
    pub fn instances(&self) -> Vec<Instance> {
        self.lock()
            .collection
            .as_ref()
            .map(|collection| collection.instances().to_vec())
            .unwrap_or_default()
    }

    /// Whether the builder has reported the model ready.
    #[must_use]
    pub fn is_model_ready(&self) -> bool {
        self.lock()
            .collection
            .as_ref()
            .is_some_and(ModelInstanceCollection::is_ready)
    }

    /// The frame the content was last updated in.
    #[must_use]
    pub fn last_frame(&self) -> Option<u64> {
        self.lock()
            .collection
            .as_ref()
            .and_then(ModelInstanceCollection::last_frame)
    }

    /// Release the instances and batch table.
    ///
    /// Outstanding tasks notice on their next resumption and reject the ready
    /// promise with [`Error::Destroyed`].
    pub fn destroy(&self) {
        let mut inner = self.lock();
        self.shared.destroyed.store(true, Ordering::SeqCst);

        inner.collection = None;
        inner.features = None;
        if let Some(batch_table) = inner.batch_table.take() {
            batch_table.destroy();
        }
        tracing::debug!(url = self.shared.url, state = ?inner.state, "content destroyed");
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::SeqCst)
    }
}
