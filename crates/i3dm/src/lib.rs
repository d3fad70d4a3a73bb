//! Load lifecycle for Instanced 3D Model (`i3dm`) tile content.
//!
//! This crate drives one tile from "not loaded" to "ready to draw": it
//! fetches the tile bytes, decodes them with [`i3dm_decode`], hands the
//! instances to a model builder and exposes the batch table and per-instance
//! features for inspection and styling.
//!
//! # Design principles
//!
//! - **Runtime-agnostic**: Lifecycle calls return futures, the caller spawns
//! - **Pluggable I/O**: Fetching and model building sit behind traits
//! - **Sync decoding**: Decoding happens inline in [`InstancedTileContent::initialize`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use i3dm::{ContentOptions, HttpFetcher, InstancedTileContent};
//!
//! let content = InstancedTileContent::new(
//!     "https://example.com/tileset/trees.i3dm",
//!     Arc::new(HttpFetcher::new()),
//!     Arc::new(my_builder),
//!     ContentOptions::new().with_base_url("https://example.com/tileset/"),
//! );
//!
//! if let Some(task) = content.request() {
//!     tokio::spawn(task);
//! }
//! content.ready_promise().wait().await?;
//! ```

pub mod batch_table;
pub mod content;
mod error;
pub mod feature;
pub mod fetch;
pub mod model;
pub mod promise;

pub use batch_table::{BatchTable, WHITE};
pub use content::{ContentOptions, ContentState, ContentTask, InstancedTileContent};
pub use error::{Error, Result};
pub use feature::TileFeature;
#[cfg(not(target_family = "wasm"))]
pub use fetch::HttpFetcher;
pub use fetch::{FetchFuture, FetchRequest, Fetcher};
pub use model::{
    BoundingSphere, BuildFuture, FrameContext, ModelBuilder, ModelInstanceCollection,
    ModelRequest, ModelSource,
};
pub use promise::{Deferred, Promise};

// Re-export decode types for convenience.
pub use i3dm_decode::{DecodeError, Instance, ModelPayload, PropertyValue, TileHeader};
