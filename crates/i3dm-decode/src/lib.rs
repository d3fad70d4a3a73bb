//! Decode Instanced 3D Model (`i3dm`) tile payloads.
//!
//! This crate provides pure synchronous decoding of the binary tile
//! container: header validation, section slicing, position dequantization,
//! octahedral orientation decoding and per-instance transform assembly. It
//! also provides the cached property-table view used for batch tables.
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives
//! - **All-or-nothing**: A malformed tile yields an error, never a partial tile
//! - **Web-compatible**: Compiles to WASM
//!
//! # Key functions
//!
//! - [`read_tile`]: Validate the header and slice out the sections
//! - [`decode_instances`]: Rebuild per-instance transforms and batch ids
//! - [`decode_tile`]: Both of the above in one call
//! - [`oct_decode`]: Decode an octahedral-encoded unit vector

mod error;
mod reader;

pub mod buffer;
pub mod container;
pub mod header;
pub mod instances;
pub mod octahedral;
pub mod property;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use buffer::BinaryBuffer;
pub use container::{ModelPayload, TileSections, read_tile};
pub use error::{DecodeError, DecodeResult};
pub use header::{
    HEADER_BYTE_LENGTH, MAGIC, PayloadFormat, Quantization, TileHeader, VERSION, instance_stride,
};
pub use instances::{DecodedTile, decode_instances, decode_tile, instance_transform};
pub use octahedral::oct_decode;
pub use property::{
    BinaryPropertyStore, Component, ComponentType, PropertyDescriptor, PropertyValue, TypedArray,
};

/// One placed copy of the instanced model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    /// Rotation then translation, no scale.
    pub transform: glam::DMat4,
    /// Row in the batch table describing this instance.
    pub batch_id: u32,
}

impl Instance {
    /// Translation part of the transform.
    #[must_use]
    pub fn position(&self) -> glam::DVec3 {
        self.transform.w_axis.truncate()
    }

    /// Rotation part of the transform, columns `[right, up, out]`.
    #[must_use]
    pub fn rotation(&self) -> glam::DMat3 {
        glam::DMat3::from_mat4(self.transform)
    }
}
