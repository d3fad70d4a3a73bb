//! Per-instance transform reconstruction.

use glam::{DMat3, DMat4, DVec3};
use serde_json::{Map, Value};

use crate::Instance;
use crate::container::{ModelPayload, read_tile};
use crate::error::{DecodeError, DecodeResult};
use crate::header::TileHeader;
use crate::octahedral::oct_decode;
use crate::reader::ByteReader;

/// A fully decoded tile.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTile {
    pub header: TileHeader,
    pub batch_table: Option<Map<String, Value>>,
    pub payload: ModelPayload,
    pub instances: Vec<Instance>,
}

/// Decode the tile starting at `byte_offset`: validate and split it, then
/// reconstruct every instance.
///
/// # Errors
///
/// Returns any error from [`read_tile`] or [`decode_instances`].
pub fn decode_tile(data: &[u8], byte_offset: usize) -> DecodeResult<DecodedTile> {
    let sections = read_tile(data, byte_offset)?;
    let payload = ModelPayload::from_section(sections.header.payload_format, sections.payload)?;
    let instances = decode_instances(&sections.header, sections.instance_data)?;

    Ok(DecodedTile {
        header: sections.header,
        batch_table: sections.batch_table,
        payload,
        instances,
    })
}

/// Decode `header.instance_count` records from the instance-data section.
///
/// # Record format
///
/// - Bytes 0-5: quantized position (3 × u16, little-endian)
/// - Bytes 6-7: octahedral-encoded up vector (2 × u8)
/// - Bytes 8-9: octahedral-encoded right vector (2 × u8)
/// - Bytes 10-11: batch id (u16, little-endian), only with a batch table
///
/// Without a batch table each instance's batch id is its index. Output order
/// is record order.
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedBuffer`] if the section is shorter than
/// `instance_count` records.
pub fn decode_instances(header: &TileHeader, instance_data: &[u8]) -> DecodeResult<Vec<Instance>> {
    let count = header.instance_count as usize;
    let stride = header.instance_stride();
    let expected = count.saturating_mul(stride);
    if instance_data.len() < expected {
        return Err(DecodeError::TruncatedBuffer {
            context: "instance data",
            expected,
            actual: instance_data.len(),
        });
    }

    let quantization = header.quantization;
    let has_batch_table = header.has_batch_table();
    let mut reader = ByteReader::new(instance_data, 0);
    let mut instances = Vec::with_capacity(count);

    for i in 0..header.instance_count {
        let quantized = [
            reader.read_u16("instance position")?,
            reader.read_u16("instance position")?,
            reader.read_u16("instance position")?,
        ];
        let position = quantization.dequantize(quantized);

        let up = oct_decode(
            reader.read_u8("instance orientation")?,
            reader.read_u8("instance orientation")?,
        );
        let right = oct_decode(
            reader.read_u8("instance orientation")?,
            reader.read_u8("instance orientation")?,
        );

        let batch_id = if has_batch_table {
            u32::from(reader.read_u16("instance batch id")?)
        } else {
            i
        };

        instances.push(Instance {
            transform: instance_transform(position, up, right),
            batch_id,
        });
    }

    Ok(instances)
}

/// Compose `Translate(position) · Rotate([right, up, right × up])`.
///
/// Column order and handedness matter: swapping columns or the composition
/// order changes the rendered orientation.
#[must_use]
pub fn instance_transform(position: DVec3, up: DVec3, right: DVec3) -> DMat4 {
    let out = right.cross(up);
    let rotation = DMat3::from_cols(right, up, out);

    DMat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        position.extend(1.0),
    )
}
