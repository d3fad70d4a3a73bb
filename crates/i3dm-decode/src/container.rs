//! Splitting a tile into its header and variable-length sections.

use serde_json::{Map, Value};

use crate::error::{DecodeError, DecodeResult};
use crate::header::{PayloadFormat, TileHeader, read_header};
use crate::reader::ByteReader;

/// The sections of one tile, borrowed from the input buffer.
///
/// Layout after the fixed header: batch table JSON (only when its length is
/// nonzero), the model payload, then `instance_count` fixed-stride records.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSections<'a> {
    pub header: TileHeader,
    /// Parsed batch table JSON, present iff the header declares one.
    pub batch_table: Option<Map<String, Value>>,
    /// Raw payload bytes: a URI or an embedded model, per `header.payload_format`.
    pub payload: &'a [u8],
    /// Packed per-instance records.
    pub instance_data: &'a [u8],
    /// Offset one past the last byte consumed.
    pub end_offset: usize,
}

/// The model to instance, as carried in the payload section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelPayload {
    /// Reference to an external model, relative to the tileset.
    Uri(String),
    /// The model bytes themselves.
    Embedded(Vec<u8>),
}

impl ModelPayload {
    /// Interpret payload bytes according to `format`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidUtf8`] if a URI payload is not UTF-8.
    pub fn from_section(format: PayloadFormat, bytes: &[u8]) -> DecodeResult<Self> {
        match format {
            PayloadFormat::Uri => std::str::from_utf8(bytes)
                .map(|uri| Self::Uri(uri.trim_end_matches(['\0', ' ']).to_string()))
                .map_err(|_| DecodeError::InvalidUtf8 {
                    context: "payload uri",
                }),
            PayloadFormat::Embedded => Ok(Self::Embedded(bytes.to_vec())),
        }
    }
}

/// Validate the header of the tile starting at `byte_offset` and slice out
/// its sections.
///
/// Nothing is returned unless every section fits in `data`.
///
/// # Errors
///
/// Returns the header validation errors ([`DecodeError::BadMagic`],
/// [`DecodeError::UnsupportedVersion`], [`DecodeError::EmptyPayload`],
/// [`DecodeError::UnsupportedPayloadFormat`]), [`DecodeError::InvalidJson`]
/// for a malformed batch table, and [`DecodeError::TruncatedBuffer`] if any
/// section runs past the end of `data`.
pub fn read_tile(data: &[u8], byte_offset: usize) -> DecodeResult<TileSections<'_>> {
    let mut reader = ByteReader::new(data, byte_offset);
    let header = read_header(&mut reader)?;

    let batch_table = if header.has_batch_table() {
        let bytes = reader.take(header.batch_table_byte_length as usize, "batch table")?;
        Some(parse_json_object(bytes, "batch table")?)
    } else {
        None
    };

    let payload = reader.take(header.payload_byte_length as usize, "payload")?;

    let instances_byte_length = (header.instance_count as usize)
        .checked_mul(header.instance_stride())
        .ok_or(DecodeError::TruncatedBuffer {
            context: "instance data",
            expected: usize::MAX,
            actual: data.len().saturating_sub(reader.offset()),
        })?;
    let instance_data = reader.take(instances_byte_length, "instance data")?;

    Ok(TileSections {
        header,
        batch_table,
        payload,
        instance_data,
        end_offset: reader.offset(),
    })
}

fn parse_json_object(bytes: &[u8], context: &'static str) -> DecodeResult<Map<String, Value>> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { context })?;
    let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson {
        context,
        detail: e.to_string(),
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::InvalidJson {
            context,
            detail: format!("expected an object, found {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{HEADER_BYTE_LENGTH, MAGIC};
    use crate::test_utils::TileBuilder;
    use proptest::prelude::*;

    #[test]
    fn test_minimal_tile() {
        let data = TileBuilder::new().instance([0, 0, 0], [128; 4], 0).build();
        let sections = read_tile(&data, 0).unwrap();

        assert_eq!(sections.header.instance_count, 1);
        assert_eq!(sections.header.payload_format, PayloadFormat::Embedded);
        assert!(sections.batch_table.is_none());
        assert_eq!(sections.payload, TileBuilder::DEFAULT_PAYLOAD);
        assert_eq!(sections.instance_data.len(), 10);
        assert_eq!(sections.end_offset, data.len());
    }

    #[test]
    fn test_sections_follow_header_in_order() {
        let data = TileBuilder::new()
            .batch_table(r#"{"name":["a","b"]}"#)
            .payload_format(0)
            .payload(b"model.glb")
            .instance([1, 2, 3], [128; 4], 7)
            .instance([4, 5, 6], [128; 4], 9)
            .build();
        let sections = read_tile(&data, 0).unwrap();

        let batch_table = sections.batch_table.unwrap();
        assert!(batch_table.contains_key("name"));
        assert_eq!(sections.payload, b"model.glb");
        assert_eq!(sections.instance_data.len(), 2 * 12);
        assert_eq!(
            &sections.instance_data[10..12],
            &7u16.to_le_bytes(),
            "batch id follows position and orientation"
        );
    }

    #[test]
    fn test_reads_at_byte_offset() {
        let tile = TileBuilder::new().instance([0, 0, 0], [128; 4], 0).build();
        let mut data = vec![0xEE; 16];
        data.extend_from_slice(&tile);

        let sections = read_tile(&data, 16).unwrap();
        assert_eq!(sections.header.instance_count, 1);
        assert_eq!(sections.end_offset, data.len());
    }

    #[test]
    fn test_bad_magic() {
        let data = TileBuilder::new().magic(*b"xxxx").build();
        assert_eq!(
            read_tile(&data, 0),
            Err(DecodeError::BadMagic {
                expected: MAGIC,
                actual: *b"xxxx",
            })
        );
    }

    #[test]
    fn test_unsupported_version() {
        let data = TileBuilder::new().version(2).build();
        assert_eq!(
            read_tile(&data, 0),
            Err(DecodeError::UnsupportedVersion { version: 2 })
        );
    }

    #[test]
    fn test_empty_payload() {
        let data = TileBuilder::new().payload(b"").build();
        assert_eq!(read_tile(&data, 0), Err(DecodeError::EmptyPayload));
    }

    #[test]
    fn test_unsupported_payload_format() {
        let data = TileBuilder::new().payload_format(2).build();
        assert_eq!(
            read_tile(&data, 0),
            Err(DecodeError::UnsupportedPayloadFormat { format: 2 })
        );
    }

    #[test]
    fn test_truncated_header() {
        let data = TileBuilder::new().build();
        assert!(matches!(
            read_tile(&data[..HEADER_BYTE_LENGTH - 1], 0),
            Err(DecodeError::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn test_truncated_instance_data() {
        let data = TileBuilder::new()
            .instance([0, 0, 0], [128; 4], 0)
            .instance([0, 0, 0], [128; 4], 0)
            .build();
        assert!(matches!(
            read_tile(&data[..data.len() - 1], 0),
            Err(DecodeError::TruncatedBuffer {
                context: "instance data",
                expected: 20,
                actual: 19,
            })
        ));
    }

    #[test]
    fn test_declared_byte_length_is_not_validated() {
        let data = TileBuilder::new()
            .declared_byte_length(1)
            .instance([0, 0, 0], [128; 4], 0)
            .build();
        assert!(read_tile(&data, 0).is_ok());
    }

    #[test]
    fn test_invalid_batch_table_json() {
        let data = TileBuilder::new().batch_table("{not json").build();
        assert!(matches!(
            read_tile(&data, 0),
            Err(DecodeError::InvalidJson { .. })
        ));

        let data = TileBuilder::new().batch_table("[1, 2]").build();
        assert!(matches!(
            read_tile(&data, 0),
            Err(DecodeError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_model_payload_from_section() {
        assert_eq!(
            ModelPayload::from_section(PayloadFormat::Uri, b"box.gltf  ").unwrap(),
            ModelPayload::Uri("box.gltf".to_string())
        );
        assert_eq!(
            ModelPayload::from_section(PayloadFormat::Embedded, &[1, 2]).unwrap(),
            ModelPayload::Embedded(vec![1, 2])
        );
        assert_eq!(
            ModelPayload::from_section(PayloadFormat::Uri, &[0xFF, 0xFE]),
            Err(DecodeError::InvalidUtf8 {
                context: "payload uri"
            })
        );
    }

    proptest! {
        #[test]
        fn prop_reading_is_deterministic(
            records in prop::collection::vec((any::<[u16; 3]>(), any::<[u8; 4]>(), any::<u16>()), 0..16),
            with_batch_table: bool,
        ) {
            let mut builder = TileBuilder::new();
            if with_batch_table {
                builder = builder.batch_table(r#"{"id":[]}"#);
            }
            for (position, orientation, batch_id) in records {
                builder = builder.instance(position, orientation, batch_id);
            }
            let data = builder.build();

            let first = read_tile(&data, 0).unwrap();
            let second = read_tile(&data, 0).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
