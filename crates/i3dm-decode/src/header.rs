//! Fixed-size tile header.

use glam::DVec3;

use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;

/// Magic tag identifying an Instanced 3D Model tile.
pub const MAGIC: [u8; 4] = *b"i3dm";

/// The only header version this decoder accepts.
pub const VERSION: u32 = 1;

/// Size of the fixed header in bytes: the tag, six `u32` fields and six `f64`s.
pub const HEADER_BYTE_LENGTH: usize = 4 + 6 * 4 + 6 * 8;

/// How the instanced model is carried in the payload section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// The payload is a UTF-8 URI referencing an external model.
    Uri,
    /// The payload is the binary model itself.
    Embedded,
}

impl PayloadFormat {
    /// Parse the header flag.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnsupportedPayloadFormat`] for anything other
    /// than 0 or 1.
    pub fn from_flag(flag: u32) -> DecodeResult<Self> {
        match flag {
            0 => Ok(Self::Uri),
            1 => Ok(Self::Embedded),
            format => Err(DecodeError::UnsupportedPayloadFormat { format }),
        }
    }

    #[must_use]
    pub fn flag(self) -> u32 {
        match self {
            Self::Uri => 0,
            Self::Embedded => 1,
        }
    }
}

/// Translation and scale used to expand quantized positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantization {
    pub translate: DVec3,
    pub scale: DVec3,
}

impl Quantization {
    /// No-op quantization: positions decode to their raw integer values.
    pub const IDENTITY: Self = Self {
        translate: DVec3::ZERO,
        scale: DVec3::ONE,
    };

    /// Expand a quantized position: `q * scale + translate` per component.
    #[must_use]
    pub fn dequantize(&self, quantized: [u16; 3]) -> DVec3 {
        DVec3::new(
            f64::from(quantized[0]) * self.scale.x + self.translate.x,
            f64::from(quantized[1]) * self.scale.y + self.translate.y,
            f64::from(quantized[2]) * self.scale.z + self.translate.z,
        )
    }
}

/// Decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileHeader {
    pub version: u32,
    /// Declared total length of the tile. Informational only.
    pub byte_length: u32,
    pub batch_table_byte_length: u32,
    pub payload_byte_length: u32,
    pub payload_format: PayloadFormat,
    pub instance_count: u32,
    pub quantization: Quantization,
}

impl TileHeader {
    #[must_use]
    pub fn has_batch_table(&self) -> bool {
        self.batch_table_byte_length > 0
    }

    /// Bytes per instance record in the instance-data section.
    #[must_use]
    pub fn instance_stride(&self) -> usize {
        instance_stride(self.has_batch_table())
    }
}

/// Bytes per instance record: three `u16` position components, four
/// orientation bytes, and a `u16` batch id when a batch table is present.
#[must_use]
pub fn instance_stride(has_batch_table: bool) -> usize {
    3 * 2 + 4 + if has_batch_table { 2 } else { 0 }
}

/// Read and validate the fixed header, leaving `reader` at the first
/// variable-length section.
pub(crate) fn read_header(reader: &mut ByteReader<'_>) -> DecodeResult<TileHeader> {
    let magic = reader.read_magic("header magic")?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic {
            expected: MAGIC,
            actual: magic,
        });
    }

    let version = reader.read_u32("header version")?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { version });
    }

    let byte_length = reader.read_u32("header byte length")?;
    let batch_table_byte_length = reader.read_u32("header batch table length")?;

    let payload_byte_length = reader.read_u32("header payload length")?;
    if payload_byte_length == 0 {
        return Err(DecodeError::EmptyPayload);
    }

    let payload_format = PayloadFormat::from_flag(reader.read_u32("header payload format")?)?;
    let instance_count = reader.read_u32("header instance count")?;

    let mut quantization = [0.0f64; 6];
    for value in &mut quantization {
        *value = reader.read_f64("header quantization")?;
    }

    Ok(TileHeader {
        version,
        byte_length,
        batch_table_byte_length,
        payload_byte_length,
        payload_format,
        instance_count,
        quantization: Quantization {
            translate: DVec3::new(quantization[0], quantization[1], quantization[2]),
            scale: DVec3::new(quantization[3], quantization[4], quantization[5]),
        },
    })
}
