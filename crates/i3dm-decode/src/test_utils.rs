//! Synthetic tile construction for tests.

use glam::DVec3;

use crate::header::{HEADER_BYTE_LENGTH, MAGIC, VERSION};

/// Builds tile buffers field by field, defaulting to a valid tile with an
/// embedded four-byte payload, identity quantization and no instances.
#[derive(Debug, Clone)]
pub struct TileBuilder {
    magic: [u8; 4],
    version: u32,
    declared_byte_length: Option<u32>,
    batch_table: Option<Vec<u8>>,
    payload_format: u32,
    payload: Vec<u8>,
    translate: DVec3,
    scale: DVec3,
    instances: Vec<([u16; 3], [u8; 4], u16)>,
}

impl TileBuilder {
    pub const DEFAULT_PAYLOAD: &'static [u8] = b"glTF";

    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            declared_byte_length: None,
            batch_table: None,
            payload_format: 1,
            payload: Self::DEFAULT_PAYLOAD.to_vec(),
            translate: DVec3::ZERO,
            scale: DVec3::ONE,
            instances: Vec::new(),
        }
    }

    #[must_use]
    pub fn magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn declared_byte_length(mut self, byte_length: u32) -> Self {
        self.declared_byte_length = Some(byte_length);
        self
    }

    #[must_use]
    pub fn batch_table(mut self, json: &str) -> Self {
        self.batch_table = Some(json.as_bytes().to_vec());
        self
    }

    #[must_use]
    pub fn payload_format(mut self, flag: u32) -> Self {
        self.payload_format = flag;
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    #[must_use]
    pub fn quantization(mut self, translate: DVec3, scale: DVec3) -> Self {
        self.translate = translate;
        self.scale = scale;
        self
    }

    /// Append an instance record. The batch id is only written when a batch
    /// table is present.
    #[must_use]
    pub fn instance(mut self, position: [u16; 3], orientation: [u8; 4], batch_id: u16) -> Self {
        self.instances.push((position, orientation, batch_id));
        self
    }

    /// Serialize the tile.
    ///
    /// # Panics
    ///
    /// Panics if a section length does not fit in a `u32`.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let batch_table = self.batch_table.as_deref().unwrap_or_default();
        let has_batch_table = !batch_table.is_empty();

        let mut body = Vec::new();
        body.extend_from_slice(batch_table);
        body.extend_from_slice(&self.payload);
        for (position, orientation, batch_id) in &self.instances {
            for component in position {
                body.extend_from_slice(&component.to_le_bytes());
            }
            body.extend_from_slice(orientation);
            if has_batch_table {
                body.extend_from_slice(&batch_id.to_le_bytes());
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.version.to_le_bytes());
        let byte_length = self
            .declared_byte_length
            .unwrap_or_else(|| u32::try_from(HEADER_BYTE_LENGTH + body.len()).unwrap());
        out.extend_from_slice(&byte_length.to_le_bytes());
        out.extend_from_slice(&u32::try_from(batch_table.len()).unwrap().to_le_bytes());
        out.extend_from_slice(&u32::try_from(self.payload.len()).unwrap().to_le_bytes());
        out.extend_from_slice(&self.payload_format.to_le_bytes());
        out.extend_from_slice(&u32::try_from(self.instances.len()).unwrap().to_le_bytes());
        for value in [
            self.translate.x,
            self.translate.y,
            self.translate.z,
            self.scale.x,
            self.scale.y,
            self.scale.z,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&body);
        out
    }
}

impl Default for TileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
