//! Property table access over JSON metadata and a shared binary body.
//!
//! A property is described by an entry in the JSON map. The entry is either
//! the value itself (inline) or an object carrying a `byteOffset` into the
//! binary body. Binary-backed properties are materialized into a typed array
//! the first time they are read and served from a per-store cache after that.

use std::collections::HashMap;
use std::ops::Range;

use serde_json::{Map, Value};

use crate::buffer::BinaryBuffer;
use crate::error::{DecodeError, DecodeResult};

/// Element type of a binary-backed property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// 16-bit unsigned integer.
    UnsignedShort,
    /// 32-bit unsigned integer.
    UnsignedInt,
    /// 32-bit IEEE float.
    Float,
}

impl ComponentType {
    /// Look up a component type by its WebGL enum value.
    #[must_use]
    pub fn from_gl(code: u32) -> Option<Self> {
        match code {
            5123 => Some(Self::UnsignedShort),
            5125 => Some(Self::UnsignedInt),
            5126 => Some(Self::Float),
            _ => None,
        }
    }

    /// Parse a descriptor's `componentType`, given either as a WebGL enum
    /// value or by name.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|code| u32::try_from(code).ok())
                .and_then(Self::from_gl),
            Value::String(name) => match name.as_str() {
                "UNSIGNED_SHORT" => Some(Self::UnsignedShort),
                "UNSIGNED_INT" => Some(Self::UnsignedInt),
                "FLOAT" => Some(Self::Float),
                _ => None,
            },
            _ => None,
        }
    }

    /// Width of one element in bytes.
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }
}

/// A single element read from a typed array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component {
    U16(u16),
    U32(u32),
    F32(f32),
}

/// A materialized typed view of part of the binary body.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl TypedArray {
    fn read(component_type: ComponentType, bytes: &[u8]) -> Self {
        match component_type {
            ComponentType::UnsignedShort => Self::U16(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            ComponentType::UnsignedInt => Self::U32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            ComponentType::Float => Self::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Component> {
        match self {
            Self::U16(v) => v.get(index).copied().map(Component::U16),
            Self::U32(v) => v.get(index).copied().map(Component::U32),
            Self::F32(v) => v.get(index).copied().map(Component::F32),
        }
    }

    fn components(&self, range: Range<usize>) -> Vec<Component> {
        range.filter_map(|i| self.get(i)).collect()
    }
}

/// The value of a property lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// An inline JSON value, returned as stored.
    Json(Value),
    /// One element of a binary-backed property.
    Scalar(Component),
    /// An ordered run of elements of a binary-backed property.
    Vector(Vec<Component>),
}

/// How a property name resolves before any bytes are read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyDescriptor<'a> {
    Inline(&'a Value),
    Binary {
        byte_offset: usize,
        /// The descriptor's own `componentType`, if it names a known one.
        component_type: Option<ComponentType>,
    },
}

/// Lazy, cached access to a property table.
///
/// The cache is keyed by property name and lives exactly as long as the
/// store. The first read of a binary-backed name fixes the length of its
/// cached view.
#[derive(Debug, Clone, Default)]
pub struct BinaryPropertyStore {
    json: Map<String, Value>,
    buffer: BinaryBuffer,
    features_length: usize,
    cache: HashMap<String, TypedArray>,
}

impl BinaryPropertyStore {
    /// Create a store over `json` and its binary body.
    ///
    /// `features_length` is the number of records, used to size per-record
    /// views and to bound record indices.
    #[must_use]
    pub fn new(json: Map<String, Value>, buffer: BinaryBuffer, features_length: usize) -> Self {
        Self {
            json,
            buffer,
            features_length,
            cache: HashMap::new(),
        }
    }

    #[must_use]
    pub fn features_length(&self) -> usize {
        self.features_length
    }

    #[must_use]
    pub fn json(&self) -> &Map<String, Value> {
        &self.json
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.json.contains_key(name)
    }

    /// Number of typed views materialized so far.
    #[must_use]
    pub fn cached_views(&self) -> usize {
        self.cache.len()
    }

    /// Resolve `name` to its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidSemantic`] if there is no entry for `name`.
    pub fn descriptor(&self, name: &str) -> DecodeResult<PropertyDescriptor<'_>> {
        let value = self
            .json
            .get(name)
            .ok_or_else(|| DecodeError::InvalidSemantic {
                semantic: name.to_string(),
            })?;

        let object = value.as_object();
        let byte_offset = object
            .and_then(|o| o.get("byteOffset"))
            .and_then(Value::as_u64);

        Ok(match byte_offset {
            Some(offset) => PropertyDescriptor::Binary {
                byte_offset: usize::try_from(offset).unwrap_or(usize::MAX),
                component_type: object
                    .and_then(|o| o.get("componentType"))
                    .and_then(ComponentType::from_json),
            },
            None => PropertyDescriptor::Inline(value),
        })
    }

    /// Read a property that applies to the whole table.
    ///
    /// Inline values are returned verbatim regardless of `component_type`.
    /// For binary-backed values `component_type` overrides the descriptor's
    /// own `componentType`; one of the two is required.
    /// Binary-backed values yield a scalar when `count` is 1 and an ordered
    /// run of `count` elements otherwise.
    pub fn get_global_property(
        &mut self,
        name: &str,
        component_type: Option<ComponentType>,
        count: usize,
    ) -> DecodeResult<PropertyValue> {
        let (byte_offset, declared) = match self.descriptor(name)? {
            PropertyDescriptor::Inline(value) => return Ok(PropertyValue::Json(value.clone())),
            PropertyDescriptor::Binary {
                byte_offset,
                component_type,
            } => (byte_offset, component_type),
        };

        let component_type = require_component_type(name, component_type.or(declared))?;
        let view = self.typed_view(name, byte_offset, component_type, count)?;

        if count == 1 {
            return view
                .get(0)
                .map(PropertyValue::Scalar)
                .ok_or(DecodeError::IndexOutOfRange { index: 0, len: 0 });
        }
        Ok(PropertyValue::Vector(view.components(0..count.min(view.len()))))
    }

    /// Read the entry for one record of a per-record property.
    ///
    /// Each record occupies `record_stride` consecutive elements. A stride of
    /// 1 yields a scalar (or a single JSON element), larger strides yield an
    /// ordered run.
    pub fn get_property(
        &mut self,
        name: &str,
        record_index: i64,
        component_type: Option<ComponentType>,
        record_stride: usize,
    ) -> DecodeResult<PropertyValue> {
        let features_length = self.features_length;
        let index = usize::try_from(record_index)
            .ok()
            .filter(|&i| i < features_length)
            .ok_or(DecodeError::IndexOutOfRange {
                index: record_index,
                len: features_length,
            })?;
        let range = index.saturating_mul(record_stride)
            ..index.saturating_add(1).saturating_mul(record_stride);

        let (byte_offset, declared) = match self.descriptor(name)? {
            PropertyDescriptor::Inline(value) => {
                return slice_json(name, value, range, record_index, features_length);
            }
            PropertyDescriptor::Binary {
                byte_offset,
                component_type,
            } => (byte_offset, component_type),
        };

        let component_type = require_component_type(name, component_type.or(declared))?;
        let view = self.typed_view(
            name,
            byte_offset,
            component_type,
            features_length.saturating_mul(record_stride),
        )?;

        if range.end > view.len() {
            return Err(DecodeError::IndexOutOfRange {
                index: record_index,
                len: view.len() / record_stride.max(1),
            });
        }

        if record_stride == 1 {
            Ok(view
                .get(range.start)
                .map_or(PropertyValue::Vector(Vec::new()), PropertyValue::Scalar))
        } else {
            Ok(PropertyValue::Vector(view.components(range)))
        }
    }

    fn typed_view(
        &mut self,
        name: &str,
        byte_offset: usize,
        component_type: ComponentType,
        count: usize,
    ) -> DecodeResult<&TypedArray> {
        if !self.cache.contains_key(name) {
            let byte_length = count.saturating_mul(component_type.byte_size());
            let bytes = self.buffer.slice(byte_offset, byte_length).map_err(|_| {
                DecodeError::TruncatedBuffer {
                    context: "property table",
                    expected: byte_offset.saturating_add(byte_length),
                    actual: self.buffer.byte_length(),
                }
            })?;
            let view = TypedArray::read(component_type, bytes.as_slice());
            self.cache.insert(name.to_string(), view);
        }

        self.cache
            .get(name)
            .ok_or_else(|| DecodeError::InvalidSemantic {
                semantic: name.to_string(),
            })
    }
}

fn require_component_type(
    name: &str,
    component_type: Option<ComponentType>,
) -> DecodeResult<ComponentType> {
    component_type.ok_or_else(|| DecodeError::MissingComponentType {
        semantic: name.to_string(),
    })
}

fn slice_json(
    name: &str,
    value: &Value,
    range: Range<usize>,
    record_index: i64,
    features_length: usize,
) -> DecodeResult<PropertyValue> {
    let array = value.as_array().ok_or_else(|| DecodeError::InvalidSemantic {
        semantic: name.to_string(),
    })?;

    let single = range.len() == 1;
    let slice = array
        .get(range)
        .ok_or(DecodeError::IndexOutOfRange {
            index: record_index,
            len: features_length,
        })?;

    if single {
        Ok(PropertyValue::Json(slice[0].clone()))
    } else {
        Ok(PropertyValue::Json(Value::Array(slice.to_vec())))
    }
}
