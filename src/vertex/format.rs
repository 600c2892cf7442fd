//! Vertex format descriptors.
//!
//! A [`VertexFormat`] is the `(uv_count, color_count)` pair that fully
//! determines a vertex record's byte layout. The supported combinations form
//! a closed set baked in at build time: one concrete container and factory
//! type is monomorphized per combination, and everything downstream of
//! construction works through format-erased interfaces plus the derived
//! [`VertexMemoryFormat`] byte offsets.

use crate::error::GeometryError;

/// Maximum number of UV channels a vertex record can carry.
pub const MAX_UV_CHANNELS: u8 = 8;
/// Maximum number of packed RGBA color channels a vertex record can carry.
pub const MAX_COLOR_CHANNELS: u8 = 2;

/// Byte offset of the position field. Fixed for every format.
pub const POSITION_OFFSET: u32 = 0;
/// Byte offset of the normal field. Fixed for every format.
pub const NORMAL_OFFSET: u32 = 12;
/// Byte offset of the tangent field. Fixed for every format.
pub const TANGENT_OFFSET: u32 = 24;
/// Byte offset of the first UV channel, immediately after the tangent.
pub const UVS_OFFSET: u32 = 40;

const UV_SIZE: u32 = 8;
const COLOR_SIZE: u32 = 4;

/// The per-vertex layout parameters: UV channel count and color channel count.
///
/// Two formats are equal iff both counts match. Construction validates the
/// counts against the supported set; every other API in the crate takes an
/// already-validated format and never fails on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    uv_count: u8,
    color_count: u8,
}

impl VertexFormat {
    /// Create a format with the given channel counts.
    ///
    /// Returns [`GeometryError::UnsupportedFormat`] when a count falls
    /// outside the enumerated set (`1..=8` UVs, `1..=2` colors).
    pub fn new(uv_count: u8, color_count: u8) -> Result<Self, GeometryError> {
        if uv_count == 0
            || uv_count > MAX_UV_CHANNELS
            || color_count == 0
            || color_count > MAX_COLOR_CHANNELS
        {
            return Err(GeometryError::UnsupportedFormat {
                uv_count,
                color_count,
            });
        }
        Ok(Self {
            uv_count,
            color_count,
        })
    }

    /// Number of UV channels.
    pub fn uv_count(&self) -> u8 {
        self.uv_count
    }

    /// Number of packed RGBA color channels.
    pub fn color_count(&self) -> u8 {
        self.color_count
    }

    /// Derive the byte layout of a record with this format.
    pub fn memory_format(&self) -> VertexMemoryFormat {
        VertexMemoryFormat::from_format(self)
    }
}

/// Byte offsets and stride of a vertex record, as a pure function of the
/// format. This is what the storage layer needs to bind the interleaved
/// buffer without knowing the concrete record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexMemoryFormat {
    /// Offset of the position field.
    pub position: u32,
    /// Offset of the normal field.
    pub normal: u32,
    /// Offset of the tangent field.
    pub tangent: u32,
    /// Offset of the first UV channel.
    pub uvs: u32,
    /// Offset of the first color channel.
    pub colors: u32,
    /// Total record size in bytes.
    pub stride: u32,
}

impl VertexMemoryFormat {
    /// Compute the layout for `format`.
    pub fn from_format(format: &VertexFormat) -> Self {
        let colors = UVS_OFFSET + UV_SIZE * format.uv_count as u32;
        Self {
            position: POSITION_OFFSET,
            normal: NORMAL_OFFSET,
            tangent: TANGENT_OFFSET,
            uvs: UVS_OFFSET,
            colors,
            stride: colors + COLOR_SIZE * format.color_count as u32,
        }
    }

    /// Byte offset of UV channel `channel`.
    pub fn uv_offset(&self, channel: u8) -> u32 {
        self.uvs + UV_SIZE * channel as u32
    }

    /// Byte offset of color channel `channel`.
    pub fn color_offset(&self, channel: u8) -> u32 {
        self.colors + COLOR_SIZE * channel as u32
    }

    /// Enumerate the attribute bindings of a record with `format`.
    ///
    /// The returned descriptors plus the stride are sufficient for a GPU
    /// backend to describe the interleaved vertex buffer.
    pub fn attributes(&self, format: &VertexFormat) -> Vec<VertexAttributeDescriptor> {
        let mut attributes = Vec::with_capacity(3 + format.uv_count as usize + format.color_count as usize);
        attributes.push(VertexAttributeDescriptor {
            semantic: VertexSemantic::Position,
            format: AttributeFormat::Float3,
            offset: self.position,
        });
        attributes.push(VertexAttributeDescriptor {
            semantic: VertexSemantic::Normal,
            format: AttributeFormat::Float3,
            offset: self.normal,
        });
        attributes.push(VertexAttributeDescriptor {
            semantic: VertexSemantic::Tangent,
            format: AttributeFormat::Float4,
            offset: self.tangent,
        });
        for channel in 0..format.uv_count {
            attributes.push(VertexAttributeDescriptor {
                semantic: VertexSemantic::TexCoord(channel),
                format: AttributeFormat::Float2,
                offset: self.uv_offset(channel),
            });
        }
        for channel in 0..format.color_count {
            attributes.push(VertexAttributeDescriptor {
                semantic: VertexSemantic::Color(channel),
                format: AttributeFormat::Unorm8x4,
                offset: self.color_offset(channel),
            });
        }
        attributes
    }
}

/// Semantic meaning of a vertex attribute at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    /// Vertex position (float3).
    Position,
    /// Vertex normal (float3).
    Normal,
    /// Vertex tangent (float4, w = handedness).
    Tangent,
    /// Texture coordinate set `n` (float2).
    TexCoord(u8),
    /// Packed RGBA color set `n`.
    Color(u8),
}

/// Data format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Four 8-bit unsigned integers, normalized.
    Unorm8x4,
}

impl AttributeFormat {
    /// Size of the attribute in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::Unorm8x4 => 4,
        }
    }
}

/// One attribute binding within the interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeDescriptor {
    /// Semantic meaning.
    pub semantic: VertexSemantic,
    /// Data format.
    pub format: AttributeFormat,
    /// Byte offset within the record.
    pub offset: u32,
}

/// Dispatch over the closed set of supported channel-count combinations.
///
/// Expands `$call!(UV, COLOR)` for the combination matching an already
/// validated [`VertexFormat`]. The `unreachable!` arm documents the contract:
/// formats outside the set cannot be constructed.
macro_rules! match_vertex_format {
    ($format:expr, $call:ident) => {
        match ($format.uv_count(), $format.color_count()) {
            (1, 1) => $call!(1, 1),
            (1, 2) => $call!(1, 2),
            (2, 1) => $call!(2, 1),
            (2, 2) => $call!(2, 2),
            (3, 1) => $call!(3, 1),
            (3, 2) => $call!(3, 2),
            (4, 1) => $call!(4, 1),
            (4, 2) => $call!(4, 2),
            (5, 1) => $call!(5, 1),
            (5, 2) => $call!(5, 2),
            (6, 1) => $call!(6, 1),
            (6, 2) => $call!(6, 2),
            (7, 1) => $call!(7, 1),
            (7, 2) => $call!(7, 2),
            (8, 1) => $call!(8, 1),
            (8, 2) => $call!(8, 2),
            _ => unreachable!("vertex format outside the supported set"),
        }
    };
}

pub(crate) use match_vertex_format;
