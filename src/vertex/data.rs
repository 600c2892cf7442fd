//! The concrete vertex record.
//!
//! [`VertexData`] is the unit of storage of a display array: a `repr(C)`
//! aggregate of the fixed fields (position, normal, tangent) followed by the
//! format-dependent trailing UV and color arrays. Every field is 4-byte
//! aligned, so the struct has no padding for any supported channel count and
//! can be treated as plain bytes for GPU upload and format-erased access.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

use super::format::{VertexFormat, VertexMemoryFormat};

/// A vertex record with `UV` texture-coordinate channels and `COL` packed
/// RGBA color channels.
///
/// The layout matches [`VertexMemoryFormat::from_format`] exactly; that
/// parity is what allows the format-erased views to address fields by byte
/// offset.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct VertexData<const UV: usize, const COL: usize> {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Tangent; w holds the bitangent handedness.
    pub tangent: [f32; 4],
    /// Texture coordinates, one entry per UV channel.
    pub uvs: [[f32; 2]; UV],
    /// Packed RGBA colors, one entry per color channel.
    pub colors: [u32; COL],
}

// All fields are f32/u32 arrays: no padding, any bit pattern is valid.
unsafe impl<const UV: usize, const COL: usize> Zeroable for VertexData<UV, COL> {}
unsafe impl<const UV: usize, const COL: usize> Pod for VertexData<UV, COL> {}

impl<const UV: usize, const COL: usize> VertexData<UV, COL> {
    /// Build a record from attribute values.
    ///
    /// Missing trailing `uvs`/`colors` entries are zero-filled; excess
    /// entries are ignored.
    pub fn new(position: Vec3, uvs: &[Vec2], tangent: Vec4, colors: &[u32], normal: Vec3) -> Self {
        let mut data = Self::zeroed();
        data.position = position.to_array();
        data.normal = normal.to_array();
        data.tangent = tangent.to_array();
        for (dst, src) in data.uvs.iter_mut().zip(uvs) {
            *dst = src.to_array();
        }
        for (dst, src) in data.colors.iter_mut().zip(colors) {
            *dst = *src;
        }
        data
    }

    /// The format value matching this monomorphization.
    pub fn format() -> VertexFormat {
        match VertexFormat::new(UV as u8, COL as u8) {
            Ok(format) => format,
            // The closed set is enforced at the construction boundary; no
            // container or factory is ever instantiated outside it.
            Err(_) => unreachable!("vertex record instantiated outside the supported format set"),
        }
    }

    /// The byte layout of this record type.
    pub fn memory_format() -> VertexMemoryFormat {
        Self::format().memory_format()
    }
}

impl<const UV: usize, const COL: usize> Default for VertexData<UV, COL> {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    fn offset_of<T, const UV: usize, const COL: usize>(
        base: &VertexData<UV, COL>,
        field: &T,
    ) -> u32 {
        (field as *const T as usize - base as *const _ as usize) as u32
    }

    // Layout parity between the Rust struct and the derived byte offsets,
    // across representative corners of the supported set.
    macro_rules! check_layout {
        ($uv:literal, $col:literal) => {{
            let mem_format = VertexData::<$uv, $col>::memory_format();
            assert_eq!(
                mem::size_of::<VertexData<$uv, $col>>() as u32,
                mem_format.stride
            );
            let v = VertexData::<$uv, $col>::default();
            assert_eq!(offset_of(&v, &v.position), mem_format.position);
            assert_eq!(offset_of(&v, &v.normal), mem_format.normal);
            assert_eq!(offset_of(&v, &v.tangent), mem_format.tangent);
            assert_eq!(offset_of(&v, &v.uvs), mem_format.uvs);
            assert_eq!(offset_of(&v, &v.colors), mem_format.colors);
        }};
    }

    #[test]
    fn test_layout_matches_memory_format() {
        check_layout!(1, 1);
        check_layout!(1, 2);
        check_layout!(4, 1);
        check_layout!(8, 2);
    }

    #[test]
    fn test_new_fills_channels() {
        let v = VertexData::<2, 2>::new(
            Vec3::new(1.0, 2.0, 3.0),
            &[Vec2::new(0.25, 0.75)],
            Vec4::new(1.0, 0.0, 0.0, 1.0),
            &[0xff00ff00],
            Vec3::Z,
        );

        assert_eq!(v.position, [1.0, 2.0, 3.0]);
        assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        assert_eq!(v.uvs[0], [0.25, 0.75]);
        // Missing second channel zero-filled.
        assert_eq!(v.uvs[1], [0.0, 0.0]);
        assert_eq!(v.colors, [0xff00ff00, 0]);
    }

    #[test]
    fn test_new_ignores_excess_channels() {
        let v = VertexData::<1, 1>::new(
            Vec3::ZERO,
            &[Vec2::X, Vec2::Y, Vec2::ONE],
            Vec4::ZERO,
            &[1, 2, 3],
            Vec3::Y,
        );
        assert_eq!(v.uvs.len(), 1);
        assert_eq!(v.uvs[0], [1.0, 0.0]);
        assert_eq!(v.colors, [1]);
    }

    #[test]
    fn test_cast_to_bytes_round_trip() {
        let v = VertexData::<1, 1>::new(
            Vec3::new(1.0, 2.0, 3.0),
            &[Vec2::new(0.5, 0.5)],
            Vec4::W,
            &[0xdeadbeef],
            Vec3::X,
        );
        let bytes = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 52); // 40 + 8 + 4
        let back: VertexData<1, 1> = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, v);
    }
}
