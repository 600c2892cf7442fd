//! Format-erased vertex accessors.
//!
//! A view binds one record's bytes to a [`VertexFormat`] and addresses fields
//! through the derived byte offsets, so deformers, copy routines and equality
//! checks can work on any record shape through one non-generic type.
//!
//! Channel indices are a caller contract: these accessors run per vertex per
//! frame, so out-of-range channels are `debug_assert!`ed rather than
//! `Result`ed. Reads use unaligned loads and are valid over any byte source
//! of the right length.

use glam::{Vec2, Vec3, Vec4};

use crate::math::{almost_eq_v2, almost_eq_v3, almost_eq_v4, VERTEX_EPSILON};

use super::format::{VertexFormat, VertexMemoryFormat, NORMAL_OFFSET, POSITION_OFFSET, TANGENT_OFFSET};

#[inline]
fn read<T: bytemuck::Pod>(bytes: &[u8], offset: u32) -> T {
    let offset = offset as usize;
    bytemuck::pod_read_unaligned(&bytes[offset..offset + std::mem::size_of::<T>()])
}

#[inline]
fn write<T: bytemuck::Pod>(bytes: &mut [u8], offset: u32, value: &T) {
    let offset = offset as usize;
    bytes[offset..offset + std::mem::size_of::<T>()].copy_from_slice(bytemuck::bytes_of(value));
}

/// Read-only view of one vertex record.
#[derive(Debug, Clone, Copy)]
pub struct VertexView<'a> {
    bytes: &'a [u8],
    format: VertexFormat,
    memory_format: VertexMemoryFormat,
}

impl<'a> VertexView<'a> {
    /// Bind `bytes` (exactly one record) to `format`.
    pub fn new(bytes: &'a [u8], format: VertexFormat) -> Self {
        let memory_format = format.memory_format();
        debug_assert_eq!(bytes.len(), memory_format.stride as usize);
        Self {
            bytes,
            format,
            memory_format,
        }
    }

    /// The format this view is bound to.
    pub fn format(&self) -> VertexFormat {
        self.format
    }

    /// Raw record bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Object-space position.
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(read(self.bytes, POSITION_OFFSET))
    }

    /// Object-space normal.
    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(read(self.bytes, NORMAL_OFFSET))
    }

    /// Tangent with handedness in w.
    pub fn tangent(&self) -> Vec4 {
        Vec4::from_array(read(self.bytes, TANGENT_OFFSET))
    }

    /// UV channel `channel`. Caller guarantees `channel < format.uv_count()`.
    pub fn uv(&self, channel: u8) -> Vec2 {
        debug_assert!(channel < self.format.uv_count());
        Vec2::from_array(read(self.bytes, self.memory_format.uv_offset(channel)))
    }

    /// Packed RGBA color channel `channel`. Caller guarantees
    /// `channel < format.color_count()`.
    pub fn color(&self, channel: u8) -> u32 {
        debug_assert!(channel < self.format.color_count());
        read(self.bytes, self.memory_format.color_offset(channel))
    }

    /// Welding equality: all UV channels within tolerance, colors exact,
    /// normal and tangent within tolerance. Position does not participate,
    /// so co-located vertices differing only by position noise merge.
    ///
    /// Both views must share a format.
    pub fn matches(&self, other: &VertexView<'_>) -> bool {
        debug_assert_eq!(self.format, other.format);
        for channel in 0..self.format.uv_count() {
            if !almost_eq_v2(self.uv(channel), other.uv(channel), VERTEX_EPSILON) {
                return false;
            }
        }
        for channel in 0..self.format.color_count() {
            if self.color(channel) != other.color(channel) {
                return false;
            }
        }
        almost_eq_v3(self.normal(), other.normal(), VERTEX_EPSILON)
            && almost_eq_v4(self.tangent(), other.tangent(), VERTEX_EPSILON)
    }
}

/// Mutable view of one vertex record.
#[derive(Debug)]
pub struct VertexViewMut<'a> {
    bytes: &'a mut [u8],
    format: VertexFormat,
    memory_format: VertexMemoryFormat,
}

impl<'a> VertexViewMut<'a> {
    /// Bind `bytes` (exactly one record) to `format`.
    pub fn new(bytes: &'a mut [u8], format: VertexFormat) -> Self {
        let memory_format = format.memory_format();
        debug_assert_eq!(bytes.len(), memory_format.stride as usize);
        Self {
            bytes,
            format,
            memory_format,
        }
    }

    /// Reborrow as a read-only view.
    pub fn as_view(&self) -> VertexView<'_> {
        VertexView {
            bytes: self.bytes,
            format: self.format,
            memory_format: self.memory_format,
        }
    }

    /// Object-space position.
    pub fn position(&self) -> Vec3 {
        self.as_view().position()
    }

    /// Object-space normal.
    pub fn normal(&self) -> Vec3 {
        self.as_view().normal()
    }

    /// Tangent with handedness in w.
    pub fn tangent(&self) -> Vec4 {
        self.as_view().tangent()
    }

    /// UV channel `channel`.
    pub fn uv(&self, channel: u8) -> Vec2 {
        self.as_view().uv(channel)
    }

    /// Packed RGBA color channel `channel`.
    pub fn color(&self, channel: u8) -> u32 {
        self.as_view().color(channel)
    }

    /// Overwrite the position.
    pub fn set_position(&mut self, position: Vec3) {
        write(self.bytes, POSITION_OFFSET, &position.to_array());
    }

    /// Overwrite the normal.
    pub fn set_normal(&mut self, normal: Vec3) {
        write(self.bytes, NORMAL_OFFSET, &normal.to_array());
    }

    /// Overwrite the tangent.
    pub fn set_tangent(&mut self, tangent: Vec4) {
        write(self.bytes, TANGENT_OFFSET, &tangent.to_array());
    }

    /// Overwrite UV channel `channel`. Caller guarantees the channel exists.
    pub fn set_uv(&mut self, channel: u8, uv: Vec2) {
        debug_assert!(channel < self.format.uv_count());
        write(
            self.bytes,
            self.memory_format.uv_offset(channel),
            &uv.to_array(),
        );
    }

    /// Overwrite color channel `channel`. Caller guarantees the channel exists.
    pub fn set_color(&mut self, channel: u8, color: u32) {
        debug_assert!(channel < self.format.color_count());
        write(self.bytes, self.memory_format.color_offset(channel), &color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::data::VertexData;

    fn sample() -> VertexData<2, 1> {
        VertexData::new(
            Vec3::new(1.0, 2.0, 3.0),
            &[Vec2::new(0.1, 0.2), Vec2::new(0.3, 0.4)],
            Vec4::new(1.0, 0.0, 0.0, -1.0),
            &[0x11223344],
            Vec3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_view_reads_fields() {
        let data = sample();
        let format = VertexData::<2, 1>::format();
        let view = VertexView::new(bytemuck::bytes_of(&data), format);

        assert_eq!(view.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(view.normal(), Vec3::Y);
        assert_eq!(view.tangent(), Vec4::new(1.0, 0.0, 0.0, -1.0));
        assert_eq!(view.uv(0), Vec2::new(0.1, 0.2));
        assert_eq!(view.uv(1), Vec2::new(0.3, 0.4));
        assert_eq!(view.color(0), 0x11223344);
    }

    #[test]
    fn test_mut_view_writes_fields() {
        let mut data = sample();
        let format = VertexData::<2, 1>::format();
        {
            let mut view = VertexViewMut::new(bytemuck::bytes_of_mut(&mut data), format);
            view.set_position(Vec3::splat(9.0));
            view.set_normal(Vec3::Z);
            view.set_uv(1, Vec2::new(0.9, 0.8));
            view.set_color(0, 0xffffffff);
        }
        assert_eq!(data.position, [9.0, 9.0, 9.0]);
        assert_eq!(data.normal, [0.0, 0.0, 1.0]);
        assert_eq!(data.uvs[1], [0.9, 0.8]);
        assert_eq!(data.colors[0], 0xffffffff);
    }

    #[test]
    fn test_matches_ignores_position() {
        let a = sample();
        let mut b = sample();
        b.position = [100.0, 100.0, 100.0];

        let format = VertexData::<2, 1>::format();
        let va = VertexView::new(bytemuck::bytes_of(&a), format);
        let vb = VertexView::new(bytemuck::bytes_of(&b), format);
        assert!(va.matches(&vb));
    }

    #[test]
    fn test_matches_tolerates_float_noise() {
        let a = sample();
        let mut b = sample();
        b.uvs[0][0] += 1.0e-8;
        b.normal[1] += 1.0e-8;

        let format = VertexData::<2, 1>::format();
        let va = VertexView::new(bytemuck::bytes_of(&a), format);
        let vb = VertexView::new(bytemuck::bytes_of(&b), format);
        assert!(va.matches(&vb));
    }

    #[test]
    fn test_matches_rejects_color_and_uv_differences() {
        let format = VertexData::<2, 1>::format();
        let a = sample();

        let mut b = sample();
        b.colors[0] ^= 1;
        assert!(!VertexView::new(bytemuck::bytes_of(&a), format)
            .matches(&VertexView::new(bytemuck::bytes_of(&b), format)));

        let mut c = sample();
        c.uvs[1][0] += 0.5;
        assert!(!VertexView::new(bytemuck::bytes_of(&a), format)
            .matches(&VertexView::new(bytemuck::bytes_of(&c), format)));
    }
}
