//! Per-format vertex allocation.
//!
//! A factory owns the allocation arena for vertex records of one format and
//! hands out opaque [`VertexHandle`]s instead of raw pointers: deleting a
//! vertex invalidates its handle through the arena's generation counter, so
//! use-after-delete is observable instead of undefined. One monomorphized
//! factory exists per distinct format in the supported set; call sites only
//! see the erased [`VertexFactory`] trait.

use glam::{Vec2, Vec3, Vec4};

use crate::arena::{Arena, Handle};

use super::data::VertexData;
use super::format::{match_vertex_format, VertexFormat};
use super::view::{VertexView, VertexViewMut};

/// Opaque handle to a factory-owned vertex record.
///
/// Valid until the record is deleted or the factory is dropped.
pub type VertexHandle = Handle;

/// Format-erased vertex allocator.
pub trait VertexFactory {
    /// The format this factory allocates.
    fn format(&self) -> VertexFormat;

    /// Allocate one record and initialize all fields.
    ///
    /// Missing trailing `uvs`/`colors` entries are zero-filled; excess
    /// entries are ignored. Pool growth is transparent.
    fn create_vertex(
        &mut self,
        position: Vec3,
        uvs: &[Vec2],
        tangent: Vec4,
        colors: &[u32],
        normal: Vec3,
    ) -> VertexHandle;

    /// Return the record to the pool. Stale or foreign handles are ignored
    /// (debug builds assert).
    fn delete_vertex(&mut self, handle: VertexHandle);

    /// Raw bytes of the record behind `handle`, if still live. This is what
    /// [`add_vertex_bytes`](crate::array::DisplayArray::add_vertex_bytes)
    /// copies from.
    fn vertex_bytes(&self, handle: VertexHandle) -> Option<&[u8]>;

    /// Mutable raw bytes of the record behind `handle`, if still live.
    fn vertex_bytes_mut(&mut self, handle: VertexHandle) -> Option<&mut [u8]>;

    /// Number of live records.
    fn len(&self) -> usize;

    /// Check whether the factory holds no live records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Format-erased view of the record behind `handle`.
    fn vertex(&self, handle: VertexHandle) -> Option<VertexView<'_>> {
        let format = self.format();
        self.vertex_bytes(handle)
            .map(|bytes| VertexView::new(bytes, format))
    }

    /// Format-erased mutable view of the record behind `handle`.
    fn vertex_mut(&mut self, handle: VertexHandle) -> Option<VertexViewMut<'_>> {
        let format = self.format();
        self.vertex_bytes_mut(handle)
            .map(|bytes| VertexViewMut::new(bytes, format))
    }
}

/// Arena-backed factory for one concrete record shape.
pub struct PooledVertexFactory<const UV: usize, const COL: usize> {
    pool: Arena<VertexData<UV, COL>>,
}

impl<const UV: usize, const COL: usize> PooledVertexFactory<UV, COL> {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self { pool: Arena::new() }
    }
}

impl<const UV: usize, const COL: usize> Default for PooledVertexFactory<UV, COL> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const UV: usize, const COL: usize> VertexFactory for PooledVertexFactory<UV, COL> {
    fn format(&self) -> VertexFormat {
        VertexData::<UV, COL>::format()
    }

    fn create_vertex(
        &mut self,
        position: Vec3,
        uvs: &[Vec2],
        tangent: Vec4,
        colors: &[u32],
        normal: Vec3,
    ) -> VertexHandle {
        self.pool
            .insert(VertexData::new(position, uvs, tangent, colors, normal))
    }

    fn delete_vertex(&mut self, handle: VertexHandle) {
        let removed = self.pool.remove(handle);
        debug_assert!(removed.is_some(), "deleting a stale vertex handle");
    }

    fn vertex_bytes(&self, handle: VertexHandle) -> Option<&[u8]> {
        self.pool.get(handle).map(bytemuck::bytes_of)
    }

    fn vertex_bytes_mut(&mut self, handle: VertexHandle) -> Option<&mut [u8]> {
        self.pool.get_mut(handle).map(bytemuck::bytes_of_mut)
    }

    fn len(&self) -> usize {
        self.pool.len()
    }
}

/// Construct the factory matching `format`.
///
/// `format` is already validated against the supported set, so selection
/// cannot fail.
pub fn vertex_factory(format: VertexFormat) -> Box<dyn VertexFactory> {
    macro_rules! make {
        ($uv:literal, $col:literal) => {
            Box::new(PooledVertexFactory::<$uv, $col>::new()) as Box<dyn VertexFactory>
        };
    }
    match_vertex_format!(format, make)
}
