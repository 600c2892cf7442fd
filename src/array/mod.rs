//! Display arrays: per-material containers of vertex and index data.
//!
//! A display array owns one contiguous buffer of vertex records of a single
//! concrete format, the index sequences that reference it, and per-vertex
//! metadata. One [`TypedDisplayArray`] monomorphization exists per supported
//! format; everything past construction goes through the format-erased
//! [`DisplayArray`] trait, so deformers, builders and the storage layer never
//! template on vertex layout.
//!
//! # Building vs. cached state
//!
//! Random access through [`DisplayArray::vertex`] goes through an offset
//! cache rebuilt by [`DisplayArray::update_cache`]. Any size-changing
//! mutation invalidates the cache and sets [`ModifiedFlags::SIZE`]; callers
//! must re-run `update_cache` before relying on the cached path again. The
//! `*_no_cache` accessors index the live buffer directly and are always
//! valid. Violations of the cached-path contract are debug assertions, not
//! recoverable errors: these accessors run per vertex per frame.

use glam::{Affine3A, Vec3};

use bitflags::bitflags;

use crate::error::GeometryError;
use crate::storage::{DisplayArrayStorage, UploadKind};
use crate::update::{ChangeClient, ChangeTracker, ModifiedFlags};
use crate::vertex::data::VertexData;
use crate::vertex::factory::{VertexFactory, VertexHandle};
use crate::vertex::format::{match_vertex_format, VertexFormat, VertexMemoryFormat};
use crate::vertex::view::{VertexView, VertexViewMut};

/// How primitive indices are interpreted for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    /// Every three indices form a triangle.
    #[default]
    Triangles,
    /// Every two indices form a line.
    Lines,
}

impl PrimitiveType {
    /// Number of vertices per primitive.
    pub fn vertices_per_primitive(&self) -> usize {
        match self {
            Self::Triangles => 3,
            Self::Lines => 2,
        }
    }
}

bitflags! {
    /// Per-vertex metadata flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertexFlag: u8 {
        /// The original index was remapped to a soft-body node slot.
        const SOFT_BODY_INDEX = 1 << 0;
    }
}

/// Per-vertex metadata kept outside the render buffer.
///
/// Lives in a sequence parallel to the vertex buffer (same length, always).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInfo {
    /// Index of the source-mesh vertex this live vertex was derived from.
    /// Deformers map it to simulation nodes.
    pub orig_index: u32,
    /// Metadata flags.
    pub flags: VertexFlag,
}

impl VertexInfo {
    /// Info with the given original index and no flags.
    pub fn new(orig_index: u32) -> Self {
        Self {
            orig_index,
            flags: VertexFlag::empty(),
        }
    }

    /// Set metadata flags.
    pub fn with_flags(mut self, flags: VertexFlag) -> Self {
        self.flags = flags;
        self
    }
}

/// Format-independent state shared by every display array variant.
///
/// The concrete [`TypedDisplayArray`] owns the vertex buffer; everything
/// else lives here and is reached through [`DisplayArray::common`].
#[derive(Debug)]
pub struct ArrayData {
    primitive: PrimitiveType,
    format: VertexFormat,
    memory_format: VertexMemoryFormat,
    vertex_infos: Vec<VertexInfo>,
    primitive_indices: Vec<u32>,
    triangle_indices: Vec<u32>,
    max_orig_index: u32,
    modified: ModifiedFlags,
    tracker: ChangeTracker,
    /// Triangle centroid cache for depth sorting; dropped whenever positions
    /// or the triangle set change.
    polygon_centers: Option<Vec<Vec3>>,
    /// Byte offset of each record in the vertex buffer; the Rust rendition
    /// of the vertex-pointer cache.
    offset_cache: Vec<u32>,
    cache_valid: bool,
    storage: DisplayArrayStorage,
}

impl ArrayData {
    fn new(primitive: PrimitiveType, format: VertexFormat) -> Self {
        Self {
            primitive,
            format,
            memory_format: format.memory_format(),
            vertex_infos: Vec::new(),
            primitive_indices: Vec::new(),
            triangle_indices: Vec::new(),
            max_orig_index: 0,
            modified: ModifiedFlags::STORAGE_INVALID,
            tracker: ChangeTracker::new(),
            polygon_centers: None,
            offset_cache: Vec::new(),
            cache_valid: false,
            storage: DisplayArrayStorage::new(),
        }
    }

    /// Deep copy for replication: index and info sequences are cloned, the
    /// change tracker starts without subscribers, and the storage pairing is
    /// fresh (the replica's GPU objects do not exist yet).
    fn replicate(&self) -> Self {
        Self {
            primitive: self.primitive,
            format: self.format,
            memory_format: self.memory_format,
            vertex_infos: self.vertex_infos.clone(),
            primitive_indices: self.primitive_indices.clone(),
            triangle_indices: self.triangle_indices.clone(),
            max_orig_index: self.max_orig_index,
            modified: self.modified | ModifiedFlags::STORAGE_INVALID,
            tracker: ChangeTracker::new(),
            polygon_centers: self.polygon_centers.clone(),
            offset_cache: Vec::new(),
            cache_valid: false,
            storage: DisplayArrayStorage::new(),
        }
    }

    /// Accumulate modification flags, invalidate dependent caches and
    /// broadcast to subscribers.
    ///
    /// Position changes move existing centroids; size changes add or remove
    /// triangles. Either way the centroid cache no longer describes the
    /// current triangle set.
    fn mark(&mut self, flags: ModifiedFlags) {
        self.modified |= flags;
        if flags.intersects(ModifiedFlags::POSITION | ModifiedFlags::SIZE) {
            self.polygon_centers = None;
        }
        self.tracker.notify(flags);
    }
}

/// Format-erased interface over a display array of any supported format.
pub trait DisplayArray {
    /// Format-independent state.
    fn common(&self) -> &ArrayData;
    /// Format-independent state, mutable.
    fn common_mut(&mut self) -> &mut ArrayData;

    /// Number of vertex records.
    fn vertex_count(&self) -> usize;

    /// The whole vertex buffer as bytes, in GPU upload layout.
    fn vertex_bytes(&self) -> &[u8];

    /// The whole vertex buffer as mutable bytes.
    fn vertex_bytes_mut(&mut self) -> &mut [u8];

    /// Append one record (exactly `stride` bytes, typically obtained from a
    /// [`VertexFactory`]) and return its index. The bytes are copied; the
    /// caller still owns and must release its factory handle.
    ///
    /// Invalidates the offset cache and sets [`ModifiedFlags::SIZE`].
    fn add_vertex_bytes(&mut self, bytes: &[u8]) -> u32;

    /// Empty vertices, infos and both index sequences; reset the maximum
    /// original index. The GPU storage object stays bound but is treated as
    /// invalid until the next upload.
    fn clear(&mut self);

    /// Deep copy into a new, independently owned array. The replica's offset
    /// cache is rebuilt from its own buffer before returning; its storage
    /// starts invalid.
    fn replica(&self) -> Box<dyn DisplayArray>;

    // --- default implementations over the common state ---

    /// The vertex format.
    fn format(&self) -> VertexFormat {
        self.common().format
    }

    /// The derived byte layout of one record.
    fn memory_format(&self) -> VertexMemoryFormat {
        self.common().memory_format
    }

    /// The primitive type used for drawing.
    fn primitive_type(&self) -> PrimitiveType {
        self.common().primitive
    }

    /// Append per-vertex metadata. Tracks the maximum original index.
    fn add_vertex_info(&mut self, info: VertexInfo) {
        let data = self.common_mut();
        data.max_orig_index = data.max_orig_index.max(info.orig_index);
        data.vertex_infos.push(info);
    }

    /// Append a render index.
    fn add_primitive_index(&mut self, index: u32) {
        let data = self.common_mut();
        data.primitive_indices.push(index);
        data.mark(ModifiedFlags::SIZE);
    }

    /// Append a triangle (physics) index.
    fn add_triangle_index(&mut self, index: u32) {
        let data = self.common_mut();
        data.triangle_indices.push(index);
        data.mark(ModifiedFlags::SIZE);
    }

    /// Per-vertex metadata at `index`.
    fn vertex_info(&self, index: usize) -> VertexInfo {
        self.common().vertex_infos[index]
    }

    /// Mutable per-vertex metadata at `index`.
    fn vertex_info_mut(&mut self, index: usize) -> &mut VertexInfo {
        &mut self.common_mut().vertex_infos[index]
    }

    /// All per-vertex metadata.
    fn vertex_infos(&self) -> &[VertexInfo] {
        &self.common().vertex_infos
    }

    /// The render index sequence.
    fn primitive_indices(&self) -> &[u32] {
        &self.common().primitive_indices
    }

    /// Number of render indices.
    fn primitive_index_count(&self) -> usize {
        self.common().primitive_indices.len()
    }

    /// The triangle (physics) index sequence.
    fn triangle_indices(&self) -> &[u32] {
        &self.common().triangle_indices
    }

    /// Number of triangle indices.
    fn triangle_index_count(&self) -> usize {
        self.common().triangle_indices.len()
    }

    /// High-water mark of [`VertexInfo::orig_index`], for sizing deformer
    /// lookup tables.
    fn max_orig_index(&self) -> u32 {
        self.common().max_orig_index
    }

    /// Whether the offset cache matches the current buffer.
    fn cache_valid(&self) -> bool {
        self.common().cache_valid
    }

    /// Rebuild the offset cache. Idempotent while no size-changing mutation
    /// intervenes.
    fn update_cache(&mut self) {
        let count = self.vertex_count();
        let data = self.common_mut();
        let stride = data.memory_format.stride;
        data.offset_cache.clear();
        data.offset_cache.extend((0..count as u32).map(|i| i * stride));
        data.cache_valid = true;
    }

    /// Cached byte offsets, one per record.
    fn offset_cache(&self) -> &[u32] {
        &self.common().offset_cache
    }

    /// View of the record at `index` through the offset cache.
    ///
    /// Requires a prior [`update_cache`](Self::update_cache) after any
    /// size-changing mutation; debug builds assert this.
    fn vertex(&self, index: usize) -> VertexView<'_> {
        let data = self.common();
        debug_assert!(
            data.cache_valid,
            "stale offset cache: call update_cache() after size changes"
        );
        let offset = data.offset_cache[index] as usize;
        let stride = data.memory_format.stride as usize;
        let format = data.format;
        VertexView::new(&self.vertex_bytes()[offset..offset + stride], format)
    }

    /// Mutable view of the record at `index` through the offset cache.
    fn vertex_mut(&mut self, index: usize) -> VertexViewMut<'_> {
        let data = self.common();
        debug_assert!(
            data.cache_valid,
            "stale offset cache: call update_cache() after size changes"
        );
        let offset = data.offset_cache[index] as usize;
        let stride = data.memory_format.stride as usize;
        let format = data.format;
        VertexViewMut::new(&mut self.vertex_bytes_mut()[offset..offset + stride], format)
    }

    /// View of the record at `index`, bypassing the cache. Always valid;
    /// used during construction.
    fn vertex_no_cache(&self, index: usize) -> VertexView<'_> {
        debug_assert!(index < self.vertex_count());
        let stride = self.common().memory_format.stride as usize;
        let format = self.common().format;
        let offset = index * stride;
        VertexView::new(&self.vertex_bytes()[offset..offset + stride], format)
    }

    /// Mutable view of the record at `index`, bypassing the cache.
    fn vertex_no_cache_mut(&mut self, index: usize) -> VertexViewMut<'_> {
        debug_assert!(index < self.vertex_count());
        let stride = self.common().memory_format.stride as usize;
        let format = self.common().format;
        let offset = index * stride;
        VertexViewMut::new(&mut self.vertex_bytes_mut()[offset..offset + stride], format)
    }

    /// Accumulate modification flags and broadcast them to subscribers.
    /// Position and size changes drop the polygon-center cache.
    fn notify_modified(&mut self, flags: ModifiedFlags) {
        self.common_mut().mark(flags);
    }

    /// Flags accumulated since the last [`take_modified`](Self::take_modified).
    fn modified(&self) -> ModifiedFlags {
        self.common().modified
    }

    /// Drain the accumulated modification flags.
    fn take_modified(&mut self) -> ModifiedFlags {
        std::mem::replace(&mut self.common_mut().modified, ModifiedFlags::empty())
    }

    /// Subscribe a consumer to this array's modifications.
    fn subscribe(&mut self) -> ChangeClient {
        self.common_mut().tracker.subscribe()
    }

    /// The paired GPU storage stub.
    fn storage(&self) -> &DisplayArrayStorage {
        &self.common().storage
    }

    /// Drain accumulated flags and hand them to the paired storage,
    /// returning the upload decision taken.
    fn flush_storage(&mut self) -> UploadKind {
        let vertex_count = self.vertex_count();
        let index_count = self.primitive_index_count();
        let data = self.common_mut();
        let flags = std::mem::replace(&mut data.modified, ModifiedFlags::empty());
        let stride = data.memory_format.stride;
        data.storage.upload(flags, vertex_count, index_count, stride)
    }

    /// Copy the attribute categories selected by `mask` from `other` into
    /// this array's existing records, index for index.
    ///
    /// Different formats are allowed; UV and color channels are copied up to
    /// the smaller of the two counts. `SIZE`/`STORAGE_INVALID` bits in the
    /// mask select nothing here (a size change means full re-upload, decided
    /// at the storage layer). The copied categories are marked modified.
    fn update_from(
        &mut self,
        other: &dyn DisplayArray,
        mask: ModifiedFlags,
    ) -> Result<(), GeometryError> {
        let count = self.vertex_count();
        if count != other.vertex_count() {
            return Err(GeometryError::VertexCountMismatch {
                destination: count,
                source_count: other.vertex_count(),
            });
        }
        let mask = mask & ModifiedFlags::MESH;
        if mask.is_empty() {
            return Ok(());
        }

        let uv_count = self.format().uv_count().min(other.format().uv_count());
        let color_count = self.format().color_count().min(other.format().color_count());

        for index in 0..count {
            let src = other.vertex_no_cache(index);
            let position = src.position();
            let normal = src.normal();
            let tangent = src.tangent();
            let mut dst = self.vertex_no_cache_mut(index);
            if mask.contains(ModifiedFlags::POSITION) {
                dst.set_position(position);
            }
            if mask.contains(ModifiedFlags::NORMAL) {
                dst.set_normal(normal);
            }
            if mask.contains(ModifiedFlags::TANGENT) {
                dst.set_tangent(tangent);
            }
            if mask.contains(ModifiedFlags::UVS) {
                for channel in 0..uv_count {
                    let uv = src.uv(channel);
                    dst.set_uv(channel, uv);
                }
            }
            if mask.contains(ModifiedFlags::COLORS) {
                for channel in 0..color_count {
                    let color = src.color(channel);
                    dst.set_color(channel, color);
                }
            }
        }

        self.notify_modified(mask);
        Ok(())
    }

    /// Drop the triangle centroid cache. Called implicitly when positions
    /// are marked modified.
    fn invalidate_polygon_centers(&mut self) {
        self.common_mut().polygon_centers = None;
    }

    /// Reorder the render indices back to front for alpha blending.
    ///
    /// `view` transforms positions into view space (camera looking down
    /// `-Z`); primitives are emitted in ascending view-space depth, farthest
    /// first. Centroids are cached across calls and recomputed only after a
    /// position change. `index_map`, when given, remaps every emitted vertex
    /// index (used when a consumer has merged or reordered vertex storage).
    ///
    /// Only triangle arrays are sorted; lines have no facing order.
    fn sort_polygons(&mut self, view: &Affine3A, index_map: Option<&[u32]>) {
        if self.primitive_type() != PrimitiveType::Triangles {
            return;
        }
        let triangle_count = self.primitive_index_count() / 3;
        if triangle_count == 0 {
            return;
        }

        if self.common().polygon_centers.is_none() {
            let mut centers = Vec::with_capacity(triangle_count);
            for triangle in 0..triangle_count {
                let data = self.common();
                let a = data.primitive_indices[triangle * 3] as usize;
                let b = data.primitive_indices[triangle * 3 + 1] as usize;
                let c = data.primitive_indices[triangle * 3 + 2] as usize;
                let center = (self.vertex_no_cache(a).position()
                    + self.vertex_no_cache(b).position()
                    + self.vertex_no_cache(c).position())
                    / 3.0;
                centers.push(center);
            }
            self.common_mut().polygon_centers = Some(centers);
        }

        let depths: Vec<f32> = match self.common().polygon_centers.as_ref() {
            Some(centers) => centers
                .iter()
                .map(|center| view.transform_point3(*center).z)
                .collect(),
            None => return,
        };

        let mut order: Vec<usize> = (0..triangle_count).collect();
        order.sort_by(|a, b| depths[*a].total_cmp(&depths[*b]));

        let data = self.common_mut();
        let old_indices = std::mem::take(&mut data.primitive_indices);
        let old_centers = data.polygon_centers.take().unwrap_or_default();
        let mut new_indices = Vec::with_capacity(old_indices.len());
        let mut new_centers = Vec::with_capacity(old_centers.len());
        for triangle in order {
            for k in 0..3 {
                let index = old_indices[triangle * 3 + k];
                new_indices.push(match index_map {
                    Some(map) => map[index as usize],
                    None => index,
                });
            }
            new_centers.push(old_centers[triangle]);
        }
        data.primitive_indices = new_indices;
        data.polygon_centers = Some(new_centers);
    }
}

/// The concrete display array for one record shape.
pub struct TypedDisplayArray<const UV: usize, const COL: usize> {
    data: ArrayData,
    vertices: Vec<VertexData<UV, COL>>,
}

impl<const UV: usize, const COL: usize> TypedDisplayArray<UV, COL> {
    /// Create an empty array.
    pub fn new(primitive: PrimitiveType) -> Self {
        Self {
            data: ArrayData::new(primitive, VertexData::<UV, COL>::format()),
            vertices: Vec::new(),
        }
    }

    /// The typed vertex records.
    pub fn vertices(&self) -> &[VertexData<UV, COL>] {
        &self.vertices
    }

    /// Append a typed record, returning its index.
    pub fn push_vertex(&mut self, vertex: VertexData<UV, COL>) -> u32 {
        self.vertices.push(vertex);
        self.data.cache_valid = false;
        self.data.mark(ModifiedFlags::SIZE);
        (self.vertices.len() - 1) as u32
    }
}

impl<const UV: usize, const COL: usize> DisplayArray for TypedDisplayArray<UV, COL> {
    fn common(&self) -> &ArrayData {
        &self.data
    }

    fn common_mut(&mut self) -> &mut ArrayData {
        &mut self.data
    }

    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    fn vertex_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.vertices)
    }

    fn add_vertex_bytes(&mut self, bytes: &[u8]) -> u32 {
        debug_assert_eq!(bytes.len(), self.data.memory_format.stride as usize);
        self.push_vertex(bytemuck::pod_read_unaligned(bytes))
    }

    fn clear(&mut self) {
        self.vertices.clear();
        let data = &mut self.data;
        data.vertex_infos.clear();
        data.primitive_indices.clear();
        data.triangle_indices.clear();
        data.max_orig_index = 0;
        data.offset_cache.clear();
        data.cache_valid = false;
        data.polygon_centers = None;
        data.mark(ModifiedFlags::SIZE);
    }

    fn replica(&self) -> Box<dyn DisplayArray> {
        let mut replica = Self {
            data: self.data.replicate(),
            vertices: self.vertices.clone(),
        };
        replica.update_cache();
        Box::new(replica)
    }
}

/// Construct an empty display array for `format`.
///
/// `format` is already validated against the supported set, so selection
/// cannot fail.
pub fn display_array(primitive: PrimitiveType, format: VertexFormat) -> Box<dyn DisplayArray> {
    macro_rules! make {
        ($uv:literal, $col:literal) => {
            Box::new(TypedDisplayArray::<$uv, $col>::new(primitive)) as Box<dyn DisplayArray>
        };
    }
    match_vertex_format!(format, make)
}

/// Bulk constructor: build a display array from factory-owned records plus
/// complete info and index sequences, leaving it cache-valid.
///
/// The caller still owns the factory handles. The sequences must satisfy the
/// array invariants (`infos` parallel to `handles`, indices in range); debug
/// builds assert them.
pub fn display_array_from_parts(
    primitive: PrimitiveType,
    factory: &dyn VertexFactory,
    handles: &[VertexHandle],
    vertex_infos: Vec<VertexInfo>,
    primitive_indices: Vec<u32>,
    triangle_indices: Vec<u32>,
) -> Box<dyn DisplayArray> {
    debug_assert_eq!(handles.len(), vertex_infos.len());
    let mut array = display_array(primitive, factory.format());
    for handle in handles {
        match factory.vertex_bytes(*handle) {
            Some(bytes) => {
                array.add_vertex_bytes(bytes);
            }
            None => debug_assert!(false, "stale vertex handle in bulk constructor"),
        }
    }
    for info in vertex_infos {
        array.add_vertex_info(info);
    }
    for index in primitive_indices {
        debug_assert!((index as usize) < array.vertex_count());
        array.add_primitive_index(index);
    }
    for index in triangle_indices {
        debug_assert!((index as usize) < array.vertex_count());
        array.add_triangle_index(index);
    }
    array.update_cache();
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::factory::vertex_factory;
    use glam::{Vec2, Vec4};

    fn format_1_1() -> VertexFormat {
        VertexFormat::new(1, 1).unwrap()
    }

    fn triangle_array(positions: &[Vec3]) -> Box<dyn DisplayArray> {
        let mut factory = vertex_factory(format_1_1());
        let mut array = display_array(PrimitiveType::Triangles, format_1_1());
        for (i, position) in positions.iter().enumerate() {
            let handle = factory.create_vertex(
                *position,
                &[Vec2::new(i as f32, 0.0)],
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                &[0xff000000 | i as u32],
                Vec3::Z,
            );
            let bytes = factory.vertex_bytes(handle).unwrap();
            array.add_vertex_bytes(bytes);
            array.add_vertex_info(VertexInfo::new(i as u32));
            factory.delete_vertex(handle);
        }
        array
    }

    #[test]
    fn test_incremental_build_counts() {
        let mut array = triangle_array(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
        for i in 0..3 {
            array.add_primitive_index(i);
            array.add_triangle_index(i);
        }

        assert_eq!(array.vertex_count(), 3);
        assert_eq!(array.vertex_infos().len(), 3);
        assert_eq!(array.primitive_index_count(), 3);
        assert_eq!(array.triangle_index_count(), 3);
        assert_eq!(
            array.vertex_bytes().len(),
            3 * format_1_1().memory_format().stride as usize
        );
    }

    #[test]
    fn test_max_orig_index_high_water_mark() {
        let mut array = display_array(PrimitiveType::Triangles, format_1_1());
        array.add_vertex_info(VertexInfo::new(5));
        assert_eq!(array.max_orig_index(), 5);
        array.add_vertex_info(VertexInfo::new(2));
        assert_eq!(array.max_orig_index(), 5);
    }

    #[test]
    fn test_cache_invalidation_on_add() {
        let mut array = triangle_array(&[Vec3::ZERO, Vec3::X]);
        assert!(!array.cache_valid());

        array.update_cache();
        assert!(array.cache_valid());
        assert_eq!(array.vertex(1).position(), Vec3::X);

        // Size change drops validity and raises SIZE.
        let mut factory = vertex_factory(format_1_1());
        let handle = factory.create_vertex(Vec3::Y, &[Vec2::ZERO], Vec4::ZERO, &[0], Vec3::Z);
        array.take_modified();
        array.add_vertex_bytes(factory.vertex_bytes(handle).unwrap());
        assert!(!array.cache_valid());
        assert!(array.modified().contains(ModifiedFlags::SIZE));
    }

    #[test]
    fn test_update_cache_idempotent() {
        let mut array = triangle_array(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
        array.update_cache();
        let first: Vec<u32> = array.offset_cache().to_vec();
        array.update_cache();
        assert_eq!(array.offset_cache(), first.as_slice());
    }

    #[test]
    fn test_no_cache_accessor_always_valid() {
        let array = triangle_array(&[Vec3::ZERO, Vec3::new(4.0, 5.0, 6.0)]);
        assert!(!array.cache_valid());
        assert_eq!(array.vertex_no_cache(1).position(), Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_clear_resets_everything_but_storage() {
        let mut array = triangle_array(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
        for i in 0..3 {
            array.add_primitive_index(i);
            array.add_triangle_index(i);
        }
        array.flush_storage();
        assert!(array.storage().exists());

        array.clear();
        assert_eq!(array.vertex_count(), 0);
        assert_eq!(array.vertex_infos().len(), 0);
        assert_eq!(array.primitive_index_count(), 0);
        assert_eq!(array.triangle_index_count(), 0);
        assert_eq!(array.max_orig_index(), 0);
        // Storage stays bound; SIZE forces the next upload to be full.
        assert!(array.storage().exists());
        assert!(array.modified().contains(ModifiedFlags::SIZE));
    }

    #[test]
    fn test_replica_is_deep_copy() {
        let mut array = triangle_array(&[Vec3::ZERO, Vec3::X, Vec3::Y]);
        for i in 0..3 {
            array.add_primitive_index(i);
            array.add_triangle_index(i);
        }
        array.update_cache();

        let mut replica = array.replica();
        assert!(replica.cache_valid());
        assert_eq!(replica.vertex_count(), 3);
        assert_eq!(replica.primitive_indices(), array.primitive_indices());
        for i in 0..3 {
            assert!(replica.vertex(i).matches(&array.vertex(i)));
            assert_eq!(replica.vertex(i).position(), array.vertex(i).position());
        }

        // Mutating the replica leaves the original untouched.
        replica.vertex_mut(0).set_position(Vec3::splat(9.0));
        assert_eq!(replica.vertex(0).position(), Vec3::splat(9.0));
        assert_eq!(array.vertex(0).position(), Vec3::ZERO);
    }

    #[test]
    fn test_update_from_position_only() {
        let mut a = triangle_array(&[Vec3::ZERO, Vec3::X]);
        let b = triangle_array(&[Vec3::new(7.0, 8.0, 9.0), Vec3::new(1.0, 1.0, 1.0)]);

        let uv_before = a.vertex_no_cache(0).uv(0);
        let color_before = a.vertex_no_cache(0).color(0);

        a.update_from(b.as_ref(), ModifiedFlags::POSITION).unwrap();

        assert_eq!(a.vertex_no_cache(0).position(), Vec3::new(7.0, 8.0, 9.0));
        assert_eq!(a.vertex_no_cache(1).position(), Vec3::new(1.0, 1.0, 1.0));
        // Untouched categories stay byte-identical.
        assert_eq!(a.vertex_no_cache(0).uv(0), uv_before);
        assert_eq!(a.vertex_no_cache(0).color(0), color_before);
        assert!(a.modified().contains(ModifiedFlags::POSITION));
    }

    #[test]
    fn test_update_from_count_mismatch_is_recoverable() {
        let mut a = triangle_array(&[Vec3::ZERO, Vec3::X]);
        let b = triangle_array(&[Vec3::ZERO]);
        assert_eq!(
            a.update_from(b.as_ref(), ModifiedFlags::POSITION),
            Err(GeometryError::VertexCountMismatch {
                destination: 2,
                source_count: 1
            })
        );
        // Destination untouched.
        assert_eq!(a.vertex_no_cache(1).position(), Vec3::X);
    }

    #[test]
    fn test_update_from_cross_format_clamps_channels() {
        let wide = VertexFormat::new(2, 2).unwrap();
        let mut factory = vertex_factory(wide);
        let mut a = display_array(PrimitiveType::Triangles, wide);
        let handle = factory.create_vertex(
            Vec3::ZERO,
            &[Vec2::ZERO, Vec2::ZERO],
            Vec4::ZERO,
            &[0, 0],
            Vec3::Z,
        );
        a.add_vertex_bytes(factory.vertex_bytes(handle).unwrap());

        let b = triangle_array(&[Vec3::ZERO]); // 1 uv / 1 color
        a.update_from(b.as_ref(), ModifiedFlags::UVS | ModifiedFlags::COLORS)
            .unwrap();

        // Channel 0 copied from the narrower source, channel 1 untouched.
        assert_eq!(a.vertex_no_cache(0).uv(0), b.vertex_no_cache(0).uv(0));
        assert_eq!(a.vertex_no_cache(0).uv(1), Vec2::ZERO);
        assert_eq!(a.vertex_no_cache(0).color(0), b.vertex_no_cache(0).color(0));
        assert_eq!(a.vertex_no_cache(0).color(1), 0);
    }

    #[test]
    fn test_sort_polygons_back_to_front() {
        // Two triangles along -Z: near at z=-5, far at z=-10. With an
        // identity view the camera looks down -Z from the origin.
        let mut array = triangle_array(&[
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(1.0, 0.0, -5.0),
            Vec3::new(0.0, 1.0, -5.0),
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::new(1.0, 0.0, -10.0),
            Vec3::new(0.0, 1.0, -10.0),
        ]);
        for i in 0..6 {
            array.add_primitive_index(i);
        }

        array.sort_polygons(&Affine3A::IDENTITY, None);

        // Far triangle (indices 3,4,5) must come first.
        assert_eq!(array.primitive_indices(), &[3, 4, 5, 0, 1, 2]);

        // Sorting again is stable against the reordered cache.
        array.sort_polygons(&Affine3A::IDENTITY, None);
        assert_eq!(array.primitive_indices(), &[3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn test_sort_polygons_applies_index_map() {
        let mut array = triangle_array(&[
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(1.0, 0.0, -5.0),
            Vec3::new(0.0, 1.0, -5.0),
        ]);
        for i in 0..3 {
            array.add_primitive_index(i);
        }
        let map = [10, 11, 12];
        array.sort_polygons(&Affine3A::IDENTITY, Some(&map));
        assert_eq!(array.primitive_indices(), &[10, 11, 12]);
    }

    #[test]
    fn test_sort_after_growth_recomputes_centers() {
        let mut array = triangle_array(&[
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(1.0, 0.0, -5.0),
            Vec3::new(0.0, 1.0, -5.0),
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::new(1.0, 0.0, -10.0),
            Vec3::new(0.0, 1.0, -10.0),
        ]);
        for i in 0..6 {
            array.add_primitive_index(i);
        }
        array.sort_polygons(&Affine3A::IDENTITY, None);
        assert_eq!(array.primitive_indices(), &[3, 4, 5, 0, 1, 2]);

        // Append a third, farthest triangle and sort again: the centroid
        // cache from the first sort covers only two triangles and must be
        // rebuilt, not reused.
        let mut factory = vertex_factory(format_1_1());
        for p in [
            Vec3::new(0.0, 0.0, -20.0),
            Vec3::new(1.0, 0.0, -20.0),
            Vec3::new(0.0, 1.0, -20.0),
        ] {
            let handle = factory.create_vertex(p, &[Vec2::ZERO], Vec4::ZERO, &[0], Vec3::Z);
            array.add_vertex_bytes(factory.vertex_bytes(handle).unwrap());
            array.add_vertex_info(VertexInfo::new(array.vertex_count() as u32 - 1));
            factory.delete_vertex(handle);
        }
        for i in 6..9 {
            array.add_primitive_index(i);
        }
        array.update_cache();

        array.sort_polygons(&Affine3A::IDENTITY, None);
        assert_eq!(array.primitive_indices(), &[6, 7, 8, 3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn test_position_change_invalidates_polygon_centers() {
        let mut array = triangle_array(&[
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::new(1.0, 0.0, -5.0),
            Vec3::new(0.0, 1.0, -5.0),
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::new(1.0, 0.0, -10.0),
            Vec3::new(0.0, 1.0, -10.0),
        ]);
        for i in 0..6 {
            array.add_primitive_index(i);
        }
        array.update_cache();
        array.sort_polygons(&Affine3A::IDENTITY, None);
        assert_eq!(array.primitive_indices(), &[3, 4, 5, 0, 1, 2]);

        // Swap the depths of the two triangles and notify; the stale center
        // cache must not survive.
        for i in 0..3 {
            let p = array.vertex(i).position();
            array.vertex_mut(i).set_position(Vec3::new(p.x, p.y, -20.0));
        }
        array.notify_modified(ModifiedFlags::POSITION);

        array.sort_polygons(&Affine3A::IDENTITY, None);
        assert_eq!(array.primitive_indices(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_bulk_constructor() {
        let mut factory = vertex_factory(format_1_1());
        let handles: Vec<_> = [Vec3::ZERO, Vec3::X, Vec3::Y]
            .iter()
            .map(|p| factory.create_vertex(*p, &[Vec2::ZERO], Vec4::ZERO, &[0], Vec3::Z))
            .collect();
        let infos = vec![VertexInfo::new(0), VertexInfo::new(1), VertexInfo::new(2)];

        let array = display_array_from_parts(
            PrimitiveType::Triangles,
            factory.as_ref(),
            &handles,
            infos,
            vec![0, 1, 2],
            vec![0, 1, 2],
        );

        assert_eq!(array.vertex_count(), 3);
        assert!(array.cache_valid());
        assert_eq!(array.vertex(1).position(), Vec3::X);
        assert_eq!(array.primitive_indices(), &[0, 1, 2]);
        assert_eq!(array.max_orig_index(), 2);

        // Caller still owns the handles.
        for handle in handles {
            assert!(factory.vertex_bytes(handle).is_some());
        }
    }

    #[test]
    fn test_lines_primitive_not_sorted() {
        let mut factory = vertex_factory(format_1_1());
        let mut array = display_array(PrimitiveType::Lines, format_1_1());
        for p in [Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, -10.0)] {
            let handle = factory.create_vertex(p, &[Vec2::ZERO], Vec4::ZERO, &[0], Vec3::Z);
            array.add_vertex_bytes(factory.vertex_bytes(handle).unwrap());
        }
        array.add_primitive_index(1);
        array.add_primitive_index(0);

        array.sort_polygons(&Affine3A::IDENTITY, None);
        assert_eq!(array.primitive_indices(), &[1, 0]);
        assert_eq!(array.primitive_type().vertices_per_primitive(), 2);
    }
}
