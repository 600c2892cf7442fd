//! Incremental mesh construction.
//!
//! A [`MeshBuilder`] accumulates vertices and indices per material slot,
//! assigns every vertex an original index from one counter shared across all
//! slots (so deformers built on the finished mesh see a single original-index
//! space), validates the result and converts it into display arrays.
//!
//! Vertices live in a per-slot [`VertexFactory`] while building, so they can
//! still be removed or rewritten cheaply; the conversion into contiguous
//! array storage happens once, in [`MeshBuilder::build`].

use glam::{Vec2, Vec3, Vec4};

use crate::array::{
    display_array_from_parts, DisplayArray, PrimitiveType, VertexInfo,
};
use crate::error::GeometryError;
use crate::vertex::factory::{vertex_factory, VertexFactory, VertexHandle};
use crate::vertex::format::VertexFormat;

/// Identifier of the material a slot's geometry is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// One material's geometry under construction.
pub struct MeshBuilderSlot {
    material: MaterialId,
    primitive: PrimitiveType,
    factory: Box<dyn VertexFactory>,
    handles: Vec<VertexHandle>,
    infos: Vec<VertexInfo>,
    primitive_indices: Vec<u32>,
    triangle_indices: Vec<u32>,
}

impl MeshBuilderSlot {
    /// The material this slot draws with.
    pub fn material(&self) -> MaterialId {
        self.material
    }

    /// The primitive type of this slot.
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive
    }

    /// Number of vertices added so far.
    pub fn vertex_count(&self) -> usize {
        self.handles.len()
    }

    /// Number of render indices added so far.
    pub fn primitive_index_count(&self) -> usize {
        self.primitive_indices.len()
    }

    /// Per-vertex metadata, parallel to the vertices.
    pub fn vertex_infos(&self) -> &[VertexInfo] {
        &self.infos
    }

    /// A slot is degenerate when its index sequence cannot form whole
    /// primitives or references vertices it does not have.
    fn check(&self, slot: usize) -> Result<(), GeometryError> {
        let per_primitive = self.primitive.vertices_per_primitive();
        if self.primitive_indices.len() % per_primitive != 0 {
            return Err(GeometryError::InvalidSlot {
                slot,
                reason: format!(
                    "{} indices do not form whole primitives of {} vertices",
                    self.primitive_indices.len(),
                    per_primitive
                ),
            });
        }
        let vertex_count = self.handles.len() as u32;
        for sequence in [&self.primitive_indices, &self.triangle_indices] {
            if let Some(out) = sequence.iter().find(|index| **index >= vertex_count) {
                return Err(GeometryError::InvalidSlot {
                    slot,
                    reason: format!("index {} out of range for {} vertices", out, vertex_count),
                });
            }
        }
        Ok(())
    }
}

/// One finished material slot: the display array plus the material it is
/// drawn with.
pub struct BuiltSlot {
    /// The material of this geometry.
    pub material: MaterialId,
    /// The finished display array.
    pub array: Box<dyn DisplayArray>,
}

/// The result of [`MeshBuilder::build`].
pub struct BuiltMesh {
    /// One entry per builder slot, in slot order.
    pub slots: Vec<BuiltSlot>,
    /// One past the highest original index assigned while building.
    pub orig_index_count: u32,
}

/// Accumulates per-material geometry and converts it into display arrays.
pub struct MeshBuilder {
    format: VertexFormat,
    slots: Vec<MeshBuilderSlot>,
    /// Shared across slots: vertices added through any slot get globally
    /// unique original indices.
    orig_index_counter: u32,
}

impl MeshBuilder {
    /// Create a builder for meshes of `format`.
    pub fn new(format: VertexFormat) -> Self {
        Self {
            format,
            slots: Vec::new(),
            orig_index_counter: 0,
        }
    }

    /// The vertex format every slot builds with.
    pub fn format(&self) -> VertexFormat {
        self.format
    }

    /// Open a new slot for `material`, returning its index.
    pub fn add_slot(&mut self, material: MaterialId, primitive: PrimitiveType) -> usize {
        self.slots.push(MeshBuilderSlot {
            material,
            primitive,
            factory: vertex_factory(self.format),
            handles: Vec::new(),
            infos: Vec::new(),
            primitive_indices: Vec::new(),
            triangle_indices: Vec::new(),
        });
        self.slots.len() - 1
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Read access to a slot.
    pub fn slot(&self, slot: usize) -> &MeshBuilderSlot {
        &self.slots[slot]
    }

    /// Add a vertex to `slot` with a fresh original index. Returns the
    /// vertex's local index within the slot.
    pub fn add_vertex(
        &mut self,
        slot: usize,
        position: Vec3,
        uvs: &[Vec2],
        tangent: Vec4,
        colors: &[u32],
        normal: Vec3,
    ) -> u32 {
        let orig_index = self.orig_index_counter;
        self.orig_index_counter += 1;
        self.add_vertex_with_orig_index(slot, position, uvs, tangent, colors, normal, orig_index)
    }

    /// Add a vertex to `slot` reusing an existing original index. Split
    /// vertices (one source vertex, several UV seams) share their original
    /// index this way.
    pub fn add_vertex_with_orig_index(
        &mut self,
        slot: usize,
        position: Vec3,
        uvs: &[Vec2],
        tangent: Vec4,
        colors: &[u32],
        normal: Vec3,
        orig_index: u32,
    ) -> u32 {
        let entry = &mut self.slots[slot];
        let handle = entry
            .factory
            .create_vertex(position, uvs, tangent, colors, normal);
        entry.handles.push(handle);
        entry.infos.push(VertexInfo::new(orig_index));
        (entry.handles.len() - 1) as u32
    }

    /// Append `index` to both the render and the triangle sequence of
    /// `slot`. Most geometry uses the same topology for drawing and physics.
    pub fn add_index(&mut self, slot: usize, index: u32) {
        let entry = &mut self.slots[slot];
        entry.primitive_indices.push(index);
        entry.triangle_indices.push(index);
    }

    /// Append a render index to `slot`.
    pub fn add_primitive_index(&mut self, slot: usize, index: u32) {
        self.slots[slot].primitive_indices.push(index);
    }

    /// Append a triangle (physics) index to `slot`.
    pub fn add_triangle_index(&mut self, slot: usize, index: u32) {
        self.slots[slot].triangle_indices.push(index);
    }

    /// Remove the vertices `[start, end)` from `slot`. Indices referencing
    /// the removed range are dropped with their whole primitive; higher
    /// indices are shifted down.
    pub fn remove_vertices(&mut self, slot: usize, start: u32, end: u32) {
        let entry = &mut self.slots[slot];
        let end = end.min(entry.handles.len() as u32);
        if start >= end {
            return;
        }
        for handle in entry.handles.drain(start as usize..end as usize) {
            entry.factory.delete_vertex(handle);
        }
        entry.infos.drain(start as usize..end as usize);

        let removed = end - start;
        let per_primitive = entry.primitive.vertices_per_primitive();
        retain_remapped(&mut entry.primitive_indices, per_primitive, start, end, removed);
        retain_remapped(&mut entry.triangle_indices, 3, start, end, removed);
    }

    /// Recompute the normals of `slot` from its triangle geometry: face
    /// normals are accumulated on each corner and renormalized, giving
    /// smooth shading across shared vertices. Non-triangle slots are left
    /// unchanged.
    pub fn recalculate_normals(&mut self, slot: usize) {
        let entry = &mut self.slots[slot];
        if entry.primitive != PrimitiveType::Triangles {
            return;
        }

        let mut normals = vec![Vec3::ZERO; entry.handles.len()];
        for triangle in entry.primitive_indices.chunks_exact(3) {
            let read_position = |index: u32| {
                entry
                    .factory
                    .vertex(entry.handles[index as usize])
                    .map(|view| view.position())
                    .unwrap_or(Vec3::ZERO)
            };
            let a = read_position(triangle[0]);
            let b = read_position(triangle[1]);
            let c = read_position(triangle[2]);
            // Unnormalized cross product weights the contribution by face
            // area.
            let face = (b - a).cross(c - a);
            for corner in triangle {
                normals[*corner as usize] += face;
            }
        }

        for (handle, normal) in entry.handles.iter().zip(&normals) {
            if let Some(mut vertex) = entry.factory.vertex_mut(*handle) {
                vertex.set_normal(normal.normalize_or_zero());
            }
        }
    }

    /// Validate every slot and convert the accumulated geometry into
    /// display arrays. The builder is consumed; its factories are dropped
    /// once the vertex data has been copied out.
    pub fn build(self) -> Result<BuiltMesh, GeometryError> {
        for (index, slot) in self.slots.iter().enumerate() {
            slot.check(index)?;
        }

        let mut slots = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            let array = display_array_from_parts(
                slot.primitive,
                slot.factory.as_ref(),
                &slot.handles,
                slot.infos,
                slot.primitive_indices,
                slot.triangle_indices,
            );
            slots.push(BuiltSlot {
                material: slot.material,
                array,
            });
        }
        Ok(BuiltMesh {
            slots,
            orig_index_count: self.orig_index_counter,
        })
    }
}

/// Drop whole primitives that reference `[start, end)` and shift indices
/// above the range down by `removed`.
fn retain_remapped(indices: &mut Vec<u32>, per_primitive: usize, start: u32, end: u32, removed: u32) {
    let mut kept = Vec::with_capacity(indices.len());
    for primitive in indices.chunks_exact(per_primitive) {
        if primitive.iter().any(|index| *index >= start && *index < end) {
            continue;
        }
        kept.extend(primitive.iter().map(|index| {
            if *index >= end {
                *index - removed
            } else {
                *index
            }
        }));
    }
    *indices = kept;
}
