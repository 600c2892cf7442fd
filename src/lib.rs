//! # Geometry Engine
//!
//! Format-parameterized geometry core for a real-time 3D engine: vertex
//! storage, display arrays, mesh construction and soft-body deformation.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`VertexFormat`] / [`VertexData`] - layout-parameterized vertex records
//!   with a closed set of supported UV and color channel counts
//! - [`DisplayArray`] - per-material vertex and index containers with change
//!   tracking, depth sorting and a GPU upload decision layer
//! - [`MeshBuilder`] - incremental, validated mesh construction
//! - [`SoftBodyDeformer`] - per-instance geometry rewritten from simulation
//!   node state
//!
//! ## Example
//!
//! ```
//! use geometry_engine::{MaterialId, MeshBuilder, PrimitiveType, VertexFormat};
//! use glam::{Vec2, Vec3, Vec4};
//!
//! let format = VertexFormat::new(1, 1)?;
//! let mut builder = MeshBuilder::new(format);
//! let slot = builder.add_slot(MaterialId(0), PrimitiveType::Triangles);
//! for position in [Vec3::ZERO, Vec3::X, Vec3::Y] {
//!     builder.add_vertex(slot, position, &[Vec2::ZERO], Vec4::ZERO, &[0], Vec3::Z);
//! }
//! for index in [0, 1, 2] {
//!     builder.add_primitive_index(slot, index);
//! }
//! let mesh = builder.build()?;
//! assert_eq!(mesh.slots[0].array.vertex_count(), 3);
//! # Ok::<(), geometry_engine::GeometryError>(())
//! ```

pub mod arena;
pub mod array;
pub mod builder;
pub mod deformer;
pub mod error;
pub mod math;
pub mod storage;
pub mod update;
pub mod vertex;

// Re-export main types for convenience
pub use arena::{Arena, Handle};
pub use array::{
    display_array, display_array_from_parts, ArrayData, DisplayArray, PrimitiveType,
    TypedDisplayArray, VertexFlag, VertexInfo,
};
pub use builder::{BuiltMesh, BuiltSlot, MaterialId, MeshBuilder, MeshBuilderSlot};
pub use deformer::{SoftBodyDeformer, SoftBodyNodes};
pub use error::GeometryError;
pub use math::{Aabb, VERTEX_EPSILON};
pub use storage::{DisplayArrayStorage, UploadKind};
pub use update::{ChangeClient, ChangeTracker, ModifiedFlags};
pub use vertex::{
    vertex_factory, PooledVertexFactory, VertexData, VertexFactory, VertexFormat, VertexHandle,
    VertexMemoryFormat, VertexView, VertexViewMut,
};

/// Geometry library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the geometry subsystem.
///
/// This should be called before using any geometry functionality.
pub fn init() {
    log::info!("Geometry Engine v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_format_round_trip() {
        let format = VertexFormat::new(2, 1).unwrap();
        let array = display_array(PrimitiveType::Triangles, format);
        assert_eq!(array.format(), format);
    }
}
