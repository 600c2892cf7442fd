//! Vertex records, formats, views and allocation.
//!
//! This module provides the typed, format-parameterized vertex storage
//! pipeline:
//!
//! - [`VertexFormat`] / [`VertexMemoryFormat`] - layout parameters and derived
//!   byte offsets
//! - [`VertexData`] - the concrete `repr(C)` record, one monomorphization per
//!   supported format
//! - [`VertexView`] / [`VertexViewMut`] - format-erased byte-offset accessors
//! - [`VertexFactory`] - arena-backed allocation behind opaque handles

pub mod data;
pub mod factory;
pub mod format;
pub mod view;

pub use data::VertexData;
pub use factory::{vertex_factory, PooledVertexFactory, VertexFactory, VertexHandle};
pub use format::{
    AttributeFormat, VertexAttributeDescriptor, VertexFormat, VertexMemoryFormat, VertexSemantic,
    MAX_COLOR_CHANNELS, MAX_UV_CHANNELS,
};
pub use view::{VertexView, VertexViewMut};
