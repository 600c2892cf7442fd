//! Soft-body deformation over display arrays.
//!
//! A deformer owns working replicas of an object's display arrays and
//! rewrites their positions and normals every simulation step from the
//! solver's node state. The shared source arrays stay untouched, so other
//! instances of the same mesh keep their own geometry. Source-side edits
//! (UV animation, color changes) are pulled into the replicas through the
//! change-tracking channel before the solver state is applied.

use glam::Affine3A;

use crate::array::{DisplayArray, VertexFlag};
use crate::error::GeometryError;
use crate::math::Aabb;
use crate::update::{ChangeClient, ModifiedFlags};

/// Read access to a soft-body solver's node state.
///
/// Node positions are in world space, matching how physics engines expose
/// their soft-body meshes.
pub trait SoftBodyNodes {
    /// Number of simulation nodes.
    fn node_count(&self) -> usize;
    /// World-space position of node `node`.
    fn node_position(&self, node: usize) -> glam::Vec3;
    /// World-space normal of node `node`.
    fn node_normal(&self, node: usize) -> glam::Vec3;
}

struct DeformerSlot {
    /// Working replica written by [`SoftBodyDeformer::apply`].
    array: Box<dyn DisplayArray>,
    /// Accumulates the source array's modifications between pulls.
    source_changes: ChangeClient,
}

/// Rewrites replica geometry from soft-body node state.
pub struct SoftBodyDeformer {
    slots: Vec<DeformerSlot>,
    /// Maps a vertex's original index to its simulation node. Vertices whose
    /// info carries [`VertexFlag::SOFT_BODY_INDEX`] bypass the table: their
    /// original index already is the node index.
    node_table: Vec<u32>,
    aabb: Aabb,
    auto_update_aabb: bool,
}

impl SoftBodyDeformer {
    /// Create a deformer with the given original-index-to-node table and no
    /// slots yet.
    pub fn new(node_table: Vec<u32>) -> Self {
        Self {
            slots: Vec::new(),
            node_table,
            aabb: Aabb::empty(),
            auto_update_aabb: true,
        }
    }

    /// Replicate `source` into a new slot and subscribe to its changes.
    /// Returns the slot index.
    pub fn add_array(&mut self, source: &mut dyn DisplayArray) -> usize {
        let source_changes = source.subscribe();
        let array = source.replica();
        self.slots.push(DeformerSlot {
            array,
            source_changes,
        });
        self.slots.len() - 1
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The working replica in `slot`.
    pub fn array(&self, slot: usize) -> &dyn DisplayArray {
        self.slots[slot].array.as_ref()
    }

    /// The working replica in `slot`, mutable.
    pub fn array_mut(&mut self, slot: usize) -> &mut dyn DisplayArray {
        self.slots[slot].array.as_mut()
    }

    /// Source-side modifications accumulated for `slot` since the last pull,
    /// without draining them.
    pub fn pending_source_changes(&self, slot: usize) -> ModifiedFlags {
        self.slots[slot].source_changes.peek()
    }

    /// Pull accumulated source-side attribute edits into the replica in
    /// `slot`. Only the attribute categories the source flagged are copied;
    /// an unchanged source costs nothing.
    pub fn pull(&mut self, slot: usize, source: &dyn DisplayArray) -> Result<(), GeometryError> {
        let entry = &mut self.slots[slot];
        let flags = entry.source_changes.take();
        if (flags & ModifiedFlags::MESH).is_empty() {
            return Ok(());
        }
        entry.array.update_from(source, flags)
    }

    /// One full frame step: pull pending source edits into every slot, then
    /// apply the solver state.
    ///
    /// `sources` must be the slots' source arrays, in slot order. A source
    /// whose pull fails (vertex counts diverged) is logged and skipped for
    /// this frame rather than aborting the deformation.
    pub fn update(
        &mut self,
        sources: &[&dyn DisplayArray],
        nodes: &dyn SoftBodyNodes,
        world_to_object: &Affine3A,
    ) {
        debug_assert_eq!(sources.len(), self.slots.len());
        for (slot, source) in sources.iter().enumerate() {
            if let Err(err) = self.pull(slot, *source) {
                log::warn!("soft body deformer: skipping pull for slot {}: {}", slot, err);
            }
        }
        self.apply(nodes, world_to_object);
    }

    /// Overwrite every replica vertex's position and normal from its
    /// simulation node and flag the arrays position/normal modified.
    ///
    /// `world_to_object` brings world-space node positions back into object
    /// space for the bounds; when auto-update is enabled the deformer's AABB
    /// is recomputed from the written positions. Vertices without a valid
    /// node mapping are left untouched and counted in a single warning.
    pub fn apply(&mut self, nodes: &dyn SoftBodyNodes, world_to_object: &Affine3A) {
        let node_count = nodes.node_count();
        let mut aabb = Aabb::empty();
        let mut unmapped = 0usize;

        for slot in &mut self.slots {
            let array = slot.array.as_mut();
            for index in 0..array.vertex_count() {
                let info = array.vertex_info(index);
                let node = if info.flags.contains(VertexFlag::SOFT_BODY_INDEX) {
                    info.orig_index as usize
                } else {
                    match self.node_table.get(info.orig_index as usize) {
                        Some(node) => *node as usize,
                        None => {
                            unmapped += 1;
                            continue;
                        }
                    }
                };
                if node >= node_count {
                    unmapped += 1;
                    continue;
                }

                let position = nodes.node_position(node);
                let mut vertex = array.vertex_mut(index);
                vertex.set_position(position);
                vertex.set_normal(nodes.node_normal(node));
                if self.auto_update_aabb {
                    aabb.grow(world_to_object.transform_point3(position));
                }
            }
            array.notify_modified(ModifiedFlags::POSITION | ModifiedFlags::NORMAL);
        }

        if unmapped > 0 {
            log::warn!(
                "soft body deformer: {} vertices without a valid node mapping were skipped",
                unmapped
            );
        }
        if self.auto_update_aabb {
            self.aabb = aabb;
        }
    }

    /// Object-space bounds of the last [`apply`](Self::apply), when
    /// auto-update is enabled.
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    /// Enable or disable AABB recomputation during [`apply`](Self::apply).
    pub fn set_auto_update_aabb(&mut self, enabled: bool) {
        self.auto_update_aabb = enabled;
    }
}
