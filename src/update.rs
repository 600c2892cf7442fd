//! Modification flags and change notification.
//!
//! Display arrays track which attribute categories changed since the last
//! upload through a [`ModifiedFlags`] bitmask. The same mask is broadcast to
//! interested consumers through a [`ChangeTracker`]: an original, shared
//! array owns a tracker, and each live replica that needs to pull changes
//! from it (a soft-body deformer's working copy, for instance) subscribes a
//! [`ChangeClient`] and drains accumulated flags once per frame.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use bitflags::bitflags;

bitflags! {
    /// Attribute and lifecycle modification categories, combinable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModifiedFlags: u32 {
        /// Vertex positions modified.
        const POSITION = 1 << 0;
        /// Vertex normals modified.
        const NORMAL = 1 << 1;
        /// Vertex UVs modified.
        const UVS = 1 << 2;
        /// Vertex colors modified.
        const COLORS = 1 << 3;
        /// Vertex tangents modified.
        const TANGENT = 1 << 4;
        /// Vertex or index storage changed size; cached accessors are stale
        /// and the GPU buffer needs a full re-upload.
        const SIZE = 1 << 5;
        /// GPU storage not yet created.
        const STORAGE_INVALID = 1 << 6;

        /// Categories that affect the bounding volume.
        const AABB = Self::POSITION.bits();
        /// All per-vertex attribute categories.
        const MESH = Self::POSITION.bits()
            | Self::NORMAL.bits()
            | Self::UVS.bits()
            | Self::COLORS.bits()
            | Self::TANGENT.bits();
        /// Anything at all.
        const ANY = Self::MESH.bits() | Self::SIZE.bits() | Self::STORAGE_INVALID.bits();
    }
}

/// Consumer side of the change notification channel.
///
/// Flags accumulate across notifications until drained with
/// [`take`](ChangeClient::take).
#[derive(Debug)]
pub struct ChangeClient {
    flags: Arc<AtomicU32>,
}

impl ChangeClient {
    /// Drain and clear the accumulated flags.
    pub fn take(&self) -> ModifiedFlags {
        ModifiedFlags::from_bits_truncate(self.flags.swap(0, Ordering::AcqRel))
    }

    /// Read the accumulated flags without clearing them.
    pub fn peek(&self) -> ModifiedFlags {
        ModifiedFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }
}

/// Producer side of the change notification channel.
///
/// Dropped clients are pruned lazily on the next [`notify`](ChangeTracker::notify).
#[derive(Debug, Default)]
pub struct ChangeTracker {
    clients: Vec<Weak<AtomicU32>>,
}

impl ChangeTracker {
    /// Create a tracker with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a new client. The client starts with no pending flags.
    pub fn subscribe(&mut self) -> ChangeClient {
        let flags = Arc::new(AtomicU32::new(0));
        self.clients.push(Arc::downgrade(&flags));
        ChangeClient { flags }
    }

    /// Broadcast `flags` to every live client.
    pub fn notify(&mut self, flags: ModifiedFlags) {
        if flags.is_empty() {
            return;
        }
        self.clients.retain(|client| match client.upgrade() {
            Some(target) => {
                target.fetch_or(flags.bits(), Ordering::AcqRel);
                true
            }
            None => false,
        });
    }

    /// Number of live subscribers.
    pub fn client_count(&self) -> usize {
        self.clients.iter().filter(|c| c.strong_count() > 0).count()
    }
}
