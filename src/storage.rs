//! GPU-side storage collaborator stub.
//!
//! Each display array is paired 1:1 with a [`DisplayArrayStorage`] that
//! stands in for the backend's buffer objects. The stub performs no GPU
//! work; it resolves modification flags into an upload decision, keeps
//! bookkeeping a real backend would need (buffer sizes, upload counters) and
//! logs the calls it receives. The buffer objects are released when the
//! owning array is destroyed, never separately.

use crate::update::ModifiedFlags;

/// What the storage layer must re-upload for a given set of modifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Nothing changed; the GPU copy is current.
    None,
    /// Only the contained attribute categories changed; a backend may
    /// restrict the upload to those interleaved ranges.
    Streams(ModifiedFlags),
    /// Buffers must be recreated and uploaded in full (size changed, or the
    /// storage does not exist yet).
    Full,
}

/// Bookkeeping stub for the buffer objects bound to one display array.
#[derive(Debug, Default)]
pub struct DisplayArrayStorage {
    exists: bool,
    vertex_count: usize,
    index_count: usize,
    stride: u32,
    full_uploads: u64,
    stream_uploads: u64,
}

impl DisplayArrayStorage {
    /// Create storage with no GPU objects yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the GPU objects have been created.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Decide what an upload with `flags` must cover.
    ///
    /// A size change or missing storage always forces [`UploadKind::Full`];
    /// partial stream uploads are only valid against an existing,
    /// size-stable buffer.
    pub fn resolve(&self, flags: ModifiedFlags) -> UploadKind {
        if !self.exists || flags.intersects(ModifiedFlags::SIZE | ModifiedFlags::STORAGE_INVALID) {
            return UploadKind::Full;
        }
        let streams = flags & ModifiedFlags::MESH;
        if streams.is_empty() {
            UploadKind::None
        } else {
            UploadKind::Streams(streams)
        }
    }

    /// Record an upload of `vertex_count` records of `stride` bytes plus
    /// `index_count` indices, covering `flags`. Returns the decision taken.
    pub fn upload(
        &mut self,
        flags: ModifiedFlags,
        vertex_count: usize,
        index_count: usize,
        stride: u32,
    ) -> UploadKind {
        let kind = self.resolve(flags);
        match kind {
            UploadKind::None => {}
            UploadKind::Streams(streams) => {
                self.stream_uploads += 1;
                log::trace!(
                    "display array storage: stream upload {:?} ({} vertices)",
                    streams,
                    vertex_count
                );
            }
            UploadKind::Full => {
                self.exists = true;
                self.vertex_count = vertex_count;
                self.index_count = index_count;
                self.stride = stride;
                self.full_uploads += 1;
                log::trace!(
                    "display array storage: full upload ({} vertices x {} bytes, {} indices)",
                    vertex_count,
                    stride,
                    index_count
                );
            }
        }
        kind
    }

    /// Vertex count of the last full upload.
    pub fn uploaded_vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Index count of the last full upload.
    pub fn uploaded_index_count(&self) -> usize {
        self.index_count
    }

    /// Number of full uploads performed.
    pub fn full_uploads(&self) -> u64 {
        self.full_uploads
    }

    /// Number of partial stream uploads performed.
    pub fn stream_uploads(&self) -> u64 {
        self.stream_uploads
    }
}

impl Drop for DisplayArrayStorage {
    fn drop(&mut self) {
        if self.exists {
            log::trace!(
                "display array storage: releasing buffer objects ({} vertices, {} indices)",
                self.vertex_count,
                self.index_count
            );
        }
    }
}
