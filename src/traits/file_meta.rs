//! Metadata queries on a virtual file.

use std::time::SystemTime;

use crate::node::NodeInfo;
use crate::registry::Registry;
use crate::types::MediaInfo;
use crate::VfsError;

/// Identity and metadata of a virtual file.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn FileMeta`.
pub trait FileMeta: Send {
    /// Url and stream split of this node.
    fn info(&self) -> &NodeInfo;

    /// Whether the node can be listed (directories, containers, redirects).
    fn is_directory(&self, vfs: &Registry) -> Result<bool, VfsError>;

    /// Whether the node exists on its backend.
    ///
    /// Returns `Ok(false)` for a missing target; errors are reserved for
    /// failures reaching the backend.
    fn exists(&self, vfs: &Registry) -> Result<bool, VfsError>;

    /// Size in bytes.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotFound`] if the node does not exist
    fn size(&self, vfs: &Registry) -> Result<u64, VfsError>;

    /// Last modification time.
    fn last_write(&self, vfs: &Registry) -> Result<SystemTime, VfsError>;

    /// Creation time.
    fn creation_time(&self, vfs: &Registry) -> Result<SystemTime, VfsError>;

    /// Media descriptor used when this node is served as a listing.
    ///
    /// Plain directories have none; containers report their header, id and
    /// free blocks.
    fn media(&mut self, vfs: &Registry) -> Result<MediaInfo, VfsError> {
        let _ = vfs;
        Ok(MediaInfo::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_meta_is_object_safe() {
        fn _check(_: &dyn FileMeta) {}
    }
}
