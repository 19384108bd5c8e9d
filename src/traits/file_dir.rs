//! Directory operations on a virtual file.

use crate::node::navigate;
use crate::registry::Registry;
use crate::traits::{FileMeta, VirtualFile};
use crate::VfsError;

/// Child enumeration and navigation.
///
/// Enumeration is a cursor kept inside the node: [`next_child`](Self::next_child)
/// yields one child per call until `None`, and
/// [`rewind_directory`](Self::rewind_directory) starts over.
pub trait FileDir: FileMeta {
    /// Reset the child cursor.
    fn rewind_directory(&mut self) -> Result<(), VfsError>;

    /// Next child, or `None` when the listing is exhausted.
    ///
    /// Nodes that are not directories return `Ok(None)`.
    fn next_child(&mut self, vfs: &Registry) -> Result<Option<Box<dyn VirtualFile>>, VfsError>;

    /// Create this node as a directory.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] or [`VfsError::ReadOnly`] on backends that
    ///   cannot create directories
    fn create_dir(&self, vfs: &Registry) -> Result<(), VfsError>;

    /// Descend to `name`, relative to this node.
    ///
    /// The target url is built from this node's url and the request (see
    /// [`navigate`]) and resolved through the registry again, so every step
    /// goes through the same backend selection as the initial lookup.
    fn cd(&mut self, name: &str, vfs: &Registry) -> Result<Box<dyn VirtualFile>, VfsError> {
        vfs.resolve(&navigate(&self.info().url, name))
    }
}
