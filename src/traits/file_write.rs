//! Write operations on a virtual file.

use std::io::Write;

use crate::registry::Registry;
use crate::VfsError;

/// Mutating operations.
///
/// Read-only backends (HTTP, images) answer with [`VfsError::ReadOnly`].
pub trait FileWrite: Send {
    /// Remove the node (a file, or an empty directory).
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotFound`] if the node does not exist
    fn remove(&self, vfs: &Registry) -> Result<(), VfsError>;

    /// Rename the node to `dest`, a name in the same directory.
    fn rename(&self, dest: &str, vfs: &Registry) -> Result<(), VfsError>;

    /// Open the node for writing, creating or truncating it.
    ///
    /// The returned writer is already open.
    fn open_output(&self, vfs: &Registry) -> Result<Box<dyn Write + Send>, VfsError>;
}
