//! Read operations on a virtual file.

use crate::layer::StreamLayer;
use crate::registry::Registry;
use crate::stream::ByteStream;
use crate::VfsError;

/// Raw and decoded byte access.
///
/// Callers normally go through [`open_input`](crate::open_input), which picks
/// between the two.
pub trait FileRead: Send {
    /// The node's own bytes, as stored by its backend.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotFound`] if the node does not exist
    fn open_raw(&self, vfs: &Registry) -> Result<Box<dyn ByteStream>, VfsError>;

    /// Decoders applied, innermost first, to the raw bytes of this node's
    /// outer container before its entry is looked up.
    ///
    /// Only container entries have any.
    fn layers(&self) -> Vec<&dyn StreamLayer> {
        Vec::new()
    }
}
