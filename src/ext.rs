//! # Extension Traits
//!
//! Convenience methods on top of [`VirtualFile`].
//!
//! ## Available Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`read_all`](VirtualFileExt::read_all) | Read the effective content into memory |
//! | [`read_first_line`](VirtualFileExt::read_first_line) | First text line, for redirect files |
//! | [`copy_to`](VirtualFileExt::copy_to) | Stream content into another node |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature, [`VirtualFileExtJson::read_json`] deserializes a
//! node's content.

use std::io::{BufRead, BufReader, Read, Write};

use crate::registry::Registry;
use crate::stream::open_input;
use crate::traits::VirtualFile;
use crate::VfsError;

/// Extension methods for any virtual file.
///
/// All reads go through [`open_input`], so container entries and redirects
/// behave the same as plain files. Implemented for `dyn VirtualFile`, so the
/// methods are available on every boxed node.
///
/// # Example
///
/// ```rust
/// use iecdrive::{Registry, VfsError, VirtualFileExt};
///
/// fn link_target(vfs: &Registry, path: &str) -> Result<String, VfsError> {
///     vfs.resolve(path)?.read_first_line(vfs)
/// }
/// ```
pub trait VirtualFileExt {
    /// Read the whole effective content.
    fn read_all(&self, vfs: &Registry) -> Result<Vec<u8>, VfsError>;

    /// Read the first line of text, without its line terminator.
    ///
    /// An empty file yields an empty string.
    fn read_first_line(&self, vfs: &Registry) -> Result<String, VfsError>;

    /// Copy the effective content of this node into `dest`.
    ///
    /// Returns the number of bytes copied.
    fn copy_to(&self, dest: &dyn VirtualFile, vfs: &Registry) -> Result<u64, VfsError>;
}

impl VirtualFileExt for dyn VirtualFile + '_ {
    fn read_all(&self, vfs: &Registry) -> Result<Vec<u8>, VfsError> {
        let mut input = open_input(self, vfs)?;
        let mut data = Vec::new();
        input
            .read_to_end(&mut data)
            .map_err(|e| VfsError::io("read", self.info().url(), e))?;
        Ok(data)
    }

    fn read_first_line(&self, vfs: &Registry) -> Result<String, VfsError> {
        let input = open_input(self, vfs)?;
        let mut line = String::new();
        BufReader::new(input)
            .read_line(&mut line)
            .map_err(|e| VfsError::io("read line", self.info().url(), e))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn copy_to(&self, dest: &dyn VirtualFile, vfs: &Registry) -> Result<u64, VfsError> {
        let mut input = open_input(self, vfs)?;
        let mut output = dest.open_output(vfs)?;
        let copied = std::io::copy(&mut input, &mut output)
            .map_err(|e| VfsError::io("copy", dest.info().url(), e))?;
        output
            .flush()
            .map_err(|e| VfsError::io("flush", dest.info().url(), e))?;
        Ok(copied)
    }
}

// =============================================================================
// JSON Support (Feature-Gated)
// =============================================================================

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use serde::de::DeserializeOwned;

    /// JSON deserialization of a node's content.
    ///
    /// Available when the `serde` feature is enabled.
    pub trait VirtualFileExtJson {
        /// Read the node and deserialize it as JSON.
        ///
        /// # Errors
        ///
        /// - [`VfsError::NotFound`] if the node does not exist
        /// - [`VfsError::Deserialization`] if parsing fails
        fn read_json<T: DeserializeOwned>(&self, vfs: &Registry) -> Result<T, VfsError>;
    }

    impl VirtualFileExtJson for dyn VirtualFile + '_ {
        fn read_json<T: DeserializeOwned>(&self, vfs: &Registry) -> Result<T, VfsError> {
            let data = self.read_all(vfs)?;
            serde_json::from_slice(&data).map_err(|e| VfsError::Deserialization(e.to_string()))
        }
    }
}

#[cfg(feature = "serde")]
pub use json::VirtualFileExtJson;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalFileSystem;

    fn setup(content: &[u8]) -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("LINK.TXT"), content).unwrap();
        let vfs = Registry::builder(LocalFileSystem::new(dir.path())).build();
        (dir, vfs)
    }

    #[test]
    fn first_line_strips_terminator() {
        let (_dir, vfs) = setup(b"http://example.com/c64\r\nsecond line\n");
        let node = vfs.resolve("/LINK.TXT").unwrap();
        assert_eq!(node.read_first_line(&vfs).unwrap(), "http://example.com/c64");
    }

    #[test]
    fn first_line_of_empty_file() {
        let (_dir, vfs) = setup(b"");
        let node = vfs.resolve("/LINK.TXT").unwrap();
        assert_eq!(node.read_first_line(&vfs).unwrap(), "");
    }

    #[test]
    fn copy_between_nodes() {
        let (dir, vfs) = setup(b"\x01\x08hello");
        let src = vfs.resolve("/LINK.TXT").unwrap();
        let dest = vfs.resolve("/COPY.PRG").unwrap();
        assert_eq!(src.copy_to(dest.as_ref(), &vfs).unwrap(), 7);
        assert_eq!(std::fs::read(dir.path().join("COPY.PRG")).unwrap(), b"\x01\x08hello");
    }

    #[test]
    fn read_missing_is_not_found() {
        let (_dir, vfs) = setup(b"");
        let node = vfs.resolve("/NOPE").unwrap();
        assert!(node.read_all(&vfs).unwrap_err().is_not_found());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn read_json_value() {
        let (dir, vfs) = setup(br#"{"device": 8}"#);
        let node = vfs.resolve("/LINK.TXT").unwrap();
        let value: serde_json::Value = node.read_json(&vfs).unwrap();
        assert_eq!(value["device"], 8);

        std::fs::write(dir.path().join("LINK.TXT"), b"{").unwrap();
        let err = node.read_json::<serde_json::Value>(&vfs).unwrap_err();
        assert!(matches!(err, VfsError::Deserialization(_)));
    }
}
