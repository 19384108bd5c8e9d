//! # Virtual File Traits
//!
//! The capability set of one addressable item in the universal namespace.
//!
//! ## Trait Composition
//!
//! ```text
//! FileMeta + FileDir + FileWrite + FileRead = VirtualFile
//! ```
//!
//! | Trait | Methods |
//! |-------|---------|
//! | [`FileMeta`] | `info`, `is_directory`, `exists`, `size`, `last_write`, `creation_time`, `media` |
//! | [`FileDir`] | `rewind_directory`, `next_child`, `create_dir`, `cd` |
//! | [`FileWrite`] | `remove`, `rename`, `open_output` |
//! | [`FileRead`] | `open_raw`, `layers` |
//!
//! [`VirtualFile`] has a blanket implementation: implement the four components
//! and a node is usable everywhere.
//!
//! Optional capabilities (browsing a container, random access) live on the
//! streams, see [`ByteStream`](crate::ByteStream).
//!
//! ## The registry parameter
//!
//! Methods that may need to reach another backend (a container reading its
//! outer file, a redirect following its link) receive the [`Registry`]
//! explicitly. Nodes never hold on to it.
//!
//! [`Registry`]: crate::Registry

mod file_dir;
mod file_meta;
mod file_read;
mod file_write;

pub use file_dir::FileDir;
pub use file_meta::FileMeta;
pub use file_read::FileRead;
pub use file_write::FileWrite;

/// One item of the universal namespace, whatever backend serves it.
///
/// Nodes are created by providers when the registry resolves a path, when a
/// node descends with [`cd`](FileDir::cd), or when a directory enumerates its
/// children. Whoever asked for a node owns it exclusively.
///
/// # Example
///
/// ```rust
/// use iecdrive::{Registry, VfsError, VirtualFile};
///
/// fn list_names(dir: &mut dyn VirtualFile, vfs: &Registry) -> Result<Vec<String>, VfsError> {
///     dir.rewind_directory()?;
///     let mut names = Vec::new();
///     while let Some(child) = dir.next_child(vfs)? {
///         names.push(child.info().url.name.clone());
///     }
///     Ok(names)
/// }
/// ```
pub trait VirtualFile: FileMeta + FileDir + FileWrite + FileRead {}

impl<T: FileMeta + FileDir + FileWrite + FileRead> VirtualFile for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeInfo;
    use crate::registry::Registry;
    use crate::stream::{ByteStream, SeekableStream};
    use crate::VfsError;
    use std::io::Write;
    use std::time::SystemTime;

    struct Stub {
        info: NodeInfo,
    }

    impl FileMeta for Stub {
        fn info(&self) -> &NodeInfo {
            &self.info
        }
        fn is_directory(&self, _: &Registry) -> Result<bool, VfsError> {
            Ok(false)
        }
        fn exists(&self, _: &Registry) -> Result<bool, VfsError> {
            Ok(true)
        }
        fn size(&self, _: &Registry) -> Result<u64, VfsError> {
            Ok(3)
        }
        fn last_write(&self, _: &Registry) -> Result<SystemTime, VfsError> {
            Ok(SystemTime::UNIX_EPOCH)
        }
        fn creation_time(&self, _: &Registry) -> Result<SystemTime, VfsError> {
            Ok(SystemTime::UNIX_EPOCH)
        }
    }

    impl FileDir for Stub {
        fn rewind_directory(&mut self) -> Result<(), VfsError> {
            Ok(())
        }
        fn next_child(&mut self, _: &Registry) -> Result<Option<Box<dyn VirtualFile>>, VfsError> {
            Ok(None)
        }
        fn create_dir(&self, _: &Registry) -> Result<(), VfsError> {
            Err(VfsError::NotSupported {
                operation: "create_dir",
            })
        }
    }

    impl FileWrite for Stub {
        fn remove(&self, _: &Registry) -> Result<(), VfsError> {
            Ok(())
        }
        fn rename(&self, _: &str, _: &Registry) -> Result<(), VfsError> {
            Ok(())
        }
        fn open_output(&self, _: &Registry) -> Result<Box<dyn Write + Send>, VfsError> {
            Ok(Box::new(std::io::sink()))
        }
    }

    impl FileRead for Stub {
        fn open_raw(&self, _: &Registry) -> Result<Box<dyn ByteStream>, VfsError> {
            Ok(Box::new(SeekableStream::from_bytes(vec![1, 8, 0])))
        }
    }

    #[test]
    fn components_make_a_virtual_file() {
        fn takes(_: &dyn VirtualFile) {}
        let stub = Stub {
            info: NodeInfo::new("/X"),
        };
        takes(&stub);
    }

    #[test]
    fn plain_nodes_have_no_layers() {
        let stub = Stub {
            info: NodeInfo::new("/X"),
        };
        assert!(stub.layers().is_empty());
    }

    #[test]
    fn virtual_file_is_object_safe_and_send() {
        fn _check(_: Box<dyn VirtualFile>) {}
        fn _assert_send<T: Send + ?Sized>() {}
        _assert_send::<dyn VirtualFile>();
    }
}
