//! Local storage backend.
//!
//! Serves every path no other provider claims, mapped onto a host directory.
//! `..` segments are rejected so nothing outside the storage root is reachable.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::trace;

use crate::config::DriveConfig;
use crate::node::{NodeInfo, SEPARATOR};
use crate::registry::{FileSystem, Registry};
use crate::stream::{ByteStream, SeekableStream};
use crate::traits::{FileDir, FileMeta, FileRead, FileWrite, VirtualFile};
use crate::VfsError;

/// Local storage rooted at a host directory.
///
/// # Example
///
/// ```rust
/// use iecdrive::{LocalFileSystem, Registry};
///
/// let dir = std::env::temp_dir();
/// let vfs = Registry::builder(LocalFileSystem::new(&dir)).build();
/// let root = vfs.resolve("").unwrap();
/// assert!(root.is_directory(&vfs).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// Storage rooted at `root`.
    ///
    /// The root is canonicalized when possible so symlinked temp directories
    /// compare equal.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    /// Storage rooted at the configured `storage_root`.
    pub fn from_config(config: &DriveConfig) -> Self {
        Self::new(&config.storage_root)
    }

    /// The host directory backing the namespace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, path: &str) -> Result<PathBuf, VfsError> {
        let mut host = self.root.clone();
        for segment in path.split(SEPARATOR).filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." {
                return Err(VfsError::InvalidPath {
                    path: path.to_string(),
                    reason: "escapes storage root",
                });
            }
            host.push(segment);
        }
        Ok(host)
    }
}

impl FileSystem for LocalFileSystem {
    fn symbol(&self) -> &str {
        "LOCAL"
    }

    fn handles(&self, _segment: &str) -> bool {
        false
    }

    fn get_file(
        &self,
        path: &str,
        _segments: &[&str],
        _matched: usize,
        _vfs: &Registry,
    ) -> Result<Box<dyn VirtualFile>, VfsError> {
        let info = NodeInfo::new(path);
        let host = self.host_path(&info.url.path)?;
        trace!(path, host = %host.display(), "local file");
        Ok(Box::new(LocalFile {
            info,
            host,
            children: None,
        }))
    }
}

/// A file or directory on local storage.
#[derive(Debug)]
pub struct LocalFile {
    info: NodeInfo,
    host: PathBuf,
    children: Option<std::vec::IntoIter<String>>,
}

impl LocalFile {
    fn metadata(&self) -> Result<fs::Metadata, VfsError> {
        fs::metadata(&self.host).map_err(|e| VfsError::io("metadata", &self.host, e))
    }

    fn list_names(&self) -> Result<Vec<String>, VfsError> {
        let mut names = fs::read_dir(&self.host)
            .map_err(|e| VfsError::io("read_dir", &self.host, e))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }
}

impl FileMeta for LocalFile {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn is_directory(&self, _vfs: &Registry) -> Result<bool, VfsError> {
        Ok(self.host.is_dir())
    }

    fn exists(&self, _vfs: &Registry) -> Result<bool, VfsError> {
        self.host
            .try_exists()
            .map_err(|e| VfsError::io("exists", &self.host, e))
    }

    fn size(&self, _vfs: &Registry) -> Result<u64, VfsError> {
        Ok(self.metadata()?.len())
    }

    fn last_write(&self, _vfs: &Registry) -> Result<SystemTime, VfsError> {
        self.metadata()?
            .modified()
            .map_err(|e| VfsError::io("modified", &self.host, e))
    }

    fn creation_time(&self, vfs: &Registry) -> Result<SystemTime, VfsError> {
        // Not every host filesystem records a birth time.
        match self.metadata()?.created() {
            Ok(created) => Ok(created),
            Err(_) => self.last_write(vfs),
        }
    }
}

impl FileDir for LocalFile {
    fn rewind_directory(&mut self) -> Result<(), VfsError> {
        self.children = None;
        Ok(())
    }

    fn next_child(&mut self, vfs: &Registry) -> Result<Option<Box<dyn VirtualFile>>, VfsError> {
        if !self.host.is_dir() {
            return Ok(None);
        }
        if self.children.is_none() {
            self.children = Some(self.list_names()?.into_iter());
        }
        match self.children.as_mut().and_then(Iterator::next) {
            Some(name) => vfs.resolve(&self.info.url.join(&name)).map(Some),
            None => Ok(None),
        }
    }

    fn create_dir(&self, _vfs: &Registry) -> Result<(), VfsError> {
        fs::create_dir(&self.host).map_err(|e| VfsError::io("create_dir", &self.host, e))
    }
}

impl FileWrite for LocalFile {
    fn remove(&self, _vfs: &Registry) -> Result<(), VfsError> {
        let result = if self.host.is_dir() {
            fs::remove_dir(&self.host)
        } else {
            fs::remove_file(&self.host)
        };
        result.map_err(|e| VfsError::io("remove", &self.host, e))
    }

    fn rename(&self, dest: &str, _vfs: &Registry) -> Result<(), VfsError> {
        if dest.is_empty() || dest.contains(SEPARATOR) || dest == ".." {
            return Err(VfsError::InvalidPath {
                path: dest.to_string(),
                reason: "rename target must be a plain name",
            });
        }
        let target = self.host.with_file_name(dest);
        fs::rename(&self.host, &target).map_err(|e| VfsError::io("rename", &self.host, e))
    }

    fn open_output(&self, _vfs: &Registry) -> Result<Box<dyn Write + Send>, VfsError> {
        let file =
            fs::File::create(&self.host).map_err(|e| VfsError::io("create", &self.host, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

impl FileRead for LocalFile {
    fn open_raw(&self, _vfs: &Registry) -> Result<Box<dyn ByteStream>, VfsError> {
        if self.host.is_dir() {
            return Err(VfsError::NotSupported {
                operation: "read a directory",
            });
        }
        let file = fs::File::open(&self.host).map_err(|e| VfsError::io("open", &self.host, e))?;
        let stream =
            SeekableStream::new(file).map_err(|e| VfsError::io("open", &self.host, e))?;
        Ok(Box::new(stream))
    }
}
