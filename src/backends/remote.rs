//! Remote backends: HTTP, network shares and the command service.
//!
//! All three share one node type over a [`Transport`]; they differ in the
//! segment they claim and in whether writes are allowed.
//!
//! | Kind | Claims | Writable |
//! |------|--------|----------|
//! | [`RemoteKind::Http`] | `http:`, `https:` | no |
//! | [`RemoteKind::Share`] | `smb:` | yes |
//! | [`RemoteKind::CommandService`] | `cs:` | yes |
//!
//! A remote provider owns the whole path: the claimed segment is the scheme,
//! and everything after it is the remote location, never an entry inside a
//! container.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info};

use crate::node::NodeInfo;
use crate::registry::{FileSystem, Registry};
use crate::stream::{ByteStream, PlainStream};
use crate::traits::{FileDir, FileMeta, FileRead, FileWrite, VirtualFile};
use crate::types::{DirEntry, Metadata};
use crate::url::UrlPath;
use crate::VfsError;

/// Network collaborator used by remote nodes.
///
/// The drive does not implement any network protocol itself; the host
/// application supplies a transport. Write operations default to
/// [`VfsError::ReadOnly`].
pub trait Transport: Send + Sync {
    /// Metadata for `url`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotFound`] if nothing is there
    fn stat(&self, url: &UrlPath) -> Result<Metadata, VfsError>;

    /// Entries of the directory at `url`.
    fn list(&self, url: &UrlPath) -> Result<Vec<DirEntry>, VfsError>;

    /// Open `url` for reading.
    fn open_read(&self, url: &UrlPath) -> Result<Box<dyn Read + Send>, VfsError>;

    /// Open `url` for writing, creating or truncating it.
    fn open_write(&self, url: &UrlPath) -> Result<Box<dyn Write + Send>, VfsError> {
        let _ = url;
        Err(VfsError::ReadOnly {
            operation: "open_write",
        })
    }

    /// Create a directory at `url`.
    fn create_dir(&self, url: &UrlPath) -> Result<(), VfsError> {
        let _ = url;
        Err(VfsError::ReadOnly {
            operation: "create_dir",
        })
    }

    /// Remove the file or empty directory at `url`.
    fn remove(&self, url: &UrlPath) -> Result<(), VfsError> {
        let _ = url;
        Err(VfsError::ReadOnly {
            operation: "remove",
        })
    }

    /// Rename `from` to `to`.
    fn rename(&self, from: &UrlPath, to: &UrlPath) -> Result<(), VfsError> {
        let _ = (from, to);
        Err(VfsError::ReadOnly {
            operation: "rename",
        })
    }

    /// Open a session for the named location.
    fn connect(&self, name: &str) -> Result<(), VfsError> {
        let _ = name;
        Ok(())
    }

    /// Close the session for the named location.
    fn disconnect(&self, name: &str) -> Result<(), VfsError> {
        let _ = name;
        Ok(())
    }
}

/// Which remote service a provider fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    /// Read-only web server.
    Http,
    /// Network file share.
    Share,
    /// The remote command service (`cs:` paths).
    CommandService,
}

impl RemoteKind {
    fn symbol(self) -> &'static str {
        match self {
            RemoteKind::Http => "HTTP",
            RemoteKind::Share => "SMB",
            RemoteKind::CommandService => "CS",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            RemoteKind::Http => &["http:", "https:"],
            RemoteKind::Share => &["smb:"],
            RemoteKind::CommandService => &["cs:"],
        }
    }

    fn writable(self) -> bool {
        !matches!(self, RemoteKind::Http)
    }
}

/// Provider for one [`RemoteKind`].
#[derive(Clone)]
pub struct RemoteFileSystem {
    kind: RemoteKind,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RemoteFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFileSystem")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl RemoteFileSystem {
    /// A provider of `kind` over `transport`.
    pub fn new(kind: RemoteKind, transport: Arc<dyn Transport>) -> Self {
        Self { kind, transport }
    }

    /// HTTP provider.
    pub fn http(transport: Arc<dyn Transport>) -> Self {
        Self::new(RemoteKind::Http, transport)
    }

    /// Network share provider.
    pub fn share(transport: Arc<dyn Transport>) -> Self {
        Self::new(RemoteKind::Share, transport)
    }

    /// Command service provider.
    pub fn command_service(transport: Arc<dyn Transport>) -> Self {
        Self::new(RemoteKind::CommandService, transport)
    }

    /// The kind of service this provider fronts.
    pub fn kind(&self) -> RemoteKind {
        self.kind
    }
}

impl FileSystem for RemoteFileSystem {
    fn symbol(&self) -> &str {
        self.kind.symbol()
    }

    fn handles(&self, segment: &str) -> bool {
        self.kind
            .keywords()
            .iter()
            .any(|k| segment.eq_ignore_ascii_case(k))
    }

    fn get_file(
        &self,
        path: &str,
        _segments: &[&str],
        _matched: usize,
        _vfs: &Registry,
    ) -> Result<Box<dyn VirtualFile>, VfsError> {
        Ok(Box::new(RemoteFile {
            info: NodeInfo::new(path),
            kind: self.kind,
            transport: Arc::clone(&self.transport),
            listing: None,
        }))
    }

    fn mount(&self, name: &str) -> Result<(), VfsError> {
        info!(kind = self.kind.symbol(), name, "mounting");
        self.transport.connect(name)
    }

    fn unmount(&self, name: &str) -> Result<(), VfsError> {
        info!(kind = self.kind.symbol(), name, "unmounting");
        self.transport.disconnect(name)
    }
}

/// A node on a remote service.
pub struct RemoteFile {
    info: NodeInfo,
    kind: RemoteKind,
    transport: Arc<dyn Transport>,
    listing: Option<std::vec::IntoIter<DirEntry>>,
}

impl RemoteFile {
    fn stat(&self) -> Result<Option<Metadata>, VfsError> {
        match self.transport.stat(&self.info.url) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn require(&self) -> Result<Metadata, VfsError> {
        self.stat()?.ok_or_else(|| VfsError::NotFound {
            path: self.info.url().to_string(),
        })
    }

    fn check_writable(&self, operation: &'static str) -> Result<(), VfsError> {
        if self.kind.writable() {
            Ok(())
        } else {
            Err(VfsError::ReadOnly { operation })
        }
    }
}

impl FileMeta for RemoteFile {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn is_directory(&self, _vfs: &Registry) -> Result<bool, VfsError> {
        Ok(self.stat()?.is_some_and(|m| m.is_dir()))
    }

    fn exists(&self, _vfs: &Registry) -> Result<bool, VfsError> {
        Ok(self.stat()?.is_some())
    }

    fn size(&self, _vfs: &Registry) -> Result<u64, VfsError> {
        Ok(self.require()?.size)
    }

    fn last_write(&self, _vfs: &Registry) -> Result<SystemTime, VfsError> {
        Ok(self.require()?.modified)
    }

    fn creation_time(&self, _vfs: &Registry) -> Result<SystemTime, VfsError> {
        Ok(self.require()?.created)
    }
}

impl FileDir for RemoteFile {
    fn rewind_directory(&mut self) -> Result<(), VfsError> {
        self.listing = None;
        Ok(())
    }

    fn next_child(&mut self, vfs: &Registry) -> Result<Option<Box<dyn VirtualFile>>, VfsError> {
        if self.listing.is_none() {
            if !self.is_directory(vfs)? {
                return Ok(None);
            }
            let entries = self.transport.list(&self.info.url)?;
            debug!(url = %self.info.url, count = entries.len(), "remote listing");
            self.listing = Some(entries.into_iter());
        }
        match self.listing.as_mut().and_then(Iterator::next) {
            Some(entry) => vfs.resolve(&self.info.url.join(&entry.name)).map(Some),
            None => Ok(None),
        }
    }

    fn create_dir(&self, _vfs: &Registry) -> Result<(), VfsError> {
        self.check_writable("create_dir")?;
        self.transport.create_dir(&self.info.url)
    }
}

impl FileWrite for RemoteFile {
    fn remove(&self, _vfs: &Registry) -> Result<(), VfsError> {
        self.check_writable("remove")?;
        self.transport.remove(&self.info.url)
    }

    fn rename(&self, dest: &str, _vfs: &Registry) -> Result<(), VfsError> {
        self.check_writable("rename")?;
        let target = UrlPath::parse(&UrlPath::parse(&self.info.url.parent()).join(dest));
        self.transport.rename(&self.info.url, &target)
    }

    fn open_output(&self, _vfs: &Registry) -> Result<Box<dyn Write + Send>, VfsError> {
        self.check_writable("open_write")?;
        self.transport.open_write(&self.info.url)
    }
}

impl FileRead for RemoteFile {
    fn open_raw(&self, _vfs: &Registry) -> Result<Box<dyn ByteStream>, VfsError> {
        let reader = self.transport.open_read(&self.info.url)?;
        Ok(Box::new(PlainStream::new(reader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalFileSystem;
    use crate::ext::VirtualFileExt;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Flat map of url → content; directories are implied by prefixes.
    #[derive(Default)]
    struct MapTransport {
        files: Mutex<BTreeMap<String, Vec<u8>>>,
        connected: Mutex<Vec<String>>,
    }

    impl MapTransport {
        fn with(files: &[(&str, &[u8])]) -> Arc<Self> {
            let t = Self::default();
            for (url, data) in files {
                t.files.lock().unwrap().insert(url.to_string(), data.to_vec());
            }
            Arc::new(t)
        }
    }

    impl Transport for MapTransport {
        fn stat(&self, url: &UrlPath) -> Result<Metadata, VfsError> {
            let files = self.files.lock().unwrap();
            if let Some(data) = files.get(url.url()) {
                return Ok(Metadata {
                    size: data.len() as u64,
                    ..Metadata::default()
                });
            }
            let prefix = format!("{}/", url.url());
            if files.keys().any(|k| k.starts_with(&prefix)) {
                return Ok(Metadata {
                    file_type: crate::FileType::Directory,
                    ..Metadata::default()
                });
            }
            Err(VfsError::NotFound {
                path: url.url().to_string(),
            })
        }

        fn list(&self, url: &UrlPath) -> Result<Vec<DirEntry>, VfsError> {
            let prefix = format!("{}/", url.url());
            let files = self.files.lock().unwrap();
            Ok(files
                .keys()
                .filter_map(|k| k.strip_prefix(&prefix))
                .filter(|rest| !rest.contains('/'))
                .map(|name| DirEntry::file(name, 0))
                .collect())
        }

        fn open_read(&self, url: &UrlPath) -> Result<Box<dyn Read + Send>, VfsError> {
            let files = self.files.lock().unwrap();
            let data = files.get(url.url()).cloned().ok_or(VfsError::NotFound {
                path: url.url().to_string(),
            })?;
            Ok(Box::new(std::io::Cursor::new(data)))
        }

        fn remove(&self, url: &UrlPath) -> Result<(), VfsError> {
            self.files.lock().unwrap().remove(url.url());
            Ok(())
        }

        fn connect(&self, name: &str) -> Result<(), VfsError> {
            self.connected.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn registry(transport: Arc<MapTransport>) -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().unwrap();
        let vfs = Registry::builder(LocalFileSystem::new(dir.path()))
            .provider(RemoteFileSystem::http(transport.clone()))
            .provider(RemoteFileSystem::share(transport.clone()))
            .command_service(RemoteFileSystem::command_service(transport))
            .build();
        (dir, vfs)
    }

    #[test]
    fn http_file_reads_through_transport() {
        let t = MapTransport::with(&[("http://host/c64/demo.prg", b"\x01\x08demo")]);
        let (_dir, vfs) = registry(t);
        let node = vfs.resolve("http://host/c64/demo.prg").unwrap();
        assert!(node.exists(&vfs).unwrap());
        assert_eq!(node.size(&vfs).unwrap(), 6);
        assert_eq!(node.read_all(&vfs).unwrap(), b"\x01\x08demo");
    }

    #[test]
    fn http_is_read_only() {
        let t = MapTransport::with(&[("http://host/a.prg", b"x")]);
        let (_dir, vfs) = registry(t);
        let node = vfs.resolve("http://host/a.prg").unwrap();
        assert!(matches!(node.remove(&vfs), Err(VfsError::ReadOnly { .. })));
        assert!(matches!(
            node.open_output(&vfs),
            Err(VfsError::ReadOnly { .. })
        ));
    }

    #[test]
    fn share_forwards_writes() {
        let t = MapTransport::with(&[("smb://nas/a.prg", b"x")]);
        let (_dir, vfs) = registry(t.clone());
        vfs.resolve("smb://nas/a.prg").unwrap().remove(&vfs).unwrap();
        assert!(t.files.lock().unwrap().is_empty());
    }

    #[test]
    fn remote_directory_children() {
        let t = MapTransport::with(&[
            ("smb://nas/c64/a.prg", b"a"),
            ("smb://nas/c64/b.prg", b"bb"),
        ]);
        let (_dir, vfs) = registry(t);
        let mut dir = vfs.resolve("smb://nas/c64").unwrap();
        assert!(dir.is_directory(&vfs).unwrap());
        let first = dir.next_child(&vfs).unwrap().unwrap();
        assert_eq!(first.info().url(), "smb://nas/c64/a.prg");
        assert_eq!(first.size(&vfs).unwrap(), 1);
        assert!(dir.next_child(&vfs).unwrap().is_some());
        assert!(dir.next_child(&vfs).unwrap().is_none());
    }

    #[test]
    fn command_service_paths() {
        let t = MapTransport::with(&[("cs:/apps/menu.prg", b"\x01\x08m")]);
        let (_dir, vfs) = registry(t);
        let node = vfs.resolve("cs:/apps/menu.prg").unwrap();
        assert_eq!(node.read_all(&vfs).unwrap(), b"\x01\x08m");
    }

    #[test]
    fn mount_connects_transport() {
        let t = MapTransport::with(&[]);
        let (_dir, vfs) = registry(t.clone());
        vfs.mount("smb:").unwrap();
        assert_eq!(*t.connected.lock().unwrap(), vec!["smb:".to_string()]);
    }

    #[test]
    fn missing_remote_file() {
        let t = MapTransport::with(&[]);
        let (_dir, vfs) = registry(t);
        let node = vfs.resolve("http://host/nothing").unwrap();
        assert!(!node.exists(&vfs).unwrap());
        assert!(node.size(&vfs).unwrap_err().is_not_found());
    }
}
