//! Redirect files.
//!
//! A `.URL` file holds one line naming another location. Listed, it looks like
//! a directory; descended into, it behaves as the location it names.
//! The target is resolved the first time it is needed and kept for the
//! lifetime of the redirect node.

use std::io::Write;
use std::time::SystemTime;

use tracing::debug;

use crate::ext::VirtualFileExt;
use crate::node::{navigate, NodeInfo};
use crate::registry::{segment_has_extension, FileSystem, Registry};
use crate::stream::{open_input, ByteStream};
use crate::traits::{FileDir, FileMeta, FileRead, FileWrite, VirtualFile};
use crate::types::MediaInfo;
use crate::VfsError;

/// Provider for `.URL` redirect files.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectFileSystem;

impl FileSystem for RedirectFileSystem {
    fn symbol(&self) -> &str {
        "URL"
    }

    fn handles(&self, segment: &str) -> bool {
        segment_has_extension(segment, "url")
    }

    fn get_file(
        &self,
        path: &str,
        segments: &[&str],
        matched: usize,
        vfs: &Registry,
    ) -> Result<Box<dyn VirtualFile>, VfsError> {
        let info = NodeInfo::claimed(path, segments, matched);
        if info.path_in_stream.is_empty() {
            return Ok(Box::new(RedirectFile::new(info)));
        }

        // A path through the redirect: go straight to the target.
        let remainder = info.path_in_stream.clone();
        let mut link = RedirectFile::new(NodeInfo::new(&info.stream_path));
        link.target(vfs)?.cd(&remainder, vfs)
    }
}

/// A redirect node.
pub struct RedirectFile {
    info: NodeInfo,
    pointed: Option<Box<dyn VirtualFile>>,
}

impl RedirectFile {
    fn new(info: NodeInfo) -> Self {
        Self {
            info,
            pointed: None,
        }
    }

    /// The node this redirect names, resolved on first use.
    pub fn target(&mut self, vfs: &Registry) -> Result<&mut Box<dyn VirtualFile>, VfsError> {
        let pointed = match self.pointed.take() {
            Some(pointed) => pointed,
            None => self.follow(vfs)?,
        };
        Ok(self.pointed.insert(pointed))
    }

    fn follow(&self, vfs: &Registry) -> Result<Box<dyn VirtualFile>, VfsError> {
        let line = self.own(vfs)?.read_first_line(vfs)?;
        let line = line.trim();
        if line.is_empty() {
            return Err(VfsError::CorruptedData {
                path: self.info.stream_path.clone(),
                details: "empty redirect".to_string(),
            });
        }
        debug!(redirect = %self.info.url, target = line, "following redirect");
        vfs.resolve(line)
    }

    fn own(&self, vfs: &Registry) -> Result<Box<dyn VirtualFile>, VfsError> {
        vfs.resolve_outer(&self.info.stream_path)
    }
}

impl FileMeta for RedirectFile {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn is_directory(&self, vfs: &Registry) -> Result<bool, VfsError> {
        self.exists(vfs)
    }

    fn exists(&self, vfs: &Registry) -> Result<bool, VfsError> {
        self.own(vfs)?.exists(vfs)
    }

    fn size(&self, _vfs: &Registry) -> Result<u64, VfsError> {
        Ok(0)
    }

    fn last_write(&self, vfs: &Registry) -> Result<SystemTime, VfsError> {
        self.own(vfs)?.last_write(vfs)
    }

    fn creation_time(&self, vfs: &Registry) -> Result<SystemTime, VfsError> {
        self.own(vfs)?.creation_time(vfs)
    }

    fn media(&mut self, vfs: &Registry) -> Result<MediaInfo, VfsError> {
        self.target(vfs)?.media(vfs)
    }
}

impl FileDir for RedirectFile {
    fn rewind_directory(&mut self) -> Result<(), VfsError> {
        match self.pointed {
            Some(ref mut pointed) => pointed.rewind_directory(),
            None => Ok(()),
        }
    }

    fn next_child(&mut self, vfs: &Registry) -> Result<Option<Box<dyn VirtualFile>>, VfsError> {
        self.target(vfs)?.next_child(vfs)
    }

    fn create_dir(&self, _vfs: &Registry) -> Result<(), VfsError> {
        Err(VfsError::NotSupported {
            operation: "create_dir on redirect",
        })
    }

    fn cd(&mut self, name: &str, vfs: &Registry) -> Result<Box<dyn VirtualFile>, VfsError> {
        match self.target(vfs) {
            Ok(target) => target.cd(name, vfs),
            Err(error) => {
                // Unreadable link: navigate from the link's own location.
                debug!(redirect = %self.info.url, %error, "redirect unusable");
                vfs.resolve(&navigate(&self.info.url, name))
            }
        }
    }
}

impl FileWrite for RedirectFile {
    fn remove(&self, vfs: &Registry) -> Result<(), VfsError> {
        self.own(vfs)?.remove(vfs)
    }

    fn rename(&self, dest: &str, vfs: &Registry) -> Result<(), VfsError> {
        self.own(vfs)?.rename(dest, vfs)
    }

    fn open_output(&self, vfs: &Registry) -> Result<Box<dyn Write + Send>, VfsError> {
        self.own(vfs)?.open_output(vfs)
    }
}

impl FileRead for RedirectFile {
    fn open_raw(&self, vfs: &Registry) -> Result<Box<dyn ByteStream>, VfsError> {
        open_input(self.own(vfs)?.as_ref(), vfs)
    }
}
