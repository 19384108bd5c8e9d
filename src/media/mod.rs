//! # Media Containers
//!
//! Disk and tape images browsed as directories.
//!
//! | Extension | Format | Decoder |
//! |-----------|--------|---------|
//! | `.D64` | 1541 disk image | [`D64Image`] |
//! | `.T64` | tape archive | [`T64Image`] |
//!
//! ## Nodes
//!
//! A path claimed at an image segment yields a [`ContainerFile`]:
//!
//! - with an empty `path_in_stream` it is the image itself, listed as a
//!   directory whose children are the image entries;
//! - otherwise it is one entry, read by decoding the image with
//!   [`ImageKind`] and seeking the entry (see [`open_input`]).
//!
//! Images are read-only.

mod d64;
mod t64;

pub use d64::D64Image;
pub use t64::T64Image;

use std::io::{Cursor, Read, Write};
use std::time::SystemTime;

use tracing::debug;

use crate::layer::{LayerExt, StreamLayer};
use crate::node::NodeInfo;
use crate::registry::{segment_has_extension, FileSystem, Registry};
use crate::stream::{open_input, Browsable, ByteStream, RandomAccess};
use crate::traits::{FileDir, FileMeta, FileRead, FileWrite, VirtualFile};
use crate::types::{DirEntry, MediaInfo};
use crate::url::UrlPath;
use crate::VfsError;

// ============================================================================
// Shared decoding helpers
// ============================================================================

/// Decode a padded PETSCII name to text.
///
/// Stops at the first shifted space (`0xA0`); trailing blanks are trimmed and
/// shifted letters fold to plain capitals.
pub(crate) fn petscii_name(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|&&b| b != 0xA0 && b != 0)
        .map(|&b| match b {
            0xC1..=0xDA => (b - 0x80) as char,
            0x20..=0x7E => b as char,
            _ => '?',
        })
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Listing tag for a directory type byte.
pub(crate) fn type_name(kind: u8) -> &'static str {
    match kind & 0x07 {
        0 => "DEL",
        1 => "SEQ",
        2 => "PRG",
        3 => "USR",
        4 => "REL",
        _ => "???",
    }
}

/// A decoded image: a media descriptor plus addressable entries.
pub trait Image: Send {
    /// Header, id and free blocks.
    fn media(&self) -> MediaInfo;

    /// Entries in directory order.
    fn entries(&self) -> Vec<DirEntry>;

    /// Full content of entry `index`.
    fn read_entry(&self, index: usize) -> Result<Vec<u8>, VfsError>;
}

// ============================================================================
// Stream
// ============================================================================

/// Browsable stream over a decoded image.
///
/// Reading yields the content of the entry most recently returned by
/// [`Browsable::next_entry`]; before the first entry it yields nothing.
pub struct ImageStream<I> {
    image: I,
    entries: Vec<DirEntry>,
    cursor: usize,
    data: Cursor<Vec<u8>>,
}

impl<I: Image> ImageStream<I> {
    /// Wrap a decoded image.
    pub fn new(image: I) -> Self {
        let entries = image.entries();
        Self {
            image,
            entries,
            cursor: 0,
            data: Cursor::new(Vec::new()),
        }
    }
}

impl<I: Image> Read for ImageStream<I> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.data.read(buf)
    }
}

impl<I: Image> Browsable for ImageStream<I> {
    fn next_entry(&mut self) -> Result<Option<DirEntry>, VfsError> {
        let Some(entry) = self.entries.get(self.cursor).cloned() else {
            return Ok(None);
        };
        self.data = Cursor::new(self.image.read_entry(self.cursor)?);
        self.cursor += 1;
        Ok(Some(entry))
    }

    fn rewind(&mut self) -> Result<(), VfsError> {
        self.cursor = 0;
        self.data = Cursor::new(Vec::new());
        Ok(())
    }

    fn media(&self) -> MediaInfo {
        self.image.media()
    }
}

impl<I: Image> RandomAccess for ImageStream<I> {
    fn seek_to(&mut self, pos: u64) -> Result<u64, VfsError> {
        let pos = pos.min(self.total_len());
        self.data.set_position(pos);
        Ok(pos)
    }

    fn total_len(&self) -> u64 {
        self.data.get_ref().len() as u64
    }
}

impl<I: Image> ByteStream for ImageStream<I> {
    fn as_browsable(&mut self) -> Option<&mut dyn Browsable> {
        Some(self)
    }

    fn as_random_access(&mut self) -> Option<&mut dyn RandomAccess> {
        Some(self)
    }
}

// ============================================================================
// Layer
// ============================================================================

/// Supported image formats, each one a [`StreamLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// 1541 disk image.
    D64,
    /// Tape archive.
    T64,
}

impl ImageKind {
    const ALL: [ImageKind; 2] = [ImageKind::D64, ImageKind::T64];

    /// File extension, lowercase.
    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::D64 => "d64",
            ImageKind::T64 => "t64",
        }
    }

    /// The format whose extension `segment` carries.
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| segment_has_extension(segment, k.extension()))
    }
}

impl StreamLayer for ImageKind {
    fn layer(
        &self,
        mut raw: Box<dyn ByteStream>,
        source: &str,
    ) -> Result<Box<dyn ByteStream>, VfsError> {
        let mut data = Vec::new();
        raw.read_to_end(&mut data)
            .map_err(|e| VfsError::io("read image", source, e))?;
        debug!(source, kind = ?self, len = data.len(), "decoding image");
        let stream: Box<dyn ByteStream> = match self {
            ImageKind::D64 => Box::new(ImageStream::new(D64Image::parse(data, source)?)),
            ImageKind::T64 => Box::new(ImageStream::new(T64Image::parse(data, source)?)),
        };
        Ok(stream)
    }
}

// ============================================================================
// Provider and nodes
// ============================================================================

/// Provider claiming image extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerFileSystem;

impl FileSystem for ContainerFileSystem {
    fn symbol(&self) -> &str {
        "IMAGE"
    }

    fn handles(&self, segment: &str) -> bool {
        ImageKind::from_segment(segment).is_some()
    }

    fn get_file(
        &self,
        path: &str,
        segments: &[&str],
        matched: usize,
        _vfs: &Registry,
    ) -> Result<Box<dyn VirtualFile>, VfsError> {
        let kind =
            ImageKind::from_segment(segments[matched]).ok_or_else(|| VfsError::InvalidPath {
                path: path.to_string(),
                reason: "not an image",
            })?;
        Ok(Box::new(ContainerFile {
            info: NodeInfo::claimed(path, segments, matched),
            kind,
            listing: None,
            entry: None,
        }))
    }
}

/// An image, or an entry inside one.
pub struct ContainerFile {
    info: NodeInfo,
    kind: ImageKind,
    listing: Option<Box<dyn ByteStream>>,
    entry: Option<DirEntry>,
}

impl ContainerFile {
    fn is_root(&self) -> bool {
        self.info.path_in_stream.is_empty()
    }

    fn outer(&self, vfs: &Registry) -> Result<Box<dyn VirtualFile>, VfsError> {
        vfs.resolve_outer(&self.info.stream_path)
    }

    fn decoded(&self, vfs: &Registry) -> Result<Box<dyn ByteStream>, VfsError> {
        let image = vfs.resolve(&self.info.stream_path)?;
        image
            .open_raw(vfs)?
            .layer(&self.kind, &self.info.stream_path)
    }

    fn find_entry(&self, vfs: &Registry) -> Result<Option<DirEntry>, VfsError> {
        if let Some(entry) = &self.entry {
            return Ok(Some(entry.clone()));
        }
        let mut decoded = self.decoded(vfs)?;
        let browser = decoded.as_browsable().ok_or(VfsError::NotSupported {
            operation: "browse image",
        })?;
        while let Some(entry) = browser.next_entry()? {
            if entry.name.eq_ignore_ascii_case(&self.info.path_in_stream) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    fn require_entry(&self, vfs: &Registry) -> Result<DirEntry, VfsError> {
        self.find_entry(vfs)?.ok_or_else(|| VfsError::EntryNotFound {
            stream_path: self.info.stream_path.clone(),
            entry: self.info.path_in_stream.clone(),
        })
    }

    fn child(&self, entry: DirEntry) -> ContainerFile {
        let mut info = NodeInfo {
            url: UrlPath::parse(&self.info.url.join(&entry.name)),
            stream_path: self.info.stream_path.clone(),
            path_in_stream: entry.name.clone(),
            type_tag: entry.type_tag.clone(),
        };
        if info.type_tag.is_none() {
            info.type_tag = Some("PRG".to_string());
        }
        ContainerFile {
            info,
            kind: self.kind,
            listing: None,
            entry: Some(entry),
        }
    }
}

impl FileMeta for ContainerFile {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn is_directory(&self, _vfs: &Registry) -> Result<bool, VfsError> {
        Ok(self.is_root())
    }

    fn exists(&self, vfs: &Registry) -> Result<bool, VfsError> {
        if self.is_root() {
            return self.outer(vfs)?.exists(vfs);
        }
        match self.find_entry(vfs) {
            Ok(found) => Ok(found.is_some()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn size(&self, vfs: &Registry) -> Result<u64, VfsError> {
        if self.is_root() {
            self.outer(vfs)?.size(vfs)
        } else {
            Ok(self.require_entry(vfs)?.size)
        }
    }

    fn last_write(&self, vfs: &Registry) -> Result<SystemTime, VfsError> {
        self.outer(vfs)?.last_write(vfs)
    }

    fn creation_time(&self, vfs: &Registry) -> Result<SystemTime, VfsError> {
        self.outer(vfs)?.creation_time(vfs)
    }

    fn media(&mut self, vfs: &Registry) -> Result<MediaInfo, VfsError> {
        if !self.is_root() {
            return Ok(MediaInfo::default());
        }
        let mut decoded = self.decoded(vfs)?;
        let mut media = decoded
            .as_browsable()
            .map(|b| b.media())
            .unwrap_or_default();
        media.image = self.info.url.name.clone();
        Ok(media)
    }
}

impl FileDir for ContainerFile {
    fn rewind_directory(&mut self) -> Result<(), VfsError> {
        self.listing = None;
        Ok(())
    }

    fn next_child(&mut self, vfs: &Registry) -> Result<Option<Box<dyn VirtualFile>>, VfsError> {
        if !self.is_root() {
            return Ok(None);
        }
        if self.listing.is_none() {
            self.listing = Some(self.decoded(vfs)?);
        }
        let next = match self.listing.as_mut().and_then(|l| l.as_browsable()) {
            Some(browser) => browser.next_entry()?,
            None => None,
        };
        Ok(next.map(|entry| Box::new(self.child(entry)) as Box<dyn VirtualFile>))
    }

    fn create_dir(&self, _vfs: &Registry) -> Result<(), VfsError> {
        Err(VfsError::ReadOnly {
            operation: "create_dir",
        })
    }
}

impl FileWrite for ContainerFile {
    fn remove(&self, vfs: &Registry) -> Result<(), VfsError> {
        if self.is_root() {
            return self.outer(vfs)?.remove(vfs);
        }
        Err(VfsError::ReadOnly { operation: "remove" })
    }

    fn rename(&self, dest: &str, vfs: &Registry) -> Result<(), VfsError> {
        if self.is_root() {
            return self.outer(vfs)?.rename(dest, vfs);
        }
        Err(VfsError::ReadOnly { operation: "rename" })
    }

    fn open_output(&self, _vfs: &Registry) -> Result<Box<dyn Write + Send>, VfsError> {
        Err(VfsError::ReadOnly {
            operation: "open_write",
        })
    }
}

impl FileRead for ContainerFile {
    fn open_raw(&self, vfs: &Registry) -> Result<Box<dyn ByteStream>, VfsError> {
        if self.is_root() {
            open_input(self.outer(vfs)?.as_ref(), vfs)
        } else {
            open_input(self, vfs)
        }
    }

    fn layers(&self) -> Vec<&dyn StreamLayer> {
        vec![&self.kind as &dyn StreamLayer]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalFileSystem;
    use crate::ext::VirtualFileExt;
    use std::fs;

    fn setup() -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("GAMES.D64"),
            d64::tests::build(
                "MY GAMES",
                &[("ELITE", 0x82, &[0x01, 0x08, 0xAA, 0xBB]), ("README", 0x81, b"hi")],
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("TAPE.T64"),
            t64::tests::build("TAPE", &[("INTRO", 0x0801, &[1, 2, 3])]),
        )
        .unwrap();
        let vfs = Registry::builder(LocalFileSystem::new(dir.path()))
            .provider(ContainerFileSystem)
            .build();
        (dir, vfs)
    }

    #[test]
    fn petscii_names() {
        assert_eq!(petscii_name(&[b'A', b'B', 0xA0, 0xA0]), "AB");
        assert_eq!(petscii_name(&[0xC1, 0xC2, b' ', b' ']), "AB");
        assert_eq!(petscii_name(&[0x01]), "?");
    }

    #[test]
    fn image_is_a_directory_of_entries() {
        let (_dir, vfs) = setup();
        let mut image = vfs.resolve("/GAMES.D64").unwrap();
        assert!(image.is_directory(&vfs).unwrap());
        assert!(image.exists(&vfs).unwrap());

        let first = image.next_child(&vfs).unwrap().unwrap();
        assert_eq!(first.info().url(), "/GAMES.D64/ELITE");
        assert_eq!(first.info().stream_path, "/GAMES.D64");
        assert_eq!(first.info().path_in_stream, "ELITE");
        assert_eq!(first.info().type_tag.as_deref(), Some("PRG"));
        let second = image.next_child(&vfs).unwrap().unwrap();
        assert_eq!(second.info().type_tag.as_deref(), Some("SEQ"));
        assert!(image.next_child(&vfs).unwrap().is_none());
    }

    #[test]
    fn image_media() {
        let (_dir, vfs) = setup();
        let mut image = vfs.resolve("/GAMES.D64").unwrap();
        let media = image.media(&vfs).unwrap();
        assert_eq!(media.header, "MY GAMES");
        assert_eq!(media.id, "01 2A");
        assert_eq!(media.image, "GAMES.D64");
    }

    #[test]
    fn entry_content_via_path() {
        let (_dir, vfs) = setup();
        let node = vfs.resolve("/GAMES.D64/elite").unwrap();
        assert!(node.exists(&vfs).unwrap());
        assert!(!node.is_directory(&vfs).unwrap());
        assert_eq!(node.size(&vfs).unwrap(), 256);
        assert_eq!(node.read_all(&vfs).unwrap(), vec![0x01, 0x08, 0xAA, 0xBB]);
    }

    #[test]
    fn tape_entry_content() {
        let (_dir, vfs) = setup();
        let node = vfs.resolve("/TAPE.T64/INTRO").unwrap();
        assert_eq!(node.read_all(&vfs).unwrap(), vec![0x01, 0x08, 1, 2, 3]);
    }

    #[test]
    fn entry_opens_through_its_image_layer() {
        let (_dir, vfs) = setup();
        let node = vfs.resolve("/TAPE.T64/INTRO").unwrap();
        assert_eq!(node.layers().len(), 1);
        let mut input = open_input(node.as_ref(), &vfs).unwrap();
        assert!(input.as_browsable().is_some());
    }

    #[test]
    fn missing_entry() {
        let (_dir, vfs) = setup();
        let node = vfs.resolve("/GAMES.D64/NOPE").unwrap();
        assert!(!node.exists(&vfs).unwrap());
        assert!(matches!(
            node.read_all(&vfs),
            Err(VfsError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn images_are_read_only() {
        let (_dir, vfs) = setup();
        let node = vfs.resolve("/GAMES.D64/ELITE").unwrap();
        assert!(matches!(
            node.open_output(&vfs),
            Err(VfsError::ReadOnly { .. })
        ));
    }

    #[test]
    fn raw_image_bytes_come_from_outer_file() {
        let (dir, vfs) = setup();
        let image = vfs.resolve("/GAMES.D64").unwrap();
        let raw = image.read_all(&vfs).unwrap();
        assert_eq!(raw, fs::read(dir.path().join("GAMES.D64")).unwrap());
    }

    #[test]
    fn entry_stream_is_random_access() {
        let (_dir, vfs) = setup();
        let node = vfs.resolve("/GAMES.D64/ELITE").unwrap();
        let mut stream = open_input(node.as_ref(), &vfs).unwrap();
        let ra = stream.as_random_access().unwrap();
        assert_eq!(ra.total_len(), 4);
        ra.seek_to(2).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![0xAA, 0xBB]);
    }
}
