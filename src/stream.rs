//! # Streams
//!
//! Byte streams handed out by virtual files, with optional capabilities
//! exposed as separate trait objects instead of flags:
//!
//! | Capability | Trait | Offered by |
//! |------------|-------|------------|
//! | sequential read | [`ByteStream`] | every stream |
//! | entry-by-entry traversal | [`Browsable`] | disk and tape image decoders |
//! | positioned read | [`RandomAccess`] | local files, in-memory images |
//!
//! [`open_input`] composes the effective content stream of a node: the raw
//! bytes of the outer file, decoded by the node's layer, positioned at the
//! requested entry.

use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

use crate::layer::apply_layers;
use crate::registry::Registry;
use crate::traits::VirtualFile;
use crate::types::{DirEntry, MediaInfo};
use crate::VfsError;

/// A readable stream with optional capabilities.
///
/// Capabilities are discovered at runtime; the defaults say "not supported".
pub trait ByteStream: Read + Send {
    /// Entry-by-entry traversal, if this stream decodes a container.
    fn as_browsable(&mut self) -> Option<&mut dyn Browsable> {
        None
    }

    /// Positioned access, if the underlying bytes allow it.
    fn as_random_access(&mut self) -> Option<&mut dyn RandomAccess> {
        None
    }
}

/// Traversal over the entries of a decoded container.
///
/// The sequence is lazy and finite. It does not restart on its own; call
/// [`rewind`](Browsable::rewind) to begin again.
pub trait Browsable {
    /// Advance to the next entry and position the stream at its data.
    ///
    /// Returns `Ok(None)` once the container is exhausted.
    ///
    /// # Errors
    ///
    /// - [`VfsError::CorruptedData`] if the entry's data chain is broken
    fn next_entry(&mut self) -> Result<Option<DirEntry>, VfsError>;

    /// Start the traversal over from the first entry.
    fn rewind(&mut self) -> Result<(), VfsError>;

    /// Media descriptor of the container (name, id, free blocks).
    fn media(&self) -> MediaInfo;
}

/// Positioned access to a stream.
pub trait RandomAccess {
    /// Move the read position to `pos`, returning the new position.
    fn seek_to(&mut self, pos: u64) -> Result<u64, VfsError>;

    /// Total length of the stream in bytes.
    fn total_len(&self) -> u64;
}

// ============================================================================
// Wrappers
// ============================================================================

/// A stream over any reader, without extra capabilities.
pub struct PlainStream<R>(R);

impl<R: Read + Send> PlainStream<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self(reader)
    }
}

impl<R: Read + Send> Read for PlainStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read + Send> ByteStream for PlainStream<R> {}

/// A stream over a seekable reader, offering [`RandomAccess`].
pub struct SeekableStream<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek + Send> SeekableStream<R> {
    /// Wrap a seekable reader, measuring its length.
    pub fn new(mut inner: R) -> std::io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len })
    }
}

impl SeekableStream<std::io::Cursor<Vec<u8>>> {
    /// An in-memory stream.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            inner: std::io::Cursor::new(data),
            len,
        }
    }
}

impl<R: Read + Seek + Send> Read for SeekableStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Seek + Send> RandomAccess for SeekableStream<R> {
    fn seek_to(&mut self, pos: u64) -> Result<u64, VfsError> {
        Ok(self.inner.seek(SeekFrom::Start(pos.min(self.len)))?)
    }

    fn total_len(&self) -> u64 {
        self.len
    }
}

impl<R: Read + Seek + Send> ByteStream for SeekableStream<R> {
    fn as_random_access(&mut self) -> Option<&mut dyn RandomAccess> {
        Some(self)
    }
}

// ============================================================================
// Composition
// ============================================================================

/// Open the effective content stream of `node`.
///
/// - With an empty `path_in_stream` the node's own raw stream is returned.
/// - Otherwise the outer container at `stream_path` is resolved (possibly on a
///   different backend), its raw stream is decoded by `node`'s layers, and the
///   decoded stream is advanced to the entry named by `path_in_stream`.
///
/// # Errors
///
/// - [`VfsError::NotSupported`] if the decoded stream cannot be browsed
/// - [`VfsError::EntryNotFound`] if the container has no such entry
/// - anything the outer backend or the decoder reports
pub fn open_input(node: &dyn VirtualFile, vfs: &Registry) -> Result<Box<dyn ByteStream>, VfsError> {
    let info = node.info();
    if info.path_in_stream.is_empty() {
        return node.open_raw(vfs);
    }

    debug!(
        stream_path = %info.stream_path,
        path_in_stream = %info.path_in_stream,
        "opening container entry"
    );
    let container = vfs.resolve(&info.stream_path)?;
    let raw = container.open_raw(vfs)?;
    let mut decoded = apply_layers(raw, &node.layers(), &info.stream_path)?;

    let found = match decoded.as_browsable() {
        Some(browser) => seek_entry(browser, &info.path_in_stream)?,
        None => {
            return Err(VfsError::NotSupported {
                operation: "open entry of unbrowsable stream",
            });
        }
    };

    if found {
        Ok(decoded)
    } else {
        Err(VfsError::EntryNotFound {
            stream_path: info.stream_path.clone(),
            entry: info.path_in_stream.clone(),
        })
    }
}

/// Advance `browser` until an entry named `wanted` is current.
fn seek_entry(browser: &mut dyn Browsable, wanted: &str) -> Result<bool, VfsError> {
    while let Some(entry) = browser.next_entry()? {
        if entry.name.eq_ignore_ascii_case(wanted) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_stream_has_no_capabilities() {
        let mut s = PlainStream::new(std::io::empty());
        assert!(s.as_browsable().is_none());
        assert!(s.as_random_access().is_none());
    }

    #[test]
    fn memory_stream_seeks() {
        let mut s = SeekableStream::from_bytes(vec![1, 2, 3, 4]);
        let ra = s.as_random_access().unwrap();
        assert_eq!(ra.total_len(), 4);
        assert_eq!(ra.seek_to(2).unwrap(), 2);
        let mut rest = Vec::new();
        s.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![3, 4]);
    }

    #[test]
    fn seek_is_clamped_to_length() {
        let mut s = SeekableStream::from_bytes(vec![9; 8]);
        assert_eq!(s.seek_to(100).unwrap(), 8);
    }

    struct Names(Vec<&'static str>, usize);

    impl Browsable for Names {
        fn next_entry(&mut self) -> Result<Option<DirEntry>, VfsError> {
            let next = self.0.get(self.1).map(|n| DirEntry::file(*n, 0));
            self.1 += 1;
            Ok(next)
        }

        fn rewind(&mut self) -> Result<(), VfsError> {
            self.1 = 0;
            Ok(())
        }

        fn media(&self) -> MediaInfo {
            MediaInfo::default()
        }
    }

    #[test]
    fn seek_entry_is_case_insensitive() {
        let mut names = Names(vec!["INTRO", "Game"], 0);
        assert!(seek_entry(&mut names, "GAME").unwrap());
        names.rewind().unwrap();
        assert!(!seek_entry(&mut names, "MISSING").unwrap());
    }
}
