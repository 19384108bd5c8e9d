//! # Backend Registry
//!
//! Maps a path of the universal namespace to the provider that serves it.
//!
//! ## Resolution
//!
//! ```text
//! smb://nas/c64/games.d64/ELITE
//! └─┬─┘ └┘ └┬┘ └┬┘ └───┬───┘ └─┬─┘
//!   0    1  2   3      4       5      segments, scanned 5 → 0
//! ```
//!
//! 1. A path whose first segment is `cs:` goes to the command service.
//! 2. Otherwise segments are tested from the last to the first; at each
//!    segment every provider is asked in registration order. The first claim
//!    decides the split point.
//! 3. Unclaimed paths go to local storage, whole.
//!
//! Scanning backwards attributes the innermost claim first: `games.d64` above
//! belongs to the image provider, and the image provider reaches the share
//! through [`Registry::resolve_outer`].
//!
//! The registry is built once with [`RegistryBuilder`] and is read-only
//! afterwards; share it behind an `Arc`.

use tracing::{debug, trace};

use crate::node::{chop, SEPARATOR};
use crate::traits::VirtualFile;
use crate::VfsError;

/// Segment that routes a path to the command service.
pub const COMMAND_SERVICE_TOKEN: &str = "cs:";

/// A pluggable provider claiming a class of path segments.
///
/// # Implementing
///
/// A provider answers [`handles`](FileSystem::handles) for single segments
/// (already split on `/`), case-insensitively. Providers keyed on a scheme
/// (`http:`) own everything after the claimed segment and usually build their
/// node from the whole path; providers keyed on a suffix (`.d64`) split the
/// path at the claim with [`NodeInfo::claimed`](crate::NodeInfo::claimed).
///
/// Mounting is optional; the defaults succeed without doing anything.
pub trait FileSystem: Send + Sync {
    /// Short name used in logs.
    fn symbol(&self) -> &str;

    /// Whether this provider claims `segment`.
    fn handles(&self, segment: &str) -> bool;

    /// Build the node for `path`, claimed at `segments[matched]`.
    ///
    /// `vfs` is available to providers that must look through to another
    /// node while building theirs.
    fn get_file(
        &self,
        path: &str,
        segments: &[&str],
        matched: usize,
        vfs: &Registry,
    ) -> Result<Box<dyn VirtualFile>, VfsError>;

    /// Make the named location available.
    fn mount(&self, name: &str) -> Result<(), VfsError> {
        let _ = name;
        Ok(())
    }

    /// Release the named location.
    fn unmount(&self, name: &str) -> Result<(), VfsError> {
        let _ = name;
        Ok(())
    }
}

/// Case-insensitive extension test on a single segment.
///
/// `"GAMES.D64"` has extension `d64`; a leading dot does not start an
/// extension.
pub fn segment_has_extension(segment: &str, extension: &str) -> bool {
    match segment.rfind('.') {
        Some(idx) if idx > 0 => segment[idx + 1..].eq_ignore_ascii_case(extension),
        _ => false,
    }
}

/// The ordered set of providers plus the local-storage fallback.
pub struct Registry {
    local: Box<dyn FileSystem>,
    providers: Vec<Box<dyn FileSystem>>,
    command_service: Option<Box<dyn FileSystem>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("local", &self.local.symbol())
            .field(
                "providers",
                &self.providers.iter().map(|p| p.symbol()).collect::<Vec<_>>(),
            )
            .field(
                "command_service",
                &self.command_service.as_ref().map(|p| p.symbol()),
            )
            .finish()
    }
}

impl Registry {
    /// Start building a registry around the local-storage provider.
    pub fn builder(local: impl FileSystem + 'static) -> RegistryBuilder {
        RegistryBuilder {
            local: Box::new(local),
            providers: Vec::new(),
            command_service: None,
        }
    }

    /// Resolve `path` to a node.
    ///
    /// Never fails for lack of a claim; unclaimed paths resolve to local
    /// storage, where the node may simply not exist.
    ///
    /// # Errors
    ///
    /// - [`VfsError::NotSupported`] for a `cs:` path when no command service
    ///   is registered
    /// - whatever the claiming provider reports while building the node
    pub fn resolve(&self, path: &str) -> Result<Box<dyn VirtualFile>, VfsError> {
        let segments = chop(path);

        if segments
            .first()
            .is_some_and(|s| s.eq_ignore_ascii_case(COMMAND_SERVICE_TOKEN))
        {
            let service = self
                .command_service
                .as_deref()
                .ok_or(VfsError::NotSupported {
                    operation: "command service",
                })?;
            trace!(path, "command service");
            return service.get_file(path, &segments, segments.len() - 1, self);
        }

        self.resolve_segments(path, &segments, segments.len())
    }

    /// Resolve the file holding the bytes of the node at `stream_path`.
    ///
    /// Only the segments before the last one are offered to providers, so a
    /// container's own claim is skipped and the file is looked up on the
    /// backend that carries it.
    pub fn resolve_outer(&self, stream_path: &str) -> Result<Box<dyn VirtualFile>, VfsError> {
        let segments = chop(stream_path);
        let scan = segments.len().saturating_sub(1);
        self.resolve_segments(stream_path, &segments, scan)
    }

    fn resolve_segments(
        &self,
        path: &str,
        segments: &[&str],
        scan: usize,
    ) -> Result<Box<dyn VirtualFile>, VfsError> {
        for idx in (0..scan).rev() {
            let segment = segments[idx];
            if let Some(provider) = self.providers.iter().find(|p| p.handles(segment)) {
                debug!(
                    path,
                    provider = provider.symbol(),
                    segment,
                    "segment claimed"
                );
                return provider.get_file(path, segments, idx, self);
            }
        }

        trace!(path, "no claim, using local storage");
        self.local.get_file(path, segments, segments.len() - 1, self)
    }

    /// Forward a mount request to the first provider claiming `name`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidPath`] if no provider claims `name`
    /// - the provider's own mount failure, unchanged
    pub fn mount(&self, name: &str) -> Result<(), VfsError> {
        self.claimant(name)?.mount(name)
    }

    /// Forward an unmount request to the first provider claiming `name`.
    ///
    /// Nothing to release when no provider claims it.
    pub fn unmount(&self, name: &str) -> Result<(), VfsError> {
        match self.claimant(name) {
            Ok(provider) => provider.unmount(name),
            Err(_) => {
                debug!(name, "unmount: no provider claims it");
                Ok(())
            }
        }
    }

    fn claimant(&self, name: &str) -> Result<&dyn FileSystem, VfsError> {
        let segment = name.split(SEPARATOR).next().unwrap_or(name);
        self.providers
            .iter()
            .chain(self.command_service.iter())
            .find(|p| p.handles(segment))
            .map(|p| p.as_ref())
            .ok_or_else(|| VfsError::InvalidPath {
                path: name.to_string(),
                reason: "no provider claims it",
            })
    }
}

/// Builder for [`Registry`].
///
/// Registration order is claim order.
pub struct RegistryBuilder {
    local: Box<dyn FileSystem>,
    providers: Vec<Box<dyn FileSystem>>,
    command_service: Option<Box<dyn FileSystem>>,
}

impl RegistryBuilder {
    /// Append a provider.
    pub fn provider(mut self, provider: impl FileSystem + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Set the provider for `cs:` paths.
    pub fn command_service(mut self, provider: impl FileSystem + 'static) -> Self {
        self.command_service = Some(Box::new(provider));
        self
    }

    /// Finish; the registry cannot change afterwards.
    pub fn build(self) -> Registry {
        Registry {
            local: self.local,
            providers: self.providers,
            command_service: self.command_service,
        }
    }
}
