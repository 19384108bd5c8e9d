//! # Backends
//!
//! Providers for the universal namespace.
//!
//! | Provider | Claims | Node |
//! |----------|--------|------|
//! | [`LocalFileSystem`] | nothing (fallback) | [`LocalFile`] |
//! | [`RemoteFileSystem`] | `http:`, `https:`, `smb:`, `cs:` | [`RemoteFile`] |
//! | [`RedirectFileSystem`] | `.url` | [`RedirectFile`] |
//!
//! Disk and tape images are served by [`ContainerFileSystem`](crate::ContainerFileSystem).

mod local;
mod redirect;
mod remote;

pub use local::{LocalFile, LocalFileSystem};
pub use redirect::{RedirectFile, RedirectFileSystem};
pub use remote::{RemoteFile, RemoteFileSystem, RemoteKind, Transport};
