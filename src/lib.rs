//! # iecdrive
//!
//! A Commodore serial-bus (IEC) drive over a url-addressed **virtual
//! filesystem**.
//!
//! The drive answers OPEN, TALK and LISTEN from a C64 and serves files,
//! BASIC-shaped directory listings and status text from whatever the path
//! names: local storage, an HTTP server, a network share, a remote command
//! service, or an entry inside a disk or tape image found on any of those.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iecdrive::{ContainerFileSystem, LocalFileSystem, RedirectFileSystem, Registry, VirtualFileExt};
//!
//! let vfs = Registry::builder(LocalFileSystem::new("/srv/c64"))
//!     .provider(ContainerFileSystem)
//!     .provider(RedirectFileSystem)
//!     .build();
//!
//! // An entry inside a disk image, read like any other file.
//! let program = vfs.resolve("/GAMES/ARCADE.D64/ELITE")?.read_all(&vfs)?;
//! assert_eq!(&program[..2], &[0x01, 0x08]);
//! # Ok::<(), iecdrive::VfsError>(())
//! ```
//!
//! A [`Drive`] is built from the shared registry, a bus implementing
//! [`IecBus`] and a [`DriveConfig`], and is then polled with
//! [`Drive::service`].
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Registry`] | Maps a path to the provider that serves it |
//! | [`FileSystem`] | A provider claiming a class of path segments |
//! | [`VirtualFile`] | One addressable item, whatever backend serves it |
//! | [`NodeInfo`] | Url plus the `stream_path` / `path_in_stream` split |
//! | [`ByteStream`] | Content stream with optional [`Browsable`] / [`RandomAccess`] |
//! | [`Drive`] | Bus protocol controller |
//! | [`VfsError`] | Filesystem error type with context |
//!
//! ---
//!
//! ## Path Resolution
//!
//! ```text
//! smb://nas/c64/games.d64/ELITE
//!                └──┬───┘
//!         claimed by the image provider
//!
//! stream_path    = smb://nas/c64/games.d64   (fetched over the share)
//! path_in_stream = ELITE                     (looked up inside the image)
//! ```
//!
//! Segments are scanned from last to first, so the innermost claim wins.
//! Unclaimed paths belong to local storage.
//!
//! ---
//!
//! ## Trait Composition
//!
//! ```text
//! FileMeta + FileDir + FileWrite + FileRead = VirtualFile
//! ```
//!
//! [`VirtualFile`] has a blanket implementation. Every method that may need
//! another backend takes the [`Registry`] as a parameter; nodes never keep a
//! reference to it.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | JSON configuration ([`DriveConfig::from_json`]), serializable [`Metadata`], [`DirEntry`], [`MediaInfo`], [`VirtualFileExtJson`] |
//!
//! ---
//!
//! ## Logging
//!
//! Diagnostics go through `tracing`. The crate installs no subscriber.

// Private modules
mod backends;
mod config;
mod devices;
mod error;
mod ext;
mod layer;
mod media;
mod node;
mod protocol;
mod registry;
mod stream;
mod traits;
mod types;
mod url;

// Public re-exports - error types
pub use error::{BusError, VfsError};

// Public re-exports - core types
pub use node::{NodeInfo, SEPARATOR};
pub use types::{DirEntry, FileType, MediaInfo, Metadata, BLOCK_SIZE};
pub use url::UrlPath;

// Public re-exports - node traits
pub use traits::{FileDir, FileMeta, FileRead, FileWrite, VirtualFile};

// Public re-exports - streams
pub use layer::{apply_layers, LayerExt, StreamLayer};
pub use stream::{open_input, Browsable, ByteStream, PlainStream, RandomAccess, SeekableStream};

// Public re-exports - registry and providers
pub use backends::{
    LocalFile, LocalFileSystem, RedirectFile, RedirectFileSystem, RemoteFile, RemoteFileSystem,
    RemoteKind, Transport,
};
pub use media::{ContainerFile, ContainerFileSystem, D64Image, Image, ImageKind, ImageStream, T64Image};
pub use registry::{segment_has_extension, FileSystem, Registry, RegistryBuilder, COMMAND_SERVICE_TOKEN};

// Public re-exports - drive
pub use config::{DriveConfig, PRODUCT_ID};
pub use devices::{DeviceStore, DeviceTable};
pub use protocol::{
    AtnCheck, BusCommand, CommandCode, DataMode, Drive, IecBus, InfoSection, LineState, Platform,
    ProtocolState, Received, StatusCode, StdPlatform, Transfer, BOOT_ENTRY, CMD_CHANNEL,
    INFO_TOKEN, LIST_TOKEN, STAT_TOKEN, WILDCARD_TOKEN,
};

// Public re-exports - infrastructure
pub use ext::VirtualFileExt;

// Conditional re-exports
#[cfg(feature = "serde")]
pub use ext::VirtualFileExtJson;
