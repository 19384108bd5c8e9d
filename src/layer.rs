//! # Layer Trait
//!
//! Decoding wrappers applied over a raw byte stream.
//!
//! ## How It Works
//!
//! ```text
//! raw bytes ──▶ StreamLayer::layer() ──▶ decoded stream (browsable)
//! ```
//!
//! A container provider owns one layer (a disk-image unpacker, a tape-image
//! reader). Stream composition asks the node for its layer and wraps the outer
//! file's raw stream with it. Layers may be stacked; each one sees the output
//! of the previous.

use crate::stream::ByteStream;
use crate::VfsError;

/// A decoder that turns a raw stream into a decoded one.
///
/// # Example
///
/// ```rust
/// use iecdrive::{ByteStream, StreamLayer, VfsError};
///
/// // Passes bytes through untouched.
/// struct Identity;
///
/// impl StreamLayer for Identity {
///     fn layer(
///         &self,
///         raw: Box<dyn ByteStream>,
///         _source: &str,
///     ) -> Result<Box<dyn ByteStream>, VfsError> {
///         Ok(raw)
///     }
/// }
/// ```
pub trait StreamLayer: Send + Sync {
    /// Wrap `raw`, the bytes of the file at `source`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::CorruptedData`] if the bytes are not in the layer's format
    fn layer(&self, raw: Box<dyn ByteStream>, source: &str)
    -> Result<Box<dyn ByteStream>, VfsError>;
}

/// Fluent layering on boxed streams.
pub trait LayerExt: Sized {
    /// Apply `layer` to this stream.
    fn layer(self, layer: &dyn StreamLayer, source: &str) -> Result<Box<dyn ByteStream>, VfsError>;
}

impl LayerExt for Box<dyn ByteStream> {
    fn layer(self, layer: &dyn StreamLayer, source: &str) -> Result<Box<dyn ByteStream>, VfsError> {
        layer.layer(self, source)
    }
}

/// Apply `layers` in order, innermost first.
pub fn apply_layers(
    raw: Box<dyn ByteStream>,
    layers: &[&dyn StreamLayer],
    source: &str,
) -> Result<Box<dyn ByteStream>, VfsError> {
    layers
        .iter()
        .try_fold(raw, |stream, layer| stream.layer(*layer, source))
}
