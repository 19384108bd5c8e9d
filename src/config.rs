//! Drive configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use crate::VfsError;

/// Product name shown in listing banners.
pub const PRODUCT_ID: &str = "IECDRIVE";

/// Settings a [`Drive`](crate::Drive) and its registry are built from.
///
/// With the `serde` feature the struct deserializes from JSON; missing fields
/// take their defaults.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "serde")]
/// # {
/// use iecdrive::DriveConfig;
///
/// let config = DriveConfig::from_json(r#"{
///     "storage_root": "/srv/c64",
///     "show_hidden": true,
///     "devices": { "9": "http://example.com/c64" }
/// }"#).unwrap();
/// assert_eq!(config.default_device, 8);
/// assert!(config.show_hidden);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriveConfig {
    /// Host directory backing local storage, see
    /// [`LocalFileSystem::from_config`](crate::LocalFileSystem::from_config).
    pub storage_root: PathBuf,
    /// List entries whose name starts with `.`.
    pub show_hidden: bool,
    /// Product name used in banners.
    pub product_id: String,
    /// Version shown next to the product name.
    pub firmware_version: String,
    /// Device number selected at startup.
    pub default_device: u8,
    /// Base url per device number; devices not listed start at the storage root.
    pub devices: BTreeMap<String, String>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            show_hidden: false,
            product_id: PRODUCT_ID.to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            default_device: 8,
            devices: BTreeMap::new(),
        }
    }
}

impl DriveConfig {
    /// Parse a JSON configuration.
    ///
    /// # Errors
    ///
    /// - [`VfsError::Deserialization`] if the text is not a valid configuration
    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self, VfsError> {
        serde_json::from_str(text).map_err(|e| VfsError::Deserialization(e.to_string()))
    }

    /// Serialize to pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, VfsError> {
        serde_json::to_string_pretty(self).map_err(|e| VfsError::Serialization(e.to_string()))
    }

    /// Base url configured for `device`, if any.
    pub fn device_url(&self, device: u8) -> Option<&str> {
        self.devices.get(&device.to_string()).map(String::as_str)
    }
}
