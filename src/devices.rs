//! Device selection.
//!
//! The drive answers on several device numbers, each with its own base url
//! and position. [`DeviceStore`] is the collaborator that remembers them;
//! [`DeviceTable`] is an in-memory implementation built from
//! [`DriveConfig`].

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::DriveConfig;

/// Mapping from device number to base url, with a current selection.
pub trait DeviceStore: Send {
    /// Select `device`. Returns `true` when the selection changed.
    fn select(&mut self, device: u8) -> bool;

    /// Base url of the selected device.
    fn base_url(&self) -> String;

    /// Selected device number.
    fn device(&self) -> u8;

    /// Media slot of the selected device.
    fn media(&self) -> u8 {
        0
    }

    /// Partition of the selected device.
    fn partition(&self) -> u8 {
        0
    }

    /// Persist the current selection.
    fn save(&mut self) {}

    /// Remember `url` as the position of the selected device.
    fn set_url(&mut self, url: &str) {
        let _ = url;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DeviceRecord {
    url: String,
    media: u8,
    partition: u8,
}

/// In-memory [`DeviceStore`].
#[derive(Debug, Clone)]
pub struct DeviceTable {
    records: BTreeMap<u8, DeviceRecord>,
    current: u8,
    saves: usize,
}

impl DeviceTable {
    /// A table with only the default device, rooted at local storage.
    pub fn new(default_device: u8) -> Self {
        let mut records = BTreeMap::new();
        records.insert(default_device, DeviceRecord::default());
        Self {
            records,
            current: default_device,
            saves: 0,
        }
    }

    /// Build from configuration. Device keys that are not numbers are ignored.
    pub fn from_config(config: &DriveConfig) -> Self {
        let mut table = Self::new(config.default_device);
        for (key, url) in &config.devices {
            if let Ok(device) = key.parse::<u8>() {
                table.records.insert(
                    device,
                    DeviceRecord {
                        url: url.clone(),
                        ..DeviceRecord::default()
                    },
                );
            }
        }
        table
    }

    /// How many times [`save`](DeviceStore::save) was called.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl DeviceStore for DeviceTable {
    fn select(&mut self, device: u8) -> bool {
        if device == self.current {
            return false;
        }
        self.records.entry(device).or_default();
        self.current = device;
        debug!(device, "device selected");
        true
    }

    fn base_url(&self) -> String {
        self.records
            .get(&self.current)
            .map(|r| r.url.clone())
            .unwrap_or_default()
    }

    fn device(&self) -> u8 {
        self.current
    }

    fn media(&self) -> u8 {
        self.records.get(&self.current).map_or(0, |r| r.media)
    }

    fn partition(&self) -> u8 {
        self.records.get(&self.current).map_or(0, |r| r.partition)
    }

    fn save(&mut self) {
        self.saves += 1;
    }

    fn set_url(&mut self, url: &str) {
        self.records.entry(self.current).or_default().url = url.to_string();
    }
}
