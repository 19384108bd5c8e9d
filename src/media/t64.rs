//! Tape archives.
//!
//! A 64-byte header (`C64` signature, entry counts, tape name) followed by
//! 32-byte directory records. Each record gives a load range and the offset of
//! its data in the container; the load address itself is not stored in the
//! data and is prepended when an entry is read.

use crate::media::{petscii_name, type_name, Image};
use crate::types::{DirEntry, MediaInfo};
use crate::VfsError;

const HEADER_SIZE: usize = 0x40;
const RECORD_SIZE: usize = 32;
const MAX_ENTRIES: usize = 0x22;
const TAPE_NAME: usize = 0x28;

#[derive(Debug, Clone)]
struct Record {
    entry: DirEntry,
    start: u16,
    offset: usize,
    len: usize,
}

/// A parsed T64 archive.
#[derive(Debug)]
pub struct T64Image {
    data: Vec<u8>,
    name: String,
    records: Vec<Record>,
}

impl T64Image {
    /// Parse `data`, the bytes of the archive at `source`.
    ///
    /// Truncated data is tolerated: an entry whose end address lies beyond
    /// the container is cut at the end of the file.
    ///
    /// # Errors
    ///
    /// - [`VfsError::CorruptedData`] if the signature is missing or a record
    ///   points outside the container
    pub fn parse(data: Vec<u8>, source: &str) -> Result<Self, VfsError> {
        let corrupt = |details: String| VfsError::CorruptedData {
            path: source.to_string(),
            details,
        };
        if data.len() < HEADER_SIZE || !data.starts_with(b"C64") {
            return Err(corrupt("missing tape signature".to_string()));
        }

        let max = u16::from_le_bytes([data[MAX_ENTRIES], data[MAX_ENTRIES + 1]]) as usize;
        let name = petscii_name(&data[TAPE_NAME..HEADER_SIZE]);

        let mut records = Vec::new();
        for slot in 0..max {
            let at = HEADER_SIZE + slot * RECORD_SIZE;
            let Some(raw) = data.get(at..at + RECORD_SIZE) else {
                break;
            };
            if raw[0] == 0 {
                continue;
            }
            let start = u16::from_le_bytes([raw[2], raw[3]]);
            let end = u16::from_le_bytes([raw[4], raw[5]]);
            let offset = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize;
            if offset > data.len() {
                return Err(corrupt(format!("record {slot} starts past end of file")));
            }
            let len = (end.saturating_sub(start) as usize).min(data.len() - offset);
            let kind = match raw[1] {
                0 => 0x82,
                k => k,
            };
            records.push(Record {
                entry: DirEntry {
                    name: petscii_name(&raw[16..32]),
                    file_type: crate::FileType::File,
                    size: len as u64 + 2,
                    type_tag: Some(type_name(kind).to_string()),
                },
                start,
                offset,
                len,
            });
        }

        Ok(Self {
            data,
            name,
            records,
        })
    }
}

impl Image for T64Image {
    fn media(&self) -> MediaInfo {
        MediaInfo {
            header: self.name.clone(),
            id: "T64".to_string(),
            ..MediaInfo::default()
        }
    }

    fn entries(&self) -> Vec<DirEntry> {
        self.records.iter().map(|r| r.entry.clone()).collect()
    }

    fn read_entry(&self, index: usize) -> Result<Vec<u8>, VfsError> {
        let Some(record) = self.records.get(index) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(record.len + 2);
        out.extend_from_slice(&record.start.to_le_bytes());
        out.extend_from_slice(&self.data[record.offset..record.offset + record.len]);
        Ok(out)
    }
}
