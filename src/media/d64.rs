//! 1541 disk images.
//!
//! ```text
//! track 18, sector 0   BAM: free-block counts, disk name, id
//! track 18, sector 1+  directory chain, 8 entries of 32 bytes per sector
//! other sectors        file data chains: [next track, next sector, 254 bytes]
//! ```
//!
//! Images of 35 or 40 tracks are accepted, with or without the trailing error
//! table.

use crate::media::{petscii_name, type_name, Image};
use crate::types::{DirEntry, MediaInfo, BLOCK_SIZE};
use crate::VfsError;

const SECTOR_SIZE: usize = 256;
const DIR_TRACK: u8 = 18;
const ENTRY_SIZE: usize = 32;
const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / ENTRY_SIZE;

/// BAM offsets within track 18 sector 0.
const BAM_ENTRIES: usize = 0x04;
const DISK_NAME: usize = 0x90;
const DISK_ID: usize = 0xA2;
const DOS_TYPE: usize = 0xA5;

/// Sectors on `track` (1-based).
fn sectors_per_track(track: u8) -> u8 {
    match track {
        1..=17 => 21,
        18..=24 => 19,
        25..=30 => 18,
        _ => 17,
    }
}

/// A parsed D64 image.
#[derive(Debug)]
pub struct D64Image {
    data: Vec<u8>,
    source: String,
    tracks: u8,
    media: MediaInfo,
    entries: Vec<(DirEntry, u8, u8)>,
}

impl D64Image {
    /// Parse `data`, the bytes of the image at `source`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::CorruptedData`] if the size matches no known layout or the
    ///   directory chain is broken
    pub fn parse(data: Vec<u8>, source: &str) -> Result<Self, VfsError> {
        let tracks = match data.len() {
            174_848 | 175_531 => 35,
            196_608 | 197_376 => 40,
            len => {
                return Err(VfsError::CorruptedData {
                    path: source.to_string(),
                    details: format!("unexpected disk image size {len}"),
                });
            }
        };

        let mut image = Self {
            data,
            source: source.to_string(),
            tracks,
            media: MediaInfo::default(),
            entries: Vec::new(),
        };
        image.media = image.read_bam()?;
        image.entries = image.read_directory()?;
        Ok(image)
    }

    fn corrupt(&self, details: impl Into<String>) -> VfsError {
        VfsError::CorruptedData {
            path: self.source.clone(),
            details: details.into(),
        }
    }

    fn total_sectors(&self) -> usize {
        (1..=self.tracks).map(|t| sectors_per_track(t) as usize).sum()
    }

    fn sector(&self, track: u8, sector: u8) -> Result<&[u8], VfsError> {
        if track == 0 || track > self.tracks || sector >= sectors_per_track(track) {
            return Err(self.corrupt(format!("bad block {track}/{sector}")));
        }
        let index: usize = (1..track).map(|t| sectors_per_track(t) as usize).sum::<usize>()
            + sector as usize;
        let start = index * SECTOR_SIZE;
        Ok(&self.data[start..start + SECTOR_SIZE])
    }

    fn read_bam(&self) -> Result<MediaInfo, VfsError> {
        let bam = self.sector(DIR_TRACK, 0)?;
        let blocks_free = (1..=35u8)
            .filter(|&t| t != DIR_TRACK)
            .map(|t| bam[BAM_ENTRIES + 4 * (t as usize - 1)] as u16)
            .sum();
        let id = format!(
            "{} {}",
            petscii_name(&bam[DISK_ID..DISK_ID + 2]),
            petscii_name(&bam[DOS_TYPE..DOS_TYPE + 2])
        );
        Ok(MediaInfo {
            header: petscii_name(&bam[DISK_NAME..DISK_NAME + 16]),
            id,
            image: String::new(),
            blocks_free,
            block_size: BLOCK_SIZE,
        })
    }

    fn read_directory(&self) -> Result<Vec<(DirEntry, u8, u8)>, VfsError> {
        let mut entries = Vec::new();
        let (mut track, mut sector) = (DIR_TRACK, 1);
        let mut visited = 0;

        while track != 0 {
            visited += 1;
            if visited > self.total_sectors() {
                return Err(self.corrupt("directory chain loops"));
            }
            let block = self.sector(track, sector)?;
            for slot in 0..ENTRIES_PER_SECTOR {
                let raw = &block[slot * ENTRY_SIZE..(slot + 1) * ENTRY_SIZE];
                let kind = raw[2];
                if kind == 0 {
                    continue;
                }
                let blocks = u16::from_le_bytes([raw[30], raw[31]]);
                let entry = DirEntry {
                    name: petscii_name(&raw[5..21]),
                    file_type: crate::FileType::File,
                    size: blocks as u64 * SECTOR_SIZE as u64,
                    type_tag: Some(type_name(kind).to_string()),
                };
                entries.push((entry, raw[3], raw[4]));
            }
            (track, sector) = (block[0], block[1]);
        }
        Ok(entries)
    }
}

impl Image for D64Image {
    fn media(&self) -> MediaInfo {
        self.media.clone()
    }

    fn entries(&self) -> Vec<DirEntry> {
        self.entries.iter().map(|(e, _, _)| e.clone()).collect()
    }

    fn read_entry(&self, index: usize) -> Result<Vec<u8>, VfsError> {
        let Some((entry, mut track, mut sector)) = self.entries.get(index).cloned() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(entry.size as usize);
        let mut visited = 0;
        while track != 0 {
            visited += 1;
            if visited > self.total_sectors() {
                return Err(self.corrupt(format!("sector chain of {} loops", entry.name)));
            }
            let block = self.sector(track, sector)?;
            let (next_track, next_sector) = (block[0], block[1]);
            if next_track == 0 {
                // Last block: the sector byte is the index of the last used byte.
                let last = (next_sector as usize).max(1);
                out.extend_from_slice(&block[2..=last]);
            } else {
                out.extend_from_slice(&block[2..]);
            }
            (track, sector) = (next_track, next_sector);
        }
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Byte offset of a block in a 35-track image.
    pub(crate) fn offset(track: u8, sector: u8) -> usize {
        ((1..track).map(|t| sectors_per_track(t) as usize).sum::<usize>() + sector as usize)
            * SECTOR_SIZE
    }

    fn pad(name: &str, len: usize) -> Vec<u8> {
        let mut out = name.as_bytes().to_vec();
        out.resize(len, 0xA0);
        out
    }

    /// A 35-track image holding `files` (name, type byte, payload), each file
    /// written from track 1 upwards.
    pub(crate) fn build(disk_name: &str, files: &[(&str, u8, &[u8])]) -> Vec<u8> {
        let mut img = vec![0u8; 174_848];
        let bam = offset(18, 0);
        img[bam] = 18;
        img[bam + 1] = 1;
        img[bam + 2] = 0x41;
        for t in 1..=35u8 {
            img[bam + 4 + 4 * (t as usize - 1)] = if t == 18 { 17 } else { sectors_per_track(t) };
        }
        img[bam + DISK_NAME..bam + DISK_NAME + 16].copy_from_slice(&pad(disk_name, 16));
        img[bam + DISK_ID] = b'0';
        img[bam + DISK_ID + 1] = b'1';
        img[bam + 0xA4] = 0xA0;
        img[bam + DOS_TYPE] = b'2';
        img[bam + DOS_TYPE + 1] = b'A';

        let dir = offset(18, 1);
        img[dir] = 0;
        img[dir + 1] = 0xFF;

        let (mut track, mut sector) = (1u8, 0u8);
        for (i, (name, kind, payload)) in files.iter().enumerate() {
            let chunks: Vec<&[u8]> = payload.chunks(254).collect();
            let slot = dir + i * ENTRY_SIZE;
            img[slot + 2] = *kind;
            img[slot + 3] = track;
            img[slot + 4] = sector;
            img[slot + 5..slot + 21].copy_from_slice(&pad(name, 16));
            img[slot + 30..slot + 32].copy_from_slice(&(chunks.len() as u16).to_le_bytes());

            for (n, chunk) in chunks.iter().enumerate() {
                let here = offset(track, sector);
                let (nt, ns) = if sector + 1 < sectors_per_track(track) {
                    (track, sector + 1)
                } else {
                    (track + 1, 0)
                };
                if n + 1 == chunks.len() {
                    img[here] = 0;
                    img[here + 1] = (chunk.len() + 1) as u8;
                } else {
                    img[here] = nt;
                    img[here + 1] = ns;
                }
                img[here + 2..here + 2 + chunk.len()].copy_from_slice(chunk);
                (track, sector) = (nt, ns);
            }
        }
        img
    }

    #[test]
    fn header_and_free_blocks() {
        let img = D64Image::parse(build("TEST DISK", &[]), "t.d64").unwrap();
        let media = img.media();
        assert_eq!(media.header, "TEST DISK");
        assert_eq!(media.id, "01 2A");
        // 683 sectors, track 18 not counted.
        assert_eq!(media.blocks_free, 664);
    }

    #[test]
    fn directory_entries() {
        let img = D64Image::parse(
            build(
                "GAMES",
                &[("ELITE", 0x82, &[1, 8, 0xAA]), ("NOTES", 0x81, &[b'x'; 300])],
            ),
            "t.d64",
        )
        .unwrap();
        let entries = img.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "ELITE");
        assert_eq!(entries[0].type_tag.as_deref(), Some("PRG"));
        assert_eq!(entries[0].size, 256);
        assert_eq!(entries[1].type_tag.as_deref(), Some("SEQ"));
        assert_eq!(entries[1].size, 512);
    }

    #[test]
    fn file_chain_is_followed() {
        let payload: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
        let img = D64Image::parse(build("X", &[("BIG", 0x82, &payload)]), "t.d64").unwrap();
        assert_eq!(img.read_entry(0).unwrap(), payload);
    }

    #[test]
    fn error_table_variant_accepted() {
        let mut data = build("X", &[]);
        data.resize(175_531, 0);
        assert!(D64Image::parse(data, "t.d64").is_ok());
    }

    #[test]
    fn wrong_size_is_corrupt() {
        assert!(matches!(
            D64Image::parse(vec![0; 1000], "t.d64"),
            Err(VfsError::CorruptedData { .. })
        ));
    }

    #[test]
    fn looping_chain_is_corrupt() {
        let mut data = build("X", &[("LOOP", 0x82, &[1, 2, 3])]);
        let first = offset(1, 0);
        data[first] = 1;
        data[first + 1] = 0;
        let img = D64Image::parse(data, "t.d64").unwrap();
        assert!(matches!(
            img.read_entry(0),
            Err(VfsError::CorruptedData { .. })
        ));
    }
}
