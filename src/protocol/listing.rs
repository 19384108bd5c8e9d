//! BASIC-program shaped responses: directory listings and the device
//! information and status blocks.
//!
//! ```text
//! 01 08                     load address
//! [ptr lo hi][n lo hi] text 00    one line, ptr advanced by len(text) + 5
//! ...
//! 00 00(EOI)                end of program
//! ```

use tracing::{debug, warn};

use crate::error::BusError;
use crate::protocol::bus::{IecBus, InfoSection};
use crate::registry::Registry;
use crate::traits::VirtualFile;
use crate::types::{MediaInfo, BLOCK_SIZE};

/// Where the C64 loads a BASIC program.
pub(crate) const BASIC_START: u16 = 0x0801;

const REVERSE_ON: &str = "\x12";
const DEL_DEL: &str = "\x14\x14";
const NAME_WIDTH: usize = 16;
const SEPARATOR_LINE: &str = "\"-------------------\" NFO";
const CLOSING_LINE: &str = "\"===================\" NFO";

/// Text as bus bytes; characters outside one byte become `?`.
fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Emits program lines with a running line pointer.
pub(crate) struct LineWriter<'a, B: IecBus> {
    bus: &'a mut B,
    ptr: u16,
    bytes: usize,
}

impl<'a, B: IecBus> LineWriter<'a, B> {
    /// Send the load address and start at [`BASIC_START`].
    pub(crate) fn start(bus: &'a mut B) -> Result<Self, BusError> {
        let [lo, hi] = BASIC_START.to_le_bytes();
        bus.send(lo)?;
        bus.send(hi)?;
        Ok(Self {
            bus,
            ptr: BASIC_START,
            bytes: 2,
        })
    }

    pub(crate) fn line(&mut self, number: u16, text: &str) -> Result<(), BusError> {
        let text = encode(text);
        self.ptr = self.ptr.wrapping_add(text.len() as u16 + 5);
        for b in self
            .ptr
            .to_le_bytes()
            .into_iter()
            .chain(number.to_le_bytes())
            .chain(text)
            .chain([0])
        {
            self.bus.send(b)?;
            self.bytes += 1;
        }
        Ok(())
    }

    /// Terminate the program; the last zero goes out with EOI.
    pub(crate) fn finish(self) -> Result<usize, BusError> {
        self.bus.send(0)?;
        self.bus.send_eoi(0)?;
        Ok(self.bytes + 2)
    }
}

/// Values the listing header needs from the drive.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListingOptions<'a> {
    pub(crate) product: &'a str,
    pub(crate) device: u8,
    pub(crate) show_hidden: bool,
}

pub(crate) fn header_text(media: &MediaInfo, product: &str, device: u8) -> String {
    if media.header.is_empty() {
        let pad = " ".repeat(NAME_WIDTH.saturating_sub(product.len()) / 2);
        format!("{REVERSE_ON}\"{pad}{product}{pad}\" {device:02} 2A")
    } else {
        let pad = " ".repeat(NAME_WIDTH.saturating_sub(media.header.len()) / 2);
        format!("{REVERSE_ON}\"{pad}{}{pad}\" {}", media.header, media.id)
    }
}

pub(crate) fn info_line(text: &str) -> String {
    format!("\"{text:<19}\" NFO")
}

/// Block count and text of one entry line.
pub(crate) fn entry_line(name: &str, size: u64, is_dir: bool, tag: &str) -> (u16, String) {
    let mut blocks = u16::try_from(size / u64::from(BLOCK_SIZE)).unwrap_or(u16::MAX);
    if !is_dir {
        blocks = blocks.max(1);
    }
    let indent = 3 - usize::from(blocks > 9) - usize::from(blocks > 99) - usize::from(blocks > 999);
    let pad = NAME_WIDTH.saturating_sub(name.chars().count());
    let text = format!("{:indent$}\"{name}\"{:pad$} {tag:>3}", "", "");
    (blocks, text)
}

/// Listing tag: `DIR`, the type tag, the extension, or `PRG`.
fn entry_tag(node: &dyn VirtualFile, is_dir: bool) -> String {
    if is_dir {
        return "DIR".to_string();
    }
    let info = node.info();
    if let Some(tag) = &info.type_tag {
        return tag.clone();
    }
    if info.url.extension.is_empty() {
        "PRG".to_string()
    } else {
        info.url.extension.to_ascii_uppercase()
    }
}

fn next_child(dir: &mut dyn VirtualFile, vfs: &Registry) -> Option<Box<dyn VirtualFile>> {
    match dir.next_child(vfs) {
        Ok(child) => child,
        Err(e) => {
            warn!(url = dir.info().url(), error = %e, "listing stopped");
            None
        }
    }
}

/// Send the listing of `dir`.
///
/// Returns the number of bytes sent, or `None` when the directory had no
/// entries and "file not found" was signalled instead.
pub(crate) fn send_listing<B: IecBus>(
    bus: &mut B,
    dir: &mut dyn VirtualFile,
    vfs: &Registry,
    opts: ListingOptions<'_>,
) -> Result<Option<usize>, BusError> {
    if let Err(e) = dir.rewind_directory() {
        warn!(url = dir.info().url(), error = %e, "rewind failed");
    }
    let Some(first) = next_child(dir, vfs) else {
        bus.send_fnf()?;
        return Ok(None);
    };
    let media = dir.media(vfs).unwrap_or_else(|e| {
        warn!(url = dir.info().url(), error = %e, "no media info");
        MediaInfo::default()
    });

    let mut w = LineWriter::start(bus)?;
    w.line(0, &header_text(&media, opts.product, opts.device))?;

    let url = dir.info().url.clone();
    let mut sent_info = false;
    if !url.url().is_empty() {
        w.line(0, &info_line("[URL]"))?;
        w.line(0, &info_line(url.url()))?;
        sent_info = true;
    }
    if url.path.len() > 1 {
        w.line(0, &info_line("[PATH]"))?;
        w.line(0, &info_line(&url.path))?;
        sent_info = true;
    }
    if !media.image.is_empty() {
        w.line(0, &info_line("[IMAGE]"))?;
        w.line(0, &info_line(&media.image))?;
        sent_info = true;
    }
    if sent_info {
        w.line(0, SEPARATOR_LINE)?;
    }

    let mut entry = Some(first);
    while let Some(child) = entry {
        let name = &child.info().url.name;
        if opts.show_hidden || !name.starts_with('.') {
            let is_dir = child.is_directory(vfs).unwrap_or(false);
            let size = child.size(vfs).unwrap_or(0);
            let (blocks, text) = entry_line(name, size, is_dir, &entry_tag(child.as_ref(), is_dir));
            w.line(blocks, &text)?;
        }
        entry = next_child(dir, vfs);
    }

    if media.block_size > BLOCK_SIZE {
        w.line(0, SEPARATOR_LINE)?;
        w.line(0, &info_line("[BLOCK SIZE]"))?;
        w.line(0, &info_line(&format!("{} BYTES", media.block_size)))?;
        w.line(0, CLOSING_LINE)?;
    }
    w.line(media.blocks_free, "BLOCKS FREE.")?;

    let bytes = w.finish()?;
    debug!(url = url.url(), bytes, "listing sent");
    Ok(Some(bytes))
}

fn banner(product: &str, version: &str) -> String {
    format!("{DEL_DEL}{REVERSE_ON} {product} V{version} ")
}

/// Send the `@INFO` block.
pub(crate) fn send_device_info<B: IecBus>(
    bus: &mut B,
    product: &str,
    version: &str,
    sections: &[InfoSection],
) -> Result<usize, BusError> {
    let mut w = LineWriter::start(bus)?;
    w.line(0, &banner(product, version))?;
    for section in sections {
        w.line(0, &format!("{DEL_DEL}{} ---", section.title))?;
        for (label, value) in &section.fields {
            w.line(0, &format!("{DEL_DEL}{label:<11}: {value}"))?;
        }
    }
    w.finish()
}

/// Send the `@STAT` block.
pub(crate) fn send_device_status<B: IecBus>(
    bus: &mut B,
    product: &str,
    version: &str,
    fields: &[(&str, String)],
) -> Result<usize, BusError> {
    let mut w = LineWriter::start(bus)?;
    w.line(0, &banner(product, version))?;
    for (label, value) in fields {
        w.line(0, &format!("{DEL_DEL}{label:<10}: {value}"))?;
    }
    w.finish()
}
