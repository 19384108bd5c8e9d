//! # Bus Protocol
//!
//! [`Drive`] answers the commands a C64 sends on the serial bus.
//!
//! ## Flow
//!
//! ```text
//! OPEN "name"      decode the payload, pick the node, set ProtocolState
//! DATA/TALK  ch    15: status line; otherwise file, listing or info block
//! DATA/LISTEN      sync with upstream, then receive and save
//! CLOSE            log only
//! ```
//!
//! | OPEN payload | State | Current node |
//! |--------------|-------|--------------|
//! | `$...` | [`Dir`](ProtocolState::Dir) | unchanged |
//! | `...*` | [`File`](ProtocolState::File) | first matching file |
//! | a directory | [`Dir`](ProtocolState::Dir) | the directory |
//! | `CD...` | [`Dir`](ProtocolState::Dir) | the target |
//! | `@INFO` | [`DeviceInfo`](ProtocolState::DeviceInfo) | unchanged |
//! | `@STAT` | [`DeviceStatus`](ProtocolState::DeviceStatus) | unchanged |
//! | anything else | [`File`](ProtocolState::File) | the target |
//!
//! The controller never fails: problems become "file not found" on the bus
//! or a queued status code.

mod bus;
mod command;
mod listing;

pub use bus::{AtnCheck, IecBus, InfoSection, LineState, Platform, Received, StdPlatform};
pub use command::{
    BusCommand, CommandCode, DataMode, ProtocolState, StatusCode, CMD_CHANNEL, INFO_TOKEN,
    LIST_TOKEN, STAT_TOKEN, WILDCARD_TOKEN,
};

use std::io::{BufReader, Read, Write};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::DriveConfig;
use crate::devices::{DeviceStore, DeviceTable};
use crate::error::BusError;
use crate::registry::Registry;
use crate::stream::open_input;
use crate::traits::VirtualFile;
use crate::VfsError;

use command::{starts_with_ignore_case, strip_cd};
use listing::ListingOptions;

/// Entry loaded by `*` at the storage root.
pub const BOOT_ENTRY: &str = "/.sys/fb64";

/// Outcome of one file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Payload bytes sent, load address not counted.
    pub sent: u64,
    /// The host asserted ATN before the last byte.
    pub aborted: bool,
}

/// The drive controller.
///
/// Owns the bus and the current node; the registry is shared and read-only.
pub struct Drive<B> {
    bus: B,
    vfs: Arc<Registry>,
    devices: Box<dyn DeviceStore>,
    platform: Box<dyn Platform>,
    upstream: Box<dyn Read + Send>,
    config: DriveConfig,
    state: ProtocolState,
    queued: StatusCode,
    current: Box<dyn VirtualFile>,
    command: String,
    last_transfer: Option<Transfer>,
}

impl<B> std::fmt::Debug for Drive<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drive")
            .field("device", &self.devices.device())
            .field("state", &self.state)
            .field("queued", &self.queued)
            .field("current", &self.current.info().url())
            .finish_non_exhaustive()
    }
}

impl<B: IecBus> Drive<B> {
    /// A drive positioned at the base url of the selected device.
    ///
    /// # Errors
    ///
    /// - whatever resolving the base url reports
    pub fn new(
        bus: B,
        vfs: Arc<Registry>,
        devices: impl DeviceStore + 'static,
        config: DriveConfig,
    ) -> Result<Self, VfsError> {
        let current = vfs.resolve(&devices.base_url())?;
        Ok(Self {
            bus,
            vfs,
            devices: Box::new(devices),
            platform: Box::new(StdPlatform),
            upstream: Box::new(std::io::empty()),
            config,
            state: ProtocolState::default(),
            queued: StatusCode::default(),
            current,
            command: String::new(),
            last_transfer: None,
        })
    }

    /// A drive whose devices come from `config`.
    pub fn from_config(bus: B, vfs: Arc<Registry>, config: DriveConfig) -> Result<Self, VfsError> {
        let devices = DeviceTable::from_config(&config);
        Self::new(bus, vfs, devices, config)
    }

    /// Report host facts from `platform` in `@INFO`.
    pub fn with_platform(mut self, platform: impl Platform + 'static) -> Self {
        self.platform = Box::new(platform);
        self
    }

    /// Read save acknowledgments from `upstream`.
    pub fn with_upstream(mut self, upstream: impl Read + Send + 'static) -> Self {
        self.upstream = Box::new(upstream);
        self
    }

    /// The bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// The bus, mutably.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// What the next TALK will produce.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Status waiting for the command channel.
    pub fn queued(&self) -> StatusCode {
        self.queued
    }

    /// The current node.
    pub fn current(&self) -> &dyn VirtualFile {
        self.current.as_ref()
    }

    /// Payload of the last OPEN, cleared when it produced a listing.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Outcome of the most recent file transfer.
    pub fn last_transfer(&self) -> Option<Transfer> {
        self.last_transfer
    }

    /// Note that storage was reloaded behind the drive's back.
    ///
    /// The next TALK on a data channel resets the controller and sends the
    /// listing of the base url.
    pub fn request_reload(&mut self) {
        self.state = ProtocolState::Info;
    }

    /// Poll the bus once and handle what arrived.
    pub fn service(&mut self) -> AtnCheck {
        let check = self.bus.check_atn();
        match &check {
            AtnCheck::Idle => {}
            AtnCheck::Error => {
                warn!(error = %BusError::Framing, "resetting");
                self.reset();
            }
            AtnCheck::Command(cmd) => self.handle(cmd),
        }
        check
    }

    /// Handle one decoded command.
    pub fn handle(&mut self, cmd: &BusCommand) {
        debug!(device = cmd.device, channel = cmd.channel, code = ?cmd.code, "command");
        let result = match cmd.code {
            CommandCode::Open => {
                self.open(cmd);
                Ok(())
            }
            CommandCode::Data(DataMode::Talk) => self.data_talk(cmd),
            CommandCode::Data(DataMode::Listen) => self.data_listen(),
            CommandCode::Data(DataMode::Command) => {
                self.open(cmd);
                Ok(())
            }
            CommandCode::Close => {
                info!(
                    device = self.devices.device(),
                    url = self.current.info().url(),
                    "channel closed"
                );
                Ok(())
            }
            CommandCode::Listen | CommandCode::Talk | CommandCode::Unlisten | CommandCode::Untalk => {
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "bus transfer failed");
        }
    }

    /// Back to the initial state at the selected device's base url.
    pub fn reset(&mut self) {
        self.state = ProtocolState::Nothing;
        self.queued = StatusCode::Ok;
        self.command.clear();
        match self.vfs.resolve(&self.devices.base_url()) {
            Ok(node) => self.current = node,
            Err(e) => warn!(error = %e, "base url did not resolve"),
        }
    }

    fn commit(&mut self, node: Box<dyn VirtualFile>) {
        self.current = node;
    }

    fn enter(&mut self, node: Box<dyn VirtualFile>) -> ProtocolState {
        self.devices.set_url(node.info().url());
        self.commit(node);
        ProtocolState::Dir
    }

    fn open(&mut self, cmd: &BusCommand) {
        if self.devices.select(cmd.device) {
            match self.vfs.resolve(&self.devices.base_url()) {
                Ok(node) => self.current = node,
                Err(e) => {
                    warn!(device = cmd.device, error = %e, "base url did not resolve");
                    self.state = ProtocolState::FileErr;
                    return;
                }
            }
        }

        let payload = cmd.payload.as_str();
        self.command = payload.to_string();

        let state = if payload.starts_with(LIST_TOKEN) {
            ProtocolState::Dir
        } else if let Some(prefix) = payload.strip_suffix(WILDCARD_TOKEN) {
            self.load_first(prefix)
        } else {
            self.open_named(payload)
        };

        if state == ProtocolState::Dir {
            self.command.clear();
        }
        self.state = state;
        info!(payload, state = ?state, url = self.current.info().url(), "open");
    }

    fn open_named(&mut self, payload: &str) -> ProtocolState {
        let vfs = Arc::clone(&self.vfs);
        let (cd, rest) = strip_cd(payload);
        let requested = match self.current.cd(rest, &vfs) {
            Ok(node) => node,
            Err(e) => {
                debug!(payload, error = %e, "request did not resolve");
                return ProtocolState::FileErr;
            }
        };

        if requested.is_directory(&vfs).unwrap_or(false) || cd {
            self.enter(requested)
        } else if starts_with_ignore_case(payload, INFO_TOKEN) {
            ProtocolState::DeviceInfo
        } else if starts_with_ignore_case(payload, STAT_TOKEN) {
            ProtocolState::DeviceStatus
        } else {
            self.commit(requested);
            ProtocolState::File
        }
    }

    /// `*` handling: the first non-hidden file whose name starts with the
    /// last segment of `prefix`.
    fn load_first(&mut self, prefix: &str) -> ProtocolState {
        let prefix = prefix.rsplit('/').next().unwrap_or(prefix);
        let vfs = Arc::clone(&self.vfs);
        let url = &self.current.info().url;
        if url.is_root() && url.scheme.is_empty() {
            return match vfs.resolve(BOOT_ENTRY) {
                Ok(node) => {
                    self.commit(node);
                    ProtocolState::File
                }
                Err(_) => ProtocolState::FileErr,
            };
        }

        if let Err(e) = self.current.rewind_directory() {
            debug!(error = %e, "rewind failed");
        }
        loop {
            let child = match self.current.next_child(&vfs) {
                Ok(Some(child)) => child,
                Ok(None) => return ProtocolState::FileErr,
                Err(e) => {
                    warn!(error = %e, "listing failed");
                    return ProtocolState::FileErr;
                }
            };
            let name = &child.info().url.name;
            if (!self.config.show_hidden && name.starts_with('.'))
                || !starts_with_ignore_case(name, prefix)
                || child.is_directory(&vfs).unwrap_or(true)
            {
                continue;
            }
            return match vfs.resolve(child.info().url()) {
                Ok(node) => {
                    self.commit(node);
                    ProtocolState::File
                }
                Err(_) => ProtocolState::FileErr,
            };
        }
    }

    fn data_talk(&mut self, cmd: &BusCommand) -> Result<(), BusError> {
        if cmd.channel == CMD_CHANNEL {
            if !cmd.payload.is_empty() {
                self.open(cmd);
            }
            self.send_status()?;
            self.queued = StatusCode::Ok;
            return Ok(());
        }

        match self.state {
            ProtocolState::Nothing | ProtocolState::FileErr => self.bus.send_fnf(),
            ProtocolState::File => self.send_file().map(|_| ()),
            ProtocolState::Info => {
                self.reset();
                self.send_listing()
            }
            ProtocolState::Dir => self.send_listing(),
            ProtocolState::DeviceInfo => listing::send_device_info(
                &mut self.bus,
                &self.config.product_id,
                &self.config.firmware_version,
                &self.platform.info(),
            )
            .map(|_| ()),
            ProtocolState::DeviceStatus => {
                let url = &self.current.info().url;
                let fields = [
                    ("DEVICE", self.devices.device().to_string()),
                    ("MEDIA", self.devices.media().to_string()),
                    ("PARTITION", self.devices.partition().to_string()),
                    ("URL", url.url().to_string()),
                    ("PATH", url.path.clone()),
                    ("FILENAME", url.name.clone()),
                ];
                listing::send_device_status(
                    &mut self.bus,
                    &self.config.product_id,
                    &self.config.firmware_version,
                    &fields,
                )
                .map(|_| ())
            }
        }
    }

    fn send_listing(&mut self) -> Result<(), BusError> {
        let opts = ListingOptions {
            product: &self.config.product_id,
            device: self.devices.device(),
            show_hidden: self.config.show_hidden,
        };
        listing::send_listing(&mut self.bus, self.current.as_mut(), &self.vfs, opts).map(|_| ())
    }

    fn send_status(&mut self) -> Result<(), BusError> {
        let line = self.queued.status_line();
        debug!(status = %self.queued, "status");
        if let Some((last, rest)) = line.split_last() {
            for &b in rest {
                self.bus.send(b)?;
            }
            self.bus.send_eoi(*last)?;
        }
        Ok(())
    }

    /// Stream the current node: load address, then the payload with the
    /// last byte under EOI. Stops early when the host asserts ATN.
    fn send_file(&mut self) -> Result<Option<Transfer>, BusError> {
        self.devices.save();
        let vfs = Arc::clone(&self.vfs);
        let url = self.current.info().url().to_string();

        if !self.current.exists(&vfs).unwrap_or(false) {
            debug!(url, "no such file");
            self.bus.send_fnf()?;
            return Ok(None);
        }
        let input = match open_input(self.current.as_ref(), &vfs) {
            Ok(input) => input,
            Err(e) => {
                warn!(url, error = %e, "open failed");
                self.bus.send_fnf()?;
                return Ok(None);
            }
        };

        let mut bytes = BufReader::new(input).bytes();
        let mut read_error = false;
        let mut next = |url: &str| match bytes.next() {
            Some(Ok(b)) => Some(b),
            Some(Err(e)) => {
                warn!(url, error = %e, "read failed");
                read_error = true;
                None
            }
            None => None,
        };

        let (Some(lo), Some(hi)) = (next(&url), next(&url)) else {
            warn!(url, "no load address");
            self.bus.send_fnf()?;
            return Ok(None);
        };

        let mut sent = 0u64;
        let mut aborted = false;
        self.bus.send(lo)?;
        let mut pending = next(&url);
        if pending.is_none() {
            self.bus.send_eoi(hi)?;
        } else {
            self.bus.send(hi)?;
        }
        while let Some(byte) = pending {
            pending = next(&url);
            if pending.is_none() {
                self.bus.send_eoi(byte)?;
            } else {
                self.bus.send(byte)?;
            }
            sent += 1;
            if pending.is_some() && self.bus.atn_line() == LineState::Asserted {
                aborted = true;
                break;
            }
        }
        drop(next);
        aborted |= read_error;

        let transfer = Transfer { sent, aborted };
        if aborted {
            info!(url, sent, "transfer aborted");
        } else {
            info!(url, sent, "transfer finished");
        }
        self.last_transfer = Some(transfer);
        Ok(Some(transfer))
    }

    fn data_listen(&mut self) -> Result<(), BusError> {
        match read_sync(&mut self.upstream) {
            Ok(code) => {
                self.queued = StatusCode::from_code(code);
                if self.queued == StatusCode::Ok {
                    self.save()?;
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "response not sync");
                self.queued = StatusCode::SerialComm;
                self.bus.send_fnf()
            }
        }
    }

    /// Receive bytes until EOI into the current node.
    fn save(&mut self) -> Result<(), BusError> {
        let vfs = Arc::clone(&self.vfs);
        let url = self.current.info().url().to_string();
        let mut output = match self.current.open_output(&vfs) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(url, error = %e, "cannot write");
                self.queued = StatusCode::WriteError;
                None
            }
        };

        let mut received = 0u64;
        loop {
            let Received { byte, eoi } = match self.bus.receive() {
                Ok(r) => r,
                Err(e) => {
                    self.queued = StatusCode::WriteError;
                    return Err(e);
                }
            };
            received += 1;
            if let Some(out) = output.as_mut() {
                if let Err(e) = out.write_all(&[byte]) {
                    warn!(url, error = %e, "write failed");
                    self.queued = StatusCode::WriteError;
                    output = None;
                }
            }
            if eoi {
                break;
            }
        }

        if let Some(mut out) = output {
            if let Err(e) = out.flush() {
                warn!(url, error = %e, "flush failed");
                self.queued = StatusCode::WriteError;
                return Ok(());
            }
            info!(url, bytes = received, "file saved");
        }
        Ok(())
    }
}

/// Read the acknowledgment `'>' code x` and return `code`.
fn read_sync(upstream: &mut dyn Read) -> Result<u8, BusError> {
    let mut marker = [0u8; 1];
    upstream
        .read_exact(&mut marker)
        .map_err(|e| BusError::SyncMismatch {
            details: e.to_string(),
        })?;
    if marker[0] != b'>' {
        return Err(BusError::SyncMismatch {
            details: format!("unexpected byte {:#04x}", marker[0]),
        });
    }
    let mut reply = [0u8; 2];
    upstream
        .read_exact(&mut reply)
        .map_err(|_| BusError::SyncMismatch {
            details: "short response".to_string(),
        })?;
    Ok(reply[0])
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;

    use super::bus::tests::{MockBus, Sent};
    use super::*;
    use crate::backends::{LocalFileSystem, RedirectFileSystem};
    use crate::media::ContainerFileSystem;

    fn setup() -> (tempfile::TempDir, Arc<Registry>) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("GAMES")).unwrap();
        fs::write(dir.path().join("GAMES/ELITE.PRG"), [0x01, 0x08, 1, 2, 3, 4]).unwrap();
        fs::write(dir.path().join("GAMES/.hidden"), [0x01, 0x08, 9]).unwrap();
        fs::create_dir(dir.path().join("GAMES/SUB")).unwrap();
        fs::write(dir.path().join("README"), b"hello").unwrap();
        fs::write(dir.path().join("EMPTY.PRG"), b"").unwrap();
        fs::write(dir.path().join("STUB.PRG"), [0x01, 0x08]).unwrap();
        let vfs = Registry::builder(LocalFileSystem::new(dir.path()))
            .provider(ContainerFileSystem)
            .provider(RedirectFileSystem)
            .build();
        (dir, Arc::new(vfs))
    }

    fn drive(vfs: &Arc<Registry>) -> Drive<MockBus> {
        Drive::new(
            MockBus::default(),
            Arc::clone(vfs),
            DeviceTable::new(8),
            DriveConfig::default(),
        )
        .unwrap()
    }

    fn talk(d: &mut Drive<MockBus>, channel: u8) {
        d.handle(&BusCommand::data(8, channel, DataMode::Talk));
    }

    #[test]
    fn starts_idle_at_storage_root() {
        let (_dir, vfs) = setup();
        let d = drive(&vfs);
        assert_eq!(d.state(), ProtocolState::Nothing);
        assert_eq!(d.queued(), StatusCode::Ok);
        assert!(d.current().info().url.is_root());
    }

    #[test]
    fn list_token_keeps_current() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "$"));
        assert_eq!(d.state(), ProtocolState::Dir);
        assert_eq!(d.current().info().url(), "");
        assert_eq!(d.command(), "");
    }

    #[test]
    fn directory_name_enters_it() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        assert_eq!(d.state(), ProtocolState::Dir);
        assert_eq!(d.current().info().url(), "/GAMES");
    }

    #[test]
    fn cd_prefix_commits_target() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 15, "CD:GAMES"));
        assert_eq!(d.current().info().url(), "/GAMES");
        d.handle(&BusCommand::open(8, 15, "CD_"));
        assert_eq!(d.state(), ProtocolState::Dir);
        assert_eq!(d.current().info().url(), "");
    }

    #[test]
    fn file_name_selects_file() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "README"));
        assert_eq!(d.state(), ProtocolState::File);
        assert_eq!(d.current().info().url(), "/README");
        assert_eq!(d.command(), "README");
    }

    #[test]
    fn info_and_status_keep_current() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        d.handle(&BusCommand::open(8, 0, "@INFO"));
        assert_eq!(d.state(), ProtocolState::DeviceInfo);
        assert_eq!(d.current().info().url(), "/GAMES");
        d.handle(&BusCommand::open(8, 0, "@stat"));
        assert_eq!(d.state(), ProtocolState::DeviceStatus);
        assert_eq!(d.current().info().url(), "/GAMES");
    }

    #[test]
    fn wildcard_skips_directories_and_hidden() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        d.handle(&BusCommand::open(8, 0, "*"));
        assert_eq!(d.state(), ProtocolState::File);
        assert_eq!(d.current().info().url(), "/GAMES/ELITE.PRG");
    }

    #[test]
    fn wildcard_prefix_without_match() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        d.handle(&BusCommand::open(8, 0, "ZZ*"));
        assert_eq!(d.state(), ProtocolState::FileErr);
        assert_eq!(d.current().info().url(), "/GAMES");
    }

    #[test]
    fn wildcard_matches_on_last_segment() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        d.handle(&BusCommand::open(8, 0, "GAMES/*"));
        assert_eq!(d.state(), ProtocolState::File);
        assert_eq!(d.current().info().url(), "/GAMES/ELITE.PRG");

        d.handle(&BusCommand::open(8, 0, "CD_"));
        assert_eq!(d.current().info().url(), "/GAMES");
        d.handle(&BusCommand::open(8, 0, "SUB/el*"));
        assert_eq!(d.current().info().url(), "/GAMES/ELITE.PRG");
    }

    #[test]
    fn wildcard_at_root_loads_boot_entry() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "*"));
        assert_eq!(d.state(), ProtocolState::File);
        assert_eq!(d.current().info().url(), BOOT_ENTRY);
    }

    #[test]
    fn list_token_wins_over_wildcard() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        d.handle(&BusCommand::open(8, 0, "$*"));
        assert_eq!(d.state(), ProtocolState::Dir);
        assert_eq!(d.current().info().url(), "/GAMES");
    }

    #[test]
    fn send_file_marks_last_byte() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES/ELITE.PRG"));
        talk(&mut d, 0);
        assert_eq!(d.bus().bytes(), vec![0x01, 0x08, 1, 2, 3, 4]);
        assert_eq!(d.bus().eoi_positions(), vec![5]);
        assert_eq!(
            d.last_transfer(),
            Some(Transfer {
                sent: 4,
                aborted: false
            })
        );
    }

    #[test]
    fn atn_aborts_transfer() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.bus_mut().atn_after = Some(3);
        d.handle(&BusCommand::open(8, 0, "GAMES/ELITE.PRG"));
        talk(&mut d, 0);
        assert_eq!(d.bus().bytes(), vec![0x01, 0x08, 1]);
        assert!(d.bus().eoi_positions().is_empty());
        assert_eq!(
            d.last_transfer(),
            Some(Transfer {
                sent: 1,
                aborted: true
            })
        );
    }

    #[test]
    fn missing_file_is_fnf() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "NOPE"));
        assert_eq!(d.state(), ProtocolState::File);
        talk(&mut d, 0);
        assert_eq!(d.bus().sent, vec![Sent::Fnf]);
        assert!(d.last_transfer().is_none());
    }

    #[test]
    fn empty_file_is_fnf() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "EMPTY.PRG"));
        assert_eq!(d.state(), ProtocolState::File);
        talk(&mut d, 0);
        assert_eq!(d.bus().sent, vec![Sent::Fnf]);
        assert!(d.last_transfer().is_none());
    }

    #[test]
    fn bare_load_address_ends_with_eoi() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "STUB.PRG"));
        talk(&mut d, 0);
        assert_eq!(d.bus().bytes(), vec![0x01, 0x08]);
        assert_eq!(d.bus().eoi_positions(), vec![1]);
        assert_eq!(
            d.last_transfer(),
            Some(Transfer {
                sent: 0,
                aborted: false
            })
        );
    }

    #[test]
    fn missing_redirect_does_not_trap_the_drive() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "NOPE.URL"));
        assert_eq!(d.state(), ProtocolState::File);
        talk(&mut d, 0);
        assert_eq!(d.bus().sent, vec![Sent::Fnf]);

        d.handle(&BusCommand::open(8, 15, "CD_"));
        assert_eq!(d.state(), ProtocolState::Dir);
        assert_eq!(d.current().info().url(), "");

        d.handle(&BusCommand::open(8, 0, "NOPE.URL"));
        d.handle(&BusCommand::open(8, 15, "CD//GAMES"));
        assert_eq!(d.current().info().url(), "/GAMES");
        d.reset();
        assert_eq!(d.current().info().url(), "/GAMES");
    }

    #[test]
    fn nothing_opened_is_fnf() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        talk(&mut d, 2);
        assert_eq!(d.bus().sent, vec![Sent::Fnf]);
    }

    #[test]
    fn status_channel_sends_queued_and_clears() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::data(8, 1, DataMode::Listen));
        assert_eq!(d.queued(), StatusCode::SerialComm);
        d.bus_mut().clear();

        talk(&mut d, CMD_CHANNEL);
        assert_eq!(d.bus().bytes(), b"98, SERIAL COMM ERROR,00,00\r");
        assert_eq!(d.bus().eoi_positions(), vec![27]);
        assert_eq!(d.queued(), StatusCode::Ok);

        d.bus_mut().clear();
        talk(&mut d, CMD_CHANNEL);
        assert_eq!(d.bus().bytes(), b"00, OK,00,00\r");
    }

    #[test]
    fn listen_sync_mismatch_signals_fnf() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs).with_upstream(Cursor::new(b"x00".to_vec()));
        d.handle(&BusCommand::data(8, 1, DataMode::Listen));
        assert!(d.bus().got_fnf());
        assert_eq!(d.queued(), StatusCode::SerialComm);
    }

    #[test]
    fn listen_saves_until_eoi() {
        let (dir, vfs) = setup();
        let mut d = drive(&vfs).with_upstream(Cursor::new(vec![b'>', 0, b'\r']));
        d.handle(&BusCommand::open(8, 1, "NEW.PRG"));
        d.bus_mut().incoming.extend([
            Received { byte: 0x01, eoi: false },
            Received { byte: 0x08, eoi: false },
            Received { byte: 0x60, eoi: true },
        ]);
        d.handle(&BusCommand::data(8, 1, DataMode::Listen));
        assert_eq!(d.queued(), StatusCode::Ok);
        assert_eq!(fs::read(dir.path().join("NEW.PRG")).unwrap(), vec![0x01, 0x08, 0x60]);
    }

    #[test]
    fn upstream_error_code_is_queued() {
        let (dir, vfs) = setup();
        let mut d = drive(&vfs).with_upstream(Cursor::new(vec![b'>', 62, b'\r']));
        d.handle(&BusCommand::open(8, 1, "NEW.PRG"));
        d.handle(&BusCommand::data(8, 1, DataMode::Listen));
        assert_eq!(d.queued(), StatusCode::FileNotFound);
        assert!(!dir.path().join("NEW.PRG").exists());
    }

    #[test]
    fn framing_error_resets() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "README"));
        d.bus_mut().commands.push_back(AtnCheck::Error);
        assert_eq!(d.service(), AtnCheck::Error);
        assert_eq!(d.state(), ProtocolState::Nothing);
        assert_eq!(d.queued(), StatusCode::Ok);
        assert_eq!(d.current().info().url(), "");
        assert_eq!(d.service(), AtnCheck::Idle);
    }

    #[test]
    fn reset_returns_to_last_entered_directory() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        d.handle(&BusCommand::open(8, 0, "ELITE.PRG"));
        assert_eq!(d.current().info().url(), "/GAMES/ELITE.PRG");
        d.reset();
        assert_eq!(d.current().info().url(), "/GAMES");
    }

    #[test]
    fn device_change_resets_position() {
        let (_dir, vfs) = setup();
        let mut config = DriveConfig::default();
        config.devices.insert("9".into(), "/GAMES".into());
        let mut d = Drive::from_config(MockBus::default(), Arc::clone(&vfs), config).unwrap();
        d.handle(&BusCommand::open(9, 0, "$"));
        assert_eq!(d.current().info().url(), "/GAMES");
    }

    #[test]
    fn listing_hides_dot_files() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        talk(&mut d, 0);
        let text = String::from_utf8_lossy(&d.bus().bytes()).into_owned();
        assert!(text.contains("\"ELITE.PRG\""));
        assert!(text.contains("\"SUB\""));
        assert!(!text.contains(".hidden"));
        assert!(text.contains("BLOCKS FREE."));
    }

    #[test]
    fn reload_resets_and_lists_base() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES/ELITE.PRG"));
        d.request_reload();
        assert_eq!(d.state(), ProtocolState::Info);
        talk(&mut d, 0);
        assert_eq!(d.state(), ProtocolState::Nothing);
        assert_eq!(d.current().info().url(), "");
        let text = String::from_utf8_lossy(&d.bus().bytes()).into_owned();
        assert!(text.contains("\"GAMES\""));
        assert!(text.contains("\"README\""));
    }

    #[test]
    fn status_block_names_current_file() {
        let (_dir, vfs) = setup();
        let mut d = drive(&vfs);
        d.handle(&BusCommand::open(8, 0, "GAMES"));
        d.handle(&BusCommand::open(8, 0, "@STAT"));
        talk(&mut d, 0);
        let text = String::from_utf8_lossy(&d.bus().bytes()).into_owned();
        assert!(text.contains("DEVICE    : 8"));
        assert!(text.contains("URL       : /GAMES"));
        assert!(text.contains("FILENAME  : GAMES"));
    }
}
