//! Collaborators the controller drives: the serial bus and the host platform.

use crate::error::BusError;
use crate::protocol::command::BusCommand;

/// Result of polling the bus for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtnCheck {
    /// No command pending.
    Idle,
    /// The command framing was malformed.
    Error,
    /// A decoded command addressed to this drive.
    Command(BusCommand),
}

/// Level of a bus line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Nobody pulls the line.
    Released,
    /// The line is pulled.
    Asserted,
}

/// A byte read from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// The data byte.
    pub byte: u8,
    /// Set on the last byte of a transfer.
    pub eoi: bool,
}

/// Byte-level primitives of the serial bus.
///
/// Timing and handshakes live behind this trait; every call blocks until the
/// primitive completes or fails.
pub trait IecBus {
    /// Poll for a command under ATN.
    fn check_atn(&mut self) -> AtnCheck;

    /// Send one byte.
    fn send(&mut self, byte: u8) -> Result<(), BusError>;

    /// Send the last byte of a transfer.
    fn send_eoi(&mut self, byte: u8) -> Result<(), BusError>;

    /// Signal "file not found" to the host.
    fn send_fnf(&mut self) -> Result<(), BusError>;

    /// Receive one byte.
    fn receive(&mut self) -> Result<Received, BusError>;

    /// Current level of the ATN line.
    fn atn_line(&self) -> LineState;
}

/// One titled block of the device information listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoSection {
    /// Section title, printed as `TITLE ---`.
    pub title: String,
    /// Label and value pairs.
    pub fields: Vec<(String, String)>,
}

impl InfoSection {
    /// An empty section.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn field(mut self, label: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((label.into(), value.to_string()));
        self
    }
}

/// Host facts reported by `@INFO`.
pub trait Platform: Send {
    /// Sections in display order.
    fn info(&self) -> Vec<InfoSection>;
}

/// [`Platform`] reading what the standard library knows about the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdPlatform;

impl Platform for StdPlatform {
    fn info(&self) -> Vec<InfoSection> {
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        vec![
            InfoSection::new("SYSTEM")
                .field("OS", std::env::consts::OS.to_ascii_uppercase())
                .field("ARCH", std::env::consts::ARCH.to_ascii_uppercase())
                .field("CPUS", cpus),
            InfoSection::new("PROCESS").field("PID", std::process::id()),
        ]
    }
}
