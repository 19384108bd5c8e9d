//! Decoded bus commands, controller state and status codes.

use std::fmt;

/// Channel reserved for status text and drive commands.
pub const CMD_CHANNEL: u8 = 15;

/// Listing token.
pub const LIST_TOKEN: &str = "$";
/// Load-first-file token, matched at the end of the payload.
pub const WILDCARD_TOKEN: &str = "*";
/// Device information pseudo-command.
pub const INFO_TOKEN: &str = "@INFO";
/// Device status pseudo-command.
pub const STAT_TOKEN: &str = "@STAT";

/// Direction of a DATA command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// The host reads from the drive.
    Talk,
    /// The host writes to the drive.
    Listen,
    /// The host sends a command that gets no response.
    Command,
}

/// What the host asked for under ATN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    /// Open a channel; the payload names the file or command.
    Open,
    /// Close a channel.
    Close,
    /// Address the drive as listener.
    Listen,
    /// Address the drive as talker.
    Talk,
    /// Release all listeners.
    Unlisten,
    /// Release the talker.
    Untalk,
    /// Transfer on an open channel.
    Data(DataMode),
}

/// One command decoded from the bus.
///
/// Built by the bus layer; the payload is the text sent with OPEN, or
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusCommand {
    /// Addressed device number.
    pub device: u8,
    /// Secondary address.
    pub channel: u8,
    /// Operation.
    pub code: CommandCode,
    /// Command text.
    pub payload: String,
}

impl BusCommand {
    /// A command without payload.
    pub fn new(device: u8, channel: u8, code: CommandCode) -> Self {
        Self {
            device,
            channel,
            code,
            payload: String::new(),
        }
    }

    /// OPEN with `payload`.
    pub fn open(device: u8, channel: u8, payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::new(device, channel, CommandCode::Open)
        }
    }

    /// DATA in `mode`.
    pub fn data(device: u8, channel: u8, mode: DataMode) -> Self {
        Self::new(device, channel, CommandCode::Data(mode))
    }
}

/// What the next TALK on a data channel will produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtocolState {
    /// Nothing opened.
    #[default]
    Nothing,
    /// Storage was reloaded; the next TALK resets and lists the base url.
    Info,
    /// A file is ready to be sent.
    File,
    /// The last OPEN did not find a file.
    FileErr,
    /// A directory listing is ready.
    Dir,
    /// The device information block is ready.
    DeviceInfo,
    /// The device status block is ready.
    DeviceStatus,
}

/// Status reported on the command channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusCode {
    /// Ready.
    #[default]
    Ok,
    /// Received data could not be written.
    WriteError,
    /// Nothing by that name.
    FileNotFound,
    /// The upstream link did not answer as expected.
    SerialComm,
    /// A code passed through from upstream.
    Raw(u8),
}

impl StatusCode {
    /// Map a numeric code back to a status.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => StatusCode::Ok,
            25 => StatusCode::WriteError,
            62 => StatusCode::FileNotFound,
            98 => StatusCode::SerialComm,
            other => StatusCode::Raw(other),
        }
    }

    /// Numeric code.
    pub fn code(self) -> u8 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::WriteError => 25,
            StatusCode::FileNotFound => 62,
            StatusCode::SerialComm => 98,
            StatusCode::Raw(code) => code,
        }
    }

    /// Message text.
    pub fn message(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::WriteError => "WRITE ERROR",
            StatusCode::FileNotFound => "FILE NOT FOUND",
            StatusCode::SerialComm => "SERIAL COMM ERROR",
            StatusCode::Raw(_) => "ERROR",
        }
    }

    /// Bytes sent on the command channel, ending in CR.
    ///
    /// ```rust
    /// use iecdrive::StatusCode;
    ///
    /// assert_eq!(StatusCode::Ok.status_line(), b"00, OK,00,00\r");
    /// ```
    pub fn status_line(self) -> Vec<u8> {
        format!("{self}\r").into_bytes()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}, {},00,00", self.code(), self.message())
    }
}

/// Case-insensitive prefix test.
pub(crate) fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Split a directory-change prefix off an OPEN payload.
///
/// `CD:NAME` drops everything through the colon; `CD/NAME` and `CD_` drop
/// only the two letters, so the rest still reads as a navigation request.
/// Returns whether a prefix was found and the rest.
///
/// | Payload | Result |
/// |---------|--------|
/// | `CD:GAMES` | `(true, "GAMES")` |
/// | `cd//demos` | `(true, "//demos")` |
/// | `CD_` | `(true, "_")` |
/// | `CDPLAYER` | `(false, "CDPLAYER")` |
pub(crate) fn strip_cd(payload: &str) -> (bool, &str) {
    if !starts_with_ignore_case(payload, "CD") {
        return (false, payload);
    }
    let rest = &payload[2..];
    match rest.chars().next() {
        None => (true, rest),
        Some(':') => (true, &rest[1..]),
        Some('/' | '_') => (true, rest),
        Some(_) => (false, payload),
    }
}
