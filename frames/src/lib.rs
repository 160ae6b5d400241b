//! STOMP frame model and text codec for the WebSocket transport.
//!
//! This crate owns the wire representation used by `roomchat`. A frame is a
//! command line, header lines, a blank line and a NUL-terminated body. Over
//! WebSocket one text message may carry several frames and bare EOLs are
//! heart-beats, so decoding always yields a list.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Error returned by [`decode_frames`] and [`HeartBeat::parse`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The command line does not name a STOMP command.
    #[error("unknown frame command: {0}")]
    UnknownCommand(String),
    /// The input ended before the header block was terminated.
    #[error("frame headers are not terminated")]
    UnterminatedHeaders,
    /// A header line has no `:` separator.
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    /// A header contains an escape sequence STOMP 1.2 does not define.
    #[error("invalid header escape sequence: \\{0}")]
    InvalidEscape(char),
    /// A header ends in a lone backslash.
    #[error("header ends with a dangling escape")]
    DanglingEscape,
    /// `content-length` is not a non-negative integer.
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
    /// The body is shorter than `content-length` or lacks its NUL terminator.
    #[error("frame body is not NUL terminated")]
    MissingNul,
    /// `heart-beat` header is not `<cx>,<cy>`.
    #[error("invalid heart-beat header: {0}")]
    InvalidHeartBeat(String),
}

/// STOMP 1.2 frame commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Command name as written on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are never escaped.
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "STOMP" => Ok(Self::Stomp),
            "CONNECTED" => Ok(Self::Connected),
            "SEND" => Ok(Self::Send),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "ACK" => Ok(Self::Ack),
            "NACK" => Ok(Self::Nack),
            "BEGIN" => Ok(Self::Begin),
            "COMMIT" => Ok(Self::Commit),
            "ABORT" => Ok(Self::Abort),
            "DISCONNECT" => Ok(Self::Disconnect),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "ERROR" => Ok(Self::Error),
            other => Err(CodecError::UnknownCommand(other.to_owned())),
        }
    }
}

/// A single STOMP frame.
///
/// Headers keep wire order; repeated headers are allowed and the first
/// occurrence wins on lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: String::new() }
    }

    /// Builder: append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builder: replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Encode a frame into its text wire form.
///
/// A `content-length` header is added for non-empty bodies unless the frame
/// already carries one.
#[must_use]
pub fn encode_frame(frame: &Frame) -> String {
    let escape = frame.command.escapes_headers();
    let mut out = String::with_capacity(frame.body.len() + 64);
    out.push_str(frame.command.as_str());
    out.push('\n');

    for (name, value) in &frame.headers {
        push_header(&mut out, name, value, escape);
    }
    if !frame.body.is_empty() && frame.header("content-length").is_none() {
        push_header(&mut out, "content-length", &frame.body.len().to_string(), false);
    }

    out.push('\n');
    out.push_str(&frame.body);
    out.push('\0');
    out
}

/// Decode every frame in a WebSocket text message.
///
/// Leading EOLs between frames are heart-beats and are skipped, so a
/// heart-beat-only message decodes to an empty list.
///
/// # Errors
///
/// Returns the first [`CodecError`] encountered; frames before it are lost.
pub fn decode_frames(input: &str) -> Result<Vec<Frame>, CodecError> {
    let mut frames = Vec::new();
    let mut rest = input;
    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            return Ok(frames);
        }
        let (frame, remaining) = decode_one(rest)?;
        frames.push(frame);
        rest = remaining;
    }
}

fn decode_one(input: &str) -> Result<(Frame, &str), CodecError> {
    let (command_line, mut rest) = next_line(input).ok_or(CodecError::UnterminatedHeaders)?;
    let command = command_line.parse::<Command>()?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let (line, remaining) = next_line(rest).ok_or(CodecError::UnterminatedHeaders)?;
        rest = remaining;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CodecError::MalformedHeader(line.to_owned()))?;
        if escape {
            headers.push((unescape(name)?, unescape(value)?));
        } else {
            headers.push((name.to_owned(), value.to_owned()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| CodecError::InvalidContentLength(value.clone()))
        })
        .transpose()?;

    let (body, rest) = match content_length {
        Some(len) => {
            let body = rest.get(..len).ok_or(CodecError::MissingNul)?;
            let after = rest.get(len..).ok_or(CodecError::MissingNul)?;
            let after = after.strip_prefix('\0').ok_or(CodecError::MissingNul)?;
            (body, after)
        }
        None => rest.split_once('\0').ok_or(CodecError::MissingNul)?,
    };

    let frame = Frame { command, headers, body: body.to_owned() };
    Ok((frame, rest))
}

/// Split off one line, accepting both `\n` and `\r\n` endings.
fn next_line(input: &str) -> Option<(&str, &str)> {
    let (line, rest) = input.split_once('\n')?;
    Some((line.strip_suffix('\r').unwrap_or(line), rest))
}

fn push_header(out: &mut String, name: &str, value: &str, escape: bool) {
    if escape {
        out.push_str(&escape_header(name));
        out.push(':');
        out.push_str(&escape_header(value));
    } else {
        out.push_str(name);
        out.push(':');
        out.push_str(value);
    }
    out.push('\n');
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(raw: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => return Err(CodecError::InvalidEscape(other)),
            None => return Err(CodecError::DanglingEscape),
        }
    }
    Ok(out)
}

/// Heart-beat intervals in milliseconds, as carried by the `heart-beat` header.
///
/// `outgoing` is what the sender can produce, `incoming` what it wants to
/// receive. Zero means "none".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeartBeat {
    pub outgoing: u64,
    pub incoming: u64,
}

impl HeartBeat {
    #[must_use]
    pub fn new(outgoing: u64, incoming: u64) -> Self {
        Self { outgoing, incoming }
    }

    /// Parse a `<cx>,<cy>` header value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidHeartBeat`] if either side is missing or
    /// not an integer.
    pub fn parse(value: &str) -> Result<Self, CodecError> {
        let invalid = || CodecError::InvalidHeartBeat(value.to_owned());
        let (outgoing, incoming) = value.split_once(',').ok_or_else(invalid)?;
        let outgoing = outgoing.trim().parse::<u64>().map_err(|_| invalid())?;
        let incoming = incoming.trim().parse::<u64>().map_err(|_| invalid())?;
        Ok(Self { outgoing, incoming })
    }

    #[must_use]
    pub fn to_header(self) -> String {
        format!("{},{}", self.outgoing, self.incoming)
    }

    /// Interval at which this side must send heart-beats once `peer` has
    /// answered, or `None` if either side opted out.
    #[must_use]
    pub fn send_interval(self, peer: Self) -> Option<Duration> {
        if self.outgoing == 0 || peer.incoming == 0 {
            return None;
        }
        Some(Duration::from_millis(self.outgoing.max(peer.incoming)))
    }
}

/// Wire form of a single heart-beat.
pub const HEARTBEAT: &str = "\n";

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
