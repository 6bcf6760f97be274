use std::fmt;

/// One input record, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line(String);

impl Line {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Strips a trailing `\n` or `\r\n` and replaces invalid UTF-8.
    pub fn from_raw(raw: &[u8]) -> Self {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        Self(String::from_utf8_lossy(raw).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub seq: u64,
    pub lines: Vec<Line>,
    pub is_final: bool,
}

impl Batch {
    pub fn new(seq: u64) -> Self {
        Self {
            seq,
            lines: Vec::new(),
            is_final: false,
        }
    }

    pub fn push(&mut self, line: Line) {
        self.lines.push(line);
    }

    /// Appends a later batch, keeping this batch's sequence number.
    pub fn absorb(&mut self, later: Batch) {
        self.lines.extend(later.lines);
        self.is_final |= later.is_final;
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Message body as posted to the channel.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(Line::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Resolved destination: channel plus the token used to post there.
#[derive(Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub channel: String,
    pub token: String,
}

impl DeliveryTarget {
    pub fn new(channel: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryTarget")
            .field("channel", &self.channel)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub content: Vec<u8>,
    pub filename: String,
    pub filetype: Option<String>,
    pub comment: Option<String>,
}

/// What a no-op sender would have sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Message { channel: String, batch: Batch },
    File { channel: String, upload: FileUpload },
}
