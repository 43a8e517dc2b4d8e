//! SIP message and dialog types

use std::net::IpAddr;

use serde::Serialize;

/// Ordered header block. Duplicate header fields (multiple Via, multiple
/// Route) are semantically meaningful in SIP, so entries are kept as an
/// ordered sequence, never collapsed.
#[derive(Debug, Clone, Default)]
pub struct HeaderBlock {
    entries: Vec<(String, String)>,
}

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value of a field, by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a field, in order of appearance.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append text to the value of the last pushed field (header folding).
    pub(crate) fn extend_last(&mut self, continuation: &str) {
        if let Some((_, v)) = self.entries.last_mut() {
            v.push(' ');
            v.push_str(continuation);
        }
    }
}

/// Request or response start line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request { method: String, uri: String },
    Response { code: u16, reason: String },
}

/// One parsed SIP message. The body borrows from the dispatched slice and
/// never outlives the call.
#[derive(Debug)]
pub struct SipMessage<'a> {
    pub start: StartLine,
    pub headers: HeaderBlock,
    pub body: &'a [u8],
}

impl SipMessage<'_> {
    pub fn call_id(&self) -> Option<&str> {
        self.headers.get("Call-ID").map(str::trim)
    }

    pub fn from(&self) -> Option<&str> {
        self.headers.get("From").map(str::trim)
    }

    pub fn to(&self) -> Option<&str> {
        self.headers.get("To").map(str::trim)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type").map(str::trim)
    }

    /// CSeq sequence number, when the header parses.
    pub fn cseq(&self) -> Option<u32> {
        let value = self.headers.get("CSeq")?;
        value.split_whitespace().next()?.parse().ok()
    }

    pub fn from_tag(&self) -> Option<&str> {
        header_param(self.from()?, "tag")
    }

    pub fn to_tag(&self) -> Option<&str> {
        header_param(self.to()?, "tag")
    }

    /// Does the body carry a session description?
    pub fn has_sdp_body(&self) -> bool {
        self.content_type()
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .eq_ignore_ascii_case("application/sdp")
            })
            .unwrap_or(false)
            && !self.body.is_empty()
    }
}

/// Extract a `;name=value` parameter from a header value.
pub(crate) fn header_param<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    for param in value.split(';').skip(1) {
        let mut parts = param.splitn(2, '=');
        let key = parts.next()?.trim();
        if key.eq_ignore_ascii_case(name) {
            return Some(parts.next().unwrap_or("").trim());
        }
    }
    None
}

/// Dialog lifecycle, correlated by Call-ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// No dialog known for the Call-ID.
    NoDialog,
    /// Request seen, no final response yet.
    Trying,
    /// 2xx final response seen.
    Established,
    /// BYE/CANCEL, non-2xx final, or timeout.
    Terminated,
}

impl std::fmt::Display for DialogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialogState::NoDialog => write!(f, "no-dialog"),
            DialogState::Trying => write!(f, "trying"),
            DialogState::Established => write!(f, "established"),
            DialogState::Terminated => write!(f, "terminated"),
        }
    }
}

/// One negotiated media stream from an SDP body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaSummary {
    /// Media kind from the m= line (audio, video, ...).
    pub media: String,
    /// Negotiated transport port.
    pub port: u16,
    /// Transport profile (e.g., RTP/AVP).
    pub protocol: String,
    /// Payload format tokens.
    pub formats: Vec<String>,
    /// Connection address in effect for this stream.
    pub connection: Option<IpAddr>,
}

impl MediaSummary {
    /// Is the stream carried over RTP (any profile)?
    pub fn is_rtp(&self) -> bool {
        self.protocol
            .split('/')
            .next()
            .map(|p| p.eq_ignore_ascii_case("RTP"))
            .unwrap_or(false)
    }
}

/// Parsed session description: session-level connection plus media lines.
#[derive(Debug, Clone, Default)]
pub struct SdpSession {
    pub connection: Option<IpAddr>,
    pub media: Vec<MediaSummary>,
}
