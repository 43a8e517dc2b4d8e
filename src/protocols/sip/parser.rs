//! SIP message and SDP parsing
//!
//! Start line plus header block terminated by a blank line, then an
//! optional body. A missing terminator or an unparseable start line is a
//! decode failure; the caller's dialog table is untouched because parsing
//! happens before any state is consulted.

use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::error::{DecodeError, DecodeResult};
use crate::protocols::ProtocolId;

use super::types::{HeaderBlock, MediaSummary, SdpSession, SipMessage, StartLine};

fn request_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9_-]*)\s+(\S+)\s+SIP/\d\.\d$").expect("request line regex")
    })
}

fn response_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^SIP/\d\.\d\s+(\d{3})\s*(.*)$").expect("response line regex"))
}

/// Parse one SIP message from a slice's bytes.
///
/// `max_header_block` caps the accepted start-line-plus-header region; a
/// block that large without a terminator is treated as malformed rather
/// than buffered.
pub fn parse_message(data: &[u8], max_header_block: usize) -> DecodeResult<SipMessage<'_>> {
    let (head, body) = split_head_body(data, max_header_block)?;

    let head = std::str::from_utf8(head)
        .map_err(|_| DecodeError::malformed(ProtocolId::Sip, "header block is not valid text"))?;

    let mut lines = head.lines();
    let start_line = lines
        .next()
        .ok_or_else(|| DecodeError::malformed(ProtocolId::Sip, "empty message"))?;
    let start = parse_start_line(start_line)?;

    let mut headers = HeaderBlock::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            // RFC 3261 header folding: continuation of the previous value.
            if headers.is_empty() {
                return Err(DecodeError::malformed(
                    ProtocolId::Sip,
                    "continuation line before first header",
                ));
            }
            headers.extend_last(line.trim());
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(DecodeError::malformed(
                ProtocolId::Sip,
                format!("header line without colon: {:?}", truncate(line, 40)),
            ));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(DecodeError::malformed(ProtocolId::Sip, "empty header name"));
        }
        headers.push(name, value.trim());
    }

    Ok(SipMessage {
        start,
        headers,
        body,
    })
}

/// Locate the blank-line terminator and split the message around it.
fn split_head_body(data: &[u8], max_header_block: usize) -> DecodeResult<(&[u8], &[u8])> {
    let window = &data[..data.len().min(max_header_block.saturating_add(4))];

    let crlf = find(window, b"\r\n\r\n").map(|pos| (pos, 4));
    let lf = find(window, b"\n\n").map(|pos| (pos, 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((pos, sep)) => Ok((&data[..pos], &data[pos + sep..])),
        None => Err(DecodeError::malformed(
            ProtocolId::Sip,
            "missing blank-line header terminator",
        )),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_start_line(line: &str) -> DecodeResult<StartLine> {
    if let Some(caps) = response_line_re().captures(line) {
        let code: u16 = caps[1]
            .parse()
            .map_err(|_| DecodeError::malformed(ProtocolId::Sip, "unparseable status code"))?;
        return Ok(StartLine::Response {
            code,
            reason: caps[2].trim().to_string(),
        });
    }
    if let Some(caps) = request_line_re().captures(line) {
        return Ok(StartLine::Request {
            method: caps[1].to_ascii_uppercase(),
            uri: caps[2].to_string(),
        });
    }
    Err(DecodeError::malformed(
        ProtocolId::Sip,
        format!("unparseable start line: {:?}", truncate(line, 60)),
    ))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Parse the media descriptions of an SDP body.
///
/// Only the fields that drive flow discovery are extracted: session- and
/// media-level connection addresses (`c=`) and media lines (`m=`).
/// Individually broken lines are skipped, not fatal; the SIP layer has
/// already decoded successfully.
pub fn parse_sdp(body: &[u8]) -> SdpSession {
    let text = String::from_utf8_lossy(body);
    let mut session = SdpSession::default();
    let mut in_media = false;

    for line in text.lines() {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("c=") {
            match parse_connection(rest) {
                Some(addr) if in_media => {
                    if let Some(last) = session.media.last_mut() {
                        last.connection = Some(addr);
                    }
                }
                Some(addr) => session.connection = Some(addr),
                None => trace!(line, "skipping unparseable sdp connection line"),
            }
        } else if let Some(rest) = line.strip_prefix("m=") {
            in_media = true;
            match parse_media(rest) {
                Some(media) => session.media.push(media),
                None => trace!(line, "skipping unparseable sdp media line"),
            }
        }
    }

    // Session-level connection applies to media that declared none.
    if let Some(addr) = session.connection {
        for media in &mut session.media {
            media.connection.get_or_insert(addr);
        }
    }
    session
}

/// `c=IN IP4 10.0.0.5` (address may carry a `/ttl` suffix).
fn parse_connection(rest: &str) -> Option<IpAddr> {
    let mut parts = rest.split_whitespace();
    if parts.next()? != "IN" {
        return None;
    }
    let _addrtype = parts.next()?;
    let addr = parts.next()?.split('/').next()?;
    addr.parse().ok()
}

/// `m=audio 30000 RTP/AVP 0 8 97` (port may carry a `/count` suffix).
fn parse_media(rest: &str) -> Option<MediaSummary> {
    let mut parts = rest.split_whitespace();
    let media = parts.next()?.to_string();
    let port: u16 = parts.next()?.split('/').next()?.parse().ok()?;
    let protocol = parts.next()?.to_string();
    let formats = parts.map(str::to_string).collect();
    Some(MediaSummary {
        media,
        port,
        protocol,
        formats,
        connection: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const MAX_BLOCK: usize = 16_384;

    fn invite() -> Vec<u8> {
        let msg = "INVITE sip:bob@biloxi.example.com SIP/2.0\r\n\
                   Via: SIP/2.0/UDP pc33.atlanta.example.com;branch=z9hG4bK776\r\n\
                   Via: SIP/2.0/UDP bigbox3.site3.atlanta.example.com\r\n\
                   From: Alice <sip:alice@atlanta.example.com>;tag=1928301774\r\n\
                   To: Bob <sip:bob@biloxi.example.com>\r\n\
                   Call-ID: a84b4c76e66710@pc33.atlanta.example.com\r\n\
                   CSeq: 314159 INVITE\r\n\
                   Content-Type: application/sdp\r\n\
                   Content-Length: 0\r\n\
                   \r\n\
                   v=0\r\n";
        msg.as_bytes().to_vec()
    }

    #[test]
    fn test_parse_request() {
        let data = invite();
        let msg = parse_message(&data, MAX_BLOCK).unwrap();
        match &msg.start {
            StartLine::Request { method, uri } => {
                assert_eq!(method, "INVITE");
                assert_eq!(uri, "sip:bob@biloxi.example.com");
            }
            other => panic!("expected request, got {:?}", other),
        }
        assert_eq!(
            msg.call_id(),
            Some("a84b4c76e66710@pc33.atlanta.example.com")
        );
        assert_eq!(msg.cseq(), Some(314159));
        assert_eq!(msg.from_tag(), Some("1928301774"));
        assert_eq!(msg.to_tag(), None);
        assert!(msg.has_sdp_body());
        assert_eq!(msg.body, b"v=0\r\n");
    }

    #[test]
    fn test_parse_response() {
        let data = b"SIP/2.0 200 OK\r\n\
                     To: Bob <sip:bob@biloxi.example.com>;tag=a6c85cf\r\n\
                     Call-ID: a84b4c76e66710@pc33.atlanta.example.com\r\n\
                     \r\n";
        let msg = parse_message(data, MAX_BLOCK).unwrap();
        match &msg.start {
            StartLine::Response { code, reason } => {
                assert_eq!(*code, 200);
                assert_eq!(reason, "OK");
            }
            other => panic!("expected response, got {:?}", other),
        }
        assert_eq!(msg.to_tag(), Some("a6c85cf"));
    }

    #[test]
    fn test_duplicate_via_preserved_in_order() {
        let data = invite();
        let msg = parse_message(&data, MAX_BLOCK).unwrap();
        let vias: Vec<_> = msg.headers.all("Via").collect();
        assert_eq!(vias.len(), 2);
        assert!(vias[0].contains("pc33"));
        assert!(vias[1].contains("bigbox3"));
    }

    #[test]
    fn test_header_folding() {
        let data = b"OPTIONS sip:carol@chicago.example.com SIP/2.0\r\n\
                     Call-ID: abc@x\r\n\
                     Subject: I know you're there,\r\n\
                     \tpick up the phone\r\n\
                     \r\n";
        let msg = parse_message(data, MAX_BLOCK).unwrap();
        assert_eq!(
            msg.headers.get("Subject"),
            Some("I know you're there, pick up the phone")
        );
    }

    #[test]
    fn test_missing_terminator_is_malformed() {
        let data = b"INVITE sip:bob@example.com SIP/2.0\r\nCall-ID: x@y\r\n";
        let err = parse_message(data, MAX_BLOCK).unwrap_err();
        assert_eq!(err.kind(), "malformed");
        assert!(err.to_string().contains("terminator"));
    }

    #[test]
    fn test_garbage_start_line_is_malformed() {
        let data = b"not a sip message at all\r\n\r\n";
        let err = parse_message(data, MAX_BLOCK).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn test_header_line_without_colon_is_malformed() {
        let data = b"INVITE sip:bob@example.com SIP/2.0\r\nBogusHeaderNoColon\r\n\r\n";
        let err = parse_message(data, MAX_BLOCK).unwrap_err();
        assert!(err.to_string().contains("colon"));
    }

    #[test]
    fn test_oversized_header_block_is_malformed() {
        let mut data = b"INVITE sip:bob@example.com SIP/2.0\r\n".to_vec();
        data.extend(std::iter::repeat(b'x').take(64));
        let err = parse_message(&data, 16).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn test_parse_sdp_session_level_connection() {
        let body = b"v=0\r\n\
                     o=alice 2890844526 2890844526 IN IP4 10.0.0.5\r\n\
                     s=-\r\n\
                     c=IN IP4 10.0.0.5\r\n\
                     t=0 0\r\n\
                     m=audio 30000 RTP/AVP 0\r\n\
                     m=video 30002 RTP/AVP 31\r\n";
        let session = parse_sdp(body);
        assert_eq!(
            session.connection,
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
        );
        assert_eq!(session.media.len(), 2);
        assert_eq!(session.media[0].media, "audio");
        assert_eq!(session.media[0].port, 30000);
        assert_eq!(session.media[0].protocol, "RTP/AVP");
        assert_eq!(session.media[0].formats, vec!["0"]);
        assert_eq!(
            session.media[0].connection,
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
        );
        assert_eq!(session.media[1].port, 30002);
    }

    #[test]
    fn test_media_level_connection_overrides_session() {
        let body = b"c=IN IP4 10.0.0.5\r\n\
                     m=audio 30000 RTP/AVP 0\r\n\
                     c=IN IP4 10.0.0.9\r\n";
        let session = parse_sdp(body);
        assert_eq!(
            session.media[0].connection,
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)))
        );
    }

    #[test]
    fn test_broken_sdp_lines_skipped() {
        let body = b"m=audio notaport RTP/AVP 0\r\n\
                     c=IN garbage\r\n\
                     m=video 30002 RTP/AVP 31\r\n";
        let session = parse_sdp(body);
        assert_eq!(session.media.len(), 1);
        assert_eq!(session.media[0].media, "video");
    }
}
