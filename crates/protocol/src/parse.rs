//! Syslog message parsing
//!
//! One entry point: [`parse`]. The `<PRI>` header is mandatory; after it,
//! an RFC 5424 version marker (`1` + space) selects the strict IETF header,
//! anything else is treated as RFC 3164 with a raw-message fallback.

use chrono::DateTime;

use crate::error::ParseError;
use crate::event::{Level, ParsedEvent, SyslogFormat, base_metadata, meta};
use crate::facility::Facility;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parse one raw syslog message into a structured event
///
/// Trailing whitespace of the whole input is trimmed first; internal
/// whitespace (including newlines) survives into the message body.
pub fn parse(raw: &str) -> Result<ParsedEvent, ParseError> {
    let input = raw.trim_end();

    let (priority, rest) = parse_pri(input)?;
    let facility = Facility::from_code(priority / 8)
        .ok_or(ParseError::invalid_format("priority exceeds 191"))?;
    let level = Level::from_severity(priority % 8);

    match rest.strip_prefix("1 ") {
        Some(body) => parse_rfc5424(body, facility, level),
        None => Ok(parse_rfc3164(rest, facility, level)),
    }
}

/// Extract the `<PRI>` header
///
/// Accepts `<` + 1-3 decimal digits + `>` with a value of at most 191.
fn parse_pri(input: &str) -> Result<(u8, &str), ParseError> {
    let rest = input
        .strip_prefix('<')
        .ok_or(ParseError::invalid_format("missing PRI opening bracket"))?;
    let close = rest
        .find('>')
        .ok_or(ParseError::invalid_format("missing PRI closing bracket"))?;

    let digits = &rest[..close];
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::invalid_format("PRI is not 1-3 decimal digits"));
    }

    let value: u16 = digits
        .parse()
        .map_err(|_| ParseError::invalid_format("PRI is not 1-3 decimal digits"))?;
    if value > crate::MAX_PRIORITY as u16 {
        return Err(ParseError::invalid_format("priority exceeds 191"));
    }

    Ok((value as u8, &rest[close + 1..]))
}

// =============================================================================
// RFC 3164
// =============================================================================

/// Parse an RFC 3164 body, falling back to a raw message on shape mismatch
///
/// The expected shape is `Mon DD HH:MM:SS HOSTNAME MESSAGE` (single-digit
/// days are space-padded). Anything else keeps the facility/level from the
/// PRI and treats the whole remainder as the message.
fn parse_rfc3164(body: &str, facility: Facility, level: Level) -> ParsedEvent {
    let mut metadata = base_metadata(facility, SyslogFormat::Rfc3164);

    let message = match split_rfc3164_header(body) {
        Some((hostname, message)) => {
            metadata.insert(meta::HOSTNAME.to_string(), hostname.to_string());
            message
        }
        None => body,
    };

    ParsedEvent {
        timestamp: None,
        level,
        message: message.to_string(),
        metadata,
    }
}

/// Split `Mon DD HH:MM:SS HOSTNAME rest` into hostname and message
fn split_rfc3164_header(body: &str) -> Option<(&str, &str)> {
    let rest = strip_rfc3164_timestamp(body)?;

    // Hostname token runs to the next space; a trailing colon (the
    // `HOSTNAME:` form some senders use) is stripped.
    let (token, message) = rest.split_once(' ')?;
    let hostname = token.strip_suffix(':').unwrap_or(token);
    if hostname.is_empty() {
        return None;
    }

    Some((hostname, message))
}

/// Strip a `Mon DD HH:MM:SS ` prefix (exactly 16 bytes)
fn strip_rfc3164_timestamp(body: &str) -> Option<&str> {
    let bytes = body.as_bytes();
    if bytes.len() < 16 || !body.is_char_boundary(16) {
        return None;
    }

    let month = body.get(..3)?;
    if !MONTHS.contains(&month) || bytes[3] != b' ' {
        return None;
    }

    // Day of month: "DD" or " D"
    let day_ok = match (bytes[4], bytes[5]) {
        (b' ', d) => d.is_ascii_digit(),
        (d1, d2) => d1.is_ascii_digit() && d2.is_ascii_digit(),
    };
    if !day_ok || bytes[6] != b' ' {
        return None;
    }

    // Time of day: "HH:MM:SS"
    let time = &bytes[7..15];
    let time_ok = time[2] == b':'
        && time[5] == b':'
        && [0usize, 1, 3, 4, 6, 7]
            .iter()
            .all(|&i| time[i].is_ascii_digit());
    if !time_ok || bytes[15] != b' ' {
        return None;
    }

    Some(&body[16..])
}

// =============================================================================
// RFC 5424
// =============================================================================

/// Parse an RFC 5424 body (version marker already consumed)
///
/// Header fields are strict: `TIMESTAMP HOSTNAME APP-NAME PROCID MSGID`
/// followed by structured data and an optional message. Nil (`-`) fields
/// are omitted from metadata rather than stored empty.
fn parse_rfc5424(
    body: &str,
    facility: Facility,
    level: Level,
) -> Result<ParsedEvent, ParseError> {
    let mut metadata = base_metadata(facility, SyslogFormat::Rfc5424);
    let mut rest = body;

    let timestamp_field = next_field(&mut rest)?;
    let hostname = next_field(&mut rest)?;
    let appname = next_field(&mut rest)?;
    let procid = next_field(&mut rest)?;
    let msgid = next_field(&mut rest)?;

    // Unparsable timestamps are not fatal: the consumer stamps arrival
    // time when the sender's clock can't be read.
    let timestamp = match timestamp_field {
        "-" => None,
        field => DateTime::parse_from_rfc3339(field).ok(),
    };

    insert_unless_nil(&mut metadata, meta::HOSTNAME, hostname);
    insert_unless_nil(&mut metadata, meta::APPNAME, appname);
    insert_unless_nil(&mut metadata, meta::PROCID, procid);
    insert_unless_nil(&mut metadata, meta::MSGID, msgid);

    let (structured_data, message) = split_structured_data(rest)?;
    if let Some(sd) = structured_data {
        metadata.insert(meta::STRUCTURED_DATA.to_string(), sd.to_string());
    }

    Ok(ParsedEvent {
        timestamp,
        level,
        message: message.to_string(),
        metadata,
    })
}

/// Take the next space-delimited header field
fn next_field<'a>(rest: &mut &'a str) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::invalid_format("truncated RFC 5424 header"));
    }
    let field = match rest.split_once(' ') {
        Some((field, tail)) => {
            *rest = tail;
            field
        }
        None => std::mem::take(rest),
    };
    if field.is_empty() {
        return Err(ParseError::invalid_format("empty RFC 5424 header field"));
    }
    Ok(field)
}

fn insert_unless_nil(
    metadata: &mut std::collections::BTreeMap<String, String>,
    key: &str,
    value: &str,
) {
    if value != "-" {
        metadata.insert(key.to_string(), value.to_string());
    }
}

/// Split the structured-data field from the message
///
/// Structured data is either `-` (nil) or one or more `[...]` groups,
/// captured verbatim. `\]` inside a group does not terminate it.
fn split_structured_data(rest: &str) -> Result<(Option<&str>, &str), ParseError> {
    if rest.is_empty() {
        return Err(ParseError::invalid_format("missing structured data field"));
    }

    if let Some(tail) = rest.strip_prefix('-') {
        return match tail.strip_prefix(' ') {
            Some(message) => Ok((None, message)),
            None if tail.is_empty() => Ok((None, "")),
            None => Err(ParseError::invalid_format("malformed structured data")),
        };
    }

    if !rest.starts_with('[') {
        return Err(ParseError::invalid_format("malformed structured data"));
    }

    let end = scan_sd_groups(rest)?;
    let sd = &rest[..end];
    let message = match rest[end..].strip_prefix(' ') {
        Some(message) => message,
        None if rest[end..].is_empty() => "",
        None => return Err(ParseError::invalid_format("malformed structured data")),
    };

    Ok((Some(sd), message))
}

/// Scan consecutive `[...]` groups, returning the index one past the last `]`
fn scan_sd_groups(s: &str) -> Result<usize, ParseError> {
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() && bytes[i] == b'[' {
        i += 1;
        let mut escaped = false;
        loop {
            let Some(&b) = bytes.get(i) else {
                return Err(ParseError::invalid_format(
                    "unterminated structured data group",
                ));
            };
            i += 1;
            match b {
                b'\\' if !escaped => escaped = true,
                b']' if !escaped => break,
                _ => escaped = false,
            }
        }
    }

    Ok(i)
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod parse_test;
