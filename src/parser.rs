use crate::error::{ParseError, TimestampError};
use crate::timestamp;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// A parsed access-log line with its timestamp in display form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub source_ip: String,
    pub timestamp: String,
    pub request: String,
    pub status_code: u16,
}

/// A matched line whose fields still borrow from the input.
///
/// The timestamp is exactly the text found between the brackets; it has not
/// been checked yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub source_ip: &'a str,
    pub timestamp: &'a str,
    pub request: &'a str,
    pub status_code: u16,
}

impl RawRecord<'_> {
    /// Normalize the timestamp and take ownership of the fields.
    pub fn into_record(self) -> Result<LogRecord, TimestampError> {
        Ok(LogRecord {
            source_ip: self.source_ip.to_string(),
            timestamp: timestamp::normalize(self.timestamp)?,
            request: self.request.to_string(),
            status_code: self.status_code,
        })
    }
}

/// Expected log format (common/combined access log prefix):
///   IP - - [TIMESTAMP] "REQUEST" STATUS ...
///
/// Example:
///   192.168.1.1 - - [10/Oct/2023:13:55:36 -0700] "GET /index.html HTTP/1.1" 200 2326
///
/// Anything after the status code is ignored.
static LOG_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_regex() -> &'static Regex {
    LOG_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?P<ip>[0-9]{1,3}(?:\.[0-9]{1,3}){3}) - - \[(?P<timestamp>.*?)\] "(?P<request>.*?)" (?P<status>[0-9]{3})"#,
        )
        .expect("hard-coded regex should always compile")
    })
}

/// Parse a single access-log line.
///
/// Octets above 255 are accepted as text. Status codes outside 100..=599
/// are treated as a non-matching line.
pub fn parse_log_line(line: &str) -> Result<RawRecord<'_>, ParseError> {
    let malformed = || ParseError::MalformedLine(line.chars().take(100).collect());

    let caps = get_regex().captures(line).ok_or_else(malformed)?;

    let status_code = caps["status"]
        .parse::<u16>()
        .ok()
        .filter(|code| (100..=599).contains(code))
        .ok_or_else(malformed)?;

    // All four groups are mandatory in the pattern.
    let field = |name: &str| caps.name(name).map_or("", |m| m.as_str());

    Ok(RawRecord {
        source_ip: field("ip"),
        timestamp: field("timestamp"),
        request: field("request"),
        status_code,
    })
}

// ─── Unit Tests ──────────────────────────────────────────────────────────────
