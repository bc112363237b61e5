use crate::error::TimestampError;
use chrono::DateTime;

/// Layout of the bracketed access-log timestamp, e.g. `10/Oct/2023:13:55:36 -0700`.
const ACCESS_LOG_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Display layout used in records and summaries, e.g. `Oct 10, 2023 01:55 PM`.
const DISPLAY_FORMAT: &str = "%b %d, %Y %I:%M %p";

/// Convert an access-log timestamp into its display form.
///
/// The offset is honoured when parsing, and the wall-clock time at that
/// offset is what gets rendered. The offset itself is dropped.
pub fn normalize(raw: &str) -> Result<String, TimestampError> {
    let parsed = DateTime::parse_from_str(raw.trim(), ACCESS_LOG_FORMAT).map_err(|_| {
        TimestampError::MalformedTimestamp {
            raw: raw.to_string(),
        }
    })?;

    Ok(parsed.format(DISPLAY_FORMAT).to_string())
}
