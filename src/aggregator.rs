use crate::fetcher::RotationSet;
use crate::parser::{self, LogRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-client roll-up of every record seen for one source IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpSummary {
    pub source_ip: String,
    pub last_seen: String,
    pub last_request: String,
    pub last_status: u16,
    pub request_count: usize,
}

impl IpSummary {
    fn start(record: &LogRecord) -> Self {
        Self {
            source_ip: record.source_ip.clone(),
            last_seen: record.timestamp.clone(),
            last_request: record.request.clone(),
            last_status: record.status_code,
            request_count: 1,
        }
    }

    /// Fold in a record processed after everything seen so far.
    fn absorb(&mut self, record: &LogRecord) {
        self.last_seen.clone_from(&record.timestamp);
        self.last_request.clone_from(&record.request);
        self.last_status = record.status_code;
        self.request_count += 1;
    }
}

/// The complete aggregation output
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Records in processing order: blob index order, then line order.
    pub records: Vec<LogRecord>,
    /// One entry per distinct source IP, keyed and ordered by IP text.
    pub summaries: BTreeMap<String, IpSummary>,
    pub malformed_lines: usize,
    pub malformed_timestamps: usize,
}

impl Aggregation {
    pub fn skipped(&self) -> usize {
        self.malformed_lines + self.malformed_timestamps
    }
}

/// Parse every blob of the set and fold the records into per-IP summaries.
///
/// "Last" means last processed, not latest timestamp: blobs are taken in
/// index order and nothing is re-sorted. Lines that do not parse and
/// timestamps that do not normalize are counted and skipped.
pub fn aggregate(set: &RotationSet) -> Aggregation {
    let mut out = Aggregation::default();

    for (index, blob) in set.iter().enumerate() {
        for (line_num, line) in blob.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let raw = match parser::parse_log_line(line) {
                Ok(raw) => raw,
                Err(e) => {
                    out.malformed_lines += 1;
                    debug!(index, line = line_num + 1, error = %e, "skipping line");
                    continue;
                }
            };

            let record = match raw.into_record() {
                Ok(record) => record,
                Err(e) => {
                    out.malformed_timestamps += 1;
                    debug!(index, line = line_num + 1, error = %e, "skipping record");
                    continue;
                }
            };

            out.summaries
                .entry(record.source_ip.clone())
                .and_modify(|summary| summary.absorb(&record))
                .or_insert_with(|| IpSummary::start(&record));
            out.records.push(record);
        }
    }

    out
}
