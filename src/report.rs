use crate::aggregator::{Aggregation, IpSummary};
use colored::Colorize;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

const SEPARATOR: &str =
    "════════════════════════════════════════════════════════════════════════════════";
const THIN_SEP: &str =
    "────────────────────────────────────────────────────────────────────────────────";

/// Widest request shown in the terminal table; exports keep the full text.
const REQUEST_WIDTH: usize = 32;
const TABLE_WIDTH: usize = 15 + 22 + REQUEST_WIDTH + 6 + 8 + 4 * 2;

/// Print the per-IP summary table to stdout
pub fn print_report(agg: &Aggregation, rotations: usize, source: &str) {
    println!("\n{}", SEPARATOR.cyan().bold());
    println!("{}", "  ACCESS LOG SUMMARY".white().bold());
    println!("{}", SEPARATOR.cyan().bold());
    println!("  Source : {}", source.yellow());
    println!();

    // ── Overview ──────────────────────────────────────────────────────────────
    section_header("OVERVIEW");
    println!("  {:<28} {:>8}", "Files read:", rotations);
    println!(
        "  {:<28} {:>8}",
        "Records parsed:",
        agg.records.len().to_string().green().bold()
    );
    println!("  {:<28} {:>8}", "Distinct clients:", agg.summaries.len());
    println!(
        "  {:<28} {:>8}",
        "Malformed lines skipped:",
        highlight_nonzero(agg.malformed_lines)
    );
    println!(
        "  {:<28} {:>8}",
        "Bad timestamps skipped:",
        highlight_nonzero(agg.malformed_timestamps)
    );
    println!();

    // ── Per-IP table ──────────────────────────────────────────────────────────
    section_header("CLIENTS");
    if agg.summaries.is_empty() {
        println!("  (no data)");
    } else {
        println!(
            "  {:<15}  {:<22}  {:<width$}  {:>6}  {:>8}",
            "Source IP",
            "Last Seen",
            "Last Request",
            "Status",
            "Requests",
            width = REQUEST_WIDTH
        );
        println!("  {}", "─".repeat(TABLE_WIDTH));
        for summary in agg.summaries.values() {
            println!(
                "  {:<15}  {:<22}  {:<width$}  {:>6}  {:>8}",
                summary.source_ip.cyan(),
                summary.last_seen,
                truncate(&summary.last_request, REQUEST_WIDTH),
                color_status(summary.last_status),
                summary.request_count,
                width = REQUEST_WIDTH
            );
        }
    }

    println!("\n{}\n", SEPARATOR.cyan());
}

/// Paths written by [`export_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub records: PathBuf,
    pub summary: PathBuf,
}

impl ExportPaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            records: dir.join(format!("{name}.json")),
            summary: dir.join(format!("{name}_summary.json")),
        }
    }
}

/// Write the record list and the summary table as JSON, replacing earlier output.
pub fn export_json(agg: &Aggregation, paths: &ExportPaths) -> Result<(), io::Error> {
    write_pretty(&agg.records, &paths.records)?;
    let rows: Vec<&IpSummary> = agg.summaries.values().collect();
    write_pretty(&rows, &paths.summary)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn write_pretty<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("serialization failed: {}", e))
    })?;
    std::fs::write(path, json)
}

fn section_header(title: &str) {
    println!("  {} {}", "▶".cyan(), title.white().bold());
    println!("  {}", THIN_SEP);
}

fn highlight_nonzero(n: usize) -> colored::ColoredString {
    if n > 0 {
        n.to_string().yellow().bold()
    } else {
        "0".normal()
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 1).collect();
        format!("{head}…")
    } else {
        s.to_string()
    }
}

/// Colorize HTTP status code based on category
fn color_status(code: u16) -> colored::ColoredString {
    let s = code.to_string();
    match code {
        200..=299 => s.green(),
        300..=399 => s.cyan(),
        400..=499 => s.yellow(),
        500..=599 => s.red().bold(),
        _ => s.normal(),
    }
}
