mod aggregator;
mod cache;
mod config;
mod error;
mod fetcher;
mod parser;
mod remote;
mod report;
mod timestamp;

use aggregator::Aggregation;
use cache::{BlobSink, DirCache};
use clap::Parser;
use config::{Config, Overrides, DEFAULT_REMOTE_PATH, DEFAULT_ROTATIONS};
use error::FetchError;
use fetcher::{RotationFetcher, RotationSet};
use remote::{RemoteSource, SshSource};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Fetch rotated access logs from a remote host and summarize requests per client IP
#[derive(Parser, Debug)]
#[command(
    name = "rotlog",
    author,
    version,
    about = "Fetches an access log and its rotations over SSH and summarizes them per client IP"
)]
struct Args {
    /// Remote user (falls back to $USER)
    #[arg(long)]
    user: Option<String>,

    /// Remote host (falls back to $HOST)
    #[arg(long)]
    host: Option<String>,

    /// Password for sudo on the remote host (falls back to $PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    port: u16,

    /// Directory for cached logs and exported summaries
    #[arg(long, default_value = "logs", value_name = "DIR")]
    dir: PathBuf,

    /// Absolute path of the current log on the remote host
    #[arg(long, default_value = DEFAULT_REMOTE_PATH, value_name = "PATH")]
    remote_path: String,

    /// Logical name used for cached and exported files
    #[arg(long, default_value = "access")]
    name: String,

    /// Maximum number of files to read, current log included
    #[arg(short = 'r', long, default_value_t = DEFAULT_ROTATIONS, value_name = "N")]
    rotations: usize,

    /// Per-file fetch timeout in seconds
    #[arg(short = 't', long, default_value_t = 30, value_name = "SECS")]
    timeout: u64,

    /// Summarize the logs already cached in --dir without contacting the host
    #[arg(long)]
    local: bool,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

impl From<&Args> for Overrides {
    fn from(args: &Args) -> Self {
        Overrides {
            user: args.user.clone(),
            host: args.host.clone(),
            password: args.password.clone(),
            port: args.port,
            timeout_secs: args.timeout,
            remote_path: args.remote_path.clone(),
            name: args.name.clone(),
            cache_dir: args.dir.clone(),
            max_rotations: args.rotations,
            local_only: args.local,
        }
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Fetch the rotation set and aggregate it. Nothing is aggregated unless the
/// base log was retrieved.
fn summarize<S, K>(
    fetcher: &mut RotationFetcher<S>,
    base_path: &str,
    sink: &mut K,
) -> Result<(RotationSet, Aggregation), FetchError>
where
    S: RemoteSource,
    K: BlobSink,
{
    let set = fetcher.fetch(base_path, sink)?;
    let agg = aggregator::aggregate(&set);
    Ok((set, agg))
}

fn main() {
    let args = Args::parse();
    init_logging(args.quiet);

    let config = match Config::resolve(Overrides::from(&args)) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let mut cache = match DirCache::open(&config.cache_dir, &config.name) {
        Ok(c) => c,
        Err(e) => {
            error!(dir = %config.cache_dir.display(), "could not create cache directory: {e}");
            std::process::exit(1);
        }
    };

    let (set, agg, source) = match &config.remote {
        Some(remote) => {
            let source = format!("{}:{}", remote.host, config.remote_path);
            let mut fetcher = RotationFetcher::new(SshSource::new(remote.clone()))
                .with_max_rotations(config.max_rotations);
            match summarize(&mut fetcher, &config.remote_path, &mut cache) {
                Ok((set, agg)) => (set, agg, source),
                Err(e) => {
                    error!("{e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            let blobs = match cache.load(config.max_rotations) {
                Ok(b) => b,
                Err(e) => {
                    error!(dir = %cache.dir().display(), "could not read cached logs: {e}");
                    std::process::exit(1);
                }
            };
            if blobs.is_empty() {
                error!(path = %cache.path_for(0).display(), "no cached log found");
                std::process::exit(1);
            }
            let set = RotationSet::from_blobs(blobs);
            let agg = aggregator::aggregate(&set);
            (set, agg, cache.path_for(0).display().to_string())
        }
    };

    info!(
        files = set.len(),
        records = agg.records.len(),
        clients = agg.summaries.len(),
        skipped = agg.skipped(),
        "aggregation complete"
    );

    report::print_report(&agg, set.len(), &source);

    let paths = report::ExportPaths::new(cache.dir(), cache.name());
    match report::export_json(&agg, &paths) {
        Ok(_) => println!(
            "✓ Records saved to '{}', summary to '{}'",
            paths.records.display(),
            paths.summary.display()
        ),
        Err(e) => {
            error!("failed to write JSON output: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetcher::tests::{FakeRemote, MemorySink};

    const BASE: &str = "/var/log/nginx/access.log";

    #[test]
    fn end_to_end_over_rotations() {
        let remote = FakeRemote::default()
            .with(
                BASE,
                concat!(
                    r#"1.2.3.4 - - [01/Jan/2024:00:00:00 +0000] "GET /a HTTP/1.1" 200"#,
                    "\n",
                    "this line is junk\n",
                ),
            )
            .with(
                &format!("{BASE}.1"),
                concat!(
                    r#"1.2.3.4 - - [01/Jan/2024:00:01:00 +0000] "GET /b HTTP/1.1" 404"#,
                    "\n",
                    r#"5.6.7.8 - - [bad stamp] "GET / HTTP/1.1" 200"#,
                    "\n",
                ),
            );
        let mut fetcher = RotationFetcher::new(remote);
        let mut sink = MemorySink::default();

        let (set, agg) = summarize(&mut fetcher, BASE, &mut sink).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(agg.summaries.len(), 1);
        let summary = &agg.summaries["1.2.3.4"];
        assert_eq!(summary.request_count, 2);
        assert_eq!(summary.last_request, "GET /b HTTP/1.1");
        assert_eq!(summary.last_status, 404);
        assert_eq!(agg.malformed_lines, 1);
        assert_eq!(agg.malformed_timestamps, 1);
    }

    #[test]
    fn unavailable_base_produces_no_summary() {
        let remote = FakeRemote::default()
            .with(&format!("{BASE}.1"), "irrelevant\n")
            .broken_at(BASE);
        let mut fetcher = RotationFetcher::new(remote);
        let mut sink = MemorySink::default();

        let result = summarize(&mut fetcher, BASE, &mut sink);
        assert!(matches!(result, Err(FetchError::RemoteUnavailable { .. })));
        assert!(sink.stored.is_empty());
    }

    #[test]
    fn cached_run_matches_remote_run() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = FakeRemote::default()
            .with(BASE, "9.9.9.9 - - [01/Jan/2024:00:00:00 +0000] \"GET / HTTP/1.1\" 200\n")
            .with(&format!("{BASE}.1"), "9.9.9.9 - - [01/Jan/2024:00:00:09 +0000] \"GET /x HTTP/1.1\" 302\n");
        let mut cache = DirCache::open(tmp.path(), "access").unwrap();
        let mut fetcher = RotationFetcher::new(remote);
        let (_, from_remote) = summarize(&mut fetcher, BASE, &mut cache).unwrap();

        let from_cache = aggregator::aggregate(&RotationSet::from_blobs(cache.load(14).unwrap()));
        assert_eq!(from_remote, from_cache);
    }

    #[test]
    fn cache_follows_the_latest_shorter_run() {
        let tmp = tempfile::tempdir().unwrap();
        let line = |ip: &str| format!("{ip} - - [01/Jan/2024:00:00:00 +0000] \"GET / HTTP/1.1\" 200\n");
        let mut cache = DirCache::open(tmp.path(), "access").unwrap();

        let long = FakeRemote::default()
            .with(BASE, &line("1.1.1.1"))
            .with(&format!("{BASE}.1"), &line("1.1.1.1"))
            .with(&format!("{BASE}.2"), &line("2.2.2.2"))
            .with(&format!("{BASE}.3"), &line("3.3.3.3"));
        summarize(&mut RotationFetcher::new(long), BASE, &mut cache).unwrap();

        let short = FakeRemote::default()
            .with(BASE, &line("1.1.1.1"))
            .with(&format!("{BASE}.1"), &line("1.1.1.1"));
        let (set, from_remote) =
            summarize(&mut RotationFetcher::new(short), BASE, &mut cache).unwrap();

        let cached = RotationSet::from_blobs(cache.load(14).unwrap());
        assert_eq!(cached.len(), set.len());
        assert_eq!(aggregator::aggregate(&cached), from_remote);
        assert_eq!(from_remote.summaries.len(), 1);
    }

    #[test]
    fn args_map_onto_overrides() {
        let args = Args::parse_from([
            "rotlog", "--host", "web1", "--rotations", "3", "--local", "--dir", "/tmp/x",
        ]);
        let overrides = Overrides::from(&args);
        assert_eq!(overrides.host.as_deref(), Some("web1"));
        assert_eq!(overrides.max_rotations, 3);
        assert!(overrides.local_only);
        assert_eq!(overrides.cache_dir, PathBuf::from("/tmp/x"));
        assert_eq!(overrides.remote_path, DEFAULT_REMOTE_PATH);
        assert_eq!(overrides.timeout_secs, 30);
    }
}
