//! CLI entry point for the fleet timeline tool.
//!
//! Provides subcommands for rebuilding per-second vehicle timelines from a
//! leg payload (file, URL or the fleet API) and for inspecting what a map
//! would show at a given time of day.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use clap::{Parser, Subcommand};
use fleet_timeline::{
    fetch::{self, BasicClient, fetch_bytes},
    ingest::parse_payload,
    output::{append_summaries, print_json, print_pretty, read_records, write_records},
    snapshot::snapshot,
    stations::StationCoords,
    timeline::{
        DEFAULT_MAX_CONTIGUOUS_GAP_MS, DEFAULT_VEHICLE_TYPE, ReconstructOptions, TimelineRecord,
        Window, reconstruct_with_stats,
    },
};
use tracing::{debug, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fleet_timeline")]
#[command(about = "Rebuild per-second vehicle timelines from fleet leg records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct timelines from a leg payload
    Reconstruct {
        /// Path to file or URL to fetch; defaults to the fleet API
        #[arg(value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Service day (YYYY-MM-DD); the window starts at its local midnight
        #[arg(long, conflicts_with = "base_ms")]
        date: Option<NaiveDate>,

        /// Window start as epoch milliseconds
        #[arg(long)]
        base_ms: Option<f64>,

        /// Window length in hours
        #[arg(long, default_value_t = 24.0)]
        window_hours: f64,

        /// Local offset from UTC in minutes, used for wall-clock timestamps
        #[arg(long, default_value_t = 540, allow_negative_numbers = true)]
        utc_offset_minutes: i32,

        /// Longest stop in minutes that keeps two legs in one trip
        #[arg(long, default_value_t = (DEFAULT_MAX_CONTIGUOUS_GAP_MS / 60_000) as f64)]
        max_gap_minutes: f64,

        /// Accept route ids that equal the operation id
        #[arg(long, default_value_t = false)]
        keep_operation_route_ids: bool,

        /// Vehicle type for trips that carry none
        #[arg(long, default_value = DEFAULT_VEHICLE_TYPE)]
        default_vehicle_type: String,

        /// Fleet API base URL (falls back to FLEET_API_BASE)
        #[arg(long)]
        api_base: Option<String>,

        /// File to write the timeline records to
        #[arg(short, long, default_value = "timeline.json")]
        output: String,

        /// Gzip compress the timeline file
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Optional: CSV file to append one summary row per trip to
        #[arg(long)]
        summary: Option<String>,
    },
    /// Show every vehicle visible at a time of day in a timeline file
    Inspect {
        /// Timeline file written by `reconstruct`
        #[arg(value_name = "TIMELINE_FILE")]
        timeline: String,

        /// Local time of day (HH:MM:SS or HH:MM)
        #[arg(long)]
        at: String,

        /// Local offset from UTC in minutes
        #[arg(long, default_value_t = 540, allow_negative_numbers = true)]
        utc_offset_minutes: i32,

        /// Station coordinate CSVs; later files win
        #[arg(long)]
        stations: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fleet_timeline.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fleet_timeline.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconstruct {
            source,
            date,
            base_ms,
            window_hours,
            utc_offset_minutes,
            max_gap_minutes,
            keep_operation_route_ids,
            default_vehicle_type,
            api_base,
            output,
            gzip,
            summary,
        } => {
            let offset = utc_offset(utc_offset_minutes)?;
            let source = resolve_source(source, api_base, date)?;
            let bytes = fetcher(&source).await?;
            let payload = parse_payload(&bytes)?;
            info!(
                legs = payload.legs.len(),
                unparseable = payload.unparseable,
                "Payload decoded"
            );

            let length_ms = (window_hours * 3_600_000.0).round();
            let window = match base_ms {
                Some(start) => Window::from_f64(start, length_ms)?,
                None => {
                    let day = date
                        .or(payload.day)
                        .unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive());
                    Window::local_midnight(day, &offset, length_ms as i64)?
                }
            };

            let options = ReconstructOptions {
                max_contiguous_gap_ms: (max_gap_minutes * 60_000.0).round() as i64,
                reject_operation_route_ids: !keep_operation_route_ids,
                default_vehicle_type,
                utc_offset: offset,
            };

            let result = reconstruct_with_stats(&payload.legs, &window, &options)?;
            let stats = result.stats.with_unparseable(payload.unparseable);
            print_pretty(&stats);
            print_json(&stats)?;
            if stats.legs_in > 0 && stats.legs_accepted == 0 {
                warn!(legs_in = stats.legs_in, "No leg survived validation");
            }

            write_records(&output, &result.records, gzip)?;
            info!(path = %output, records = result.records.len(), gzip, "Timeline written");

            if let Some(summary) = summary {
                append_summaries(&summary, &result.records)?;
                info!(path = %summary, "Trip summaries appended");
            }
        }
        Commands::Inspect {
            timeline,
            at,
            utc_offset_minutes,
            stations,
        } => {
            let offset = utc_offset(utc_offset_minutes)?;
            let time_of_day = parse_time_of_day(&at)?;
            let records = read_records(&timeline)?;

            let mut table = StationCoords::new();
            for path in &stations {
                table.load_csv(path)?;
            }

            inspect(&records, time_of_day, &offset, &table);
        }
    }

    Ok(())
}

fn utc_offset(minutes: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| anyhow!("utc offset of {minutes} minutes is out of range"))
}

/// Picks the payload location: an explicit source wins, otherwise the API
/// replay endpoint for `date` or the live endpoint.
fn resolve_source(
    source: Option<String>,
    api_base: Option<String>,
    date: Option<NaiveDate>,
) -> Result<String> {
    if let Some(source) = source {
        return Ok(source);
    }
    let base = api_base
        .or_else(|| std::env::var(fetch::API_BASE_ENV).ok())
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| {
            anyhow!(
                "no FILE_OR_URL given and no API base (--api-base or {})",
                fetch::API_BASE_ENV
            )
        })?;
    Ok(match date {
        Some(date) => fetch::replay_url(&base, date),
        None => fetch::live_url(&base),
    })
}

/// Loads payload data from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %url))]
async fn fetcher(url: &str) -> Result<Vec<u8>> {
    let bytes = if url.starts_with("http") {
        let client = BasicClient::new()?;
        fetch_bytes(&client, url).await?
    } else {
        std::fs::read(url).with_context(|| format!("reading {url}"))?
    };
    Ok(bytes)
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .with_context(|| format!("invalid time of day `{value}`, expected HH:MM:SS"))
}

/// Seconds from the record's window start to `time_of_day` on the local day
/// the window starts in.
fn seconds_into_window(
    record: &TimelineRecord,
    time_of_day: NaiveTime,
    offset: &FixedOffset,
) -> Option<f64> {
    let start = DateTime::from_timestamp_millis(record.base_ms)?.with_timezone(offset);
    let local_midnight_ms = record.base_ms
        - i64::from(start.num_seconds_from_midnight()) * 1000
        - i64::from(start.nanosecond() / 1_000_000);
    let target_ms =
        local_midnight_ms + i64::from(time_of_day.num_seconds_from_midnight()) * 1000;
    Some((target_ms - record.base_ms) as f64 / 1000.0)
}

#[tracing::instrument(skip_all, fields(records = records.len(), at = %time_of_day))]
fn inspect(
    records: &[TimelineRecord],
    time_of_day: NaiveTime,
    offset: &FixedOffset,
    stations: &StationCoords,
) {
    let mut visible = 0;
    for record in records {
        let Some(t) = seconds_into_window(record, time_of_day, offset) else {
            debug!(vehicle_id = %record.vehicle_id, "Record base time out of range");
            continue;
        };
        let Some(snap) = snapshot(record, t, stations) else {
            continue;
        };
        visible += 1;

        let next_stop = snap
            .upcoming_stops
            .first()
            .map(|s| s.station_id.to_string())
            .unwrap_or_default();
        info!(
            operation_id = %snap.operation_id,
            vehicle_id = %snap.vehicle_id,
            route_id = record.route_id.as_deref().unwrap_or(""),
            vehicle_type = %snap.vehicle_type,
            lon = snap.position[0],
            lat = snap.position[1],
            onboard_general = snap.onboard.general,
            onboard_wheelchair = snap.onboard.wheelchair,
            upcoming_stops = snap.upcoming_stops.len(),
            next_stop,
            "Vehicle"
        );
    }

    if visible == 0 && !records.is_empty() {
        warn!("No vehicle is in service at this time");
    }
    info!(visible, total = records.len(), "Inspection finished");
}
