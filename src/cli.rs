use std::{fs, io::Write, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Deserialize;
use tokio::task::JoinSet;

use crate::attribution::{AttributeRequest, AttributionEngine};
use crate::context::CallContext;
use crate::db::Database;
use crate::dto::{AttributionResponse, ReportDocument, ReportEntry};
use crate::metrics::MetricsCollector;
use crate::models::{ChapterId, Snapshot, VideoId, VideoMetadata, VideoRef};
use crate::settings::{Settings, SettingsStore};
use crate::timeline::ChapterTimeline;
use crate::utils::{format_interval, parse_interval};

#[derive(Parser, Debug)]
#[command(name = "watchtime", version, about = "Buckets video watch time into fixed windows")]
pub struct Cli {
    /// Settings file; created with defaults on first write.
    #[arg(long, global = true, env = "WATCHTIME_CONFIG", default_value = "watchtime.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watched seconds per window for one video.
    Attribute {
        #[arg(long)]
        video: VideoRef,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        /// Window length such as `10m`, `1h` or `1h30m`.
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
        /// Include data-quality counters in the output.
        #[arg(long)]
        metrics: bool,
    },
    /// Attributes every tracked video over the same range.
    Report {
        /// Defaults to one day before `end`.
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Defaults to now.
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },
    /// Appends one playback snapshot.
    Record {
        #[arg(long)]
        video: VideoRef,
        #[arg(long)]
        chapter: i64,
        #[arg(long)]
        offset: i64,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Stores video metadata from a JSON file (one document or an array).
    ImportChapters {
        #[arg(long)]
        file: PathBuf,
    },
    /// Adds a video to the tracked list used by `report`.
    Track { video: VideoRef },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetadataFile {
    One(VideoMetadata),
    Many(Vec<VideoMetadata>),
}

pub async fn execute<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let store = SettingsStore::new(cli.config.clone())?;
    if let Command::Track { video } = &cli.command {
        return track(&store, video, out);
    }

    let settings = store.settings();
    if settings.upstream.is_configured() {
        info!("Upstream credentials are set; metadata is still read from the local cache");
    }
    let database = Database::new(settings.database_path.clone())?;

    match cli.command {
        Command::Attribute {
            video,
            start,
            end,
            interval,
            metrics,
        } => {
            let interval = resolve_interval(&settings, interval)?;
            let engine = build_engine(&database, &settings);
            let request = AttributeRequest::new(video, start, end, interval);
            let attribution = engine.attribute(&request, &settings.call_context()).await?;

            let mut response = AttributionResponse::from(&attribution);
            if metrics {
                response = response.with_metrics(attribution.metrics);
            }
            write_json(out, &response)
        }
        Command::Report {
            start,
            end,
            interval,
        } => {
            let interval = resolve_interval(&settings, interval)?;
            let end = end.unwrap_or_else(Utc::now);
            let start = start.unwrap_or(end - Duration::days(1));
            let document = report(&database, &settings, start, end, interval).await?;
            write_json(out, &document)
        }
        Command::Record {
            video,
            chapter,
            offset,
            at,
        } => {
            let video_id = resolve_video_id(&database, &video).await?;
            let snapshot = Snapshot::new(video_id, ChapterId(chapter), offset, at.unwrap_or_else(Utc::now));
            let id = database.insert_snapshot(&snapshot).await?;
            info!("Recorded snapshot {id} for {video_id} at {}", snapshot.captured_at.to_rfc3339());
            writeln!(out, "{id}")?;
            Ok(())
        }
        Command::ImportChapters { file } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let parsed: MetadataFile = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse video metadata in {}", file.display()))?;
            let videos = match parsed {
                MetadataFile::One(metadata) => vec![metadata],
                MetadataFile::Many(list) => list,
            };

            for metadata in &videos {
                ChapterTimeline::new(metadata.chapters.clone())
                    .with_context(|| format!("Chapter list of {} is invalid", metadata.video_id))?;
                database.upsert_video(metadata).await?;
                writeln!(
                    out,
                    "{} ({} chapters)",
                    metadata.video_id,
                    metadata.chapters.len()
                )?;
            }
            Ok(())
        }
        Command::Track { .. } => Ok(()),
    }
}

fn track<W: Write>(store: &SettingsStore, video: &VideoRef, out: &mut W) -> Result<()> {
    let literal = video.to_string();
    let mut added = false;
    store.update(|settings| {
        if !settings.tracked_videos.contains(&literal) {
            settings.tracked_videos.push(literal.clone());
            added = true;
        }
    })?;
    info!("Saved tracked videos to {}", store.path().display());
    if added {
        writeln!(out, "tracking {literal}")?;
    } else {
        writeln!(out, "{literal} is already tracked")?;
    }
    Ok(())
}

fn build_engine(database: &Database, settings: &Settings) -> AttributionEngine {
    let shared = Arc::new(database.clone());
    AttributionEngine::new(shared.clone(), shared, settings.attribution_config())
}

fn resolve_interval(settings: &Settings, interval: Option<Duration>) -> Result<Duration> {
    match interval {
        Some(interval) => Ok(interval),
        None => settings
            .default_interval()
            .context("default_interval in settings is invalid"),
    }
}

async fn resolve_video_id(database: &Database, video: &VideoRef) -> Result<VideoId> {
    match video {
        VideoRef::Aid(aid) => Ok(*aid),
        VideoRef::Bvid(_) => database
            .get_video(video)
            .await?
            .map(|metadata| metadata.video_id)
            .ok_or_else(|| anyhow!("{video} is unknown; import its chapters first")),
    }
}

/// Runs one attribution per tracked video concurrently. A failed video is
/// reported in its entry and does not abort the others.
pub async fn report(
    database: &Database,
    settings: &Settings,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Duration,
) -> Result<ReportDocument> {
    let videos = settings
        .tracked_video_refs()
        .context("tracked_videos in settings is invalid")?;
    if videos.is_empty() {
        bail!("no tracked videos configured; add some with `watchtime track <video>`");
    }

    let engine = build_engine(database, settings);
    let collector = MetricsCollector::new();
    let ctx = settings.call_context();
    let interrupt = spawn_interrupt_watcher(ctx.clone());

    let mut tasks = JoinSet::new();
    for (index, video) in videos.iter().cloned().enumerate() {
        let engine = engine.clone();
        let collector = collector.clone();
        let ctx = ctx.child();
        tasks.spawn(async move {
            let request = AttributeRequest::new(video.clone(), start, end, interval);
            let entry = match engine.attribute(&request, &ctx).await {
                Ok(attribution) => {
                    collector
                        .record_success(attribution.total_watched_secs, &attribution.metrics)
                        .await;
                    ReportEntry::success(video, AttributionResponse::from(&attribution))
                }
                Err(err) => {
                    warn!("Attribution failed for {video}: {err}");
                    collector.record_failure().await;
                    ReportEntry::failure(video, err.to_string())
                }
            };
            (index, entry)
        });
    }

    let mut entries = Vec::with_capacity(videos.len());
    while let Some(joined) = tasks.join_next().await {
        entries.push(joined.context("attribution task panicked")?);
    }
    interrupt.abort();
    entries.sort_by_key(|(index, _)| *index);

    Ok(ReportDocument {
        start,
        end,
        interval: format_interval(interval),
        videos: entries.into_iter().map(|(_, entry)| entry).collect(),
        metrics: collector.get_snapshot().await,
    })
}

fn spawn_interrupt_watcher(ctx: CallContext) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling outstanding queries");
            ctx.cancel_token().cancel();
        }
    })
}

fn write_json<W: Write, T: serde::Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attribute_arguments() {
        let cli = Cli::try_parse_from([
            "watchtime",
            "--config",
            "cfg.json",
            "attribute",
            "--video",
            "BV1xx411c7mD",
            "--start",
            "2025-01-01T00:00:00Z",
            "--end",
            "2025-01-01T00:10:00Z",
            "--interval",
            "5m",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("cfg.json"));
        match cli.command {
            Command::Attribute {
                video,
                interval,
                metrics,
                ..
            } => {
                assert_eq!(video, VideoRef::bvid("BV1xx411c7mD"));
                assert_eq!(interval, Some(Duration::minutes(5)));
                assert!(!metrics);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_interval_literal() {
        let parsed = Cli::try_parse_from([
            "watchtime",
            "report",
            "--interval",
            "5 parsecs",
        ]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn track_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("watchtime.json");
        for _ in 0..2 {
            let cli = Cli::try_parse_from([
                "watchtime",
                "--config",
                config.to_str().unwrap(),
                "track",
                "av170001",
            ])
            .unwrap();
            execute(cli, &mut Vec::new()).await.unwrap();
        }

        let settings = SettingsStore::new(config).unwrap().settings();
        assert_eq!(settings.tracked_videos, vec!["av170001".to_string()]);
    }
}
