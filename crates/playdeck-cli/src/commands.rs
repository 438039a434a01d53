//! CLI command implementations

use crate::output::{table, to_json, OutputFormat};
use crate::script::{self, Step};
use anyhow::Context;
use async_trait::async_trait;
use console::style;
use playdeck_core::{
    source::StreamMetadata, BackingPlayer, CommandDispatcher, Config, Error, HttpMetadataProvider,
    JsonFileStore, MemoryStore, MetadataProvider, PageServices, PlayerNotification,
    PreferenceStore, ResolveOutcome, SimulatedPlayer, SourceResolver, SpeedMap, StaticProbe,
    VideoPlayer, Widget, WidgetRole,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tokio::sync::mpsc;
use tracing::debug;

/// Stand-in provider when no metadata endpoint is configured
struct OfflineProvider;

#[async_trait]
impl MetadataProvider for OfflineProvider {
    async fn fetch(&self, stream_id: &str) -> playdeck_core::Result<StreamMetadata> {
        Err(Error::MetadataFetch(format!(
            "no metadata endpoint configured for {stream_id}"
        )))
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Config::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn open_store(path: Option<PathBuf>) -> anyhow::Result<Arc<dyn PreferenceStore>> {
    Ok(match path {
        Some(path) => Arc::new(JsonFileStore::open(&path)?),
        None => Arc::new(MemoryStore::new()),
    })
}

fn resolver(config: &Config, playable: &str, store: Arc<dyn PreferenceStore>) -> SourceResolver {
    let metadata: Arc<dyn MetadataProvider> = match &config.metadata_endpoint {
        Some(endpoint) => Arc::new(HttpMetadataProvider::new(endpoint.clone())),
        None => Arc::new(OfflineProvider),
    };
    SourceResolver::new(metadata, Arc::new(StaticProbe::from_list(playable)), store)
}

/// Resolve a configuration
pub async fn resolve(
    config_path: &Path,
    playable: &str,
    store: Option<PathBuf>,
    format: &str,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(store)?;
    let outcome = resolver(&config, playable, store).resolve(&config).await;

    match OutputFormat::from(format) {
        OutputFormat::Json => match &outcome {
            ResolveOutcome::Ready(source) => println!("{}", to_json(source)),
            ResolveOutcome::Unavailable => println!("{}", to_json(&serde_json::json!({ "unavailable": true }))),
        },
        OutputFormat::Text | OutputFormat::Table => match &outcome {
            ResolveOutcome::Ready(source) => {
                println!("Source: {}", style(source.kind).green().bold());
                if source.degraded {
                    println!("  {}", style("hosted metadata unavailable, continuing degraded").yellow());
                }
                if source.fell_back {
                    println!("  {}", style("fell back from hosted stream").yellow());
                }
                if let Some(stream) = source.primary_stream() {
                    println!("  Stream: {}", stream);
                }
                if let Some(duration) = source.metadata.as_ref().and_then(|m| m.duration) {
                    println!("  Duration: {}", playdeck_core::format_time(duration));
                }
                for (container, url) in &source.files {
                    println!("  File ({}): {}", container, url);
                }
                println!("  Speeds: {}", source.speeds.speed_list().join(", "));
            }
            ResolveOutcome::Unavailable => {
                println!("{}", style("Video unavailable: no playable source").red().bold());
            }
        },
    }

    Ok(())
}

#[derive(Serialize, Tabled)]
struct SpeedRow {
    speed: String,
    id: String,
}

/// Print a parsed stream list
pub fn speeds(streams: &str, format: &str) -> anyhow::Result<()> {
    let map = SpeedMap::parse(streams);
    let rows: Vec<SpeedRow> = map
        .entries()
        .into_iter()
        .map(|(speed, id)| SpeedRow { speed, id })
        .collect();

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", to_json(&rows)),
        OutputFormat::Text | OutputFormat::Table => {
            println!("{}", table(rows));
            if !map.is_usable() {
                println!("{}", style("No 1.0 entry: hosted playback will not be attempted").yellow());
            }
        }
    }

    Ok(())
}

/// Logs label updates at debug level
struct TraceLabel;

impl Widget for TraceLabel {
    fn update_label(&self, label: &str) {
        debug!(label, "Time label");
    }
}

#[derive(Serialize, Tabled)]
struct SessionSummary {
    kind: String,
    state: String,
    elapsed: String,
    speed: String,
    volume: f64,
    muted: bool,
    fullscreen: bool,
}

/// Run a scripted session on the simulated backing player
pub async fn simulate(
    config_path: &Path,
    script: &str,
    playable: &str,
    store: Option<PathBuf>,
    duration: f64,
    format: &str,
) -> anyhow::Result<()> {
    let steps = script::parse(script)?;
    let config = load_config(config_path)?;
    let services = PageServices::new(open_store(store)?);

    let source = match resolver(&config, playable, services.store.clone()).resolve(&config).await {
        ResolveOutcome::Ready(source) => source,
        ResolveOutcome::Unavailable => return Err(Error::NoViableSource.into()),
    };

    let (tx, rx) = mpsc::unbounded_channel::<PlayerNotification>();
    let media_duration = source.metadata.as_ref().and_then(|m| m.duration).unwrap_or(duration);
    let backing = Arc::new(SimulatedPlayer::new(source.kind, media_duration).with_notifications(tx));

    let player = VideoPlayer::new(config, &source, backing.clone(), &services);
    player.widgets().register(WidgetRole::TimeLabel, Arc::new(TraceLabel));
    let pump = player.spawn_notification_pump(rx);
    let dispatcher = CommandDispatcher::for_player(&player);

    backing.mark_ready();
    settle().await;

    for step in steps {
        match step {
            Step::Command { path, args } => {
                if !dispatcher.dispatch(&path, &args) {
                    eprintln!("{} unknown command '{}'", style("warning:").yellow(), path);
                }
            }
            Step::Wait(period) => tokio::time::sleep(period).await,
            Step::Stall => backing.stall(),
            Step::End => backing.finish(),
        }
        settle().await;
    }

    let summary = SessionSummary {
        kind: player.kind().to_string(),
        state: player.lifecycle().to_string(),
        elapsed: playdeck_core::format_time(backing.current_time()),
        speed: player.current_speed(),
        volume: player.volume(),
        muted: player.is_muted(),
        fullscreen: player.is_fullscreen(),
    };

    player.destroy();
    drop(player);
    pump.abort();

    let records = services.tracking.drain();
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            println!(
                "{}",
                to_json(&serde_json::json!({ "summary": summary, "tracking": records }))
            );
        }
        OutputFormat::Text | OutputFormat::Table => {
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
            println!();
            println!("{}", table([summary]));
        }
    }

    Ok(())
}

/// Give the notification pump a chance to run
async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
