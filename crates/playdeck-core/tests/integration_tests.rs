//! Integration tests for Playdeck Core

use async_trait::async_trait;
use playdeck_core::{
    source::StreamMetadata,
    store::{KEY_PLAYER_KIND, KEY_SPEED},
    BackendState, CommandDispatcher, Config, Error, Initialization, JsonFileStore, LifecycleState,
    MetadataProvider, PageServices, PlayTime, PlayerNotification, PreferenceStore, RawConfig,
    SeekSource, SimulatedFactory, SourceKind, SourceResolver, SpeedMap, SpeedRegistry,
    StaticProbe, TrackingEvent, VideoPlayer, Widget, WidgetRole,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Fixtures
// =============================================================================

struct Provider {
    calls: AtomicUsize,
    delay: Duration,
    duration: Option<f64>,
}

impl Provider {
    fn answering(duration: f64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            duration: Some(duration),
        })
    }

    fn hanging() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(30),
            duration: None,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for Provider {
    async fn fetch(&self, stream_id: &str) -> playdeck_core::Result<StreamMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(StreamMetadata {
            id: stream_id.to_string(),
            duration: self.duration,
        })
    }
}

#[derive(Default)]
struct Scrubber {
    times: Mutex<Vec<PlayTime>>,
}

impl Widget for Scrubber {
    fn update_play_time(&self, time: &PlayTime) {
        self.times.lock().unwrap().push(*time);
    }
}

#[derive(Default)]
struct Label {
    text: Mutex<String>,
}

impl Widget for Label {
    fn update_label(&self, label: &str) {
        *self.text.lock().unwrap() = label.to_string();
    }
}

fn config(value: serde_json::Value) -> Config {
    let raw: RawConfig = serde_json::from_value(value).unwrap();
    Config::from_raw(raw).unwrap()
}

async fn start(
    config: Config,
    provider: Arc<Provider>,
    probe: StaticProbe,
    services: &PageServices,
) -> Initialization {
    let resolver = SourceResolver::new(provider, Arc::new(probe), services.store.clone());
    VideoPlayer::initialize(config, &resolver, &SimulatedFactory::new(), services).await
}

/// Let the notification pump drain
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// =============================================================================
// Resolution Scenarios
// =============================================================================

#[tokio::test]
async fn test_hosted_speed_list_is_sorted() {
    let services = PageServices::default();
    let provider = Provider::answering(187.0);

    let init = start(
        config(json!({ "streams": "id3:1.5,id1:0.75,id2:1.0" })),
        provider.clone(),
        StaticProbe::all(),
        &services,
    )
    .await;

    let player = init.player().unwrap();
    assert_eq!(player.kind(), SourceKind::Hosted);
    assert_eq!(player.available_speeds(), vec!["0.75", "1.0", "1.5"]);
    assert_eq!(player.duration(), 187.0);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_empty_stream_list_plays_file_without_fetch() {
    let services = PageServices::default();
    let provider = Provider::answering(60.0);

    let init = start(
        config(json!({
            "streams": "",
            "sources": ["https://cdn.example.com/lecture.webm"]
        })),
        provider.clone(),
        StaticProbe::from_list("webm"),
        &services,
    )
    .await;

    assert_eq!(init.player().unwrap().kind(), SourceKind::File);
    assert_eq!(provider.calls(), 0);
    assert_eq!(services.store.get(KEY_PLAYER_KIND).as_deref(), Some("file"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_files_stays_hosted() {
    let services = PageServices::default();
    let provider = Provider::hanging();

    let init = start(
        config(json!({ "streams": "abc:1.0", "yt_test_timeout": "1500" })),
        provider.clone(),
        StaticProbe::all(),
        &services,
    )
    .await;

    let player = init.player().expect("hosted path continues degraded");
    assert_eq!(player.kind(), SourceKind::Hosted);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_nothing_playable_is_unavailable() {
    let services = PageServices::default();

    let init = start(
        config(json!({ "sources": ["https://cdn.example.com/lecture.ogv"] })),
        Provider::answering(1.0),
        StaticProbe::from_list("mp4"),
        &services,
    )
    .await;

    assert!(init.player().is_none());
}

// =============================================================================
// Playback Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_ready_then_play_drives_widgets() {
    let services = PageServices::default();
    let init = start(
        config(json!({ "sources": ["https://cdn.example.com/lecture.mp4"] })),
        Provider::answering(1.0),
        StaticProbe::all(),
        &services,
    )
    .await;
    let player = init.player().unwrap().clone();
    let label = Arc::new(Label::default());
    player.widgets().register(WidgetRole::TimeLabel, label.clone());

    settle().await;
    assert!(player.play());
    settle().await;
    assert_eq!(player.lifecycle(), LifecycleState::Playing);

    tokio::time::sleep(Duration::from_millis(65_000)).await;
    assert_eq!(*label.text.lock().unwrap(), "1:05 / 5:00");

    player.pause();
    settle().await;
    assert_eq!(player.lifecycle(), LifecycleState::Paused);
    assert!(!player.is_polling());

    let names: Vec<_> = services
        .tracking
        .events_for(player.id())
        .iter()
        .map(|e| e.name())
        .collect();
    assert_eq!(names, vec!["load_video", "play_video", "pause_video"]);
}

#[tokio::test(start_paused = true)]
async fn test_only_one_instance_plays() {
    let services = PageServices::default();
    let mut players = Vec::new();
    for _ in 0..2 {
        let init = start(
            config(json!({ "sources": ["https://cdn.example.com/lecture.mp4"] })),
            Provider::answering(1.0),
            StaticProbe::all(),
            &services,
        )
        .await;
        players.push(init.player().unwrap().clone());
    }
    settle().await;

    players[0].play();
    settle().await;
    players[1].play();
    settle().await;

    assert_eq!(players[0].lifecycle(), LifecycleState::Paused);
    assert!(!players[0].is_polling());
    assert!(!players[0].is_playing());
    assert_eq!(players[1].lifecycle(), LifecycleState::Playing);
    assert_eq!(services.registry.active(), Some(players[1].id()));
}

#[tokio::test(start_paused = true)]
async fn test_seek_while_paused_updates_widgets_immediately() {
    let services = PageServices::default();
    let init = start(
        config(json!({ "streams": "abc:1.0" })),
        Provider::answering(600.0),
        StaticProbe::all(),
        &services,
    )
    .await;
    let player = init.player().unwrap().clone();
    let scrubber = Arc::new(Scrubber::default());
    player.widgets().register(WidgetRole::Scrubber, scrubber.clone());
    settle().await;

    assert!(player.seek(60.0, SeekSource::Slider));

    let times = scrubber.times.lock().unwrap().clone();
    assert_eq!(times, vec![PlayTime::new(60.0, 600.0)]);
    assert!(!player.is_polling());

    let events = services.tracking.events();
    let last = events.last().unwrap();
    assert_eq!(last.code, "abc");
    assert_eq!(
        last.event,
        TrackingEvent::SeekVideo {
            old_time: 0.0,
            new_time: 60.0,
            seek_type: SeekSource::Slider,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_nan_ticks_produce_no_updates() {
    let services = PageServices::default();
    let source = playdeck_core::ResolvedSource {
        kind: SourceKind::File,
        speeds: SpeedMap::file_backed(),
        files: Default::default(),
        metadata: None,
        degraded: false,
        fell_back: false,
    };
    let backing = Arc::new(playdeck_core::SimulatedPlayer::new(SourceKind::File, 30.0));
    backing.mark_ready();
    backing.set_time_readable(false);
    let player = VideoPlayer::new(Config::default(), &source, backing.clone(), &services);
    let scrubber = Arc::new(Scrubber::default());
    player.widgets().register(WidgetRole::Scrubber, scrubber.clone());

    player.play();
    player.handle_notification(PlayerNotification::StateChange {
        state: BackendState::Playing,
    });
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(scrubber.times.lock().unwrap().is_empty());
}

// =============================================================================
// Dispatch & Speed
// =============================================================================

#[tokio::test]
async fn test_dispatch_unknown_path() {
    let services = PageServices::default();
    let init = start(
        config(json!({ "sources": ["https://cdn.example.com/lecture.mp4"] })),
        Provider::answering(1.0),
        StaticProbe::all(),
        &services,
    )
    .await;
    let dispatcher = CommandDispatcher::for_player(init.player().unwrap());

    assert!(!dispatcher.dispatch("nonexistent.path", &json!({})));
    assert!(dispatcher.dispatch("setSpeed", &json!({ "speed": "1.25" })));
    assert_eq!(init.player().unwrap().current_speed(), "1.25");
}

#[test]
fn test_unknown_speed_falls_back_to_default() {
    let store = Arc::new(playdeck_core::MemoryStore::new());
    let mut registry = SpeedRegistry::new(SpeedMap::parse("a:0.75,b:1.5"), store);

    assert_eq!(registry.select("2.0", false), "1.0");
    assert_eq!(registry.current(), "1.0");
}

#[test]
fn test_speed_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");

    {
        let store = Arc::new(tokio_test::assert_ok!(JsonFileStore::open(&path)));
        let mut registry = SpeedRegistry::new(SpeedMap::file_backed(), store);
        registry.select("1.5", true);
    }

    let store: Arc<dyn PreferenceStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    assert_eq!(store.get(KEY_SPEED).as_deref(), Some("1.5"));

    let restored = SpeedRegistry::restore(SpeedMap::file_backed(), store, None);
    assert_eq!(restored.current(), "1.5");
}

#[test]
fn test_resolution_on_blocking_runtime() {
    let services = PageServices::default();
    let resolver = SourceResolver::new(
        Provider::answering(10.0),
        Arc::new(StaticProbe::none()),
        services.store.clone(),
    );

    let outcome = tokio_test::block_on(resolver.resolve(&config(json!({ "streams": "x:1" }))));

    assert_eq!(outcome.kind(), Some(SourceKind::Hosted));
    assert_eq!(outcome.source().unwrap().primary_stream(), Some("x"));
}

#[test]
fn test_bad_config_is_an_error() {
    let result = Config::from_json(r#"{"metadata_endpoint": "not a url"}"#);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
