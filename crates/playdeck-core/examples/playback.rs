//! Scripted playback example
//!
//! Resolves a file-backed source, plays it against the simulated backing
//! player and prints the widget label and tracking log.
//!
//! Run with: cargo run -p playdeck-core --example playback

use playdeck_core::{
    CommandDispatcher, Config, HttpMetadataProvider, PageServices, SeekSource, SimulatedFactory,
    SourceResolver, StaticProbe, VideoPlayer, Widget, WidgetRole,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

struct PrintLabel;

impl Widget for PrintLabel {
    fn update_label(&self, label: &str) {
        println!("  [label] {}", label);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Playdeck Core - Playback Example");
    println!("================================\n");

    let config = Config::from_json(
        r#"{
            "streams": "",
            "sources": ["https://cdn.example.com/lecture.mp4", "https://cdn.example.com/lecture.webm"],
            "end": "3"
        }"#,
    )?;

    let services = PageServices::default();
    let resolver = SourceResolver::new(
        Arc::new(HttpMetadataProvider::new(Url::parse("http://localhost/metadata")?)),
        Arc::new(StaticProbe::from_list("mp4,webm")),
        services.store.clone(),
    );

    let init = VideoPlayer::initialize(config, &resolver, &SimulatedFactory::with_duration(10.0), &services).await;
    let Some(player) = init.player() else {
        println!("Video unavailable");
        return Ok(());
    };

    println!("Source: {}", player.kind());
    println!("Speeds: {}\n", player.available_speeds().join(", "));

    player.widgets().register(WidgetRole::TimeLabel, Arc::new(PrintLabel));
    let dispatcher = CommandDispatcher::for_player(player);

    tokio::time::sleep(Duration::from_millis(10)).await;
    dispatcher.dispatch("setSpeed", &serde_json::json!("2.0"));
    dispatcher.dispatch("togglePlayback", &serde_json::json!({}));

    // Clip end at 3 s pauses playback on its own
    tokio::time::sleep(Duration::from_millis(1800)).await;
    println!("\nLifecycle: {}", player.lifecycle());

    player.seek(8.0, SeekSource::Command);

    println!("\nTracking log:");
    for record in services.tracking.events() {
        println!("  {}", serde_json::to_string(&record)?);
    }

    player.destroy();
    Ok(())
}
