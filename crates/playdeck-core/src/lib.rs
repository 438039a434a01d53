//! Playdeck Core - Video Playback Controller
//!
//! This crate provides the controller that sits between a page's video
//! widgets and whichever backing player actually plays the video:
//! - Source resolution between a hosted stream and file-backed playback
//! - Speed selection with cross-session persistence
//! - The playback lifecycle state machine
//! - Clock polling that keeps captions, scrubber and time label in sync
//! - One-playing-instance-per-page coordination
//! - Command dispatch by name for loosely coupled UI
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Playdeck Core                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Source    │  │    Speed     │  │   Command    │           │
//! │  │   Resolver   │  │   Registry   │  │  Dispatcher  │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │   Video     │◄──── backing player          │
//! │                    │   Player    │      notifications           │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │   Tracking   │  │    Clock    │  │    Active    │            │
//! │  │   Emitter    │  │   Poller    │  │   Registry   │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod store;
pub mod speed;
pub mod source;
pub mod backend;
pub mod widgets;
pub mod poller;
pub mod registry;
pub mod tracking;
pub mod player;
pub mod dispatch;

pub use error::{Error, Result};
pub use types::*;
pub use config::{ClipBounds, Config, RawConfig};
pub use store::{JsonFileStore, MemoryStore, PreferenceStore};
pub use speed::{SpeedMap, SpeedRegistry};
pub use source::{HttpMetadataProvider, MetadataProvider, ResolveOutcome, ResolvedSource, SourceResolver, StaticProbe};
pub use backend::{BackingPlayer, PlayerFactory, SimulatedFactory, SimulatedPlayer};
pub use widgets::{Widget, WidgetBus, WidgetRole};
pub use poller::ClockPoller;
pub use registry::ActiveInstanceRegistry;
pub use tracking::{SeekSource, TrackingEmitter, TrackingEvent, TrackingRecord};
pub use player::{Initialization, PageServices, VideoPlayer};
pub use dispatch::CommandDispatcher;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Playdeck Core initialized");
}
