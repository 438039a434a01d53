//! Core types for Playdeck

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one player instance on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which kind of backing player serves the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Third-party streaming widget addressed by stream ids
    Hosted,
    /// Direct media file played by a local element
    File,
}

impl SourceKind {
    /// Value written to the preference store
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Hosted => "hosted",
            SourceKind::File => "file",
        }
    }

    /// Parse a stored value
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "hosted" => Some(SourceKind::Hosted),
            "file" => Some(SourceKind::File),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Container formats a file-backed source may be offered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    Mp4,
    Webm,
    Ogg,
    Hls,
}

impl ContainerFormat {
    /// Probe order for file-backed resolution
    pub const ALL: [ContainerFormat; 4] = [
        ContainerFormat::Mp4,
        ContainerFormat::Webm,
        ContainerFormat::Ogg,
        ContainerFormat::Hls,
    ];

    /// MIME type (with codecs) handed to the codec probe
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "video/mp4; codecs=\"avc1.42E01E, mp4a.40.2\"",
            ContainerFormat::Webm => "video/webm; codecs=\"vp8, vorbis\"",
            ContainerFormat::Ogg => "video/ogg; codecs=\"theora\"",
            ContainerFormat::Hls => "application/vnd.apple.mpegurl",
        }
    }

    /// Detect format from a URL path extension
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.to_lowercase();
        if path.ends_with(".mp4") || path.ends_with(".m4v") {
            Some(ContainerFormat::Mp4)
        } else if path.ends_with(".webm") {
            Some(ContainerFormat::Webm)
        } else if path.ends_with(".ogv") || path.ends_with(".ogg") {
            Some(ContainerFormat::Ogg)
        } else if path.ends_with(".m3u8") {
            Some(ContainerFormat::Hls)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerFormat::Mp4 => write!(f, "mp4"),
            ContainerFormat::Webm => write!(f, "webm"),
            ContainerFormat::Ogg => write!(f, "ogg"),
            ContainerFormat::Hls => write!(f, "hls"),
        }
    }
}

/// Lifecycle state tracked by the playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Unstarted => write!(f, "unstarted"),
            LifecycleState::Playing => write!(f, "playing"),
            LifecycleState::Paused => write!(f, "paused"),
            LifecycleState::Buffering => write!(f, "buffering"),
            LifecycleState::Ended => write!(f, "ended"),
        }
    }
}

/// State as reported by a backing player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
    /// Video loaded but not started (hosted widgets only)
    Cued,
}

/// Notification delivered by a backing player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerNotification {
    /// Backing player finished initializing
    Ready,
    /// Backing player changed state
    StateChange { state: BackendState },
}

/// Elapsed time pushed to dependent widgets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayTime {
    /// Current position in seconds
    pub elapsed: f64,
    /// Total duration in whole seconds (0 when unknown)
    pub duration: f64,
}

impl PlayTime {
    pub fn new(elapsed: f64, duration: f64) -> Self {
        Self { elapsed, duration }
    }

    /// "elapsed / total" label, both sides rounded independently
    pub fn vcr_label(&self) -> String {
        format!("{} / {}", format_time(self.elapsed), format_time(self.duration))
    }
}

/// Format seconds as `m:ss`, or `h:mm:ss` past the hour
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Events emitted to listeners outside the state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    Play,
    Pause,
    Ended,
    Seek { time: f64 },
    #[serde(rename = "volumechange")]
    VolumeChange { volume: f64, muted: bool },
    #[serde(rename = "speedchange")]
    SpeedChange { speed: String },
    #[serde(rename = "fullscreen")]
    FullScreen { active: bool },
}
