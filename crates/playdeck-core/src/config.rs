//! Player configuration
//!
//! [`RawConfig`] mirrors the loosely-typed attributes a page hands over;
//! [`Config`] is the normalised, read-only snapshot one instance runs with.

use crate::{types::ContainerFormat, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Default bound on the hosted metadata request
pub const DEFAULT_RESOLUTION_TIMEOUT_MS: u64 = 1500;

/// Configuration as supplied by the page, before normalisation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Clip start, seconds
    #[serde(alias = "start_time")]
    pub start: Option<Value>,
    /// Clip end, seconds
    #[serde(alias = "end_time")]
    pub end: Option<Value>,
    pub show_captions: Option<Value>,
    /// Caption file path
    pub sub: Option<String>,
    /// Hosted stream list, `id:speed,id:speed,...`
    pub streams: Option<String>,
    /// File source URLs, one per container format
    pub sources: Vec<String>,
    /// Resolution timeout in milliseconds
    #[serde(alias = "resolution_timeout")]
    pub yt_test_timeout: Option<Value>,
    pub autoplay: Option<Value>,
    /// Hosted provider metadata endpoint
    pub metadata_endpoint: Option<String>,
    /// Speed stored with the course state
    pub speed: Option<String>,
    /// Speed preferred across all videos
    pub general_speed: Option<String>,
    /// Prefer a playable file source over the hosted stream
    pub prioritize_file: Option<Value>,
}

/// Clip start/end bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipBounds {
    /// Seconds to seek to on first play (0 = none)
    pub start: f64,
    /// Seconds at which playback pauses once
    pub end: Option<f64>,
}

impl ClipBounds {
    /// Bounds that never interfere with playback
    pub const NONE: ClipBounds = ClipBounds { start: 0.0, end: None };

    pub fn is_none(&self) -> bool {
        self.start == 0.0 && self.end.is_none()
    }
}

impl Default for ClipBounds {
    fn default() -> Self {
        Self::NONE
    }
}

/// Normalised configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bounds: ClipBounds,
    pub show_captions: bool,
    pub caption_path: Option<String>,
    /// Hosted stream list (possibly empty)
    pub streams: String,
    /// File sources by container format (possibly empty)
    pub sources: BTreeMap<ContainerFormat, Url>,
    pub resolution_timeout: Duration,
    pub autoplay: bool,
    pub metadata_endpoint: Option<Url>,
    /// Speed to start with when nothing is persisted
    pub preferred_speed: Option<String>,
    pub prioritize_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bounds: ClipBounds::NONE,
            show_captions: false,
            caption_path: None,
            streams: String::new(),
            sources: BTreeMap::new(),
            resolution_timeout: Duration::from_millis(DEFAULT_RESOLUTION_TIMEOUT_MS),
            autoplay: false,
            metadata_endpoint: None,
            preferred_speed: None,
            prioritize_file: false,
        }
    }
}

impl Config {
    /// Normalise page-supplied attributes
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let start = raw
            .start
            .as_ref()
            .and_then(parse_int)
            .filter(|v| *v >= 0)
            .unwrap_or(0);

        let end = raw
            .end
            .as_ref()
            .and_then(parse_int)
            .filter(|v| *v != 0)
            .filter(|v| *v >= start);

        let timeout_ms = raw
            .yt_test_timeout
            .as_ref()
            .and_then(parse_int)
            .filter(|v| *v >= 0)
            .map(|v| v as u64)
            .unwrap_or(DEFAULT_RESOLUTION_TIMEOUT_MS);

        let caption_path = raw.sub.filter(|s| !s.trim().is_empty());
        let show_captions = raw.show_captions.as_ref().map(is_true).unwrap_or(true)
            && caption_path.is_some();

        let mut sources = BTreeMap::new();
        for source in &raw.sources {
            match Url::parse(source) {
                Ok(url) => match ContainerFormat::from_path(url.path()) {
                    Some(format) => {
                        sources.entry(format).or_insert(url);
                    }
                    None => warn!(source = %source, "Ignoring source with unknown container"),
                },
                Err(e) => warn!(source = %source, error = %e, "Ignoring malformed source URL"),
            }
        }

        let metadata_endpoint = match raw.metadata_endpoint.filter(|s| !s.trim().is_empty()) {
            Some(endpoint) => Some(Url::parse(&endpoint).map_err(|e| {
                Error::InvalidConfig(format!("metadata endpoint {endpoint}: {e}"))
            })?),
            None => None,
        };

        let preferred_speed = raw
            .speed
            .filter(|s| !s.trim().is_empty())
            .or(raw.general_speed.filter(|s| !s.trim().is_empty()));

        Ok(Self {
            bounds: ClipBounds {
                start: start as f64,
                end: end.map(|v| v as f64),
            },
            show_captions,
            caption_path,
            streams: raw.streams.unwrap_or_default().trim().to_string(),
            sources,
            resolution_timeout: Duration::from_millis(timeout_ms),
            autoplay: raw.autoplay.as_ref().map(is_true).unwrap_or(false),
            metadata_endpoint,
            preferred_speed,
            prioritize_file: raw.prioritize_file.as_ref().map(is_true).unwrap_or(false),
        })
    }

    /// Parse and normalise a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Whether any hosted stream ids were supplied
    pub fn has_streams(&self) -> bool {
        !self.streams.is_empty()
    }
}

/// Leading-integer parse of a number or string, like a page attribute reader
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            s[..end].parse().ok()
        }
        _ => None,
    }
}

/// Boolean attribute check: only a case-insensitive "true" counts
fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_raw(RawConfig::default()).unwrap();
        assert_eq!(config.resolution_timeout, Duration::from_millis(1500));
        assert!(config.bounds.is_none());
        assert!(!config.has_streams());
        assert!(config.sources.is_empty());
        assert!(!config.show_captions);
        assert!(!config.autoplay);
    }

    #[test]
    fn test_timeout_non_finite_uses_default() {
        let config = Config::from_raw(raw(json!({ "yt_test_timeout": "soon" }))).unwrap();
        assert_eq!(config.resolution_timeout, Duration::from_millis(1500));

        let config = Config::from_raw(raw(json!({ "yt_test_timeout": "2500ms" }))).unwrap();
        assert_eq!(config.resolution_timeout, Duration::from_millis(2500));

        let config = Config::from_raw(raw(json!({ "resolution_timeout": 800 }))).unwrap();
        assert_eq!(config.resolution_timeout, Duration::from_millis(800));
    }

    #[test]
    fn test_clip_bounds() {
        let config = Config::from_raw(raw(json!({ "start": "-5", "end": "0" }))).unwrap();
        assert_eq!(config.bounds, ClipBounds::NONE);

        let config = Config::from_raw(raw(json!({ "start": "10", "end": 30 }))).unwrap();
        assert_eq!(config.bounds, ClipBounds { start: 10.0, end: Some(30.0) });

        // End before start is dropped
        let config = Config::from_raw(raw(json!({ "start": 40, "end": 30 }))).unwrap();
        assert_eq!(config.bounds, ClipBounds { start: 40.0, end: None });
    }

    #[test]
    fn test_sources_classified() {
        let config = Config::from_raw(raw(json!({
            "sources": [
                "https://cdn.example.com/v/clip.mp4",
                "https://cdn.example.com/v/clip.webm?sig=abc",
                "https://cdn.example.com/v/clip.avi",
                "not a url"
            ]
        })))
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert!(config.sources.contains_key(&ContainerFormat::Mp4));
        assert!(config.sources.contains_key(&ContainerFormat::Webm));
    }

    #[test]
    fn test_booleans_and_captions() {
        let config = Config::from_raw(raw(json!({
            "show_captions": "True",
            "sub": "captions.srt.sjson",
            "autoplay": "false",
            "prioritize_file": true
        })))
        .unwrap();
        assert!(config.show_captions);
        assert!(!config.autoplay);
        assert!(config.prioritize_file);

        let config = Config::from_raw(raw(json!({ "show_captions": "true", "sub": "" }))).unwrap();
        assert!(!config.show_captions);
    }

    #[test]
    fn test_preferred_speed() {
        let config = Config::from_raw(raw(json!({ "general_speed": "1.5" }))).unwrap();
        assert_eq!(config.preferred_speed.as_deref(), Some("1.5"));

        let config =
            Config::from_raw(raw(json!({ "speed": "0.75", "general_speed": "1.5" }))).unwrap();
        assert_eq!(config.preferred_speed.as_deref(), Some("0.75"));
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let result = Config::from_raw(raw(json!({ "metadata_endpoint": "::nope" })));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(r#"{"streams": " a:1.0 ", "end": "12"}"#).unwrap();
        assert_eq!(config.streams, "a:1.0");
        assert_eq!(config.bounds.end, Some(12.0));
    }
}
