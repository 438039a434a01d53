//! Source resolution
//!
//! Decides whether the hosted stream or a file-backed source plays:
//! 1. a usable hosted stream list selects the hosted path, otherwise the
//!    playable file formats are tried;
//! 2. the hosted path is confirmed by one bounded metadata request;
//! 3. on failure or timeout the file path is tried exactly once, and if that
//!    is empty too the hosted path continues in degraded form.

mod metadata;
mod probe;

pub use metadata::{parse_iso_duration, parse_metadata_response, HttpMetadataProvider, MetadataProvider, StreamMetadata};
pub use probe::{is_usable, CodecProbe, Playability, StaticProbe};

use crate::{
    config::Config,
    speed::{SpeedMap, DEFAULT_SPEED},
    store::{PreferenceStore, KEY_PLAYER_KIND},
    types::{ContainerFormat, SourceKind},
    Error,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// A committed source, ready for a backing player to be built on it
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSource {
    /// Which backing player to build
    pub kind: SourceKind,
    /// Speeds offered by this source
    #[serde(serialize_with = "serialize_speeds")]
    pub speeds: SpeedMap,
    /// Playable file sources (empty for hosted)
    pub files: BTreeMap<ContainerFormat, Url>,
    /// Hosted metadata, when the request succeeded
    pub metadata: Option<StreamMetadata>,
    /// Hosted path kept although its metadata request failed
    pub degraded: bool,
    /// File path taken after the hosted path failed
    pub fell_back: bool,
}

fn serialize_speeds<S: serde::Serializer>(speeds: &SpeedMap, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(speeds.speed_list())
}

impl ResolvedSource {
    fn file(files: BTreeMap<ContainerFormat, Url>, fell_back: bool) -> Self {
        Self {
            kind: SourceKind::File,
            speeds: SpeedMap::file_backed(),
            files,
            metadata: None,
            degraded: false,
            fell_back,
        }
    }

    fn hosted(speeds: SpeedMap, metadata: Option<StreamMetadata>) -> Self {
        let degraded = metadata.is_none();
        Self {
            kind: SourceKind::Hosted,
            speeds,
            files: BTreeMap::new(),
            metadata,
            degraded,
            fell_back: false,
        }
    }

    /// Stream id of the normal-speed hosted stream
    pub fn primary_stream(&self) -> Option<&str> {
        match self.kind {
            SourceKind::Hosted => self.speeds.get(DEFAULT_SPEED),
            SourceKind::File => None,
        }
    }

    /// Preferred file URL (first playable format in probe order)
    pub fn primary_file(&self) -> Option<&Url> {
        self.files.values().next()
    }
}

/// Outcome of resolution
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// A source was committed
    Ready(ResolvedSource),
    /// Neither path is usable; the page shows a static "unavailable" message
    Unavailable,
}

impl ResolveOutcome {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ResolveOutcome::Unavailable)
    }

    pub fn source(&self) -> Option<&ResolvedSource> {
        match self {
            ResolveOutcome::Ready(source) => Some(source),
            ResolveOutcome::Unavailable => None,
        }
    }

    pub fn kind(&self) -> Option<SourceKind> {
        self.source().map(|s| s.kind)
    }
}

/// Chooses the source for one player instance
pub struct SourceResolver {
    metadata: Arc<dyn MetadataProvider>,
    probe: Arc<dyn CodecProbe>,
    store: Arc<dyn PreferenceStore>,
}

impl SourceResolver {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        probe: Arc<dyn CodecProbe>,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            metadata,
            probe,
            store,
        }
    }

    /// File sources the local runtime can decode
    pub fn playable_files(&self, config: &Config) -> BTreeMap<ContainerFormat, Url> {
        config
            .sources
            .iter()
            .filter(|(format, _)| is_usable(self.probe.as_ref(), **format))
            .map(|(format, url)| (*format, url.clone()))
            .collect()
    }

    /// Player kind committed by the last successful resolution, if stored
    pub fn stored_kind(&self) -> Option<SourceKind> {
        self.store
            .get(KEY_PLAYER_KIND)
            .as_deref()
            .and_then(SourceKind::from_stored)
    }

    /// Resolve the source for a configuration
    #[instrument(skip(self, config), fields(streams = %config.streams))]
    pub async fn resolve(&self, config: &Config) -> ResolveOutcome {
        let previous = self.stored_kind();
        let outcome = self.resolve_inner(config).await;

        match &outcome {
            ResolveOutcome::Ready(source) => {
                if previous.is_some_and(|kind| kind != source.kind) {
                    info!(from = ?previous, to = %source.kind, "Player kind changed since last session");
                }
                self.store.set(KEY_PLAYER_KIND, source.kind.as_str());
                info!(
                    kind = %source.kind,
                    degraded = source.degraded,
                    fell_back = source.fell_back,
                    speeds = ?source.speeds.speed_list(),
                    "Source committed"
                );
            }
            ResolveOutcome::Unavailable => {
                warn!("No viable video source");
            }
        }

        outcome
    }

    async fn resolve_inner(&self, config: &Config) -> ResolveOutcome {
        let hosted = SpeedMap::parse(&config.streams);

        if config.prioritize_file {
            let files = self.playable_files(config);
            if !files.is_empty() {
                debug!("File playback prioritised");
                return ResolveOutcome::Ready(ResolvedSource::file(files, false));
            }
        }

        if !hosted.is_usable() {
            debug!(
                supplied = config.has_streams(),
                entries = hosted.len(),
                "Hosted stream ids absent or unusable"
            );
            let files = self.playable_files(config);
            if files.is_empty() {
                return ResolveOutcome::Unavailable;
            }
            return ResolveOutcome::Ready(ResolvedSource::file(files, false));
        }

        let stream_id = hosted.get(DEFAULT_SPEED).unwrap_or_default().to_string();
        match self.fetch_metadata(&stream_id, config).await {
            Ok(metadata) => ResolveOutcome::Ready(ResolvedSource::hosted(hosted, Some(metadata))),
            Err(e) => {
                if e.is_recoverable() {
                    info!(stream = %stream_id, code = e.error_code(), error = %e, "Hosted provider unavailable, trying file sources");
                } else {
                    warn!(stream = %stream_id, code = e.error_code(), error = %e, "Hosted metadata failed, trying file sources");
                }
                let files = self.playable_files(config);
                if files.is_empty() {
                    info!("No playable file source, continuing with hosted stream");
                    ResolveOutcome::Ready(ResolvedSource::hosted(hosted, None))
                } else {
                    ResolveOutcome::Ready(ResolvedSource::file(files, true))
                }
            }
        }
    }

    async fn fetch_metadata(&self, stream_id: &str, config: &Config) -> crate::Result<StreamMetadata> {
        let timeout = config.resolution_timeout;
        match tokio::time::timeout(timeout, self.metadata.fetch(stream_id)).await {
            Ok(result) => result,
            Err(_) => Err(Error::MetadataTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}
