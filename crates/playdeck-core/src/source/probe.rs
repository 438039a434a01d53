//! Codec playability probing
//!
//! Probing is advisory: a probe error counts as "not playable", it never
//! aborts resolution.

use crate::{types::ContainerFormat, Result};
use std::collections::BTreeSet;
use tracing::debug;

/// Probe verdict, in the vocabulary of media elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Playability {
    No,
    Maybe,
    Probably,
}

impl Playability {
    pub fn is_playable(&self) -> bool {
        !matches!(self, Playability::No)
    }
}

/// Local decoding capability check
pub trait CodecProbe: Send + Sync {
    /// Ask whether a MIME type (with codecs) can be decoded here
    fn can_play(&self, mime: &str) -> Result<Playability>;
}

/// Whether a container format is usable; probe failures count as "no"
pub fn is_usable(probe: &dyn CodecProbe, format: ContainerFormat) -> bool {
    match probe.can_play(format.mime_type()) {
        Ok(verdict) => verdict.is_playable(),
        Err(e) => {
            debug!(format = %format, error = %e, "Codec probe failed");
            false
        }
    }
}

/// Probe answering from a fixed set of supported formats
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    supported: BTreeSet<ContainerFormat>,
}

impl StaticProbe {
    pub fn new(supported: impl IntoIterator<Item = ContainerFormat>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
        }
    }

    /// Probe that can decode nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// Probe that can decode every known format
    pub fn all() -> Self {
        Self::new(ContainerFormat::ALL)
    }

    /// Parse a comma-separated list such as `"mp4,webm"`, ignoring unknown names
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(',').filter_map(|name| {
            match name.trim().to_lowercase().as_str() {
                "mp4" => Some(ContainerFormat::Mp4),
                "webm" => Some(ContainerFormat::Webm),
                "ogg" | "ogv" => Some(ContainerFormat::Ogg),
                "hls" | "m3u8" => Some(ContainerFormat::Hls),
                _ => None,
            }
        }))
    }
}

impl CodecProbe for StaticProbe {
    fn can_play(&self, mime: &str) -> Result<Playability> {
        let verdict = self
            .supported
            .iter()
            .find(|format| format.mime_type() == mime)
            .map(|_| Playability::Probably)
            .unwrap_or(Playability::No);
        Ok(verdict)
    }
}
