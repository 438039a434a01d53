//! Playback speeds
//!
//! Handles:
//! - Parsing of hosted stream lists (`id:speed,id:speed,...`)
//! - Normalisation of speed labels ("1" -> "1.0", "1.50" -> "1.5")
//! - The selected speed and its cross-session persistence

use crate::{
    store::{PreferenceStore, KEY_SPEED},
    Error, Result,
};
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::all_consuming,
    sequence::{delimited, separated_pair},
    IResult, Parser,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Label every consumer can rely on
pub const DEFAULT_SPEED: &str = "1.0";

/// Speeds offered by file-backed playback
pub const FILE_SPEEDS: [f64; 5] = [0.75, 1.0, 1.25, 1.5, 2.0];

/// Shared reference used for every file-backed speed
pub const FILE_REFERENCE: &str = "html5";

/// Format a playback rate as a label: two decimals, trailing zero dropped
pub fn speed_to_string(speed: f64) -> String {
    let mut label = format!("{:.2}", speed);
    if label.ends_with('0') {
        label.pop();
    }
    label
}

/// Normalise a label string, `None` if it is not a usable rate
pub fn normalize_label(label: &str) -> Option<String> {
    let value: f64 = label.trim().parse().ok()?;
    if value.is_finite() && value > 0.0 {
        Some(speed_to_string(value))
    } else {
        None
    }
}

/// Mapping from speed label to source-specific identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeedMap {
    entries: BTreeMap<String, String>,
}

impl SpeedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speed map for a file-backed source
    pub fn file_backed() -> Self {
        let mut map = Self::new();
        for speed in FILE_SPEEDS {
            map.entries.insert(speed_to_string(speed), FILE_REFERENCE.to_string());
        }
        map
    }

    /// Parse a hosted stream list such as `"id1:0.75,id2:1.0,id3:1.5"`
    ///
    /// Either side of an entry may hold the speed; the side that parses as a
    /// number wins. When both do (an all-digit id), a side written with a
    /// decimal point is the speed, otherwise the right-hand side is.
    /// Malformed entries are dropped.
    pub fn parse(streams: &str) -> Self {
        let mut map = Self::new();

        for raw in streams.split(',') {
            if raw.trim().is_empty() {
                continue;
            }
            match parse_stream_entry(raw) {
                Ok((label, id)) => {
                    map.entries.insert(label, id);
                }
                Err(e) => debug!(entry = raw, error = %e, "Dropping stream entry"),
            }
        }

        map
    }

    /// Insert an entry, normalising the label
    pub fn insert(&mut self, label: &str, id: impl Into<String>) -> bool {
        match normalize_label(label) {
            Some(label) => {
                self.entries.insert(label, id.into());
                true
            }
            None => false,
        }
    }

    /// Identifier for a label
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A hosted map is usable only when it carries the normal-speed stream
    pub fn is_usable(&self) -> bool {
        self.contains(DEFAULT_SPEED)
    }

    /// Labels in ascending numeric order
    pub fn speed_list(&self) -> Vec<String> {
        let mut labels: Vec<(f64, &String)> = self
            .entries
            .keys()
            .filter_map(|label| label.parse::<f64>().ok().map(|v| (v, label)))
            .collect();
        labels.sort_by(|a, b| a.0.total_cmp(&b.0));
        labels.into_iter().map(|(_, label)| label.clone()).collect()
    }

    /// (label, id) pairs in ascending speed order
    pub fn entries(&self) -> Vec<(String, String)> {
        self.speed_list()
            .into_iter()
            .map(|label| {
                let id = self.entries.get(&label).cloned().unwrap_or_default();
                (label, id)
            })
            .collect()
    }
}

fn token(input: &str) -> IResult<&str, &str> {
    delimited(
        multispace0,
        take_while1(|c: char| c != ':' && c != ',' && !c.is_whitespace()),
        multispace0,
    )
    .parse(input)
}

fn entry(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(token, char(':'), token).parse(input)
}

/// Parse one `a:b` entry into a normalised (label, id) pair
fn parse_stream_entry(raw: &str) -> Result<(String, String)> {
    let (_, (left, right)) = all_consuming(entry)
        .parse(raw)
        .map_err(|e| Error::InvalidStreamList(format!("{raw}: {e}")))?;

    let is_decimal = |token: &str| token.contains('.');

    match (normalize_label(left), normalize_label(right)) {
        (Some(label), Some(_)) if is_decimal(left) && !is_decimal(right) => Ok((label, right.to_string())),
        (_, Some(label)) => Ok((label, left.to_string())),
        (Some(label), None) => Ok((label, right.to_string())),
        (None, None) => Err(Error::InvalidStreamList(format!("{raw}: no numeric speed"))),
    }
}

/// Available speeds and the current selection
pub struct SpeedRegistry {
    map: SpeedMap,
    current: String,
    store: Arc<dyn PreferenceStore>,
}

impl SpeedRegistry {
    /// Create a registry with the normal speed selected
    pub fn new(map: SpeedMap, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            map,
            current: DEFAULT_SPEED.to_string(),
            store,
        }
    }

    /// Create a registry and select the persisted speed, falling back to `preferred`
    pub fn restore(map: SpeedMap, store: Arc<dyn PreferenceStore>, preferred: Option<&str>) -> Self {
        let mut registry = Self::new(map, store);
        let initial = registry
            .store
            .get(KEY_SPEED)
            .or_else(|| preferred.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_SPEED.to_string());
        registry.select(&initial, false);
        registry
    }

    /// Ascending speed labels
    pub fn available(&self) -> Vec<String> {
        self.map.speed_list()
    }

    /// Currently selected label
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Underlying map
    pub fn map(&self) -> &SpeedMap {
        &self.map
    }

    /// Select a speed; unknown labels silently become "1.0"
    pub fn select(&mut self, label: &str, persist: bool) -> &str {
        let requested = normalize_label(label);

        self.current = match requested {
            Some(label) if self.map.contains(&label) => label,
            _ => {
                debug!(requested = label, "Unknown speed, using default");
                DEFAULT_SPEED.to_string()
            }
        };

        if persist {
            self.store.set(KEY_SPEED, &self.current);
        }

        &self.current
    }

    /// Swap the available speeds, keeping the selection when still offered
    pub fn replace_map(&mut self, map: SpeedMap) {
        self.map = map;
        let current = self.current.clone();
        self.select(&current, false);
    }
}
