//! Command dispatch by name
//!
//! UI pieces built apart from the player issue commands such as
//! `"togglePlayback"` or `"videoPlayer.seek"` without holding a reference to
//! it. Paths are dot-separated and resolved segment by segment against a
//! registered command table; unresolvable paths report `false`.

use crate::{player::VideoPlayer, tracking::SeekSource};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Command handler; receives the raw dispatch arguments
pub type CommandHandler = Arc<dyn Fn(&Value) + Send + Sync>;

enum Node {
    Command(CommandHandler),
    Group(BTreeMap<String, Node>),
}

/// Table of named commands
#[derive(Default)]
pub struct CommandDispatcher {
    root: BTreeMap<String, Node>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a dot-separated path
    ///
    /// Returns `false` if the path is empty or collides with an existing
    /// command or group.
    pub fn register<F>(&mut self, path: &str, handler: F) -> bool
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };
        if segments.iter().any(|s| s.is_empty()) {
            return false;
        }

        let mut level = &mut self.root;
        for segment in parents {
            let node = level
                .entry(segment.to_string())
                .or_insert_with(|| Node::Group(BTreeMap::new()));
            level = match node {
                Node::Group(children) => children,
                Node::Command(_) => return false,
            };
        }

        if level.contains_key(*last) {
            return false;
        }
        level.insert(last.to_string(), Node::Command(Arc::new(handler)));
        true
    }

    /// Resolve `path` and invoke it with `args`
    pub fn dispatch(&self, path: &str, args: &Value) -> bool {
        let mut level = &self.root;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            match level.get(segment) {
                Some(Node::Command(handler)) if segments.peek().is_none() => {
                    handler(args);
                    return true;
                }
                Some(Node::Group(children)) if segments.peek().is_some() => level = children,
                _ => break,
            }
        }

        debug!(path, "Command not found");
        false
    }

    /// Whether `path` names a command
    pub fn contains(&self, path: &str) -> bool {
        let mut level = &self.root;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            match level.get(segment) {
                Some(Node::Command(_)) => return segments.peek().is_none(),
                Some(Node::Group(children)) => level = children,
                None => return false,
            }
        }
        false
    }

    /// Command table for one player
    ///
    /// Top-level names are the public command surface; the `videoPlayer`
    /// group additionally exposes plain `play` and `pause`.
    pub fn for_player(player: &Arc<VideoPlayer>) -> Self {
        let mut dispatcher = Self::new();

        let bind = |f: fn(&VideoPlayer, &Value)| {
            let player: Weak<VideoPlayer> = Arc::downgrade(player);
            move |args: &Value| {
                if let Some(player) = player.upgrade() {
                    f(&player, args);
                }
            }
        };

        let commands: [(&str, fn(&VideoPlayer, &Value)); 11] = [
            ("togglePlayback", |p, _| p.toggle_playback()),
            ("toggleMute", |p, _| {
                p.toggle_mute();
            }),
            ("toggleFullScreen", |p, _| {
                p.toggle_fullscreen();
            }),
            ("setSpeed", set_speed),
            ("seek", seek),
            ("setVolume", set_volume),
            ("videoPlayer.play", |p, _| {
                p.play();
            }),
            ("videoPlayer.pause", |p, _| p.pause()),
            ("videoPlayer.togglePlayback", |p, _| p.toggle_playback()),
            ("videoPlayer.seek", seek),
            ("videoPlayer.setSpeed", set_speed),
        ];

        for (path, f) in commands {
            dispatcher.register(path, bind(f));
        }

        dispatcher
    }
}

fn set_speed(player: &VideoPlayer, args: &Value) {
    let Some(label) = string_arg(args, "speed") else {
        debug!(?args, "setSpeed without a speed");
        return;
    };
    let persist = args.get("persist").and_then(Value::as_bool).unwrap_or(true);
    player.set_speed(&label, persist);
}

fn seek(player: &VideoPlayer, args: &Value) {
    let Some(time) = number_arg(args, "time") else {
        debug!(?args, "seek without a time");
        return;
    };
    let source = args
        .get("type")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(SeekSource::Command);
    player.seek(time, source);
}

fn set_volume(player: &VideoPlayer, args: &Value) {
    match number_arg(args, "volume") {
        Some(level) => player.set_volume(level),
        None => debug!(?args, "setVolume without a level"),
    }
}

/// Numeric argument given bare, as a string, first in an array, or under `key`
fn number_arg(args: &Value, key: &str) -> Option<f64> {
    match args {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => items.first().and_then(|v| number_arg(v, key)),
        Value::Object(map) => map.get(key).and_then(|v| number_arg(v, key)),
        _ => None,
    }
}

fn string_arg(args: &Value, key: &str) -> Option<String> {
    match args {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(|v| string_arg(v, key)),
        Value::Object(map) => map.get(key).and_then(|v| string_arg(v, key)),
        _ => None,
    }
}
