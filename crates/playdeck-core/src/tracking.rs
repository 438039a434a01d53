//! Tracking log
//!
//! User-visible playback actions are recorded as named events:
//! - `load_video` once the backing player is ready
//! - `play_video` / `pause_video` with the elapsed time
//! - `seek_video` with old and new positions and what triggered the seek
//! - `speed_change_video` with the old and new speed labels
//!
//! Every record carries the stream code it belongs to: `"html5"` for file
//! playback, the normal-speed stream id for hosted playback.

use crate::types::InstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Default number of records kept in memory
pub const DEFAULT_BUFFER_SIZE: usize = 500;

/// What triggered a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekSource {
    /// Dragging the scrubber
    Slider,
    /// Clicking a caption line
    Caption,
    /// Programmatic command (keyboard, dispatcher)
    Command,
}

/// Tracking event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackingEvent {
    /// Backing player ready
    LoadVideo,

    /// Playback started
    PlayVideo { current_time: f64 },

    /// Playback paused by the viewer
    PauseVideo { current_time: f64 },

    /// Playhead moved
    SeekVideo {
        old_time: f64,
        new_time: f64,
        #[serde(rename = "type")]
        seek_type: SeekSource,
    },

    /// Speed changed
    SpeedChangeVideo {
        current_time: f64,
        old_speed: String,
        new_speed: String,
    },
}

impl TrackingEvent {
    /// Event name as written to the log
    pub fn name(&self) -> &'static str {
        match self {
            TrackingEvent::LoadVideo => "load_video",
            TrackingEvent::PlayVideo { .. } => "play_video",
            TrackingEvent::PauseVideo { .. } => "pause_video",
            TrackingEvent::SeekVideo { .. } => "seek_video",
            TrackingEvent::SpeedChangeVideo { .. } => "speed_change_video",
        }
    }
}

/// Tracking event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// Unique event ID
    pub id: Uuid,
    /// Player instance that emitted the event
    pub instance: InstanceId,
    /// Stream code (`"html5"` or the hosted stream id)
    pub code: String,
    pub timestamp: DateTime<Utc>,
    /// Page-wide sequence number, starting at 1
    pub sequence: u64,
    #[serde(flatten)]
    pub event: TrackingEvent,
}

/// Page-wide tracking log shared by every player instance
pub struct TrackingEmitter {
    sequence: AtomicU64,
    buffer: Mutex<VecDeque<TrackingRecord>>,
    max_buffer_size: usize,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<TrackingRecord>>>,
}

impl TrackingEmitter {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create an emitter keeping at most `max_buffer_size` records
    pub fn with_buffer_size(max_buffer_size: usize) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            buffer: Mutex::new(VecDeque::new()),
            max_buffer_size: max_buffer_size.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Record an event
    pub fn emit(&self, instance: InstanceId, code: &str, event: TrackingEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let record = TrackingRecord {
            id: Uuid::new_v4(),
            instance,
            code: code.to_string(),
            timestamp: Utc::now(),
            sequence,
            event,
        };

        debug!(
            event = record.event.name(),
            instance = %instance,
            code = %record.code,
            sequence,
            "Tracking event"
        );

        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(record.clone()).is_ok());
        }

        if let Ok(mut buffer) = self.buffer.lock() {
            if buffer.len() >= self.max_buffer_size {
                buffer.pop_front();
            }
            buffer.push_back(record);
        }
    }

    /// Receive every record emitted from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TrackingRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Get all buffered records
    pub fn events(&self) -> Vec<TrackingRecord> {
        self.buffer
            .lock()
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Buffered events of one instance, without metadata
    pub fn events_for(&self, instance: InstanceId) -> Vec<TrackingEvent> {
        self.events()
            .into_iter()
            .filter(|record| record.instance == instance)
            .map(|record| record.event)
            .collect()
    }

    /// Take all buffered records
    pub fn drain(&self) -> Vec<TrackingRecord> {
        self.buffer
            .lock()
            .map(|mut buffer| buffer.drain(..).collect())
            .unwrap_or_default()
    }

    /// Clear buffer
    pub fn clear(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
    }
}

impl Default for TrackingEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_sequence() {
        let emitter = TrackingEmitter::new();
        let instance = InstanceId::new();

        emitter.emit(instance, "html5", TrackingEvent::LoadVideo);
        emitter.emit(instance, "html5", TrackingEvent::PlayVideo { current_time: 0.0 });

        let events = emitter.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[1].sequence, 2);
        assert_eq!(events[1].code, "html5");
    }

    #[test]
    fn test_buffer_drops_oldest() {
        let emitter = TrackingEmitter::with_buffer_size(2);
        let instance = InstanceId::new();

        for t in 0..3 {
            emitter.emit(instance, "abc", TrackingEvent::PlayVideo { current_time: t as f64 });
        }

        let events = emitter.events_for(instance);
        assert_eq!(
            events,
            vec![
                TrackingEvent::PlayVideo { current_time: 1.0 },
                TrackingEvent::PlayVideo { current_time: 2.0 },
            ]
        );
    }

    #[test]
    fn test_record_serialization() {
        let emitter = TrackingEmitter::new();
        emitter.emit(
            InstanceId::new(),
            "html5",
            TrackingEvent::SeekVideo {
                old_time: 10.0,
                new_time: 60.0,
                seek_type: SeekSource::Slider,
            },
        );

        let record = &emitter.drain()[0];
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["event"], "seek_video");
        assert_eq!(json["type"], "slider");
        assert_eq!(json["new_time"], 60.0);
        assert!(emitter.events().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe() {
        let emitter = TrackingEmitter::new();
        let mut rx = emitter.subscribe();

        emitter.emit(InstanceId::new(), "html5", TrackingEvent::LoadVideo);

        let record = rx.recv().await.unwrap();
        assert_eq!(record.event.name(), "load_video");
    }
}
