//! In-memory backing player
//!
//! Advances its playhead on the tokio clock, so it behaves deterministically
//! under a paused test runtime. Used by the CLI `simulate` command and tests.

use super::{BackingPlayer, NotificationSender, PlayerFactory};
use crate::{
    source::ResolvedSource,
    types::{BackendState, PlayerNotification, SourceKind},
};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::trace;

/// Duration used when neither the source nor the factory knows one
pub const DEFAULT_SIMULATED_DURATION: f64 = 300.0;

#[derive(Debug)]
struct Playhead {
    state: BackendState,
    ready: bool,
    /// Position when the clock was last folded in
    base: f64,
    /// Set while playing
    started_at: Option<Instant>,
    rate: f64,
    volume: f64,
    time_readable: bool,
}

impl Playhead {
    fn position(&self, duration: f64) -> f64 {
        let running = self
            .started_at
            .map(|at| at.elapsed().as_secs_f64() * self.rate)
            .unwrap_or(0.0);
        (self.base + running).min(duration)
    }

    fn fold(&mut self, duration: f64) {
        self.base = self.position(duration);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }
}

/// Backing player without any media behind it
pub struct SimulatedPlayer {
    kind: SourceKind,
    duration: f64,
    playhead: Mutex<Playhead>,
    notifications: Option<NotificationSender>,
}

impl SimulatedPlayer {
    /// Create an unready player
    pub fn new(kind: SourceKind, duration: f64) -> Self {
        Self {
            kind,
            duration,
            playhead: Mutex::new(Playhead {
                state: BackendState::Unstarted,
                ready: false,
                base: 0.0,
                started_at: None,
                rate: 1.0,
                volume: 1.0,
                time_readable: true,
            }),
            notifications: None,
        }
    }

    /// Report lifecycle changes on a channel
    pub fn with_notifications(mut self, tx: NotificationSender) -> Self {
        self.notifications = Some(tx);
        self
    }

    fn notify(&self, notification: PlayerNotification) {
        if let Some(tx) = &self.notifications {
            // Receiver gone means the player was torn down
            let _ = tx.send(notification);
        }
    }

    fn transition(&self, state: BackendState) {
        if let Ok(mut playhead) = self.playhead.lock() {
            playhead.fold(self.duration);
            playhead.started_at = match state {
                BackendState::Playing => Some(Instant::now()),
                _ => None,
            };
            if state == BackendState::Ended {
                playhead.base = self.duration;
            }
            playhead.state = state;
        }
        trace!(?state, "Simulated player state");
        self.notify(PlayerNotification::StateChange { state });
    }

    /// Finish initializing and announce readiness
    pub fn mark_ready(&self) {
        if let Ok(mut playhead) = self.playhead.lock() {
            playhead.ready = true;
        }
        self.notify(PlayerNotification::Ready);
    }

    /// Stall as if the network ran dry
    pub fn stall(&self) {
        self.transition(BackendState::Buffering);
    }

    /// Cue the video without starting it
    pub fn cue(&self) {
        self.transition(BackendState::Cued);
    }

    /// Run to the end of the media
    pub fn finish(&self) {
        self.transition(BackendState::Ended);
    }

    /// Make `current_time` report NaN, as an element without a source does
    pub fn set_time_readable(&self, readable: bool) {
        if let Ok(mut playhead) = self.playhead.lock() {
            playhead.time_readable = readable;
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.playhead.lock().map(|p| p.rate).unwrap_or(1.0)
    }

    pub fn volume(&self) -> f64 {
        self.playhead.lock().map(|p| p.volume).unwrap_or(0.0)
    }
}

impl BackingPlayer for SimulatedPlayer {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn is_ready(&self) -> bool {
        self.playhead.lock().map(|p| p.ready).unwrap_or(false)
    }

    fn play(&self) {
        if self.is_ready() {
            self.transition(BackendState::Playing);
        }
    }

    fn pause(&self) {
        self.transition(BackendState::Paused);
    }

    fn seek_to(&self, seconds: f64) {
        if let Ok(mut playhead) = self.playhead.lock() {
            playhead.fold(self.duration);
            playhead.base = seconds.clamp(0.0, self.duration);
        }
    }

    fn set_playback_rate(&self, rate: f64) {
        if let Ok(mut playhead) = self.playhead.lock() {
            playhead.fold(self.duration);
            playhead.rate = rate;
        }
    }

    fn set_volume(&self, level: f64) {
        if let Ok(mut playhead) = self.playhead.lock() {
            playhead.volume = level.clamp(0.0, 1.0);
        }
    }

    fn current_time(&self) -> f64 {
        match self.playhead.lock() {
            Ok(playhead) if playhead.time_readable => playhead.position(self.duration),
            _ => f64::NAN,
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn state(&self) -> BackendState {
        self.playhead
            .lock()
            .map(|p| p.state)
            .unwrap_or(BackendState::Unstarted)
    }
}

/// Factory building [`SimulatedPlayer`]s that become ready immediately
#[derive(Debug, Clone)]
pub struct SimulatedFactory {
    fallback_duration: f64,
}

impl SimulatedFactory {
    pub fn new() -> Self {
        Self {
            fallback_duration: DEFAULT_SIMULATED_DURATION,
        }
    }

    /// Duration used when the source carries no metadata
    pub fn with_duration(duration: f64) -> Self {
        Self {
            fallback_duration: duration,
        }
    }
}

impl Default for SimulatedFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerFactory for SimulatedFactory {
    fn create(&self, source: &ResolvedSource, notifications: NotificationSender) -> Arc<dyn BackingPlayer> {
        let duration = source
            .metadata
            .as_ref()
            .and_then(|m| m.duration)
            .unwrap_or(self.fallback_duration);

        let player = SimulatedPlayer::new(source.kind, duration).with_notifications(notifications);
        player.mark_ready();
        Arc::new(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_playhead_advances_with_rate() {
        let player = SimulatedPlayer::new(SourceKind::File, 100.0);
        player.mark_ready();
        player.set_playback_rate(2.0);
        player.play();

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(player.current_time(), 6.0);

        player.pause();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(player.current_time(), 6.0);
        assert_eq!(player.state(), BackendState::Paused);
    }

    #[test]
    fn test_play_requires_ready() {
        let player = SimulatedPlayer::new(SourceKind::Hosted, 10.0);
        player.play();
        assert_eq!(player.state(), BackendState::Unstarted);
    }

    #[test]
    fn test_seek_clamps_and_nan() {
        let player = SimulatedPlayer::new(SourceKind::File, 10.0);
        player.seek_to(25.0);
        assert_eq!(player.current_time(), 10.0);

        player.set_time_readable(false);
        assert!(player.current_time().is_nan());
    }

    #[test]
    fn test_notifications() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let player = SimulatedPlayer::new(SourceKind::File, 10.0).with_notifications(tx);

        player.mark_ready();
        player.play();
        player.finish();

        assert_eq!(rx.try_recv().unwrap(), PlayerNotification::Ready);
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerNotification::StateChange { state: BackendState::Playing }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerNotification::StateChange { state: BackendState::Ended }
        );
        assert_eq!(player.current_time(), 10.0);
    }
}
