//! Backing players
//!
//! The controller never talks to a hosted widget or a media element
//! directly; both sit behind [`BackingPlayer`] so the state machine drives one
//! uniform surface whichever source was committed.

mod simulated;

pub use simulated::{SimulatedFactory, SimulatedPlayer};

use crate::{
    source::ResolvedSource,
    types::{BackendState, PlayerNotification, SourceKind},
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Channel a backing player reports lifecycle notifications on
pub type NotificationSender = mpsc::UnboundedSender<PlayerNotification>;

/// Command and query surface of the active player
pub trait BackingPlayer: Send + Sync {
    /// Which kind of source this player serves
    fn kind(&self) -> SourceKind;

    /// Whether the player finished initializing and accepts `play`
    fn is_ready(&self) -> bool;

    fn play(&self);

    fn pause(&self);

    /// Move the playhead, in seconds
    fn seek_to(&self, seconds: f64);

    fn set_playback_rate(&self, rate: f64);

    /// Volume in 0.0..=1.0
    fn set_volume(&self, level: f64);

    /// Elapsed time in seconds; non-finite while the source is not ready
    fn current_time(&self) -> f64;

    /// Total duration in seconds; 0 or non-finite when unknown
    fn duration(&self) -> f64;

    /// State as the player itself reports it
    fn state(&self) -> BackendState;
}

/// Builds the backing player for a committed source
pub trait PlayerFactory: Send + Sync {
    /// Instantiate a player; it reports lifecycle changes on `notifications`
    fn create(&self, source: &ResolvedSource, notifications: NotificationSender) -> Arc<dyn BackingPlayer>;
}
