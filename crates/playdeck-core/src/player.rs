//! Playback state machine
//!
//! [`VideoPlayer`] owns one backing player and keeps the lifecycle state,
//! the clock poller, dependent widgets and the tracking log consistent with
//! what the backing player reports.
//!
//! # Locking
//!
//! Notification handlers never hold the state lock while calling into the
//! [`ActiveInstanceRegistry`]: claiming may pause another instance, and that
//! instance takes its own state lock.

use crate::{
    backend::{BackingPlayer, PlayerFactory},
    config::{ClipBounds, Config},
    poller::{ClockPoller, Tick},
    registry::{ActiveInstanceRegistry, Pausable},
    source::{ResolveOutcome, ResolvedSource, SourceResolver},
    speed::{SpeedRegistry, DEFAULT_SPEED, FILE_REFERENCE},
    store::{MemoryStore, PreferenceStore},
    tracking::{SeekSource, TrackingEmitter, TrackingEvent},
    types::{BackendState, InstanceId, LifecycleState, PlayTime, PlayerEvent, PlayerNotification, SourceKind},
    widgets::WidgetBus,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace};

/// Capacity of the player event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn rate(label: &str) -> f64 {
    label.parse().unwrap_or(1.0)
}

/// Services shared by every player on a page
#[derive(Clone)]
pub struct PageServices {
    pub store: Arc<dyn PreferenceStore>,
    pub registry: Arc<ActiveInstanceRegistry>,
    pub tracking: Arc<TrackingEmitter>,
}

impl PageServices {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            registry: Arc::new(ActiveInstanceRegistry::new()),
            tracking: Arc::new(TrackingEmitter::new()),
        }
    }
}

impl Default for PageServices {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

/// Result of initializing a player
pub enum Initialization {
    /// A backing player was built and wired
    Started(Arc<VideoPlayer>),
    /// No source can play; show the "unavailable" message
    Unavailable,
}

impl Initialization {
    pub fn player(&self) -> Option<&Arc<VideoPlayer>> {
        match self {
            Initialization::Started(player) => Some(player),
            Initialization::Unavailable => None,
        }
    }
}

/// Playhead bookkeeping read by the poller
struct PlaybackClock {
    backing: RwLock<Arc<dyn BackingPlayer>>,
    widgets: WidgetBus,
    bounds: Mutex<ClipBounds>,
    metadata_duration: Mutex<Option<f64>>,
    elapsed: Mutex<f64>,
    /// Start bound not applied yet
    start_pending: AtomicBool,
}

impl PlaybackClock {
    fn backing(&self) -> Arc<dyn BackingPlayer> {
        match self.backing.read() {
            Ok(backing) => backing.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn swap_backing(&self, backing: Arc<dyn BackingPlayer>, metadata_duration: Option<f64>) -> Arc<dyn BackingPlayer> {
        *lock(&self.metadata_duration) = metadata_duration;
        match self.backing.write() {
            Ok(mut current) => std::mem::replace(&mut *current, backing),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), backing),
        }
    }

    /// Whole seconds: backing duration, else metadata duration, else 0
    fn duration(&self) -> f64 {
        let reported = self.backing().duration();
        let duration = if reported.is_finite() && reported > 0.0 {
            reported
        } else {
            lock(&self.metadata_duration).unwrap_or(0.0)
        };
        duration.floor()
    }

    /// Last elapsed time pushed to widgets
    fn elapsed(&self) -> f64 {
        *lock(&self.elapsed)
    }

    /// Elapsed time read from the backing player when it can report one
    fn elapsed_now(&self) -> f64 {
        let time = self.backing().current_time();
        if time.is_finite() {
            time
        } else {
            self.elapsed()
        }
    }

    fn push(&self, elapsed: f64, duration: f64) {
        *lock(&self.elapsed) = elapsed;
        self.widgets.update_play_time(PlayTime::new(elapsed, duration));
    }

    fn bounds(&self) -> ClipBounds {
        *lock(&self.bounds)
    }

    fn clear_bounds(&self) {
        *lock(&self.bounds) = ClipBounds::NONE;
        self.start_pending.store(false, Ordering::SeqCst);
    }
}

impl Tick for PlaybackClock {
    fn tick(&self) {
        let backing = self.backing();
        let mut time = backing.current_time();
        if !time.is_finite() {
            trace!("Current time unavailable, skipping tick");
            return;
        }

        let duration = self.duration();
        let bounds = self.bounds();

        if duration > 0.0 && self.start_pending.swap(false, Ordering::SeqCst) && bounds.start <= duration {
            debug!(start = bounds.start, "Seeking to clip start");
            backing.seek_to(bounds.start);
            time = bounds.start;
        }

        self.push(time, duration);

        if let Some(end) = bounds.end {
            if time >= end {
                debug!(end, "Clip end reached");
                self.clear_bounds();
                backing.pause();
            }
        }
    }
}

struct PlayerState {
    lifecycle: LifecycleState,
    kind: SourceKind,
    /// Stream code written with every tracking event
    code: String,
    speeds: SpeedRegistry,
    volume: f64,
    /// Volume to restore, present while muted
    muted_volume: Option<f64>,
    fullscreen: bool,
    /// Ready-time setup already applied to the current backing player
    loaded: bool,
}

/// One video player instance
pub struct VideoPlayer {
    id: InstanceId,
    config: Config,
    clock: Arc<PlaybackClock>,
    poller: ClockPoller,
    state: Mutex<PlayerState>,
    registry: Arc<ActiveInstanceRegistry>,
    tracking: Arc<TrackingEmitter>,
    events: broadcast::Sender<PlayerEvent>,
    /// Bumped whenever the backing player changes; older pumps retire
    pump_generation: AtomicU64,
    this: Weak<VideoPlayer>,
}

fn tracking_code(source: &ResolvedSource) -> String {
    match source.kind {
        SourceKind::File => FILE_REFERENCE.to_string(),
        SourceKind::Hosted => source.speeds.get(DEFAULT_SPEED).unwrap_or_default().to_string(),
    }
}

impl VideoPlayer {
    /// Wrap a backing player built for `source`
    pub fn new(
        config: Config,
        source: &ResolvedSource,
        backing: Arc<dyn BackingPlayer>,
        services: &PageServices,
    ) -> Arc<Self> {
        let speeds = SpeedRegistry::restore(
            source.speeds.clone(),
            services.store.clone(),
            config.preferred_speed.as_deref(),
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let clock = Arc::new(PlaybackClock {
            backing: RwLock::new(backing),
            widgets: WidgetBus::new(config.show_captions),
            bounds: Mutex::new(config.bounds),
            metadata_duration: Mutex::new(source.metadata.as_ref().and_then(|m| m.duration)),
            elapsed: Mutex::new(0.0),
            start_pending: AtomicBool::new(config.bounds.start > 0.0),
        });

        let state = PlayerState {
            lifecycle: LifecycleState::Unstarted,
            kind: source.kind,
            code: tracking_code(source),
            speeds,
            volume: 1.0,
            muted_volume: None,
            fullscreen: false,
            loaded: false,
        };

        Arc::new_cyclic(|this| Self {
            id: InstanceId::new(),
            config,
            clock,
            poller: ClockPoller::new(),
            state: Mutex::new(state),
            registry: services.registry.clone(),
            tracking: services.tracking.clone(),
            events,
            pump_generation: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    /// Resolve a source, build its backing player and wire notifications
    ///
    /// Must be called within a tokio runtime.
    #[instrument(skip_all, fields(streams = %config.streams))]
    pub async fn initialize(
        config: Config,
        resolver: &SourceResolver,
        factory: &dyn PlayerFactory,
        services: &PageServices,
    ) -> Initialization {
        let source = match resolver.resolve(&config).await {
            ResolveOutcome::Ready(source) => source,
            ResolveOutcome::Unavailable => return Initialization::Unavailable,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let backing = factory.create(&source, tx);
        let player = Self::new(config, &source, backing, services);
        player.spawn_notification_pump(rx);

        info!(instance = %player.id, kind = %source.kind, "Player initialized");
        Initialization::Started(player)
    }

    /// Deliver backing-player notifications in arrival order
    ///
    /// The pump belongs to the current backing player. It ends when the
    /// sender side is dropped, the player is gone, or the backing player is
    /// replaced or destroyed; notifications from a retired player are dropped.
    pub fn spawn_notification_pump(
        self: &Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<PlayerNotification>,
    ) -> JoinHandle<()> {
        let player = Arc::downgrade(self);
        let generation = self.pump_generation.load(Ordering::SeqCst);
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let Some(player) = player.upgrade() else {
                    break;
                };
                if player.pump_generation.load(Ordering::SeqCst) != generation {
                    debug!(instance = %player.id, ?notification, "Notification from retired backing player dropped");
                    break;
                }
                player.handle_notification(notification);
            }
        })
    }

    /// Stop delivering notifications from pumps spawned so far
    fn retire_pumps(&self) {
        self.pump_generation.fetch_add(1, Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        lock(&self.state)
    }

    fn track(&self, event: TrackingEvent) {
        let code = self.state().code.clone();
        self.tracking.emit(self.id, &code, event);
    }

    fn emit(&self, event: PlayerEvent) {
        // No listeners is fine
        let _ = self.events.send(event);
    }

    /// Set the lifecycle state, returning the previous one
    fn transition(&self, next: LifecycleState) -> LifecycleState {
        let mut state = self.state();
        std::mem::replace(&mut state.lifecycle, next)
    }

    // --- notifications ---

    /// React to one backing-player notification
    pub fn handle_notification(&self, notification: PlayerNotification) {
        trace!(instance = %self.id, ?notification, "Notification");
        match notification {
            PlayerNotification::Ready => self.on_ready(),
            PlayerNotification::StateChange { state } => match state {
                BackendState::Unstarted => self.on_pause(false),
                BackendState::Paused => self.on_pause(true),
                BackendState::Playing => self.on_play(),
                BackendState::Buffering => self.on_buffering(),
                BackendState::Ended => self.on_ended(),
                BackendState::Cued => self.on_cued(),
            },
        }
    }

    fn on_ready(&self) {
        let (speed, volume) = {
            let mut state = self.state();
            if state.loaded {
                return;
            }
            state.loaded = true;
            (state.speeds.current().to_string(), state.volume)
        };

        let backing = self.clock.backing();
        backing.set_playback_rate(rate(&speed));
        backing.set_volume(volume);
        self.track(TrackingEvent::LoadVideo);
        info!(instance = %self.id, speed = %speed, "Backing player ready");

        if self.config.autoplay {
            self.play();
        }
    }

    fn on_play(&self) {
        let previous = self.transition(LifecycleState::Playing);
        let elapsed = self.clock.elapsed_now();

        self.track(TrackingEvent::PlayVideo { current_time: elapsed });
        info!(instance = %self.id, elapsed, "Playing");

        let this: Weak<dyn Pausable> = self.this.clone();
        self.registry.claim(self.id, this);
        self.poller.start(self.clock.clone());
        self.clock.widgets.play();

        if previous != LifecycleState::Playing {
            self.emit(PlayerEvent::Play);
        }
    }

    fn on_pause(&self, reported_paused: bool) {
        let previous = self.transition(LifecycleState::Paused);
        self.poller.stop();

        if previous == LifecycleState::Playing && reported_paused {
            let elapsed = self.clock.elapsed_now();
            self.track(TrackingEvent::PauseVideo { current_time: elapsed });
            info!(instance = %self.id, elapsed, "Paused");
        }

        self.clock.widgets.pause();

        if previous != LifecycleState::Paused {
            self.emit(PlayerEvent::Pause);
        }
    }

    fn on_buffering(&self) {
        self.transition(LifecycleState::Buffering);
        self.poller.stop();
        debug!(instance = %self.id, "Buffering");
    }

    fn on_ended(&self) {
        self.transition(LifecycleState::Ended);
        self.poller.stop();
        self.clock.clear_bounds();

        let duration = self.clock.duration();
        self.clock.push(duration, duration);
        self.clock.widgets.pause();

        info!(instance = %self.id, "Ended");
        self.emit(PlayerEvent::Ended);
    }

    fn on_cued(&self) {
        let backing = self.clock.backing();
        backing.seek_to(self.clock.bounds().start);
        backing.play();
    }

    // --- commands ---

    /// Start playback; `false` while the backing player is still initializing
    pub fn play(&self) -> bool {
        let backing = self.clock.backing();
        if !backing.is_ready() {
            debug!(instance = %self.id, "Play ignored, backing player not ready");
            return false;
        }
        backing.play();
        true
    }

    pub fn pause(&self) {
        self.clock.backing().pause();
    }

    pub fn toggle_playback(&self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the playhead
    ///
    /// Non-finite, negative or past-the-end targets are ignored and return
    /// `false`. Clip bounds no longer apply after a seek.
    pub fn seek(&self, target: f64, source: SeekSource) -> bool {
        let duration = self.clock.duration();
        if !target.is_finite() || target < 0.0 || (duration > 0.0 && target > duration) {
            debug!(instance = %self.id, target, duration, "Seek ignored");
            return false;
        }

        // Restarted below with its first tick deferred, so no stale time is pushed
        self.poller.stop();
        let old_time = self.clock.elapsed();

        self.clock.clear_bounds();
        self.clock.backing().seek_to(target);
        self.track(TrackingEvent::SeekVideo {
            old_time,
            new_time: target,
            seek_type: source,
        });

        self.clock.push(target, duration);

        if self.lifecycle() == LifecycleState::Playing {
            self.poller.start_deferred(self.clock.clone());
        }

        self.emit(PlayerEvent::Seek { time: target });
        true
    }

    /// Select a playback speed, returning the label actually applied
    pub fn set_speed(&self, label: &str, persist: bool) -> String {
        let (old_speed, new_speed) = {
            let mut state = self.state();
            let old = state.speeds.current().to_string();
            let new = state.speeds.select(label, persist).to_string();
            (old, new)
        };

        self.track(TrackingEvent::SpeedChangeVideo {
            current_time: self.clock.elapsed(),
            old_speed: old_speed.clone(),
            new_speed: new_speed.clone(),
        });
        debug!(instance = %self.id, from = %old_speed, to = %new_speed, "Speed changed");

        self.clock.backing().set_playback_rate(rate(&new_speed));
        self.emit(PlayerEvent::SpeedChange {
            speed: new_speed.clone(),
        });

        new_speed
    }

    /// Set the volume (0.0..=1.0); non-finite levels are ignored
    pub fn set_volume(&self, level: f64) {
        if !level.is_finite() {
            return;
        }
        let volume = level.clamp(0.0, 1.0);
        {
            let mut state = self.state();
            state.volume = volume;
            state.muted_volume = None;
        }
        self.clock.backing().set_volume(volume);
        self.emit(PlayerEvent::VolumeChange {
            volume,
            muted: volume == 0.0,
        });
    }

    /// Mute, or restore the volume from before muting
    pub fn toggle_mute(&self) -> bool {
        let (volume, muted) = {
            let mut state = self.state();
            match state.muted_volume.take() {
                Some(previous) => state.volume = previous,
                None => {
                    state.muted_volume = Some(state.volume);
                    state.volume = 0.0;
                }
            }
            (state.volume, state.muted_volume.is_some())
        };

        self.clock.backing().set_volume(volume);
        self.emit(PlayerEvent::VolumeChange { volume, muted });
        muted
    }

    pub fn toggle_fullscreen(&self) -> bool {
        let active = {
            let mut state = self.state();
            state.fullscreen = !state.fullscreen;
            state.fullscreen
        };
        self.emit(PlayerEvent::FullScreen { active });
        active
    }

    /// Swap the backing player mid-session
    ///
    /// Selected speed (re-checked against the new speeds) and volume carry
    /// over and are applied once the new player is ready. Pumps spawned
    /// before the swap are retired; spawn one for the new player afterwards.
    pub fn replace_backing_player(&self, backing: Arc<dyn BackingPlayer>, source: &ResolvedSource) {
        self.retire_pumps();
        self.poller.stop();

        let metadata_duration = source.metadata.as_ref().and_then(|m| m.duration);
        let previous = self.clock.swap_backing(backing.clone(), metadata_duration);
        previous.pause();

        let was_playing = {
            let mut state = self.state();
            state.speeds.replace_map(source.speeds.clone());
            state.kind = source.kind;
            state.code = tracking_code(source);
            state.loaded = false;
            std::mem::replace(&mut state.lifecycle, LifecycleState::Unstarted) == LifecycleState::Playing
        };

        if was_playing {
            self.clock.widgets.pause();
            self.emit(PlayerEvent::Pause);
        }

        info!(instance = %self.id, kind = %source.kind, "Backing player replaced");

        if backing.is_ready() {
            self.on_ready();
        }
    }

    /// Build a new backing player for `source` and switch to it
    pub fn switch_source(self: &Arc<Self>, factory: &dyn PlayerFactory, source: &ResolvedSource) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backing = factory.create(source, tx);
        self.replace_backing_player(backing, source);
        self.spawn_notification_pump(rx);
    }

    /// Tear the instance down: stop polling and give up the active claim
    pub fn destroy(&self) {
        self.retire_pumps();
        self.poller.stop();
        self.registry.release(self.id);
        debug!(instance = %self.id, "Player destroyed");
    }

    // --- queries ---

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn kind(&self) -> SourceKind {
        self.state().kind
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.state().lifecycle
    }

    /// Read through to the backing player, not the local lifecycle state
    pub fn is_playing(&self) -> bool {
        self.clock.backing().state() == BackendState::Playing
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub fn current_speed(&self) -> String {
        self.state().speeds.current().to_string()
    }

    pub fn available_speeds(&self) -> Vec<String> {
        self.state().speeds.available()
    }

    pub fn volume(&self) -> f64 {
        self.state().volume
    }

    pub fn is_muted(&self) -> bool {
        self.state().muted_volume.is_some()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state().fullscreen
    }

    /// Last elapsed time pushed to widgets
    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    pub fn duration(&self) -> f64 {
        self.clock.duration()
    }

    pub fn bounds(&self) -> ClipBounds {
        self.clock.bounds()
    }

    pub fn widgets(&self) -> &WidgetBus {
        &self.clock.widgets
    }

    pub fn backing(&self) -> Arc<dyn BackingPlayer> {
        self.clock.backing()
    }

    /// Listen to play/pause/seek/volume/speed/fullscreen events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

impl Pausable for VideoPlayer {
    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn force_pause(&self) {
        self.clock.backing().pause();
        self.on_pause(true);
    }
}
