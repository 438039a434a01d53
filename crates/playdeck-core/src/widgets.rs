//! Dependent widgets
//!
//! Captions, the scrubber, the time label and play controls observe the
//! playback state machine through [`Widget`]. The state machine only talks to
//! the [`WidgetBus`], which knows which roles receive which updates.

use crate::types::PlayTime;
use std::sync::{Arc, RwLock};

/// Role a widget plays next to the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetRole {
    /// Synchronized transcript; skipped when captions are hidden
    Caption,
    /// Progress slider
    Scrubber,
    /// Textual "elapsed / total" label
    TimeLabel,
    /// Play/pause button and similar controls
    Control,
}

/// Observer of playback progress
///
/// Every method defaults to a no-op, so widgets implement only what they show.
pub trait Widget: Send + Sync {
    fn play(&self) {}

    fn pause(&self) {}

    /// New elapsed time and duration (captions, scrubber)
    fn update_play_time(&self, _time: &PlayTime) {}

    /// New formatted label (time label)
    fn update_label(&self, _label: &str) {}
}

/// Fan-out of state machine updates to registered widgets
pub struct WidgetBus {
    widgets: RwLock<Vec<(WidgetRole, Arc<dyn Widget>)>>,
    captions_enabled: bool,
}

impl WidgetBus {
    pub fn new(captions_enabled: bool) -> Self {
        Self {
            widgets: RwLock::new(Vec::new()),
            captions_enabled,
        }
    }

    pub fn register(&self, role: WidgetRole, widget: Arc<dyn Widget>) {
        if let Ok(mut widgets) = self.widgets.write() {
            widgets.push((role, widget));
        }
    }

    pub fn len(&self) -> usize {
        self.widgets.read().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn captions_enabled(&self) -> bool {
        self.captions_enabled
    }

    fn each(&self, f: impl Fn(WidgetRole, &dyn Widget)) {
        let widgets = match self.widgets.read() {
            Ok(widgets) => widgets.clone(),
            Err(_) => return,
        };
        for (role, widget) in &widgets {
            if *role == WidgetRole::Caption && !self.captions_enabled {
                continue;
            }
            f(*role, widget.as_ref());
        }
    }

    pub fn play(&self) {
        self.each(|_, widget| widget.play());
    }

    pub fn pause(&self) {
        self.each(|_, widget| widget.pause());
    }

    /// Push elapsed time to every widget that displays it
    pub fn update_play_time(&self, time: PlayTime) {
        let label = time.vcr_label();
        self.each(|role, widget| match role {
            WidgetRole::Caption | WidgetRole::Scrubber => widget.update_play_time(&time),
            WidgetRole::TimeLabel => widget.update_label(&label),
            WidgetRole::Control => {}
        });
    }
}

impl Default for WidgetBus {
    fn default() -> Self {
        Self::new(true)
    }
}
