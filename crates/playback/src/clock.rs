//! Playback clock: turns a media element's play/pause/seek state into a
//! polled position with formatted time and inline error state.

use std::time::Duration;

use serde::Serialize;
use snapreel_common::{PlaybackSettings, TickSource};
use snapreel_project_model::TrimRange;
use tracing::{debug, error, warn};

use crate::element::{MediaElement, MediaEvent};
use crate::error::MediaError;
use crate::format::format_time;

/// Observable player state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub error: Option<MediaError>,
    pub is_loading: bool,
}

/// Drives one media element at a time.
pub struct PlaybackClock {
    element: Option<Box<dyn MediaElement>>,
    state: PlaybackState,
    skip_secs: f64,
}

impl PlaybackClock {
    pub fn new(settings: &PlaybackSettings) -> Self {
        Self {
            element: None,
            state: PlaybackState::default(),
            skip_secs: settings.skip_secs,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn current_time(&self) -> f64 {
        self.state.current_time
    }

    pub fn duration(&self) -> f64 {
        self.state.duration
    }

    pub fn error(&self) -> Option<&MediaError> {
        self.state.error.as_ref()
    }

    pub fn formatted_current_time(&self) -> String {
        format_time(self.state.current_time)
    }

    pub fn formatted_duration(&self) -> String {
        format_time(self.state.duration)
    }

    pub fn element(&self) -> Option<&dyn MediaElement> {
        self.element.as_deref()
    }

    /// Exclusive access for a job that takes over the element (e.g. an export).
    /// Call [`sync`](Self::sync) afterwards to pick up its queued events.
    pub fn element_mut(&mut self) -> Option<&mut (dyn MediaElement + 'static)> {
        self.element.as_deref_mut()
    }

    /// Swap in a new source, returning the previous one so the caller can release it.
    ///
    /// Position, duration and error are reset before the new source's events are read.
    pub fn set_source(
        &mut self,
        element: Option<Box<dyn MediaElement>>,
    ) -> Option<Box<dyn MediaElement>> {
        let previous = std::mem::replace(&mut self.element, element);
        self.state = PlaybackState::default();
        debug!(has_source = self.element.is_some(), "Playback source changed");
        self.sync();
        previous
    }

    /// Start playback. Failures land in [`error`](Self::error), never in the caller.
    pub async fn play(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if let Err(e) = element.play().await {
            warn!(error = %e, "Playback failed to start");
            self.state.error = Some(e);
            self.state.is_playing = false;
        }
        self.sync();
    }

    pub fn pause(&mut self) {
        if let Some(element) = self.element.as_mut() {
            element.pause();
        }
        self.sync();
    }

    pub async fn toggle(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play().await;
        }
    }

    /// Seek to `time`, clamped into `[0, duration]`.
    pub async fn seek(&mut self, time: f64) {
        let target = if time.is_finite() { time } else { 0.0 };
        let target = target.min(self.state.duration).max(0.0);
        self.seek_unclamped(target).await;
    }

    /// Seek to `percent` of the duration. No-op while the duration is unknown.
    pub async fn seek_by_percent(&mut self, percent: f64) {
        if self.state.duration <= 0.0 || !percent.is_finite() {
            return;
        }
        let target = percent.clamp(0.0, 100.0) / 100.0 * self.state.duration;
        self.seek_unclamped(target).await;
    }

    /// Jump forward, defaulting to the configured skip distance.
    pub async fn skip_forward(&mut self, seconds: Option<f64>) {
        let Some(now) = self.element.as_ref().map(|e| e.current_time()) else {
            return;
        };
        let target = (now + seconds.unwrap_or(self.skip_secs)).min(self.state.duration);
        self.seek_unclamped(target.max(0.0)).await;
    }

    pub async fn skip_backward(&mut self, seconds: Option<f64>) {
        let Some(now) = self.element.as_ref().map(|e| e.current_time()) else {
            return;
        };
        let target = (now - seconds.unwrap_or(self.skip_secs)).max(0.0);
        self.seek_unclamped(target).await;
    }

    /// Play within a trim window, seeking to its start first when the
    /// position lies outside it.
    pub async fn play_in_range(&mut self, trim: &TrimRange) {
        if !trim.contains(self.state.current_time) {
            self.seek(trim.start()).await;
        }
        self.play().await;
    }

    /// Handle one scheduler tick: advance a playing element and refresh the position.
    pub async fn tick(&mut self, elapsed: Duration) {
        self.sync();
        if !self.state.is_playing {
            return;
        }
        let Some(element) = self.element.as_mut() else {
            return;
        };
        if let Err(e) = element.advance(elapsed).await {
            error!(error = %e, "Playback stalled");
            element.pause();
            self.state.error = Some(e);
        }
        self.state.current_time = element.current_time();
        self.sync();
    }

    /// Tick until playback stops (paused, ended, or failed).
    pub async fn run(&mut self, ticker: &mut dyn TickSource) {
        while self.state.is_playing {
            let tick = ticker.next_tick().await;
            self.tick(tick.elapsed).await;
        }
    }

    /// Drain the element's queued events into the observable state.
    pub fn sync(&mut self) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        while let Some(event) = element.poll_event() {
            match event {
                MediaEvent::LoadStart => {
                    self.state.is_loading = true;
                    self.state.error = None;
                }
                MediaEvent::LoadedData => {
                    self.state.is_loading = false;
                    update_duration(&mut self.state, element.duration());
                    self.state.current_time = element.current_time();
                }
                MediaEvent::DurationChange => {
                    update_duration(&mut self.state, element.duration());
                }
                MediaEvent::Play => self.state.is_playing = true,
                MediaEvent::Pause => {
                    self.state.is_playing = false;
                    self.state.current_time = element.current_time();
                }
                MediaEvent::Ended => self.state.is_playing = false,
                MediaEvent::Seeked => self.state.current_time = element.current_time(),
                MediaEvent::Error(e) => {
                    error!(error = %e, "Media element error");
                    self.state.error = Some(e);
                }
            }
        }
    }

    async fn seek_unclamped(&mut self, target: f64) {
        let Some(element) = self.element.as_mut() else {
            return;
        };
        element.set_current_time(target);
        if let Err(e) = element.wait_seeked().await {
            warn!(target, error = %e, "Seek failed");
            self.state.error = Some(e);
        }
        self.sync();
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(&PlaybackSettings::default())
    }
}

fn update_duration(state: &mut PlaybackState, duration: f64) {
    if duration.is_finite() && duration > 0.0 {
        state.duration = duration;
    }
}
