//! Recording session management.

use snapreel_common::{RecordingClock, SnapreelError, SnapreelResult};
use snapreel_project_model::{Recording, SessionContext};
use tokio::sync::mpsc;

use crate::device::{CaptureDevice, CaptureEvent, RecorderConfig};

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Nothing captured yet, or reset.
    Idle,
    /// Waiting for the device to hand over a stream.
    Requesting,
    /// Recorder running.
    Recording,
    /// Recorder paused; no data expected.
    Paused,
    /// Stop requested, waiting for the recorder's final chunk.
    Stopping,
    /// Recording assembled.
    Stopped,
    /// The device or recorder failed.
    Failed,
}

/// Active-time bookkeeping: wall time since start minus paused spans.
#[derive(Debug, Clone)]
struct ActiveTime {
    clock: RecordingClock,
    paused_total: f64,
    paused_at: Option<f64>,
    frozen: Option<f64>,
}

impl ActiveTime {
    fn start() -> Self {
        Self {
            clock: RecordingClock::start(),
            paused_total: 0.0,
            paused_at: None,
            frozen: None,
        }
    }

    fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(self.clock.elapsed_secs());
        }
    }

    fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += self.clock.elapsed_secs() - at;
        }
    }

    fn freeze(&mut self) {
        if self.frozen.is_none() {
            self.frozen = Some(self.elapsed());
        }
    }

    fn elapsed(&self) -> f64 {
        if let Some(frozen) = self.frozen {
            return frozen;
        }
        let now = self.paused_at.unwrap_or_else(|| self.clock.elapsed_secs());
        (now - self.paused_total).max(0.0)
    }
}

/// A recording session: one device, one recorder, one resulting blob.
///
/// All device callbacks arrive as [`CaptureEvent`]s on a queue and are
/// applied by [`CaptureSession::handle_event`], so every transition can be
/// driven without a real capture device.
pub struct CaptureSession {
    device: Box<dyn CaptureDevice>,
    config: RecorderConfig,
    state: CaptureState,
    events: Option<mpsc::UnboundedReceiver<CaptureEvent>>,
    chunks: Vec<Vec<u8>>,
    active: Option<ActiveTime>,
    recording: Option<Recording>,
    error: Option<String>,
}

impl CaptureSession {
    /// Create a new capture session over `device`.
    pub fn new(device: Box<dyn CaptureDevice>, config: RecorderConfig) -> Self {
        Self {
            device,
            config,
            state: CaptureState::Idle,
            events: None,
            chunks: Vec::new(),
            active: None,
            recording: None,
            error: None,
        }
    }

    /// Current session state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Last failure message, if the session is `Failed`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The assembled recording once `Stopped`.
    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    /// Bytes received so far.
    pub fn bytes_buffered(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Recording time so far, excluding paused spans.
    pub fn elapsed_secs(&self) -> f64 {
        self.active.as_ref().map(ActiveTime::elapsed).unwrap_or(0.0)
    }

    /// Start recording.
    ///
    /// Allowed from `Idle`, `Stopped` and `Failed`; a previous result is discarded.
    pub async fn start(&mut self) -> SnapreelResult<()> {
        if !matches!(
            self.state,
            CaptureState::Idle | CaptureState::Stopped | CaptureState::Failed
        ) {
            return Err(SnapreelError::capture("Session already started"));
        }
        if !self.device.is_available() {
            return Err(SnapreelError::capability(format!(
                "capture device '{}' is not available",
                self.device.name()
            )));
        }

        tracing::info!(device = self.device.name(), mime = %self.config.mime_type, "Starting capture session");
        self.chunks.clear();
        self.recording = None;
        self.error = None;
        self.set_state(CaptureState::Requesting);

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = self.device.start(&self.config, tx).await {
            self.fail(e.to_string());
            return Err(e);
        }

        self.events = Some(rx);
        self.active = Some(ActiveTime::start());
        self.set_state(CaptureState::Recording);
        Ok(())
    }

    /// Pause recording.
    pub fn pause(&mut self) -> SnapreelResult<()> {
        if self.state != CaptureState::Recording {
            return Err(SnapreelError::capture("Not recording"));
        }
        self.device.pause()?;
        if let Some(active) = self.active.as_mut() {
            active.pause();
        }
        self.set_state(CaptureState::Paused);
        Ok(())
    }

    /// Resume a paused recording.
    pub fn resume(&mut self) -> SnapreelResult<()> {
        if self.state != CaptureState::Paused {
            return Err(SnapreelError::capture("Not paused"));
        }
        self.device.resume()?;
        if let Some(active) = self.active.as_mut() {
            active.resume();
        }
        self.set_state(CaptureState::Recording);
        Ok(())
    }

    /// Ask the recorder to stop without waiting for it.
    pub fn request_stop(&mut self) -> SnapreelResult<()> {
        match self.state {
            CaptureState::Recording | CaptureState::Paused => {}
            CaptureState::Stopping => return Ok(()),
            _ => return Err(SnapreelError::capture("Session not recording")),
        }

        if let Some(active) = self.active.as_mut() {
            active.freeze();
        }
        self.set_state(CaptureState::Stopping);
        if let Err(e) = self.device.stop() {
            self.fail(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Stop recording and wait for the assembled recording.
    pub async fn stop(&mut self) -> SnapreelResult<Recording> {
        self.request_stop()?;
        while self.state == CaptureState::Stopping {
            if self.next_event().await.is_none() {
                break;
            }
        }

        match (self.state, self.recording.as_ref()) {
            (CaptureState::Stopped, Some(recording)) => Ok(recording.clone()),
            _ => Err(SnapreelError::capture(
                self.error
                    .clone()
                    .unwrap_or_else(|| "Recorder stopped without producing data".to_string()),
            )),
        }
    }

    /// Discard everything and go back to `Idle`.
    pub fn reset(&mut self) {
        if matches!(
            self.state,
            CaptureState::Requesting
                | CaptureState::Recording
                | CaptureState::Paused
                | CaptureState::Stopping
        ) {
            self.device.release();
        }
        self.events = None;
        self.chunks.clear();
        self.active = None;
        self.recording = None;
        self.error = None;
        self.set_state(CaptureState::Idle);
    }

    /// Wait for the next device event and apply it.
    ///
    /// Returns the resulting state, or `None` when no recorder is attached.
    /// Cancel safe: an event is applied in full once received.
    pub async fn next_event(&mut self) -> Option<CaptureState> {
        let received = self.events.as_mut()?.recv().await;
        match received {
            Some(event) => self.handle_event(event),
            None => self.handle_disconnect(),
        }
        Some(self.state)
    }

    /// Apply every event already queued, without waiting.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(rx) = self.events.as_mut() {
            match rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    handled += 1;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.handle_disconnect();
                    break;
                }
            }
        }
        handled
    }

    /// The transition function.
    pub fn handle_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::DataAvailable(bytes) => {
                if bytes.is_empty() {
                    return;
                }
                if matches!(
                    self.state,
                    CaptureState::Recording | CaptureState::Paused | CaptureState::Stopping
                ) {
                    self.chunks.push(bytes);
                } else {
                    tracing::debug!(state = ?self.state, len = bytes.len(), "Dropping late capture chunk");
                }
            }
            CaptureEvent::TrackEnded => {
                if matches!(self.state, CaptureState::Recording | CaptureState::Paused) {
                    tracing::info!("Captured track ended, stopping recorder");
                    if let Err(e) = self.request_stop() {
                        tracing::warn!(error = %e, "Failed to stop recorder after track end");
                    }
                }
            }
            CaptureEvent::RecorderStopped => {
                if matches!(
                    self.state,
                    CaptureState::Recording | CaptureState::Paused | CaptureState::Stopping
                ) {
                    self.finalize();
                }
            }
            CaptureEvent::Error(message) => {
                if self.state != CaptureState::Failed {
                    self.fail(message);
                }
            }
        }
    }

    /// Hand the finished recording to `context`, returning the recording it
    /// displaced so the caller can release it.
    pub fn commit_to(&mut self, context: &mut SessionContext) -> Option<Recording> {
        let recording = self.recording.take()?;
        tracing::info!(bytes = recording.len(), "Recording committed to session");
        context.replace(recording)
    }

    fn handle_disconnect(&mut self) {
        self.events = None;
        match self.state {
            CaptureState::Stopping => self.finalize(),
            CaptureState::Recording | CaptureState::Paused => {
                self.fail("Capture device disconnected".to_string());
            }
            _ => {}
        }
    }

    fn finalize(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.freeze();
        }
        let bytes = self.chunks.concat();
        self.chunks.clear();
        self.device.release();
        self.events = None;

        let recording = Recording::new(bytes, self.config.container_mime());
        tracing::info!(
            bytes = recording.len(),
            duration_secs = self.elapsed_secs(),
            "Recording stopped"
        );
        self.recording = Some(recording);
        self.set_state(CaptureState::Stopped);
    }

    fn fail(&mut self, message: String) {
        tracing::error!(error = %message, "Capture failed");
        self.device.release();
        self.events = None;
        self.chunks.clear();
        self.error = Some(message);
        self.set_state(CaptureState::Failed);
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "Capture state");
            self.state = state;
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if matches!(
            self.state,
            CaptureState::Requesting
                | CaptureState::Recording
                | CaptureState::Paused
                | CaptureState::Stopping
        ) {
            self.device.release();
        }
    }
}
