use std::sync::{Arc, Mutex};
use std::time::Duration;

use snapreel_capture_engine::{
    CaptureDevice, CaptureEvent, CaptureSession, CaptureState, EventSender, RecorderConfig,
};
use snapreel_common::{SnapreelError, SnapreelResult};
use snapreel_project_model::{Recording, SessionContext};

#[derive(Debug, Default)]
struct DeviceLog {
    sender: Option<EventSender>,
    starts: u32,
    stops: u32,
    releases: u32,
}

/// A device whose recorder is driven by the test through the shared log.
struct ScriptedDevice {
    log: Arc<Mutex<DeviceLog>>,
    refuse_start: bool,
    final_chunk: Vec<u8>,
}

impl ScriptedDevice {
    fn new() -> (Self, Arc<Mutex<DeviceLog>>) {
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let device = Self {
            log: Arc::clone(&log),
            refuse_start: false,
            final_chunk: b"tail".to_vec(),
        };
        (device, log)
    }
}

#[async_trait::async_trait]
impl CaptureDevice for ScriptedDevice {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn start(&mut self, _config: &RecorderConfig, events: EventSender) -> SnapreelResult<()> {
        if self.refuse_start {
            return Err(SnapreelError::capture("Permission denied"));
        }
        let mut log = self.log.lock().unwrap();
        log.starts += 1;
        log.sender = Some(events);
        Ok(())
    }

    fn pause(&mut self) -> SnapreelResult<()> {
        Ok(())
    }

    fn resume(&mut self) -> SnapreelResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> SnapreelResult<()> {
        let mut log = self.log.lock().unwrap();
        log.stops += 1;
        if let Some(sender) = log.sender.as_ref() {
            let _ = sender.send(CaptureEvent::DataAvailable(self.final_chunk.clone()));
            let _ = sender.send(CaptureEvent::RecorderStopped);
        }
        Ok(())
    }

    fn release(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.releases += 1;
        log.sender = None;
    }
}

fn emit(log: &Arc<Mutex<DeviceLog>>, event: CaptureEvent) {
    let log = log.lock().unwrap();
    log.sender
        .as_ref()
        .expect("recorder not running")
        .send(event)
        .unwrap();
}

fn session() -> (CaptureSession, Arc<Mutex<DeviceLog>>) {
    let (device, log) = ScriptedDevice::new();
    (
        CaptureSession::new(Box::new(device), RecorderConfig::default()),
        log,
    )
}

#[tokio::test]
async fn test_records_chunks_into_one_blob() {
    let (mut session, log) = session();
    session.start().await.unwrap();
    assert_eq!(session.state(), CaptureState::Recording);

    emit(&log, CaptureEvent::DataAvailable(b"head".to_vec()));
    emit(&log, CaptureEvent::DataAvailable(Vec::new()));
    emit(&log, CaptureEvent::DataAvailable(b"-body-".to_vec()));
    assert_eq!(session.pump(), 3);
    assert_eq!(session.bytes_buffered(), 10);

    let recording = session.stop().await.unwrap();
    assert_eq!(recording.bytes, b"head-body-tail".to_vec());
    assert_eq!(recording.mime_type, "video/webm");
    assert_eq!(session.state(), CaptureState::Stopped);

    let log = log.lock().unwrap();
    assert_eq!((log.starts, log.stops, log.releases), (1, 1, 1));
    assert!(log.sender.is_none());
}

#[tokio::test]
async fn test_command_guards() {
    let (mut session, _log) = session();
    assert!(matches!(session.pause(), Err(SnapreelError::Capture { .. })));
    assert!(session.resume().is_err());
    assert!(session.stop().await.is_err());
    assert_eq!(session.state(), CaptureState::Idle);

    session.start().await.unwrap();
    assert!(session.start().await.is_err());
    assert!(session.resume().is_err());
    assert_eq!(session.state(), CaptureState::Recording);
}

#[tokio::test]
async fn test_refused_stream_fails_session() {
    let (mut device, log) = ScriptedDevice::new();
    device.refuse_start = true;
    let mut session = CaptureSession::new(Box::new(device), RecorderConfig::default());

    assert!(session.start().await.is_err());
    assert_eq!(session.state(), CaptureState::Failed);
    assert!(session.error().unwrap().contains("Permission denied"));
    assert_eq!(log.lock().unwrap().starts, 0);

    session.reset();
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(session.error().is_none());
}

#[tokio::test]
async fn test_pause_excludes_time_from_elapsed() {
    let (mut session, _log) = session();
    session.start().await.unwrap();
    session.pause().unwrap();
    assert_eq!(session.state(), CaptureState::Paused);

    let at_pause = session.elapsed_secs();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(session.elapsed_secs(), at_pause);

    session.resume().unwrap();
    assert_eq!(session.state(), CaptureState::Recording);
    assert!(session.elapsed_secs() < at_pause + 0.05);
}

#[tokio::test]
async fn test_track_end_stops_recorder() {
    let (mut session, log) = session();
    session.start().await.unwrap();

    emit(&log, CaptureEvent::DataAvailable(b"frame".to_vec()));
    emit(&log, CaptureEvent::TrackEnded);

    assert_eq!(session.next_event().await, Some(CaptureState::Recording));
    assert_eq!(session.next_event().await, Some(CaptureState::Stopping));
    // Final chunk from the stop request, then the stop itself.
    session.pump();

    assert_eq!(session.state(), CaptureState::Stopped);
    assert_eq!(session.recording().unwrap().bytes, b"frametail".to_vec());
    assert_eq!(log.lock().unwrap().stops, 1);
}

#[tokio::test]
async fn test_recorder_error_discards_data() {
    let (mut session, log) = session();
    session.start().await.unwrap();
    emit(&log, CaptureEvent::DataAvailable(b"partial".to_vec()));
    emit(&log, CaptureEvent::Error("encoder crashed".to_string()));
    session.pump();

    assert_eq!(session.state(), CaptureState::Failed);
    assert_eq!(session.error(), Some("encoder crashed"));
    assert_eq!(session.bytes_buffered(), 0);
    assert!(session.recording().is_none());
    assert_eq!(log.lock().unwrap().releases, 1);

    // A failed session can record again.
    session.start().await.unwrap();
    assert_eq!(session.state(), CaptureState::Recording);
}

#[tokio::test]
async fn test_device_disconnect_while_recording_fails() {
    let (mut session, log) = session();
    session.start().await.unwrap();
    log.lock().unwrap().sender = None;

    assert_eq!(session.next_event().await, Some(CaptureState::Failed));
    assert!(session.error().unwrap().contains("disconnected"));
}

#[tokio::test]
async fn test_commit_replaces_session_recording() {
    let mut context = SessionContext::create(Recording::new(vec![1, 2, 3], "video/webm"));
    let (mut session, log) = session();
    session.start().await.unwrap();
    emit(&log, CaptureEvent::DataAvailable(b"new".to_vec()));
    session.stop().await.unwrap();

    let previous = session.commit_to(&mut context).unwrap();
    assert_eq!(previous.bytes, vec![1, 2, 3]);
    assert_eq!(context.current().unwrap().bytes, b"newtail".to_vec());
    assert!(session.recording().is_none());
    assert!(session.commit_to(&mut context).is_none());
}

#[tokio::test]
async fn test_reset_releases_running_recorder() {
    let (mut session, log) = session();
    session.start().await.unwrap();
    emit(&log, CaptureEvent::DataAvailable(b"abc".to_vec()));
    session.pump();

    session.reset();
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(session.bytes_buffered(), 0);
    assert_eq!(session.elapsed_secs(), 0.0);
    assert_eq!(log.lock().unwrap().releases, 1);
    assert_eq!(session.next_event().await, None);
}
