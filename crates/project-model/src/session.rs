//! The current recording, owned by a session controller and passed to consumers.

use chrono::{DateTime, Utc};

use crate::export::OutputContainer;

/// A finished capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

impl Recording {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn container(&self) -> OutputContainer {
        OutputContainer::from_mime(&self.mime_type)
    }
}

/// Holds at most one recording at a time.
#[derive(Debug, Default)]
pub struct SessionContext {
    current: Option<Recording>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session around a fresh recording.
    pub fn create(recording: Recording) -> Self {
        Self {
            current: Some(recording),
        }
    }

    pub fn current(&self) -> Option<&Recording> {
        self.current.as_ref()
    }

    /// Install a new recording, handing back the one it displaced so the
    /// caller can release it.
    pub fn replace(&mut self, recording: Recording) -> Option<Recording> {
        self.current.replace(recording)
    }

    pub fn clear(&mut self) -> Option<Recording> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_returns_previous() {
        let mut session = SessionContext::create(Recording::new(vec![1, 2, 3], "video/webm"));
        let old = session.replace(Recording::new(vec![9], "video/mp4")).unwrap();
        assert_eq!(old.bytes, vec![1, 2, 3]);
        assert_eq!(session.current().unwrap().container(), OutputContainer::Mp4);
    }

    #[test]
    fn test_clear_empties_session() {
        let mut session = SessionContext::new();
        assert!(session.clear().is_none());
        session.replace(Recording::new(vec![0; 4], "video/webm"));
        assert_eq!(session.clear().map(|r| r.len()), Some(4));
        assert!(session.current().is_none());
    }
}
