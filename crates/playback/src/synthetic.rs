//! A generated test-pattern source.
//!
//! Produces frames on demand with exact timing, so it can stand in for a
//! decoded file wherever a deterministic source is needed (self-checks,
//! engine tests).

use std::collections::VecDeque;
use std::time::Duration;

use image::{Rgba, RgbaImage};

use crate::element::{MediaElement, MediaEvent};
use crate::error::MediaError;

/// Test-pattern media element: a grey field with a white bar sweeping left to
/// right over the duration.
pub struct SyntheticElement {
    width: u32,
    height: u32,
    duration: f64,
    mime_type: String,
    position: f64,
    paused: bool,
    ended: bool,
    seek_pending: bool,
    frame: RgbaImage,
    events: VecDeque<MediaEvent>,
}

impl SyntheticElement {
    pub fn new(width: u32, height: u32, duration: f64) -> Self {
        let mut element = Self {
            width: width.max(1),
            height: height.max(1),
            duration: duration.max(0.0),
            mime_type: "video/webm".to_string(),
            position: 0.0,
            paused: true,
            ended: false,
            seek_pending: false,
            frame: RgbaImage::new(width.max(1), height.max(1)),
            events: VecDeque::from([
                MediaEvent::LoadStart,
                MediaEvent::DurationChange,
                MediaEvent::LoadedData,
            ]),
        };
        element.render();
        element
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    fn render(&mut self) {
        let progress = if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let bar_x = ((self.width - 1) as f64 * progress).round() as u32;
        let bar_half = (self.width / 40).max(1);
        for (x, _, pixel) in self.frame.enumerate_pixels_mut() {
            *pixel = if x.abs_diff(bar_x) < bar_half {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([64, 64, 64, 255])
            };
        }
    }
}

#[async_trait::async_trait]
impl MediaElement for SyntheticElement {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn natural_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn set_current_time(&mut self, time: f64) {
        let time = if time.is_finite() { time } else { 0.0 };
        self.position = time.clamp(0.0, self.duration);
        self.ended = false;
        self.seek_pending = true;
    }

    async fn wait_seeked(&mut self) -> Result<(), MediaError> {
        if self.seek_pending {
            self.seek_pending = false;
            self.render();
            self.events.push_back(MediaEvent::Seeked);
        }
        Ok(())
    }

    async fn play(&mut self) -> Result<(), MediaError> {
        if self.ended {
            self.set_current_time(0.0);
            self.wait_seeked().await?;
        }
        if self.paused {
            self.paused = false;
            self.events.push_back(MediaEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.events.push_back(MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn ended(&self) -> bool {
        self.ended
    }

    async fn advance(&mut self, elapsed: Duration) -> Result<(), MediaError> {
        self.wait_seeked().await?;
        if self.paused || self.ended {
            return Ok(());
        }
        self.position += elapsed.as_secs_f64();
        if self.position >= self.duration {
            self.position = self.duration;
            self.ended = true;
            self.paused = true;
            self.events.push_back(MediaEvent::Pause);
            self.events.push_back(MediaEvent::Ended);
        }
        self.render();
        Ok(())
    }

    fn current_frame(&self) -> Result<&RgbaImage, MediaError> {
        Ok(&self.frame)
    }

    fn poll_event(&mut self) -> Option<MediaEvent> {
        self.events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plays_to_end() {
        let mut element = SyntheticElement::new(32, 18, 0.5);
        element.play().await.unwrap();
        for _ in 0..10 {
            element.advance(Duration::from_millis(100)).await.unwrap();
        }
        assert!(element.ended());
        assert!(element.is_paused());
        assert_eq!(element.current_time(), 0.5);
    }

    #[tokio::test]
    async fn test_paused_element_does_not_move() {
        let mut element = SyntheticElement::new(32, 18, 2.0);
        element.advance(Duration::from_secs(1)).await.unwrap();
        assert_eq!(element.current_time(), 0.0);
    }

    #[tokio::test]
    async fn test_seek_emits_seeked() {
        let mut element = SyntheticElement::new(32, 18, 2.0);
        while element.poll_event().is_some() {}
        element.set_current_time(1.5);
        element.wait_seeked().await.unwrap();
        assert_eq!(element.poll_event(), Some(MediaEvent::Seeked));
        assert_eq!(element.current_time(), 1.5);
    }
}
