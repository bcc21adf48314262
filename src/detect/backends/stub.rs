use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::error::Result;

/// Stub backend for testing. Replays a fixed set of detections for every image.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    scripted: Vec<Detection>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self {
            scripted: detections,
        }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>> {
        Ok(self.scripted.clone())
    }
}
