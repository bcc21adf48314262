use std::sync::{Arc, Mutex};

use image::RgbImage;

use crate::config::DetectorSettings;
use crate::error::{GuestCounterError, Result};

use super::backend::DetectorBackend;
use super::backends::StubBackend;
use super::result::Detection;

/// Process-wide detector handle.
///
/// Constructed once at startup and shared between request threads. The
/// backend sits behind a `Mutex` because `DetectorBackend::detect` takes
/// `&mut self`; decoding happens outside the lock.
#[derive(Clone)]
pub struct Detector {
    backend: Arc<Mutex<Box<dyn DetectorBackend>>>,
    name: &'static str,
}

impl Detector {
    pub fn new<B: DetectorBackend + 'static>(backend: B) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn DetectorBackend>) -> Self {
        let name = backend.name();
        Self {
            backend: Arc::new(Mutex::new(backend)),
            name,
        }
    }

    /// Backend identifier.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Decode uploaded bytes into an RGB raster.
    pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| GuestCounterError::ImageDecode(e.to_string()))?;
        Ok(image.into_rgb8())
    }

    /// Run the backend on a decoded image.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let mut guard = self
            .backend
            .lock()
            .map_err(|_| GuestCounterError::ModelUnavailable("detector lock poisoned".into()))?;
        let detections = guard.detect(image)?;
        log::debug!(
            "{} backend reported {} detections",
            self.name,
            detections.len()
        );
        Ok(detections)
    }

    pub fn warm_up(&self) -> Result<()> {
        let mut guard = self
            .backend
            .lock()
            .map_err(|_| GuestCounterError::ModelUnavailable("detector lock poisoned".into()))?;
        guard.warm_up()
    }
}

/// Build the backend named in the detector settings.
pub fn backend_from_config(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        "tract" => tract_backend(settings),
        other => Err(GuestCounterError::ModelUnavailable(format!(
            "unknown detector backend '{other}'"
        ))),
    }
}

#[cfg(feature = "backend-tract")]
fn tract_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let backend = super::backends::TractBackend::new(&settings.model_path, settings.input_size)?
        .with_threshold(settings.confidence_threshold)
        .with_iou_threshold(settings.iou_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn tract_backend(_settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(GuestCounterError::ModelUnavailable(
        "tract backend requested but the backend-tract feature is disabled".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = Detector::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, GuestCounterError::ImageDecode(_)));
    }

    #[test]
    fn decode_accepts_png() {
        let image = Detector::decode(&png_bytes(4, 3)).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
    }

    #[test]
    fn unknown_backend_is_unavailable() {
        let settings = DetectorSettings {
            backend: "opencv".to_string(),
            ..DetectorSettings::default()
        };
        let err = backend_from_config(&settings).err().expect("must fail");
        assert!(matches!(err, GuestCounterError::ModelUnavailable(_)));
    }

    #[test]
    fn stub_backend_from_config() {
        let backend = backend_from_config(&DetectorSettings::default()).unwrap();
        let detector = Detector::from_boxed(backend);
        assert_eq!(detector.name(), "stub");
        assert!(detector.detect(&RgbImage::new(2, 2)).unwrap().is_empty());
    }
}
