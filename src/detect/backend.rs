use image::RgbImage;

use crate::detect::result::Detection;
use crate::error::Result;

/// Detector backend trait.
///
/// Backends are black-box object detectors: they see a decoded RGB image and
/// report boxes in that image's pixel coordinates. Output order must be
/// deterministic for a given model and input.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a decoded image.
    ///
    /// Implementations treat the image as read-only. A backend that cannot run
    /// returns `GuestCounterError::ModelUnavailable`.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
