mod adapter;
mod backend;
mod backends;
mod result;

pub use adapter::{backend_from_config, Detector};
pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, ObjectClass, COCO_PERSON_CLASS};
