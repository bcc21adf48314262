//! Guest Counter
//!
//! Counts people whose bounding-box center falls inside a caller-supplied
//! rectangle of an uploaded image, renders an annotated copy, and keeps an
//! append-only history of counts that can be exported as a spreadsheet.
//!
//! # Module Structure
//!
//! - `detect`: detector backends (stub, tract/YOLOv8) and the shared `Detector`
//! - `zone`: zone membership counting
//! - `annotate`: result image rendering
//! - `storage`: history records and stores
//! - `report`: xlsx export of the history
//! - `pipeline`: the `GuestCounter` service wiring the above together
//! - `api`: HTTP surface
//! - `config`: server configuration

pub mod annotate;
pub mod api;
pub mod config;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod zone;

pub use annotate::annotate;
pub use detect::{
    backend_from_config, BoundingBox, Detection, Detector, DetectorBackend, ObjectClass,
    StubBackend,
};
pub use error::{GuestCounterError, Result};
pub use pipeline::{GuestCounter, ProcessOutcome};
pub use report::{generate_report, ReportLocale, UnknownLocale};
pub use storage::{HistoryLog, HistoryRecord, HistoryStore, InMemoryHistoryStore, JsonHistoryStore};
pub use zone::{count_in_zone, PersonMark, Zone, ZoneCountResult};
