use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;
use uuid::Uuid;

use crate::annotate::annotate;
use crate::config::StorageSettings;
use crate::detect::Detector;
use crate::error::{GuestCounterError, Result};
use crate::report::{generate_report, ReportLocale};
use crate::storage::{HistoryLog, HistoryRecord, HistoryStore};
use crate::zone::{count_in_zone, Zone};

/// Public prefix under which annotated images are served and recorded.
pub const RESULTS_URL_PREFIX: &str = "results";

/// Outcome of one processing request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub id: String,
    pub guests_count: usize,
    /// Relative path of the annotated image, as stored in history.
    pub result_image: String,
}

/// Counting service shared by all request handlers.
///
/// Holds the one detector and the one history store of the process; both
/// are built at startup and injected here.
pub struct GuestCounter {
    detector: Detector,
    store: Arc<dyn HistoryStore>,
    uploads_dir: PathBuf,
    results_dir: PathBuf,
}

impl GuestCounter {
    pub fn new(detector: Detector, store: Arc<dyn HistoryStore>, storage: &StorageSettings) -> Self {
        Self {
            detector,
            store,
            uploads_dir: storage.uploads_dir.clone(),
            results_dir: storage.results_dir.clone(),
        }
    }

    /// Create the uploads and results directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.uploads_dir)?;
        std::fs::create_dir_all(&self.results_dir)?;
        Ok(())
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Count people inside `zone`, persist the upload and the annotated
    /// result, and append a history record.
    pub fn process_image(&self, upload: &[u8], zone: &Zone) -> Result<ProcessOutcome> {
        self.ensure_dirs()?;
        let id = Uuid::new_v4().to_string();
        let file_name = format!("{id}.jpg");

        std::fs::write(self.uploads_dir.join(&file_name), upload)?;

        let image = Detector::decode(upload)?;
        let detections = self.detector.detect(&image)?;
        let result = count_in_zone(&detections, zone);
        let annotated = annotate(&image, &detections, zone, &result);

        annotated
            .save_with_format(self.results_dir.join(&file_name), ImageFormat::Jpeg)
            .map_err(|e| GuestCounterError::Io(std::io::Error::other(e)))?;

        let result_image = format!("{RESULTS_URL_PREFIX}/{file_name}");
        let record = HistoryRecord::now(id.clone(), result.count as u64, result_image.clone());
        self.store.append(&record)?;

        log::info!(
            "processed {}: {} of {} people inside zone {:?}",
            id,
            result.count,
            result.persons.len(),
            zone
        );

        Ok(ProcessOutcome {
            id,
            guests_count: result.count,
            result_image,
        })
    }

    pub fn history(&self) -> Result<HistoryLog> {
        self.store.read_all()
    }

    /// Spreadsheet of the full history, or `None` when it is empty.
    pub fn report(&self, locale: ReportLocale) -> Result<Option<Vec<u8>>> {
        generate_report(self.store.as_ref(), locale)
    }
}
