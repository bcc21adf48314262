use thiserror::Error;

/// Failures surfaced by the counting pipeline, the history store and the
/// report generator.
///
/// Each variant maps to one HTTP status class at the request boundary; see
/// [`GuestCounterError::status_code`].
#[derive(Debug, Error)]
pub enum GuestCounterError {
    /// Upload is not a decodable raster image.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// Detector backend could not be loaded or is no longer usable.
    #[error("detection model unavailable: {0}")]
    ModelUnavailable(String),

    /// Zone coordinates were missing or not integers.
    #[error("invalid zone: {0}")]
    InvalidZone(String),

    /// Persisted history cannot be parsed. The file is left untouched.
    #[error("history store corrupt at {path}: {reason}")]
    StoreCorrupt { path: String, reason: String },

    /// Malformed request that is not a zone or image problem.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request body exceeds the configured upload limit.
    #[error("request body of {0} bytes exceeds the upload limit")]
    PayloadTooLarge(usize),

    #[error("spreadsheet generation failed: {0}")]
    Report(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuestCounterError {
    /// HTTP status the API layer answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ImageDecode(_) | Self::InvalidZone(_) | Self::BadRequest(_) => 400,
            Self::PayloadTooLarge(_) => 413,
            Self::ModelUnavailable(_) | Self::StoreCorrupt { .. } | Self::Report(_) | Self::Io(_) => {
                500
            }
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for GuestCounterError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        GuestCounterError::Report(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GuestCounterError>;
