use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::report::ReportLocale;

const DEFAULT_API_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const DEFAULT_RESULTS_DIR: &str = "results";
const DEFAULT_HISTORY_PATH: &str = "history.json";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;

const KNOWN_BACKENDS: &[&str] = &["stub", "tract"];

#[derive(Debug, Deserialize, Default)]
struct ServerConfigFile {
    api: Option<ApiConfigFile>,
    storage: Option<StorageConfigFile>,
    detector: Option<DetectorConfigFile>,
    report: Option<ReportConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageConfigFile {
    uploads_dir: Option<PathBuf>,
    results_dir: Option<PathBuf>,
    history_path: Option<PathBuf>,
    static_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ReportConfigFile {
    locale: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api_addr: String,
    pub max_upload_bytes: usize,
    pub storage: StorageSettings,
    pub detector: DetectorSettings,
    pub report_locale: ReportLocale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    pub uploads_dir: PathBuf,
    pub results_dir: PathBuf,
    pub history_path: PathBuf,
    pub static_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from(DEFAULT_UPLOADS_DIR),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl StorageSettings {
    /// All paths resolved under one root directory.
    pub fn under(root: &Path) -> Self {
        Self {
            uploads_dir: root.join(DEFAULT_UPLOADS_DIR),
            results_dir: root.join(DEFAULT_RESULTS_DIR),
            history_path: root.join(DEFAULT_HISTORY_PATH),
            static_dir: root.join(DEFAULT_STATIC_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: PathBuf,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("GUEST_COUNTER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ServerConfigFile) -> Result<Self> {
        let api = file.api.unwrap_or_default();
        let storage = file.storage.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let defaults = StorageSettings::default();
        let detector_defaults = DetectorSettings::default();

        let report_locale = match file.report.and_then(|report| report.locale) {
            Some(locale) => locale.parse::<ReportLocale>()?,
            None => ReportLocale::default(),
        };

        Ok(Self {
            api_addr: api.addr.unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            max_upload_bytes: api.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            storage: StorageSettings {
                uploads_dir: storage.uploads_dir.unwrap_or(defaults.uploads_dir),
                results_dir: storage.results_dir.unwrap_or(defaults.results_dir),
                history_path: storage.history_path.unwrap_or(defaults.history_path),
                static_dir: storage.static_dir.unwrap_or(defaults.static_dir),
            },
            detector: DetectorSettings {
                backend: detector.backend.unwrap_or(detector_defaults.backend),
                model_path: detector.model_path.unwrap_or(detector_defaults.model_path),
                input_size: detector.input_size.unwrap_or(detector_defaults.input_size),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(detector_defaults.confidence_threshold),
                iou_threshold: detector
                    .iou_threshold
                    .unwrap_or(detector_defaults.iou_threshold),
            },
            report_locale,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("GUEST_COUNTER_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(max) = std::env::var("GUEST_COUNTER_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = max.trim().parse().map_err(|_| {
                anyhow!("GUEST_COUNTER_MAX_UPLOAD_BYTES must be an integer number of bytes")
            })?;
        }
        if let Ok(path) = std::env::var("GUEST_COUNTER_HISTORY_PATH") {
            if !path.trim().is_empty() {
                self.storage.history_path = PathBuf::from(path);
            }
        }
        if let Ok(backend) = std::env::var("GUEST_COUNTER_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("GUEST_COUNTER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = PathBuf::from(path);
            }
        }
        if let Ok(locale) = std::env::var("GUEST_COUNTER_REPORT_LOCALE") {
            if !locale.trim().is_empty() {
                self.report_locale = locale.parse::<ReportLocale>()?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !KNOWN_BACKENDS.contains(&self.detector.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of {:?})",
                self.detector.backend,
                KNOWN_BACKENDS
            ));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input size must be greater than zero"));
        }
        for (name, value) in [
            ("confidence_threshold", self.detector.confidence_threshold),
            ("iou_threshold", self.detector.iou_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(anyhow!("{name} must be in (0, 1], got {value}"));
            }
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("max upload size must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ServerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
