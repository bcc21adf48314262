//! Spreadsheet export of the history log.

use std::str::FromStr;

use rust_xlsxwriter::{Format, Workbook};
use thiserror::Error;

use crate::error::Result;
use crate::storage::{HistoryLog, HistoryStore};

pub const REPORT_FILE_NAME: &str = "guests_report.xlsx";
pub const REPORT_SHEET_NAME: &str = "History";

/// Language of the report header row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportLocale {
    #[default]
    Ru,
    En,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported report locale '{0}' (expected ru or en)")]
pub struct UnknownLocale(pub String);

impl FromStr for ReportLocale {
    type Err = UnknownLocale;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "ru" => Ok(ReportLocale::Ru),
            "en" => Ok(ReportLocale::En),
            other => Err(UnknownLocale(other.to_string())),
        }
    }
}

impl ReportLocale {
    /// Column titles: timestamp, people count, result path.
    pub fn headers(self) -> [&'static str; 3] {
        match self {
            ReportLocale::Ru => ["Дата и время", "Количество гостей", "Путь к результату"],
            ReportLocale::En => ["Timestamp", "Guests count", "Result image"],
        }
    }
}

/// Render the store's full history as an xlsx document.
///
/// Returns `Ok(None)` when there is nothing to report.
pub fn generate_report(store: &dyn HistoryStore, locale: ReportLocale) -> Result<Option<Vec<u8>>> {
    let log = store.read_all()?;
    if log.is_empty() {
        return Ok(None);
    }
    render_workbook(&log, locale).map(Some)
}

fn render_workbook(log: &HistoryLog, locale: ReportLocale) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(REPORT_SHEET_NAME)?;

    for (col, title) in locale.headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header_format)?;
    }
    sheet.set_column_width(0, 22)?;
    sheet.set_column_width(1, 20)?;
    sheet.set_column_width(2, 48)?;

    for (i, record) in log.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, &record.timestamp)?;
        sheet.write_number(row, 1, record.people_count as f64)?;
        sheet.write_string(row, 2, &record.result_image_path)?;
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuestCounterError;
    use crate::storage::{HistoryRecord, InMemoryHistoryStore, JsonHistoryStore};

    #[test]
    fn empty_history_has_no_report() {
        let store = InMemoryHistoryStore::new();
        assert!(generate_report(&store, ReportLocale::Ru).unwrap().is_none());
    }

    #[test]
    fn corrupt_history_is_an_error_not_an_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "[{").unwrap();
        let store = JsonHistoryStore::open(&path);

        let err = generate_report(&store, ReportLocale::Ru).unwrap_err();
        assert!(matches!(err, GuestCounterError::StoreCorrupt { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{");
    }

    #[test]
    fn report_is_a_zip_container() {
        let store = InMemoryHistoryStore::new();
        store
            .append(&HistoryRecord {
                id: "a".into(),
                timestamp: "2025-01-15T19:30:05".into(),
                people_count: 4,
                result_image_path: "results/a.jpg".into(),
            })
            .unwrap();
        let bytes = generate_report(&store, ReportLocale::En).unwrap().unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn locale_parsing() {
        assert_eq!("RU".parse::<ReportLocale>(), Ok(ReportLocale::Ru));
        assert_eq!(" en ".parse::<ReportLocale>(), Ok(ReportLocale::En));
        let err = "fr".parse::<ReportLocale>().unwrap_err();
        assert_eq!(err, UnknownLocale("fr".to_string()));
        assert!(!err.to_string().contains("spreadsheet"));
        assert_eq!(ReportLocale::En.headers()[1], "Guests count");
    }
}
