//! Result downloads
//!
//! Rows are encoded in full before anything is written, so a failed export
//! never leaves a partial file behind. The "Excel" format is the CSV text
//! under an `.xlsx` name and spreadsheet content type.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use mime::Mime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::notify::{Notification, Notifier};
use crate::observability::Metrics;
use crate::scraper::catalog;
use crate::storage::{StorageClient, StorageError};
use crate::tasks::{ResultRow, Task};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,

    #[error("unknown export format: {0}")]
    UnknownFormat(String),

    #[error("failed to encode rows: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to save export: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Excel,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Excel => "excel",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Excel => "xlsx",
        }
    }

    pub fn mime(&self) -> Mime {
        match self {
            ExportFormat::Csv => mime::TEXT_CSV,
            ExportFormat::Json => mime::APPLICATION_JSON,
            ExportFormat::Excel => XLSX_MIME
                .parse()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Encode rows in `format`.
///
/// CSV and Excel: a header line with the first row's keys, then one line per
/// row with each cell as its JSON literal (strings quoted, numbers bare) and
/// an empty cell where a row lacks the key. JSON: pretty-printed array.
pub fn encode(rows: &[ResultRow], format: ExportFormat) -> Result<String> {
    let Some(first) = rows.first() else {
        return Err(ExportError::Empty);
    };

    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(rows)?),
        ExportFormat::Csv | ExportFormat::Excel => {
            let headers: Vec<&String> = first.keys().collect();
            let mut lines = Vec::with_capacity(rows.len() + 1);
            lines.push(
                headers
                    .iter()
                    .map(|h| h.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            );

            for row in rows {
                let cells = headers
                    .iter()
                    .map(|h| match row.get(*h) {
                        Some(value) => serde_json::to_string(value),
                        None => Ok(String::new()),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                lines.push(cells.join(","));
            }
            Ok(lines.join("\n"))
        }
    }
}

/// `<site>_data.<ext>`, where `<site>` is the catalog id for a known website
/// label and a lowercase slug of the label otherwise
pub fn filename(website: &str, format: ExportFormat) -> String {
    let stem = match catalog::find_by_name(website) {
        Some(site) => site.id.to_string(),
        None => slug(website),
    };
    format!("{stem}_data.{}", format.extension())
}

fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "export".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Storage key for a task's export, scoped to the task's owner
pub fn storage_key(owner: &str, task_id: &str, filename: &str) -> String {
    format!("exports/{owner}/{task_id}/{filename}")
}

/// An encoded export ready to hand to the user. `filename` is what the user
/// sees; `key` is where the copy was saved.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub key: String,
    pub filename: String,
    pub format: ExportFormat,
    pub content: Bytes,
}

/// Encodes rows and saves them through [`StorageClient`]
#[derive(Clone)]
pub struct Exporter {
    storage: StorageClient,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
}

impl Exporter {
    pub fn new(storage: StorageClient, notifier: Arc<dyn Notifier>, metrics: Arc<Metrics>) -> Self {
        Self {
            storage,
            notifier,
            metrics,
        }
    }

    /// Encode `task`'s rows and save them under the task's owner; failures are
    /// reported as a notification and returned
    pub async fn export(
        &self,
        task: &Task,
        rows: &[ResultRow],
        format: ExportFormat,
    ) -> Result<ExportedFile> {
        match self.write(task, rows, format).await {
            Ok(file) => {
                info!(key = %file.key, size = file.content.len(), "Export written");
                self.metrics.export_written();
                self.notifier.notify(Notification::export_finished(format.as_str()));
                Ok(file)
            }
            Err(err) => {
                warn!(task_id = %task.id, website = %task.website, %format, %err, "Export failed");
                self.notifier
                    .notify(Notification::error("Download failed", err.to_string()));
                Err(err)
            }
        }
    }

    async fn write(&self, task: &Task, rows: &[ResultRow], format: ExportFormat) -> Result<ExportedFile> {
        let content = Bytes::from(encode(rows, format)?);
        let filename = filename(&task.website, format);
        let key = storage_key(&task.user_id, &task.id, &filename);
        self.storage.put(&key, content.clone()).await?;
        Ok(ExportedFile {
            key,
            filename,
            format,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChannelNotifier, Level};
    use serde_json::json;

    fn task(owner: &str, id: &str, website: &str) -> Task {
        serde_json::from_value(json!({
            "id": id, "userId": owner, "website": website, "status": "completed",
            "createdAt": "2024-05-01T10:00:00Z",
        }))
        .unwrap()
    }

    fn rows() -> Vec<ResultRow> {
        vec![
            json!({"id": "result-1", "title": "Amazon Item 1", "reviews": 131}),
            json!({"id": "result-2", "title": "Say \"hi\""}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    #[test]
    fn test_csv_layout() {
        let csv = encode(&rows(), ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,title,reviews");
        assert_eq!(lines[1], r#""result-1","Amazon Item 1",131"#);
        assert_eq!(lines[2], r#""result-2","Say \"hi\"","#);
    }

    #[test]
    fn test_excel_matches_csv_text() {
        assert_eq!(
            encode(&rows(), ExportFormat::Excel).unwrap(),
            encode(&rows(), ExportFormat::Csv).unwrap()
        );
    }

    #[test]
    fn test_json_parses_back() {
        let text = encode(&rows(), ExportFormat::Json).unwrap();
        assert!(text.contains('\n'));
        let parsed: Vec<ResultRow> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, rows());
    }

    #[test]
    fn test_empty_rows() {
        assert!(matches!(encode(&[], ExportFormat::Json), Err(ExportError::Empty)));
    }

    #[test]
    fn test_filenames() {
        assert_eq!(filename("Amazon", ExportFormat::Csv), "amazon_data.csv");
        assert_eq!(filename("Google Search", ExportFormat::Excel), "google_data.xlsx");
        assert_eq!(filename("My Shop!", ExportFormat::Json), "my_shop_data.json");
        assert_eq!(filename("???", ExportFormat::Json), "export_data.json");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("xlsx".parse::<ExportFormat>().unwrap(), ExportFormat::Excel);
        assert!("pdf".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Excel.mime().essence_str(), XLSX_MIME);
    }

    #[tokio::test]
    async fn test_export_saves_and_notifies() {
        let storage = StorageClient::in_memory();
        let (notifier, mut rx) = ChannelNotifier::new();
        let metrics = Arc::new(Metrics::new());
        let exporter = Exporter::new(storage.clone(), Arc::new(notifier), metrics.clone());

        let file = exporter
            .export(&task("u1", "t1", "eBay"), &rows(), ExportFormat::Json)
            .await
            .unwrap();
        assert_eq!(file.filename, "ebay_data.json");
        assert_eq!(file.key, "exports/u1/t1/ebay_data.json");
        assert_eq!(storage.get(&file.key).await.unwrap(), file.content);
        assert!(!storage.exists("ebay_data.json").await.unwrap());
        assert_eq!(rx.recv().await.unwrap().level, Level::Success);
        assert_eq!(metrics.snapshot().exports_written, 1);
    }

    #[tokio::test]
    async fn test_failed_export_writes_nothing() {
        let storage = StorageClient::in_memory();
        let (notifier, mut rx) = ChannelNotifier::new();
        let exporter = Exporter::new(storage.clone(), Arc::new(notifier), Arc::new(Metrics::new()));

        let result = exporter.export(&task("u1", "t1", "eBay"), &[], ExportFormat::Csv).await;
        assert!(result.is_err());
        assert!(!storage.exists("exports/u1/t1/ebay_data.csv").await.unwrap());
        assert_eq!(rx.recv().await.unwrap().level, Level::Error);
    }

    #[tokio::test]
    async fn test_same_site_exports_stay_separate() {
        let storage = StorageClient::in_memory();
        let (notifier, _rx) = ChannelNotifier::new();
        let exporter = Exporter::new(storage.clone(), Arc::new(notifier), Arc::new(Metrics::new()));

        let alice = exporter
            .export(&task("alice", "t1", "Amazon"), &rows(), ExportFormat::Json)
            .await
            .unwrap();
        let bob = exporter
            .export(&task("bob", "t2", "Amazon"), &rows()[..1], ExportFormat::Json)
            .await
            .unwrap();

        assert_eq!(alice.filename, bob.filename);
        assert_ne!(alice.key, bob.key);
        assert_eq!(storage.get(&alice.key).await.unwrap(), alice.content);
        assert_eq!(storage.get(&bob.key).await.unwrap(), bob.content);
        assert_ne!(alice.content, bob.content);
    }
}
