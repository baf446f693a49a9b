//! Import of the library scanner's JSON export into the catalog.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{AudioFormat, NewAudiobook};
use crate::storage::Database;
use crate::storage::repositories::AudiobookRepository;
use crate::units::mb_to_bytes;

const UNKNOWN_NARRATOR: &str = "Unknown Narrator";

/// Top-level shape of the scanner export: `{ "audiobooks": [...] }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScannerExport {
    #[serde(default)]
    pub audiobooks: Vec<ScannedAudiobook>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScannedAudiobook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub format: Option<String>,
    pub duration_hours: Option<f64>,
    pub file_size_mb: Option<f64>,
    pub file_path: Option<String>,
    pub sha256_hash: Option<String>,
    pub edition_count: Option<u32>,
    pub supplement_count: Option<u32>,
    pub genres: Vec<String>,
}

impl ScannedAudiobook {
    /// `None` when the entry has no file path.
    fn into_new_audiobook(self) -> Option<NewAudiobook> {
        let file_path = self.file_path.filter(|p| !p.trim().is_empty())?;
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| {
                Path::new(&file_path)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default()
            });

        let mut book = NewAudiobook::new(title, self.author.unwrap_or_default(), file_path);
        book.narrator = self
            .narrator
            .filter(|n| !n.trim().is_empty() && n != UNKNOWN_NARRATOR);
        if let Some(format) = self.format.as_deref() {
            book.format = AudioFormat::from_extension(format);
        }
        book.duration_seconds = self
            .duration_hours
            .filter(|h| h.is_finite() && *h > 0.0)
            .map(|h| (h * 3600.0).round() as u64)
            .unwrap_or(0);
        book.file_size_bytes = self.file_size_mb.map(mb_to_bytes).unwrap_or(0);
        book.content_hash = self
            .sha256_hash
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty());
        book.edition_count = self.edition_count.unwrap_or(1);
        book.supplement_count = self.supplement_count.unwrap_or(0);
        book.genres = self.genres;
        Some(book)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Clear the catalog first, carrying narrators and genres over by file path.
    pub replace: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped_existing: usize,
    pub skipped_invalid: usize,
    pub preserved_metadata: usize,
}

pub fn import_file(db: &Database, path: &Path, options: ImportOptions) -> Result<ImportReport> {
    let contents = std::fs::read_to_string(path)?;
    let export: ScannerExport = serde_json::from_str(&contents)?;
    info!(path = %path.display(), entries = export.audiobooks.len(), "importing scanner export");
    import_export(db, export, options)
}

/// Imports `export` in one transaction: a failed insert leaves the catalog
/// exactly as it was, including in replace mode.
pub fn import_export(db: &Database, export: ScannerExport, options: ImportOptions) -> Result<ImportReport> {
    let report = db.in_transaction(|repo| {
        let mut report = ImportReport::default();

        // narrator, genres
        let mut preserved: HashMap<String, (Option<String>, Vec<String>)> = HashMap::new();
        if options.replace {
            for record in repo.list_all()? {
                let genres = repo.genres(&record.id)?;
                if record.narrator.is_some() || !genres.is_empty() {
                    preserved.insert(record.file_path.clone(), (record.narrator.clone(), genres));
                }
            }
            let removed = repo.clear()?;
            info!(removed, preserved = preserved.len(), "clearing catalog before import");
        }

        for entry in export.audiobooks {
            let Some(mut book) = entry.into_new_audiobook() else {
                warn!("skipping scanner entry without a file path");
                report.skipped_invalid += 1;
                continue;
            };

            if let Some((narrator, genres)) = preserved.remove(&book.file_path) {
                if narrator.is_some() {
                    book.narrator = narrator;
                }
                if !genres.is_empty() {
                    book.genres = genres;
                }
                report.preserved_metadata += 1;
            } else if !options.replace && repo.exists_path(&book.file_path)? {
                report.skipped_existing += 1;
                continue;
            }

            repo.insert(&book)?;
            report.imported += 1;
        }
        Ok(report)
    })?;

    info!(
        imported = report.imported,
        skipped_existing = report.skipped_existing,
        skipped_invalid = report.skipped_invalid,
        "import finished"
    );
    Ok(report)
}
