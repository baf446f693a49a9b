//! Content hashing: SHA-256 of each audiobook file, stored in the catalog so
//! exact-content duplicates can be grouped.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::HashingConfig;
use crate::error::Result;
use crate::models::{AudiobookRecord, RecordId};
use crate::storage::Database;

/// Lowercase hex SHA-256 of the file at `path`, read `chunk_size` bytes at a time.
pub fn sha256_file(path: &Path, chunk_size: usize) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HashRunOptions {
    /// Rehash records that already have a hash.
    pub force: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashError {
    pub id: RecordId,
    pub file_path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashRunReport {
    pub pending: usize,
    pub hashed: usize,
    pub bytes_hashed: u64,
    pub errors: Vec<HashError>,
    pub elapsed_secs: f64,
}

impl HashRunReport {
    pub fn processed(&self) -> usize {
        self.hashed + self.errors.len()
    }
}

/// One step of a hashing run, for progress display.
#[derive(Debug)]
pub struct HashProgress<'a> {
    pub index: usize,
    pub total: usize,
    pub record: &'a AudiobookRecord,
}

pub struct HashGenerator<'a> {
    db: &'a Database,
    config: &'a HashingConfig,
}

impl<'a> HashGenerator<'a> {
    pub fn new(db: &'a Database, config: &'a HashingConfig) -> Self {
        Self { db, config }
    }

    /// Hashes pending records, smallest files first, storing each hash as it
    /// is computed so an interrupted run can resume. Unreadable files are
    /// reported and skipped.
    pub fn run<F>(&self, options: HashRunOptions, mut on_progress: F) -> Result<HashRunReport>
    where
        F: FnMut(HashProgress<'_>),
    {
        let started = Instant::now();
        let pending = self.db.list_pending_hash(options.force, options.limit)?;
        let mut report = HashRunReport {
            pending: pending.len(),
            ..HashRunReport::default()
        };
        info!(pending = pending.len(), force = options.force, "starting hash generation");

        for (index, record) in pending.iter().enumerate() {
            on_progress(HashProgress {
                index: index + 1,
                total: pending.len(),
                record,
            });

            let path = Path::new(&record.file_path);
            if !path.exists() {
                warn!(id = %record.id, path = %record.file_path, "file not found");
                report.errors.push(HashError {
                    id: record.id,
                    file_path: record.file_path.clone(),
                    message: "file not found".to_string(),
                });
                continue;
            }

            match sha256_file(path, self.config.chunk_size_bytes) {
                Ok(hash) => {
                    self.db.update_hash(record.id, &hash)?;
                    debug!(id = %record.id, %hash, "hashed");
                    report.hashed += 1;
                    report.bytes_hashed += record.file_size_bytes;
                }
                Err(e) => {
                    warn!(id = %record.id, error = %e, "could not hash file");
                    report.errors.push(HashError {
                        id: record.id,
                        file_path: record.file_path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report.elapsed_secs = started.elapsed().as_secs_f64();
        info!(hashed = report.hashed, errors = report.errors.len(), "hash generation finished");
        Ok(report)
    }

    /// Rehashes a random sample of already-hashed records and compares.
    pub fn verify_sample(&self, size: usize) -> Result<VerifyReport> {
        let mut report = VerifyReport::default();
        for record in self.db.sample_hashed(size)? {
            report.checked += 1;
            let stored = record.content_hash.as_deref().unwrap_or_default();
            match sha256_file(Path::new(&record.file_path), self.config.chunk_size_bytes) {
                Ok(actual) if actual.eq_ignore_ascii_case(stored.trim()) => report.passed += 1,
                Ok(actual) => {
                    warn!(id = %record.id, expected = %stored, %actual, "hash mismatch");
                    report.mismatched.push(record.id);
                }
                Err(e) => {
                    warn!(id = %record.id, error = %e, "file unreadable during verification");
                    report.missing.push(record.id);
                }
            }
        }
        Ok(report)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub passed: usize,
    pub mismatched: Vec<RecordId>,
    pub missing: Vec<RecordId>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}
