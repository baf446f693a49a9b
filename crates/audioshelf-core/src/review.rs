//! Duplicate review session: the state behind a duplicate view, driven by
//! [`ReviewCommand`]s through a single [`ReviewSession::update`] function.
//!
//! The session does no I/O. Every request it needs is returned as a
//! [`ReviewEffect`]; the caller performs it and feeds the result back as a
//! command carrying the same sequence number.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::deletion::DeletionReport;
use crate::dedup::{DuplicateGroup, DuplicateSummary, EquivalenceMode, sort_groups_deterministically};
use crate::models::{HashStats, RecordId};
use crate::selection::SelectionTracker;

/// Why a catalog request behind the view failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Transport failure; the user may retry.
    #[error("catalog service unreachable: {0}")]
    Unreachable(String),

    /// The answer broke the catalog contract.
    #[error("malformed response from catalog service: {0}")]
    BadResponse(String),

    #[error("catalog service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewCommand {
    /// Load (or reload) the view for a mode.
    Open(EquivalenceMode),
    /// Reload the current mode.
    Refresh,
    GroupsLoaded {
        seq: u64,
        result: Result<Vec<DuplicateGroup>, LoadError>,
    },
    StatsLoaded(Result<HashStats, LoadError>),
    Toggle(RecordId),
    SelectAllDeletable,
    ClearSelection,
    /// Submit the current selection for deletion.
    Confirm,
    DeletionFinished {
        seq: u64,
        result: Result<DeletionReport, LoadError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEffect {
    FetchGroups {
        seq: u64,
        mode: EquivalenceMode,
    },
    FetchStats,
    SubmitDeletion {
        seq: u64,
        mode: EquivalenceMode,
        ids: BTreeSet<RecordId>,
    },
    Notify(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(LoadError),
}

#[derive(Debug, Default)]
pub struct ReviewSession {
    mode: EquivalenceMode,
    groups: Vec<DuplicateGroup>,
    summary: DuplicateSummary,
    selection: SelectionTracker,
    status: ViewStatus,
    stats: Option<HashStats>,
    last_report: Option<DeletionReport>,
    next_seq: u64,
    pending_fetch: Option<u64>,
    pending_delete: Option<u64>,
}

impl ReviewSession {
    pub fn new(mode: EquivalenceMode) -> Self {
        Self {
            mode,
            summary: DuplicateSummary {
                mode,
                ..DuplicateSummary::default()
            },
            ..Self::default()
        }
    }

    pub fn update(&mut self, command: ReviewCommand) -> Vec<ReviewEffect> {
        match command {
            ReviewCommand::Open(mode) => self.open(mode),
            ReviewCommand::Refresh => self.open(self.mode),
            ReviewCommand::GroupsLoaded { seq, result } => self.groups_loaded(seq, result),
            ReviewCommand::StatsLoaded(result) => match result {
                Ok(stats) => {
                    self.stats = Some(stats);
                    Vec::new()
                }
                Err(err) => vec![ReviewEffect::Notify(Notice::warning(format!(
                    "Could not load hash statistics: {err}"
                )))],
            },
            ReviewCommand::Toggle(id) => {
                if let Some(effect) = self.reject_while_busy().or_else(|| self.reject_unless_ready()) {
                    return vec![effect];
                }
                match self.selection.toggle_visible(id, &self.groups) {
                    Ok(_) => Vec::new(),
                    Err(err) => vec![ReviewEffect::Notify(Notice::warning(err.to_string()))],
                }
            }
            ReviewCommand::SelectAllDeletable => {
                if let Some(effect) = self.reject_while_busy().or_else(|| self.reject_unless_ready()) {
                    return vec![effect];
                }
                self.selection.select_all_deletable(&self.groups);
                Vec::new()
            }
            ReviewCommand::ClearSelection => {
                if let Some(effect) = self.reject_while_busy() {
                    return vec![effect];
                }
                self.selection.clear();
                Vec::new()
            }
            ReviewCommand::Confirm => self.confirm(),
            ReviewCommand::DeletionFinished { seq, result } => self.deletion_finished(seq, result),
        }
    }

    fn open(&mut self, mode: EquivalenceMode) -> Vec<ReviewEffect> {
        let seq = self.bump_seq();
        self.mode = mode;
        self.selection.clear();
        self.groups.clear();
        self.summary = DuplicateSummary::from_groups(mode, &[]);
        self.status = ViewStatus::Loading;
        self.pending_fetch = Some(seq);
        vec![ReviewEffect::FetchGroups { seq, mode }]
    }

    fn groups_loaded(&mut self, seq: u64, result: Result<Vec<DuplicateGroup>, LoadError>) -> Vec<ReviewEffect> {
        if self.pending_fetch != Some(seq) {
            debug!(seq, pending = ?self.pending_fetch, "discarding stale duplicate view");
            return Vec::new();
        }
        self.pending_fetch = None;
        self.selection.clear();

        let groups = result.and_then(|groups| {
            for group in &groups {
                if group.mode != self.mode {
                    return Err(LoadError::BadResponse(format!(
                        "received '{}' groups for a '{}' view",
                        group.mode, self.mode
                    )));
                }
                group
                    .validate()
                    .map_err(|e| LoadError::BadResponse(e.to_string()))?;
            }
            Ok(groups)
        });

        match groups {
            Ok(mut groups) => {
                sort_groups_deterministically(&mut groups);
                self.summary = DuplicateSummary::from_groups(self.mode, &groups);
                self.groups = groups;
                self.status = ViewStatus::Ready;
                Vec::new()
            }
            Err(err) => {
                self.groups.clear();
                self.summary = DuplicateSummary::from_groups(self.mode, &[]);
                let notice = Notice::error(format!("Error loading duplicates: {err}"));
                self.status = ViewStatus::Failed(err);
                vec![ReviewEffect::Notify(notice)]
            }
        }
    }

    fn confirm(&mut self) -> Vec<ReviewEffect> {
        if self.pending_delete.is_some() {
            return vec![ReviewEffect::Notify(Notice::warning(
                "A deletion is already in progress",
            ))];
        }
        if let Some(effect) = self.reject_unless_ready() {
            return vec![effect];
        }
        if self.selection.is_empty() {
            return Vec::new();
        }
        let seq = self.bump_seq();
        self.pending_delete = Some(seq);
        vec![ReviewEffect::SubmitDeletion {
            seq,
            mode: self.mode,
            ids: self.selection.snapshot(),
        }]
    }

    fn deletion_finished(&mut self, seq: u64, result: Result<DeletionReport, LoadError>) -> Vec<ReviewEffect> {
        if self.pending_delete != Some(seq) {
            debug!(seq, pending = ?self.pending_delete, "discarding unexpected deletion result");
            return Vec::new();
        }
        self.pending_delete = None;
        self.selection.clear();

        let notice = match result {
            Ok(report) => {
                let notice = if report.failed.is_empty() {
                    Notice::info(report.summary())
                } else {
                    Notice::warning(report.summary())
                };
                self.last_report = Some(report);
                notice
            }
            Err(err) => Notice::error(format!("Deletion failed: {err}")),
        };

        let mut effects = vec![ReviewEffect::Notify(notice)];
        effects.extend(self.open(self.mode));
        effects.push(ReviewEffect::FetchStats);
        effects
    }

    fn reject_while_busy(&self) -> Option<ReviewEffect> {
        self.pending_delete.map(|_| {
            ReviewEffect::Notify(Notice::warning("Selection is locked while a deletion is in progress"))
        })
    }

    /// Selection and confirm only act on a view that finished loading.
    fn reject_unless_ready(&self) -> Option<ReviewEffect> {
        (self.status != ViewStatus::Ready).then(|| {
            ReviewEffect::Notify(Notice::warning("The duplicate view is not loaded yet"))
        })
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    pub fn mode(&self) -> EquivalenceMode {
        self.mode
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    pub fn summary(&self) -> &DuplicateSummary {
        &self.summary
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    pub fn stats(&self) -> Option<&HashStats> {
        self.stats.as_ref()
    }

    pub fn last_report(&self) -> Option<&DeletionReport> {
        self.last_report.as_ref()
    }

    /// True while a deletion batch is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending_delete.is_some()
    }
}
