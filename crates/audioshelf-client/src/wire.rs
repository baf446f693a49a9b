//! JSON shapes exchanged with the catalog service, and their conversion to
//! and from the core model.

use std::collections::BTreeSet;

use audioshelf_core::dedup::{GroupError, equivalence_key};
use audioshelf_core::units::{bytes_to_mb_rounded, mb_to_bytes};
use audioshelf_core::{
    AudioFormat, AudiobookRecord, DuplicateGroup, DuplicateSummary, EquivalenceMode, KeeperPolicy,
    LibraryStats, RecordId,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicatesResponse {
    #[serde(default)]
    pub total_groups: usize,
    #[serde(default)]
    pub total_duplicate_files: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_wasted_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_potential_savings_mb: Option<f64>,
    pub duplicate_groups: Vec<WireGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasted_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_savings_mb: Option<f64>,
    pub files: Vec<WireFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireFile {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrator: Option<String>,
    #[serde(default)]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_formatted: Option<String>,
    #[serde(default)]
    pub file_size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition_count: Option<u32>,
    pub is_keeper: bool,
}

impl DuplicatesResponse {
    /// Converts and revalidates every group. The first group that breaks the
    /// one-keeper rule rejects the whole response.
    pub fn into_groups(self, mode: EquivalenceMode) -> Result<Vec<DuplicateGroup>> {
        self.duplicate_groups
            .into_iter()
            .map(|g| g.into_group(mode))
            .collect()
    }

    pub fn from_groups(mode: EquivalenceMode, groups: &[DuplicateGroup]) -> Self {
        let summary = DuplicateSummary::from_groups(mode, groups);
        let total_mb = bytes_to_mb_rounded(summary.total_wasted_or_savable_bytes);
        let (total_wasted_mb, total_potential_savings_mb) = match mode {
            EquivalenceMode::ExactContent => (Some(total_mb), None),
            EquivalenceMode::TitleAuthor => (None, Some(total_mb)),
        };
        Self {
            total_groups: summary.total_groups,
            total_duplicate_files: summary.total_duplicate_files,
            total_wasted_mb,
            total_potential_savings_mb,
            duplicate_groups: groups.iter().map(WireGroup::from_group).collect(),
        }
    }
}

impl WireGroup {
    pub fn into_group(self, mode: EquivalenceMode) -> Result<DuplicateGroup> {
        let label = self.title.clone().unwrap_or_else(|| {
            self.files.first().map(|f| f.title.clone()).unwrap_or_default()
        });

        let keepers: Vec<RecordId> = self
            .files
            .iter()
            .filter(|f| f.is_keeper)
            .map(|f| RecordId(f.id))
            .collect();
        let &[keeper_id] = keepers.as_slice() else {
            return Err(bad_group(GroupError::KeeperCount {
                title: label,
                found: keepers.len(),
            }));
        };

        let hash = self.hash.filter(|h| !h.trim().is_empty());
        let members: Vec<AudiobookRecord> = self
            .files
            .into_iter()
            .map(|f| f.into_record(hash.as_deref()))
            .collect();

        let key = match (mode, hash) {
            (EquivalenceMode::ExactContent, Some(hash)) => hash.to_ascii_lowercase(),
            _ => members
                .iter()
                .find(|m| m.id == keeper_id)
                .and_then(|keeper| equivalence_key(keeper, mode))
                .unwrap_or_else(|| label.to_lowercase()),
        };

        let group = DuplicateGroup::with_keeper(mode, key, members, keeper_id).map_err(bad_group)?;

        // The local keeper policy wins; the service still guards its own pick.
        match KeeperPolicy.select(&group.members) {
            Some(preferred) if preferred != keeper_id => {
                warn!(
                    title = %group.title,
                    service_keeper = %keeper_id,
                    %preferred,
                    "service keeper disagrees with keeper policy"
                );
                DuplicateGroup::with_keeper(mode, group.key, group.members, preferred).map_err(bad_group)
            }
            _ => Ok(group),
        }
    }

    pub fn from_group(group: &DuplicateGroup) -> Self {
        let savings = Some(bytes_to_mb_rounded(group.wasted_or_savable_bytes));
        let (wasted_mb, potential_savings_mb) = match group.mode {
            EquivalenceMode::ExactContent => (savings, None),
            EquivalenceMode::TitleAuthor => (None, savings),
        };
        let keeper = group.keeper();
        Self {
            hash: match group.mode {
                EquivalenceMode::ExactContent => Some(group.key.clone()),
                EquivalenceMode::TitleAuthor => None,
            },
            title: Some(group.title.clone()),
            author: keeper.map(|k| k.author.clone()),
            count: group.count(),
            wasted_mb,
            potential_savings_mb,
            files: group
                .members
                .iter()
                .map(|m| WireFile::from_record(m, group.is_keeper(m.id)))
                .collect(),
        }
    }
}

impl WireFile {
    fn into_record(self, group_hash: Option<&str>) -> AudiobookRecord {
        AudiobookRecord {
            id: RecordId(self.id),
            title: self.title,
            author: self.author.unwrap_or_default(),
            narrator: self.narrator,
            format: self
                .format
                .as_deref()
                .map(AudioFormat::from_extension)
                .unwrap_or_default(),
            duration_seconds: self
                .duration_formatted
                .as_deref()
                .map(parse_duration_formatted)
                .unwrap_or(0),
            file_size_bytes: self.file_size_mb.map(mb_to_bytes).unwrap_or(0),
            file_path: self.file_path,
            content_hash: group_hash.map(str::to_string),
            edition_count: self.edition_count.unwrap_or(1),
            supplement_count: 0,
        }
    }

    fn from_record(record: &AudiobookRecord, is_keeper: bool) -> Self {
        Self {
            id: record.id.0,
            title: record.title.clone(),
            author: Some(record.author.clone()),
            narrator: record.narrator.clone(),
            file_path: record.file_path.clone(),
            format: Some(record.format.to_string()),
            duration_formatted: Some(record.duration_formatted()),
            file_size_mb: Some(bytes_to_mb_rounded(record.file_size_bytes)),
            edition_count: Some(record.edition_count),
            is_keeper,
        }
    }
}

fn bad_group(err: GroupError) -> ClientError {
    ClientError::BadResponse(err.to_string())
}

/// Parses `"12h 5m"`; anything unrecognised counts as zero.
fn parse_duration_formatted(text: &str) -> u64 {
    text.split_whitespace()
        .map(|part| {
            if let Some(h) = part.strip_suffix('h') {
                h.parse::<u64>().unwrap_or(0) * 3600
            } else if let Some(m) = part.strip_suffix('m') {
                m.parse::<u64>().unwrap_or(0) * 60
            } else if let Some(s) = part.strip_suffix('s') {
                s.parse::<u64>().unwrap_or(0)
            } else {
                0
            }
        })
        .sum()
}

// ─── Deletion ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub audiobook_ids: Vec<i64>,
    pub mode: EquivalenceMode,
}

impl DeleteRequest {
    pub fn new(ids: &BTreeSet<RecordId>, mode: EquivalenceMode) -> Self {
        Self {
            audiobook_ids: ids.iter().map(|id| id.0).collect(),
            mode,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub deleted_count: usize,
    #[serde(default)]
    pub deleted_files: Vec<DeletedFile>,
    #[serde(default)]
    pub blocked_count: usize,
    #[serde(default)]
    pub blocked_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default)]
    pub errors: Vec<DeleteErrorEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeletedFile {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteErrorEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    pub error: String,
}

// ─── Stats ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub total_audiobooks: usize,
    #[serde(default)]
    pub total_hours: f64,
    #[serde(default)]
    pub total_size_mb: Option<f64>,
    #[serde(default)]
    pub unique_authors: usize,
    #[serde(default)]
    pub unique_narrators: usize,
}

impl From<StatsResponse> for LibraryStats {
    fn from(stats: StatsResponse) -> Self {
        LibraryStats {
            total_audiobooks: stats.total_audiobooks,
            total_hours: stats.total_hours.max(0.0).round() as u64,
            total_size_bytes: stats.total_size_mb.map(mb_to_bytes).unwrap_or(0),
            unique_authors: stats.unique_authors,
            unique_narrators: stats.unique_narrators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_GROUPS: &str = r#"{
        "total_groups": 1,
        "total_duplicate_files": 1,
        "total_wasted_mb": 1.0,
        "duplicate_groups": [{
            "hash": "ABC123",
            "count": 2,
            "file_size_mb": 1.0,
            "wasted_mb": 1.0,
            "files": [
                {"id": 4, "title": "Dune", "author": "Frank Herbert", "file_path": "/a/dune.m4b",
                 "format": "m4b", "duration_formatted": "21h 2m", "file_size_mb": 1.0, "is_keeper": true},
                {"id": 9, "title": "Dune", "author": "Frank Herbert", "file_path": "/b/dune.m4b",
                 "format": "m4b", "duration_formatted": "21h 2m", "file_size_mb": 1.0, "is_keeper": false}
            ]
        }]
    }"#;

    #[test]
    fn test_hash_groups_convert() {
        let resp: DuplicatesResponse = serde_json::from_str(HASH_GROUPS).unwrap();
        let groups = resp.into_groups(EquivalenceMode::ExactContent).unwrap();

        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.key, "abc123");
        assert_eq!(g.keeper_id, RecordId(4));
        assert_eq!(g.wasted_or_savable_bytes, 1024 * 1024);
        assert_eq!(g.members[1].duration_seconds, 21 * 3600 + 2 * 60);
        assert_eq!(g.members[0].format, AudioFormat::M4b);
    }

    #[test]
    fn test_two_keepers_rejected() {
        let json = HASH_GROUPS.replace(r#""is_keeper": false"#, r#""is_keeper": true"#);
        let resp: DuplicatesResponse = serde_json::from_str(&json).unwrap();
        let err = resp.into_groups(EquivalenceMode::ExactContent).unwrap_err();
        assert!(matches!(err, ClientError::BadResponse(msg) if msg.contains("2 keepers")));
    }

    #[test]
    fn test_keeper_policy_overrides_service_pick() {
        let json = HASH_GROUPS
            .replace(r#""is_keeper": true"#, r#""is_keeper": "swap""#)
            .replace(r#""is_keeper": false"#, r#""is_keeper": true"#)
            .replace(r#""is_keeper": "swap""#, r#""is_keeper": false"#);
        let resp: DuplicatesResponse = serde_json::from_str(&json).unwrap();
        let groups = resp.into_groups(EquivalenceMode::ExactContent).unwrap();
        assert_eq!(groups[0].keeper_id, RecordId(4));
        assert_eq!(groups[0].deletable_ids().collect::<Vec<_>>(), vec![RecordId(9)]);
    }

    #[test]
    fn test_no_keeper_rejected() {
        let json = HASH_GROUPS.replace(r#""is_keeper": true"#, r#""is_keeper": false"#);
        let resp: DuplicatesResponse = serde_json::from_str(&json).unwrap();
        assert!(resp.into_groups(EquivalenceMode::ExactContent).is_err());
    }

    #[test]
    fn test_single_member_group_rejected() {
        let json = r#"{"duplicate_groups": [{"title": "Solo", "count": 1,
            "files": [{"id": 1, "title": "Solo", "is_keeper": true}]}]}"#;
        let resp: DuplicatesResponse = serde_json::from_str(json).unwrap();
        assert!(resp.into_groups(EquivalenceMode::TitleAuthor).is_err());
    }

    #[test]
    fn test_title_groups_use_potential_savings_on_export() {
        let records = vec![
            AudiobookRecord::new(1, "Emma", "Jane Austen").with_size(mb_to_bytes(2.0)),
            AudiobookRecord::new(2, "Emma", "Jane Austen").with_size(mb_to_bytes(3.0)),
        ];
        let groups = audioshelf_core::compute_groups(&records, EquivalenceMode::TitleAuthor);
        let resp = DuplicatesResponse::from_groups(EquivalenceMode::TitleAuthor, &groups);

        assert_eq!(resp.total_potential_savings_mb, Some(3.0));
        assert_eq!(resp.total_wasted_mb, None);
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("total_wasted_mb").is_none());
        assert_eq!(value["duplicate_groups"][0]["files"][0]["is_keeper"], true);

        let back = resp.into_groups(EquivalenceMode::TitleAuthor).unwrap();
        assert_eq!(back[0].keeper_id, RecordId(1));
    }

    #[test]
    fn test_delete_response_defaults() {
        let resp: DeleteResponse =
            serde_json::from_str(r#"{"success": true, "deleted_count": 0, "blocked_count": 0, "errors": []}"#)
                .unwrap();
        assert!(resp.deleted_files.is_empty());
        assert!(resp.blocked_ids.is_empty());
    }

    #[test]
    fn test_parse_duration_formatted() {
        assert_eq!(parse_duration_formatted("1h 30m"), 5400);
        assert_eq!(parse_duration_formatted("45m"), 2700);
        assert_eq!(parse_duration_formatted("n/a"), 0);
    }
}
