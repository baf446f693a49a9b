use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use audioshelf_core::config::RemoteConfig;
use audioshelf_core::{
    BlockReason, CatalogStore, DeleteFailure, DeletionCoordinator, DeletionReport, DuplicateGroup,
    EquivalenceMode, HashStats, LibraryStats, RecordId,
};
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::http::ApiClient;
use crate::wire::{DeleteRequest, DeleteResponse, DuplicatesResponse, StatsResponse};

/// Operations the duplicate review needs from a catalog.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_groups(&self, mode: EquivalenceMode) -> Result<Vec<DuplicateGroup>>;

    async fn fetch_hash_stats(&self) -> Result<HashStats>;

    async fn fetch_library_stats(&self) -> Result<LibraryStats>;

    /// Deletes `ids`, checked against the `groups` the user was looking at.
    /// The report partitions `ids`.
    async fn request_deletion(
        &self,
        ids: &BTreeSet<RecordId>,
        mode: EquivalenceMode,
        groups: &[DuplicateGroup],
    ) -> Result<DeletionReport>;
}

pub struct CatalogClient {
    api: ApiClient,
}

impl CatalogClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let api = ApiClient::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )?;
        Ok(Self { api })
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(&RemoteConfig {
            base_url: base_url.to_string(),
            ..RemoteConfig::default()
        })
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    fn groups_path(mode: EquivalenceMode) -> &'static str {
        match mode {
            EquivalenceMode::ExactContent => "duplicates",
            EquivalenceMode::TitleAuthor => "duplicates/by-title",
        }
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn fetch_groups(&self, mode: EquivalenceMode) -> Result<Vec<DuplicateGroup>> {
        let resp: DuplicatesResponse = self.api.get_json(Self::groups_path(mode)).await?;
        let groups = resp.into_groups(mode)?;
        info!(%mode, groups = groups.len(), "fetched duplicate groups");
        Ok(groups)
    }

    async fn fetch_hash_stats(&self) -> Result<HashStats> {
        self.api.get_json("hash-stats").await
    }

    async fn fetch_library_stats(&self) -> Result<LibraryStats> {
        let stats: StatsResponse = self.api.get_json("stats").await?;
        Ok(stats.into())
    }

    async fn request_deletion(
        &self,
        ids: &BTreeSet<RecordId>,
        mode: EquivalenceMode,
        groups: &[DuplicateGroup],
    ) -> Result<DeletionReport> {
        let plan = DeletionCoordinator::new(ViewMembership(groups)).plan(ids, groups);
        if plan.to_delete.is_empty() {
            return Ok(DeletionReport {
                blocked: plan.blocked,
                ..DeletionReport::default()
            });
        }

        let resp: DeleteResponse = self
            .api
            .post_json("duplicates/delete", &DeleteRequest::new(&plan.to_delete, mode))
            .await?;

        if !resp.success {
            if resp.deleted_files.is_empty() && resp.blocked_ids.is_empty() && resp.errors.is_empty() {
                return Err(ClientError::BadResponse(
                    "deletion reported as unsuccessful without any per-record detail".to_string(),
                ));
            }
            warn!(
                deleted = resp.deleted_files.len(),
                errors = resp.errors.len(),
                "service reported the deletion as unsuccessful"
            );
        }

        let mut report = reconcile(&plan.to_delete, resp, groups);
        report.blocked.extend(plan.blocked);
        info!(
            deleted = report.deleted_count(),
            blocked = report.blocked_count(),
            failed = report.failed_count(),
            "remote deletion finished"
        );
        Ok(report)
    }
}

/// Liveness as of the loaded view: a record is live while some group lists it.
struct ViewMembership<'a>(&'a [DuplicateGroup]);

impl CatalogStore for ViewMembership<'_> {
    fn contains(&self, id: RecordId) -> std::result::Result<bool, DeleteFailure> {
        Ok(self.0.iter().any(|g| g.contains(id)))
    }

    fn remove(&self, _id: RecordId) -> std::result::Result<(), DeleteFailure> {
        Err(DeleteFailure::Other("the loaded view is read-only".to_string()))
    }
}

/// Maps the service's answer onto `sent`. Ids the service did not mention
/// are reported as not found; ids it mentions but that were never sent are
/// ignored.
pub fn reconcile(sent: &BTreeSet<RecordId>, resp: DeleteResponse, groups: &[DuplicateGroup]) -> DeletionReport {
    let mut report = DeletionReport::default();
    let keepers: BTreeSet<RecordId> = groups.iter().map(|g| g.keeper_id).collect();
    let sizes: HashMap<RecordId, u64> = groups
        .iter()
        .flat_map(|g| g.members.iter())
        .map(|m| (m.id, m.file_size_bytes))
        .collect();

    if resp.deleted_count != resp.deleted_files.len() {
        warn!(
            deleted_count = resp.deleted_count,
            listed = resp.deleted_files.len(),
            "service deleted_count disagrees with deleted_files"
        );
    }

    let mut placed = BTreeSet::new();

    for file in &resp.deleted_files {
        if let Some(id) = accept(sent, &mut placed, file.id, "deleted") {
            report.deleted.insert(id);
        }
    }

    for raw in &resp.blocked_ids {
        if let Some(id) = accept(sent, &mut placed, *raw, "blocked") {
            let reason = if keepers.contains(&id) {
                BlockReason::Keeper
            } else {
                BlockReason::LastCopy
            };
            report.blocked.insert(id, reason);
        }
    }

    for entry in &resp.errors {
        let Some(raw) = entry.id else {
            warn!(error = %entry.error, "service reported an error without an id");
            continue;
        };
        if let Some(id) = accept(sent, &mut placed, raw, "failed") {
            report.failed.insert(id, classify_error(&entry.error));
        }
    }

    for id in sent.difference(&placed) {
        warn!(%id, "service did not report on requested id");
        report.failed.insert(*id, DeleteFailure::NotFound);
    }

    report.freed_bytes = report.deleted.iter().filter_map(|id| sizes.get(id)).sum();
    report
}

/// First mention of a sent id wins.
fn accept(sent: &BTreeSet<RecordId>, placed: &mut BTreeSet<RecordId>, raw: i64, what: &str) -> Option<RecordId> {
    let id = RecordId(raw);
    if !sent.contains(&id) {
        warn!(%id, what, "service reported an id that was not requested");
        return None;
    }
    if !placed.insert(id) {
        warn!(%id, what, "service reported an id twice");
        return None;
    }
    Some(id)
}

fn classify_error(message: &str) -> DeleteFailure {
    let lower = message.to_lowercase();
    if lower.contains("permission denied") {
        DeleteFailure::Permission(message.to_string())
    } else if lower.contains("no such file") || lower.contains("not found") {
        DeleteFailure::NotFound
    } else {
        DeleteFailure::Other(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audioshelf_core::AudiobookRecord;
    use mockito::{Matcher, Server};

    fn ids(raw: &[i64]) -> BTreeSet<RecordId> {
        raw.iter().copied().map(RecordId).collect()
    }

    fn view() -> Vec<DuplicateGroup> {
        let records: Vec<AudiobookRecord> = (1..=3)
            .map(|id| AudiobookRecord::new(id, "Dune", "Frank Herbert").with_hash("a").with_size(100))
            .collect();
        audioshelf_core::compute_groups(&records, EquivalenceMode::ExactContent)
    }

    #[tokio::test]
    async fn test_fetch_groups_by_mode() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/duplicates/by-title")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"total_groups": 1, "total_duplicate_files": 1, "total_potential_savings_mb": 1.0,
                    "duplicate_groups": [{"title": "Emma", "count": 2, "potential_savings_mb": 1.0,
                    "files": [
                        {"id": 1, "title": "Emma", "author": "Jane Austen", "file_size_mb": 1.0, "is_keeper": true},
                        {"id": 2, "title": "Emma", "author": "Jane Austen", "file_size_mb": 1.0, "is_keeper": false}
                    ]}]}"#,
            )
            .create_async()
            .await;

        let client = CatalogClient::with_base_url(&server.url()).unwrap();
        let groups = client.fetch_groups(EquivalenceMode::TitleAuthor).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].keeper_id, RecordId(1));
        assert_eq!(groups[0].mode, EquivalenceMode::TitleAuthor);
    }

    #[tokio::test]
    async fn test_fetch_hash_stats() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/hash-stats")
            .with_status(200)
            .with_body(
                r#"{"hash_column_exists": true, "total_audiobooks": 10, "hashed_count": 4,
                    "unhashed_count": 6, "hashed_percentage": 40.0, "duplicate_groups": 1}"#,
            )
            .create_async()
            .await;

        let client = CatalogClient::with_base_url(&server.url()).unwrap();
        let stats = client.fetch_hash_stats().await.unwrap();
        assert_eq!(stats.hashed_count, 4);
        assert!(!stats.is_complete());
    }

    #[tokio::test]
    async fn test_keeper_never_sent_to_service() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/duplicates/delete")
            .match_body(Matcher::Json(serde_json::json!({"audiobook_ids": [2], "mode": "hash"})))
            .with_status(200)
            .with_body(
                r#"{"success": true, "deleted_count": 1,
                    "deleted_files": [{"id": 2, "title": "Dune", "path": "/b.m4b"}],
                    "blocked_count": 0, "blocked_ids": [], "errors": []}"#,
            )
            .create_async()
            .await;

        let client = CatalogClient::with_base_url(&server.url()).unwrap();
        let requested = ids(&[1, 2]);
        let report = client
            .request_deletion(&requested, EquivalenceMode::ExactContent, &view())
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(report.deleted, ids(&[2]));
        assert_eq!(report.blocked.get(&RecordId(1)), Some(&BlockReason::Keeper));
        assert_eq!(report.freed_bytes, 100);
        assert!(report.is_partition_of(&requested));
    }

    #[tokio::test]
    async fn test_only_keeper_requested_skips_request() {
        let server = Server::new_async().await;
        let client = CatalogClient::with_base_url(&server.url()).unwrap();
        let report = client
            .request_deletion(&ids(&[1]), EquivalenceMode::ExactContent, &view())
            .await
            .unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(report.blocked_count(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/duplicates/delete")
            .with_status(500)
            .with_body(r#"{"error": "database is locked"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = CatalogClient::with_base_url(&server.url()).unwrap();
        let err = client
            .request_deletion(&ids(&[2]), EquivalenceMode::ExactContent, &view())
            .await
            .unwrap_err();
        m.assert_async().await;
        assert!(matches!(err, crate::ClientError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unsuccessful_delete_without_detail_is_bad_response() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/duplicates/delete")
            .with_status(200)
            .with_body(r#"{"success": false, "deleted_count": 0, "blocked_count": 0, "errors": []}"#)
            .create_async()
            .await;

        let client = CatalogClient::with_base_url(&server.url()).unwrap();
        let err = client
            .request_deletion(&ids(&[2]), EquivalenceMode::ExactContent, &view())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::BadResponse(_)));
    }

    #[tokio::test]
    async fn test_unsuccessful_delete_with_errors_is_reconciled() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/duplicates/delete")
            .with_status(200)
            .with_body(
                r#"{"success": false, "deleted_count": 0, "blocked_count": 0,
                    "errors": [{"id": 2, "error": "Permission denied"}]}"#,
            )
            .create_async()
            .await;

        let client = CatalogClient::with_base_url(&server.url()).unwrap();
        let requested = ids(&[2]);
        let report = client
            .request_deletion(&requested, EquivalenceMode::ExactContent, &view())
            .await
            .unwrap();
        assert!(matches!(report.failed.get(&RecordId(2)), Some(DeleteFailure::Permission(_))));
        assert!(report.is_partition_of(&requested));
    }

    #[test]
    fn test_reconcile_partitions_sent_ids() {
        let sent = ids(&[2, 3, 4]);
        let resp = DeleteResponse {
            success: true,
            deleted_count: 1,
            deleted_files: vec![
                crate::wire::DeletedFile { id: 2, ..Default::default() },
                crate::wire::DeletedFile { id: 99, ..Default::default() },
            ],
            blocked_ids: vec![3, 2],
            errors: vec![crate::wire::DeleteErrorEntry {
                id: Some(4),
                title: None,
                error: "[Errno 13] Permission denied: '/lib/x.m4b'".into(),
            }],
            ..Default::default()
        };

        let report = reconcile(&sent, resp, &view());
        assert_eq!(report.deleted, ids(&[2]));
        assert_eq!(report.blocked.get(&RecordId(3)), Some(&BlockReason::LastCopy));
        assert!(matches!(report.failed.get(&RecordId(4)), Some(DeleteFailure::Permission(_))));
        assert!(report.is_partition_of(&sent));
    }

    #[test]
    fn test_reconcile_unreported_ids_fail_as_not_found() {
        let sent = ids(&[2, 3]);
        let resp = DeleteResponse {
            success: true,
            deleted_count: 1,
            deleted_files: vec![crate::wire::DeletedFile { id: 2, ..Default::default() }],
            ..Default::default()
        };
        let report = reconcile(&sent, resp, &view());
        assert_eq!(report.failed.get(&RecordId(3)), Some(&DeleteFailure::NotFound));
        assert!(report.is_partition_of(&sent));
    }
}
