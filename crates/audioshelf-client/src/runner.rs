use std::collections::VecDeque;

use audioshelf_core::{LoadError, Notice, ReviewCommand, ReviewEffect, ReviewSession};
use tracing::debug;

use crate::catalog::CatalogApi;

/// Drives a [`ReviewSession`] against a catalog, one effect at a time.
pub struct ReviewRunner<'a, C: CatalogApi + ?Sized> {
    api: &'a C,
}

impl<'a, C: CatalogApi + ?Sized> ReviewRunner<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self { api }
    }

    /// Applies `command` and performs every effect it leads to. Returns the
    /// notices raised along the way, in order.
    pub async fn dispatch(&self, session: &mut ReviewSession, command: ReviewCommand) -> Vec<Notice> {
        let mut queue: VecDeque<ReviewEffect> = session.update(command).into();
        let mut notices = Vec::new();

        while let Some(effect) = queue.pop_front() {
            debug!(?effect, "running review effect");
            let follow_up = match effect {
                ReviewEffect::FetchGroups { seq, mode } => {
                    let result = self.api.fetch_groups(mode).await.map_err(LoadError::from);
                    session.update(ReviewCommand::GroupsLoaded { seq, result })
                }
                ReviewEffect::FetchStats => {
                    let result = self.api.fetch_hash_stats().await.map_err(LoadError::from);
                    session.update(ReviewCommand::StatsLoaded(result))
                }
                ReviewEffect::SubmitDeletion { seq, mode, ids } => {
                    let groups = session.groups().to_vec();
                    let result = self
                        .api
                        .request_deletion(&ids, mode, &groups)
                        .await
                        .map_err(LoadError::from);
                    session.update(ReviewCommand::DeletionFinished { seq, result })
                }
                ReviewEffect::Notify(notice) => {
                    notices.push(notice);
                    Vec::new()
                }
            };
            queue.extend(follow_up);
        }

        notices
    }
}
