use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use patchwise_core::{RenderedComment, ReviewerConfig, ReviewerError};
use serde::Serialize;

use crate::pipeline::ReviewOutcome;
use crate::vcs::{PullRequestRef, VcsProvider};

/// What happened to each rendered comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    /// Comments accepted by the VCS.
    pub posted: usize,
    /// Comments skipped because one of ours already sits at that location.
    pub duplicates: usize,
    /// Comments the VCS rejected individually.
    pub failed: usize,
}

/// Posts rendered comments and the summary to a pull request.
pub struct Publisher<'a> {
    vcs: &'a dyn VcsProvider,
    title_prefix: String,
}

impl<'a> Publisher<'a> {
    /// Publisher recognising earlier comments by `title_prefix`.
    pub fn new(vcs: &'a dyn VcsProvider, title_prefix: impl Into<String>) -> Self {
        Self {
            vcs,
            title_prefix: title_prefix.into(),
        }
    }

    /// Post the outcome's line comments, then the summary.
    ///
    /// # Errors
    ///
    /// Fails if the head commit cannot be resolved, if a comment post hits an
    /// error that would affect every request (auth, rate limit, network), or
    /// if the summary cannot be posted.
    pub async fn publish(
        &self,
        pr: &PullRequestRef,
        outcome: &ReviewOutcome,
        config: &ReviewerConfig,
        generated_at: DateTime<Utc>,
    ) -> Result<PublishReport, ReviewerError> {
        let report = self.post_comments(pr, &outcome.comments).await?;
        let summary = outcome.summary_markdown(config, report.posted, generated_at);
        self.vcs.post_summary(pr, &summary).await?;
        tracing::info!(
            posted = report.posted,
            duplicates = report.duplicates,
            failed = report.failed,
            pr = %pr,
            "published review"
        );
        Ok(report)
    }

    /// Post line comments, skipping locations that already carried one of ours
    /// before this run.
    ///
    /// # Errors
    ///
    /// See [`Publisher::publish`].
    pub async fn post_comments(
        &self,
        pr: &PullRequestRef,
        comments: &[RenderedComment],
    ) -> Result<PublishReport, ReviewerError> {
        let mut report = PublishReport::default();
        if comments.is_empty() {
            return Ok(report);
        }

        let commit_id = self.vcs.head_sha(pr).await?;
        let taken = self.reviewed_locations(pr).await;

        for comment in comments {
            if taken.contains(&(comment.file_path.clone(), comment.line)) {
                tracing::info!(
                    path = %comment.file_path.display(),
                    line = comment.line,
                    "skipping duplicate comment"
                );
                report.duplicates += 1;
                continue;
            }

            match self.vcs.post_line_comment(pr, &commit_id, comment).await {
                Ok(()) => report.posted += 1,
                Err(e) if e.aborts_batch() => {
                    let handled = report.posted + report.duplicates + report.failed;
                    tracing::error!(
                        error = %e,
                        posted = report.posted,
                        remaining = comments.len() - handled,
                        "aborting comment batch"
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %comment.file_path.display(),
                        line = comment.line,
                        error = %e,
                        "failed to post comment, skipping"
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn reviewed_locations(&self, pr: &PullRequestRef) -> HashSet<(PathBuf, u32)> {
        if self.title_prefix.trim().is_empty() {
            return HashSet::new();
        }
        match self.vcs.existing_comments(pr).await {
            Ok(existing) => existing
                .into_iter()
                .filter(|c| c.body.contains(&self.title_prefix))
                .filter_map(|c| c.line.map(|line| (c.path, line)))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch existing comments, assuming none");
                HashSet::new()
            }
        }
    }
}
