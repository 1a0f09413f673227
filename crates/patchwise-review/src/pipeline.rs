use std::fmt;

use chrono::{DateTime, Utc};
use patchwise_core::{DiffEntry, Finding, RenderedComment, ReviewerConfig, ReviewerError};
use patchwise_difflens::filter::{FileFilter, SkippedFile};
use serde::Serialize;

use crate::client::{ReviewClient, ReviewReply};
use crate::format::{render_comments, render_summary, SummaryStats};
use crate::prompt::build_request;

/// Summary used when filtering leaves nothing to send to the model.
pub const NO_CHANGES_SUMMARY: &str = "No reviewable changes were found after applying the \
configured file filters and ignored-line rules.";

/// Summary used when the model's reply could not be parsed.
pub const MALFORMED_SUMMARY: &str = "The model response could not be parsed, so no inline \
comments were produced for this change.";

/// Result of a completed code review, before publishing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    /// Comments that passed the threshold, sorted by path then line.
    pub comments: Vec<RenderedComment>,
    /// Every validated finding, including those below the threshold.
    pub findings: Vec<Finding>,
    /// Model summary, or a fixed note when the model was skipped or failed to parse.
    pub summary: String,
    /// Files removed by the filter.
    pub skipped: Vec<SkippedFile>,
    /// Statistics about the run.
    pub stats: ReviewStats,
}

/// Statistics about a review run.
///
/// # Examples
///
/// ```
/// use patchwise_review::pipeline::ReviewStats;
///
/// let stats = ReviewStats {
///     files_fetched: 3,
///     files_reviewed: 2,
///     lines_ignored: 1,
///     findings_dropped: 1,
///     findings_below_threshold: 2,
///     model_used: "gpt-4o".into(),
///     model_called: true,
///     degraded: false,
/// };
/// assert_eq!(stats.files_skipped(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    /// Changed files in the pull request.
    pub files_fetched: usize,
    /// Files sent to the model.
    pub files_reviewed: usize,
    /// Diff lines removed by ignore substrings.
    pub lines_ignored: usize,
    /// Model entries discarded as invalid or outside the diff.
    pub findings_dropped: usize,
    /// Valid findings held back by the comment threshold.
    pub findings_below_threshold: usize,
    /// Model identifier.
    pub model_used: String,
    /// Whether the model was called at all.
    pub model_called: bool,
    /// Whether the model reply was unusable.
    pub degraded: bool,
}

impl ReviewStats {
    /// Files that did not reach the model.
    pub fn files_skipped(&self) -> usize {
        self.files_fetched - self.files_reviewed
    }
}

/// Review orchestrator: filter, prompt, model call, validation, rendering.
pub struct ReviewPipeline {
    client: ReviewClient,
    config: ReviewerConfig,
    filter: FileFilter,
}

impl ReviewPipeline {
    /// Create a pipeline from a review client and the resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] if a file filter pattern is invalid.
    pub fn new(client: ReviewClient, config: ReviewerConfig) -> Result<Self, ReviewerError> {
        let filter = FileFilter::from_config(&config)?;
        Ok(Self {
            client,
            config,
            filter,
        })
    }

    /// The configuration this pipeline renders with.
    pub fn config(&self) -> &ReviewerConfig {
        &self.config
    }

    /// Review the changed files of one pull request.
    ///
    /// The model is not called when filtering leaves nothing to review. A
    /// reply that cannot be parsed degrades to an outcome with no comments
    /// and [`MALFORMED_SUMMARY`].
    ///
    /// # Errors
    ///
    /// Returns the model client's error for anything other than a malformed reply.
    pub async fn review(&self, entries: Vec<DiffEntry>) -> Result<ReviewOutcome, ReviewerError> {
        let files_fetched = entries.len();
        let filtered = self.filter.apply(entries);
        tracing::info!(
            fetched = files_fetched,
            kept = filtered.kept.len(),
            skipped = filtered.skipped.len(),
            lines_ignored = filtered.lines_ignored,
            "filtered diff"
        );

        let mut stats = ReviewStats {
            files_fetched,
            files_reviewed: filtered.kept.len(),
            lines_ignored: filtered.lines_ignored,
            model_used: self.client.model_name().to_string(),
            ..ReviewStats::default()
        };

        if filtered.kept.is_empty() {
            tracing::info!("nothing to review, skipping model call");
            return Ok(ReviewOutcome {
                comments: Vec::new(),
                findings: Vec::new(),
                summary: NO_CHANGES_SUMMARY.to_string(),
                skipped: filtered.skipped,
                stats,
            });
        }

        let request = build_request(&filtered.kept, &self.config);
        stats.model_called = true;
        let reply = match self.client.review(&request).await {
            Ok(reply) => reply,
            Err(ReviewerError::MalformedResponse(detail)) => {
                tracing::warn!(%detail, "model reply unusable, posting summary only");
                stats.degraded = true;
                ReviewReply {
                    summary: MALFORMED_SUMMARY.to_string(),
                    ..ReviewReply::default()
                }
            }
            Err(e) => return Err(e),
        };

        let comments = render_comments(&reply.findings, &self.config);
        stats.findings_dropped = reply.dropped_invalid + reply.dropped_location;
        let admitted = reply
            .findings
            .iter()
            .filter(|f| self.config.comment_threshold.admits(f.severity))
            .count();
        stats.findings_below_threshold = reply.findings.len() - admitted;
        tracing::info!(
            findings = reply.findings.len(),
            comments = comments.len(),
            below_threshold = stats.findings_below_threshold,
            threshold = %self.config.comment_threshold,
            "rendered comments"
        );

        Ok(ReviewOutcome {
            comments,
            findings: reply.findings,
            summary: reply.summary,
            skipped: filtered.skipped,
            stats,
        })
    }
}

impl ReviewOutcome {
    /// Render the summary comment, reporting `inline_comments` as posted.
    pub fn summary_markdown(
        &self,
        config: &ReviewerConfig,
        inline_comments: usize,
        generated_at: DateTime<Utc>,
    ) -> String {
        let stats = SummaryStats {
            inline_comments,
            files_reviewed: self.stats.files_reviewed,
            files_skipped: self.stats.files_skipped(),
        };
        render_summary(&self.summary, &stats, config, generated_at)
    }

    /// Render the outcome as a markdown report, as printed by a dry run.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise_review::pipeline::{ReviewOutcome, ReviewStats};
    ///
    /// let outcome = ReviewOutcome {
    ///     comments: vec![],
    ///     findings: vec![],
    ///     summary: "Nothing to add.".into(),
    ///     skipped: vec![],
    ///     stats: ReviewStats::default(),
    /// };
    /// let md = outcome.to_markdown();
    /// assert!(md.contains("# Review Results"));
    /// assert!(md.contains("No inline comments."));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Review Results\n\n");
        out.push_str(&format!(
            "**Model:** {} | **Files:** {} reviewed, {} skipped | **Comments:** {} (below threshold: {}, dropped: {})\n\n",
            self.stats.model_used,
            self.stats.files_reviewed,
            self.stats.files_skipped(),
            self.comments.len(),
            self.stats.findings_below_threshold,
            self.stats.findings_dropped,
        ));
        out.push_str(&format!("## Summary\n\n{}\n\n", self.summary));

        if self.comments.is_empty() {
            out.push_str("No inline comments.\n");
        } else {
            for c in &self.comments {
                out.push_str(&format!("## `{}:{}`\n\n", c.file_path.display(), c.line));
                out.push_str(&format!("{}\n\n", c.body));
            }
        }

        if !self.skipped.is_empty() {
            out.push_str("## Skipped files\n\n");
            for s in &self.skipped {
                out.push_str(&format!("- `{}`: {}\n", s.path.display(), s.reason));
            }
        }
        out
    }
}

impl fmt::Display for ReviewOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Review Results")?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "Model: {} | Files: {} reviewed, {} skipped | Lines ignored: {} | Comments: {} (below threshold: {}, dropped: {})\n",
            self.stats.model_used,
            self.stats.files_reviewed,
            self.stats.files_skipped(),
            self.stats.lines_ignored,
            self.comments.len(),
            self.stats.findings_below_threshold,
            self.stats.findings_dropped,
        )?;

        if self.comments.is_empty() {
            writeln!(f, "No issues found.")?;
        } else {
            for c in &self.comments {
                let finding = self
                    .findings
                    .iter()
                    .find(|x| x.file_path == c.file_path && x.line == c.line);
                let label = finding
                    .map(|x| x.category.label())
                    .unwrap_or("Comment");
                writeln!(
                    f,
                    "[{}] {}:{} {label}",
                    c.severity.to_string().to_uppercase(),
                    c.file_path.display(),
                    c.line,
                )?;
                if let Some(x) = finding {
                    writeln!(f, "  {}", x.message)?;
                    if let Some(s) = &x.suggestion {
                        writeln!(f, "  Suggestion: {s}")?;
                    }
                }
                writeln!(f)?;
            }
        }

        for s in &self.skipped {
            writeln!(f, "skipped {}: {}", s.path.display(), s.reason)?;
        }
        writeln!(f, "\nSummary: {}", self.summary)
    }
}
