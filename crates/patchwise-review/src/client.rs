use std::path::{Path, PathBuf};
use std::sync::Arc;

use patchwise_core::{Finding, ReviewerError};

use crate::llm::ChatModel;
use crate::prompt::{parse_model_response, FileSection, ReviewRequest};
use crate::retry::{with_retry, RetryPolicy};

/// Findings and summary the model produced for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewReply {
    /// Findings anchored on lines present in the submitted diff.
    pub findings: Vec<Finding>,
    /// Model summary text.
    pub summary: String,
    /// Entries dropped for missing or invalid fields.
    pub dropped_invalid: usize,
    /// Findings dropped because their file/line is not in the diff.
    pub dropped_location: usize,
}

/// Sends review requests to a [`ChatModel`] and validates what comes back.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use patchwise_core::LlmConfig;
/// use patchwise_review::client::ReviewClient;
/// use patchwise_review::llm::OpenAiClient;
/// use patchwise_review::retry::RetryPolicy;
///
/// let model = OpenAiClient::new(&LlmConfig::default(), "sk-test").unwrap();
/// let client = ReviewClient::new(Arc::new(model), RetryPolicy::new(3));
/// assert_eq!(client.model_name(), "gpt-4o");
/// ```
pub struct ReviewClient {
    model: Arc<dyn ChatModel>,
    retry: RetryPolicy,
}

impl ReviewClient {
    /// Wrap a chat model with a retry policy.
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Identifier of the underlying model.
    pub fn model_name(&self) -> &str {
        self.model.model()
    }

    /// Ask the model to review `request`.
    ///
    /// Transient failures are retried per the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::MalformedResponse`] when the reply cannot be
    /// parsed, or the last API error once retries are exhausted.
    pub async fn review(&self, request: &ReviewRequest) -> Result<ReviewReply, ReviewerError> {
        let messages = request.to_messages();
        tracing::info!(
            model = self.model.model(),
            files = request.files.len(),
            lines = request.line_count(),
            "requesting review"
        );

        let raw = with_retry(&self.retry, "chat completion", || {
            self.model.chat(&messages)
        })
        .await?;

        let parsed = parse_model_response(&raw)?;
        let (findings, dropped_location) = validate_locations(parsed.findings, &request.files);
        if dropped_location > 0 {
            tracing::warn!(dropped = dropped_location, "discarded findings outside the diff");
        }
        tracing::info!(findings = findings.len(), "model review parsed");

        Ok(ReviewReply {
            findings,
            summary: parsed.summary,
            dropped_invalid: parsed.dropped,
            dropped_location,
        })
    }
}

/// Keep findings whose file/line is an added or context line of `files`.
///
/// Kept findings get their path normalized to the diff's spelling and the
/// diff line attached as a snippet. Returns the kept findings and the number
/// dropped.
pub fn validate_locations(findings: Vec<Finding>, files: &[FileSection]) -> (Vec<Finding>, usize) {
    let mut kept = Vec::with_capacity(findings.len());
    let mut dropped = 0;

    for mut finding in findings {
        let wanted = normalize_path(&finding.file_path);
        let target = files
            .iter()
            .filter(|f| f.path == wanted)
            .flat_map(|f| f.hunks.iter().flat_map(|h| &h.lines).map(move |l| (f, l)))
            .find(|(_, l)| l.new_line == Some(finding.line));

        match target {
            Some((file, line)) => {
                finding.file_path = file.path.clone();
                finding.snippet = Some(line.content.clone());
                kept.push(finding);
            }
            None => {
                tracing::debug!(
                    path = %finding.file_path.display(),
                    line = finding.line,
                    "finding does not match a diff line"
                );
                dropped += 1;
            }
        }
    }

    (kept, dropped)
}

fn normalize_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let mut s = raw.trim();
    while let Some(rest) = s.strip_prefix("./") {
        s = rest;
    }
    PathBuf::from(s.trim_start_matches('/'))
}
