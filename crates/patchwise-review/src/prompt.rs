use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

use patchwise_core::{
    Category, CommentThreshold, DiffEntry, DiffHunk, FileStatus, Finding, LanguageRules,
    LineKind, ReviewMode, ReviewerConfig, ReviewerError, Severity,
};
use patchwise_difflens::language::detect_language;
use serde::Deserialize;

use crate::llm::{ChatMessage, Role};

const SYSTEM_PROMPT: &str = "\
You are an expert code reviewer commenting on a GitHub pull request. \
Your job is to find real problems in the changed lines and explain how to fix them.

Rules:
- Only comment on lines shown in the diff, citing the new-file line number printed in the left column
- Prefer added lines; never cite a removed line
- Be specific and actionable: say what to fix and why it matters
- Do not repeat the same issue on several lines
- If a file has no problems, do not comment on it

Respond with a JSON object:
{
  \"summary\": \"Overall assessment of the pull request\",
  \"comments\": [
    {
      \"file\": \"path/to/file.py\",
      \"line\": 42,
      \"category\": \"bug\" | \"security\" | \"performance\" | \"maintainability\" | \"readability\",
      \"severity\": \"low\" | \"medium\" | \"high\",
      \"message\": \"Clear explanation of the issue\",
      \"suggestion\": \"Optional concrete fix\"
    }
  ]
}

If you find no issues, return an empty comments array with a summary.";

/// Everything the model needs to review one pull request.
///
/// # Examples
///
/// ```
/// use patchwise_core::ReviewerConfig;
/// use patchwise_review::prompt::build_request;
///
/// let request = build_request(&[], &ReviewerConfig::default());
/// assert!(request.files.is_empty());
/// assert_eq!(request.summary_length, 200);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    /// Files to review, in diff order.
    pub files: Vec<FileSection>,
    /// Focus tags, in configured order.
    pub focus: Vec<String>,
    /// Requested depth.
    pub mode: ReviewMode,
    /// Severity bar the comments will be held to.
    pub threshold: CommentThreshold,
    /// Rules for the languages present in `files`, sorted by language.
    pub language_rules: BTreeMap<String, LanguageRules>,
    /// Maximum summary words.
    pub summary_length: usize,
}

/// One file of a [`ReviewRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSection {
    /// Repository-relative path.
    pub path: PathBuf,
    /// Detected language name.
    pub language: &'static str,
    /// Kind of change.
    pub status: FileStatus,
    /// Filtered hunks.
    pub hunks: Vec<DiffHunk>,
}

/// Build a review request from filtered entries and configuration.
pub fn build_request(entries: &[DiffEntry], config: &ReviewerConfig) -> ReviewRequest {
    let files: Vec<FileSection> = entries
        .iter()
        .map(|e| FileSection {
            path: e.path.clone(),
            language: detect_language(&e.path),
            status: e.status,
            hunks: e.hunks.clone(),
        })
        .collect();

    let language_rules = files
        .iter()
        .filter_map(|f| {
            config
                .rules_for(f.language)
                .map(|rules| (f.language.to_string(), rules.clone()))
        })
        .collect();

    ReviewRequest {
        files,
        focus: config.review_focus.clone(),
        mode: config.review_mode,
        threshold: config.comment_threshold,
        language_rules,
        summary_length: config.summary_length,
    }
}

impl ReviewRequest {
    /// Number of diff lines that will be sent.
    pub fn line_count(&self) -> usize {
        self.files
            .iter()
            .flat_map(|f| &f.hunks)
            .map(|h| h.lines.len())
            .sum()
    }

    /// Render the system + user message pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise_core::ReviewerConfig;
    /// use patchwise_review::llm::Role;
    /// use patchwise_review::prompt::build_request;
    ///
    /// let messages = build_request(&[], &ReviewerConfig::default()).to_messages();
    /// assert_eq!(messages.len(), 2);
    /// assert_eq!(messages[0].role, Role::System);
    /// assert!(messages[1].content.contains("200 words"));
    /// ```
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: Role::System,
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: self.render_user_prompt(),
            },
        ]
    }

    fn render_user_prompt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Review the following pull request changes.\n");
        let _ = writeln!(out, "INSTRUCTIONS:");
        let _ = writeln!(out, "1. Review focus: {}", self.focus.join(", "));
        let _ = writeln!(out, "2. Comment threshold: {}", self.threshold.guidance());
        let _ = writeln!(out, "3. Review mode: {}", self.mode.guidance());
        let _ = write!(out, "4. Language-specific guidance:");
        if self.language_rules.is_empty() {
            let _ = writeln!(out, " none");
        } else {
            out.push('\n');
            for (lang, rules) in &self.language_rules {
                let style = rules.style_guide.as_deref().unwrap_or("standard");
                let _ = write!(out, "   - For {lang} files: follow {style} guidelines");
                if !rules.extra_focus.is_empty() {
                    let _ = write!(out, " with focus on {}", rules.extra_focus.join(", "));
                }
                out.push('\n');
            }
        }
        let _ = writeln!(
            out,
            "5. Summary: at most {} words; highlight the most important changes and their impact, \
             and note positive aspects as well as problems.",
            self.summary_length
        );

        for file in &self.files {
            let _ = writeln!(
                out,
                "\n### {} ({}, {})",
                file.path.display(),
                file.language,
                file.status
            );
            let _ = writeln!(out, "```diff");
            for hunk in &file.hunks {
                let _ = writeln!(out, "{}", hunk.header());
                for line in &hunk.lines {
                    let number = match (line.kind, line.new_line) {
                        (LineKind::Removed, _) | (_, None) => String::new(),
                        (_, Some(n)) => n.to_string(),
                    };
                    let _ = writeln!(out, "{number:>5} {}{}", line.kind.marker(), line.content);
                }
            }
            let _ = writeln!(out, "```");
        }
        out
    }
}

/// What the model returned, after dropping unusable entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReview {
    /// Well-formed findings, locations not yet checked against the diff.
    pub findings: Vec<Finding>,
    /// Summary text; empty when the model gave none.
    pub summary: String,
    /// Entries discarded for missing or invalid fields.
    pub dropped: usize,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    summary: Option<String>,
    comments: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawComment {
    file: String,
    line: Option<serde_json::Value>,
    category: String,
    severity: String,
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
}

/// Parse the model's JSON reply.
///
/// Markdown code fences around the JSON are tolerated. Individual entries
/// with an unknown category or severity, a missing or zero line, or an empty
/// message are dropped and counted.
///
/// # Errors
///
/// Returns [`ReviewerError::MalformedResponse`] when the reply is not a JSON
/// object with a `comments` array.
///
/// # Examples
///
/// ```
/// use patchwise_review::prompt::parse_model_response;
///
/// let review = parse_model_response(r#"{"summary":"LGTM","comments":[]}"#).unwrap();
/// assert!(review.findings.is_empty());
/// assert_eq!(review.summary, "LGTM");
/// assert!(parse_model_response("not json").is_err());
/// ```
pub fn parse_model_response(response: &str) -> Result<ModelReview, ReviewerError> {
    let cleaned = strip_code_fences(response);
    let parsed: RawResponse = serde_json::from_str(cleaned)
        .map_err(|e| ReviewerError::MalformedResponse(e.to_string()))?;

    let mut review = ModelReview {
        summary: parsed.summary.unwrap_or_default().trim().to_string(),
        ..ModelReview::default()
    };

    for value in parsed.comments {
        match parse_comment(value) {
            Some(finding) => review.findings.push(finding),
            None => review.dropped += 1,
        }
    }

    if review.dropped > 0 {
        tracing::warn!(dropped = review.dropped, "discarded malformed model comments");
    }
    Ok(review)
}

fn parse_comment(value: serde_json::Value) -> Option<Finding> {
    let c: RawComment = serde_json::from_value(value).ok()?;

    let line = match &c.line {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|l| *l > 0)
    .and_then(|l| u32::try_from(l).ok())?;

    let category: Category = c.category.parse().ok()?;
    let severity: Severity = c.severity.parse().ok()?;
    let message = c.message.trim();
    let file = c.file.trim();
    if message.is_empty() || file.is_empty() {
        return None;
    }

    Some(Finding {
        file_path: PathBuf::from(file),
        line,
        category,
        severity,
        message: message.to_string(),
        suggestion: c
            .suggestion
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        snippet: None,
    })
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}
