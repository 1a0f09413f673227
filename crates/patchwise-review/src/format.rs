//! Pure rendering of findings and the summary into GitHub markdown.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use patchwise_core::{CommentStyling, Finding, RenderedComment, ReviewerConfig};
use patchwise_difflens::language::{detect_language, UNKNOWN_LANGUAGE};

/// Heading of the summary comment.
pub const SUMMARY_HEADING: &str = "# \u{1f50d} AI Code Review Summary";

/// Apply the comment threshold and render what remains, sorted by path then line.
///
/// Findings that share a path and line become one comment: the most severe
/// finding leads and the others follow under "Additionally".
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use patchwise_core::{Category, CommentThreshold, Finding, ReviewerConfig, Severity};
/// use patchwise_review::format::render_comments;
///
/// let finding = |line, severity| Finding {
///     file_path: PathBuf::from("a.py"),
///     line,
///     category: Category::Bug,
///     severity,
///     message: "m".into(),
///     suggestion: None,
///     snippet: None,
/// };
/// let mut config = ReviewerConfig::default();
/// config.comment_threshold = CommentThreshold::High;
/// let findings = [
///     finding(1, Severity::Low),
///     finding(2, Severity::Medium),
///     finding(3, Severity::High),
/// ];
/// assert_eq!(render_comments(&findings, &config).len(), 1);
/// ```
pub fn render_comments(findings: &[Finding], config: &ReviewerConfig) -> Vec<RenderedComment> {
    let mut kept: Vec<&Finding> = findings
        .iter()
        .filter(|f| config.comment_threshold.admits(f.severity))
        .collect();
    kept.sort_by(|a, b| {
        (&a.file_path, a.line)
            .cmp(&(&b.file_path, b.line))
            .then(b.severity.cmp(&a.severity))
    });

    let styling = &config.comment_styling;
    kept.chunk_by(|a, b| a.file_path == b.file_path && a.line == b.line)
        .map(|group| {
            let lead = group[0];
            let mut body = render_finding(lead, styling);
            for extra in &group[1..] {
                let _ = write!(
                    body,
                    "\n\n---\n\n**Additionally:**\n\n{}",
                    render_finding(extra, styling)
                );
            }
            push_signature(&mut body, &styling.signature);
            RenderedComment {
                file_path: lead.file_path.clone(),
                line: lead.line,
                severity: lead.severity,
                body,
            }
        })
        .collect()
}

/// Render one finding as a comment body.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use patchwise_core::{Category, CommentStyling, Finding, Severity};
/// use patchwise_review::format::render_comment_body;
///
/// let finding = Finding {
///     file_path: PathBuf::from("db.py"),
///     line: 3,
///     category: Category::Security,
///     severity: Severity::High,
///     message: "SQL built from user input".into(),
///     suggestion: None,
///     snippet: None,
/// };
/// let body = render_comment_body(&finding, &CommentStyling::default());
/// assert!(body.starts_with("\u{1f512} **AI Review:** Security (high)"));
/// ```
pub fn render_comment_body(finding: &Finding, styling: &CommentStyling) -> String {
    let mut body = render_finding(finding, styling);
    push_signature(&mut body, &styling.signature);
    body
}

fn render_finding(finding: &Finding, styling: &CommentStyling) -> String {
    let mut body = String::new();
    if styling.use_emoji {
        body.push_str(finding.category.emoji());
        body.push(' ');
    }
    let _ = writeln!(
        body,
        "**{}:** {} ({})\n",
        styling.title_prefix,
        finding.category.label(),
        finding.severity
    );
    body.push_str(&finding.message);

    if styling.include_code_snippet {
        if let Some(snippet) = &finding.snippet {
            let lang = match detect_language(&finding.file_path) {
                UNKNOWN_LANGUAGE => "",
                lang => fence_hint(lang),
            };
            let fence = fence_for(snippet);
            let _ = write!(body, "\n\n{fence}{lang}\n{snippet}\n{fence}");
        }
    }

    if styling.include_details {
        let _ = write!(
            body,
            "\n\n<details>\n<summary>Details</summary>\n\n\
             - **Category:** {}\n- **Severity:** {}\n",
            finding.category, finding.severity
        );
        if let Some(suggestion) = &finding.suggestion {
            let _ = writeln!(body, "- **Suggestion:** {suggestion}");
        }
        body.push_str("\n</details>");
    }
    body
}

/// Counts shown in the summary footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryStats {
    /// Inline comments posted, or that would be posted on a dry run.
    pub inline_comments: usize,
    /// Files sent to the model.
    pub files_reviewed: usize,
    /// Files dropped by the filter.
    pub files_skipped: usize,
}

/// Compose the top-level summary comment.
///
/// The model summary is cut to `summary_length` words; `generated_at` is
/// passed in so rendering stays deterministic.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use patchwise_core::ReviewerConfig;
/// use patchwise_review::format::{render_summary, SummaryStats};
///
/// let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
/// let stats = SummaryStats { inline_comments: 2, files_reviewed: 1, files_skipped: 0 };
/// let body = render_summary("Looks good.", &stats, &ReviewerConfig::default(), at);
/// assert!(body.contains("*Generated at 2026-01-02 03:04:05 UTC \u{2022} 2 inline comments added*"));
/// ```
pub fn render_summary(
    summary: &str,
    stats: &SummaryStats,
    config: &ReviewerConfig,
    generated_at: DateTime<Utc>,
) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "{SUMMARY_HEADING}\n");

    let text = truncate_words(summary.trim(), config.summary_length);
    if text.is_empty() {
        body.push_str("No summary was provided for this change.\n");
    } else {
        let _ = writeln!(body, "{text}");
    }

    let _ = writeln!(
        body,
        "\n---\n*Generated at {} \u{2022} {} inline comments added*",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        stats.inline_comments
    );
    if stats.files_skipped > 0 {
        let _ = writeln!(
            body,
            "*{} files reviewed \u{2022} {} files skipped by filters*",
            stats.files_reviewed, stats.files_skipped
        );
    }

    let _ = write!(
        body,
        "\n<details>\n<summary>\u{2139}\u{fe0f} About this review</summary>\n\n\
         This automated review provides suggestions to improve code quality and maintainability.\n\
         Suggestions are recommendations only - use your judgment about which to implement.\n\n\
         Review mode: **{}** \u{2022} comment threshold: **{}** \u{2022} focus: {}\n\n\
         To customize this review, add a `.github/pr_review_config.yml` file to your repository.\n\
         </details>",
        config.review_mode,
        config.comment_threshold,
        config.review_focus.join(", ")
    );

    push_signature(&mut body, &config.comment_styling.signature);
    body
}

/// Keep at most `max_words` whitespace-separated words, appending an ellipsis when cut.
///
/// # Examples
///
/// ```
/// use patchwise_review::format::truncate_words;
///
/// assert_eq!(truncate_words("one two three", 2), "one two\u{2026}");
/// assert_eq!(truncate_words("one two", 5), "one two");
/// ```
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    let mut out = words[..max_words].join(" ");
    out.push('\u{2026}');
    out
}

fn push_signature(body: &mut String, signature: &str) {
    let signature = signature.trim();
    if !signature.is_empty() {
        let _ = write!(body, "\n\n---\n{signature}");
    }
}

/// A backtick fence longer than any backtick run inside `snippet`.
fn fence_for(snippet: &str) -> String {
    let longest = snippet
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn fence_hint(language: &str) -> &str {
    match language {
        "c++" => "cpp",
        "c#" => "csharp",
        "shell" => "bash",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::TimeZone;
    use patchwise_core::{Category, CommentThreshold, Severity};

    use super::*;

    fn finding(path: &str, line: u32, severity: Severity) -> Finding {
        Finding {
            file_path: PathBuf::from(path),
            line,
            category: Category::Bug,
            severity,
            message: "Off-by-one in loop bound".into(),
            suggestion: Some("Use `..=`".into()),
            snippet: Some("for i in 0..n {".into()),
        }
    }

    fn config_with(threshold: CommentThreshold) -> ReviewerConfig {
        let mut config = ReviewerConfig::default();
        config.comment_threshold = threshold;
        config
    }

    #[test]
    fn thresholds_are_nested_subsets() {
        let findings = vec![
            finding("a.rs", 1, Severity::Low),
            finding("a.rs", 2, Severity::Medium),
            finding("a.rs", 3, Severity::High),
            finding("b.rs", 1, Severity::Medium),
        ];
        let low = render_comments(&findings, &config_with(CommentThreshold::Low));
        let medium = render_comments(&findings, &config_with(CommentThreshold::Medium));
        let high = render_comments(&findings, &config_with(CommentThreshold::High));
        assert_eq!((low.len(), medium.len(), high.len()), (4, 3, 1));
        assert!(high.iter().all(|c| medium.contains(c)));
        assert!(medium.iter().all(|c| low.contains(c)));
    }

    #[test]
    fn comments_sorted_by_path_then_line() {
        let findings = vec![
            finding("b.rs", 1, Severity::High),
            finding("a.rs", 9, Severity::High),
            finding("a.rs", 2, Severity::High),
        ];
        let rendered = render_comments(&findings, &config_with(CommentThreshold::Low));
        let order: Vec<(String, u32)> = rendered
            .iter()
            .map(|c| (c.file_path.display().to_string(), c.line))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.rs".to_string(), 2),
                ("a.rs".to_string(), 9),
                ("b.rs".to_string(), 1)
            ]
        );
    }

    #[test]
    fn full_styling_renders_every_part() {
        let styling = CommentStyling {
            signature: "_patchwise_".into(),
            ..CommentStyling::default()
        };
        let body = render_comment_body(&finding("src/lib.rs", 4, Severity::Medium), &styling);
        assert!(body.starts_with("\u{1f41b} **AI Review:** Bug (medium)\n\nOff-by-one"));
        assert!(body.contains("```rust\nfor i in 0..n {\n```"));
        assert!(body.contains("<details>"));
        assert!(body.contains("- **Suggestion:** Use `..=`"));
        assert!(body.ends_with("\n\n---\n_patchwise_"));
    }

    #[test]
    fn minimal_styling_is_plain() {
        let styling = CommentStyling {
            title_prefix: "Bot".into(),
            use_emoji: false,
            include_code_snippet: false,
            include_details: false,
            signature: String::new(),
        };
        let body = render_comment_body(&finding("x.unknownext", 1, Severity::Low), &styling);
        assert_eq!(body, "**Bot:** Bug (low)\n\nOff-by-one in loop bound");
    }

    #[test]
    fn same_line_findings_are_merged() {
        let mut security = finding("app.py", 2, Severity::Medium);
        security.category = Category::Security;
        security.message = "Hardcoded secret".into();
        let bug = finding("app.py", 2, Severity::High);
        let mut config = config_with(CommentThreshold::Low);
        config.comment_styling.signature = "_patchwise_".into();

        let rendered = render_comments(&[security, bug], &config);
        assert_eq!(rendered.len(), 1);
        let comment = &rendered[0];
        assert_eq!(comment.severity, Severity::High);
        assert!(comment.body.starts_with("\u{1f41b} **AI Review:** Bug (high)"));
        assert!(comment.body.contains("**Additionally:**"));
        assert!(comment.body.contains("Hardcoded secret"));
        assert_eq!(comment.body.matches("_patchwise_").count(), 1);
        assert!(comment.body.ends_with("\n\n---\n_patchwise_"));
    }

    #[test]
    fn snippet_with_backticks_gets_a_longer_fence() {
        let mut f = finding("notes.py", 1, Severity::Low);
        f.snippet = Some("doc = \"```python\"".into());
        let body = render_comment_body(&f, &CommentStyling::default());
        assert!(body.contains("\n````python\ndoc = \"```python\"\n````"));
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("a ````` b"), "``````");
    }

    #[test]
    fn unknown_language_gets_bare_fence() {
        let body = render_comment_body(
            &finding("Makefile", 1, Severity::Low),
            &CommentStyling::default(),
        );
        assert!(body.contains("```\nfor i in 0..n {\n```"));
    }

    #[test]
    fn summary_is_truncated_and_footed() {
        let mut config = ReviewerConfig::default();
        config.summary_length = 3;
        config.comment_styling.signature = "-- bot".into();
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let stats = SummaryStats {
            inline_comments: 0,
            files_reviewed: 1,
            files_skipped: 2,
        };
        let body = render_summary("one two three four five", &stats, &config, at);
        assert!(body.starts_with(SUMMARY_HEADING));
        assert!(body.contains("one two three\u{2026}"));
        assert!(!body.contains("four"));
        assert!(body.contains("0 inline comments added"));
        assert!(body.contains("2 files skipped by filters"));
        assert!(body.contains("About this review"));
        assert!(body.contains("Review mode: **standard**"));
        assert!(body.ends_with("-- bot"));
    }

    #[test]
    fn empty_summary_gets_placeholder() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let body = render_summary(
            "   ",
            &SummaryStats::default(),
            &ReviewerConfig::default(),
            at,
        );
        assert!(body.contains("No summary was provided"));
        assert!(!body.contains("files skipped"));
    }

    #[test]
    fn truncate_keeps_short_text_verbatim() {
        assert_eq!(truncate_words("  a  b ", 5), "  a  b ");
        assert_eq!(truncate_words("a b c", 0), "\u{2026}");
    }
}
