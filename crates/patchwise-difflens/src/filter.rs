//! Pre-LLM filtering: drops excluded files and ignored lines before they
//! reach the model.

use std::path::{Path, PathBuf};

use patchwise_core::{DiffEntry, ReviewerConfig, ReviewerError};
use serde::Serialize;

/// Include/exclude globs plus ignore-line substrings.
///
/// Globs follow shell `fnmatch` rules against the full repository-relative
/// path: `*` also matches `/`, and matching is case-sensitive.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use patchwise_difflens::filter::FileFilter;
///
/// let filter = FileFilter::new(&["*".into()], &["*.md".into()], &[]).unwrap();
/// assert!(filter.is_included(Path::new("src/main.rs")));
/// assert!(!filter.is_included(Path::new("docs/guide.md")));
/// ```
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
    ignore_substrings: Vec<String>,
}

impl FileFilter {
    /// Compile the given patterns.
    ///
    /// Empty ignore substrings are discarded, since they would match every line.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] naming the first invalid glob.
    pub fn new(
        include: &[String],
        exclude: &[String],
        ignore_substrings: &[String],
    ) -> Result<Self, ReviewerError> {
        Ok(Self {
            include: compile(include, "include")?,
            exclude: compile(exclude, "exclude")?,
            ignore_substrings: ignore_substrings
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect(),
        })
    }

    /// Build a filter from the `file_filters` and `ignore_lines_containing` settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use patchwise_core::ReviewerConfig;
    /// use patchwise_difflens::filter::FileFilter;
    ///
    /// let filter = FileFilter::from_config(&ReviewerConfig::default()).unwrap();
    /// assert!(!filter.is_included(Path::new("yarn.lock")));
    /// assert!(filter.is_included(Path::new("foo.py")));
    /// ```
    pub fn from_config(config: &ReviewerConfig) -> Result<Self, ReviewerError> {
        Self::new(
            &config.file_filters.include,
            &config.file_filters.exclude,
            &config.ignore_lines_containing,
        )
    }

    /// Whether `path` should be reviewed at all. Exclusions win over inclusions.
    pub fn is_included(&self, path: &Path) -> bool {
        self.check_path(path).is_none()
    }

    /// Whether `content` contains one of the ignore substrings.
    pub fn is_ignored_line(&self, content: &str) -> bool {
        self.ignore_substrings
            .iter()
            .any(|needle| content.contains(needle.as_str()))
    }

    /// Filter diff entries, pruning ignored lines from the ones that are kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise_core::ReviewerConfig;
    /// use patchwise_difflens::filter::FileFilter;
    /// use patchwise_difflens::parser::parse_unified_diff;
    ///
    /// let diff = "diff --git a/src/main.rs b/src/main.rs\n\
    ///             --- a/src/main.rs\n\
    ///             +++ b/src/main.rs\n\
    ///             @@ -1,1 +1,2 @@\n\
    ///              line\n\
    ///             +new\n";
    /// let entries = parse_unified_diff(diff).unwrap();
    /// let filter = FileFilter::from_config(&ReviewerConfig::default()).unwrap();
    /// let result = filter.apply(entries);
    /// assert_eq!(result.kept.len(), 1);
    /// assert!(result.skipped.is_empty());
    /// ```
    pub fn apply(&self, entries: Vec<DiffEntry>) -> FilterResult {
        let mut kept = Vec::new();
        let mut skipped = Vec::new();
        let mut lines_ignored = 0;

        for mut entry in entries {
            if let Some(reason) = self.check_path(&entry.path) {
                tracing::debug!(path = %entry.path.display(), %reason, "skipping file");
                skipped.push(SkippedFile {
                    path: entry.path,
                    reason,
                });
                continue;
            }

            for hunk in &mut entry.hunks {
                let before = hunk.lines.len();
                hunk.lines.retain(|l| !self.is_ignored_line(&l.content));
                lines_ignored += before - hunk.lines.len();
            }
            entry.hunks.retain(|h| h.has_changes());

            if entry.hunks.is_empty() {
                tracing::debug!(path = %entry.path.display(), "no reviewable changes");
                skipped.push(SkippedFile {
                    path: entry.path,
                    reason: SkipReason::NoReviewableChanges,
                });
            } else {
                kept.push(entry);
            }
        }

        FilterResult {
            kept,
            skipped,
            lines_ignored,
        }
    }

    fn check_path(&self, path: &Path) -> Option<SkipReason> {
        let path_str = path.to_string_lossy();
        if let Some(pat) = self.exclude.iter().find(|p| p.matches(&path_str)) {
            return Some(SkipReason::Excluded(pat.as_str().to_string()));
        }
        if self.include.iter().any(|p| p.matches(&path_str)) {
            None
        } else {
            Some(SkipReason::NotIncluded)
        }
    }
}

fn compile(patterns: &[String], which: &str) -> Result<Vec<glob::Pattern>, ReviewerError> {
    patterns
        .iter()
        .map(|pat| {
            glob::Pattern::new(pat).map_err(|e| {
                ReviewerError::Config(format!("invalid {which} pattern `{pat}`: {e}"))
            })
        })
        .collect()
}

/// Result of filtering diff entries.
///
/// # Examples
///
/// ```
/// use patchwise_difflens::filter::FilterResult;
///
/// let result = FilterResult {
///     kept: vec![],
///     skipped: vec![],
///     lines_ignored: 0,
/// };
/// assert!(result.kept.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// Entries that still have reviewable changes.
    pub kept: Vec<DiffEntry>,
    /// Files that were skipped with reasons.
    pub skipped: Vec<SkippedFile>,
    /// Number of diff lines removed by the ignore substrings.
    pub lines_ignored: usize,
}

/// A file that was skipped during filtering.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use patchwise_difflens::filter::{SkippedFile, SkipReason};
///
/// let skipped = SkippedFile {
///     path: PathBuf::from("README.md"),
///     reason: SkipReason::Excluded("*.md".into()),
/// };
/// assert_eq!(skipped.reason.to_string(), "excluded by `*.md`");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub path: PathBuf,
    /// Why the file was skipped.
    pub reason: SkipReason,
}

/// Reason a file was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "pattern")]
pub enum SkipReason {
    /// Matched an exclude pattern.
    Excluded(String),
    /// Matched no include pattern.
    NotIncluded,
    /// Nothing left to review after pruning, or no patch at all.
    NoReviewableChanges,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Excluded(pat) => write!(f, "excluded by `{pat}`"),
            SkipReason::NotIncluded => write!(f, "not matched by any include pattern"),
            SkipReason::NoReviewableChanges => write!(f, "no reviewable changes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_unified_diff;

    fn make_diff(path: &str, body: &str) -> Vec<DiffEntry> {
        let diff = format!(
            "diff --git a/{path} b/{path}\n\
             --- a/{path}\n\
             +++ b/{path}\n\
             @@ -1,1 +1,2 @@\n\
             {body}\n"
        );
        parse_unified_diff(&diff).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exclude_takes_precedence_over_include() {
        let filter = FileFilter::new(&strings(&["*.py"]), &strings(&["tests/*"]), &[]).unwrap();
        assert!(filter.is_included(Path::new("app/main.py")));
        assert!(!filter.is_included(Path::new("tests/test_main.py")));
        assert_eq!(
            filter.check_path(Path::new("tests/test_main.py")),
            Some(SkipReason::Excluded("tests/*".into()))
        );
    }

    #[test]
    fn star_crosses_directories() {
        let filter = FileFilter::new(&strings(&["*"]), &strings(&["*.md"]), &[]).unwrap();
        assert!(!filter.is_included(Path::new("docs/deep/guide.md")));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let filter = FileFilter::new(&strings(&["*"]), &strings(&["*.md"]), &[]).unwrap();
        assert!(filter.is_included(Path::new("NOTES.MD")));
    }

    #[test]
    fn bare_name_pattern_matches_root_only() {
        let filter =
            FileFilter::new(&strings(&["*"]), &strings(&["package-lock.json"]), &[]).unwrap();
        assert!(!filter.is_included(Path::new("package-lock.json")));
        assert!(filter.is_included(Path::new("web/package-lock.json")));
    }

    #[test]
    fn no_include_match_is_skipped() {
        let filter = FileFilter::new(&strings(&["src/*"]), &[], &[]).unwrap();
        let result = filter.apply(make_diff("build.rs", " a\n+b"));
        assert!(result.kept.is_empty());
        assert_eq!(result.skipped[0].reason, SkipReason::NotIncluded);
    }

    #[test]
    fn empty_include_list_reviews_nothing() {
        let filter = FileFilter::new(&[], &[], &[]).unwrap();
        assert!(!filter.is_included(Path::new("src/lib.rs")));
    }

    #[test]
    fn invalid_glob_is_a_config_error() {
        let err = FileFilter::new(&strings(&["[abc"]), &[], &[]).unwrap_err();
        assert!(matches!(err, ReviewerError::Config(_)));
        assert!(err.to_string().contains("[abc"));
    }

    #[test]
    fn ignored_lines_are_pruned_regardless_of_marker() {
        let filter = FileFilter::new(&strings(&["*"]), &[], &strings(&["TODO"])).unwrap();
        let result = filter.apply(make_diff("a.py", " x = 0  # TODO\n+y = 1"));
        assert_eq!(result.lines_ignored, 1);
        let lines: Vec<_> = result.kept[0].lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].content, "y = 1");
        assert!(result.kept[0]
            .lines()
            .all(|l| !l.content.contains("TODO")));
    }

    #[test]
    fn entry_with_only_ignored_changes_is_skipped() {
        let filter = FileFilter::new(&strings(&["*"]), &[], &strings(&["FIXME"])).unwrap();
        let result = filter.apply(make_diff("a.py", " keep\n+bad()  # FIXME"));
        assert!(result.kept.is_empty());
        assert_eq!(result.skipped[0].reason, SkipReason::NoReviewableChanges);
    }

    #[test]
    fn entry_without_hunks_is_skipped() {
        let filter = FileFilter::new(&strings(&["*"]), &[], &[]).unwrap();
        let entry = DiffEntry {
            path: PathBuf::from("logo.png"),
            previous_path: None,
            status: patchwise_core::FileStatus::Added,
            hunks: vec![],
        };
        let result = filter.apply(vec![entry]);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason.to_string(), "no reviewable changes");
    }

    #[test]
    fn empty_ignore_substring_does_not_match_everything() {
        let filter = FileFilter::new(&strings(&["*"]), &[], &strings(&[""])).unwrap();
        assert!(!filter.is_ignored_line("anything"));
    }

    #[test]
    fn default_config_filters_docs_and_lockfiles() {
        let filter = FileFilter::from_config(&ReviewerConfig::default()).unwrap();
        for path in ["README.md", "notes.txt", "package-lock.json", "yarn.lock"] {
            assert!(!filter.is_included(Path::new(path)), "{path} should be excluded");
        }
        assert!(filter.is_included(Path::new("src/app.ts")));
    }
}
