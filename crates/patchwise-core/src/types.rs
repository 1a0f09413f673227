use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Marker of a single line inside a diff hunk.
///
/// # Examples
///
/// ```
/// use patchwise_core::LineKind;
///
/// assert_eq!(LineKind::from_marker('+'), Some(LineKind::Added));
/// assert_eq!(LineKind::Removed.marker(), '-');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Line present only in the new version.
    Added,
    /// Line present only in the old version.
    Removed,
    /// Unchanged line shown for context.
    Context,
}

impl LineKind {
    /// Map a unified-diff prefix character to a line kind.
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            '+' => Some(LineKind::Added),
            '-' => Some(LineKind::Removed),
            ' ' => Some(LineKind::Context),
            _ => None,
        }
    }

    /// The unified-diff prefix character for this kind.
    pub fn marker(self) -> char {
        match self {
            LineKind::Added => '+',
            LineKind::Removed => '-',
            LineKind::Context => ' ',
        }
    }
}

/// One line record of a hunk.
///
/// Added lines carry only a new line number, removed lines only an old one,
/// context lines both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    /// Add/remove/context marker.
    pub kind: LineKind,
    /// Line number in the old version.
    pub old_line: Option<u32>,
    /// Line number in the new version.
    pub new_line: Option<u32>,
    /// Line text without the marker.
    pub content: String,
}

/// A single hunk from a unified diff, split into line records.
///
/// # Examples
///
/// ```
/// use patchwise_core::{DiffHunk, DiffLine, LineKind};
///
/// let hunk = DiffHunk {
///     old_start: 1,
///     old_lines: 1,
///     new_start: 1,
///     new_lines: 2,
///     lines: vec![
///         DiffLine { kind: LineKind::Context, old_line: Some(1), new_line: Some(1), content: "a".into() },
///         DiffLine { kind: LineKind::Added, old_line: None, new_line: Some(2), content: "b".into() },
///     ],
/// };
/// assert!(hunk.has_changes());
/// assert_eq!(hunk.header(), "@@ -1,1 +1,2 @@");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    /// Starting line in the old version.
    pub old_start: u32,
    /// Number of lines in the old version.
    pub old_lines: u32,
    /// Starting line in the new version.
    pub new_start: u32,
    /// Number of lines in the new version.
    pub new_lines: u32,
    /// Line records in diff order.
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Whether any added or removed line remains in this hunk.
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| l.kind != LineKind::Context)
    }

    /// Render the `@@ -a,b +c,d @@` header.
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_lines, self.new_start, self.new_lines
        )
    }
}

/// How a file changed in the pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// New file.
    Added,
    /// Existing file edited in place.
    #[default]
    Modified,
    /// File deleted.
    Removed,
    /// File moved, possibly with edits.
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Removed => write!(f, "removed"),
            FileStatus::Renamed => write!(f, "renamed"),
        }
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "added" => Ok(FileStatus::Added),
            "modified" | "changed" => Ok(FileStatus::Modified),
            "removed" => Ok(FileStatus::Removed),
            "renamed" | "copied" => Ok(FileStatus::Renamed),
            other => Err(format!("unknown file status: {other}")),
        }
    }
}

/// One changed file of a pull request together with its hunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    /// Repository-relative path in the new version.
    pub path: PathBuf,
    /// Path before a rename.
    pub previous_path: Option<PathBuf>,
    /// Kind of change.
    pub status: FileStatus,
    /// Parsed hunks in file order.
    pub hunks: Vec<DiffHunk>,
}

impl DiffEntry {
    /// Number of added lines across all hunks.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise_core::{DiffEntry, FileStatus};
    /// use std::path::PathBuf;
    ///
    /// let entry = DiffEntry {
    ///     path: PathBuf::from("src/lib.rs"),
    ///     previous_path: None,
    ///     status: FileStatus::Modified,
    ///     hunks: vec![],
    /// };
    /// assert_eq!(entry.added_lines(), 0);
    /// ```
    pub fn added_lines(&self) -> usize {
        self.lines().filter(|l| l.kind == LineKind::Added).count()
    }

    /// Whether any hunk still holds an added or removed line.
    pub fn has_changes(&self) -> bool {
        self.hunks.iter().any(DiffHunk::has_changes)
    }

    /// Iterate over every line record of every hunk.
    pub fn lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks.iter().flat_map(|h| h.lines.iter())
    }

    /// Find the line shown at `new_line` in the new version, if the diff covers it.
    pub fn line_at(&self, new_line: u32) -> Option<&DiffLine> {
        self.lines().find(|l| l.new_line == Some(new_line))
    }
}

/// Severity tier of a finding.
///
/// Ordered `Low < Medium < High`.
///
/// # Examples
///
/// ```
/// use patchwise_core::Severity;
///
/// let s: Severity = "critical".parse().unwrap();
/// assert_eq!(s, Severity::High);
/// assert!(Severity::Medium > Severity::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor issue or nit.
    Low,
    /// Worth fixing before merge.
    Medium,
    /// Significant defect.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" | "info" | "nit" => Ok(Severity::Low),
            "medium" | "moderate" | "warning" => Ok(Severity::Medium),
            "high" | "critical" | "major" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// What kind of problem a finding describes.
///
/// # Examples
///
/// ```
/// use patchwise_core::Category;
///
/// assert_eq!("bugs".parse::<Category>().unwrap(), Category::Bug);
/// assert_eq!(Category::Security.to_string(), "security");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Incorrect behavior.
    Bug,
    /// Vulnerability or unsafe handling of data.
    Security,
    /// Wasted time or memory.
    Performance,
    /// Hard to change safely later.
    Maintainability,
    /// Hard to read.
    Readability,
}

impl Category {
    /// Capitalized name used in comment titles.
    pub fn label(self) -> &'static str {
        match self {
            Category::Bug => "Bug",
            Category::Security => "Security",
            Category::Performance => "Performance",
            Category::Maintainability => "Maintainability",
            Category::Readability => "Readability",
        }
    }

    /// Emoji shown in front of comment titles.
    pub fn emoji(self) -> &'static str {
        match self {
            Category::Bug => "\u{1f41b}",
            Category::Security => "\u{1f512}",
            Category::Performance => "\u{26a1}",
            Category::Maintainability => "\u{1f527}",
            Category::Readability => "\u{1f4d6}",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_lowercase())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bug" | "bugs" | "correctness" => Ok(Category::Bug),
            "security" => Ok(Category::Security),
            "performance" => Ok(Category::Performance),
            "maintainability" => Ok(Category::Maintainability),
            "readability" | "style" => Ok(Category::Readability),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Requested depth of the model's analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// Critical issues only, terse.
    Concise,
    /// Balanced feedback on important issues.
    #[default]
    Standard,
    /// Major and minor issues alike.
    Thorough,
}

impl ReviewMode {
    /// Instruction text sent to the model for this mode.
    pub fn guidance(self) -> &'static str {
        match self {
            ReviewMode::Concise => "Be extremely brief and only focus on critical issues",
            ReviewMode::Standard => "Provide balanced feedback focusing on important issues",
            ReviewMode::Thorough => {
                "Perform comprehensive review covering both major and minor issues"
            }
        }
    }
}

impl fmt::Display for ReviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewMode::Concise => write!(f, "concise"),
            ReviewMode::Standard => write!(f, "standard"),
            ReviewMode::Thorough => write!(f, "thorough"),
        }
    }
}

impl FromStr for ReviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "concise" => Ok(ReviewMode::Concise),
            "standard" => Ok(ReviewMode::Standard),
            "thorough" => Ok(ReviewMode::Thorough),
            other => Err(format!(
                "unknown review mode: {other} (expected concise, standard or thorough)"
            )),
        }
    }
}

/// Minimum severity a finding needs to be posted.
///
/// # Examples
///
/// ```
/// use patchwise_core::{CommentThreshold, Severity};
///
/// assert!(CommentThreshold::Low.admits(Severity::Low));
/// assert!(!CommentThreshold::Medium.admits(Severity::Low));
/// assert!(CommentThreshold::High.admits(Severity::High));
/// assert!(!CommentThreshold::High.admits(Severity::Medium));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentThreshold {
    /// Post everything.
    Low,
    /// Drop the lowest tier.
    #[default]
    Medium,
    /// Only the highest tier.
    High,
}

impl CommentThreshold {
    /// Lowest severity still posted at this threshold.
    pub fn min_severity(self) -> Severity {
        match self {
            CommentThreshold::Low => Severity::Low,
            CommentThreshold::Medium => Severity::Medium,
            CommentThreshold::High => Severity::High,
        }
    }

    /// Whether a finding of `severity` is posted at this threshold.
    pub fn admits(self, severity: Severity) -> bool {
        severity >= self.min_severity()
    }

    /// Instruction text sent to the model for this threshold.
    pub fn guidance(self) -> &'static str {
        match self {
            CommentThreshold::Low => "Suggest improvements even for minor issues",
            CommentThreshold::Medium => "Focus on moderate to significant issues",
            CommentThreshold::High => {
                "Only flag significant issues that meaningfully impact code quality or functionality"
            }
        }
    }
}

impl fmt::Display for CommentThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentThreshold::Low => write!(f, "low"),
            CommentThreshold::Medium => write!(f, "medium"),
            CommentThreshold::High => write!(f, "high"),
        }
    }
}

impl FromStr for CommentThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(CommentThreshold::Low),
            "medium" => Ok(CommentThreshold::Medium),
            "high" => Ok(CommentThreshold::High),
            other => Err(format!(
                "unknown comment threshold: {other} (expected low, medium or high)"
            )),
        }
    }
}

/// A single review comment candidate produced by the model.
///
/// # Examples
///
/// ```
/// use patchwise_core::{Category, Finding, Severity};
/// use std::path::PathBuf;
///
/// let finding = Finding {
///     file_path: PathBuf::from("src/auth.py"),
///     line: 42,
///     category: Category::Security,
///     severity: Severity::High,
///     message: "Token compared with ==, use a constant-time comparison".into(),
///     suggestion: None,
///     snippet: None,
/// };
/// assert_eq!(finding.severity, Severity::High);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// File the finding points at.
    pub file_path: PathBuf,
    /// Line number in the new version of the file.
    pub line: u32,
    /// Kind of problem.
    pub category: Category,
    /// How much it matters.
    pub severity: Severity,
    /// Explanation of the issue.
    pub message: String,
    /// Optional fix proposed by the model.
    pub suggestion: Option<String>,
    /// Diff line content at the target location.
    pub snippet: Option<String>,
}

/// A finding rendered into a postable comment body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedComment {
    /// File to anchor the comment on.
    pub file_path: PathBuf,
    /// New-version line to anchor the comment on.
    pub line: u32,
    /// Severity of the underlying finding.
    pub severity: Severity,
    /// Markdown body.
    pub body: String,
}

/// Output format for dry-run reports.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use patchwise_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown, as it would be posted.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
