use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ReviewerError;
use crate::types::{CommentThreshold, ReviewMode};

/// Locations tried, in order, when no explicit config path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    ".github/pr_review_config.yml",
    ".github/pr_review_config.yaml",
];

/// Fully resolved reviewer configuration.
///
/// Built from [`ReviewerConfig::default`] with a repository YAML file merged
/// over it, then environment overrides applied on top.
///
/// # Examples
///
/// ```
/// use patchwise_core::{CommentThreshold, ReviewMode, ReviewerConfig};
///
/// let config = ReviewerConfig::default();
/// assert_eq!(config.review_mode, ReviewMode::Standard);
/// assert_eq!(config.comment_threshold, CommentThreshold::Medium);
/// assert_eq!(config.summary_length, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerConfig {
    /// Requested depth of the review.
    pub review_mode: ReviewMode,
    /// Minimum severity of posted comments.
    pub comment_threshold: CommentThreshold,
    /// Focus tags passed to the model, in order.
    pub review_focus: Vec<String>,
    /// Glob lists deciding which files are reviewed.
    pub file_filters: FileFilters,
    /// Upper bound on summary words.
    pub summary_length: usize,
    /// How comments are rendered.
    pub comment_styling: CommentStyling,
    /// Extra rules keyed by lowercase language name.
    pub language_specific_rules: BTreeMap<String, LanguageRules>,
    /// Lines containing any of these substrings are never sent to the model.
    pub ignore_lines_containing: Vec<String>,
    /// Language model settings.
    pub llm: LlmConfig,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        let mut language_specific_rules = BTreeMap::new();
        language_specific_rules.insert(
            "python".to_string(),
            LanguageRules {
                style_guide: Some("PEP8".into()),
                extra_focus: vec!["type_hints".into(), "docstrings".into()],
            },
        );
        language_specific_rules.insert(
            "javascript".to_string(),
            LanguageRules {
                style_guide: Some("Airbnb".into()),
                extra_focus: vec!["null_safety".into(), "async_patterns".into()],
            },
        );

        Self {
            review_mode: ReviewMode::Standard,
            comment_threshold: CommentThreshold::Medium,
            review_focus: ["bugs", "security", "performance", "maintainability", "readability"]
                .into_iter()
                .map(String::from)
                .collect(),
            file_filters: FileFilters::default(),
            summary_length: 200,
            comment_styling: CommentStyling::default(),
            language_specific_rules,
            ignore_lines_containing: ["TODO", "FIXME", "NOSONAR", "# pragma: no cover"]
                .into_iter()
                .map(String::from)
                .collect(),
            llm: LlmConfig::default(),
        }
    }
}

impl ReviewerConfig {
    /// Parse a YAML document and merge it over the defaults.
    ///
    /// `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Yaml`] for malformed YAML or values of the
    /// wrong type, and [`ReviewerError::Config`] when the document is not a
    /// mapping or fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise_core::{CommentThreshold, ReviewerConfig};
    /// use std::path::Path;
    ///
    /// let yaml = "comment_threshold: high\nfile_filters:\n  exclude: ['*.lock']\n";
    /// let config = ReviewerConfig::from_yaml(yaml, Path::new("inline")).unwrap();
    /// assert_eq!(config.comment_threshold, CommentThreshold::High);
    /// assert_eq!(config.file_filters.include, vec!["*"]);
    /// assert_eq!(config.file_filters.exclude, vec!["*.lock"]);
    /// ```
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self, ReviewerError> {
        let overlay = ConfigOverlay::parse(content, origin)?;
        let config = Self::default().merge(overlay);
        config.validate()?;
        Ok(config)
    }

    /// Load the repository configuration rooted at `workspace`.
    ///
    /// With `explicit` set, only that path (relative to `workspace` unless
    /// absolute) is tried; otherwise [`DEFAULT_CONFIG_PATHS`] are probed. A
    /// missing file falls back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] if a file exists but cannot be read, and
    /// the errors of [`ReviewerConfig::from_yaml`] for bad content.
    pub fn load(workspace: &Path, explicit: Option<&Path>) -> Result<Self, ReviewerError> {
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![workspace.join(path)],
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .map(|p| workspace.join(p))
                .collect(),
        };

        for path in &candidates {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    tracing::info!(path = %path.display(), "loaded review configuration");
                    return Self::from_yaml(&content, path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if explicit.is_some() {
                        tracing::warn!(
                            path = %path.display(),
                            "config file not found, using defaults"
                        );
                    } else {
                        tracing::debug!(path = %path.display(), "no config file");
                    }
                }
                Err(e) => {
                    return Err(ReviewerError::Config(format!(
                        "cannot read {}: {e}",
                        path.display()
                    )))
                }
            }
        }

        Ok(Self::default())
    }

    /// Apply an overlay: present keys replace defaults, nested mappings merge one level deep.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise_core::{ConfigOverlay, ReviewerConfig};
    ///
    /// let merged = ReviewerConfig::default().merge(ConfigOverlay::default());
    /// assert_eq!(merged, ReviewerConfig::default());
    /// ```
    pub fn merge(mut self, overlay: ConfigOverlay) -> Self {
        if let Some(mode) = overlay.review_mode {
            self.review_mode = mode;
        }
        if let Some(threshold) = overlay.comment_threshold {
            self.comment_threshold = threshold;
        }
        if let Some(focus) = overlay.review_focus {
            self.review_focus = focus;
        }
        if let Some(filters) = overlay.file_filters {
            if let Some(include) = filters.include {
                self.file_filters.include = include;
            }
            if let Some(exclude) = filters.exclude {
                self.file_filters.exclude = exclude;
            }
        }
        if let Some(len) = overlay.summary_length {
            self.summary_length = len;
        }
        if let Some(styling) = overlay.comment_styling {
            let s = &mut self.comment_styling;
            if let Some(v) = styling.title_prefix {
                s.title_prefix = v;
            }
            if let Some(v) = styling.use_emoji {
                s.use_emoji = v;
            }
            if let Some(v) = styling.include_code_snippet {
                s.include_code_snippet = v;
            }
            if let Some(v) = styling.include_details {
                s.include_details = v;
            }
            if let Some(v) = styling.signature {
                s.signature = v;
            }
        }
        if let Some(rules) = overlay.language_specific_rules {
            for (lang, rule) in rules {
                self.language_specific_rules
                    .insert(lang.to_lowercase(), rule);
            }
        }
        if let Some(ignore) = overlay.ignore_lines_containing {
            self.ignore_lines_containing = ignore;
        }
        if let Some(llm) = overlay.llm {
            if let Some(v) = llm.model {
                self.llm.model = v;
            }
            if let Some(v) = llm.base_url {
                self.llm.base_url = Some(v);
            }
            if let Some(v) = llm.temperature {
                self.llm.temperature = v;
            }
            if let Some(v) = llm.timeout_secs {
                self.llm.timeout_secs = v;
            }
            if let Some(v) = llm.max_retries {
                self.llm.max_retries = v;
            }
        }
        self
    }

    /// Apply environment / CLI overrides. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] for an unknown mode or threshold.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise_core::{CommentThreshold, Overrides, ReviewerConfig};
    ///
    /// let mut config = ReviewerConfig::default();
    /// config.apply_overrides(&Overrides {
    ///     comment_threshold: Some("high".into()),
    ///     review_mode: Some("  ".into()),
    ///     ..Overrides::default()
    /// }).unwrap();
    /// assert_eq!(config.comment_threshold, CommentThreshold::High);
    /// ```
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<(), ReviewerError> {
        if let Some(mode) = non_blank(&overrides.review_mode) {
            self.review_mode = mode.parse().map_err(ReviewerError::Config)?;
        }
        if let Some(threshold) = non_blank(&overrides.comment_threshold) {
            self.comment_threshold = threshold.parse().map_err(ReviewerError::Config)?;
        }
        if let Some(model) = non_blank(&overrides.model) {
            self.llm.model = model.to_string();
        }
        if let Some(url) = non_blank(&overrides.base_url) {
            self.llm.base_url = Some(url.to_string());
        }
        Ok(())
    }

    /// Check value ranges that the type system does not cover.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), ReviewerError> {
        if self.summary_length == 0 {
            return Err(ReviewerError::Config(
                "summary_length must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ReviewerError::Config(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ReviewerError::Config("llm.model must not be empty".into()));
        }
        if self.comment_styling.title_prefix.trim().is_empty() {
            return Err(ReviewerError::Config(
                "comment_styling.title_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Serialize to YAML, as written by `patchwise init`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ReviewerError> {
        serde_yml::to_string(self)
            .map_err(|e| ReviewerError::Config(format!("failed to serialize config: {e}")))
    }

    /// Rules for `language`, if configured.
    pub fn rules_for(&self, language: &str) -> Option<&LanguageRules> {
        self.language_specific_rules.get(&language.to_lowercase())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Include/exclude glob lists.
///
/// # Examples
///
/// ```
/// use patchwise_core::FileFilters;
///
/// let filters = FileFilters::default();
/// assert_eq!(filters.include, vec!["*"]);
/// assert!(filters.exclude.contains(&"*.md".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilters {
    /// A file must match at least one of these.
    pub include: Vec<String>,
    /// A file matching any of these is skipped, even when included.
    pub exclude: Vec<String>,
}

impl Default for FileFilters {
    fn default() -> Self {
        Self {
            include: vec!["*".into()],
            exclude: ["*.md", "*.txt", "package-lock.json", "yarn.lock"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Presentation options for posted comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentStyling {
    /// Bold text opening every comment; also used to recognise our earlier comments.
    pub title_prefix: String,
    /// Prefix titles with a category emoji.
    pub use_emoji: bool,
    /// Quote the commented line in a code block.
    pub include_code_snippet: bool,
    /// Append a collapsible details section.
    pub include_details: bool,
    /// Trailing signature line; empty for none.
    pub signature: String,
}

impl Default for CommentStyling {
    fn default() -> Self {
        Self {
            title_prefix: "AI Review".into(),
            use_emoji: true,
            include_code_snippet: true,
            include_details: true,
            signature: String::new(),
        }
    }
}

/// Extra review rules for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageRules {
    /// Style guide the code should follow.
    #[serde(default)]
    pub style_guide: Option<String>,
    /// Additional focus tags for files in this language.
    #[serde(default)]
    pub extra_focus: Vec<String>,
}

/// Language model settings.
///
/// # Examples
///
/// ```
/// use patchwise_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o");
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier.
    pub model: String,
    /// Custom base URL for an OpenAI-compatible endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            base_url: None,
            temperature: 0.1,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

/// The subset of configuration a repository file sets.
///
/// Every field is optional: absent or `null` keys keep their defaults and
/// unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverlay {
    /// See [`ReviewerConfig::review_mode`].
    pub review_mode: Option<ReviewMode>,
    /// See [`ReviewerConfig::comment_threshold`].
    pub comment_threshold: Option<CommentThreshold>,
    /// See [`ReviewerConfig::review_focus`].
    pub review_focus: Option<Vec<String>>,
    /// See [`ReviewerConfig::file_filters`].
    pub file_filters: Option<FileFiltersOverlay>,
    /// See [`ReviewerConfig::summary_length`].
    pub summary_length: Option<usize>,
    /// See [`ReviewerConfig::comment_styling`].
    pub comment_styling: Option<CommentStylingOverlay>,
    /// See [`ReviewerConfig::language_specific_rules`].
    pub language_specific_rules: Option<BTreeMap<String, LanguageRules>>,
    /// See [`ReviewerConfig::ignore_lines_containing`].
    pub ignore_lines_containing: Option<Vec<String>>,
    /// See [`ReviewerConfig::llm`].
    pub llm: Option<LlmOverlay>,
}

impl ConfigOverlay {
    /// Parse a repository YAML document.
    ///
    /// An empty or comment-only document is an empty overlay.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Yaml`] for malformed YAML or mistyped values,
    /// and [`ReviewerError::Config`] when the top level is not a mapping.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ReviewerError> {
        let blank = content
            .lines()
            .map(str::trim)
            .all(|l| l.is_empty() || l.starts_with('#') || l == "---");
        if blank {
            return Ok(Self::default());
        }
        let yaml_err = |source: serde_yml::Error| ReviewerError::Yaml {
            path: origin.to_path_buf(),
            source,
        };

        let value: serde_yml::Value = serde_yml::from_str(content).map_err(yaml_err)?;
        match value {
            serde_yml::Value::Null => Ok(Self::default()),
            serde_yml::Value::Mapping(_) => serde_yml::from_value(value).map_err(yaml_err),
            _ => Err(ReviewerError::Config(format!(
                "{}: top level must be a mapping of settings",
                origin.display()
            ))),
        }
    }
}

/// Partial [`FileFilters`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileFiltersOverlay {
    /// Replaces the include list.
    pub include: Option<Vec<String>>,
    /// Replaces the exclude list.
    pub exclude: Option<Vec<String>>,
}

/// Partial [`CommentStyling`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentStylingOverlay {
    pub title_prefix: Option<String>,
    pub use_emoji: Option<bool>,
    pub include_code_snippet: Option<bool>,
    pub include_details: Option<bool>,
    pub signature: Option<String>,
}

/// Partial [`LlmConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmOverlay {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Values taken from the environment or command line, applied after the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `REVIEW_MODE`.
    pub review_mode: Option<String>,
    /// `COMMENT_THRESHOLD`.
    pub comment_threshold: Option<String>,
    /// `OPENAI_MODEL`.
    pub model: Option<String>,
    /// `OPENAI_BASE_URL`.
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<ReviewerConfig, ReviewerError> {
        ReviewerConfig::from_yaml(yaml, Path::new("test.yml"))
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = ReviewerConfig::default();
        assert_eq!(config.review_mode, ReviewMode::Standard);
        assert_eq!(config.comment_threshold, CommentThreshold::Medium);
        assert_eq!(config.review_focus.len(), 5);
        assert_eq!(config.summary_length, 200);
        assert_eq!(
            config.ignore_lines_containing,
            vec!["TODO", "FIXME", "NOSONAR", "# pragma: no cover"]
        );
        assert_eq!(
            config.rules_for("Python").unwrap().style_guide.as_deref(),
            Some("PEP8")
        );
        assert_eq!(config.comment_styling.title_prefix, "AI Review");
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(parse("").unwrap(), ReviewerConfig::default());
        assert_eq!(parse("# nothing here\n").unwrap(), ReviewerConfig::default());
        assert_eq!(parse("~\n").unwrap(), ReviewerConfig::default());
    }

    #[test]
    fn merging_empty_overlay_is_identity() {
        let base = ReviewerConfig::default();
        let merged = base.clone().merge(ConfigOverlay::default());
        assert_eq!(merged, base);
        assert_eq!(merged.clone().merge(ConfigOverlay::default()), merged);
    }

    #[test]
    fn nested_mappings_merge_per_key() {
        let config = parse(
            r#"
file_filters:
  exclude: ["dist/*"]
comment_styling:
  use_emoji: false
  signature: "-- bot"
language_specific_rules:
  Go:
    style_guide: Effective Go
"#,
        )
        .unwrap();
        assert_eq!(config.file_filters.include, vec!["*"]);
        assert_eq!(config.file_filters.exclude, vec!["dist/*"]);
        assert!(!config.comment_styling.use_emoji);
        assert!(config.comment_styling.include_details);
        assert_eq!(config.comment_styling.title_prefix, "AI Review");
        assert_eq!(config.comment_styling.signature, "-- bot");

        let go = config.rules_for("go").unwrap();
        assert_eq!(go.style_guide.as_deref(), Some("Effective Go"));
        assert!(go.extra_focus.is_empty());
        assert!(config.rules_for("python").is_some());
    }

    #[test]
    fn lists_are_replaced_whole() {
        let config = parse("review_focus: [security]\nignore_lines_containing: []\n").unwrap();
        assert_eq!(config.review_focus, vec!["security"]);
        assert!(config.ignore_lines_containing.is_empty());
    }

    #[test]
    fn unknown_keys_and_nulls_are_ignored() {
        let config = parse("unknown_key: 1\nreview_focus: ~\nllm:\n  provider: other\n").unwrap();
        assert_eq!(config, ReviewerConfig::default());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = parse("review_mode: [standard\n").unwrap_err();
        assert!(matches!(err, ReviewerError::Yaml { .. }));
        assert!(err.to_string().contains("test.yml"));
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(matches!(
            parse("summary_length: lots\n").unwrap_err(),
            ReviewerError::Yaml { .. }
        ));
        assert!(matches!(
            parse("review_mode: exhaustive\n").unwrap_err(),
            ReviewerError::Yaml { .. }
        ));
    }

    #[test]
    fn empty_title_prefix_is_rejected() {
        let config = parse("comment_styling:\n  title_prefix: \"  \"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ReviewerError::Config(_)));
        assert!(err.to_string().contains("title_prefix"));
    }

    #[test]
    fn non_mapping_document_is_an_error() {
        let err = parse("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ReviewerError::Config(_)));
    }

    #[test]
    fn validation_rejects_zero_summary() {
        assert!(matches!(
            parse("summary_length: 0\n").unwrap_err(),
            ReviewerError::Config(_)
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = parse("review_mode: thorough\n").unwrap();
        config
            .apply_overrides(&Overrides {
                review_mode: Some("concise".into()),
                comment_threshold: Some(String::new()),
                model: Some("gpt-4o-mini".into()),
                base_url: None,
            })
            .unwrap();
        assert_eq!(config.review_mode, ReviewMode::Concise);
        assert_eq!(config.comment_threshold, CommentThreshold::Medium);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn invalid_override_is_an_error() {
        let mut config = ReviewerConfig::default();
        let err = config
            .apply_overrides(&Overrides {
                comment_threshold: Some("extreme".into()),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(matches!(err, ReviewerError::Config(_)));
    }

    #[test]
    fn load_without_files_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReviewerConfig::load(dir.path(), None).unwrap();
        assert_eq!(config, ReviewerConfig::default());

        let config = ReviewerConfig::load(dir.path(), Some(Path::new("missing.yml"))).unwrap();
        assert_eq!(config, ReviewerConfig::default());
    }

    #[test]
    fn load_probes_default_locations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".github")).unwrap();
        std::fs::write(
            dir.path().join(".github/pr_review_config.yaml"),
            "comment_threshold: low\n",
        )
        .unwrap();
        let config = ReviewerConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.comment_threshold, CommentThreshold::Low);
    }

    #[test]
    fn load_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("review.yml"), "file_filters: {include: [\n").unwrap();
        let err = ReviewerConfig::load(dir.path(), Some(Path::new("review.yml"))).unwrap_err();
        assert!(matches!(err, ReviewerError::Yaml { .. }));
    }

    #[test]
    fn default_yaml_round_trips() {
        let yaml = ReviewerConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("review_mode: standard"));
        assert_eq!(parse(&yaml).unwrap(), ReviewerConfig::default());
    }
}
