use std::path::PathBuf;

/// Errors that can occur anywhere in the review pipeline.
///
/// Library crates return this type directly; the binary hands it to `miette`
/// at the boundary, so every variant carries a diagnostic code.
///
/// # Examples
///
/// ```
/// use patchwise_core::ReviewerError;
///
/// let err = ReviewerError::Config("missing OPENAI_API_KEY".into());
/// assert!(err.to_string().contains("OPENAI_API_KEY"));
/// assert!(!err.is_transient());
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ReviewerError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(patchwise::io))]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(patchwise::config),
        help("check .github/pr_review_config.yml and the REVIEW_MODE / COMMENT_THRESHOLD inputs")
    )]
    Config(String),

    /// The configuration file is not valid YAML.
    #[error("configuration error: invalid YAML in {}: {source}", .path.display())]
    #[diagnostic(code(patchwise::config::yaml))]
    Yaml {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying parser error.
        #[source]
        source: serde_yml::Error,
    },

    /// Credentials were rejected by the VCS or LLM API.
    #[error("authentication failed: {0}")]
    #[diagnostic(
        code(patchwise::auth),
        help("verify GITHUB_TOKEN has pull-request write access and OPENAI_API_KEY is valid")
    )]
    Auth(String),

    /// The remote API asked us to slow down.
    #[error("rate limited{}", retry_hint(.retry_after))]
    #[diagnostic(code(patchwise::rate_limited))]
    RateLimited {
        /// Seconds the server asked us to wait, when it said.
        retry_after: Option<u64>,
    },

    /// Timeout, connection failure, or a 5xx from either API.
    #[error("network error: {0}")]
    #[diagnostic(code(patchwise::network))]
    Network(String),

    /// Non-transient GitHub API failure.
    #[error("GitHub API error: {0}")]
    #[diagnostic(code(patchwise::vcs))]
    Vcs(String),

    /// Non-transient LLM API failure.
    #[error("LLM error: {0}")]
    #[diagnostic(code(patchwise::llm))]
    Llm(String),

    /// The model answered, but not in the shape we asked for.
    #[error("malformed model response: {0}")]
    #[diagnostic(code(patchwise::llm::malformed))]
    MalformedResponse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(patchwise::serialization))]
    Serialization(#[from] serde_json::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(patchwise::file_not_found))]
    FileNotFound(PathBuf),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    }
}

impl ReviewerError {
    /// Whether retrying the same request may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise_core::ReviewerError;
    ///
    /// assert!(ReviewerError::RateLimited { retry_after: None }.is_transient());
    /// assert!(ReviewerError::Network("timeout".into()).is_transient());
    /// assert!(!ReviewerError::Auth("bad token".into()).is_transient());
    /// ```
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReviewerError::RateLimited { .. } | ReviewerError::Network(_)
        )
    }

    /// Whether a failure while posting one comment should stop the rest of the batch.
    ///
    /// Per-comment rejections (e.g. a line GitHub will not anchor) only skip
    /// that comment; credential, quota and connectivity failures would hit
    /// every following request too.
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            ReviewerError::Auth(_)
                | ReviewerError::RateLimited { .. }
                | ReviewerError::Network(_)
        )
    }
}
