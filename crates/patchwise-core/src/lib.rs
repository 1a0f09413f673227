//! Core types, configuration, and error handling for patchwise.
//!
//! This crate provides the shared foundation used by the other crates:
//! - [`ReviewerError`]: unified error type using `thiserror` and `miette`
//! - [`ReviewerConfig`]: defaults merged with `.github/pr_review_config.yml`
//! - Shared types: [`DiffEntry`], [`DiffHunk`], [`Finding`], [`Severity`],
//!   [`Category`], [`RenderedComment`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    CommentStyling, CommentStylingOverlay, ConfigOverlay, FileFilters, FileFiltersOverlay,
    LanguageRules, LlmConfig, LlmOverlay, Overrides, ReviewerConfig, DEFAULT_CONFIG_PATHS,
};
pub use error::ReviewerError;
pub use types::{
    Category, CommentThreshold, DiffEntry, DiffHunk, DiffLine, FileStatus, Finding, LineKind,
    OutputFormat, RenderedComment, ReviewMode, Severity,
};

/// A convenience `Result` type for patchwise operations.
pub type Result<T> = std::result::Result<T, ReviewerError>;
