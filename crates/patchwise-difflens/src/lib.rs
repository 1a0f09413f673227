//! Diff parsing, language detection and pre-LLM file filtering.
//!
//! Turns unified diffs (from `git diff` or GitHub's per-file `patch` field)
//! into numbered line records, and drops excluded files and ignored lines
//! before anything reaches the model.

pub mod filter;
pub mod language;
pub mod parser;
