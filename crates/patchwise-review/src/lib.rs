//! Review orchestration: prompt construction, the model client, comment
//! rendering and publishing to GitHub.
//!
//! Both external services sit behind narrow traits ([`llm::ChatModel`] and
//! [`vcs::VcsProvider`]) so the pipeline can run against in-memory fakes.

pub mod client;
pub mod event;
pub mod format;
pub mod github;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod publish;
pub mod retry;
pub mod vcs;
