use std::path::Path;

use patchwise_core::ReviewerError;
use serde::Deserialize;

/// Pull request actions that trigger a review.
pub const REVIEWED_ACTIONS: &[&str] = &["opened", "synchronize", "reopened"];

/// The parts of a GitHub Actions event payload we use.
///
/// # Examples
///
/// ```
/// use patchwise_review::event::PullRequestEvent;
///
/// let event = PullRequestEvent::from_json(
///     r#"{"action": "labeled", "pull_request": {"number": 7}}"#,
/// ).unwrap();
/// assert_eq!(event.number, 7);
/// assert!(!event.should_review());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    /// Event action, absent for synthetic payloads.
    pub action: Option<String>,
    /// Pull request number.
    pub number: u64,
}

#[derive(Deserialize)]
struct RawEvent {
    action: Option<String>,
    pull_request: Option<RawPullRequest>,
}

#[derive(Deserialize)]
struct RawPullRequest {
    number: u64,
}

impl PullRequestEvent {
    /// Parse an event payload.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] when the payload is not JSON or has
    /// no `pull_request` object.
    pub fn from_json(payload: &str) -> Result<Self, ReviewerError> {
        let raw: RawEvent = serde_json::from_str(payload)
            .map_err(|e| ReviewerError::Config(format!("invalid event payload: {e}")))?;
        let pr = raw.pull_request.ok_or_else(|| {
            ReviewerError::Config(
                "event payload has no pull_request; run this action on pull_request events".into(),
            )
        })?;
        Ok(Self {
            action: raw.action,
            number: pr.number,
        })
    }

    /// Read the payload at `GITHUB_EVENT_PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::FileNotFound`] if the file is missing, otherwise
    /// as [`PullRequestEvent::from_json`].
    pub fn read(path: &Path) -> Result<Self, ReviewerError> {
        let payload = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReviewerError::FileNotFound(path.to_path_buf()),
            _ => ReviewerError::Io(e),
        })?;
        Self::from_json(&payload)
    }

    /// Whether this action should trigger a review.
    pub fn should_review(&self) -> bool {
        match &self.action {
            Some(action) => REVIEWED_ACTIONS.contains(&action.as_str()),
            None => true,
        }
    }
}
