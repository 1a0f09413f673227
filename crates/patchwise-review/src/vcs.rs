use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use patchwise_core::{DiffEntry, RenderedComment, ReviewerError};

/// Identifies one pull request.
///
/// # Examples
///
/// ```
/// use patchwise_review::vcs::PullRequestRef;
///
/// let pr: PullRequestRef = "rust-lang/rust#12345".parse().unwrap();
/// assert_eq!(pr.owner, "rust-lang");
/// assert_eq!(pr.repo, "rust");
/// assert_eq!(pr.number, 12345);
/// assert_eq!(pr.to_string(), "rust-lang/rust#12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub number: u64,
}

impl PullRequestRef {
    /// Build from an `owner/repo` string, as found in `GITHUB_REPOSITORY`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] if `repository` is not `owner/repo`.
    pub fn from_repository(repository: &str, number: u64) -> Result<Self, ReviewerError> {
        let invalid = || {
            ReviewerError::Config(format!(
                "invalid repository '{repository}', expected owner/repo"
            ))
        };
        let (owner, repo) = repository.trim().split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

impl FromStr for PullRequestRef {
    type Err = ReviewerError;

    /// Parse `owner/repo#number`.
    fn from_str(pr_ref: &str) -> Result<Self, Self::Err> {
        let Some((owner_repo, number_str)) = pr_ref.split_once('#') else {
            return Err(ReviewerError::Config(format!(
                "invalid PR reference '{pr_ref}', expected owner/repo#number"
            )));
        };
        let number: u64 = number_str
            .parse()
            .map_err(|_| ReviewerError::Config(format!("invalid PR number: {number_str}")))?;
        Self::from_repository(owner_repo, number)
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// A review comment already on the pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingComment {
    /// File the comment is anchored on.
    pub path: PathBuf,
    /// New-version line, when GitHub still resolves one.
    pub line: Option<u32>,
    /// Markdown body.
    pub body: String,
}

/// The version-control host: where diffs come from and comments go.
#[async_trait]
pub trait VcsProvider: Send + Sync {
    /// Every changed file of the pull request, with parsed hunks.
    async fn list_files(&self, pr: &PullRequestRef) -> Result<Vec<DiffEntry>, ReviewerError>;

    /// SHA of the pull request's head commit.
    async fn head_sha(&self, pr: &PullRequestRef) -> Result<String, ReviewerError>;

    /// Line comments already posted on the pull request.
    async fn existing_comments(
        &self,
        pr: &PullRequestRef,
    ) -> Result<Vec<ExistingComment>, ReviewerError>;

    /// Post one line comment on the right-hand side of the diff at `commit_id`.
    async fn post_line_comment(
        &self,
        pr: &PullRequestRef,
        commit_id: &str,
        comment: &RenderedComment,
    ) -> Result<(), ReviewerError>;

    /// Post a top-level conversation comment.
    async fn post_summary(&self, pr: &PullRequestRef, body: &str) -> Result<(), ReviewerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pr_reference_missing_hash() {
        assert!("owner/repo".parse::<PullRequestRef>().is_err());
    }

    #[test]
    fn parse_pr_reference_missing_slash() {
        assert!("repo#123".parse::<PullRequestRef>().is_err());
    }

    #[test]
    fn parse_pr_reference_invalid_number() {
        assert!("owner/repo#abc".parse::<PullRequestRef>().is_err());
    }

    #[test]
    fn repository_must_have_two_parts() {
        assert!(PullRequestRef::from_repository("a/b/c", 1).is_err());
        assert!(PullRequestRef::from_repository("/b", 1).is_err());
        let pr = PullRequestRef::from_repository("octocat/hello-world", 42).unwrap();
        assert_eq!(pr.to_string(), "octocat/hello-world#42");
    }
}
