use std::path::PathBuf;

use async_trait::async_trait;
use octocrab::service::middleware::retry::RetryConfig;
use patchwise_core::{DiffEntry, FileStatus, RenderedComment, ReviewerError};
use patchwise_difflens::parser::parse_patch;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::retry::{
    classify_status, classify_transport, retry_after_secs, with_retry, RetryPolicy,
};
use crate::vcs::{ExistingComment, PullRequestRef, VcsProvider};

const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;
const USER_AGENT: &str = concat!("patchwise/", env!("CARGO_PKG_VERSION"));

/// GitHub REST client for fetching pull request files and posting comments.
///
/// Single-object calls go through `octocrab`; paginated listings use
/// `reqwest` directly so the `Link` header can be followed.
///
/// # Examples
///
/// ```no_run
/// use patchwise_review::github::GitHubClient;
/// use patchwise_review::retry::RetryPolicy;
///
/// let client = GitHubClient::new("ghp_xxxx", None, RetryPolicy::new(3)).unwrap();
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    api_url: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    /// Create a client for `api_url` (defaults to `https://api.github.com`).
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Config`] if the token is empty, or
    /// [`ReviewerError::Vcs`] if a client cannot be built.
    pub fn new(
        token: &str,
        api_url: Option<&str>,
        retry: RetryPolicy,
    ) -> Result<Self, ReviewerError> {
        if token.trim().is_empty() {
            return Err(ReviewerError::Config(
                "GITHUB_TOKEN not set. Pass the workflow token as GITHUB_TOKEN".into(),
            ));
        }
        let api_url = api_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        // Retries are ours alone: octocrab's layer would resend POSTs.
        let octocrab = octocrab::Octocrab::builder()
            .add_retry_config(RetryConfig::None)
            .personal_token(token.to_string())
            .base_uri(api_url.as_str())
            .map_err(|e| {
                ReviewerError::Config(format!("invalid GitHub API URL {api_url}: {e}"))
            })?
            .build()
            .map_err(|e| ReviewerError::Vcs(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReviewerError::Vcs(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            octocrab,
            http,
            token: token.to_string(),
            api_url,
            retry,
        })
    }

    /// Fetch every page of a list endpoint, following `Link: rel="next"`.
    async fn get_all<T: DeserializeOwned>(
        &self,
        first_url: String,
    ) -> Result<Vec<T>, ReviewerError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        while let Some(url) = next.take() {
            let (page, following) =
                with_retry(&self.retry, "GitHub list", || self.get_page::<T>(&url)).await?;
            items.extend(page);
            next = following;
        }
        Ok(items)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<(Vec<T>, Option<String>), ReviewerError> {
        tracing::debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| classify_transport(&e, ReviewerError::Vcs))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(
                status.as_u16(),
                retry_after,
                body,
                ReviewerError::Vcs,
            ));
        }

        let next = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);
        let page = response
            .json::<Vec<T>>()
            .await
            .map_err(|e| ReviewerError::Vcs(format!("failed to decode {url}: {e}")))?;
        Ok((page, next))
    }

    fn repo_url(&self, pr: &PullRequestRef) -> String {
        format!("{}/repos/{}/{}", self.api_url, pr.owner, pr.repo)
    }
}

#[derive(Deserialize)]
struct PrFile {
    filename: String,
    status: String,
    previous_filename: Option<String>,
    patch: Option<String>,
}

#[derive(Deserialize)]
struct ReviewCommentPayload {
    path: String,
    line: Option<u32>,
    original_line: Option<u32>,
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
struct PullRequestHead {
    head: HeadRef,
}

#[derive(Deserialize)]
struct HeadRef {
    sha: String,
}

#[async_trait]
impl VcsProvider for GitHubClient {
    async fn list_files(&self, pr: &PullRequestRef) -> Result<Vec<DiffEntry>, ReviewerError> {
        let url = format!(
            "{}/pulls/{}/files?per_page={PER_PAGE}",
            self.repo_url(pr),
            pr.number
        );
        let files: Vec<PrFile> = self.get_all(url).await?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let hunks = match &file.patch {
                Some(patch) => parse_patch(patch)?,
                None => {
                    tracing::debug!(path = %file.filename, "no patch (binary or too large)");
                    Vec::new()
                }
            };
            entries.push(DiffEntry {
                path: PathBuf::from(&file.filename),
                previous_path: file.previous_filename.map(PathBuf::from),
                status: file.status.parse().unwrap_or(FileStatus::Modified),
                hunks,
            });
        }
        tracing::info!(files = entries.len(), pr = %pr, "fetched pull request files");
        Ok(entries)
    }

    async fn head_sha(&self, pr: &PullRequestRef) -> Result<String, ReviewerError> {
        let route = format!("/repos/{}/{}/pulls/{}", pr.owner, pr.repo, pr.number);
        let pull: PullRequestHead = with_retry(&self.retry, "GitHub pull request", || async {
            self.octocrab
                .get::<PullRequestHead, _, _>(route.as_str(), None::<&()>)
                .await
                .map_err(classify_octocrab)
        })
        .await?;
        Ok(pull.head.sha)
    }

    async fn existing_comments(
        &self,
        pr: &PullRequestRef,
    ) -> Result<Vec<ExistingComment>, ReviewerError> {
        let url = format!(
            "{}/pulls/{}/comments?per_page={PER_PAGE}",
            self.repo_url(pr),
            pr.number
        );
        let comments: Vec<ReviewCommentPayload> = self.get_all(url).await?;
        Ok(comments
            .into_iter()
            .map(|c| ExistingComment {
                path: PathBuf::from(c.path),
                line: c.line.or(c.original_line),
                body: c.body,
            })
            .collect())
    }

    async fn post_line_comment(
        &self,
        pr: &PullRequestRef,
        commit_id: &str,
        comment: &RenderedComment,
    ) -> Result<(), ReviewerError> {
        let route = format!("/repos/{}/{}/pulls/{}/comments", pr.owner, pr.repo, pr.number);
        let body = serde_json::json!({
            "body": comment.body,
            "commit_id": commit_id,
            "path": comment.file_path.to_string_lossy(),
            "line": comment.line,
            "side": "RIGHT",
        });
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&body))
            .await
            .map_err(classify_octocrab)?;
        Ok(())
    }

    async fn post_summary(&self, pr: &PullRequestRef, body: &str) -> Result<(), ReviewerError> {
        let route = format!("/repos/{}/{}/issues/{}/comments", pr.owner, pr.repo, pr.number);
        let payload = serde_json::json!({ "body": body });
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(classify_octocrab)?;
        Ok(())
    }
}

fn classify_octocrab(err: octocrab::Error) -> ReviewerError {
    match &err {
        octocrab::Error::GitHub { source, .. } => classify_status(
            source.status_code.as_u16(),
            None,
            source.message.clone(),
            ReviewerError::Vcs,
        ),
        octocrab::Error::Serde { .. } | octocrab::Error::Json { .. } => {
            ReviewerError::Vcs(format!("unexpected GitHub response: {err}"))
        }
        _ => ReviewerError::Network(err.to_string()),
    }
}

/// Extract the `rel="next"` URL from a `Link` header.
///
/// # Examples
///
/// ```
/// use patchwise_review::github::next_link;
///
/// let header = r#"<https://api.github.com/x?page=2>; rel="next", <https://api.github.com/x?page=5>; rel="last""#;
/// assert_eq!(next_link(header).as_deref(), Some("https://api.github.com/x?page=2"));
/// assert_eq!(next_link(r#"<https://api.github.com/x?page=1>; rel="prev""#), None);
/// ```
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (url, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));
        if !is_next {
            return None;
        }
        let url = url.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(url.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_link_among_several_relations() {
        let header = "<https://api.github.com/r?page=1>; rel=\"prev\", \
                      <https://api.github.com/r?page=3>; rel=\"next\", \
                      <https://api.github.com/r?page=9>; rel=\"last\"";
        assert_eq!(
            next_link(header).as_deref(),
            Some("https://api.github.com/r?page=3")
        );
    }

    #[test]
    fn next_link_missing() {
        assert_eq!(next_link(""), None);
        assert_eq!(next_link("garbage"), None);
    }

    #[tokio::test]
    async fn empty_token_is_a_config_error() {
        let err = GitHubClient::new("  ", None, RetryPolicy::new(0))
            .err()
            .expect("empty token must fail");
        assert!(matches!(err, ReviewerError::Config(_)));
    }

    #[tokio::test]
    async fn custom_api_url_is_normalized() {
        let client = GitHubClient::new(
            "ghp_test",
            Some("https://github.example.com/api/v3/"),
            RetryPolicy::new(0),
        )
        .unwrap();
        let pr = PullRequestRef::from_repository("org/app", 5).unwrap();
        assert_eq!(
            client.repo_url(&pr),
            "https://github.example.com/api/v3/repos/org/app"
        );
    }

    #[test]
    fn pr_file_payload_decodes() {
        let json = r#"[{"filename":"src/a.rs","status":"renamed","previous_filename":"src/b.rs",
                        "patch":"@@ -1 +1 @@\n-a\n+b","additions":1}]"#;
        let files: Vec<PrFile> = serde_json::from_str(json).unwrap();
        assert_eq!(files[0].status.parse::<FileStatus>().unwrap(), FileStatus::Renamed);
        assert_eq!(files[0].previous_filename.as_deref(), Some("src/b.rs"));
    }
}
