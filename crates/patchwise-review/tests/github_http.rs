//! `GitHubClient` against a local HTTP server that answers from a script.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use patchwise_core::{RenderedComment, ReviewerError, Severity};
use patchwise_review::github::GitHubClient;
use patchwise_review::retry::RetryPolicy;
use patchwise_review::vcs::{PullRequestRef, VcsProvider};

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn with_header(mut self, name: &str, value: String) -> Self {
        self.headers.push((name.to_string(), value));
        self
    }
}

/// Arguments: request index, request line, server base URL.
type Script = dyn Fn(usize, &str, &str) -> Reply + Send + Sync;

struct StubServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    fn start(script: impl Fn(usize, &str, &str) -> Reply + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let script: Arc<Script> = Arc::new(script);
        let seen = Arc::clone(&requests);
        let server_base = base.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, &server_base, &seen, script.as_ref());
            }
        });

        Self { base, requests }
    }

    fn client(&self, retry: RetryPolicy) -> GitHubClient {
        GitHubClient::new("ghp_test", Some(&self.base), retry).unwrap()
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve(stream: TcpStream, base: &str, seen: &Mutex<Vec<String>>, script: &Script) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let request_line = request_line.trim_end().to_string();

    let mut content_length = 0;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).unwrap_or(0) == 0 || header == "\r\n" {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    let _ = reader.read_exact(&mut body);

    let index = {
        let mut seen = seen.lock().unwrap();
        seen.push(request_line.clone());
        seen.len() - 1
    };
    let reply = script(index, &request_line, base);

    let mut response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    response.push_str(&reply.body);

    let mut stream = stream;
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn pr() -> PullRequestRef {
    "octo/app#1".parse().unwrap()
}

fn comment() -> RenderedComment {
    RenderedComment {
        file_path: PathBuf::from("app.py"),
        line: 2,
        severity: Severity::High,
        body: "**AI Review:** Bug".into(),
    }
}

fn file_page(name: &str) -> String {
    format!(r#"[{{"filename":"{name}","status":"modified","patch":"@@ -1 +1 @@\n-a\n+b"}}]"#)
}

const SERVER_ERROR: &str = r#"{"message":"Server Error"}"#;

#[tokio::test]
async fn failed_line_comment_is_sent_once() {
    let server = StubServer::start(|_, _, _| Reply::json(502, SERVER_ERROR));
    let github = server.client(RetryPolicy::immediate(0));

    let err = github
        .post_line_comment(&pr(), "abc123", &comment())
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewerError::Network(_)), "got {err:?}");
    let requests = server.requests();
    assert_eq!(requests.len(), 1, "requests: {requests:?}");
    assert!(requests[0].starts_with("POST /repos/octo/app/pulls/1/comments"));
}

#[tokio::test]
async fn failed_summary_is_sent_once() {
    let server = StubServer::start(|_, _, _| Reply::json(502, SERVER_ERROR));
    let github = server.client(RetryPolicy::immediate(0));

    let err = github.post_summary(&pr(), "summary").await.unwrap_err();

    assert!(matches!(err, ReviewerError::Network(_)), "got {err:?}");
    let requests = server.requests();
    assert_eq!(requests.len(), 1, "requests: {requests:?}");
    assert!(requests[0].starts_with("POST /repos/octo/app/issues/1/comments"));
}

#[tokio::test]
async fn head_sha_retries_follow_the_policy_only() {
    let server = StubServer::start(|_, _, _| Reply::json(502, SERVER_ERROR));
    let github = server.client(RetryPolicy::immediate(2));

    let err = github.head_sha(&pr()).await.unwrap_err();

    assert!(matches!(err, ReviewerError::Network(_)), "got {err:?}");
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn head_sha_reads_the_head_commit() {
    let server =
        StubServer::start(|_, _, _| Reply::json(200, r#"{"head":{"sha":"deadbeef"}}"#));
    let github = server.client(RetryPolicy::immediate(0));

    assert_eq!(github.head_sha(&pr()).await.unwrap(), "deadbeef");
}

#[tokio::test]
async fn list_files_follows_next_links() {
    let server = StubServer::start(|index, _, base| match index {
        0 => Reply::json(200, &file_page("a.rs")).with_header(
            "Link",
            format!(
                r#"<{base}/repos/octo/app/pulls/1/files?per_page=100&page=2>; rel="next", <{base}/repos/octo/app/pulls/1/files?per_page=100&page=2>; rel="last""#
            ),
        ),
        _ => Reply::json(200, &file_page("b.rs")),
    });
    let github = server.client(RetryPolicy::immediate(0));

    let files = github.list_files(&pr()).await.unwrap();

    let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(paths, vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")]);
    assert_eq!(files[1].hunks.len(), 1);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /repos/octo/app/pulls/1/files?per_page=100 "));
    assert!(requests[1].contains("page=2"), "second request: {}", requests[1]);
}

#[tokio::test]
async fn unauthorized_listing_is_not_retried() {
    let server =
        StubServer::start(|_, _, _| Reply::json(401, r#"{"message":"Bad credentials"}"#));
    let github = server.client(RetryPolicy::immediate(3));

    let err = github.list_files(&pr()).await.unwrap_err();

    assert!(matches!(err, ReviewerError::Auth(_)), "got {err:?}");
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn missing_pull_request_is_a_vcs_error() {
    let server = StubServer::start(|_, _, _| Reply::json(404, r#"{"message":"Not Found"}"#));
    let github = server.client(RetryPolicy::immediate(3));

    let err = github.existing_comments(&pr()).await.unwrap_err();

    assert!(matches!(err, ReviewerError::Vcs(_)), "got {err:?}");
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn server_errors_on_listing_are_retried() {
    let server = StubServer::start(|index, _, _| match index {
        0 => Reply::json(503, SERVER_ERROR),
        _ => Reply::json(200, "[]"),
    });
    let github = server.client(RetryPolicy::immediate(2));

    let comments = github.existing_comments(&pr()).await.unwrap();

    assert!(comments.is_empty());
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = StubServer::start(|_, _, _| {
        Reply::json(429, r#"{"message":"rate limited"}"#).with_header("Retry-After", "7".into())
    });
    let github = server.client(RetryPolicy::immediate(0));

    let err = github.list_files(&pr()).await.unwrap_err();

    match err {
        ReviewerError::RateLimited { retry_after, .. } => assert_eq!(retry_after, Some(7)),
        other => panic!("expected rate limit, got {other:?}"),
    }
}
