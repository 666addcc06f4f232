//! `GithubClient` against a stub GitHub API served on localhost.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use issue_metadata::storage::body::{BodyStorage, GithubClient, IssueHost};
use issue_metadata::{Context, Error, IssueRef, Metadata};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Clone, Default)]
struct StubState {
    body: Arc<Mutex<Option<String>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    fail_with: Option<StatusCode>,
}

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: &'static str,
    path: String,
    authorization: Option<String>,
    accept: Option<String>,
    user_agent: Option<String>,
}

struct GithubStub {
    base_url: String,
    state: StubState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl GithubStub {
    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn record(
    state: &StubState,
    method: &'static str,
    (owner, repo, number): (String, String, u64),
    headers: &HeaderMap,
) {
    state.requests.lock().await.push(RecordedRequest {
        method,
        path: format!("/repos/{owner}/{repo}/issues/{number}"),
        authorization: header(headers, "authorization"),
        accept: header(headers, "accept"),
        user_agent: header(headers, "user-agent"),
    });
}

async fn get_issue(
    State(state): State<StubState>,
    Path(path): Path<(String, String, u64)>,
    headers: HeaderMap,
) -> Response {
    record(&state, "GET", path, &headers).await;
    if let Some(status) = state.fail_with {
        return (status, Json(json!({"message": "Not Found"}))).into_response();
    }
    let body = state.body.lock().await.clone();
    Json(json!({ "number": 42, "body": body })).into_response()
}

async fn update_issue(
    State(state): State<StubState>,
    Path(path): Path<(String, String, u64)>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    record(&state, "PATCH", path, &headers).await;
    let body = request["body"].as_str().map(str::to_string);
    *state.body.lock().await = body.clone();
    Json(json!({ "number": 42, "body": body })).into_response()
}

async fn spawn_github_stub(
    body: Option<&str>,
    fail_with: Option<StatusCode>,
) -> anyhow::Result<GithubStub> {
    let state = StubState {
        body: Arc::new(Mutex::new(body.map(str::to_string))),
        fail_with,
        ..StubState::default()
    };
    let app = Router::new()
        .route(
            "/repos/:owner/:repo/issues/:number",
            get(get_issue).patch(update_issue),
        )
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        let _ = server.await;
    });

    Ok(GithubStub {
        base_url: format!("http://{addr}"),
        state,
        shutdown: Some(shutdown_tx),
    })
}

#[tokio::test]
async fn test_set_round_trips_through_api() -> anyhow::Result<()> {
    let stub = spawn_github_stub(None, None).await?;
    let client = GithubClient::new(&stub.base_url, Some("secret-token".to_string()))?;
    let context = Context::new(1).with_issue("foo", "bar", 42);
    let metadata = Metadata::new(BodyStorage::for_context(Arc::new(client), &context)?);

    metadata.set_pair("hello", "world").await?;

    assert_eq!(
        stub.state.body.lock().await.as_deref(),
        Some("\n\n<!-- probot = {\"1\":{\"hello\":\"world\"}} -->")
    );

    let requests = stub.state.requests.lock().await.clone();
    let methods: Vec<_> = requests.iter().map(|r| r.method).collect();
    assert_eq!(methods, ["GET", "PATCH"]);
    for request in &requests {
        assert_eq!(request.path, "/repos/foo/bar/issues/42");
        assert_eq!(request.authorization.as_deref(), Some("Bearer secret-token"));
        assert_eq!(request.accept.as_deref(), Some("application/vnd.github+json"));
        assert!(request.user_agent.as_deref().is_some_and(|ua| ua.starts_with("issue-metadata/")));
    }

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_get_reads_existing_marker() -> anyhow::Result<()> {
    let stub = spawn_github_stub(
        Some("original post\n\n<!-- probot = {\"1\":{\"key\":\"value\"}} -->"),
        None,
    )
    .await?;
    let client = GithubClient::new(&stub.base_url, None)?;
    let context = Context::new(1).with_issue("foo", "bar", 42);
    let metadata = Metadata::new(BodyStorage::for_context(Arc::new(client), &context)?);

    assert_eq!(metadata.get_key("key").await?, Some(json!("value")));

    let requests = stub.state.requests.lock().await.clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization, None);

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_error_status_is_reported() -> anyhow::Result<()> {
    let stub = spawn_github_stub(None, Some(StatusCode::NOT_FOUND)).await?;
    let client = GithubClient::new(&stub.base_url, None)?;

    let result = client.get_issue(&IssueRef::new("foo", "bar", 42)).await;

    match result {
        Err(Error::RemoteStatus {
            operation,
            status,
            body,
        }) => {
            assert_eq!(operation, "get_issue");
            assert_eq!(status, 404);
            assert!(body.contains("Not Found"));
        }
        other => panic!("expected RemoteStatus, got {other:?}"),
    }

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = GithubClient::new(format!("http://{addr}"), None)?;
    let result = client.get_issue(&IssueRef::new("foo", "bar", 42)).await;

    assert!(matches!(
        result,
        Err(Error::RemoteTransport {
            operation: "get_issue",
            ..
        })
    ));
    Ok(())
}
