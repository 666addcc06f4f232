//! `FaunaClient` against a stub query endpoint served on localhost.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use issue_metadata::storage::document::{DocumentStorage, FaunaClient};
use issue_metadata::{Context, Error, Metadata, MetadataRecord};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Clone, Default)]
struct StubState {
    queries: Arc<Mutex<Vec<String>>>,
    authorization: Arc<Mutex<Option<String>>>,
    /// Value of the single document the stub holds.
    document: Arc<Mutex<Option<Value>>>,
    collection_exists: bool,
    reject_reads: bool,
}

struct FaunaStub {
    endpoint: String,
    state: StubState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FaunaStub {
    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn query_error(code: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

/// Pulls the JSON literal following `value: ` out of an upsert query.
fn upserted_value(fql: &str) -> Option<Value> {
    let start = fql.find("value: ")? + "value: ".len();
    let rest = fql[start..].replace("\\#{", "#{");
    serde_json::Deserializer::from_str(&rest)
        .into_iter::<Value>()
        .next()?
        .ok()
}

async fn query(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let fql = request["query"].as_str().unwrap_or_default().to_string();
    state.queries.lock().await.push(fql.clone());
    *state.authorization.lock().await = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if fql.starts_with("Collection.create") {
        if state.collection_exists {
            return query_error("constraint_failure", "Failed to create Collection.");
        }
        return Json(json!({ "data": { "name": "doc_1" } })).into_response();
    }
    if fql.starts_with("Collection.byName") {
        return Json(json!({ "data": { "name": "doc_1" } })).into_response();
    }
    if fql.starts_with("let doc") {
        let value = upserted_value(&fql);
        *state.document.lock().await = value.clone();
        return Json(json!({ "data": value })).into_response();
    }
    if state.reject_reads {
        return query_error("invalid_query", "The query failed 1 validation check");
    }
    let document = state.document.lock().await.clone();
    Json(json!({ "data": document })).into_response()
}

async fn spawn_fauna_stub(state: StubState) -> anyhow::Result<FaunaStub> {
    let app = Router::new()
        .route("/query/1", post(query))
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

    Ok(FaunaStub {
        endpoint: format!("http://{addr}"),
        state,
        shutdown: Some(shutdown_tx),
    })
}

fn context() -> Context {
    Context::new(1).with_issue("foo", "bar", 42)
}

#[tokio::test]
async fn test_get_initializes_then_queries() -> anyhow::Result<()> {
    let stub = spawn_fauna_stub(StubState::default()).await?;
    let client = FaunaClient::new(&stub.endpoint, "s3cret")?;
    let metadata = Metadata::new(DocumentStorage::new(Arc::new(client), &context())?);

    assert_eq!(metadata.get().await?, None);

    let queries = stub.state.queries.lock().await.clone();
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[0], "Collection.create({ name: \"doc_1\" })");
    assert!(queries[1].starts_with("Collection.byName(\"doc_1\")!.update("));
    assert!(queries[1].contains("unique_index_1"));
    assert_eq!(queries[2], "doc_1.unique_index_1(\"foo-bar_42\").first()?.value");
    assert_eq!(
        stub.state.authorization.lock().await.as_deref(),
        Some("Bearer s3cret")
    );

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_existing_collection_is_tolerated() -> anyhow::Result<()> {
    let stub = spawn_fauna_stub(StubState {
        collection_exists: true,
        ..StubState::default()
    })
    .await?;
    let client = FaunaClient::new(&stub.endpoint, "s3cret")?;
    let metadata = Metadata::new(DocumentStorage::new(Arc::new(client), &context())?);

    metadata.set_pair("hello", "world").await?;
    metadata.set_pair("key", "value").await?;

    assert_eq!(
        metadata.get().await?,
        Some(serde_json::from_value::<MetadataRecord>(json!({"hello": "world", "key": "value"}))?)
    );
    let queries = stub.state.queries.lock().await.clone();
    let creates = queries
        .iter()
        .filter(|q| q.starts_with("Collection.create"))
        .count();
    assert_eq!(creates, 1);

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_upsert_embeds_key_and_value() -> anyhow::Result<()> {
    let stub = spawn_fauna_stub(StubState::default()).await?;
    let client = FaunaClient::new(&stub.endpoint, "s3cret")?;
    let metadata = Metadata::new(DocumentStorage::new(Arc::new(client), &context())?);

    let stored = metadata.set_pair("note", "#{not interpolated}").await?;

    assert_eq!(stored.get("note"), Some(&json!("#{not interpolated}")));
    let queries = stub.state.queries.lock().await.clone();
    let upsert = queries.last().cloned().unwrap_or_default();
    assert!(upsert.contains("doc_1.unique_index_1(\"foo-bar_42\").first()"));
    assert!(upsert.contains("{ key: \"foo-bar_42\", value: {\"note\":\"\\#{not interpolated}\"} }"));

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_query_error_is_document_store_error() -> anyhow::Result<()> {
    let stub = spawn_fauna_stub(StubState {
        reject_reads: true,
        ..StubState::default()
    })
    .await?;
    let client = FaunaClient::new(&stub.endpoint, "s3cret")?;
    let metadata = Metadata::new(DocumentStorage::new(Arc::new(client), &context())?);

    match metadata.get().await {
        Err(Error::DocumentStore(message)) => assert!(message.contains("invalid_query")),
        other => panic!("expected DocumentStore error, got {other:?}"),
    }

    stub.stop().await;
    Ok(())
}
