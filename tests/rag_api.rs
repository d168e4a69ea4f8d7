use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rag_gateway::llm::LlmClient;
use rag_gateway::middleware::REMAINING_HEADER;
use rag_gateway::{AppState, QuotaConfig, QuotaTracker, build_router};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use tower::ServiceExt;

const KEY: &str = "test-admin-key";

// Largest embeddings batch the mock provider accepts
const MOCK_MAX_INPUTS: usize = 4;

// Toy embedding: one axis per keyword plus a small bias
fn embed(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    vec![
        lower.matches("rust").count() as f32,
        lower.matches("python").count() as f32,
        0.1,
    ]
}

async fn mock_embeddings(
    State(calls): State<Arc<AtomicUsize>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    calls.fetch_add(1, Ordering::SeqCst);
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    if inputs.len() > MOCK_MAX_INPUTS {
        return Err((StatusCode::BAD_REQUEST, "too many inputs"));
    }
    // reversed on purpose, the client must reorder by index
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(i, t)| json!({ "index": i, "embedding": embed(t.as_str().unwrap_or("")) }))
        .collect();
    Ok(Json(json!({ "object": "list", "data": data })))
}

async fn mock_chat(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["max_tokens"], 500);
    Json(json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": "  grounded answer\n" } }]
    }))
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

// Mock provider plus a counter of embeddings requests it served
async fn spawn_counting_mock_llm() -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/v1/embeddings", post(mock_embeddings))
        .route("/v1/chat/completions", post(mock_chat))
        .with_state(Arc::clone(&calls));
    (serve(app).await, calls)
}

async fn spawn_mock_llm() -> String {
    spawn_counting_mock_llm().await.0
}

// Provider that fails every call with an internal message in the body
async fn spawn_failing_llm() -> String {
    let fail = || async {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "provider internal: account sk-secret-123 over budget",
        )
    };
    let app = Router::new()
        .route("/v1/embeddings", post(fail))
        .route("/v1/chat/completions", post(fail));
    serve(app).await
}

fn llm(base_url: &str) -> LlmClient {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    LlmClient::from_client(client, base_url, Some("sk-test".into()), "embed-model", "chat-model")
}

fn app_state(llm: LlmClient, limit: u32, index_path: Option<PathBuf>) -> AppState {
    let quota = Arc::new(QuotaTracker::new(QuotaConfig::new(limit, "/query")).unwrap());
    AppState::new(llm, quota, KEY)
        .with_chunking(5, 1)
        .with_top_k(2)
        .with_index_path(index_path)
}

fn state(base_url: &str, limit: u32) -> Arc<AppState> {
    Arc::new(app_state(llm(base_url), limit, None))
}

fn multipart_request(path: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let boundary = "rag-gateway-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(path)
        .header("x-api-key", KEY)
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, path: &str, key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, path: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_open_and_annotated() {
    let app = build_router(state("http://127.0.0.1:9/v1", 7));

    let res = app.oneshot(empty_request("GET", "/health", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[REMAINING_HEADER], "7");
    assert_eq!(body_json(res).await["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_api_key() {
    let app = build_router(state("http://127.0.0.1:9/v1", 5));

    let res = app
        .clone()
        .oneshot(empty_request("GET", "/index/info", Some("wrong")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(res).await["detail"],
        "Invalid or missing X-API-KEY header."
    );

    // quota runs before auth, so a rejected query is still charged
    let res = app
        .clone()
        .oneshot(json_request("POST", "/query", None, json!({ "query": "hi" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[REMAINING_HEADER], "4");
}

#[tokio::test]
async fn empty_inputs_are_bad_requests() {
    let app = build_router(state("http://127.0.0.1:9/v1", 5));

    let res = app
        .clone()
        .oneshot(json_request("POST", "/ingest/text", Some(KEY), json!({ "texts": [] })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["detail"], "No texts provided.");

    let res = app
        .oneshot(json_request("POST", "/query", Some(KEY), json!({ "query": "   " })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["detail"], "Empty query.");
}

#[tokio::test]
async fn ingest_query_and_clear_round_trip() {
    let base = spawn_mock_llm().await;
    let app = build_router(state(&base, 10));

    // nothing indexed yet
    let res = app
        .clone()
        .oneshot(json_request("POST", "/query", Some(KEY), json!({ "query": "rust?" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["answer"], "I don't know based on provided documents.");
    assert_eq!(json["retrieved"], json!([]));

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/ingest/text",
            Some(KEY),
            json!({ "texts": ["rust is fast", "python is dynamic"], "namespace": "langs" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["indexed_chunks"], 2);

    let res = app
        .clone()
        .oneshot(empty_request("GET", "/index/info", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["count"], 2);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/query",
            Some(KEY),
            json!({ "query": "Tell me about Rust", "k": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[REMAINING_HEADER], "8");
    let json = body_json(res).await;
    assert_eq!(json["answer"], "grounded answer");
    let retrieved = json["retrieved"].as_array().unwrap();
    assert_eq!(retrieved.len(), 1);
    assert_eq!(retrieved[0]["text_preview"], "rust is fast");
    assert_eq!(retrieved[0]["metadata"]["namespace"], "langs");
    assert_eq!(retrieved[0]["metadata"]["doc_id"], 0);

    let res = app
        .clone()
        .oneshot(empty_request("POST", "/index/clear", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "cleared");

    let res = app
        .oneshot(empty_request("GET", "/index/info", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["count"], 0);
}

#[tokio::test]
async fn query_quota_is_enforced_through_the_full_router() {
    let base = spawn_mock_llm().await;
    let app = build_router(state(&base, 2));

    for _ in 0..2 {
        let res = app
            .clone()
            .oneshot(json_request("POST", "/query", Some(KEY), json!({ "query": "rust" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app
        .clone()
        .oneshot(json_request("POST", "/query", Some(KEY), json!({ "query": "rust" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()[REMAINING_HEADER], "0");

    // ingest is not guarded
    let res = app
        .oneshot(json_request("POST", "/ingest/text", Some(KEY), json!({ "texts": ["rust"] })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[REMAINING_HEADER], "0");
}

#[tokio::test]
async fn unreachable_llm_is_a_bad_gateway() {
    // nothing listens on the discard port
    let app = build_router(state("http://127.0.0.1:9/v1", 5));

    let res = app
        .oneshot(json_request("POST", "/ingest/text", Some(KEY), json!({ "texts": ["rust"] })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(res.headers().contains_key(REMAINING_HEADER));
}

#[tokio::test]
async fn txt_upload_is_chunked_and_searchable() {
    let base = spawn_mock_llm().await;
    let app = build_router(state(&base, 10));

    let res = app
        .clone()
        .oneshot(multipart_request(
            "/ingest/upload?namespace=notes",
            "Notes.TXT",
            b"rust is fast\nrust is safe",
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["file"], "notes.txt");
    // six words, windows of five stepping by four
    assert_eq!(json["indexed_chunks"], 2);

    let res = app
        .oneshot(json_request(
            "POST",
            "/query",
            Some(KEY),
            json!({ "query": "rust", "namespace": "notes" }),
        ))
        .await
        .unwrap();
    let json = body_json(res).await;
    let retrieved = json["retrieved"].as_array().unwrap();
    assert_eq!(retrieved.len(), 2);
    assert_eq!(retrieved[0]["metadata"]["filename"], "notes.txt");
    assert_eq!(retrieved[0]["metadata"]["namespace"], "notes");
}

#[tokio::test]
async fn upload_rejects_unsupported_and_empty_files() {
    let app = build_router(state("http://127.0.0.1:9/v1", 10));

    let res = app
        .clone()
        .oneshot(multipart_request("/ingest/upload", "slides.docx", b"rust"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["detail"],
        "Unsupported file type. Use .pdf or .txt"
    );

    let res = app
        .oneshot(multipart_request("/ingest/upload", "empty.txt", b"  \n\t "))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["detail"], "No text extracted from file.");
}

#[tokio::test]
async fn large_ingest_is_split_into_embedding_batches() {
    let (base, calls) = spawn_counting_mock_llm().await;
    let state = Arc::new(app_state(llm(&base).with_embed_batch(2), 10, None));
    let app = build_router(state);

    let texts: Vec<String> = (0..5).map(|i| format!("rust doc {i}")).collect();
    let res = app
        .oneshot(json_request("POST", "/ingest/text", Some(KEY), json!({ "texts": texts })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["indexed_chunks"], 5);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn provider_error_text_is_not_forwarded() {
    let base = spawn_failing_llm().await;
    let app = build_router(state(&base, 10));

    let res = app
        .oneshot(json_request("POST", "/ingest/text", Some(KEY), json!({ "texts": ["rust"] })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let detail = body_json(res).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("500"), "{detail}");
    assert!(!detail.contains("sk-secret"), "{detail}");
}

#[tokio::test]
async fn index_snapshot_survives_restart_and_clear() {
    let base = spawn_mock_llm().await;
    let path = std::env::temp_dir().join(format!("rag-gateway-api-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let first = Arc::new(app_state(llm(&base), 10, Some(path.clone())));
    let res = build_router(Arc::clone(&first))
        .oneshot(json_request(
            "POST",
            "/ingest/text",
            Some(KEY),
            json!({ "texts": ["rust is fast", "python is dynamic"] }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let second = Arc::new(app_state(llm(&base), 10, Some(path.clone())));
    assert_eq!(second.restore_index().await.unwrap(), 2);
    assert_eq!(second.store.count(), 2);

    let res = build_router(Arc::clone(&second))
        .oneshot(empty_request("POST", "/index/clear", Some(KEY)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let third = app_state(llm(&base), 10, Some(path.clone()));
    assert_eq!(third.restore_index().await.unwrap(), 0);

    let _ = std::fs::remove_file(&path);
}
