use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_LLM: &str = "/llm";
pub const PATH_IMAGE: &str = "/text-to-image";
pub const PATH_FAIL: &str = "/fail";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_STREAM: &str = "/stream";

/// First bytes of a PNG file; enough for tests to recognize a persisted image.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

#[derive(Debug, Clone)]
pub struct TestServerConfig {
    /// Number of generation requests (LLM or image) answered with 503 before the server starts
    /// answering normally. Shared across all callers.
    pub fail_first: u64,
    /// Number of image urls returned per image generation response.
    pub images_per_response: usize,
    /// Path prefix used for returned image urls. Point this at an unknown prefix to
    /// simulate broken image links.
    pub image_url_prefix: String,
    /// Delay applied by the slow route.
    pub slow_delay: Duration,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            fail_first: 0,
            images_per_response: 1,
            image_url_prefix: PATH_STREAM.to_string(),
            slow_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    llm_requests: Arc<AtomicU64>,
    image_requests: Arc<AtomicU64>,
    image_fetches: Arc<AtomicU64>,
    failed_responses: Arc<AtomicU64>,
    saw_event_stream_accept: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn llm_requests(&self) -> u64 {
        self.llm_requests.load(Ordering::Relaxed)
    }

    pub fn image_requests(&self) -> u64 {
        self.image_requests.load(Ordering::Relaxed)
    }

    pub fn image_fetches(&self) -> u64 {
        self.image_fetches.load(Ordering::Relaxed)
    }

    pub fn failed_responses(&self) -> u64 {
        self.failed_responses.load(Ordering::Relaxed)
    }

    pub fn saw_event_stream_accept(&self) -> u64 {
        self.saw_event_stream_accept.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
struct AppState {
    stats: TestServerStats,
    fail_remaining: Arc<AtomicU64>,
    images_per_response: usize,
    image_url_prefix: Arc<str>,
    slow_delay: Duration,
}

impl AppState {
    fn new(cfg: TestServerConfig, stats: TestServerStats) -> Self {
        Self {
            stats,
            fail_remaining: Arc::new(AtomicU64::new(cfg.fail_first)),
            images_per_response: cfg.images_per_response,
            image_url_prefix: Arc::from(cfg.image_url_prefix),
            slow_delay: cfg.slow_delay,
        }
    }

    /// Consume one scheduled failure, if any remain.
    fn take_failure(&self) -> bool {
        self.fail_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    fn track_headers(&self, headers: &HeaderMap) {
        if headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/event-stream"))
        {
            TestServerStats::inc(&self.stats.saw_event_stream_accept);
        }
        if headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
        {
            TestServerStats::inc(&self.stats.saw_json_content_type);
        }
    }

    fn unavailable(&self) -> Response {
        TestServerStats::inc(&self.stats.failed_responses);
        (StatusCode::SERVICE_UNAVAILABLE, "gateway busy").into_response()
    }
}

#[derive(Debug, Deserialize)]
struct LlmRequest {
    model: String,
    messages: Vec<LlmMessage>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct LlmMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct LlmResponse {
    model: String,
    choices: Vec<LlmChoice>,
    tokens_used: u32,
}

#[derive(Debug, Serialize)]
struct LlmChoice {
    index: u32,
    message: LlmReply,
}

#[derive(Debug, Serialize)]
struct LlmReply {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ImageRequest {
    model_id: String,
    prompt: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct ImageResponse {
    images: Vec<ImageRef>,
}

#[derive(Debug, Serialize)]
struct ImageRef {
    url: String,
    seed: u64,
}

async fn handle_llm(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    TestServerStats::inc(&state.stats.requests_total);
    TestServerStats::inc(&state.stats.llm_requests);
    state.track_headers(&headers);

    if state.take_failure() {
        return state.unavailable();
    }

    let req: LlmRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad json").into_response(),
    };
    if req.stream || req.messages.is_empty() || req.max_tokens == 0 {
        return (StatusCode::UNPROCESSABLE_ENTITY, "unsupported request").into_response();
    }

    let prompt = req
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let res = LlmResponse {
        model: req.model,
        choices: vec![LlmChoice {
            index: 0,
            message: LlmReply {
                role: "assistant",
                content: format!("echo: {prompt}"),
            },
        }],
        tokens_used: req.max_tokens.min(16),
    };

    axum::Json(res).into_response()
}

async fn handle_image(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    TestServerStats::inc(&state.stats.requests_total);
    TestServerStats::inc(&state.stats.image_requests);
    state.track_headers(&headers);

    if state.take_failure() {
        return state.unavailable();
    }

    let req: ImageRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad json").into_response(),
    };
    if req.model_id.is_empty() || req.prompt.is_empty() || req.width == 0 || req.height == 0 {
        return (StatusCode::UNPROCESSABLE_ENTITY, "unsupported request").into_response();
    }

    let serial = state.stats.image_requests();
    let images = (0..state.images_per_response)
        .map(|i| ImageRef {
            url: format!("{}/img-{serial}-{i}.png", state.image_url_prefix),
            seed: serial * 100 + i as u64,
        })
        .collect();

    axum::Json(ImageResponse { images }).into_response()
}

async fn handle_stream(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    TestServerStats::inc(&state.stats.requests_total);
    TestServerStats::inc(&state.stats.image_fetches);

    if !name.ends_with(".png") {
        return StatusCode::NOT_FOUND.into_response();
    }

    ([(header::CONTENT_TYPE, "image/png")], Bytes::from_static(FAKE_PNG)).into_response()
}

async fn handle_fail(State(state): State<AppState>, headers: HeaderMap) -> Response {
    TestServerStats::inc(&state.stats.requests_total);
    state.track_headers(&headers);
    TestServerStats::inc(&state.stats.failed_responses);
    (StatusCode::INTERNAL_SERVER_ERROR, "always failing").into_response()
}

async fn handle_slow(State(state): State<AppState>) -> &'static str {
    TestServerStats::inc(&state.stats.requests_total);
    sleep(state.slow_delay).await;
    "slow"
}

fn router_with_state(state: AppState) -> Router {
    Router::new()
        .route(PATH_LLM, post(handle_llm))
        .route(PATH_IMAGE, post(handle_image))
        .route(PATH_FAIL, post(handle_fail))
        .route(PATH_SLOW, post(handle_slow))
        .route(&format!("{PATH_STREAM}/{{name}}"), get(handle_stream))
        .with_state(state)
}

pub fn router(cfg: TestServerConfig, stats: TestServerStats) -> Router {
    router_with_state(AppState::new(cfg, stats))
}

pub struct TestServer {
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerConfig::default()).await
    }

    pub async fn start_with(cfg: TestServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(cfg, stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
