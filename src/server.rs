use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::types::{SendUrlsRequest, SendUrlsResponse, StatusBody, VersionBody};

/// Behaviour of the stand-in helper.
#[derive(Debug, Clone)]
pub struct StubOptions {
    pub version: String,
    /// Value served under `status`; anything but `running` reads as absent.
    pub status: String,
    /// When set, every job is refused with this message.
    pub reject_with: Option<String>,
}

impl Default for StubOptions {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "running".into(),
            reject_with: None,
        }
    }
}

/// Handle to a running stub; jobs it accepted are kept for inspection.
#[derive(Clone)]
pub struct StubState {
    inner: Arc<RwLock<StubInner>>,
}

#[derive(Debug)]
struct StubInner {
    options: StubOptions,
    jobs: Vec<SendUrlsRequest>,
}

impl StubState {
    pub fn new(options: StubOptions) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StubInner {
                options,
                jobs: Vec::new(),
            })),
        }
    }

    pub async fn jobs(&self) -> Vec<SendUrlsRequest> {
        self.inner.read().await.jobs.clone()
    }
}

/// Routes of the helper's local API: `/status`, `/version`, `/send-urls`.
pub fn router(state: StubState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/version", get(get_version))
        .route("/send-urls", post(post_send_urls))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `bind` and serve in a background task. Returns the bound address,
/// which matters when binding port 0.
pub async fn spawn_stub(bind: &str, state: StubState) -> Result<SocketAddr> {
    let listener = TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    let app = router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "stub helper stopped");
        }
    });
    info!(%addr, "stub helper listening");
    Ok(addr)
}

async fn get_status(State(stub): State<StubState>) -> impl IntoResponse {
    let s = stub.inner.read().await;
    (
        StatusCode::OK,
        Json(StatusBody {
            status: s.options.status.clone(),
        }),
    )
}

async fn get_version(State(stub): State<StubState>) -> impl IntoResponse {
    let s = stub.inner.read().await;
    (
        StatusCode::OK,
        Json(VersionBody {
            version: s.options.version.clone(),
        }),
    )
}

async fn post_send_urls(
    State(stub): State<StubState>,
    Json(req): Json<SendUrlsRequest>,
) -> impl IntoResponse {
    let mut s = stub.inner.write().await;
    if let Some(msg) = s.options.reject_with.clone() {
        return (
            StatusCode::OK,
            Json(SendUrlsResponse {
                success: false,
                error: Some(msg),
            }),
        );
    }
    info!(session = %req.session, "job received");
    s.jobs.push(req);
    (
        StatusCode::OK,
        Json(SendUrlsResponse {
            success: true,
            error: None,
        }),
    )
}
