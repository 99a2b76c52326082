use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::FramePipeline;
use crate::session::{CloseReason, FrameTransport, Session};

/// Adapts an axum WebSocket to the session's text channel.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.socket.recv().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                // Clients only send JSON text; anything else is a protocol violation
                Some(Ok(Message::Binary(_))) => anyhow::bail!("binary frames are not supported"),
                // axum answers pings itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Err(e)) => return Err(e).context("receiving frame"),
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .context("sending response")
    }

    async fn close(&mut self) {
        // The peer may already be gone; nothing left to report in that case
        let _ = self.socket.send(Message::Close(None)).await;
    }
}

#[derive(Clone)]
pub struct AppState {
    pipeline: FramePipeline,
    frame_timeout: Option<Duration>,
    next_session: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(pipeline: FramePipeline, frame_timeout: Option<Duration>) -> Self {
        Self {
            pipeline,
            frame_timeout,
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let id = state.next_session.fetch_add(1, Ordering::Relaxed);
    ws.on_upgrade(move |socket| async move {
        let session = Session::new(id, WsTransport::new(socket), state.pipeline, state.frame_timeout);
        let summary = session.run().await;
        match summary.reason {
            CloseReason::PeerDisconnected => {}
            CloseReason::Transport(e) => tracing::warn!(session = id, "Transport error: {e}"),
            CloseReason::Frame(e) => {
                tracing::warn!(session = id, kind = e.kind(), "Session ended by frame fault")
            }
        }
    })
}

async fn health_check() -> Json<serde_json::Value> {
    tracing::info!("Health check requested");
    Json(serde_json::json!({ "status": "healthy" }))
}

pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RuleBasedClassifier;
    use crate::landmarker::{shared, NullLandmarker};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_healthy() {
        let pipeline = FramePipeline::new(shared(NullLandmarker), Arc::new(RuleBasedClassifier::new()));
        let app = router(AppState::new(pipeline, None));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "healthy" }));
    }
}
