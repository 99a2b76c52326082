//! One connection's request/response loop as an explicit state machine.
//!
//! ```text
//! Open -> ReceivingFrame -> ProcessingFrame -> SendingResponse -> ReceivingFrame ...
//!                 |                 |                  |
//!                 +-----------------+------------------+--> Closed
//! ```
//!
//! A fault in any frame closes the connection: there is no error frame and
//! no skipping. The peer sees the stream end after its last good response.

use anyhow::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::error::FrameError;
use crate::pipeline::{decode_message, FramePipeline};
use crate::protocol::GestureResponse;

/// A persistent, ordered, bidirectional text channel to one client.
#[async_trait]
pub trait FrameTransport: Send {
    /// Next text message; `Ok(None)` once the peer has disconnected.
    async fn recv(&mut self) -> Result<Option<String>>;
    async fn send(&mut self, text: String) -> Result<()>;
    /// Connection teardown. Called exactly once per session.
    async fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    ReceivingFrame,
    ProcessingFrame,
    SendingResponse,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    FrameReceived,
    PeerDisconnected,
    ResponseReady,
    ResponseSent,
    Failed,
}

impl SessionState {
    pub fn next(self, event: SessionEvent) -> SessionState {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (S::Open, E::Started) => S::ReceivingFrame,
            (S::ReceivingFrame, E::FrameReceived) => S::ProcessingFrame,
            (S::ProcessingFrame, E::ResponseReady) => S::SendingResponse,
            (S::SendingResponse, E::ResponseSent) => S::ReceivingFrame,
            (_, E::PeerDisconnected) | (_, E::Failed) => S::Closed,
            // Anything else is a loop bug; close rather than continue in an unknown state
            _ => S::Closed,
        }
    }

    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

#[derive(Debug)]
pub enum CloseReason {
    PeerDisconnected,
    Transport(String),
    Frame(FrameError),
}

#[derive(Debug)]
pub struct SessionSummary {
    pub id: u64,
    pub frames_answered: u64,
    pub reason: CloseReason,
}

pub struct Session<T: FrameTransport> {
    id: u64,
    transport: T,
    pipeline: FramePipeline,
    frame_timeout: Option<Duration>,
    state: SessionState,
}

impl<T: FrameTransport> Session<T> {
    pub fn new(id: u64, transport: T, pipeline: FramePipeline, frame_timeout: Option<Duration>) -> Self {
        Self {
            id,
            transport,
            pipeline,
            frame_timeout,
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn fire(&mut self, event: SessionEvent) {
        let next = self.state.next(event);
        tracing::trace!(session = self.id, from = ?self.state, ?event, to = ?next, "transition");
        self.state = next;
    }

    /// Drives the loop to `Closed` and tears the connection down once.
    pub async fn run(mut self) -> SessionSummary {
        tracing::info!(session = self.id, "WebSocket client connected");
        self.fire(SessionEvent::Started);

        let mut frames_answered = 0;
        let reason = loop {
            // ReceivingFrame
            let text = match self.transport.recv().await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    self.fire(SessionEvent::PeerDisconnected);
                    break CloseReason::PeerDisconnected;
                }
                Err(e) => {
                    self.fire(SessionEvent::Failed);
                    break CloseReason::Transport(format!("{e:#}"));
                }
            };
            self.fire(SessionEvent::FrameReceived);

            // ProcessingFrame
            let response = match process_frame(self.pipeline.clone(), self.frame_timeout, text).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(session = self.id, kind = e.kind(), "WebSocket error: {e}");
                    self.fire(SessionEvent::Failed);
                    break CloseReason::Frame(e);
                }
            };
            let payload = match response.to_json() {
                Ok(payload) => payload,
                Err(e) => {
                    self.fire(SessionEvent::Failed);
                    break CloseReason::Transport(format!("encoding response: {e}"));
                }
            };
            self.fire(SessionEvent::ResponseReady);

            // SendingResponse
            tracing::debug!(session = self.id, "Sending response: {payload}");
            if let Err(e) = self.transport.send(payload).await {
                self.fire(SessionEvent::Failed);
                break CloseReason::Transport(format!("{e:#}"));
            }
            frames_answered += 1;
            self.fire(SessionEvent::ResponseSent);
        };

        debug_assert!(self.state.is_closed());
        self.transport.close().await;
        tracing::info!(session = self.id, frames = frames_answered, "WebSocket client disconnected");

        SessionSummary {
            id: self.id,
            frames_answered,
            reason,
        }
    }
}

/// Runs the CPU-bound frame work off the async workers, under the timeout.
///
/// The limit covers decode, extract and classify. Waiting for the shared
/// estimator while another connection uses it is not charged to this frame.
async fn process_frame(
    pipeline: FramePipeline,
    frame_timeout: Option<Duration>,
    text: String,
) -> Result<GestureResponse, FrameError> {
    let limit_ms = frame_timeout.map_or(0, |limit| limit.as_millis() as u64);

    let started = Instant::now();
    let decode = tokio::task::spawn_blocking(move || decode_message(&text));
    let frame = within(decode, frame_timeout, limit_ms).await?;
    let remaining = frame_timeout.map(|limit| limit.saturating_sub(started.elapsed()));

    let mut landmarker = pipeline.landmarker().clone().lock_owned().await;
    let infer = tokio::task::spawn_blocking(move || pipeline.process_with(&mut **landmarker, &frame));
    within(infer, remaining, limit_ms).await
}

async fn within<T>(
    work: JoinHandle<Result<T, FrameError>>,
    budget: Option<Duration>,
    limit_ms: u64,
) -> Result<T, FrameError> {
    let joined = match budget {
        Some(budget) => tokio::time::timeout(budget, work)
            .await
            .map_err(|_| FrameError::Timeout(limit_ms))?,
        None => work.await,
    };
    joined.map_err(|e| FrameError::Aborted(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::SessionEvent as E;
    use super::SessionState as S;

    #[test]
    fn happy_path_cycles_back_to_receiving() {
        let mut state = S::Open;
        for event in [E::Started, E::FrameReceived, E::ResponseReady, E::ResponseSent] {
            state = state.next(event);
        }
        assert_eq!(state, S::ReceivingFrame);
    }

    #[test]
    fn any_failure_closes() {
        for state in [S::Open, S::ReceivingFrame, S::ProcessingFrame, S::SendingResponse] {
            assert_eq!(state.next(E::Failed), S::Closed);
            assert_eq!(state.next(E::PeerDisconnected), S::Closed);
        }
    }

    #[test]
    fn closed_is_terminal() {
        for event in [
            E::Started,
            E::FrameReceived,
            E::ResponseReady,
            E::ResponseSent,
            E::Failed,
        ] {
            assert_eq!(S::Closed.next(event), S::Closed);
        }
    }

    #[test]
    fn out_of_order_events_close() {
        assert_eq!(S::ReceivingFrame.next(E::ResponseSent), S::Closed);
        assert_eq!(S::Open.next(E::FrameReceived), S::Closed);
    }
}
