//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use voicebill::capture::{CaptureEvent, CaptureEventKind, CaptureSink, SpeechCapture};
use voicebill::feedback::AudioRenderer;
use voicebill::interpreter::{CommandInterpreter, CommandRequest, CommandResponse};
use voicebill::transcript::CaptureSessionId;
use voicebill::{Cart, DispatchError, Dispatcher, Error, Result, SessionController};

/// Build a wire response from JSON, the way the server would send it
pub fn response(json: Value) -> CommandResponse {
    serde_json::from_value(json).expect("invalid test response")
}

/// Interpreter that answers from a script and records every request
#[derive(Default)]
pub struct ScriptedInterpreter {
    replies: Mutex<VecDeque<std::result::Result<CommandResponse, DispatchError>>>,
    requests: Mutex<Vec<CommandRequest>>,
    /// When set, every call waits for a notification before answering
    gate: Option<Arc<Notify>>,
}

impl ScriptedInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every answer until `gate` is notified
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn reply(self, json: Value) -> Self {
        self.replies.lock().unwrap().push_back(Ok(response(json)));
        self
    }

    pub fn fail(self, error: DispatchError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandInterpreter for ScriptedInterpreter {
    async fn interpret(
        &self,
        request: &CommandRequest,
    ) -> std::result::Result<CommandResponse, DispatchError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DispatchError::Malformed("script exhausted".to_string())))
    }
}

/// What a renderer was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Audio(Vec<u8>),
    Speech(String),
}

/// Renderer that records calls and can be told to fail audio playback
#[derive(Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<Rendered>>,
    stops: Mutex<usize>,
    fail_audio: bool,
    /// Playback length, for overlap tests
    duration: Duration,
    /// Cart observed each time playback starts
    pub observed: Mutex<Vec<Cart>>,
    /// Session to observe during playback
    pub session: OnceLock<Arc<SessionController>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_audio() -> Self {
        Self {
            fail_audio: true,
            ..Self::default()
        }
    }

    pub fn slow(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Rendered> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        *self.stops.lock().unwrap()
    }

    async fn record(&self, call: Rendered) {
        if let Some(session) = self.session.get() {
            self.observed.lock().unwrap().push(session.cart());
        }
        self.calls.lock().unwrap().push(call);
        if !self.duration.is_zero() {
            tokio::time::sleep(self.duration).await;
        }
    }
}

#[async_trait]
impl AudioRenderer for RecordingRenderer {
    async fn play_encoded_audio(&self, bytes: Vec<u8>) -> Result<()> {
        if self.fail_audio {
            return Err(Error::Playback("device busy".to_string()));
        }
        self.record(Rendered::Audio(bytes)).await;
        Ok(())
    }

    async fn speak(&self, text: &str) -> Result<()> {
        self.record(Rendered::Speech(text.to_string())).await;
        Ok(())
    }

    fn stop(&self) {
        *self.stops.lock().unwrap() += 1;
    }
}

/// Capture adapter driven by the test
#[derive(Default)]
pub struct FakeCapture {
    unavailable: bool,
    fail_start: bool,
    active: Mutex<Option<(CaptureSessionId, CaptureSink)>>,
    starts: Mutex<Vec<CaptureSessionId>>,
    stops: Mutex<usize>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    /// Push an event for the most recently started session
    pub fn emit(&self, kind: CaptureEventKind) {
        let active = self.active.lock().unwrap();
        let (session, sink) = active.as_ref().expect("capture not started");
        sink.send(CaptureEvent {
            session: *session,
            kind,
        })
        .expect("receiver dropped");
    }

    /// Push an event tagged with an arbitrary session
    pub fn emit_for(&self, session: CaptureSessionId, kind: CaptureEventKind) {
        let active = self.active.lock().unwrap();
        let (_, sink) = active.as_ref().expect("capture not started");
        let _ = sink.send(CaptureEvent { session, kind });
    }

    pub fn starts(&self) -> Vec<CaptureSessionId> {
        self.starts.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        *self.stops.lock().unwrap()
    }
}

#[async_trait]
impl SpeechCapture for FakeCapture {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn start(&self, session: CaptureSessionId, events: CaptureSink) -> Result<()> {
        if self.fail_start {
            return Err(Error::Capture("microphone permission denied".to_string()));
        }
        self.starts.lock().unwrap().push(session);
        *self.active.lock().unwrap() = Some((session, events));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.stops.lock().unwrap() += 1;
        Ok(())
    }
}

/// Controller wired to fakes
pub fn session_with(
    interpreter: Arc<ScriptedInterpreter>,
    renderer: Arc<RecordingRenderer>,
) -> SessionController {
    SessionController::new(Dispatcher::new(interpreter), renderer)
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().expect("no local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });

    format!("http://{addr}")
}

/// Base URL of a port nothing listens on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    drop(listener);
    format!("http://{addr}")
}
