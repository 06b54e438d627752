//! Microphone capture adapter
//!
//! Records one utterance on a dedicated thread, then transcribes it with a
//! cloud STT backend and reports the text as a final result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{CaptureEvent, CaptureSink, DetectorState, SpeechCapture, UtteranceDetector};
use crate::transcript::CaptureSessionId;
use crate::voice::{AudioRecorder, SAMPLE_RATE, SpeechToText, samples_to_wav};
use crate::{Error, Result};

/// How often the recorder thread drains the input buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounds on a single utterance
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    /// How long to wait for speech to start
    pub listen_timeout: Duration,
    /// Longest utterance recorded once speech has started
    pub phrase_limit: Duration,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            listen_timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(8),
        }
    }
}

struct ActiveCapture {
    session: CaptureSessionId,
    stop: Arc<AtomicBool>,
}

/// Captures speech from the default input device
pub struct MicrophoneCapture {
    stt: Arc<SpeechToText>,
    limits: CaptureLimits,
    active: Mutex<Option<ActiveCapture>>,
}

impl MicrophoneCapture {
    /// Create an adapter transcribing with `stt`
    #[must_use]
    pub fn new(stt: SpeechToText, limits: CaptureLimits) -> Self {
        Self {
            stt: Arc::new(stt),
            limits,
            active: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SpeechCapture for MicrophoneCapture {
    fn is_available(&self) -> bool {
        AudioRecorder::input_available()
    }

    async fn start(&self, session: CaptureSessionId, events: CaptureSink) -> Result<()> {
        if !self.is_available() {
            return Err(Error::CaptureUnavailable);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ActiveCapture {
                session,
                stop: Arc::clone(&stop),
            });
        if let Some(previous) = previous {
            tracing::debug!(session = %previous.session, "superseding capture session");
            previous.stop.store(true, Ordering::SeqCst);
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let limits = self.limits;

        std::thread::Builder::new()
            .name(format!("voicebill-mic-{}", session.get()))
            .spawn(move || record_utterance(&stop, limits, ready_tx, done_tx))?;

        ready_rx
            .await
            .map_err(|_| Error::Capture("recorder thread exited before starting".to_string()))??;

        tracing::info!(session = %session, "listening");

        let stt = Arc::clone(&self.stt);
        tokio::spawn(async move {
            match done_rx.await {
                Ok(samples) if samples.is_empty() => {
                    tracing::debug!(session = %session, "no speech captured");
                }
                Ok(samples) => {
                    let _ = events.send(transcribe(&stt, session, &samples).await);
                }
                Err(_) => {
                    let _ = events.send(CaptureEvent::error(session, "recorder stopped unexpectedly"));
                }
            }
            let _ = events.send(CaptureEvent::ended(session));
        });

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(active) = active {
            tracing::debug!(session = %active.session, "stopping capture");
            active.stop.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

async fn transcribe(stt: &SpeechToText, session: CaptureSessionId, samples: &[f32]) -> CaptureEvent {
    let text = match samples_to_wav(samples, SAMPLE_RATE) {
        Ok(wav) => stt.transcribe(&wav).await,
        Err(e) => Err(e),
    };

    match text {
        Ok(text) => CaptureEvent::final_text(session, text.trim()),
        Err(e) => {
            tracing::warn!(session = %session, error = %e, "transcription failed");
            CaptureEvent::error(session, e.to_string())
        }
    }
}

/// Recorder thread body
///
/// Acknowledges the start through `ready`, then records until the detector
/// sees a complete utterance, a limit is hit, or `stop` is raised.
fn record_utterance(
    stop: &AtomicBool,
    limits: CaptureLimits,
    ready: oneshot::Sender<Result<()>>,
    done: oneshot::Sender<Vec<f32>>,
) {
    let mut recorder = match AudioRecorder::new().and_then(|mut r| r.start().map(|()| r)) {
        Ok(recorder) => recorder,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut detector = UtteranceDetector::new();
    let started = Instant::now();

    loop {
        std::thread::sleep(POLL_INTERVAL);
        let state = detector.process(&recorder.take_buffer());

        if stop.load(Ordering::SeqCst) {
            break;
        }

        match state {
            DetectorState::Complete => break,
            DetectorState::Waiting if started.elapsed() > limits.listen_timeout => {
                tracing::debug!("no speech before listen timeout");
                break;
            }
            DetectorState::Speaking if detector.speech_secs() > limits.phrase_limit.as_secs_f32() => {
                tracing::debug!("phrase limit reached");
                break;
            }
            _ => {}
        }
    }

    recorder.stop();
    let _ = done.send(detector.take_speech());
}
