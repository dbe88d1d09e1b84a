use super::capture::{AudioCapture, CaptureErrorHandler};
use super::format::{Container, RecordingFormat};
use super::m4a_sink::M4aSink;
use super::sink::AudioSink;
use super::wav_sink::{WavSink, WriteErrorHandler};
use crate::error::AudioError;
use crate::messages::{EventSender, SessionEvent, SessionId};
use crate::session::Recorder;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

/// Records from the default input device into the artifact's container.
///
/// Audio goes to a hidden staging file next to the artifact. Only a stop that
/// finalizes cleanly renames it over the artifact, so a recording that fails
/// to start or finish leaves the previous take in place.
///
/// Stream and writer failures are logged where they happen and forwarded to
/// the UI context as `RecorderFinished { success: false }`.
pub struct CpalRecorder {
    events: EventSender,
}

pub struct CaptureSession {
    id: SessionId,
    capture: AudioCapture,
    staging: TempPath,
    target: PathBuf,
}

impl CpalRecorder {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }

    fn failure_handler(&self, id: SessionId) -> CaptureErrorHandler {
        let events = self.events.clone();
        Arc::new(move |reason: String| {
            tracing::error!("{}", AudioError::RecordingFailure(reason));
            let _ = events.send(SessionEvent::RecorderFinished {
                session: id,
                success: false,
            });
        })
    }
}

/// Reserve a staging file in the artifact's directory so the final rename
/// stays on one filesystem.
fn staging_path(target: &Path, container: Container) -> std::io::Result<TempPath> {
    let dir = match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let suffix = format!(".{}", container.extension());
    Ok(tempfile::Builder::new()
        .prefix(".recording-")
        .suffix(&suffix)
        .tempfile_in(dir)?
        .into_temp_path())
}

fn create_sink(
    path: &Path,
    format: &RecordingFormat,
    on_error: WriteErrorHandler,
) -> Result<Box<dyn AudioSink>> {
    Ok(match format.container {
        Container::M4a => Box::new(M4aSink::create(path, *format, on_error)?),
        Container::Wav => Box::new(WavSink::create(path, *format, on_error)?),
    })
}

impl Recorder for CpalRecorder {
    type Session = CaptureSession;

    fn start(
        &mut self,
        id: SessionId,
        target: &Path,
        format: &RecordingFormat,
    ) -> Result<CaptureSession, AudioError> {
        let staging = staging_path(target, format.container).map_err(|e| {
            AudioError::RecorderConstruction(format!("Failed to stage {:?}: {}", target, e))
        })?;

        let on_error = self.failure_handler(id);
        let sink_error = on_error.clone();
        let sink = create_sink(
            &staging,
            format,
            Box::new(move |reason: String| sink_error(reason)),
        )
        .map_err(|e| AudioError::RecorderConstruction(format!("{:#}", e)))?;

        let capture = AudioCapture::start(*format, sink, on_error)
            .map_err(|e| AudioError::RecorderConstruction(format!("{:#}", e)))?;

        Ok(CaptureSession {
            id,
            capture,
            staging,
            target: target.to_path_buf(),
        })
    }

    fn stop(&mut self, session: CaptureSession) {
        let CaptureSession {
            id,
            capture,
            staging,
            target,
        } = session;

        // Already leaving the recording state, nothing else to undo
        if let Err(e) = capture.stop() {
            tracing::error!("Recording session {} did not finalize cleanly: {:#}", id, e);
            return;
        }
        match staging.persist(&target) {
            Ok(()) => tracing::info!("Recording session {} saved to {:?}", id, target),
            Err(e) => {
                tracing::error!("Recording session {} could not replace {:?}: {}", id, target, e)
            }
        }
    }
}
