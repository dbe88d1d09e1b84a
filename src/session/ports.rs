//! Capabilities the session controller needs from the host.

use async_trait::async_trait;
use std::path::Path;

use super::labels::{PlayLabel, RecordLabel};
use crate::audio::RecordingFormat;
use crate::error::AudioError;
use crate::messages::SessionId;

/// How the host audio session is set up before a session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCategory {
    PlayAndRecord,
    Playback,
}

/// Outcome of the startup microphone request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPermission {
    Granted,
    Denied,
}

impl RecordPermission {
    pub fn is_granted(&self) -> bool {
        matches!(self, RecordPermission::Granted)
    }
}

/// Captures audio into a file.
///
/// Failures after a successful `start` are reported asynchronously as
/// `SessionEvent::RecorderFinished { success: false }` tagged with `id`.
pub trait Recorder {
    type Session;

    fn start(
        &mut self,
        id: SessionId,
        target: &Path,
        format: &RecordingFormat,
    ) -> Result<Self::Session, AudioError>;

    /// Stops capture and leaves a complete file at the target path
    fn stop(&mut self, session: Self::Session);
}

/// Plays a file back.
///
/// Reaching the end of the file is reported as
/// `SessionEvent::PlayerFinished` tagged with `id`.
pub trait Player {
    type Session;

    fn start(&mut self, id: SessionId, source: &Path) -> Result<Self::Session, AudioError>;

    fn stop(&mut self, session: Self::Session);
}

pub trait AudioSession {
    fn configure(&mut self, category: SessionCategory) -> Result<(), AudioError>;
}

#[async_trait(?Send)]
pub trait MicrophoneAccess {
    /// Asked once at startup; there is no re-prompt.
    async fn request_record_permission(&self) -> RecordPermission;
}

/// The Record and Play buttons.
pub trait ControlSurface {
    fn set_record_label(&mut self, label: RecordLabel);
    fn set_record_enabled(&mut self, enabled: bool);
    fn set_play_label(&mut self, label: PlayLabel);
    fn set_play_enabled(&mut self, enabled: bool);

    /// Called once at the end of every controller operation
    fn present(&mut self) {}
}
