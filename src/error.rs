use thiserror::Error;

/// Failures of the audio collaborators.
///
/// None of these reach the user as a value: the controller logs them and
/// falls back to idle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("Microphone access was denied")]
    PermissionDenied,

    #[error("Failed to configure audio session: {0}")]
    SessionConfiguration(String),

    #[error("Failed to create recorder: {0}")]
    RecorderConstruction(String),

    #[error("Failed to create player: {0}")]
    PlayerConstruction(String),

    #[error("Recording failed: {0}")]
    RecordingFailure(String),
}
