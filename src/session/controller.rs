use super::labels::{PlayLabel, RecordLabel};
use super::ports::{
    AudioSession, ControlSurface, Player, RecordPermission, Recorder, SessionCategory,
};
use crate::audio::RecordingFormat;
use crate::error::AudioError;
use crate::messages::{PlayerState, SessionEvent, SessionId};
use crate::storage::Artifact;

struct Active<S> {
    id: SessionId,
    handle: S,
}

/// Why a recording session ended. Only a user stop counts as a finished take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordingStop {
    User,
    Preempted,
    Failed,
}

/// Owns the record/play state machine.
///
/// Every method runs on the single UI context; completion notifications from
/// the recorder and player threads arrive here through [`handle_event`].
///
/// Invariant: `state` is `Recording` exactly when a recording session is held
/// and `Playing` exactly when a playback session is held. Both are never held
/// at once.
///
/// [`handle_event`]: SessionController::handle_event
pub struct SessionController<R: Recorder, P: Player> {
    state: PlayerState,
    recorder: R,
    player: P,
    audio_session: Box<dyn AudioSession>,
    surface: Box<dyn ControlSurface>,
    artifact: Artifact,
    format: RecordingFormat,
    permission: RecordPermission,
    recording: Option<Active<R::Session>>,
    playback: Option<Active<P::Session>>,
    last_session: u64,
}

impl<R: Recorder, P: Player> SessionController<R, P> {
    pub fn new(
        recorder: R,
        player: P,
        audio_session: Box<dyn AudioSession>,
        surface: Box<dyn ControlSurface>,
        artifact: Artifact,
        format: RecordingFormat,
        permission: RecordPermission,
    ) -> Self {
        Self {
            state: PlayerState::Idle,
            recorder,
            player,
            audio_session,
            surface,
            artifact,
            format,
            permission,
            recording: None,
            playback: None,
            last_session: 0,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Render both buttons once the microphone request has resolved
    pub fn load_ui(&mut self) {
        if !self.permission.is_granted() {
            tracing::error!("{}; recording is disabled", AudioError::PermissionDenied);
        }
        self.surface.set_record_label(RecordLabel::TapToRecord);
        self.surface.set_record_enabled(self.permission.is_granted());
        self.surface.set_play_label(PlayLabel::TapToPlay);
        self.refresh_play_button();
        self.surface.present();
    }

    pub fn toggle_record(&mut self) {
        tracing::debug!("toggle_record: current state = {:?}", self.state);
        if self.recording.is_some() {
            self.finish_recording(RecordingStop::User);
        } else {
            self.start_recording();
        }
        self.surface.present();
    }

    pub fn toggle_play(&mut self) {
        tracing::debug!("toggle_play: current state = {:?}", self.state);
        if self.playback.is_some() {
            self.finish_playing();
        } else {
            self.start_playing();
        }
        self.surface.present();
    }

    /// The recorder stopped on its own. Only failures change anything.
    pub fn on_recorder_completion(&mut self, success: bool) {
        if success {
            tracing::debug!("Recorder reported a successful finish, nothing to do");
        } else {
            self.finish_recording(RecordingStop::Failed);
        }
        self.surface.present();
    }

    /// The player reached the end of the file
    pub fn on_player_completion(&mut self) {
        self.finish_playing();
        self.surface.present();
    }

    /// Route a completion notification, dropping ones from discarded sessions
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::RecorderFinished { session, success } => {
                if self.recording.as_ref().map(|active| active.id) == Some(session) {
                    self.on_recorder_completion(success);
                } else {
                    tracing::debug!("Ignoring completion of stale recording session {}", session);
                }
            }
            SessionEvent::PlayerFinished { session } => {
                if self.playback.as_ref().map(|active| active.id) == Some(session) {
                    self.on_player_completion();
                } else {
                    tracing::debug!("Ignoring completion of stale playback session {}", session);
                }
            }
        }
    }

    /// Stop whatever is running so an in-flight recording gets finalized
    pub fn shutdown(&mut self) {
        self.finish_recording(RecordingStop::User);
        self.finish_playing();
        self.surface.present();
    }

    fn start_recording(&mut self) {
        if !self.permission.is_granted() {
            tracing::warn!("{}", AudioError::PermissionDenied);
            return;
        }

        // Mutual exclusion: playback goes first
        self.finish_playing();

        match self.begin_recording() {
            Ok(id) => tracing::info!(
                "Recording session {} started: {:?}",
                id,
                self.artifact.path()
            ),
            Err(e) => {
                tracing::error!("{}", e);
                self.surface.set_record_label(RecordLabel::TapToRecord);
            }
        }
        self.refresh_play_button();
    }

    fn begin_recording(&mut self) -> Result<SessionId, AudioError> {
        self.audio_session.configure(SessionCategory::PlayAndRecord)?;

        let id = self.next_session_id();
        let handle = self.recorder.start(id, self.artifact.path(), &self.format)?;
        self.recording = Some(Active { id, handle });
        self.enter(PlayerState::Recording);
        self.surface.set_record_label(RecordLabel::TapToStop);
        Ok(id)
    }

    fn finish_recording(&mut self, reason: RecordingStop) {
        let Some(active) = self.recording.take() else {
            return;
        };

        self.recorder.stop(active.handle);
        self.enter(PlayerState::Idle);

        let label = match reason {
            RecordingStop::User => RecordLabel::TapToReRecord,
            RecordingStop::Preempted | RecordingStop::Failed => RecordLabel::TapToRecord,
        };
        self.surface.set_record_label(label);
        self.refresh_play_button();

        tracing::info!("Recording session {} stopped ({:?})", active.id, reason);
    }

    fn start_playing(&mut self) {
        if self.recording.is_none() && !self.artifact.exists() {
            tracing::debug!("No recording at {:?}, nothing to play", self.artifact.path());
            return;
        }

        // Mutual exclusion: recording goes first. Its take only lands on disk
        // once stopped, so the artifact is checked again afterwards.
        self.finish_recording(RecordingStop::Preempted);
        if !self.artifact.exists() {
            tracing::warn!("Interrupted take was not saved, nothing to play");
            return;
        }

        match self.begin_playback() {
            Ok(id) => tracing::info!("Playback session {} started", id),
            Err(e) => {
                tracing::error!("{}", e);
                self.surface.set_play_label(PlayLabel::TapToPlay);
            }
        }
        self.refresh_play_button();
    }

    fn begin_playback(&mut self) -> Result<SessionId, AudioError> {
        self.audio_session.configure(SessionCategory::Playback)?;

        let id = self.next_session_id();
        let handle = self.player.start(id, self.artifact.path())?;
        self.playback = Some(Active { id, handle });
        self.enter(PlayerState::Playing);
        self.surface.set_play_label(PlayLabel::TapToStop);
        Ok(id)
    }

    fn finish_playing(&mut self) {
        let Some(active) = self.playback.take() else {
            return;
        };

        self.player.stop(active.handle);
        self.enter(PlayerState::Idle);
        self.surface.set_play_label(PlayLabel::TapToPlay);

        tracing::info!("Playback session {} stopped", active.id);
    }

    /// Play is usable while a take is in progress: pressing it stops and plays that take
    fn refresh_play_button(&mut self) {
        self.surface
            .set_play_enabled(self.artifact.exists() || self.recording.is_some());
    }

    fn enter(&mut self, next: PlayerState) {
        tracing::debug!("State: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn next_session_id(&mut self) -> SessionId {
        self.last_session += 1;
        SessionId(self.last_session)
    }
}
