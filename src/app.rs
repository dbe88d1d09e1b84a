use crate::audio::{CpalMicrophone, CpalRecorder, HostAudioSession, RodioPlayer};
use crate::config::Config;
use crate::messages::{EventReceiver, UserCommand};
use crate::session::{MicrophoneAccess, Player, Recorder, SessionController};
use crate::storage::{self, Artifact};
use crate::ui::{self, TerminalSurface};

use anyhow::Result;
use tokio::sync::mpsc;

pub struct App<R: Recorder, P: Player> {
    controller: SessionController<R, P>,
    command_rx: mpsc::Receiver<UserCommand>,
    event_rx: EventReceiver,
}

impl App<CpalRecorder, RodioPlayer> {
    /// Must be called inside a LocalSet: the recorder holds !Send cpal streams.
    pub async fn new(config: Config) -> Result<Self> {
        let documents_dir = config.documents_dir()?;
        storage::prepare_documents_dir(&documents_dir)?;

        let format = config.recording_format();
        let artifact = Artifact::new(&documents_dir, format.container);

        // Completion notifications cross from audio threads to this context here
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let permission = CpalMicrophone.request_record_permission().await;

        let mut controller = SessionController::new(
            CpalRecorder::new(event_tx.clone()),
            RodioPlayer::new(event_tx),
            Box::new(HostAudioSession::new()),
            Box::new(TerminalSurface::new()),
            artifact,
            format,
            permission,
        );
        tracing::info!("Recording file: {:?}", controller.artifact().path());
        controller.load_ui();

        let command_rx = Self::setup_command_input()?;

        tracing::info!("Ready! Type r + Enter to record, p + Enter to play, q to quit");

        Ok(Self::with_controller(controller, command_rx, event_rx))
    }

    fn setup_command_input() -> Result<mpsc::Receiver<UserCommand>> {
        let (command_tx, command_rx) = mpsc::channel(10);
        ui::spawn_stdin_reader(command_tx)?;
        Ok(command_rx)
    }
}

impl<R: Recorder, P: Player> App<R, P> {
    pub fn with_controller(
        controller: SessionController<R, P>,
        command_rx: mpsc::Receiver<UserCommand>,
        event_rx: EventReceiver,
    ) -> Self {
        Self {
            controller,
            command_rx,
            event_rx,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            tracing::debug!("Main loop: waiting for event");
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(UserCommand::ToggleRecord) => self.controller.toggle_record(),
                    Some(UserCommand::TogglePlay) => self.controller.toggle_play(),
                    Some(UserCommand::Quit) | None => break,
                },

                Some(event) = self.event_rx.recv() => {
                    tracing::debug!("Main loop: received {:?}", event);
                    self.controller.handle_event(event);
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.controller.shutdown();
        tracing::info!("taprec shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Container, RecordingFormat};
    use crate::error::AudioError;
    use crate::messages::{SessionEvent, SessionId};
    use crate::session::{
        AudioSession, ControlSurface, PlayLabel, RecordLabel, RecordPermission, SessionCategory,
    };
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::task::LocalSet;

    #[derive(Debug, Default)]
    struct Seen {
        record_label: Option<RecordLabel>,
        play_label: Option<PlayLabel>,
        recorder_stops: usize,
    }

    type Shared = Rc<RefCell<Seen>>;

    struct StubRecorder(Shared);

    impl Recorder for StubRecorder {
        type Session = ();

        fn start(
            &mut self,
            _id: SessionId,
            target: &Path,
            _format: &RecordingFormat,
        ) -> Result<(), AudioError> {
            std::fs::write(target, b"audio").unwrap();
            Ok(())
        }

        fn stop(&mut self, _session: ()) {
            self.0.borrow_mut().recorder_stops += 1;
        }
    }

    struct StubPlayer;

    impl Player for StubPlayer {
        type Session = ();

        fn start(&mut self, _id: SessionId, _source: &Path) -> Result<(), AudioError> {
            Ok(())
        }

        fn stop(&mut self, _session: ()) {}
    }

    struct StubAudioSession;

    impl AudioSession for StubAudioSession {
        fn configure(&mut self, _category: SessionCategory) -> Result<(), AudioError> {
            Ok(())
        }
    }

    struct StubSurface(Shared);

    impl ControlSurface for StubSurface {
        fn set_record_label(&mut self, label: RecordLabel) {
            self.0.borrow_mut().record_label = Some(label);
        }

        fn set_record_enabled(&mut self, _enabled: bool) {}

        fn set_play_label(&mut self, label: PlayLabel) {
            self.0.borrow_mut().play_label = Some(label);
        }

        fn set_play_enabled(&mut self, _enabled: bool) {}
    }

    struct Running {
        commands: mpsc::Sender<UserCommand>,
        events: mpsc::UnboundedSender<SessionEvent>,
        seen: Shared,
        app: tokio::task::JoinHandle<Result<()>>,
        _dir: tempfile::TempDir,
    }

    fn spawn_app() -> Running {
        let dir = tempfile::tempdir().unwrap();
        let seen: Shared = Rc::default();
        let mut controller = SessionController::new(
            StubRecorder(seen.clone()),
            StubPlayer,
            Box::new(StubAudioSession),
            Box::new(StubSurface(seen.clone())),
            Artifact::new(dir.path(), Container::Wav),
            RecordingFormat::default(),
            RecordPermission::Granted,
        );
        controller.load_ui();

        let (commands, command_rx) = mpsc::channel(10);
        let (events, event_rx) = mpsc::unbounded_channel();
        let app = App::with_controller(controller, command_rx, event_rx);

        Running {
            commands,
            events,
            seen,
            app: tokio::task::spawn_local(app.run()),
            _dir: dir,
        }
    }

    async fn wait_for(seen: &Shared, check: impl Fn(&Seen) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check(&*seen.borrow()) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("app loop never reached the expected buttons");
    }

    #[tokio::test]
    async fn commands_and_completions_drive_the_buttons() {
        LocalSet::new()
            .run_until(async {
                let running = spawn_app();

                running.commands.send(UserCommand::ToggleRecord).await.unwrap();
                wait_for(&running.seen, |s| s.record_label == Some(RecordLabel::TapToStop)).await;

                running.commands.send(UserCommand::TogglePlay).await.unwrap();
                wait_for(&running.seen, |s| s.play_label == Some(PlayLabel::TapToStop)).await;
                assert_eq!(running.seen.borrow().recorder_stops, 1);

                // Session 1 was the recording; session 2 is playing
                running
                    .events
                    .send(SessionEvent::PlayerFinished {
                        session: SessionId(2),
                    })
                    .unwrap();
                wait_for(&running.seen, |s| s.play_label == Some(PlayLabel::TapToPlay)).await;

                running.commands.send(UserCommand::Quit).await.unwrap();
                running.app.await.unwrap().unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn recorder_failure_event_resets_record_button() {
        LocalSet::new()
            .run_until(async {
                let running = spawn_app();

                running.commands.send(UserCommand::ToggleRecord).await.unwrap();
                wait_for(&running.seen, |s| s.record_label == Some(RecordLabel::TapToStop)).await;

                running
                    .events
                    .send(SessionEvent::RecorderFinished {
                        session: SessionId(1),
                        success: false,
                    })
                    .unwrap();
                wait_for(&running.seen, |s| {
                    s.record_label == Some(RecordLabel::TapToRecord)
                })
                .await;
                assert_eq!(running.seen.borrow().recorder_stops, 1);

                drop(running.commands);
                running.app.await.unwrap().unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn quit_finalizes_an_in_flight_recording() {
        LocalSet::new()
            .run_until(async {
                let running = spawn_app();

                running.commands.send(UserCommand::ToggleRecord).await.unwrap();
                running.commands.send(UserCommand::Quit).await.unwrap();
                running.app.await.unwrap().unwrap();

                let seen = running.seen.borrow();
                assert_eq!(seen.recorder_stops, 1);
                assert_eq!(seen.record_label, Some(RecordLabel::TapToReRecord));
            })
            .await;
    }

    #[tokio::test]
    async fn closed_input_ends_the_loop() {
        LocalSet::new()
            .run_until(async {
                let running = spawn_app();
                drop(running.commands);

                tokio::time::timeout(Duration::from_secs(2), running.app)
                    .await
                    .expect("loop kept running without input")
                    .unwrap()
                    .unwrap();
                assert_eq!(running.seen.borrow().recorder_stops, 0);
            })
            .await;
    }
}
