use crate::error::AudioError;
use crate::messages::{EventSender, SessionEvent, SessionId};
use crate::session::Player;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

const COMPLETION_POLL: Duration = Duration::from_millis(50);

/// Plays the recording through the default output device with rodio
pub struct RodioPlayer {
    events: EventSender,
}

pub struct PlaybackSession {
    id: SessionId,
    // Keeps the device open; dropping it silences the sink
    _stream: OutputStream,
    sink: Arc<Sink>,
}

impl RodioPlayer {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }

    /// Watches for the end of the file from a helper thread.
    ///
    /// Holds only a weak reference, so a session stopped by the user ends the
    /// watcher without a notification.
    fn watch_completion(&self, id: SessionId, sink: Weak<Sink>) -> std::io::Result<()> {
        let events = self.events.clone();
        std::thread::Builder::new()
            .name(format!("taprec-playback-{}", id.0))
            .spawn(move || {
                loop {
                    std::thread::sleep(COMPLETION_POLL);
                    let Some(sink) = sink.upgrade() else {
                        return;
                    };
                    if sink.empty() {
                        tracing::debug!("Playback session {} reached end of file", id);
                        let _ = events.send(SessionEvent::PlayerFinished { session: id });
                        return;
                    }
                }
            })
            .map(|_| ())
    }
}

impl Player for RodioPlayer {
    type Session = PlaybackSession;

    fn start(&mut self, id: SessionId, source: &Path) -> Result<PlaybackSession, AudioError> {
        let file = File::open(source).map_err(|e| {
            AudioError::PlayerConstruction(format!("Failed to open {:?}: {}", source, e))
        })?;

        let mut stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
            AudioError::PlayerConstruction(format!("Failed to open audio output: {}", e))
        })?;
        // Every stop drops the stream; that is expected, not worth a stderr line
        stream.log_on_drop(false);

        let sink = rodio::play(stream.mixer(), BufReader::new(file)).map_err(|e| {
            AudioError::PlayerConstruction(format!("Failed to decode {:?}: {}", source, e))
        })?;
        let sink = Arc::new(sink);

        self.watch_completion(id, Arc::downgrade(&sink)).map_err(|e| {
            AudioError::PlayerConstruction(format!("Failed to spawn watcher: {}", e))
        })?;

        Ok(PlaybackSession {
            id,
            _stream: stream,
            sink,
        })
    }

    fn stop(&mut self, session: PlaybackSession) {
        session.sink.stop();
        tracing::debug!("Playback session {} released", session.id);
    }
}
