use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;

/// Identifies one recording or playback session handed out by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Record/play mutual-exclusion state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Recording,
    Playing,
}

/// Button presses coming from the surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserCommand {
    ToggleRecord,
    TogglePlay,
    Quit,
}

impl FromStr for UserCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" | "record" => Ok(Self::ToggleRecord),
            "p" | "play" => Ok(Self::TogglePlay),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            other => Err(anyhow::anyhow!("Unknown command: {:?}", other)),
        }
    }
}

/// Completion notifications sent by the recorder and player from their own threads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    RecorderFinished { session: SessionId, success: bool },
    PlayerFinished { session: SessionId },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;
