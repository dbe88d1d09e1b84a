pub mod controller;
pub mod labels;
pub mod ports;

pub use controller::SessionController;
pub use labels::{PlayLabel, RecordLabel};
pub use ports::{
    AudioSession, ControlSurface, MicrophoneAccess, Player, RecordPermission, Recorder,
    SessionCategory,
};
