pub mod capture;
pub mod convert;
pub mod format;
pub mod host;
pub mod m4a_sink;
pub mod player;
pub mod recorder;
pub mod sink;
pub mod wav_sink;

pub use format::{AAC_SAMPLE_RATES, Container, EncoderQuality, RecordingFormat};
pub use host::{CpalMicrophone, HostAudioSession};
pub use player::RodioPlayer;
pub use recorder::CpalRecorder;
