use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLabel {
    TapToRecord,
    TapToStop,
    TapToReRecord,
}

impl RecordLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordLabel::TapToRecord => "Tap to Record",
            RecordLabel::TapToStop => "Tap to Stop",
            RecordLabel::TapToReRecord => "Tap to Re-record",
        }
    }
}

impl fmt::Display for RecordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayLabel {
    TapToPlay,
    TapToStop,
}

impl PlayLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayLabel::TapToPlay => "Tap to Play",
            PlayLabel::TapToStop => "Tap to Stop",
        }
    }
}

impl fmt::Display for PlayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
