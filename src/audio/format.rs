use serde::{Deserialize, Serialize};

/// On-disk container of the recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// AAC in an MPEG-4 audio container
    M4a,
    /// Signed integer PCM in RIFF/WAVE
    Wav,
}

impl Container {
    pub fn extension(&self) -> &'static str {
        match self {
            Container::M4a => "m4a",
            Container::Wav => "wav",
        }
    }
}

/// Encoder quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderQuality {
    Min,
    Low,
    Medium,
    High,
    Max,
}

impl EncoderQuality {
    /// PCM bit depth used when the container is uncompressed
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            EncoderQuality::Min | EncoderQuality::Low => 8,
            EncoderQuality::Medium | EncoderQuality::High => 16,
            EncoderQuality::Max => 24,
        }
    }

    /// Constant AAC bit rate for one channel
    pub fn aac_bit_rate(&self) -> u32 {
        match self {
            EncoderQuality::Min => 12_000,
            EncoderQuality::Low => 16_000,
            EncoderQuality::Medium => 24_000,
            EncoderQuality::High => 32_000,
            EncoderQuality::Max => 48_000,
        }
    }
}

/// Sampling rates an AAC stream can signal
pub const AAC_SAMPLE_RATES: [u32; 12] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub container: Container,
    pub quality: EncoderQuality,
}

impl Default for RecordingFormat {
    fn default() -> Self {
        Self {
            sample_rate: 12000,
            channels: 1,
            container: Container::M4a,
            quality: EncoderQuality::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_mono_12khz_aac() {
        let format = RecordingFormat::default();
        assert_eq!(format.sample_rate, 12000);
        assert_eq!(format.channels, 1);
        assert_eq!(format.container, Container::M4a);
        assert_eq!(format.quality, EncoderQuality::High);
    }

    #[test]
    fn default_rate_is_signalable_in_aac() {
        assert!(AAC_SAMPLE_RATES.contains(&RecordingFormat::default().sample_rate));
    }

    #[test]
    fn aac_bit_rate_rises_with_quality() {
        let tiers = [
            EncoderQuality::Min,
            EncoderQuality::Low,
            EncoderQuality::Medium,
            EncoderQuality::High,
            EncoderQuality::Max,
        ];
        for pair in tiers.windows(2) {
            assert!(pair[0].aac_bit_rate() < pair[1].aac_bit_rate());
        }
    }

    #[test]
    fn quality_maps_to_bit_depth() {
        assert_eq!(EncoderQuality::Low.bits_per_sample(), 8);
        assert_eq!(EncoderQuality::High.bits_per_sample(), 16);
        assert_eq!(EncoderQuality::Max.bits_per_sample(), 24);
    }
}
