use super::format::RecordingFormat;
use super::sink::AudioSink;
use super::wav_sink::WriteErrorHandler;
use anyhow::{Context, Result, anyhow, bail};
use bytes::Bytes;
use fdk_aac::enc::{AudioObjectType, BitRate, ChannelMode, Encoder, EncoderParams, Transport};
use mp4::{
    AacConfig, ChannelConfig, MediaConfig, Mp4Config, Mp4Sample, Mp4Writer, SampleFreqIndex,
    TrackConfig, TrackType,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc as std_mpsc;
use tokio::sync::mpsc;

const TRACK_ID: u32 = 1;

// Silent frames fed at the end to push out the encoder lookahead
const MAX_DRAIN_FRAMES: usize = 4;

enum M4aCommand {
    WriteChunk(Vec<f32>),
    Finalize {
        reply: std_mpsc::SyncSender<Result<()>>,
    },
}

/// AAC-LC encoder muxed into an MPEG-4 audio file
///
/// Same threading as the WAV sink: chunks go to a writer thread over a
/// channel and `finalize` waits until the `moov` box is on disk.
pub struct M4aSink {
    tx: mpsc::UnboundedSender<M4aCommand>,
}

impl M4aSink {
    /// Creates (or truncates) the file at `path` and starts the writer thread.
    pub fn create(
        path: &Path,
        format: RecordingFormat,
        on_error: WriteErrorHandler,
    ) -> Result<Self> {
        let mut track = AacTrack::open(path, &format)?;
        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("taprec-m4a-writer".to_string())
            .spawn(move || {
                let mut failed = false;
                while let Some(cmd) = rx.blocking_recv() {
                    match cmd {
                        M4aCommand::WriteChunk(samples) => {
                            if failed {
                                continue;
                            }
                            if let Err(e) = track.write(&samples) {
                                on_error(format!("Failed to encode audio: {:#}", e));
                                failed = true;
                            }
                        }
                        M4aCommand::Finalize { reply } => {
                            let _ = reply.send(track.finish());
                            return;
                        }
                    }
                }
            })
            .context("Failed to spawn M4A writer thread")?;

        Ok(Self { tx })
    }
}

impl AudioSink for M4aSink {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        self.tx
            .send(M4aCommand::WriteChunk(samples))
            .map_err(|e| anyhow!("Failed to send write command: {}", e))
    }

    fn finalize(&mut self) -> Result<()> {
        let (reply, rx) = std_mpsc::sync_channel(1);
        self.tx
            .send(M4aCommand::Finalize { reply })
            .map_err(|e| anyhow!("Failed to send finalize command: {}", e))?;

        rx.recv()
            .map_err(|e| anyhow!("Failed to receive finalize response: {}", e))?
    }
}

struct AacTrack {
    encoder: Encoder,
    writer: Mp4Writer<BufWriter<File>>,
    // Interleaved samples per AAC frame
    frame_samples: usize,
    // Per-channel samples per AAC frame, in track timescale units
    frame_duration: u32,
    pending: Vec<i16>,
    out: Vec<u8>,
    frames_in: u64,
    frames_out: u64,
}

impl AacTrack {
    fn open(path: &Path, format: &RecordingFormat) -> Result<Self> {
        let freq_index = sample_freq_index(format.sample_rate)?;
        let (mode, chan_conf) = match format.channels {
            1 => (ChannelMode::Mono, ChannelConfig::Mono),
            2 => (ChannelMode::Stereo, ChannelConfig::Stereo),
            n => bail!("AAC recording supports 1 or 2 channels, not {}", n),
        };
        let bitrate = format.quality.aac_bit_rate() * format.channels as u32;

        let encoder = Encoder::new(EncoderParams {
            bit_rate: BitRate::Cbr(bitrate),
            sample_rate: format.sample_rate,
            transport: Transport::Raw,
            channels: mode,
            audio_object_type: AudioObjectType::Mpeg4LowComplexity,
        })
        .map_err(|e| anyhow!("Failed to create AAC encoder: {}", e))?;
        let info = encoder
            .info()
            .map_err(|e| anyhow!("Failed to query AAC encoder: {}", e))?;
        let frame_length = info.frameLength as usize;

        let file =
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut writer = Mp4Writer::write_start(
            BufWriter::new(file),
            &Mp4Config {
                major_brand: "M4A ".parse()?,
                minor_version: 512,
                compatible_brands: vec!["M4A ".parse()?, "isom".parse()?, "mp42".parse()?],
                timescale: 1000,
            },
        )
        .context("Failed to write MP4 header")?;
        writer
            .add_track(&TrackConfig {
                track_type: TrackType::Audio,
                timescale: format.sample_rate,
                language: "und".to_string(),
                media_conf: MediaConfig::AacConfig(AacConfig {
                    bitrate,
                    profile: mp4::AudioObjectType::AacLowComplexity,
                    freq_index,
                    chan_conf,
                }),
            })
            .context("Failed to add AAC track")?;

        let frame_samples = frame_length * format.channels as usize;
        Ok(Self {
            encoder,
            writer,
            frame_samples,
            frame_duration: frame_length as u32,
            pending: Vec::with_capacity(frame_samples),
            out: vec![0u8; (info.maxOutBufBytes as usize).max(8192)],
            frames_in: 0,
            frames_out: 0,
        })
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        for &sample in samples {
            self.pending
                .push((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
            if self.pending.len() == self.frame_samples {
                self.encode_pending()?;
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.pending.resize(self.frame_samples, 0);
            self.encode_pending()?;
        }

        let silence = vec![0i16; self.frame_samples];
        for _ in 0..MAX_DRAIN_FRAMES {
            if self.frames_out >= self.frames_in {
                break;
            }
            self.encode(&silence)?;
        }

        self.writer.write_end().context("Failed to write MP4 index")?;
        self.writer
            .into_writer()
            .flush()
            .context("Failed to flush M4A file")
    }

    fn encode_pending(&mut self) -> Result<()> {
        let frame = std::mem::take(&mut self.pending);
        self.encode(&frame)?;
        self.frames_in += 1;
        self.pending = frame;
        self.pending.clear();
        Ok(())
    }

    fn encode(&mut self, mut input: &[i16]) -> Result<()> {
        loop {
            let info = self
                .encoder
                .encode(input, &mut self.out)
                .map_err(|e| anyhow!("AAC encode failed: {}", e))?;
            if info.output_size > 0 {
                self.write_access_unit(info.output_size)?;
            }
            input = &input[info.input_consumed.min(input.len())..];
            if input.is_empty() || (info.input_consumed == 0 && info.output_size == 0) {
                return Ok(());
            }
        }
    }

    fn write_access_unit(&mut self, size: usize) -> Result<()> {
        let sample = Mp4Sample {
            start_time: self.frames_out * self.frame_duration as u64,
            duration: self.frame_duration,
            rendering_offset: 0,
            is_sync: true,
            bytes: Bytes::copy_from_slice(&self.out[..size]),
        };
        self.writer
            .write_sample(TRACK_ID, &sample)
            .context("Failed to write AAC frame")?;
        self.frames_out += 1;
        Ok(())
    }
}

fn sample_freq_index(rate: u32) -> Result<SampleFreqIndex> {
    Ok(match rate {
        96000 => SampleFreqIndex::Freq96000,
        88200 => SampleFreqIndex::Freq88200,
        64000 => SampleFreqIndex::Freq64000,
        48000 => SampleFreqIndex::Freq48000,
        44100 => SampleFreqIndex::Freq44100,
        32000 => SampleFreqIndex::Freq32000,
        24000 => SampleFreqIndex::Freq24000,
        22050 => SampleFreqIndex::Freq22050,
        16000 => SampleFreqIndex::Freq16000,
        12000 => SampleFreqIndex::Freq12000,
        11025 => SampleFreqIndex::Freq11025,
        8000 => SampleFreqIndex::Freq8000,
        other => bail!("AAC cannot signal a {} Hz sampling rate", other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::{AAC_SAMPLE_RATES, Container, EncoderQuality};
    use rodio::Source;
    use std::io::BufReader;
    use std::sync::{Arc, Mutex};

    fn m4a_format() -> RecordingFormat {
        RecordingFormat {
            container: Container::M4a,
            quality: EncoderQuality::High,
            ..RecordingFormat::default()
        }
    }

    fn tone(seconds: f32, rate: u32) -> Vec<f32> {
        let count = (seconds * rate as f32) as usize;
        (0..count)
            .map(|i| 0.3 * (i as f32 * 440.0 * std::f32::consts::TAU / rate as f32).sin())
            .collect()
    }

    fn read_track(path: &Path) -> mp4::Mp4Reader<BufReader<File>> {
        let file = File::open(path).unwrap();
        let size = file.metadata().unwrap().len();
        mp4::Mp4Reader::read_header(BufReader::new(file), size).unwrap()
    }

    #[test]
    fn writes_aac_lc_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.m4a");
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink_errors = errors.clone();

        let mut sink = M4aSink::create(
            &path,
            m4a_format(),
            Box::new(move |e: String| sink_errors.lock().unwrap().push(e)),
        )
        .unwrap();
        for chunk in tone(1.0, 12000).chunks(6000) {
            sink.write_chunk(chunk.to_vec()).unwrap();
        }
        sink.finalize().unwrap();
        assert!(errors.lock().unwrap().is_empty());

        let reader = read_track(&path);
        let track = reader.tracks().get(&TRACK_ID).unwrap();
        assert_eq!(track.track_type().unwrap(), TrackType::Audio);
        assert_eq!(track.sample_freq_index().unwrap(), SampleFreqIndex::Freq12000);
        assert_eq!(track.channel_config().unwrap(), ChannelConfig::Mono);
        assert_eq!(
            track.audio_profile().unwrap(),
            mp4::AudioObjectType::AacLowComplexity
        );
        // One second of 12 kHz audio is 12 frames of 1024 samples
        assert!(track.sample_count() >= 12, "only {} frames", track.sample_count());
    }

    #[test]
    fn recording_decodes_for_playback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.m4a");

        let mut sink = M4aSink::create(&path, m4a_format(), Box::new(|_: String| {})).unwrap();
        sink.write_chunk(tone(0.5, 12000)).unwrap();
        sink.finalize().unwrap();

        let file = BufReader::new(File::open(&path).unwrap());
        let decoder = rodio::Decoder::new(file).unwrap();
        assert_eq!(decoder.sample_rate(), 12000);
        assert_eq!(decoder.channels(), 1);
        assert!(decoder.count() > 0);
    }

    #[test]
    fn empty_recording_is_still_a_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.m4a");

        let mut sink = M4aSink::create(&path, m4a_format(), Box::new(|_: String| {})).unwrap();
        sink.finalize().unwrap();

        let reader = read_track(&path);
        assert_eq!(reader.tracks().len(), 1);
    }

    #[test]
    fn unsignalable_rate_is_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.m4a");
        let format = RecordingFormat {
            sample_rate: 10000,
            ..m4a_format()
        };

        assert!(M4aSink::create(&path, format, Box::new(|_: String| {})).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn every_listed_rate_has_an_index() {
        for rate in AAC_SAMPLE_RATES {
            assert_eq!(sample_freq_index(rate).unwrap().freq(), rate);
        }
    }
}
