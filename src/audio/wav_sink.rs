use super::format::RecordingFormat;
use super::sink::AudioSink;
use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;
use std::sync::mpsc as std_mpsc;
use tokio::sync::mpsc;

enum WavCommand {
    WriteChunk(Vec<f32>),
    Finalize {
        reply: std_mpsc::SyncSender<Result<()>>,
    },
}

/// Called from the writer thread when a sample cannot be written
pub type WriteErrorHandler = Box<dyn Fn(String) + Send>;

/// WAV encoder using a dedicated blocking thread for I/O
///
/// Audio chunks are sent to the thread via a channel and written sequentially
/// to the WAV file. Finalizing waits for the thread to flush the header, so
/// the file is playable as soon as `finalize` returns.
pub struct WavSink {
    tx: mpsc::UnboundedSender<WavCommand>,
}

impl WavSink {
    /// Creates (or truncates) the file at `path` and starts the writer thread.
    pub fn create(
        path: &Path,
        format: RecordingFormat,
        on_error: WriteErrorHandler,
    ) -> Result<Self> {
        let bits = format.quality.bits_per_sample();
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: bits,
            sample_format: SampleFormat::Int,
        };

        let mut writer = WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV writer for {:?}", path))?;

        let full_scale = ((1i64 << (bits - 1)) - 1) as f32;
        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("taprec-wav-writer".to_string())
            .spawn(move || {
                let mut failed = false;
                while let Some(cmd) = rx.blocking_recv() {
                    match cmd {
                        WavCommand::WriteChunk(samples) => {
                            if failed {
                                continue;
                            }
                            for sample in samples {
                                // Convert f32 (-1.0 to 1.0) to the target bit depth
                                let amplitude = (sample.clamp(-1.0, 1.0) * full_scale) as i32;
                                if let Err(e) = writer.write_sample(amplitude) {
                                    on_error(format!("Failed to write sample: {}", e));
                                    failed = true;
                                    break;
                                }
                            }
                        }
                        WavCommand::Finalize { reply } => {
                            let result = writer.finalize().context("Failed to finalize WAV");
                            let _ = reply.send(result);
                            return;
                        }
                    }
                }
            })
            .context("Failed to spawn WAV writer thread")?;

        Ok(Self { tx })
    }
}

impl AudioSink for WavSink {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        self.tx
            .send(WavCommand::WriteChunk(samples))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    fn finalize(&mut self) -> Result<()> {
        let (reply, rx) = std_mpsc::sync_channel(1);
        self.tx
            .send(WavCommand::Finalize { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send finalize command: {}", e))?;

        rx.recv()
            .map_err(|e| anyhow::anyhow!("Failed to receive finalize response: {}", e))?
    }
}
