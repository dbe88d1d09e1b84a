use anyhow::{Context, Result};
use rubato::{FftFixedIn, Resampler};

const RESAMPLER_CHUNK: usize = 1024;

/// Reshapes interleaved device audio into the recording layout.
///
/// Channels are mixed down (or duplicated up) first, then the rate is changed
/// with rubato when the device could not run at the recording rate. Output is
/// interleaved at the target channel count.
pub struct Converter {
    source_channels: usize,
    target_channels: usize,
    resampler: Option<Resampling>,
}

struct Resampling {
    engine: FftFixedIn<f32>,
    ratio: f64,
    // Planar frames waiting for a full resampler chunk
    pending: Vec<Vec<f32>>,
    frames_in: usize,
    frames_out: usize,
    // Leading frames of filter delay still to discard
    skip: usize,
}

impl Converter {
    pub fn new(
        source_rate: u32,
        source_channels: u16,
        target_rate: u32,
        target_channels: u16,
    ) -> Result<Self> {
        let target = target_channels as usize;
        let resampler = if source_rate == target_rate {
            None
        } else {
            let engine = FftFixedIn::<f32>::new(
                source_rate as usize,
                target_rate as usize,
                RESAMPLER_CHUNK,
                2,
                target,
            )
            .context("Failed to create resampler")?;
            let skip = engine.output_delay();
            Some(Resampling {
                engine,
                ratio: target_rate as f64 / source_rate as f64,
                pending: vec![Vec::with_capacity(RESAMPLER_CHUNK); target],
                frames_in: 0,
                frames_out: 0,
                skip,
            })
        };

        Ok(Self {
            source_channels: source_channels.max(1) as usize,
            target_channels: target,
            resampler,
        })
    }

    /// True when input is already in the recording layout
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none() && self.source_channels == self.target_channels
    }

    /// Convert a block of interleaved device samples.
    ///
    /// A trailing partial frame is dropped.
    pub fn push(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if self.is_passthrough() {
            return Ok(interleaved.to_vec());
        }

        let mapped = self.map_channels(interleaved);
        let Some(resampling) = self.resampler.as_mut() else {
            return Ok(mapped);
        };

        for frame in mapped.chunks_exact(self.target_channels) {
            for (channel, sample) in resampling.pending.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        resampling.frames_in += mapped.len() / self.target_channels;

        let mut out = Vec::new();
        while resampling.pending[0].len() >= resampling.engine.input_frames_next() {
            let needed = resampling.engine.input_frames_next();
            let chunk: Vec<Vec<f32>> = resampling
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            resampling.run(&chunk, &mut out)?;
        }
        Ok(out)
    }

    /// Push out whatever the resampler is still holding.
    ///
    /// Pads with silence and trims, so the total output length matches the
    /// input duration at the target rate.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let Some(resampling) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };

        let expected = (resampling.frames_in as f64 * resampling.ratio).round() as usize;
        let mut out = Vec::new();
        while resampling.frames_out < expected {
            let needed = resampling.engine.input_frames_next();
            let chunk: Vec<Vec<f32>> = resampling
                .pending
                .iter_mut()
                .map(|channel| {
                    let mut block: Vec<f32> = channel.drain(..).collect();
                    block.resize(needed, 0.0);
                    block
                })
                .collect();
            resampling.run(&chunk, &mut out)?;
        }

        let surplus = resampling.frames_out - expected;
        out.truncate(out.len().saturating_sub(surplus * self.target_channels));
        resampling.frames_out = expected;
        Ok(out)
    }

    fn map_channels(&self, interleaved: &[f32]) -> Vec<f32> {
        let source = self.source_channels;
        let target = self.target_channels;
        if source == target {
            return interleaved.to_vec();
        }

        let mut out = Vec::with_capacity(interleaved.len() / source * target);
        for frame in interleaved.chunks_exact(source) {
            if target == 1 {
                out.push(frame.iter().sum::<f32>() / source as f32);
            } else {
                out.extend((0..target).map(|c| frame[c.min(source - 1)]));
            }
        }
        out
    }
}

impl Resampling {
    fn run(&mut self, chunk: &[Vec<f32>], out: &mut Vec<f32>) -> Result<()> {
        let resampled = self
            .engine
            .process(chunk, None)
            .context("Resampling failed")?;

        let frames = resampled.first().map_or(0, Vec::len);
        let dropped = self.skip.min(frames);
        self.skip -= dropped;

        for i in dropped..frames {
            out.extend(resampled.iter().map(|channel| channel[i]));
        }
        self.frames_out += frames - dropped;
        Ok(())
    }
}
