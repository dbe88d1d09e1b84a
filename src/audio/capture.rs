use super::convert::Converter;
use super::format::RecordingFormat;
use super::sink::AudioSink;
use anyhow::{Context, Result, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};
use ringbuf::{HeapCons, HeapProd, HeapRb, traits::*};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Reports a capture failure from whichever thread noticed it
pub type CaptureErrorHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Converter and sink, fed in order by the bridge and then by `stop`
struct Pipeline {
    converter: Converter,
    sink: Box<dyn AudioSink>,
}

impl Pipeline {
    fn write(&mut self, device_samples: &[f32]) -> Result<()> {
        let samples = self.converter.push(device_samples)?;
        if samples.is_empty() {
            return Ok(());
        }
        self.sink.write_chunk(samples)
    }

    fn finish(&mut self) -> Result<()> {
        let tail = self.converter.flush()?;
        if !tail.is_empty() {
            self.sink
                .write_chunk(tail)
                .context("Failed to flush buffered audio")?;
        }
        self.sink.finalize()
    }
}

type SharedPipeline = Rc<RefCell<Pipeline>>;

/// Live microphone capture streaming into an [`AudioSink`]
///
/// The cpal callback pushes device samples into a ring buffer; a local bridge
/// task moves half-second chunks from the ring through the converter into the
/// sink. Holds a `cpal::Stream`, which is !Send, so it must live on a LocalSet.
pub struct AudioCapture {
    stream: cpal::Stream,
    consumer: Rc<RefCell<HeapCons<f32>>>,
    pipeline: SharedPipeline,
    bridge: JoinHandle<()>,
}

impl AudioCapture {
    /// Start audio capture from the default input device
    pub fn start(
        format: RecordingFormat,
        sink: Box<dyn AudioSink>,
        on_error: CaptureErrorHandler,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input audio device available")?;

        let ranges = device
            .supported_input_configs()
            .context("Failed to query input configs")?;
        let (config, sample_format) = choose_input_config(ranges, format.sample_rate)
            .context("Input device offers no i16 or f32 configuration")?;

        let device_rate = config.sample_rate.0;
        let device_samples = |seconds: f64| {
            (device_rate as f64 * seconds) as usize * config.channels as usize
        };

        let ring = HeapRb::<f32>::new(device_samples(60.0));
        let (producer, consumer) = ring.split();

        let notify = Arc::new(Notify::new());
        let stream = build_stream(
            &device,
            &config,
            sample_format,
            producer,
            notify.clone(),
            on_error.clone(),
        )?;

        let converter = Converter::new(
            device_rate,
            config.channels,
            format.sample_rate,
            format.channels,
        )?;

        stream.play().context("Failed to start audio stream")?;

        let consumer = Rc::new(RefCell::new(consumer));
        let pipeline = Rc::new(RefCell::new(Pipeline { converter, sink }));
        let bridge = tokio::task::spawn_local(Self::bridge_task(
            consumer.clone(),
            pipeline.clone(),
            device_samples(0.5),
            notify,
            on_error,
        ));

        tracing::info!(
            "Audio capture started (device {} Hz {} ch {:?}, recording {} Hz {} ch)",
            device_rate,
            config.channels,
            sample_format,
            format.sample_rate,
            format.channels
        );
        Ok(Self {
            stream,
            consumer,
            pipeline,
            bridge,
        })
    }

    /// Stop the stream, flush whatever is still buffered and finalize the sink
    pub fn stop(self) -> Result<()> {
        let Self {
            stream,
            consumer,
            pipeline,
            bridge,
        } = self;

        // Dropping the stream stops the device callback
        drop(stream);
        bridge.abort();

        let remaining = {
            let mut consumer = consumer.borrow_mut();
            let mut rest = vec![0.0f32; consumer.occupied_len()];
            let n = consumer.pop_slice(&mut rest);
            rest.truncate(n);
            rest
        };

        let mut pipeline = pipeline.borrow_mut();
        pipeline
            .write(&remaining)
            .context("Failed to flush buffered audio")?;
        pipeline.finish()?;

        tracing::info!("Audio capture stopped");
        Ok(())
    }

    async fn bridge_task(
        consumer: Rc<RefCell<HeapCons<f32>>>,
        pipeline: SharedPipeline,
        chunk_size: usize,
        notify: Arc<Notify>,
        on_error: CaptureErrorHandler,
    ) {
        loop {
            notify.notified().await;

            let chunk = {
                let mut consumer = consumer.borrow_mut();
                if consumer.occupied_len() < chunk_size {
                    continue;
                }
                let mut chunk = vec![0.0f32; chunk_size];
                let n = consumer.pop_slice(&mut chunk);
                chunk.truncate(n);
                chunk
            };

            if let Err(e) = pipeline.borrow_mut().write(&chunk) {
                on_error(format!("Failed to write audio chunk: {:#}", e));
                break;
            }
        }
    }
}

/// Pick a device configuration for recording at `target_rate`.
///
/// Only i16 and f32 ranges are usable. A range containing the target rate wins,
/// then fewer channels. The stream runs at the target rate when the range
/// allows it, otherwise at the range's lowest rate and the converter resamples.
fn choose_input_config<I>(ranges: I, target_rate: u32) -> Option<(StreamConfig, SampleFormat)>
where
    I: IntoIterator<Item = SupportedStreamConfigRange>,
{
    let includes_target = |range: &SupportedStreamConfigRange| {
        range.min_sample_rate().0 <= target_rate && range.max_sample_rate().0 >= target_rate
    };

    let mut best: Option<SupportedStreamConfigRange> = None;
    for range in ranges {
        if !matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32) {
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => {
                (includes_target(&range) && !includes_target(current))
                    || (includes_target(&range) == includes_target(current)
                        && range.channels() < current.channels())
            }
        };
        if better {
            best = Some(range);
        }
    }

    let range = best?;
    let sample_rate = if includes_target(&range) {
        SampleRate(target_rate)
    } else {
        range.min_sample_rate()
    };
    let config = StreamConfig {
        channels: range.channels(),
        sample_rate,
        buffer_size: BufferSize::Default,
    };
    Some((config, range.sample_format()))
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    mut producer: HeapProd<f32>,
    notify: Arc<Notify>,
    on_error: CaptureErrorHandler,
) -> Result<cpal::Stream> {
    let error_callback =
        move |err: cpal::StreamError| on_error(format!("Audio stream error: {}", err));

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                producer.push_iter(data.iter().map(|&s| s as f32 / 32768.0));
                notify.notify_one();
            },
            error_callback,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                producer.push_slice(data);
                notify.notify_one();
            },
            error_callback,
            None,
        ),
        other => bail!("Unsupported input sample format {:?}", other),
    };

    stream.context("Failed to build input stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(
        channels: u16,
        min: u32,
        max: u32,
        format: SampleFormat,
    ) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn records_at_target_rate_when_device_allows() {
        let ranges = vec![
            range(2, 8000, 96000, SampleFormat::F32),
            range(1, 8000, 48000, SampleFormat::I16),
        ];
        let (config, format) = choose_input_config(ranges, 12000).unwrap();
        assert_eq!(config.sample_rate, SampleRate(12000));
        assert_eq!(config.channels, 1);
        assert_eq!(format, SampleFormat::I16);
    }

    #[test]
    fn falls_back_to_device_rate_and_channels() {
        // A typical fixed 44.1 kHz stereo float device
        let ranges = vec![range(2, 44100, 44100, SampleFormat::F32)];
        let (config, format) = choose_input_config(ranges, 12000).unwrap();
        assert_eq!(config.sample_rate, SampleRate(44100));
        assert_eq!(config.channels, 2);
        assert_eq!(format, SampleFormat::F32);
    }

    #[test]
    fn range_with_target_beats_fewer_channels() {
        let ranges = vec![
            range(1, 48000, 48000, SampleFormat::F32),
            range(2, 8000, 48000, SampleFormat::I16),
        ];
        let (config, _) = choose_input_config(ranges, 12000).unwrap();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, SampleRate(12000));
    }

    #[test]
    fn unusable_sample_formats_are_skipped() {
        let ranges = vec![
            range(1, 8000, 48000, SampleFormat::U8),
            range(1, 8000, 48000, SampleFormat::F64),
        ];
        assert!(choose_input_config(ranges, 12000).is_none());
    }
}
