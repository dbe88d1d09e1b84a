use anyhow::Result;

/// Trait for streaming audio encoding
///
/// Implementations encode audio samples as they arrive rather than buffering
/// the whole recording. `finalize` blocks until the file is complete on disk.
pub trait AudioSink {
    /// Write audio samples (streaming, called repeatedly during recording)
    /// The Vec is moved to avoid copying
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()>;

    /// Finalize and close the sink
    fn finalize(&mut self) -> Result<()>;
}
