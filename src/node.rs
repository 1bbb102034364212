//! Processing context, and the traits audio flows in and out through.

/// Information fixed for the lifetime of a session.
///
/// Handed to every [`AudioSource::fill`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessContext {
    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: f32,
    /// Interleaved channels per frame
    pub channels: usize,
    /// Largest block the session was sized for, in frames
    pub max_block_frames: usize,
}

impl ProcessContext {
    /// Samples in a full-size block
    #[inline]
    pub fn max_block_samples(&self) -> usize {
        self.max_block_frames * self.channels
    }
}

/// Something that produces interleaved audio for a deck, one block at a time.
///
/// Called from the real-time context: implementations must not block or allocate.
pub trait AudioSource: Send + 'static {
    /// Fill all of `output` (interleaved, `ctx.channels` per frame).
    ///
    /// Sources that run dry write silence rather than leaving stale samples.
    fn fill(&mut self, ctx: &ProcessContext, output: &mut [f32]);
}

/// Where rendered blocks go: a device FIFO, a file writer, a test buffer.
pub trait OutputSink {
    /// Interleaved channels per frame on the sink side
    fn channels(&self) -> usize;

    /// Hz
    fn sample_rate(&self) -> u32;

    /// Samples that can be pushed right now without blocking
    fn free_samples(&self) -> usize;

    /// Push a block with `channels` channels per frame, mapping it onto the
    /// sink's own channel count.
    ///
    /// All or nothing: returns `false` and writes nothing if the block does not fit.
    #[must_use]
    fn push_block(&mut self, block: &[f32], channels: usize) -> bool;

    /// Check and clear the sink's underrun flag
    fn take_underrun(&self) -> bool {
        false
    }
}
