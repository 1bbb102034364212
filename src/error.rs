//! Error types.
//!
//! Every error here carries only `Copy` data (or is built on the control side),
//! so returning one from the audio thread never allocates.
//!
//! Channel backpressure is deliberately absent: a full queue hands the
//! rejected message back through `Result<(), M>` instead.

use thiserror::Error;

/// Invalid or unloadable session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sample rate must be a positive finite number of Hz, got {0}")]
    InvalidSampleRate(f32),
    #[error("channel count must be at least 1")]
    NoChannels,
    #[error("channel capacity must be a power of two and at least 2, got {0}")]
    InvalidCapacity(usize),
    #[error("max block size must be at least one frame")]
    EmptyBlock,
    #[error("transform stage has {stage} channels but the session is configured for {session}")]
    StageChannels { stage: usize, session: usize },
    #[error("transform backend `{0}` is not compiled in (enable the matching cargo feature)")]
    BackendUnavailable(&'static str),
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Buffers handed to the mix bus do not describe the same interleaved stereo block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MixError {
    #[error("buffer lengths differ: deck A {deck_a}, deck B {deck_b}, output {output}")]
    LengthMismatch {
        deck_a: usize,
        deck_b: usize,
        output: usize,
    },
    #[error("buffer of {0} samples does not hold whole interleaved stereo frames")]
    NotInterleavedStereo(usize),
    #[error("deck mixing needs a stereo session, this one has {0} channels")]
    UnsupportedChannels(usize),
}

/// The transform stage could not process a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("transform stage misconfigured: {0}")]
    InvalidConfiguration(&'static str),
    #[error("input of {len} samples is not a whole number of {channels}-channel frames")]
    ShapeMismatch { len: usize, channels: usize },
    #[error("output buffer holds {available} samples but {needed} are required")]
    OutputTooSmall { needed: usize, available: usize },
}

/// A single processing block failed. The session has already written silence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Mix(#[from] MixError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("block of {frames} frames exceeds the configured maximum of {max}")]
    BlockTooLarge { frames: usize, max: usize },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[cfg(feature = "cpal_sink")]
    #[error("audio device error: {0}")]
    Device(String),
}
