//! Session - the real-time side of the pipeline, and the handle that controls it
//!
//! ```text
//!  control thread                       audio thread (once per block)
//!  ControlHandle ──► ParameterChannel ──► drain ─► apply ─► MixBus ─► LatencyAligner ─► out
//! ```
//!
//! The channel is the only thing the two sides share. [`ControlState`], the
//! mix bus, the aligner and the transform stage all live inside [`Session`]
//! and are only touched by whoever calls its processing methods.

use tracing::{debug, info};

use crate::aligner::{LatencyAligner, Phase};
use crate::applier::apply_message;
use crate::channel::{channel, ParameterReceiver, ParameterSender};
use crate::config::SessionConfig;
use crate::error::{ConfigError, MixError, SessionError};
use crate::mixer::MixBus;
use crate::node::ProcessContext;
use crate::params::{ControlMessage, DeckId, ParameterUpdate, StretchQuality};
use crate::state::ControlState;
use crate::transform::{Backend, TransformStage};

/// Control-context end of a session.
///
/// Every setter is non-blocking. A full channel hands the message back as
/// `Err(msg)`; whether to drop it, retry or coalesce is up to the caller.
pub struct ControlHandle {
    sender: ParameterSender<ControlMessage>,
    rejected: u64,
}

impl ControlHandle {
    /// Queue any control message
    pub fn send(&mut self, msg: impl Into<ControlMessage>) -> Result<(), ControlMessage> {
        let msg = msg.into();
        self.sender.try_send(msg).map_err(|msg| {
            self.rejected += 1;
            debug!(?msg, rejected = self.rejected, "control channel full, message rejected");
            msg
        })
    }

    pub fn set_crossfader(&mut self, position: f32) -> Result<(), ControlMessage> {
        self.send(ParameterUpdate::Crossfader(position))
    }

    pub fn set_deck_gain(&mut self, deck: DeckId, gain: f32) -> Result<(), ControlMessage> {
        self.send(ParameterUpdate::DeckGain { deck, gain })
    }

    pub fn set_master_gain(&mut self, gain: f32) -> Result<(), ControlMessage> {
        self.send(ParameterUpdate::MasterGain(gain))
    }

    pub fn set_tempo_ratio(&mut self, ratio: f64) -> Result<(), ControlMessage> {
        self.send(ParameterUpdate::TempoRatio(ratio))
    }

    pub fn set_pitch_semitones(&mut self, semitones: f64) -> Result<(), ControlMessage> {
        self.send(ParameterUpdate::PitchSemitones(semitones))
    }

    pub fn set_manual_latency(&mut self, frames: usize) -> Result<(), ControlMessage> {
        self.send(ParameterUpdate::ManualLatencySamples(frames))
    }

    pub fn set_quality(&mut self, quality: StretchQuality) -> Result<(), ControlMessage> {
        self.send(ControlMessage::SetQuality(quality))
    }

    /// Ask the audio side to flush the transform pipeline before its next block
    pub fn reset(&mut self) -> Result<(), ControlMessage> {
        self.send(ControlMessage::Reset)
    }

    /// Messages turned away because the channel was full
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn free_slots(&self) -> usize {
        self.sender.free_slots()
    }

    /// The session has been dropped
    pub fn is_disconnected(&self) -> bool {
        self.sender.is_disconnected()
    }
}

/// Real-time consumer: owns the control state and every processing buffer.
///
/// All scratch memory is allocated in the constructor; the processing methods
/// never allocate, lock or block.
pub struct Session<T: TransformStage = Backend> {
    receiver: ParameterReceiver<ControlMessage>,
    state: ControlState,
    bus: MixBus,
    aligner: LatencyAligner<T>,
    mix_scratch: Vec<f32>,
    ctx: ProcessContext,
    blocks_processed: u64,
    failed_blocks: u64,
}

impl Session<Backend> {
    /// Build a session with the backend named in `config`
    pub fn new(config: &SessionConfig) -> Result<(ControlHandle, Self), ConfigError> {
        config.validate()?;
        let backend = Backend::build(config.backend, config.sample_rate, config.channels)?;
        Self::with_stage(config, backend)
    }
}

impl<T: TransformStage> Session<T> {
    /// Build a session around a caller-supplied transform stage.
    ///
    /// `config.backend` is ignored; the stage must match `config.channels`.
    pub fn with_stage(config: &SessionConfig, stage: T) -> Result<(ControlHandle, Self), ConfigError> {
        config.validate_layout()?;
        if stage.channels() != config.channels {
            return Err(ConfigError::StageChannels {
                stage: stage.channels(),
                session: config.channels,
            });
        }

        let (sender, receiver) = channel(config.channel_capacity)?;

        let state = config.initial.normalized();
        let bus = MixBus::new(&state);
        let mut aligner = LatencyAligner::new(stage, config.padding);
        aligner.set_parameters(&state.transform_params());
        aligner.set_manual_latency(state.manual_latency_samples);

        let ctx = ProcessContext {
            sample_rate: config.sample_rate,
            channels: config.channels,
            max_block_frames: config.max_block_frames,
        };

        info!(
            sample_rate = ctx.sample_rate,
            channels = ctx.channels,
            max_block_frames = ctx.max_block_frames,
            channel_capacity = config.channel_capacity,
            padding = ?config.padding,
            latency = aligner.total_latency_samples(),
            "session created"
        );

        let session = Self {
            receiver,
            state,
            bus,
            aligner,
            mix_scratch: vec![0.0; ctx.max_block_samples()],
            ctx,
            blocks_processed: 0,
            failed_blocks: 0,
        };
        let handle = ControlHandle {
            sender,
            rejected: 0,
        };
        Ok((handle, session))
    }

    /// Apply every queued control message. Returns how many were applied.
    ///
    /// The processing methods call this themselves; calling it separately is
    /// only useful to pick up changes without producing audio.
    pub fn apply_pending(&mut self) -> usize {
        // split borrow: the receiver is drained while the rest is mutated
        let Self {
            receiver,
            state,
            bus,
            aligner,
            ..
        } = self;
        receiver.drain_all(|msg| {
            apply_message(state, bus, aligner, msg);
        })
    }

    /// Process one block of both decks.
    ///
    /// 1. Drain and apply pending control messages
    /// 2. Mix `deck_a` and `deck_b` (interleaved stereo, equal lengths)
    /// 3. Run the mix through the latency-aligned transform into `output`
    ///
    /// Returns the number of frames written to `output`, which differs from the
    /// input block when the tempo is not 1. On failure the whole of `output` is
    /// silenced and the error is returned; nothing is retried.
    pub fn process_block(
        &mut self,
        deck_a: &[f32],
        deck_b: &[f32],
        output: &mut [f32],
    ) -> Result<usize, SessionError> {
        self.apply_pending();
        let result = self.mix_and_transform(deck_a, deck_b, output);
        self.finish_block(result, output)
    }

    /// Process one block of a single interleaved stream through the transform.
    ///
    /// Same draining and failure behaviour as [`process_block`](Self::process_block).
    pub fn process_stream(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize, SessionError> {
        self.apply_pending();
        let result = self.transform(input, output);
        self.finish_block(result, output)
    }

    fn mix_and_transform(
        &mut self,
        deck_a: &[f32],
        deck_b: &[f32],
        output: &mut [f32],
    ) -> Result<usize, SessionError> {
        if self.ctx.channels != 2 {
            return Err(MixError::UnsupportedChannels(self.ctx.channels).into());
        }
        let len = deck_a.len();
        if len % 2 != 0 {
            return Err(MixError::NotInterleavedStereo(len).into());
        }
        self.check_block(len / 2)?;

        let mix = &mut self.mix_scratch[..len];
        self.bus.mix_stereo(deck_a, deck_b, mix)?;
        let produced = self.aligner.process_block(mix, len / 2, output)?;
        Ok(produced)
    }

    fn transform(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize, SessionError> {
        let frames = input.len() / self.ctx.channels;
        self.check_block(frames)?;
        Ok(self.aligner.process_block(input, frames, output)?)
    }

    fn check_block(&self, frames: usize) -> Result<(), SessionError> {
        if frames > self.ctx.max_block_frames {
            return Err(SessionError::BlockTooLarge {
                frames,
                max: self.ctx.max_block_frames,
            });
        }
        Ok(())
    }

    fn finish_block(
        &mut self,
        result: Result<usize, SessionError>,
        output: &mut [f32],
    ) -> Result<usize, SessionError> {
        self.blocks_processed += 1;
        if result.is_err() {
            output.fill(0.0);
            self.failed_blocks += 1;
        }
        result
    }

    /// Flush the transform stage and re-enter warm-up.
    ///
    /// Must be called from the thread that processes blocks; the control side
    /// uses [`ControlHandle::reset`] instead.
    pub fn reset(&mut self) {
        self.aligner.reset();
    }

    /// Intrinsic + manual latency for the current settings, in frames.
    ///
    /// Drivers and recorders use this to line a captured dry signal up with
    /// the processed output.
    pub fn total_latency_samples(&self) -> usize {
        self.aligner.total_latency_samples()
    }

    /// Latency still being paid off, in frames
    pub fn pending_latency_samples(&self) -> usize {
        self.aligner.pending_samples()
    }

    pub fn phase(&self) -> Phase {
        self.aligner.phase()
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn context(&self) -> &ProcessContext {
        &self.ctx
    }

    pub fn aligner(&self) -> &LatencyAligner<T> {
        &self.aligner
    }

    pub fn mix_bus(&self) -> &MixBus {
        &self.bus
    }

    /// Output buffer size (in samples) that fits any block this session accepts
    pub fn max_output_samples(&self) -> usize {
        self.aligner.max_output_frames(self.ctx.max_block_frames) * self.ctx.channels
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    /// Blocks that failed and were replaced by silence
    pub fn failed_blocks(&self) -> u64 {
        self.failed_blocks
    }
}
