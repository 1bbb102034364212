//! Latency-compensating wrapper around a [`TransformStage`]
//!
//! A transform engine needs a while before its output is trustworthy. The
//! aligner keeps a debt of `pending` frames (intrinsic latency + manual
//! override) and silences that many produced frames before letting real audio
//! through, so processed output lines up with the dry signal.
//!
//! ```text
//!   warm-up (pending > 0)            steady (pending == 0)
//!   [ 0 0 0 0 0 0 | x x x x ] ---> [ x x x x x x x x x x ]
//!     ^ paid-off     ^ produced frames pass through
//! ```
//!
//! Latency is counted in frames; silence is always paid in whole frames so
//! channels never drift apart.

use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::state::TransformParams;
use crate::transform::TransformStage;

/// What to do when one block cannot pay off the whole latency debt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingPolicy {
    /// Carry the remaining debt into the next block. Exact sample accounting.
    #[default]
    CarryForward,
    /// Append the remaining debt as trailing silence now and clear it.
    ///
    /// Matches older hosts that expect the whole warm-up in the first block.
    /// Only as much silence as fits in the output buffer is appended; the rest
    /// of the debt is forgiven.
    PadImmediately,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    WarmUp,
    Steady,
}

/// Latency owed by the output path, in frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LatencyBudget {
    pending: usize,
    intrinsic: usize,
    manual: usize,
}

impl LatencyBudget {
    #[inline]
    pub fn total(&self) -> usize {
        self.intrinsic + self.manual
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending
    }

    fn rearm(&mut self) {
        self.pending = self.total();
    }

    /// Pay off up to `frames` of the debt, returning how much was paid
    fn pay(&mut self, frames: usize) -> usize {
        let paid = self.pending.min(frames);
        self.pending -= paid;
        paid
    }
}

/// Keeps transformed output sample-aligned with the dry signal.
pub struct LatencyAligner<T: TransformStage> {
    stage: T,
    budget: LatencyBudget,
    policy: PaddingPolicy,
    channels: usize,
}

impl<T: TransformStage> LatencyAligner<T> {
    /// Wrap `stage`. The aligner starts in warm-up with the stage's current latency owed.
    pub fn new(stage: T, policy: PaddingPolicy) -> Self {
        let channels = stage.channels().max(1);
        let mut budget = LatencyBudget {
            pending: 0,
            intrinsic: stage.latency_samples(),
            manual: 0,
        };
        budget.rearm();

        Self {
            stage,
            budget,
            policy,
            channels,
        }
    }

    /// Forward new settings to the stage and refresh the intrinsic latency.
    ///
    /// Re-enters warm-up if the stage reports a discontinuity or a different latency.
    pub fn set_parameters(&mut self, params: &TransformParams) {
        if self.stage.set_parameters(params) {
            self.reset();
        } else {
            self.refresh_intrinsic();
        }
    }

    /// Re-read the stage's latency. Returns `true` (and re-arms) if it changed.
    pub fn refresh_intrinsic(&mut self) -> bool {
        let latency = self.stage.latency_samples();
        if latency == self.budget.intrinsic {
            return false;
        }
        self.budget.intrinsic = latency;
        self.budget.rearm();
        true
    }

    /// Change the manual latency override. Always re-arms the full budget.
    pub fn set_manual_latency(&mut self, frames: usize) {
        self.budget.manual = frames;
        self.budget.intrinsic = self.stage.latency_samples();
        self.budget.rearm();
    }

    /// Transform one block and silence whatever part of it is still owed.
    ///
    /// `input` must hold exactly `frames` interleaved frames. Returns the number
    /// of frames written to the front of `output`. Stage failures (including a
    /// stage reporting more frames than `output` holds) are returned as errors;
    /// the debt is left untouched in that case.
    pub fn process_block(
        &mut self,
        input: &[f32],
        frames: usize,
        output: &mut [f32],
    ) -> Result<usize, TransformError> {
        let channels = self.channels;
        if input.len() != frames * channels {
            return Err(TransformError::ShapeMismatch {
                len: input.len(),
                channels,
            });
        }

        let produced = self.stage.process(input, frames, output)?;
        // a stage claiming more than fits is broken; don't trust its count
        if produced * channels > output.len() {
            return Err(TransformError::OutputTooSmall {
                needed: produced * channels,
                available: output.len(),
            });
        }

        // earliest produced frames are still settling
        let paid = self.budget.pay(produced);
        output[..paid * channels].fill(0.0);

        if self.budget.pending == 0 || self.policy == PaddingPolicy::CarryForward {
            return Ok(produced);
        }

        let room = output.len() / channels - produced;
        let pad = self.budget.pending.min(room);
        output[produced * channels..(produced + pad) * channels].fill(0.0);
        self.budget.pending = 0;
        Ok(produced + pad)
    }

    /// Clear the stage's history and owe the full latency again.
    ///
    /// Call after any discontinuity (seek, track load, quality change). Calling
    /// it twice in a row is the same as calling it once.
    pub fn reset(&mut self) {
        self.stage.reset();
        self.budget.intrinsic = self.stage.latency_samples();
        self.budget.rearm();
    }

    /// Intrinsic + manual latency for the current settings, in frames.
    ///
    /// Independent of how much of it is still pending.
    pub fn total_latency_samples(&self) -> usize {
        self.stage.latency_samples() + self.budget.manual
    }

    pub fn intrinsic_latency(&self) -> usize {
        self.stage.latency_samples()
    }

    pub fn manual_latency(&self) -> usize {
        self.budget.manual
    }

    pub fn pending_samples(&self) -> usize {
        self.budget.pending
    }

    pub fn budget(&self) -> LatencyBudget {
        self.budget
    }

    pub fn phase(&self) -> Phase {
        if self.budget.pending > 0 {
            Phase::WarmUp
        } else {
            Phase::Steady
        }
    }

    pub fn policy(&self) -> PaddingPolicy {
        self.policy
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Worst-case frames the stage produces for an input block of `input_frames`.
    ///
    /// Padding immediately can append silence past this, up to the end of the
    /// output buffer.
    pub fn max_output_frames(&self, input_frames: usize) -> usize {
        self.stage.max_output_frames(input_frames)
    }

    pub fn stage(&self) -> &T {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut T {
        &mut self.stage
    }
}
