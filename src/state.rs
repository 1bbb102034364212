//! Live control state owned by the audio thread.

use serde::{Deserialize, Serialize};

use crate::params::{DeckId, StretchQuality};

pub const CROSSFADER_RANGE: (f32, f32) = (0.0, 1.0);
pub const TEMPO_RATIO_RANGE: (f64, f64) = (0.5, 2.5);
pub const PITCH_SEMITONE_RANGE: (f64, f64) = (-12.0, 12.0);

/// Current value of every tunable parameter.
///
/// Only the real-time consumer mutates this; the control side talks to it
/// exclusively through [`ParameterUpdate`](crate::ParameterUpdate) messages.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlState {
    pub crossfader: f32,
    pub deck_gains: [f32; 2],
    pub master_gain: f32,
    pub tempo_ratio: f64,
    pub pitch_semitones: f64,
    pub manual_latency_samples: usize,
    pub quality: StretchQuality,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            crossfader: 0.5,
            deck_gains: [1.0, 1.0],
            master_gain: 1.0,
            tempo_ratio: 1.0,
            pitch_semitones: 0.0,
            manual_latency_samples: 0,
            quality: StretchQuality::default(),
        }
    }
}

impl ControlState {
    #[inline]
    pub fn deck_gain(&self, deck: DeckId) -> f32 {
        self.deck_gains[deck.index()]
    }

    /// The subset of state the transform stage is configured from
    pub fn transform_params(&self) -> TransformParams {
        TransformParams {
            tempo_ratio: self.tempo_ratio,
            pitch_semitones: self.pitch_semitones,
            quality: self.quality,
        }
    }
}

/// Settings forwarded to [`TransformStage::set_parameters`](crate::TransformStage::set_parameters).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformParams {
    pub tempo_ratio: f64,
    pub pitch_semitones: f64,
    pub quality: StretchQuality,
}

impl Default for TransformParams {
    fn default() -> Self {
        ControlState::default().transform_params()
    }
}

impl TransformParams {
    /// Pitch shift as a frequency ratio (`2^(semitones / 12)`)
    pub fn pitch_ratio(&self) -> f64 {
        (self.pitch_semitones / 12.0).exp2()
    }
}
