//! Applying dequeued updates to the live control state
//!
//! Nothing here can fail: out-of-range values are clamped into range, and
//! negative gains become silence rather than a phase flip.

use crate::aligner::LatencyAligner;
use crate::mixer::MixBus;
use crate::params::{ControlMessage, ParameterUpdate, StretchQuality};
use crate::state::{ControlState, CROSSFADER_RANGE, PITCH_SEMITONE_RANGE, TEMPO_RATIO_RANGE};
use crate::transform::TransformStage;

/// Which downstream consumers need to hear about an applied update
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Change {
    /// Crossfader or a gain moved; the mix bus must recompute its stages
    pub mix: bool,
    /// Tempo, pitch or quality moved; the transform stage must be reconfigured
    pub transform: bool,
    /// The manual latency override moved
    pub latency: bool,
}

impl Change {
    const MIX: Change = Change {
        mix: true,
        transform: false,
        latency: false,
    };
    const TRANSFORM: Change = Change {
        mix: false,
        transform: true,
        latency: false,
    };
    const LATENCY: Change = Change {
        mix: false,
        transform: false,
        latency: true,
    };

    pub fn merge(self, other: Change) -> Change {
        Change {
            mix: self.mix || other.mix,
            transform: self.transform || other.transform,
            latency: self.latency || other.latency,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.mix || self.transform || self.latency)
    }
}

#[inline]
fn clamp_gain(gain: f32) -> f32 {
    // NaN compares false, so it lands on silence as well
    if gain > 0.0 {
        gain
    } else {
        0.0
    }
}

#[inline]
fn clamp_or_keep<T: PartialOrd + Copy>(value: T, (min, max): (T, T), current: T) -> T {
    // only NaN fails both comparisons; keep the current value for it
    if value < min {
        min
    } else if value > max {
        max
    } else if value >= min {
        value
    } else {
        current
    }
}

impl ControlState {
    /// Store `update`, clamping it into its documented range.
    ///
    /// Later updates to the same field simply overwrite earlier ones.
    pub fn apply(&mut self, update: ParameterUpdate) -> Change {
        match update {
            ParameterUpdate::Crossfader(x) => {
                self.crossfader = clamp_or_keep(x, CROSSFADER_RANGE, self.crossfader);
                Change::MIX
            }
            ParameterUpdate::DeckGain { deck, gain } => {
                self.deck_gains[deck.index()] = clamp_gain(gain);
                Change::MIX
            }
            ParameterUpdate::MasterGain(gain) => {
                self.master_gain = clamp_gain(gain);
                Change::MIX
            }
            ParameterUpdate::TempoRatio(ratio) => {
                self.tempo_ratio = clamp_or_keep(ratio, TEMPO_RATIO_RANGE, self.tempo_ratio);
                Change::TRANSFORM
            }
            ParameterUpdate::PitchSemitones(semitones) => {
                self.pitch_semitones =
                    clamp_or_keep(semitones, PITCH_SEMITONE_RANGE, self.pitch_semitones);
                Change::TRANSFORM
            }
            ParameterUpdate::ManualLatencySamples(frames) => {
                self.manual_latency_samples = frames;
                Change::LATENCY
            }
        }
    }

    pub fn set_quality(&mut self, quality: StretchQuality) -> Change {
        self.quality = quality.clamped();
        Change::TRANSFORM
    }

    /// Run every field through the same clamping rules as live updates
    pub fn normalized(self) -> ControlState {
        let mut state = ControlState::default();
        state.apply(ParameterUpdate::Crossfader(self.crossfader));
        for deck in crate::params::DeckId::ALL {
            state.apply(ParameterUpdate::DeckGain {
                deck,
                gain: self.deck_gain(deck),
            });
        }
        state.apply(ParameterUpdate::MasterGain(self.master_gain));
        state.apply(ParameterUpdate::TempoRatio(self.tempo_ratio));
        state.apply(ParameterUpdate::PitchSemitones(self.pitch_semitones));
        state.apply(ParameterUpdate::ManualLatencySamples(
            self.manual_latency_samples,
        ));
        state.set_quality(self.quality);
        state
    }
}

/// Apply one control message on the audio thread and push its effects downstream.
///
/// Tempo, pitch and quality changes are forwarded to the transform stage and
/// refresh the intrinsic latency; a manual latency change re-arms the budget.
/// `Reset` flushes the stage and re-enters warm-up.
pub fn apply_message<T: TransformStage>(
    state: &mut ControlState,
    bus: &mut MixBus,
    aligner: &mut LatencyAligner<T>,
    msg: ControlMessage,
) -> Change {
    let change = match msg {
        ControlMessage::Update(update) => state.apply(update),
        ControlMessage::SetQuality(quality) => state.set_quality(quality),
        ControlMessage::Reset => {
            aligner.reset();
            return Change::default();
        }
    };

    if change.mix {
        bus.update(state);
    }
    if change.transform {
        aligner.set_parameters(&state.transform_params());
    }
    if change.latency {
        aligner.set_manual_latency(state.manual_latency_samples);
    }
    change
}
