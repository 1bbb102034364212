//! Parameter update messages sent from the control context.

use serde::{Deserialize, Serialize};

/// Identifies one of the two decks feeding the mix bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckId {
    A = 0,
    B = 1,
}

impl DeckId {
    pub const ALL: [DeckId; 2] = [DeckId::A, DeckId::B];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Quality knobs consumed by the transform stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchQuality {
    /// 0.0 = neutral, 1.0 = preserve formants as much as the backend allows
    pub formant_preservation: f32,
    /// Higher values keep percussive edges sharper
    pub transient_sensitivity: f32,
    pub high_quality: bool,
}

impl Default for StretchQuality {
    fn default() -> Self {
        Self {
            formant_preservation: 0.5,
            transient_sensitivity: 0.5,
            high_quality: true,
        }
    }
}

impl StretchQuality {
    /// Clamp both blend knobs to `[0, 1]`, leaving the flag as is.
    pub fn clamped(self) -> Self {
        Self {
            formant_preservation: clamp_unit(self.formant_preservation, 0.5),
            transient_sensitivity: clamp_unit(self.transient_sensitivity, 0.5),
            high_quality: self.high_quality,
        }
    }
}

fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A single parameter change.
///
/// Values are taken as-is here; range enforcement happens when the update is
/// applied on the audio thread (see [`ControlState::apply`](crate::ControlState::apply)).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParameterUpdate {
    /// Crossfader position, 0.0 = deck A only, 1.0 = deck B only
    Crossfader(f32),
    DeckGain { deck: DeckId, gain: f32 },
    MasterGain(f32),
    /// Time-stretch ratio, 0.5 ..= 2.5
    TempoRatio(f64),
    /// Pitch shift, -12 ..= 12 semitones
    PitchSemitones(f64),
    /// Extra latency compensation on top of the transform stage's own
    ManualLatencySamples(usize),
}

/// Everything that travels over the session's control channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlMessage {
    Update(ParameterUpdate),
    SetQuality(StretchQuality),
    /// Flush the transform pipeline and re-enter warm-up (seek, track load, ...)
    Reset,
}

impl From<ParameterUpdate> for ControlMessage {
    fn from(update: ParameterUpdate) -> Self {
        ControlMessage::Update(update)
    }
}

impl From<StretchQuality> for ControlMessage {
    fn from(quality: StretchQuality) -> Self {
        ControlMessage::SetQuality(quality)
    }
}
