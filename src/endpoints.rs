//! Static description of the tunable surface, for UI layers
//!
//! Endpoints carry no runtime state. A UI renders one slider or numeric field
//! per entry and turns edits into control messages with
//! [`ControlEndpoint::update_for`].

use serde::Serialize;

use crate::params::{ControlMessage, DeckId, ParameterUpdate, StretchQuality};
use crate::state::{ControlState, CROSSFADER_RANGE, PITCH_SEMITONE_RANGE, TEMPO_RATIO_RANGE};

/// Largest manual latency offered by the numeric field, in frames
pub const MAX_MANUAL_LATENCY_SAMPLES: usize = 4096;
/// Top of the gain sliders; the applier itself has no upper bound
pub const MAX_GAIN: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Slider,
    Numeric,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ControlEndpoint {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: EndpointKind,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub description: &'static str,
}

const DEFAULTS: ControlState = ControlState {
    crossfader: 0.5,
    deck_gains: [1.0, 1.0],
    master_gain: 1.0,
    tempo_ratio: 1.0,
    pitch_semitones: 0.0,
    manual_latency_samples: 0,
    quality: StretchQuality {
        formant_preservation: 0.5,
        transient_sensitivity: 0.5,
        high_quality: true,
    },
};

pub const CONTROL_ENDPOINTS: &[ControlEndpoint] = &[
    ControlEndpoint {
        id: "tempo",
        label: "Tempo",
        kind: EndpointKind::Slider,
        min: TEMPO_RATIO_RANGE.0,
        max: TEMPO_RATIO_RANGE.1,
        default: DEFAULTS.tempo_ratio,
        description: "Time-stretch ratio; above 1 plays faster without changing pitch.",
    },
    ControlEndpoint {
        id: "pitch",
        label: "Pitch",
        kind: EndpointKind::Slider,
        min: PITCH_SEMITONE_RANGE.0,
        max: PITCH_SEMITONE_RANGE.1,
        default: DEFAULTS.pitch_semitones,
        description: "Pitch shift in semitones, independent of tempo.",
    },
    ControlEndpoint {
        id: "manualLatency",
        label: "Manual Latency",
        kind: EndpointKind::Numeric,
        min: 0.0,
        max: MAX_MANUAL_LATENCY_SAMPLES as f64,
        default: DEFAULTS.manual_latency_samples as f64,
        description: "Additional latency compensation in samples, added to the stretcher's own.",
    },
    ControlEndpoint {
        id: "crossfader",
        label: "Crossfader",
        kind: EndpointKind::Slider,
        min: CROSSFADER_RANGE.0 as f64,
        max: CROSSFADER_RANGE.1 as f64,
        default: DEFAULTS.crossfader as f64,
        description: "Equal-power blend from deck A (0) to deck B (1).",
    },
    ControlEndpoint {
        id: "deckGainA",
        label: "Deck A Gain",
        kind: EndpointKind::Slider,
        min: 0.0,
        max: MAX_GAIN as f64,
        default: DEFAULTS.deck_gains[0] as f64,
        description: "Channel gain for deck A, applied before the crossfader.",
    },
    ControlEndpoint {
        id: "deckGainB",
        label: "Deck B Gain",
        kind: EndpointKind::Slider,
        min: 0.0,
        max: MAX_GAIN as f64,
        default: DEFAULTS.deck_gains[1] as f64,
        description: "Channel gain for deck B, applied before the crossfader.",
    },
    ControlEndpoint {
        id: "masterGain",
        label: "Master Gain",
        kind: EndpointKind::Slider,
        min: 0.0,
        max: MAX_GAIN as f64,
        default: DEFAULTS.master_gain as f64,
        description: "Output gain applied after the crossfader. No limiting is performed.",
    },
    ControlEndpoint {
        id: "formant",
        label: "Formant Preservation",
        kind: EndpointKind::Slider,
        min: 0.0,
        max: 1.0,
        default: DEFAULTS.quality.formant_preservation as f64,
        description: "Blend between neutral and formant-preserving pitch shifting.",
    },
    ControlEndpoint {
        id: "transient",
        label: "Transient Sensitivity",
        kind: EndpointKind::Slider,
        min: 0.0,
        max: 1.0,
        default: DEFAULTS.quality.transient_sensitivity as f64,
        description: "Higher values keep percussive edges sharper.",
    },
];

pub fn control_endpoints() -> &'static [ControlEndpoint] {
    CONTROL_ENDPOINTS
}

pub fn find(id: &str) -> Option<&'static ControlEndpoint> {
    CONTROL_ENDPOINTS.iter().find(|e| e.id == id)
}

impl ControlEndpoint {
    /// Control message that sets this endpoint to `value`.
    ///
    /// Quality endpoints need the rest of the current quality record, so they
    /// take it from `current`. The value is clamped to the endpoint's range.
    /// `None` for an id that names no parameter.
    pub fn update_for(&self, value: f64, current: &StretchQuality) -> Option<ControlMessage> {
        let value = if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        };

        let msg: ControlMessage = match self.id {
            "tempo" => ParameterUpdate::TempoRatio(value).into(),
            "pitch" => ParameterUpdate::PitchSemitones(value).into(),
            "manualLatency" => ParameterUpdate::ManualLatencySamples(value.round() as usize).into(),
            "crossfader" => ParameterUpdate::Crossfader(value as f32).into(),
            "deckGainA" => ParameterUpdate::DeckGain {
                deck: DeckId::A,
                gain: value as f32,
            }
            .into(),
            "deckGainB" => ParameterUpdate::DeckGain {
                deck: DeckId::B,
                gain: value as f32,
            }
            .into(),
            "masterGain" => ParameterUpdate::MasterGain(value as f32).into(),
            "formant" => ControlMessage::SetQuality(StretchQuality {
                formant_preservation: value as f32,
                ..*current
            }),
            "transient" => ControlMessage::SetQuality(StretchQuality {
                transient_sensitivity: value as f32,
                ..*current
            }),
            _ => return None,
        };
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        for (i, a) in CONTROL_ENDPOINTS.iter().enumerate() {
            for b in &CONTROL_ENDPOINTS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn defaults_sit_inside_their_ranges() {
        for e in control_endpoints() {
            assert!(e.min < e.max, "{}", e.id);
            assert!(e.default >= e.min && e.default <= e.max, "{}", e.id);
        }
    }

    #[test]
    fn defaults_match_control_state() {
        assert_eq!(DEFAULTS, ControlState::default());
    }

    #[test]
    fn tempo_endpoint_mirrors_the_applier_range() {
        let tempo = find("tempo").unwrap();
        assert_eq!((tempo.min, tempo.max), (0.5, 2.5));
        assert_eq!(tempo.kind, EndpointKind::Slider);
        assert_eq!(find("manualLatency").unwrap().kind, EndpointKind::Numeric);
        assert!(find("nope").is_none());
    }

    #[test]
    fn builds_matching_messages() {
        let quality = StretchQuality::default();
        assert_eq!(
            find("deckGainB").unwrap().update_for(0.25, &quality),
            Some(ControlMessage::Update(ParameterUpdate::DeckGain {
                deck: DeckId::B,
                gain: 0.25
            }))
        );
        assert_eq!(
            find("manualLatency").unwrap().update_for(99999.0, &quality),
            Some(ControlMessage::Update(ParameterUpdate::ManualLatencySamples(4096)))
        );
        assert_eq!(
            find("formant").unwrap().update_for(0.9, &quality),
            Some(ControlMessage::SetQuality(StretchQuality {
                formant_preservation: 0.9,
                ..quality
            }))
        );
        assert_eq!(
            find("masterGain").unwrap().update_for(0.5, &quality),
            Some(ControlMessage::Update(ParameterUpdate::MasterGain(0.5)))
        );
    }

    #[test]
    fn every_listed_endpoint_maps_to_a_message() {
        let quality = StretchQuality::default();
        for e in control_endpoints() {
            assert!(e.update_for(e.default, &quality).is_some(), "{}", e.id);
        }
    }

    #[test]
    fn unknown_ids_map_to_nothing() {
        let rogue = ControlEndpoint {
            id: "reverbMix",
            ..*find("masterGain").unwrap()
        };
        assert_eq!(rogue.update_for(1.0, &StretchQuality::default()), None);
    }

    #[test]
    fn serializes_for_the_ui() {
        let json = serde_json::to_value(find("manualLatency").unwrap()).unwrap();
        assert_eq!(json["id"], "manualLatency");
        assert_eq!(json["kind"], "numeric");
        assert_eq!(json["max"], 4096.0);
    }
}
