//! Two-deck summing bus with an equal-power crossfader

use core::f64::consts::FRAC_PI_2;

use itertools::izip;

use crate::error::MixError;
use crate::params::DeckId;
use crate::state::ControlState;

/// Equal-power crossfader gains `(deck A, deck B)` for position `x` in `[0, 1]`.
///
/// `a² + b² = 1` everywhere, so perceived loudness stays constant across the
/// fade; at the centre both decks sit at -3 dB.
pub fn equal_power_gains(x: f32) -> (f32, f32) {
    let x = x.clamp(0.0, 1.0);
    // cos(pi/2) lands a hair above zero; hard right must fully mute deck A
    if x >= 1.0 {
        return (0.0, 1.0);
    }
    let theta = f64::from(x) * FRAC_PI_2;
    (theta.cos().max(0.0) as f32, theta.sin().max(0.0) as f32)
}

/// The gain stages applied to each deck, in order:
/// per-deck gain -> crossfade -> master gain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainStages {
    pub deck: [f32; 2],
    pub crossfade: [f32; 2],
    pub master: f32,
}

impl GainStages {
    pub fn from_state(state: &ControlState) -> Self {
        let (a, b) = equal_power_gains(state.crossfader);
        Self {
            deck: state.deck_gains,
            crossfade: [a, b],
            master: state.master_gain,
        }
    }

    /// Overall multiplier for one deck's samples
    #[inline]
    pub fn lane(&self, deck: DeckId) -> f32 {
        let i = deck.index();
        let staged = self.deck[i];
        let staged = staged * self.crossfade[i];
        staged * self.master
    }
}

impl Default for GainStages {
    fn default() -> Self {
        Self::from_state(&ControlState::default())
    }
}

/// Mixes deck A and deck B into one interleaved stereo block.
///
/// Gains are recomputed only when the control state changes, not per block.
/// No clipping is applied; downstream stages own limiting.
#[derive(Clone, Debug, Default)]
pub struct MixBus {
    stages: GainStages,
}

impl MixBus {
    pub fn new(state: &ControlState) -> Self {
        Self {
            stages: GainStages::from_state(state),
        }
    }

    /// Recompute the gain stages after a mix parameter changed
    pub fn update(&mut self, state: &ControlState) {
        self.stages = GainStages::from_state(state);
    }

    pub fn stages(&self) -> &GainStages {
        &self.stages
    }

    /// `output[i] = (a[i]·gainA·xfA + b[i]·gainB·xfB) · master`
    ///
    /// All three buffers must have the same length and hold whole stereo
    /// frames; anything else is rejected before a single sample is written.
    pub fn mix_stereo(
        &self,
        deck_a: &[f32],
        deck_b: &[f32],
        output: &mut [f32],
    ) -> Result<(), MixError> {
        if deck_a.len() != deck_b.len() || deck_a.len() != output.len() {
            return Err(MixError::LengthMismatch {
                deck_a: deck_a.len(),
                deck_b: deck_b.len(),
                output: output.len(),
            });
        }
        if output.len() % 2 != 0 {
            return Err(MixError::NotInterleavedStereo(output.len()));
        }

        let gain_a = self.stages.lane(DeckId::A);
        let gain_b = self.stages.lane(DeckId::B);

        for (out, a, b) in izip!(
            output.chunks_exact_mut(2),
            deck_a.chunks_exact(2),
            deck_b.chunks_exact(2)
        ) {
            out[0] = a[0] * gain_a + b[0] * gain_b;
            out[1] = a[1] * gain_a + b[1] * gain_b;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::FRAC_1_SQRT_2;

    fn approx_eq(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn equal_power_endpoints() {
        let (a, b) = equal_power_gains(0.0);
        approx_eq(a, 1.0);
        approx_eq(b, 0.0);

        let (a, b) = equal_power_gains(0.5);
        approx_eq(a, FRAC_1_SQRT_2);
        approx_eq(b, FRAC_1_SQRT_2);

        let (a, b) = equal_power_gains(1.0);
        approx_eq(a, 0.0);
        approx_eq(b, 1.0);
    }

    #[test]
    fn equal_power_is_constant_and_monotonic() {
        let mut last = equal_power_gains(0.0);
        for step in 0..=1000 {
            let x = step as f32 / 1000.0;
            let (a, b) = equal_power_gains(x);
            assert!((a * a + b * b - 1.0).abs() < 1e-5, "x = {x}");
            assert!(a <= last.0 && b >= last.1, "x = {x}");
            last = (a, b);
        }
    }

    #[test]
    fn hard_left_passes_deck_a_exactly() {
        let state = ControlState {
            crossfader: 0.0,
            ..ControlState::default()
        };
        let bus = MixBus::new(&state);
        let deck_a = [1.0, 1.0, 1.0, 1.0];
        let deck_b = [0.0; 4];
        let mut out = [9.0; 4];

        bus.mix_stereo(&deck_a, &deck_b, &mut out).unwrap();
        assert_eq!(out, deck_a);
    }

    #[test]
    fn mixes_with_all_gain_stages() {
        let state = ControlState {
            crossfader: 0.25,
            deck_gains: [0.5, 1.5],
            master_gain: 0.8,
            ..ControlState::default()
        };
        let bus = MixBus::new(&state);

        let deck_a = [1.0, 1.0, 1.0, 1.0];
        let deck_b = [0.5, 0.5, 0.5, 0.5];
        let mut out = [0.0; 4];
        bus.mix_stereo(&deck_a, &deck_b, &mut out).unwrap();

        // crossfader 0.25 -> cos(pi/8), sin(pi/8)
        let xf_a = 0.923_879_5;
        let xf_b = 0.382_683_4;
        let expected = (1.0 * 0.5 * xf_a + 0.5 * 1.5 * xf_b) * 0.8;
        for s in out {
            approx_eq(s, expected);
        }
    }

    #[test]
    fn gain_stages_apply_in_order() {
        let state = ControlState {
            crossfader: 1.0,
            deck_gains: [0.25, 2.0],
            master_gain: 0.5,
            ..ControlState::default()
        };
        let stages = GainStages::from_state(&state);
        assert_eq!(stages.deck, [0.25, 2.0]);
        approx_eq(stages.crossfade[0], 0.0);
        approx_eq(stages.crossfade[1], 1.0);
        assert_eq!(stages.master, 0.5);

        approx_eq(stages.lane(DeckId::A), 0.0);
        approx_eq(stages.lane(DeckId::B), 1.0);
    }

    #[test]
    fn silent_master_silences_everything() {
        let state = ControlState {
            master_gain: 0.0,
            ..ControlState::default()
        };
        let bus = MixBus::new(&state);
        let mut out = [1.0; 2];
        bus.mix_stereo(&[1.0, -1.0], &[0.5, 0.5], &mut out).unwrap();
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn does_not_clip() {
        let state = ControlState {
            crossfader: 0.0,
            master_gain: 4.0,
            ..ControlState::default()
        };
        let bus = MixBus::new(&state);
        let mut out = [0.0; 2];
        bus.mix_stereo(&[1.0, -1.0], &[0.0, 0.0], &mut out).unwrap();
        assert_eq!(out, [4.0, -4.0]);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let bus = MixBus::default();
        let mut out = [7.0; 4];
        assert_eq!(
            bus.mix_stereo(&[1.0; 4], &[1.0; 3], &mut out),
            Err(MixError::LengthMismatch {
                deck_a: 4,
                deck_b: 3,
                output: 4
            })
        );
        assert_eq!(out, [7.0; 4]);

        let mut short = [0.0; 2];
        assert!(bus.mix_stereo(&[1.0; 4], &[1.0; 4], &mut short).is_err());
    }

    #[test]
    fn rejects_half_frames() {
        let bus = MixBus::default();
        let mut out = [0.0; 3];
        assert_eq!(
            bus.mix_stereo(&[0.0; 3], &[0.0; 3], &mut out),
            Err(MixError::NotInterleavedStereo(3))
        );
    }
}
