//! Time/pitch transform stages
//!
//! The aligner only ever talks to the [`TransformStage`] trait. Two backends
//! implement it:
//! - [`Passthrough`] - copies input to output, optionally reporting a fixed latency
//! - `SignalsmithStage` - real time-stretching and pitch-shifting via
//!   `signalsmith-stretch` (requires the `signalsmith` feature)
//!
//! [`Backend`] picks one of them once, at session construction.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, TransformError};
use crate::state::TransformParams;

/// Narrow interface to a time/pitch transformation engine.
///
/// All audio is interleaved `f32`. Latency is counted in frames
/// (per-channel sample periods).
pub trait TransformStage: Send + 'static {
    /// Apply new tempo/pitch/quality settings.
    ///
    /// Returns `true` if the change invalidated buffered history (for example a
    /// switch to a different processing preset) and the pipeline must warm up again.
    fn set_parameters(&mut self, params: &TransformParams) -> bool;

    /// Transform `frames` frames of `input` into `output`.
    ///
    /// Returns the number of frames written to the front of `output`, which may
    /// differ from `frames` when the tempo is not 1.
    fn process(
        &mut self,
        input: &[f32],
        frames: usize,
        output: &mut [f32],
    ) -> Result<usize, TransformError>;

    /// Current intrinsic processing delay in frames
    fn latency_samples(&self) -> usize;

    /// Drop all buffered history
    fn reset(&mut self);

    fn channels(&self) -> usize;

    /// Upper bound on frames [`process`](Self::process) produces for `input_frames`
    fn max_output_frames(&self, input_frames: usize) -> usize {
        input_frames
    }
}

/// Which transform backend a session should construct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StretchBackend {
    #[default]
    Passthrough,
    Signalsmith,
}

impl StretchBackend {
    pub fn name(self) -> &'static str {
        match self {
            StretchBackend::Passthrough => "passthrough",
            StretchBackend::Signalsmith => "signalsmith",
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            StretchBackend::Passthrough => true,
            StretchBackend::Signalsmith => cfg!(feature = "signalsmith"),
        }
    }
}

/// Identity transform. Ignores tempo and pitch.
#[derive(Clone, Debug)]
pub struct Passthrough {
    channels: usize,
    reported_latency: usize,
}

impl Passthrough {
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.max(1),
            reported_latency: 0,
        }
    }

    /// Report a fixed intrinsic latency without delaying the audio.
    ///
    /// Handy for exercising latency compensation when no real engine is available.
    pub fn with_reported_latency(mut self, frames: usize) -> Self {
        self.reported_latency = frames;
        self
    }
}

impl TransformStage for Passthrough {
    fn set_parameters(&mut self, _params: &TransformParams) -> bool {
        false
    }

    fn process(
        &mut self,
        input: &[f32],
        frames: usize,
        output: &mut [f32],
    ) -> Result<usize, TransformError> {
        let samples = frames * self.channels;
        if input.len() < samples {
            return Err(TransformError::ShapeMismatch {
                len: input.len(),
                channels: self.channels,
            });
        }
        if output.len() < samples {
            return Err(TransformError::OutputTooSmall {
                needed: samples,
                available: output.len(),
            });
        }

        output[..samples].copy_from_slice(&input[..samples]);
        Ok(frames)
    }

    fn latency_samples(&self) -> usize {
        self.reported_latency
    }

    fn reset(&mut self) {}

    fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(feature = "signalsmith")]
pub use self::signalsmith::SignalsmithStage;

#[cfg(feature = "signalsmith")]
mod signalsmith {
    use signalsmith_stretch::Stretch;

    use super::TransformStage;
    use crate::error::TransformError;
    use crate::params::StretchQuality;
    use crate::state::{TransformParams, TEMPO_RATIO_RANGE};

    /// Formant preservation above this switches on the tonality limit
    const FORMANT_THRESHOLD: f32 = 0.6;
    /// Transient sensitivity above this switches to short analysis windows
    const TRANSIENT_THRESHOLD: f32 = 0.6;
    /// Frequency above which transposition stops shaping the spectrum
    const TONALITY_LIMIT_HZ: f32 = 8000.0;
    /// Short window (seconds) for the transient engine: block, then interval
    const TRANSIENT_BLOCK_SECS: f32 = 0.05;
    const TRANSIENT_INTERVAL_SECS: f32 = 0.0125;

    /// Which of the pre-allocated stretchers is live
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(super) enum Engine {
        /// `preset_default`
        Quality,
        /// `preset_cheaper`
        Fast,
        /// Short blocks: better time resolution, sharper percussive edges
        Transient,
    }

    impl Engine {
        fn for_quality(quality: &StretchQuality) -> Self {
            if quality.transient_sensitivity > TRANSIENT_THRESHOLD {
                Engine::Transient
            } else if quality.high_quality {
                Engine::Quality
            } else {
                Engine::Fast
            }
        }
    }

    /// Time-stretch / pitch-shift stage backed by signalsmith-stretch.
    ///
    /// All engines are allocated up front so switching quality on the audio
    /// thread is just a switch. Switching still reports a discontinuity,
    /// because the newly active stretcher has no history.
    pub struct SignalsmithStage {
        quality: Stretch,
        fast: Stretch,
        transient: Stretch,
        engine: Engine,
        channels: usize,
        sample_rate: f32,
        params: TransformParams,
    }

    impl SignalsmithStage {
        pub fn new(sample_rate: f32, channels: usize) -> Self {
            let channels = channels.max(1);
            let rate = sample_rate.round() as u32;
            let block = ((sample_rate * TRANSIENT_BLOCK_SECS) as usize).max(64);
            let interval = ((sample_rate * TRANSIENT_INTERVAL_SECS) as usize).max(16);
            let params = TransformParams::default();
            let mut stage = Self {
                quality: Stretch::preset_default(channels as u32, rate),
                fast: Stretch::preset_cheaper(channels as u32, rate),
                transient: Stretch::new(channels as u32, block, interval),
                engine: Engine::for_quality(&params.quality),
                channels,
                sample_rate,
                params,
            };
            stage.set_parameters(&params);
            stage
        }

        pub(super) fn engine(&self) -> Engine {
            self.engine
        }

        fn active(&mut self) -> &mut Stretch {
            match self.engine {
                Engine::Quality => &mut self.quality,
                Engine::Fast => &mut self.fast,
                Engine::Transient => &mut self.transient,
            }
        }

        fn active_ref(&self) -> &Stretch {
            match self.engine {
                Engine::Quality => &self.quality,
                Engine::Fast => &self.fast,
                Engine::Transient => &self.transient,
            }
        }
    }

    impl TransformStage for SignalsmithStage {
        fn set_parameters(&mut self, params: &TransformParams) -> bool {
            let engine = Engine::for_quality(&params.quality);
            let switched = engine != self.engine;
            self.params = *params;
            self.engine = engine;

            let tonality_limit = if params.quality.formant_preservation > FORMANT_THRESHOLD {
                Some(TONALITY_LIMIT_HZ / self.sample_rate)
            } else {
                None
            };
            let semitones = params.pitch_semitones as f32;
            for stretch in [&mut self.quality, &mut self.fast, &mut self.transient] {
                stretch.set_transpose_factor_semitones(semitones, tonality_limit);
            }

            if switched {
                self.active().reset();
            }
            switched
        }

        fn process(
            &mut self,
            input: &[f32],
            frames: usize,
            output: &mut [f32],
        ) -> Result<usize, TransformError> {
            let ratio = self.params.tempo_ratio;
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(TransformError::InvalidConfiguration(
                    "tempo ratio must be positive and finite",
                ));
            }

            let channels = self.channels;
            let in_samples = frames * channels;
            if input.len() < in_samples {
                return Err(TransformError::ShapeMismatch {
                    len: input.len(),
                    channels,
                });
            }

            // ratio > 1 speeds up: fewer output frames per input frame
            let produced = (frames as f64 / ratio).round() as usize;
            let out_samples = produced * channels;
            if output.len() < out_samples {
                return Err(TransformError::OutputTooSmall {
                    needed: out_samples,
                    available: output.len(),
                });
            }
            if produced == 0 {
                return Ok(0);
            }

            let out = &mut output[..out_samples];
            out.fill(0.0);
            self.active().process(&input[..in_samples], out);
            Ok(produced)
        }

        fn latency_samples(&self) -> usize {
            let active = self.active_ref();
            active.input_latency() + active.output_latency()
        }

        fn reset(&mut self) {
            self.quality.reset();
            self.fast.reset();
            self.transient.reset();
        }

        fn channels(&self) -> usize {
            self.channels
        }

        fn max_output_frames(&self, input_frames: usize) -> usize {
            (input_frames as f64 / TEMPO_RATIO_RANGE.0).ceil() as usize
        }
    }
}

/// The transform stage a [`Session`](crate::Session) is built with.
pub enum Backend {
    Passthrough(Passthrough),
    #[cfg(feature = "signalsmith")]
    Signalsmith(SignalsmithStage),
}

impl Backend {
    /// Construct the requested backend.
    ///
    /// Fails with [`ConfigError::BackendUnavailable`] if the backend was not compiled in.
    pub fn build(
        kind: StretchBackend,
        sample_rate: f32,
        channels: usize,
    ) -> Result<Self, ConfigError> {
        let backend = match kind {
            StretchBackend::Passthrough => Backend::Passthrough(Passthrough::new(channels)),
            #[cfg(feature = "signalsmith")]
            StretchBackend::Signalsmith => {
                Backend::Signalsmith(SignalsmithStage::new(sample_rate, channels))
            }
            #[cfg(not(feature = "signalsmith"))]
            StretchBackend::Signalsmith => {
                tracing::warn!("signalsmith backend requested but the `signalsmith` feature is off");
                return Err(ConfigError::BackendUnavailable(kind.name()));
            }
        };

        tracing::info!(
            backend = kind.name(),
            sample_rate,
            channels,
            latency = backend.latency_samples(),
            "transform backend ready"
        );
        Ok(backend)
    }

    pub fn kind(&self) -> StretchBackend {
        match self {
            Backend::Passthrough(_) => StretchBackend::Passthrough,
            #[cfg(feature = "signalsmith")]
            Backend::Signalsmith(_) => StretchBackend::Signalsmith,
        }
    }
}

impl TransformStage for Backend {
    fn set_parameters(&mut self, params: &TransformParams) -> bool {
        match self {
            Backend::Passthrough(s) => s.set_parameters(params),
            #[cfg(feature = "signalsmith")]
            Backend::Signalsmith(s) => s.set_parameters(params),
        }
    }

    fn process(
        &mut self,
        input: &[f32],
        frames: usize,
        output: &mut [f32],
    ) -> Result<usize, TransformError> {
        match self {
            Backend::Passthrough(s) => s.process(input, frames, output),
            #[cfg(feature = "signalsmith")]
            Backend::Signalsmith(s) => s.process(input, frames, output),
        }
    }

    fn latency_samples(&self) -> usize {
        match self {
            Backend::Passthrough(s) => s.latency_samples(),
            #[cfg(feature = "signalsmith")]
            Backend::Signalsmith(s) => s.latency_samples(),
        }
    }

    fn reset(&mut self) {
        match self {
            Backend::Passthrough(s) => s.reset(),
            #[cfg(feature = "signalsmith")]
            Backend::Signalsmith(s) => s.reset(),
        }
    }

    fn channels(&self) -> usize {
        match self {
            Backend::Passthrough(s) => s.channels(),
            #[cfg(feature = "signalsmith")]
            Backend::Signalsmith(s) => s.channels(),
        }
    }

    fn max_output_frames(&self, input_frames: usize) -> usize {
        match self {
            Backend::Passthrough(s) => s.max_output_frames(input_frames),
            #[cfg(feature = "signalsmith")]
            Backend::Signalsmith(s) => s.max_output_frames(input_frames),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_copies_input() {
        let mut stage = Passthrough::new(2);
        let input = [0.1, 0.2, 0.3, 0.4];
        let mut output = [0.0; 6];

        assert_eq!(stage.process(&input, 2, &mut output), Ok(2));
        assert_eq!(&output[..4], &input);
        assert_eq!(stage.latency_samples(), 0);
    }

    #[test]
    fn passthrough_ignores_tempo_and_pitch() {
        let mut stage = Passthrough::new(1).with_reported_latency(480);
        let params = TransformParams {
            tempo_ratio: 2.0,
            pitch_semitones: 7.0,
            ..TransformParams::default()
        };
        assert!(!stage.set_parameters(&params));
        assert_eq!(stage.latency_samples(), 480);

        let mut output = [0.0; 3];
        assert_eq!(stage.process(&[1.0, 2.0, 3.0], 3, &mut output), Ok(3));
        assert_eq!(output, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn passthrough_rejects_short_output() {
        let mut stage = Passthrough::new(2);
        let mut output = [0.0; 2];
        assert_eq!(
            stage.process(&[0.0; 4], 2, &mut output),
            Err(TransformError::OutputTooSmall {
                needed: 4,
                available: 2
            })
        );
    }

    #[test]
    fn passthrough_backend_always_builds() {
        let backend = Backend::build(StretchBackend::Passthrough, 48_000.0, 2).unwrap();
        assert_eq!(backend.kind(), StretchBackend::Passthrough);
        assert_eq!(backend.channels(), 2);
        assert_eq!(backend.latency_samples(), 0);
    }

    #[cfg(not(feature = "signalsmith"))]
    #[test]
    fn missing_backend_is_a_config_error() {
        assert!(!StretchBackend::Signalsmith.is_available());
        assert!(matches!(
            Backend::build(StretchBackend::Signalsmith, 48_000.0, 2),
            Err(ConfigError::BackendUnavailable("signalsmith"))
        ));
    }

    #[cfg(feature = "signalsmith")]
    #[test]
    fn signalsmith_stretches_and_reports_latency() {
        let mut backend = Backend::build(StretchBackend::Signalsmith, 48_000.0, 2).unwrap();
        assert!(backend.latency_samples() > 0);

        let params = TransformParams {
            tempo_ratio: 2.0,
            ..TransformParams::default()
        };
        assert!(!backend.set_parameters(&params));

        let input = vec![0.0; 512 * 2];
        let mut output = vec![0.0; backend.max_output_frames(512) * 2];
        assert_eq!(backend.process(&input, 512, &mut output), Ok(256));
    }

    #[cfg(feature = "signalsmith")]
    #[test]
    fn signalsmith_transient_sensitivity_switches_engine() {
        use super::signalsmith::Engine;

        let mut stage = SignalsmithStage::new(48_000.0, 2);
        assert_eq!(stage.engine(), Engine::Quality);
        let steady_latency = stage.latency_samples();

        let mut params = TransformParams::default();
        params.quality.transient_sensitivity = 0.9;
        assert!(stage.set_parameters(&params));
        assert_eq!(stage.engine(), Engine::Transient);
        // shorter windows settle sooner
        assert!(stage.latency_samples() < steady_latency);

        // staying above the threshold is not another discontinuity
        params.quality.transient_sensitivity = 0.8;
        assert!(!stage.set_parameters(&params));

        params.quality.transient_sensitivity = 0.3;
        assert!(stage.set_parameters(&params));
        assert_eq!(stage.engine(), Engine::Quality);
    }

    #[cfg(feature = "signalsmith")]
    #[test]
    fn signalsmith_quality_switch_is_a_discontinuity() {
        let mut backend = Backend::build(StretchBackend::Signalsmith, 48_000.0, 2).unwrap();
        let mut params = TransformParams::default();
        params.quality.high_quality = false;
        assert!(backend.set_parameters(&params));
        assert!(!backend.set_parameters(&params));
    }
}
