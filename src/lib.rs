//! Deejay - real-time two-deck mixing core
//!
//! Design principles:
//! - Each session has a fixed sample rate, channel count and maximum block size
//! - Parameters reach the audio side through a bounded lock-free channel, not shared state
//! - No Arc, no locks, no allocation on the audio thread
//! - Transformed output stays sample-aligned with the dry signal
//! - CPAL devices are discoverable, playback is optional (`cpal_sink` feature)
//!
//! ```
//! use deejay::{DeckId, Session, SessionConfig};
//!
//! let (mut control, mut session) = Session::new(&SessionConfig::default()).unwrap();
//! control.set_crossfader(0.25).unwrap();
//! control.set_deck_gain(DeckId::B, 0.8).unwrap();
//!
//! let deck_a = vec![0.1; 512];
//! let deck_b = vec![0.2; 512];
//! let mut out = vec![0.0; session.max_output_samples()];
//! let frames = session.process_block(&deck_a, &deck_b, &mut out).unwrap();
//! assert_eq!(frames, 256);
//! ```

mod aligner;
mod applier;
pub mod channel;
mod config;
mod deck;
pub mod endpoints;
mod error;
mod mixer;
mod node;
mod params;
mod render;
mod session;
mod state;
mod transform;

#[cfg(feature = "cpal_sink")]
mod device;
#[cfg(feature = "cpal_sink")]
mod output;

pub use aligner::{LatencyAligner, LatencyBudget, PaddingPolicy, Phase};
pub use applier::{apply_message, Change};
pub use channel::{channel, ParameterReceiver, ParameterSender};
pub use config::SessionConfig;
pub use deck::DeckPlayer;
pub use endpoints::{control_endpoints, ControlEndpoint, EndpointKind};
pub use error::{ConfigError, Error, MixError, SessionError, TransformError};
pub use mixer::{equal_power_gains, GainStages, MixBus};
pub use node::{AudioSource, OutputSink, ProcessContext};
pub use params::{ControlMessage, DeckId, ParameterUpdate, StretchQuality};
pub use render::Renderer;
pub use session::{ControlHandle, Session};
pub use state::{
    ControlState, TransformParams, CROSSFADER_RANGE, PITCH_SEMITONE_RANGE, TEMPO_RATIO_RANGE,
};
#[cfg(feature = "signalsmith")]
pub use transform::SignalsmithStage;
pub use transform::{Backend, Passthrough, StretchBackend, TransformStage};

#[cfg(feature = "cpal_sink")]
pub use device::CpalDevice;
#[cfg(feature = "cpal_sink")]
pub use output::CpalOutput;
