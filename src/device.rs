//! CPAL device discovery.
//!
//! [`CpalDevice`] finds an output device; [`CpalDevice::open`] turns it into a
//! [`CpalOutput`](crate::output::CpalOutput) that rendered session blocks are pushed into.
//!
//! ```no_run
//! use deejay::CpalDevice;
//!
//! for (i, device) in CpalDevice::list_outputs().iter().enumerate() {
//!     println!("[{}] {} ({} Hz, {} ch)",
//!         i, device.name(), device.sample_rate(), device.channels());
//! }
//! ```

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Error;
use crate::output::CpalOutput;

/// A discovered audio output device.
pub struct CpalDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalDevice {
    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        })
    }

    /// The system's default output device, if there is one
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = Self::from_device(host.default_output_device()?)?;
        debug!(name = %device.name, sample_rate = device.sample_rate, channels = device.channels, "default output device");
        Some(device)
    }

    /// Every output device with a usable default config.
    ///
    /// Empty if enumeration fails.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::from_device).collect())
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// A stereo session config at this device's sample rate
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default().with_sample_rate(self.sample_rate as f32)
    }

    /// Start a stream on this device
    pub fn open(&self) -> Result<CpalOutput, Error> {
        CpalOutput::new(&self.device, &self.config)
    }
}
