//! Deck sample player

use crate::node::{AudioSource, ProcessContext};

/// Plays pre-decoded interleaved audio into a deck.
///
/// For streaming large files, consider a different approach using
/// a ring buffer fed by a decoder thread.
#[derive(Clone, Debug)]
pub struct DeckPlayer {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: f32,
    /// Read position in samples, always on a frame boundary
    position: usize,
    playing: bool,
    looping: bool,
}

impl DeckPlayer {
    /// Create a player from interleaved samples. Starts paused.
    pub fn new(samples: Vec<f32>, channels: usize, sample_rate: f32) -> Self {
        let channels = channels.max(1);
        let mut samples = samples;
        // drop a trailing partial frame
        samples.truncate(samples.len() - samples.len() % channels);

        Self {
            samples,
            channels,
            sample_rate,
            position: 0,
            playing: false,
            looping: false,
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Stop playback and rewind to the start
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = 0;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Jump to `secs`, clamped to the end of the track
    pub fn seek(&mut self, secs: f64) {
        let frame = (secs.max(0.0) * f64::from(self.sample_rate)) as usize;
        self.position = (frame * self.channels).min(self.samples.len());
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        (self.samples.len() / self.channels) as f64 / f64::from(self.sample_rate)
    }

    #[inline]
    pub fn position_secs(&self) -> f64 {
        (self.position / self.channels) as f64 / f64::from(self.sample_rate)
    }
}

impl AudioSource for DeckPlayer {
    fn fill(&mut self, ctx: &ProcessContext, output: &mut [f32]) {
        let out_channels = ctx.channels.max(1);

        if !self.playing || self.samples.is_empty() {
            output.fill(0.0);
            return;
        }

        for frame in output.chunks_mut(out_channels) {
            if self.position >= self.samples.len() {
                if self.looping {
                    self.position = 0;
                } else {
                    self.playing = false;
                    frame.fill(0.0);
                    continue;
                }
            }

            if !self.playing {
                frame.fill(0.0);
                continue;
            }

            for (ch, sample) in frame.iter_mut().enumerate() {
                // wrap when there are more output channels than source channels
                *sample = self.samples[self.position + ch % self.channels];
            }
            self.position += self.channels;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ProcessContext {
        ProcessContext {
            sample_rate: 4.0,
            channels: 2,
            max_block_frames: 8,
        }
    }

    #[test]
    fn silent_until_played() {
        let mut deck = DeckPlayer::new(vec![1.0; 8], 2, 4.0);
        let mut out = [9.0; 4];
        deck.fill(&ctx(), &mut out);
        assert_eq!(out, [0.0; 4]);

        deck.play();
        deck.fill(&ctx(), &mut out);
        assert_eq!(out, [1.0; 4]);
    }

    #[test]
    fn stops_at_the_end_unless_looping() {
        let mut deck = DeckPlayer::new(vec![1.0, 2.0, 3.0, 4.0], 2, 4.0);
        deck.play();
        let mut out = [0.0; 6];
        deck.fill(&ctx(), &mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 0.0, 0.0]);
        assert!(!deck.is_playing());

        deck.stop();
        deck.set_looping(true);
        deck.play();
        deck.fill(&ctx(), &mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn mono_source_feeds_both_channels() {
        let mut deck = DeckPlayer::new(vec![0.5, -0.5], 1, 4.0);
        deck.play();
        let mut out = [0.0; 4];
        deck.fill(&ctx(), &mut out);
        assert_eq!(out, [0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn seek_lands_on_frame_boundaries() {
        let mut deck = DeckPlayer::new((0..16).map(|i| i as f32).collect(), 2, 4.0);
        assert_eq!(deck.duration_secs(), 2.0);

        deck.seek(0.5);
        assert_eq!(deck.position_secs(), 0.5);
        deck.play();
        let mut out = [0.0; 2];
        deck.fill(&ctx(), &mut out);
        assert_eq!(out, [4.0, 5.0]);

        deck.seek(100.0);
        assert_eq!(deck.position_secs(), 2.0);
    }
}
