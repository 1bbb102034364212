//! Rendering a session ahead of an output sink

use tracing::warn;

use crate::deck::DeckPlayer;
use crate::node::{AudioSource, OutputSink};
use crate::params::DeckId;
use crate::session::Session;
use crate::transform::{Backend, TransformStage};

/// Drives a [`Session`] from two decks into an [`OutputSink`].
///
/// Lives on whichever thread calls [`render_ahead`](Self::render_ahead); that
/// thread is the session's real-time side. Control goes through the
/// [`ControlHandle`](crate::ControlHandle) returned alongside the session.
pub struct Renderer<S: OutputSink, T: TransformStage = Backend> {
    session: Session<T>,
    decks: [DeckPlayer; 2],
    sink: S,
    block_frames: usize,
    deck_a: Vec<f32>,
    deck_b: Vec<f32>,
    rendered: Vec<f32>,
    /// Samples at the front of `rendered` the sink has not taken yet
    queued: usize,
}

impl<S: OutputSink, T: TransformStage> Renderer<S, T> {
    /// Blocks are rendered `block_frames` at a time, capped at the session's maximum.
    pub fn new(
        session: Session<T>,
        deck_a: DeckPlayer,
        deck_b: DeckPlayer,
        sink: S,
        block_frames: usize,
    ) -> Self {
        let ctx = *session.context();
        if ctx.sample_rate as u32 != sink.sample_rate() {
            warn!(
                session = ctx.sample_rate,
                sink = sink.sample_rate(),
                "session and sink sample rates differ, playback speed will be off"
            );
        }
        let block_frames = block_frames.clamp(1, ctx.max_block_frames);
        let block_samples = block_frames * ctx.channels;
        Self {
            rendered: vec![0.0; session.max_output_samples()],
            session,
            decks: [deck_a, deck_b],
            sink,
            block_frames,
            deck_a: vec![0.0; block_samples],
            deck_b: vec![0.0; block_samples],
            queued: 0,
        }
    }

    /// Worst-case sink samples for one rendered block.
    ///
    /// Padding immediately can fill the whole render buffer, whatever the block size.
    fn worst_case_samples(&self) -> usize {
        self.rendered.len() / self.session.context().channels * self.sink.channels()
    }

    /// Render blocks until the sink cannot take another whole one.
    ///
    /// Returns how many blocks were rendered. A block the sink refuses stays
    /// queued and is pushed before anything new is rendered. Failed blocks are
    /// pushed as the silence the session wrote and counted in
    /// [`Session::failed_blocks`].
    pub fn render_ahead(&mut self) -> usize {
        if self.sink.take_underrun() {
            warn!("output underrun");
        }

        let ctx = *self.session.context();
        if self.queued > 0 {
            if !self.sink.push_block(&self.rendered[..self.queued], ctx.channels) {
                return 0;
            }
            self.queued = 0;
        }

        let worst_case = self.worst_case_samples();
        let mut blocks = 0;

        while self.sink.free_samples() >= worst_case {
            let [a, b] = &mut self.decks;
            a.fill(&ctx, &mut self.deck_a);
            b.fill(&ctx, &mut self.deck_b);

            let frames = match self.session.process_block(&self.deck_a, &self.deck_b, &mut self.rendered) {
                Ok(frames) => frames,
                Err(err) => {
                    warn!(%err, "block failed, playing silence");
                    self.block_frames
                }
            };
            blocks += 1;

            let len = frames * ctx.channels;
            if !self.sink.push_block(&self.rendered[..len], ctx.channels) {
                self.queued = len;
                break;
            }
        }
        blocks
    }

    /// Samples rendered but still waiting for room in the sink
    pub fn queued_samples(&self) -> usize {
        self.queued
    }

    pub fn deck(&self, deck: DeckId) -> &DeckPlayer {
        &self.decks[deck.index()]
    }

    pub fn deck_mut(&mut self, deck: DeckId) -> &mut DeckPlayer {
        &mut self.decks[deck.index()]
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::PaddingPolicy;
    use crate::config::SessionConfig;
    use crate::state::ControlState;
    use crate::transform::Passthrough;

    /// Bounded stereo buffer that can be told to turn pushes away
    struct BufferSink {
        samples: Vec<f32>,
        capacity: usize,
        refuse: usize,
    }

    impl BufferSink {
        fn new(capacity: usize) -> Self {
            Self {
                samples: Vec::new(),
                capacity,
                refuse: 0,
            }
        }
    }

    impl OutputSink for BufferSink {
        fn channels(&self) -> usize {
            2
        }

        fn sample_rate(&self) -> u32 {
            48_000
        }

        fn free_samples(&self) -> usize {
            self.capacity - self.samples.len()
        }

        fn push_block(&mut self, block: &[f32], _channels: usize) -> bool {
            if self.refuse > 0 || block.len() > self.free_samples() {
                self.refuse = self.refuse.saturating_sub(1);
                return false;
            }
            self.samples.extend_from_slice(block);
            true
        }
    }

    fn renderer(
        padding: PaddingPolicy,
        latency: usize,
        sink: BufferSink,
    ) -> Renderer<BufferSink, Passthrough> {
        let config = SessionConfig::default()
            .with_max_block_frames(512)
            .with_padding(padding)
            .with_initial(ControlState {
                crossfader: 0.0,
                ..ControlState::default()
            });
        let stage = Passthrough::new(2).with_reported_latency(latency);
        let (_control, session) = Session::with_stage(&config, stage).unwrap();

        let mut deck_a = DeckPlayer::new(vec![0.5; 256], 2, 48_000.0);
        deck_a.set_looping(true);
        deck_a.play();
        let deck_b = DeckPlayer::new(Vec::new(), 2, 48_000.0);

        Renderer::new(session, deck_a, deck_b, sink, 128)
    }

    #[test]
    fn padded_warm_up_blocks_reach_the_sink_whole() {
        let mut renderer = renderer(PaddingPolicy::PadImmediately, 1000, BufferSink::new(2048));

        // 128 real frames + 384 frames of pad, then one steady 128 frame block
        assert_eq!(renderer.render_ahead(), 2);
        assert_eq!(renderer.queued_samples(), 0);

        let samples = &renderer.sink().samples;
        assert_eq!(samples.len(), 512 * 2 + 128 * 2);
        assert!(samples[..1024].iter().all(|&s| s == 0.0));
        assert!(samples[1024..].iter().all(|&s| s == 0.5));
        assert_eq!(renderer.session().pending_latency_samples(), 0);
    }

    #[test]
    fn waits_for_room_for_the_largest_possible_block() {
        let mut renderer = renderer(PaddingPolicy::PadImmediately, 1000, BufferSink::new(1023));
        assert_eq!(renderer.render_ahead(), 0);
        assert_eq!(renderer.session().blocks_processed(), 0);
    }

    #[test]
    fn refused_block_is_kept_until_the_sink_takes_it() {
        let mut sink = BufferSink::new(4096);
        sink.refuse = 1;
        let mut renderer = renderer(PaddingPolicy::CarryForward, 0, sink);

        assert_eq!(renderer.render_ahead(), 1);
        assert_eq!(renderer.queued_samples(), 256);
        assert!(renderer.sink().samples.is_empty());

        // queued block first, then as many fresh blocks as fit
        assert_eq!(renderer.render_ahead(), 12);
        assert_eq!(renderer.queued_samples(), 0);
        assert_eq!(renderer.sink().samples.len(), 13 * 256);
        assert!(renderer.sink().samples.iter().all(|&s| s == 0.5));
        assert_eq!(renderer.session().blocks_processed(), 13);
    }
}
