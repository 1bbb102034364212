//! Render a mix without an audio device and watch the latency warm-up
//!
//! Run with: cargo run --example offline_render

use deejay::{
    ControlState, DeckId, PaddingPolicy, Passthrough, Phase, Session, SessionConfig,
};

const BLOCK_FRAMES: usize = 128;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = SessionConfig::default()
        .with_max_block_frames(BLOCK_FRAMES)
        .with_padding(PaddingPolicy::CarryForward)
        .with_initial(ControlState {
            manual_latency_samples: 64,
            ..ControlState::default()
        });

    // stand-in for a stretcher with a 300 frame window
    let stage = Passthrough::new(2).with_reported_latency(300);
    let (mut control, mut session) = Session::with_stage(&config, stage)?;
    println!("total latency: {} frames", session.total_latency_samples());

    let deck_a: Vec<f32> = (0..BLOCK_FRAMES * 2).map(|i| ((i / 2) as f32 * 0.05).sin()).collect();
    let deck_b: Vec<f32> = deck_a.iter().map(|s| -s).collect();
    let mut out = vec![0.0; session.max_output_samples()];

    control.set_crossfader(0.0).ok();
    for block in 0..8 {
        if block == 5 {
            control.set_deck_gain(DeckId::A, 0.5).ok();
            control.set_manual_latency(32).ok();
        }

        let frames = session.process_block(&deck_a, &deck_b, &mut out)?;
        let silent = out[..frames * 2]
            .chunks_exact(2)
            .take_while(|frame| frame.iter().all(|&s| s == 0.0))
            .count();
        let phase = match session.phase() {
            Phase::WarmUp => "warm-up",
            Phase::Steady => "steady",
        };
        println!(
            "block {block}: {frames} frames, {silent} silent, {} pending ({phase})",
            session.pending_latency_samples()
        );
    }
    Ok(())
}
