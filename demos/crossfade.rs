//! Two sine decks, with the crossfader swept back and forth from a control thread
//!
//! Run with: cargo run --example crossfade --features cpal_sink

use std::thread::sleep;
use std::time::{Duration, Instant};

use dasp_signal::{self as signal, Signal};

use deejay::{CpalDevice, DeckId, DeckPlayer, Renderer, Session};

fn tone(hz: f64, secs: f64, sample_rate: f64) -> Vec<f32> {
    let frames = (secs * sample_rate) as usize;
    signal::rate(sample_rate)
        .const_hz(hz)
        .sine()
        .take(frames)
        .flat_map(|s| [s as f32 * 0.3; 2])
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let device = CpalDevice::default_output().ok_or("No audio device")?;
    println!("Playing on {} ({} Hz)", device.name(), device.sample_rate());

    let config = device.session_config().with_max_block_frames(256);
    let (mut control, session) = Session::new(&config)?;
    let rate = f64::from(device.sample_rate());

    let mut deck_a = DeckPlayer::new(tone(220.0, 2.0, rate), 2, config.sample_rate);
    let mut deck_b = DeckPlayer::new(tone(330.0, 2.0, rate), 2, config.sample_rate);
    for deck in [&mut deck_a, &mut deck_b] {
        deck.set_looping(true);
        deck.play();
    }

    let mut renderer = Renderer::new(session, deck_a, deck_b, device.open()?, 128);

    // control thread: sweep A -> B -> A over eight seconds
    let sweeper = std::thread::spawn(move || {
        let start = Instant::now();
        control.set_deck_gain(DeckId::B, 0.8).ok();
        while start.elapsed() < Duration::from_secs(8) {
            let t = start.elapsed().as_secs_f32() / 4.0;
            let position = 1.0 - (t - 1.0).abs();
            // a full channel just means the next tick carries a newer value
            let _ = control.set_crossfader(position);
            sleep(Duration::from_millis(10));
        }
        control.rejected()
    });

    println!("Sweeping crossfader... ");
    while !sweeper.is_finished() {
        renderer.render_ahead();
        sleep(Duration::from_millis(2));
    }

    let rejected = sweeper.join().map_err(|_| "control thread panicked")?;
    println!(
        "Done: {} blocks, {} failed, {} control messages rejected",
        renderer.session().blocks_processed(),
        renderer.session().failed_blocks(),
        rejected
    );
    Ok(())
}
