//! Load a WAV file and play it through the selected output device.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use wavplay_config::PlayerConfig;
use wavplay_io::{CancelToken, CpalSink, PlaybackDevice, Player};

pub fn run(file: &Path, config: &PlayerConfig) -> anyhow::Result<()> {
    let (header, frames) = wavplay_io::load(file)?;

    println!(
        "{} frames, {} ch, {} Hz, {:.1}s",
        frames.frame_count(),
        header.channels,
        header.sample_rate,
        frames.duration_secs()
    );

    if frames.is_empty() {
        anyhow::bail!("could not load WAV data: data chunk is empty, nothing to play");
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        println!("\nStopping playback...");
        handler_token.cancel();
    })?;

    let mut sink = CpalSink::new().with_queue_frames(config.queue_frames);
    if let Some(device) = &config.device {
        sink = sink.with_device(device.clone());
    }

    let mut player = Player::new(PlaybackDevice::new(Box::new(sink)), cancel)
        .with_chunk_frames(config.chunk_frames);

    let bar = if config.progress {
        Some(progress_bar(frames.frame_count())?)
    } else {
        None
    };
    if let Some(bar) = &bar {
        let bar = bar.clone();
        player = player.with_progress(move |position| bar.set_position(position as u64));
    }

    println!("Playing... Press Ctrl+C to stop.");
    let result = player.play(&header, &frames);
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let report = result?;

    if report.recoveries > 0 {
        tracing::info!(
            recoveries = report.recoveries,
            "recovered from transient device errors"
        );
    }

    if report.cancelled {
        println!(
            "Stopped after {} of {} frames",
            report.frames_played, report.total_frames
        );
    } else {
        println!("Done!");
    }
    Ok(())
}

fn progress_bar(total_frames: usize) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(total_frames as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({eta})")?
            .progress_chars("##-"),
    );
    Ok(bar)
}
