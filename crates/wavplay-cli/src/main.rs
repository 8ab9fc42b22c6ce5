//! wavplay - play a 16-bit PCM WAV file on an audio output device.

mod devices;
mod play;

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use wavplay_config::{PlayerConfig, resolve_config_path};

#[derive(Parser)]
#[command(name = "wavplay")]
#[command(author, version, about = "Play a 16-bit PCM WAV file", long_about = None)]
struct Cli {
    /// WAV file to play
    #[arg(value_name = "FILE", required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Output device (index, exact name, or partial name)
    #[arg(short, long)]
    device: Option<String>,

    /// Frames per write call
    #[arg(long, value_name = "FRAMES")]
    chunk_frames: Option<usize>,

    /// Player configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Usage errors exit 1; --help and --version are not errors.
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.list_devices {
        return devices::run();
    }

    let config = load_config(&cli)?;
    tracing::debug!(?config, "player configuration");

    match cli.file {
        Some(file) => play::run(&file, &config),
        None => anyhow::bail!("no input file given"),
    }
}

/// Config file (explicit or default location) with command-line overrides applied.
fn load_config(cli: &Cli) -> anyhow::Result<PlayerConfig> {
    let mut config = match resolve_config_path(cli.config.as_deref()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            PlayerConfig::load(&path).map_err(|e| {
                anyhow::anyhow!("could not load configuration {}: {e}", path.display())
            })?
        }
        None => PlayerConfig::default(),
    };

    if let Some(device) = &cli.device {
        config = config.with_device(device.clone());
    }
    if let Some(frames) = cli.chunk_frames {
        config = config.with_chunk_frames(frames);
        // A small queue from the file should not reject a larger chunk from the command line.
        config.queue_frames = config.queue_frames.max(frames);
    }
    if cli.progress {
        config = config.with_progress(true);
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_file_required_without_list_devices() {
        assert!(Cli::try_parse_from(["wavplay"]).is_err());
        assert!(Cli::try_parse_from(["wavplay", "--list-devices"]).is_ok());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["wavplay", "-vv", "a.wav"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let cli =
            Cli::try_parse_from(["wavplay", "--config", "/nonexistent/wavplay.toml", "a.wav"])
                .unwrap();
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("could not load configuration"));
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "device = \"hw:0\"\nchunk_frames = 512\nqueue_frames = 1024\n")
            .unwrap();
        let path = path.to_str().unwrap();

        let cli = Cli::try_parse_from(["wavplay", "--config", path, "a.wav"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.device.as_deref(), Some("hw:0"));
        assert_eq!(config.chunk_frames, 512);
        assert!(!config.progress);

        let cli = Cli::try_parse_from([
            "wavplay",
            "--config",
            path,
            "--device",
            "USB",
            "--chunk-frames",
            "4096",
            "--progress",
            "a.wav",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.device.as_deref(), Some("USB"));
        assert_eq!(config.chunk_frames, 4096);
        assert_eq!(config.queue_frames, 4096);
        assert!(config.progress);
    }

    #[test]
    fn test_config_defaults_match_player_defaults() {
        assert_eq!(
            wavplay_config::DEFAULT_CHUNK_FRAMES,
            wavplay_io::DEFAULT_CHUNK_FRAMES
        );
        assert_eq!(
            wavplay_config::DEFAULT_QUEUE_FRAMES,
            wavplay_io::cpal_backend::DEFAULT_QUEUE_FRAMES
        );
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let cli = Cli::try_parse_from(["wavplay", "--chunk-frames", "0", "a.wav"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
