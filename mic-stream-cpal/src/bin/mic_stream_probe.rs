//! Capture from the microphone for a few seconds and print frames.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{after, select};

use mic_stream_core::{CaptureConfig, Collaborators, Recorder, SessionNotice};
use mic_stream_cpal::{CpalMicCapture, DeviceEnumerator, ExclusiveFocus, ProbePermission, ProcessKeepAlive};

#[derive(Debug, Parser)]
#[command(about = "Stream microphone frames to stdout", author, version)]
struct Args {
    /// How long to capture, in seconds
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Input device name (defaults to the system microphone)
    #[arg(long)]
    device: Option<String>,

    /// JSON capture configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured input gain
    #[arg(long)]
    gain: Option<f32>,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print each frame as a JSON event instead of a level line
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        for source in DeviceEnumerator::new().list_input_devices()? {
            let marker = if source.is_default { " (default)" } else { "" };
            println!("{}{}", source.name, marker);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => CaptureConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => CaptureConfig::default(),
    };
    if let Some(gain) = args.gain {
        config.gain = gain;
    }

    let (provider, permission) = match &args.device {
        Some(name) => (CpalMicCapture::with_device(name.clone()), ProbePermission::for_device(name.clone())),
        None => (CpalMicCapture::default_device(), ProbePermission::new()),
    };
    let (focus, _relay) = ExclusiveFocus::new();
    let collaborators = Collaborators {
        permission: Arc::new(permission),
        focus: Box::new(focus),
        keep_alive: Arc::new(ProcessKeepAlive::new()),
    };

    let recorder = Recorder::spawn(provider, collaborators, config)?;
    let subscription = recorder.subscribe();
    recorder.start_recording().context("starting capture")?;

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut frames = 0u64;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        select! {
            recv(subscription.frames()) -> frame => {
                let Ok(frame) = frame else { break };
                frames += 1;
                if args.json {
                    println!("{}", frame.to_json()?);
                } else {
                    println!("#{:<6} level {:.3}", frame.sequence, frame.amplitude);
                }
            }
            recv(subscription.notices()) -> notice => match notice {
                Ok(SessionNotice::Ended(end)) => {
                    log::warn!("Session ended: {:?}", end);
                    break;
                }
                Ok(SessionNotice::StateChanged(state)) => log::info!("State: {:?}", state),
                Err(_) => break,
            },
            recv(after(remaining)) -> _ => break,
        }
    }

    recorder.stop_recording();
    let diagnostics = recorder.diagnostics();
    log::info!("Received {} frames; diagnostics: {:?}", frames, diagnostics);
    Ok(())
}
