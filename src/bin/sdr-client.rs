//! SDR Audio Client
//!
//! Connects to an SDR server, plays its audio and streams the microphone while transmitting.
//!
//! Usage: `sdr-client [config.toml] [host:port]`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::bounded;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sdr_audio_link::{
    audio::{shared_jitter_buffer, AudioOutput, PlaybackPath},
    config::AppConfig,
    network::Session,
    stream::{ControlCommand, StreamEvent, StreamOrchestrator},
};

/// Interval between jitter buffer reports
const STATS_INTERVAL: Duration = Duration::from_secs(10);

struct Args {
    config: Option<PathBuf>,
    address: Option<(String, u16)>,
    list_devices: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        address: None,
        list_devices: false,
    };
    for arg in std::env::args().skip(1) {
        if arg == "--list-devices" {
            args.list_devices = true;
        } else if arg.ends_with(".toml") {
            args.config = Some(PathBuf::from(arg));
        } else {
            let (host, port) = arg
                .rsplit_once(':')
                .ok_or_else(|| anyhow!("expected host:port, got {:?}", arg))?;
            let port = port
                .parse()
                .with_context(|| format!("invalid port in {:?}", arg))?;
            args.address = Some((host.to_string(), port));
        }
    }
    Ok(args)
}

#[cfg(feature = "device")]
fn print_devices() {
    use sdr_audio_link::audio::list_devices;

    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}:", device.name, default_marker);
        println!("    ID: {}", device.id);
        println!("    48 kHz: {}", device.supports_link_rate);
        println!("    Channels: {}", device.max_channels);
    }
    println!();
}

#[cfg(not(feature = "device"))]
fn print_devices() {
    println!("Built without the `device` feature; no audio devices available");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let mut config = AppConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some((host, port)) = args.address {
        config.network.host = host;
        config.network.port = port;
        config.validate()?;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SDR audio client");

    print_devices();
    if args.list_devices {
        return Ok(());
    }

    let buffer = shared_jitter_buffer(config.audio.jitter_capacity);
    let output = make_output(&config, &buffer);

    // UI events are only logged here
    let (event_tx, event_rx) = bounded::<StreamEvent>(1024);
    std::thread::Builder::new()
        .name("events".into())
        .spawn(move || {
            for event in event_rx {
                match event {
                    StreamEvent::VideoFrame(frame) => {
                        tracing::trace!("Video frame of {} points", frame.len())
                    }
                    StreamEvent::SMeter(_) | StreamEvent::InputLevel(_) => {
                        tracing::trace!("{:?}", event)
                    }
                    StreamEvent::RxChar(ch) => tracing::info!("Chat: {}", ch as char),
                    other => tracing::info!("Event: {:?}", other),
                }
            }
        })?;

    let mut orchestrator = StreamOrchestrator::new(PlaybackPath::new(buffer.clone()), output, event_tx)
        .with_keepalive(
            config.network.keepalive_period_ticks,
            config.network.keepalive_try_limit,
        );

    let session = Session::connect(&config.network, &mut orchestrator).await?;

    let (cmd_tx, cmd_rx) = mpsc::channel::<ControlCommand>(32);
    let (capture_tx, capture_rx) = mpsc::channel(config.audio.capture_channel_depth);

    let startup = [
        ControlCommand::RequestInfo,
        ControlCommand::ClientDescription(config.network.client_description.clone()),
        ControlCommand::SetRunState(true),
        ControlCommand::SetAudioCompression(config.audio.compression_mode),
        ControlCommand::SetVolume(config.audio.volume),
    ];
    for cmd in startup {
        cmd_tx
            .send(cmd)
            .await
            .map_err(|_| anyhow!("command channel closed"))?;
    }

    #[cfg(feature = "device")]
    let mut capture = {
        let mut capture = sdr_audio_link::audio::CpalCapture::new(config.audio.input_device.clone());
        if let Err(e) = capture.start(capture_tx) {
            tracing::warn!("Capture unavailable: {}", e);
        }
        capture
    };
    #[cfg(not(feature = "device"))]
    drop(capture_tx);

    let stats_buffer = buffer.clone();
    let stats = tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        loop {
            interval.tick().await;
            let s = stats_buffer.lock().stats();
            tracing::info!(
                "Jitter buffer: {}/{} avg={:.0} drift={}ppm overruns={} underruns={}",
                s.level,
                s.capacity,
                s.average,
                s.drift_ppm,
                s.overruns,
                s.underruns
            );
        }
    });

    // Ctrl-C closes the command channel, which ends the session cleanly
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down...");
        }
        let _ = cmd_tx.send(ControlCommand::SetRunState(false)).await;
        drop(cmd_tx);
    });

    let result = session.run(&mut orchestrator, cmd_rx, capture_rx).await;

    stats.abort();
    #[cfg(feature = "device")]
    capture.stop();

    tracing::info!("Final status: {}", orchestrator.status());
    result.map_err(Into::into)
}

#[cfg(feature = "device")]
fn make_output(
    config: &AppConfig,
    buffer: &sdr_audio_link::audio::SharedJitterBuffer,
) -> Box<dyn AudioOutput> {
    Box::new(sdr_audio_link::audio::CpalPlayback::new(
        config.audio.output_device.clone(),
        buffer.clone(),
    ))
}

#[cfg(not(feature = "device"))]
fn make_output(
    _config: &AppConfig,
    _buffer: &sdr_audio_link::audio::SharedJitterBuffer,
) -> Box<dyn AudioOutput> {
    Box::new(sdr_audio_link::audio::NullOutput::new())
}
