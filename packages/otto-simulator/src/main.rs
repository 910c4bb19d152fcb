//! main.rs — otto-sim entry point
//!
//! Speaks the controller side of the helm wire over a serial device
//! (pair it with helmd through a socat pty pair). Runs the handshake
//! gate, a 10 Hz physics tick, and the reporting cadences: status at
//! ~1 Hz, boot seconds at ~0.25 Hz, one telemetry channel every few
//! seconds, `!` on every mode change.

mod controller;

use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::interval;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use controller::Controller;

#[derive(Parser, Debug)]
#[command(name = "otto-sim", about = "Synthetic low-level sailing controller")]
struct Args {
    /// Serial device to speak on (e.g. a socat pty)
    #[arg(short, long)]
    device: String,
    /// Baud rate
    #[arg(long, default_value = "9600")]
    baud: u32,
    /// Initial compass heading, degrees
    #[arg(long, default_value = "90.0")]
    compass: f64,
    /// True wind direction, degrees
    #[arg(long, default_value = "0.0")]
    wind: f64,
    /// Compass noise sigma, radians
    #[arg(long, default_value = "0.01")]
    noise: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otto_sim=info".into()),
        )
        .init();

    let args = Args::parse();
    info!(
        device = %args.device,
        compass = args.compass,
        wind = args.wind,
        "otto-sim starting"
    );

    let port = tokio_serial::new(&args.device, args.baud).open_native_async()?;
    let (read, mut write) = tokio::io::split(port);
    let mut lines = BufReader::new(read).lines();

    let mut ctrl = Controller::new(args.compass, args.wind, args.noise);
    let mut rng = rand::thread_rng();

    let mut physics = interval(Duration::from_millis(100));
    let mut status = interval(Duration::from_secs(1));
    let mut uptime = interval(Duration::from_secs(4));
    let mut telemetry = interval(Duration::from_secs(5));
    let mut telemetry_channel: u8 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        debug!(line, "inbound");
                        if let Some(reply) = ctrl.handle_line(&line) {
                            send(&mut write, &reply).await;
                        }
                        if ctrl.take_mode_dirty() {
                            send(&mut write, &ctrl.mode_frame()).await;
                        }
                    }
                    Ok(None) => {
                        info!("peer closed the wire, exiting");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "read error");
                    }
                }
            }
            _ = physics.tick() => {
                ctrl.tick(0.1, &mut rng);
            }
            _ = status.tick() => {
                if ctrl.synced() {
                    send(&mut write, &ctrl.status_frame()).await;
                }
            }
            _ = uptime.tick() => {
                if ctrl.synced() {
                    send(&mut write, &ctrl.uptime_frame()).await;
                }
            }
            _ = telemetry.tick() => {
                if ctrl.synced() {
                    let frame = ctrl.telemetry_frame(telemetry_channel, &mut rng);
                    telemetry_channel = (telemetry_channel + 1) % 16;
                    send(&mut write, &frame).await;
                }
            }
        }
    }
}

async fn send(write: &mut (impl tokio::io::AsyncWrite + Unpin), frame: &str) {
    if let Err(e) = write.write_all(frame.as_bytes()).await {
        warn!(error = %e, "write failed");
    }
    let _ = write.flush().await;
}
