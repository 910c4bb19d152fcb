//! main.rs — helmd entry point
//!
//! Startup order matters: configuration and mission first (fatal when
//! wrong, exit 1), serial devices second (exit 2), then the controller
//! handshake, and only then the long-running tasks. A clean shutdown
//! exits 0.

use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info, warn};

use helmd::config::HelmConfig;
use helmd::gps;
use helmd::mission::{Mission, MissionSupervisor};
use helmd::otto::{self, link::WRITE_QUEUE_DEPTH, OttoHandle};
use helmd::records::{GpsFix, MissionStatus, OttoState};
use helmd::alarm::AlarmReport;
use helmd::store::StateStore;

#[derive(Parser, Debug)]
#[command(name = "helmd", about = "Autonomous sailboat guidance daemon")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "helm.toml")]
    config: String,
    /// Mission file path (overrides the config entry)
    #[arg(long)]
    mission: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helmd=info".into()),
        )
        .init();

    let args = Args::parse();

    let cfg = match HelmConfig::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let mission_path = args.mission.unwrap_or_else(|| cfg.mission_file.clone());
    let mission = match Mission::load(&mission_path) {
        Ok(m) => m,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };
    info!(
        title = %mission.title,
        attractors = mission.attractors.len(),
        repellors = mission.repellors.len(),
        "mission loaded"
    );

    let store = StateStore::new();
    store.setup::<GpsFix>().await;
    store.setup::<OttoState>().await;
    store.setup::<MissionStatus>().await;
    store.setup::<AlarmReport>().await;

    let otto_port = match tokio_serial::new(&cfg.otto.device, cfg.otto.baud).open_native_async() {
        Ok(port) => port,
        Err(e) => {
            error!(device = %cfg.otto.device, "cannot open otto port: {e}");
            process::exit(2);
        }
    };
    let gps_port = match tokio_serial::new(&cfg.gps.device, cfg.gps.baud).open_native_async() {
        Ok(port) => port,
        Err(e) => {
            error!(device = %cfg.gps.device, "cannot open gps port: {e}");
            process::exit(2);
        }
    };

    // Handshake before anything is allowed to talk to the controller.
    let (otto_read, mut otto_write) = tokio::io::split(otto_port);
    let mut otto_read = BufReader::new(otto_read);
    if let Err(e) = otto::synchronize(&mut otto_read, &mut otto_write, cfg.read_timeout()).await {
        error!("{e}");
        process::exit(2);
    }

    let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
    let handle = OttoHandle::new(write_tx);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut reader_task = tokio::spawn(otto::run_reader(
        otto_read,
        store.clone(),
        cfg.read_timeout(),
        shutdown_rx.clone(),
    ));
    let mut writer_task = tokio::spawn(otto::run_writer(
        otto_write,
        write_rx,
        shutdown_rx.clone(),
    ));
    let mut gps_task = tokio::spawn(gps::run_ingest(
        BufReader::new(gps_port),
        store.clone(),
        cfg.read_timeout(),
        shutdown_rx.clone(),
    ));
    let supervisor = MissionSupervisor::new(
        store.clone(),
        Arc::new(mission),
        handle.clone(),
        shutdown_rx.clone(),
        cfg.auto_start,
    );
    let mut supervisor_task = tokio::spawn(supervisor.run());

    // Run until an operator interrupt or a task dies underneath us.
    let failed = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt, shutting down");
            false
        }
        result = &mut reader_task => {
            report("otto reader", result);
            true
        }
        result = &mut writer_task => {
            report("otto writer", result);
            true
        }
        result = &mut gps_task => {
            report("gps ingest", result);
            true
        }
        result = &mut supervisor_task => {
            report("mission supervisor", result);
            true
        }
    };

    let _ = shutdown_tx.send(true);
    for task in [reader_task, writer_task, gps_task, supervisor_task] {
        if !task.is_finished() {
            let _ = task.await;
        }
    }

    if failed {
        process::exit(3);
    }
    info!("clean shutdown");
}

fn report(
    name: &str,
    result: Result<Result<(), helmd::error::HelmError>, tokio::task::JoinError>,
) {
    match result {
        Ok(Ok(())) => warn!(task = name, "task exited"),
        Ok(Err(e)) => error!(task = name, "task failed: {e}"),
        Err(e) => error!(task = name, "task panicked: {e}"),
    }
}
