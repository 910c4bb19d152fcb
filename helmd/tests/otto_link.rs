//! Otto link integration: handshake, reader, and writer over an
//! in-memory duplex transport standing in for the serial port.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};

use helmd::alarm::{Alarm, AlarmReport};
use helmd::otto::link::{run_reader, run_writer, synchronize, RegisterWrite};
use helmd::otto::Register;
use helmd::records::OttoState;
use helmd::store::StateStore;

#[tokio::test]
async fn handshake_reaches_sync_within_one_iteration() {
    let (core_side, controller_side) = tokio::io::duplex(1024);
    let (core_read, mut core_write) = tokio::io::split(core_side);
    let mut core_read = BufReader::new(core_read);

    // Controller that drops everything until it has seen `@@CQ!`, then
    // acknowledges.
    let controller = tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(controller_side);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim() == "@@CQ!" {
                write.write_all(b"+CQOK\r\n").await.unwrap();
                write.flush().await.unwrap();
                break;
            }
        }
        // Hold the port open so the core never sees EOF mid-test.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let synced = tokio::time::timeout(
        Duration::from_secs(2),
        synchronize(&mut core_read, &mut core_write, Duration::from_secs(1)),
    )
    .await;
    assert!(matches!(synced, Ok(Ok(()))), "handshake did not complete");
    controller.abort();
}

#[tokio::test]
async fn handshake_survives_line_noise_before_the_ack() {
    let (core_side, controller_side) = tokio::io::duplex(1024);
    let (core_read, mut core_write) = tokio::io::split(core_side);
    let mut core_read = BufReader::new(core_read);

    let controller = tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(controller_side);
        let mut lines = BufReader::new(read).lines();
        // Garbage first, then the ack.
        write.write_all(b"\x7f\x7fgarbage\r\n").await.unwrap();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim() == "@@CQ!" {
                write.write_all(b"*booting\r\n+OK\r\n").await.unwrap();
                break;
            }
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let synced = tokio::time::timeout(
        Duration::from_secs(2),
        synchronize(&mut core_read, &mut core_write, Duration::from_secs(1)),
    )
    .await;
    assert!(matches!(synced, Ok(Ok(()))));
    controller.abort();
}

#[tokio::test]
async fn reader_folds_frames_into_otto_state() {
    let (core_side, controller_side) = tokio::io::duplex(1024);
    let (core_read, _core_write) = tokio::io::split(core_side);
    let (_ctrl_read, mut ctrl_write) = tokio::io::split(controller_side);

    let store = StateStore::new();
    let mut updates = store.subscribe::<OttoState>().await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reader = tokio::spawn(run_reader(
        BufReader::new(core_read),
        store.clone(),
        Duration::from_secs(1),
        shutdown_rx,
    ));

    ctrl_write
        .write_all(b"$0005:C040:8033\r\n@00012C\r\n!03\r\n>2ABC\r\n*hello deck\r\n")
        .await
        .unwrap();
    ctrl_write.flush().await.unwrap();

    // One save per frame that touches state: status, uptime, mode,
    // telemetry.
    for _ in 0..4 {
        tokio::time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("reader stalled")
            .unwrap();
    }

    let state = store.load::<OttoState>().await;
    assert_eq!(state.alarm_status, 0x0005);
    assert_eq!(state.actual_awa as u8, 0xC0);
    assert_eq!(state.actual_compass, 0x40);
    assert_eq!(state.actual_rudder, 0x80);
    assert_eq!(state.actual_sail, 0x33);
    assert_eq!(state.otto_timestamp, 300);
    assert_eq!(state.mode, 3);
    assert_eq!(state.telemetry[2], 0xABC);

    shutdown_tx.send(true).unwrap();
    reader.await.unwrap().unwrap();
}

#[tokio::test]
async fn uptime_regression_raises_otto_restart() {
    let (core_side, controller_side) = tokio::io::duplex(1024);
    let (core_read, _core_write) = tokio::io::split(core_side);
    let (_ctrl_read, mut ctrl_write) = tokio::io::split(controller_side);

    let store = StateStore::new();
    let mut updates = store.subscribe::<OttoState>().await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reader = tokio::spawn(run_reader(
        BufReader::new(core_read),
        store.clone(),
        Duration::from_secs(1),
        shutdown_rx,
    ));

    ctrl_write.write_all(b"@000200\r\n@000005\r\n").await.unwrap();
    ctrl_write.flush().await.unwrap();
    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("reader stalled")
            .unwrap();
    }

    assert_eq!(store.load::<OttoState>().await.otto_timestamp, 5);
    let report = store.load::<AlarmReport>().await;
    assert!(report.is_set(Alarm::OttoRestart));

    shutdown_tx.send(true).unwrap();
    reader.await.unwrap().unwrap();
}

#[tokio::test]
async fn malformed_frames_are_dropped_not_fatal() {
    let (core_side, controller_side) = tokio::io::duplex(1024);
    let (core_read, _core_write) = tokio::io::split(core_side);
    let (_ctrl_read, mut ctrl_write) = tokio::io::split(controller_side);

    let store = StateStore::new();
    let mut updates = store.subscribe::<OttoState>().await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reader = tokio::spawn(run_reader(
        BufReader::new(core_read),
        store.clone(),
        Duration::from_secs(1),
        shutdown_rx,
    ));

    // Junk, then a frame that must still land.
    ctrl_write
        .write_all(b"$zz:junk\r\n#nope\r\n!02\r\n")
        .await
        .unwrap();
    ctrl_write.flush().await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), updates.recv())
        .await
        .expect("reader stalled")
        .unwrap();
    assert_eq!(store.load::<OttoState>().await.mode, 2);

    shutdown_tx.send(true).unwrap();
    reader.await.unwrap().unwrap();
}

#[tokio::test]
async fn writer_frames_registers_and_suppresses_repeats() {
    let (core_side, controller_side) = tokio::io::duplex(1024);
    let (core_read_half, core_write) = tokio::io::split(core_side);
    let (mut ctrl_read, _ctrl_write) = tokio::io::split(controller_side);

    let (tx, rx) = mpsc::channel::<RegisterWrite>(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let writer = tokio::spawn(run_writer(core_write, rx, shutdown_rx));

    let send = |register, value| {
        let tx = tx.clone();
        async move {
            tx.send(RegisterWrite { register, value }).await.unwrap();
        }
    };
    send(Register::CompassHeading, 0xE0).await;
    send(Register::CompassHeading, 0xE0).await; // suppressed
    send(Register::Mode, 3).await;
    send(Register::Mode, 3).await; // suppressed
    send(Register::CompassHeading, 0xE1).await;
    drop(send);
    drop(tx);

    writer.await.unwrap().unwrap();
    shutdown_tx.send(true).ok();
    // Release the core's read half so the controller side sees EOF.
    drop(core_read_half);

    let mut wire = Vec::new();
    ctrl_read.read_to_end(&mut wire).await.unwrap();
    let wire = String::from_utf8(wire).unwrap();
    assert_eq!(wire, "R6=E0\r\nR2=03\r\nR6=E1\r\n");
}
