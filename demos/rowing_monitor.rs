use std::time::Duration;
use tokio::time::{interval, Instant};
use tracing::{error, info, warn};
use pm5_emulator::{CharacteristicId, EmulatorConfig, MemoryGatt, Result, RowingService};

fn read_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0, |value, &byte| (value << 8) | u64::from(byte))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("🚣 PM5 Emulator Rowing Monitor Example");

    let service = RowingService::new(EmulatorConfig::default());
    let mut gatt = MemoryGatt::new();
    if !service.register(&mut gatt).await {
        warn!("Running without a replay log");
    }

    // Ask for status every 250 ms
    gatt.write(CharacteristicId::StatusRate, &[2])?;
    info!(
        "✅ Status rate: {}",
        gatt.read(CharacteristicId::StatusRate)?[0]
    );

    let mut status = gatt.subscribe(CharacteristicId::GeneralStatus)?;
    let mut extra = gatt.subscribe(CharacteristicId::AdditionalStatus2)?;
    let mut strokes = gatt.subscribe(CharacteristicId::AdditionalStatus1)?;

    info!("🔍 Monitoring for 10 seconds, press Ctrl+C to stop early");

    let mut report = interval(Duration::from_secs(1));
    let start_time = Instant::now();
    let mut notifications = 0_u64;
    let (mut elapsed_cs, mut distance_dm, mut stroke_rate, mut pace_cs) = (0, 0, 0, 0);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => {
                println!(
                    "⏱  {:>4}.{:02} s │ {:>6}.{} m │ {:>2} spm │ {}:{:02}.{} /500m",
                    elapsed_cs / 100,
                    elapsed_cs % 100,
                    distance_dm / 10,
                    distance_dm % 10,
                    stroke_rate,
                    pace_cs / 6000,
                    (pace_cs / 100) % 60,
                    (pace_cs / 10) % 10,
                );
                if start_time.elapsed() >= Duration::from_secs(10) {
                    break;
                }
            }
            Some(frame) = status.recv() => {
                notifications += 1;
                elapsed_cs = read_le(&frame[0..3]);
                distance_dm = read_le(&frame[3..6]);
            }
            Some(frame) = strokes.recv() => {
                notifications += 1;
                stroke_rate = frame[5];
            }
            Some(frame) = extra.recv() => {
                notifications += 1;
                pace_cs = read_le(&frame[8..10]);
            }
            else => {
                error!("❌ All subscriptions ended");
                break;
            }
        }
    }

    service.shutdown().await;

    println!("\n📊 Final Session Summary:");
    println!("  Notifications: {notifications}");
    println!("  Distance: {}.{} m", distance_dm / 10, distance_dm % 10);

    info!("🎉 Monitoring completed!");
    Ok(())
}
