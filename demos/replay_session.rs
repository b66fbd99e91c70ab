use std::{env, path::PathBuf, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{error, info};
use pm5_emulator::{ChannelSink, EmulatorConfig, ReplayPlayer, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = EmulatorConfig::default();
    let path = env::args_os()
        .nth(1)
        .map_or_else(|| config.replay_log_path.clone(), PathBuf::from);

    info!("📼 PM5 Emulator Replay Example");
    info!("Replaying {}", path.display());

    let player = match ReplayPlayer::open(&path).await {
        Ok(player) => player.with_min_delay(config.min_replay_delay()),
        Err(e) => {
            error!("❌ {}", e);
            return Err(e);
        }
    };

    let (sink, mut receiver) = ChannelSink::new();
    let mut replay = player.spawn(Arc::new(sink));

    let printer = tokio::spawn(async move {
        let mut count = 0_usize;
        while let Some(payload) = receiver.recv().await {
            count += 1;
            println!("0x0080 #{count:<5} {}", hex::encode_upper(&payload));
        }
        count
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    while !replay.is_finished() {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("🛑 Stopping replay");
                replay.cancel();
                break;
            }
            () = sleep(Duration::from_millis(100)) => {}
        }
    }

    let stats = replay.join().await?;
    let printed = printer.await.unwrap_or_default();

    println!("\n📊 Replay Summary:");
    println!("  Sent: {}", stats.sent);
    println!("  Skipped lines: {}", stats.skipped);
    println!("  Completed: {}", stats.completed);
    println!("  Received: {printed}");
    Ok(())
}
