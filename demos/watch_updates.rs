//! Example: Poll the sync endpoint and print site and zone changes.

use adt_pulse::{PulseClient, PulseConfig, PulseEvent};
use tokio::time::{interval, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = PulseConfig::builder()
        .username(std::env::var("PULSE_USERNAME")?)
        .password(std::env::var("PULSE_PASSWORD")?)
        .build();

    let client = PulseClient::connect(config).await?;
    let mut events = client.subscribe();
    let mut ticker = interval(Duration::from_secs(10));

    println!("Watching for updates (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match client.updates_exist().await {
                    Ok(true) => {
                        if let Err(e) = client.refresh().await {
                            eprintln!("Refresh failed: {}", e);
                        }
                    }
                    Ok(false) => {}
                    Err(e) => eprintln!("Sync check failed: {}", e),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(PulseEvent::AlarmStatusChanged { site_id, old_status, new_status }) => {
                        println!("Site {}: {} -> {}", site_id, old_status, new_status);
                    }
                    Ok(PulseEvent::ZoneStatusChanged { zone_id, old_status, new_status, .. }) => {
                        println!("Zone {}: {:?} -> {:?}", zone_id, old_status, new_status);
                    }
                    Ok(PulseEvent::UpdatesAvailable { token }) => {
                        println!("Updates available (token {})", token);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        eprintln!("Event error: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    client.logout().await?;
    Ok(())
}
