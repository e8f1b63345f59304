//! Example: Log in to ADT Pulse and print the site and its zones.

use adt_pulse::{PulseClient, PulseConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = PulseConfig::builder()
        .username(std::env::var("PULSE_USERNAME")?)
        .password(std::env::var("PULSE_PASSWORD")?)
        .build();

    println!("Logging in...");
    let client = PulseClient::connect(config).await?;
    println!("Portal version {}", client.version().await?);

    for site in client.sites().await {
        println!("\n--- Site {} ({}) ---", site.name, site.id);
        println!("  Alarm: {}", site.status);

        println!("\n--- Zones ({}) ---", site.zones.len());
        for zone in &site.zones {
            println!(
                "  {:20} {:12} tags={} last={}",
                zone.name,
                zone.status.as_deref().unwrap_or("-"),
                zone.tags.join(","),
                zone
                    .last_activity()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string()),
            );
        }
    }

    client.logout().await?;
    println!("\nLogged out.");

    Ok(())
}
