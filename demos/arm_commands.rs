//! Example: Arm and disarm the first site on the account.
//!
//! Usage: `cargo run --example arm_commands -- away|home|off`

use adt_pulse::{ArmMode, PulseClient, PulseConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mode = match std::env::args().nth(1).as_deref() {
        Some("away") => ArmMode::Away,
        Some("home") => ArmMode::Home,
        Some("off") | None => ArmMode::Off,
        Some(other) => anyhow::bail!("unknown mode {other}; expected away, home or off"),
    };

    let config = PulseConfig::builder()
        .username(std::env::var("PULSE_USERNAME")?)
        .password(std::env::var("PULSE_PASSWORD")?)
        .fetch_zones_on_login(false)
        .build();

    let client = PulseClient::connect(config).await?;
    let Some(site) = client.sites().await.into_iter().next() else {
        anyhow::bail!("no site found on the account");
    };

    println!("Site {} is {}; requesting {}", site.name, site.status, mode);
    client.arm(&site.id, mode).await?;

    if let Some(site) = client.site(&site.id).await {
        println!("Site {} is now {}", site.name, site.status);
    }

    client.logout().await?;
    Ok(())
}
