// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use adt_pulse::{AlarmStatus, ArmMode, PulseClient, PulseConfig, PulseEvent, Site, Zone};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "adtpulse2mqtt")]
#[command(about = "Bridge between an ADT Pulse account and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    pulse: PulseToml,
    mqtt: MqttToml,
    /// Display names keyed by portal zone id
    #[serde(default)]
    zone_names: HashMap<String, String>,
}

#[derive(Deserialize)]
struct PulseToml {
    username: String,
    password: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default = "default_retries")]
    retries: u32,
    #[serde(default = "default_poll_interval")]
    poll_interval_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default = "default_max_connect_retries")]
    max_connect_retries: u32,
    #[serde(default)]
    relogin_interval_secs: Option<u64>,
}

impl std::fmt::Debug for PulseToml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseToml")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish_non_exhaustive()
    }
}

fn default_retries() -> u32 {
    3
}
fn default_poll_interval() -> u64 {
    30
}
fn default_reconnect_delay() -> u64 {
    10000
}
fn default_max_connect_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_subscribe_topic")]
    subscribe_topic: String,
    #[serde(default = "default_publish_topic")]
    publish_topic: String,
    #[serde(default = "default_snapshot_interval")]
    snapshot_interval_secs: u64,
}

fn default_client_id() -> String {
    "adtpulse-bridge".to_string()
}
fn default_subscribe_topic() -> String {
    "adtpulse/cmd".to_string()
}
fn default_publish_topic() -> String {
    "adtpulse".to_string()
}
fn default_snapshot_interval() -> u64 {
    60
}

fn build_pulse_config(toml: &PulseToml) -> Result<PulseConfig> {
    if toml.username.is_empty() || toml.password.is_empty() {
        anyhow::bail!("pulse.username and pulse.password must be set");
    }
    if toml.poll_interval_secs == 0 {
        anyhow::bail!("pulse.poll_interval_secs must be greater than zero");
    }

    let mut builder = PulseConfig::builder()
        .username(&toml.username)
        .password(&toml.password)
        .retries(toml.retries)
        .reconnect_delay_ms(toml.reconnect_delay_ms)
        .max_connect_retries(toml.max_connect_retries);
    if let Some(host) = &toml.host {
        builder = builder.host(host);
    }
    if let Some(user_agent) = &toml.user_agent {
        builder = builder.user_agent(user_agent);
    }
    if let Some(version) = &toml.api_version {
        builder = builder.api_version(version);
    }
    if let Some(secs) = toml.relogin_interval_secs {
        builder = builder.relogin_interval_secs(secs);
    }
    Ok(builder.build())
}

/// Validate the MQTT section and return the broker (host, port).
fn build_mqtt_target(toml: &MqttToml) -> Result<(String, u16)> {
    if toml.snapshot_interval_secs == 0 {
        anyhow::bail!("mqtt.snapshot_interval_secs must be greater than zero");
    }
    parse_mqtt_url(&toml.url)
}

// ---------------------------------------------------------------------------
// MQTT JSON types
// ---------------------------------------------------------------------------

// Published messages share a flat {now, op, ...} structure

#[derive(Serialize)]
struct MqttSnapshot {
    now: u64,
    op: String,
    state: MqttSnapshotState,
}

#[derive(Serialize)]
struct MqttSnapshotState {
    sites: Vec<MqttSiteState>,
    zones: Vec<MqttZoneState>,
}

#[derive(Serialize)]
struct MqttSiteState {
    id: String,
    name: String,
    status: String,
}

#[derive(Serialize)]
struct MqttZoneState {
    id: String,
    site: String,
    name: String,
    status: Option<String>,
    open: bool,
    tags: Vec<String>,
    #[serde(rename = "lastActivity")]
    last_activity: i64,
}

// {now, op: SITE_STATUS, site, status, previous}
#[derive(Serialize)]
struct MqttSiteEvent {
    now: u64,
    op: String,
    site: String,
    status: String,
    previous: String,
}

// {now, op: ZONE_STATUS, site, zone, status, previous}
#[derive(Serialize)]
struct MqttZoneEvent {
    now: u64,
    op: String,
    site: String,
    zone: String,
    status: Option<String>,
    previous: Option<String>,
}

#[derive(Serialize)]
struct MqttCmdAck {
    now: u64,
    op: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

// Inbound command (subscribed)
#[derive(Deserialize)]
struct MqttCommand {
    op: String,
    #[serde(default)]
    #[allow(dead_code)]
    op_id: Option<String>,
    /// Site id; defaults to the account's first site
    #[serde(default)]
    site: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

fn zone_label(zone: &Zone, overrides: &HashMap<String, String>) -> String {
    overrides
        .get(&zone.id)
        .cloned()
        .unwrap_or_else(|| zone.name.clone())
}

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_site_event(
    client: &AsyncClient,
    topic: &str,
    site_id: &str,
    old_status: AlarmStatus,
    new_status: AlarmStatus,
) {
    let msg = MqttSiteEvent {
        now: now_epoch_ms(),
        op: "SITE_STATUS".to_string(),
        site: site_id.to_string(),
        status: new_status.to_string(),
        previous: old_status.to_string(),
    };
    publish_json(client, topic, &msg, false).await;
}

async fn publish_zone_event(
    client: &AsyncClient,
    topic: &str,
    site_id: &str,
    zone_id: &str,
    old_status: Option<String>,
    new_status: Option<String>,
) {
    let msg = MqttZoneEvent {
        now: now_epoch_ms(),
        op: "ZONE_STATUS".to_string(),
        site: site_id.to_string(),
        zone: zone_id.to_string(),
        status: new_status,
        previous: old_status,
    };
    publish_json(client, topic, &msg, false).await;
}

async fn publish_cmd_ack(
    client: &AsyncClient,
    topic: &str,
    success: bool,
    src: Option<serde_json::Value>,
    data: Option<serde_json::Value>,
) {
    let msg = MqttCmdAck {
        now: now_epoch_ms(),
        op: "CMD_ACK".to_string(),
        success,
        src,
        data,
    };
    publish_json(client, topic, &msg, false).await;
}

fn build_snapshot(sites: &[Site], zone_names: &HashMap<String, String>) -> MqttSnapshot {
    let zones = sites
        .iter()
        .flat_map(|site| {
            site.zones.iter().map(|z| MqttZoneState {
                id: z.id.clone(),
                site: site.id.clone(),
                name: zone_label(z, zone_names),
                status: z.status.clone(),
                open: z.is_open(),
                tags: z.tags.clone(),
                last_activity: z.activity_ts,
            })
        })
        .collect();

    let sites = sites
        .iter()
        .map(|s| MqttSiteState {
            id: s.id.clone(),
            name: s.name.clone(),
            status: s.status.to_string(),
        })
        .collect();

    MqttSnapshot {
        now: now_epoch_ms(),
        op: "SNAPSHOT".to_string(),
        state: MqttSnapshotState { sites, zones },
    }
}

async fn publish_snapshot(
    client: &AsyncClient,
    topic: &str,
    pulse: &PulseClient,
    zone_names: &HashMap<String, String>,
) {
    let snapshot = build_snapshot(&pulse.sites().await, zone_names);
    publish_json(client, topic, &snapshot, true).await;
}

// ---------------------------------------------------------------------------
// Client event → MQTT
// ---------------------------------------------------------------------------

async fn handle_pulse_event(event: PulseEvent, client: &AsyncClient, topic: &str) {
    match event {
        PulseEvent::AlarmStatusChanged {
            site_id,
            old_status,
            new_status,
        } => {
            info!("Site {site_id} alarm {old_status} -> {new_status}");
            publish_site_event(client, topic, &site_id, old_status, new_status).await;
        }
        PulseEvent::ZoneStatusChanged {
            site_id,
            zone_id,
            old_status,
            new_status,
        } => {
            info!("Zone {zone_id} status {old_status:?} -> {new_status:?}");
            publish_zone_event(client, topic, &site_id, &zone_id, old_status, new_status).await;
        }
        PulseEvent::Authenticated => {
            info!("ADT Pulse session authenticated");
        }
        PulseEvent::LoggedOut => {
            warn!("ADT Pulse session logged out");
        }
        PulseEvent::UpdatesAvailable { token } => {
            debug!("Portal reports updates (token {token})");
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// MQTT command handler
// ---------------------------------------------------------------------------

/// Run a client command future and log the result. Returns `true` on success.
async fn exec_pulse_cmd<E: std::fmt::Display>(
    op: &str,
    label: &str,
    fut: impl std::future::Future<Output = std::result::Result<(), E>>,
) -> bool {
    match fut.await {
        Ok(()) => {
            info!("{op} {label}: success");
            true
        }
        Err(e) => {
            error!("{op} {label} failed: {e}");
            false
        }
    }
}

async fn resolve_site(pulse: &PulseClient, requested: Option<String>) -> Option<String> {
    match requested {
        Some(id) => Some(id),
        None => pulse.sites().await.first().map(|s| s.id.clone()),
    }
}

async fn handle_command(
    payload_str: &str,
    cmd: MqttCommand,
    client: &AsyncClient,
    topic: &str,
    pulse: &PulseClient,
    zone_names: &HashMap<String, String>,
) {
    // Raw payload echoed back as the CMD_ACK src field
    let src_json = serde_json::from_str::<serde_json::Value>(payload_str).ok();

    let mode = match cmd.op.as_str() {
        "SNAPSHOT" => {
            debug!("Command: SNAPSHOT");
            let snapshot = build_snapshot(&pulse.sites().await, zone_names);
            let snapshot_value = serde_json::to_value(&snapshot).ok();
            publish_json(client, topic, &snapshot, true).await;
            publish_cmd_ack(client, topic, true, src_json, snapshot_value).await;
            return;
        }
        "PING" => {
            info!("Command: PING");
            publish_cmd_ack(client, topic, true, src_json, None).await;
            return;
        }
        "REFRESH" => {
            info!("Command: REFRESH");
            let success = exec_pulse_cmd("REFRESH", "account", pulse.refresh()).await;
            if success {
                publish_snapshot(client, topic, pulse, zone_names).await;
            }
            publish_cmd_ack(client, topic, success, src_json, None).await;
            return;
        }
        "ARM_AWAY" => ArmMode::Away,
        "ARM_HOME" => ArmMode::Home,
        "DISARM" => ArmMode::Off,
        other => {
            warn!("Unknown command: {other}");
            publish_cmd_ack(client, topic, false, src_json, None).await;
            return;
        }
    };

    let Some(site_id) = resolve_site(pulse, cmd.site).await else {
        warn!("{}: no site available", cmd.op);
        publish_cmd_ack(client, topic, false, src_json, None).await;
        return;
    };
    info!("Command: {} site {site_id}", cmd.op);
    let label = format!("site {site_id}");
    let success = exec_pulse_cmd(&cmd.op, &label, pulse.arm(&site_id, mode)).await;
    publish_cmd_ack(client, topic, success, src_json, None).await;
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=adt_pulse=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let config_text =
        std::fs::read_to_string(&cli.config).context("Failed to read config file")?;
    let config: Config = toml::from_str(&config_text).context("Failed to parse config file")?;

    let mut pulse_config = build_pulse_config(&config.pulse)?;
    let mut poll_interval_secs = config.pulse.poll_interval_secs;
    let mut mqtt_client_id = config.mqtt.client_id.clone();
    let mut publish_topic = config.mqtt.publish_topic.clone();
    let mut subscribe_topic = config.mqtt.subscribe_topic.clone();
    let mut snapshot_interval_secs = config.mqtt.snapshot_interval_secs;
    let mut zone_names = Arc::new(config.zone_names);
    let (mut mqtt_host, mut mqtt_port) = build_mqtt_target(&config.mqtt)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        info!(
            "Logging in to ADT Pulse at {} as {}",
            pulse_config.host, pulse_config.username
        );
        let pulse = Arc::new(PulseClient::connect(pulse_config.clone()).await?);
        info!(
            "Logged in; {} site(s), portal version {}",
            pulse.sites().await.len(),
            pulse.version().await?
        );

        let mut mqtt_opts = MqttOptions::new(&mqtt_client_id, &mqtt_host, mqtt_port);
        mqtt_opts.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

        client
            .subscribe(&subscribe_topic, QoS::AtLeastOnce)
            .await
            .context("Failed to subscribe to MQTT topic")?;
        info!("MQTT: subscribed to {subscribe_topic}");

        publish_snapshot(&client, &publish_topic, &pulse, &zone_names).await;

        // Task 1: client event listener
        let client_events = client.clone();
        let topic_events = publish_topic.clone();
        let mut event_rx = pulse.subscribe();
        let event_handle = tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => handle_pulse_event(event, &client_events, &topic_events).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged, missed {n} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
        });

        // Task 2: MQTT event loop (receives messages, handles commands)
        let pulse_cmds = Arc::clone(&pulse);
        let client_cmds = client.clone();
        let topic_cmds = publish_topic.clone();
        let zn_cmds = Arc::clone(&zone_names);
        let sub_topic = subscribe_topic.clone();
        let mqtt_handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // rumqttc does not resubscribe after a broker reconnect
                        info!("MQTT: connected, subscribing to {sub_topic}");
                        if let Err(e) = client_cmds.subscribe(&sub_topic, QoS::AtLeastOnce).await {
                            error!("Failed to subscribe to {sub_topic}: {e}");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        if msg.topic == sub_topic {
                            let payload = String::from_utf8_lossy(&msg.payload);
                            match serde_json::from_str::<MqttCommand>(&payload) {
                                Ok(cmd) => {
                                    if cmd.op == "SNAPSHOT" {
                                        debug!("MQTT command received: {payload}");
                                    } else {
                                        info!("MQTT command received: {payload}");
                                    }
                                    handle_command(
                                        &payload,
                                        cmd,
                                        &client_cmds,
                                        &topic_cmds,
                                        &pulse_cmds,
                                        &zn_cmds,
                                    )
                                    .await;
                                }
                                Err(e) => {
                                    warn!("Failed to parse MQTT command: {e}");
                                }
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        // Task 3: sync-token poll; refreshes and republishes when the portal has updates
        let pulse_poll = Arc::clone(&pulse);
        let client_poll = client.clone();
        let topic_poll = publish_topic.clone();
        let zn_poll = Arc::clone(&zone_names);
        let poll_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(poll_interval_secs));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match pulse_poll.updates_exist().await {
                    Ok(true) => {
                        if let Err(e) = pulse_poll.refresh().await {
                            warn!("Refresh after sync change failed: {e}");
                            continue;
                        }
                        publish_snapshot(&client_poll, &topic_poll, &pulse_poll, &zn_poll).await;
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Sync check failed: {e}"),
                }
            }
        });

        // Task 4: periodic retained snapshot from the cache
        let pulse_snap = Arc::clone(&pulse);
        let client_snap = client.clone();
        let topic_snap = publish_topic.clone();
        let zn_snap = Arc::clone(&zone_names);
        let snap_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(snapshot_interval_secs));
            // Initial snapshot already published
            ticker.tick().await;
            loop {
                ticker.tick().await;
                publish_snapshot(&client_snap, &topic_snap, &pulse_snap, &zn_snap).await;
            }
        });

        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
        };

        poll_handle.abort();
        snap_handle.abort();
        mqtt_handle.abort();

        if let Err(e) = pulse.logout().await {
            warn!("Error logging out of ADT Pulse: {e}");
        }
        event_handle.abort();

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match std::fs::read_to_string(&cli.config)
            .context("Failed to read config file")
            .and_then(|text| toml::from_str::<Config>(&text).context("Failed to parse config file"))
        {
            Ok(new_config) => match build_pulse_config(&new_config.pulse) {
                Ok(new_pulse_config) => match build_mqtt_target(&new_config.mqtt) {
                    Ok((new_host, new_port)) => {
                        pulse_config = new_pulse_config;
                        poll_interval_secs = new_config.pulse.poll_interval_secs;
                        mqtt_host = new_host;
                        mqtt_port = new_port;
                        mqtt_client_id = new_config.mqtt.client_id;
                        publish_topic = new_config.mqtt.publish_topic;
                        subscribe_topic = new_config.mqtt.subscribe_topic;
                        snapshot_interval_secs = new_config.mqtt.snapshot_interval_secs;
                        zone_names = Arc::new(new_config.zone_names);
                        info!("Config reloaded successfully");
                    }
                    Err(e) => warn!("Invalid MQTT config in new config, keeping previous: {e}"),
                },
                Err(e) => warn!("Invalid pulse config in new config, keeping previous: {e}"),
            },
            Err(e) => warn!("Failed to reload config, keeping previous: {e}"),
        }

        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);
    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;
    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;
    Ok((host.to_string(), port))
}
