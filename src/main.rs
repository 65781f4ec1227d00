//! Holdfast server binary.
//!
//! `holdfast-server [config.json]` runs the room server.
//! `holdfast-server demo [seed]` runs an offline bot match twice and
//! verifies the two runs produce identical world digests.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use holdfast::game::input::{FrameInputs, InputDirection};
use holdfast::game::setup::bootstrap_room;
use holdfast::game::step::SimConfig;
use holdfast::net::server::{FrameServer, ServerConfig};
use holdfast::{TICK_RATE, VERSION};

/// Optional JSON configuration file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind_addr: Option<String>,
    max_players: Option<usize>,
    tick_interval_ms: Option<u64>,
    read_timeout_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
    history_limit: Option<usize>,
    ignored_layer_pairs: Option<Vec<(u8, u8)>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Holdfast Lockstep Server v{VERSION}");
    info!("Tick Rate: {TICK_RATE} Hz");

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("demo") => {
            let seed: i64 = args
                .next()
                .map(|s| s.parse())
                .transpose()
                .context("seed must be an integer")?
                .unwrap_or(12345);
            demo_match(seed)
        }
        maybe_path => {
            let config = load_config(maybe_path)?;
            run_server(config)
        }
    }
}

fn load_config(path: Option<&str>) -> Result<ServerConfig> {
    let mut config = ServerConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {path}"))?;
    let file: FileConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config file {path}"))?;

    if let Some(addr) = file.bind_addr {
        config.bind_addr = addr.parse().context("invalid bind_addr")?;
    }
    if let Some(n) = file.max_players {
        config.max_players = n;
    }
    if let Some(ms) = file.tick_interval_ms {
        config.tick_interval = Duration::from_millis(ms);
    }
    if let Some(secs) = file.read_timeout_secs {
        config.read_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.idle_timeout_secs {
        config.idle_timeout = Duration::from_secs(secs);
    }
    if let Some(n) = file.history_limit {
        config.history_limit = n;
    }
    if let Some(pairs) = file.ignored_layer_pairs {
        config.ignored_layer_pairs = pairs;
    }
    Ok(config)
}

fn run_server(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = FrameServer::new(config);
        server.run().await?;
        Ok(())
    })
}

/// Offline determinism check: run the same scripted match twice and
/// compare digests, mirroring what two lockstep clients would compute.
fn demo_match(seed: i64) -> Result<()> {
    const FRAMES: u64 = 600; // 30 seconds at 20 Hz
    let players = [1u32, 2];

    info!("=== Demo Match (seed {seed}) ===");

    let script = bot_script(&players, FRAMES);
    let digest_a = run_once(seed, &players, &script, FRAMES);
    let digest_b = run_once(seed, &players, &script, FRAMES);

    info!("run A digest: {}", hex::encode(digest_a));
    info!("run B digest: {}", hex::encode(digest_b));

    if digest_a == digest_b {
        info!("DETERMINISM VERIFIED: digests match");
        Ok(())
    } else {
        anyhow::bail!("determinism failure: digests differ");
    }
}

fn run_once(
    seed: i64,
    players: &[u32],
    script: &BTreeMap<u64, FrameInputs>,
    frames: u64,
) -> [u8; 32] {
    let mut sim = bootstrap_room(SimConfig::default(), seed, players);
    sim.run_script(script, frames);
    let alive = sim.world.entity_count();
    info!("simulated {frames} frames, {alive} entities alive");
    sim.world.digest()
}

/// Scripted bot inputs: walk in squares, shoot on a cadence.
fn bot_script(players: &[u32], frames: u64) -> BTreeMap<u64, FrameInputs> {
    let mut script = BTreeMap::new();
    for frame in 1..=frames {
        let mut inputs = FrameInputs::new();
        for (i, pid) in players.iter().enumerate() {
            let phase = (frame / 10 + i as u64) % 5;
            let dir = match phase {
                0 => InputDirection::Up,
                1 => InputDirection::Right,
                2 => InputDirection::Fire,
                3 => InputDirection::Down,
                _ => InputDirection::Left,
            };
            inputs.insert(*pid, dir);
        }
        script.insert(frame, inputs);
    }
    script
}
