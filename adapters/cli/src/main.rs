#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a horde survival level headlessly.

use std::{path::PathBuf, time::Duration};

use anyhow::{ensure, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use horde_survival_core::{ActorRole, Command, Event};
use horde_survival_level::{Level, LevelConfig, LevelObserver, WeaponKind};
use horde_survival_world::query;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const MINION_SPEED: f32 = 2.0;
const BOSS_SPEED: f32 = 1.2;
const DEATH_EFFECT: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "horde-survival", version, about = "Runs a horde survival level headlessly")]
struct Cli {
    /// Level configuration file (TOML); overrides --level
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Built-in level preset
    #[arg(long = "level", default_value = "Level1")]
    level: String,

    /// Simulated seconds to run before tearing the level down
    #[arg(long = "duration-secs", default_value_t = 120.0)]
    duration_secs: f32,

    /// Length of one simulation tick in milliseconds
    #[arg(long = "tick-ms", default_value_t = 16)]
    tick_ms: u64,

    /// Overrides the seed of the level configuration
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Swaps the configured weapon once the level has started
    #[arg(long = "weapon", value_enum)]
    weapon: Option<Weapon>,

    /// Prints the run summary as JSON
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,
}

/// Weapons selectable from the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Weapon {
    None,
    Pistol,
    Smg,
    Ak47,
}

impl From<Weapon> for WeaponKind {
    fn from(weapon: Weapon) -> Self {
        match weapon {
            Weapon::None => Self::None,
            Weapon::Pistol => Self::Pistol,
            Weapon::Smg => Self::Smg,
            Weapon::Ak47 => Self::Ak47,
        }
    }
}

/// Outcome of a headless run.
#[derive(Debug, Serialize)]
struct Summary {
    level: String,
    simulated_secs: f32,
    waves_started: u32,
    kills: u32,
    hostiles_alive: usize,
    coins_dropped: u64,
    coins_collected: u32,
    shots_fired: u64,
    complete: bool,
    wave_diagnostic: Option<String>,
}

/// Logs the notifications a UI layer would react to.
struct Announcer;

impl LevelObserver for Announcer {
    fn notify(&mut self, event: &Event) {
        match event {
            Event::KillsChanged { kills } => debug!(kills, "kills changed"),
            Event::CoinsChanged { coins } => debug!(coins, "coins changed"),
            Event::BossTriggered { kills } => info!(kills, "boss incoming"),
            Event::BossSpawned { actor } => info!(?actor, "boss spawned"),
            Event::LevelComplete => info!("level complete"),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("horde-survival v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => LevelConfig::load(path)
            .with_context(|| format!("loading level config {}", path.display()))?,
        None => LevelConfig::for_level(&cli.level),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let duration =
        Duration::try_from_secs_f32(cli.duration_secs).context("invalid --duration-secs")?;
    ensure!(cli.tick_ms > 0, "--tick-ms must be positive");
    let dt = Duration::from_millis(cli.tick_ms);

    let mut level = Level::start(&config).context("starting level")?;
    level.subscribe(Announcer);
    if let Some(weapon) = cli.weapon {
        level.equip(weapon.into());
    }

    let mut elapsed = Duration::ZERO;
    while elapsed < duration && !level.is_complete() {
        let _ = level.step(dt);
        elapsed = elapsed.saturating_add(dt);
        resolve_shots(&mut level);
        advance_hostiles(&mut level, dt);
    }

    let summary = Summary {
        level: level.name().to_owned(),
        simulated_secs: elapsed.as_secs_f32(),
        waves_started: level.waves().state().wave_index,
        kills: level.progression().kills(),
        hostiles_alive: query::hostile_view(level.world()).len(),
        coins_dropped: level.loot().dropped(),
        coins_collected: level.loot().collected(),
        shots_fired: level.shooter().shots(),
        complete: level.is_complete(),
        wave_diagnostic: level.waves().diagnostic().map(|error| error.to_string()),
    };
    let _ = level.tear_down();

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("serialising run summary")?;
        println!("{json}");
    } else {
        println!("level:          {}", summary.level);
        println!("simulated:      {:.1}s", summary.simulated_secs);
        println!("waves started:  {}", summary.waves_started);
        println!("kills:          {}", summary.kills);
        println!("hostiles alive: {}", summary.hostiles_alive);
        println!("coins dropped:  {}", summary.coins_dropped);
        println!("coins collected: {}", summary.coins_collected);
        println!("shots fired:    {}", summary.shots_fired);
        println!("complete:       {}", summary.complete);
        if let Some(diagnostic) = &summary.wave_diagnostic {
            println!("wave scheduler: {diagnostic}");
        }
    }
    Ok(())
}

/// Every shot kills its target; stale targets are ignored by the world.
fn resolve_shots(level: &mut Level) {
    for shot in level.take_shots() {
        let _ = level.apply(Command::KillActor {
            actor: shot.target,
            release_delay: DEATH_EFFECT,
        });
    }
}

/// Walks every hostile towards the player.
fn advance_hostiles(level: &mut Level, dt: Duration) {
    let player = level.player();
    let seconds = dt.as_secs_f32();
    let moves: Vec<Command> = query::live_actors(level.world())
        .filter(|actor| actor.role().is_hostile())
        .map(|actor| {
            let speed = if actor.role() == ActorRole::Boss {
                BOSS_SPEED
            } else {
                MINION_SPEED
            };
            let offset = (player - actor.position()).clamp_length_max(speed * seconds);
            Command::MoveActor {
                actor: actor.handle(),
                position: actor.position() + offset,
            }
        })
        .collect();

    for command in moves {
        let _ = level.apply(command);
    }
}
