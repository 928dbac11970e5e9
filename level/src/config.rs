//! Level configuration supplied at level start.
//!
//! Durations are written in seconds so the TOML stays readable; they are
//! validated and converted once, when the per-system configurations are built.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use horde_survival_core::{ActorRole, PrototypeId};
use horde_survival_system_auto_aim::{AimConfig, ShooterPreset};
use horde_survival_system_loot::{LootConfig, MAX_COINS_PER_DROP};
use horde_survival_system_progression::ProgressionConfig;
use horde_survival_system_spawn_placement::PlacementConfig;
use horde_survival_system_wave_scheduler::{ConfigError, WaveConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Identifier the level assigns to the minion prototype.
pub const MINION: PrototypeId = PrototypeId::new(1);
/// Identifier the level assigns to the boss prototype.
pub const BOSS: PrototypeId = PrototypeId::new(2);
/// Identifier the level assigns to the coin prototype.
pub const COIN: PrototypeId = PrototypeId::new(3);
/// Identifier the level assigns to the bullet prototype.
pub const BULLET: PrototypeId = PrototypeId::new(4);

const WAVE_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;
const BOSS_STREAM: u64 = 0xbf58_476d_1ce4_e5b9;
const LOOT_STREAM: u64 = 0x94d0_49bb_1331_11eb;

/// Largest accepted `loot.boss_coin_multiplier`.
pub const MAX_BOSS_COIN_MULTIPLIER: f32 = 100.0;

/// Errors raised while loading or validating a level configuration.
#[derive(Debug, Error)]
pub enum LevelConfigError {
    /// The configuration file could not be read.
    #[error("failed to read level config {path}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The configuration is not valid TOML for a level.
    #[error("failed to parse level config")]
    Parse(#[from] toml::de::Error),
    /// A duration field is negative, not finite or too large.
    #[error("`{field}` must be a finite, non-negative number of seconds (got {value})")]
    InvalidSeconds {
        /// Name of the offending field.
        field: &'static str,
        /// Value found in the configuration.
        value: f32,
    },
    /// A distance or factor field is negative or not finite.
    #[error("`{field}` must be finite and non-negative (got {value})")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Value found in the configuration.
        value: f32,
    },
    /// A count or factor exceeds its upper bound.
    #[error("`{field}` must not exceed {max} (got {value})")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Value found in the configuration.
        value: f32,
        /// Largest accepted value.
        max: f32,
    },
}

/// Which system spawns bosses in a level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BossSource {
    /// The kill tracker spawns a boss whenever the kill counter crosses its threshold.
    #[default]
    KillTracker,
    /// The wave scheduler spawns a boss after enough minion deaths.
    Waves,
}

/// Weapon the player starts the level with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Unarmed.
    None,
    /// Baseline pistol.
    #[default]
    Pistol,
    /// Submachine gun.
    Smg,
    /// Rifle derived from the pistol.
    Ak47,
}

impl WeaponKind {
    /// Shooter preset of the weapon firing `bullet`; `None` when unarmed.
    #[must_use]
    pub fn preset(self, bullet: PrototypeId) -> Option<ShooterPreset> {
        let pistol = ShooterPreset::pistol(bullet);
        match self {
            Self::None => None,
            Self::Pistol => Some(pistol),
            Self::Smg => Some(ShooterPreset::smg(bullet)),
            Self::Ak47 => Some(ShooterPreset::ak47(bullet, &pistol)),
        }
    }
}

/// Names and prewarm sizes of the prototypes a level uses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrototypeSection {
    /// Minion prototype name; `None` halts the wave scheduler.
    pub minion: Option<String>,
    /// Boss prototype name.
    pub boss: Option<String>,
    /// Coin prototype name.
    pub coin: Option<String>,
    /// Bullet prototype name.
    pub bullet: Option<String>,
    /// Minions constructed ahead of the first wave.
    pub prewarm_minions: u32,
    /// Coins constructed ahead of the first drop.
    pub prewarm_coins: u32,
    /// Bullets constructed ahead of the first shot.
    pub prewarm_bullets: u32,
}

impl Default for PrototypeSection {
    fn default() -> Self {
        Self {
            minion: Some("zombie".to_owned()),
            boss: Some("boss".to_owned()),
            coin: Some("coin".to_owned()),
            bullet: Some("bullet".to_owned()),
            prewarm_minions: 32,
            prewarm_coins: 32,
            prewarm_bullets: 16,
        }
    }
}

impl PrototypeSection {
    /// Prototypes to register, with their identifiers and roles.
    #[must_use]
    pub fn entries(&self) -> Vec<(PrototypeId, &str, ActorRole, u32)> {
        [
            (MINION, &self.minion, ActorRole::Minion, self.prewarm_minions),
            (BOSS, &self.boss, ActorRole::Boss, 0),
            (COIN, &self.coin, ActorRole::Pickup, self.prewarm_coins),
            (BULLET, &self.bullet, ActorRole::Projectile, self.prewarm_bullets),
        ]
        .into_iter()
        .filter_map(|(id, name, role, prewarm)| {
            name.as_deref().map(|name| (id, name, role, prewarm))
        })
        .collect()
    }
}

/// Wave scheduler tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveSection {
    /// Seconds before the first wave.
    pub initial_silence_secs: f32,
    /// Seconds between two waves.
    pub time_between_waves_secs: f32,
    /// Size of the first wave.
    pub start_count: u32,
    /// Growth of the wave size per wave.
    pub add_per_wave: u32,
    /// Seconds between spawns inside a wave.
    pub spawn_interval_secs: f32,
    /// Maximum number of wave actors alive at once.
    pub max_alive_cap: u32,
    /// Minion deaths per wave boss.
    pub boss_every_minion_kills: u32,
    /// Lets wave bosses exceed the alive cap.
    pub ignore_alive_cap_for_boss: bool,
}

impl Default for WaveSection {
    fn default() -> Self {
        Self {
            initial_silence_secs: 0.0,
            time_between_waves_secs: 3.0,
            start_count: 4,
            add_per_wave: 2,
            spawn_interval_secs: 0.2,
            max_alive_cap: 60,
            boss_every_minion_kills: 50,
            ignore_alive_cap_for_boss: true,
        }
    }
}

/// Boss spawning rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossSection {
    /// System responsible for spawning bosses.
    pub source: BossSource,
    /// Radius of the fallback circle a triggered boss spawns on.
    pub spawn_radius: f32,
    /// Distance beyond the screen edge a triggered boss spawns at.
    pub side_margin: f32,
}

impl Default for BossSection {
    fn default() -> Self {
        Self {
            source: BossSource::default(),
            spawn_radius: 12.0,
            side_margin: 2.0,
        }
    }
}

/// Kill tracker tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionSection {
    /// Kills per boss for levels missing from the table.
    pub default_boss_threshold: u32,
    /// Kills per boss keyed by level name.
    pub level_thresholds: BTreeMap<String, u32>,
    /// Seconds inside which a second victim-less kill is ignored.
    pub duplicate_block_window_secs: f32,
}

impl Default for ProgressionSection {
    fn default() -> Self {
        let defaults = ProgressionConfig::default();
        Self {
            default_boss_threshold: defaults.default_boss_threshold,
            level_thresholds: defaults.level_thresholds,
            duplicate_block_window_secs: defaults.duplicate_block_window.as_secs_f32(),
        }
    }
}

/// Coin drop tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootSection {
    /// Fewest coins a minion drops.
    pub coin_min: u32,
    /// Most coins a minion drops.
    pub coin_max: u32,
    /// Factor applied to the coin count of a boss.
    pub boss_coin_multiplier: f32,
    /// Seconds a coin stays in the world; zero keeps coins until collected.
    pub coin_lifetime_secs: f32,
    /// Value credited per collected coin.
    pub coin_value: u32,
    /// Distance from the player inside which coins are pulled in.
    pub magnet_radius: f32,
    /// Speed at which pulled coins travel, in units per second.
    pub magnet_speed: f32,
    /// Distance from the player at which a coin is collected.
    pub pickup_radius: f32,
}

impl Default for LootSection {
    fn default() -> Self {
        Self {
            coin_min: 1,
            coin_max: 2,
            boss_coin_multiplier: 4.0,
            coin_lifetime_secs: 7.0,
            coin_value: 1,
            magnet_radius: 4.0,
            magnet_speed: 8.0,
            pickup_radius: 0.5,
        }
    }
}

/// Player weapon tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponSection {
    /// Weapon equipped at level start.
    pub preset: WeaponKind,
    /// Ignores targets outside the padded camera view.
    pub only_if_on_screen: bool,
    /// Viewport fraction a target may lie beyond the screen edge.
    pub screen_edge_padding: f32,
    /// Seconds a bullet stays in the world.
    pub bullet_lifetime_secs: f32,
}

impl Default for WeaponSection {
    fn default() -> Self {
        Self {
            preset: WeaponKind::default(),
            only_if_on_screen: true,
            screen_edge_padding: 0.05,
            bullet_lifetime_secs: 3.0,
        }
    }
}

/// Orthographic camera following the player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    /// Whether a camera is available; spawns use the fallback circle otherwise.
    pub enabled: bool,
    /// Half height of the view in world units.
    pub orthographic_size: f32,
    /// Width to height ratio of the view.
    pub aspect: f32,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            enabled: true,
            orthographic_size: 6.0,
            aspect: 16.0 / 9.0,
        }
    }
}

/// Complete configuration of a level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Level name, used to pick the boss threshold.
    pub name: String,
    /// Seed every random stream of the level derives from.
    pub seed: u64,
    /// Prototypes the level registers.
    pub prototypes: PrototypeSection,
    /// Wave scheduler tuning.
    pub waves: WaveSection,
    /// Edges and margins used by wave spawns.
    pub placement: PlacementConfig,
    /// Boss spawning rules.
    pub boss: BossSection,
    /// Kill tracker tuning.
    pub progression: ProgressionSection,
    /// Coin drop tuning.
    pub loot: LootSection,
    /// Player weapon tuning.
    pub weapon: WeaponSection,
    /// Camera following the player.
    pub camera: CameraSection,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            name: "Arena".to_owned(),
            seed: 0,
            prototypes: PrototypeSection::default(),
            waves: WaveSection::default(),
            placement: PlacementConfig::default(),
            boss: BossSection::default(),
            progression: ProgressionSection::default(),
            loot: LootSection::default(),
            weapon: WeaponSection::default(),
            camera: CameraSection::default(),
        }
    }
}

impl LevelConfig {
    /// Built-in configuration of the named level.
    #[must_use]
    pub fn for_level(name: &str) -> Self {
        let mut config = Self {
            name: name.to_owned(),
            ..Self::default()
        };

        if name == "Level1" {
            config.waves.initial_silence_secs = 3.0;
        }
        if let Some(threshold) = config.progression.level_thresholds.get(name) {
            config.waves.boss_every_minion_kills = *threshold;
        }
        config
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, LevelConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| LevelConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks every numeric field the level cannot run without.
    ///
    /// Wave timings are not checked here: a bad timing halts the wave
    /// scheduler with a diagnostic instead of failing the level.
    pub fn validate(&self) -> Result<(), LevelConfigError> {
        let _ = self.progression_config()?;
        let _ = self.loot_config()?;
        let _ = self.aim_config()?;

        for (field, value) in [
            ("placement.side_margin", self.placement.side_margin),
            ("placement.edge_padding", self.placement.edge_padding),
            ("placement.circle_radius", self.placement.circle_radius),
            ("boss.spawn_radius", self.boss.spawn_radius),
            ("boss.side_margin", self.boss.side_margin),
            ("camera.orthographic_size", self.camera.orthographic_size),
            ("camera.aspect", self.camera.aspect),
        ] {
            let _ = non_negative(field, value)?;
        }
        Ok(())
    }

    /// Wave scheduler configuration of the level.
    pub fn wave_config(&self) -> Result<WaveConfig, ConfigError> {
        let waves = &self.waves;
        let timing = |field: &'static str, value: f32| {
            duration(value).ok_or_else(|| {
                warn!(field, value, "invalid wave timing");
                ConfigError::InvalidTiming { field }
            })
        };
        Ok(WaveConfig {
            minion: self.prototypes.minion.as_ref().map(|_| MINION),
            boss: self.boss_for(BossSource::Waves),
            boss_every_minion_kills: waves.boss_every_minion_kills,
            ignore_alive_cap_for_boss: waves.ignore_alive_cap_for_boss,
            initial_silence: timing("waves.initial_silence_secs", waves.initial_silence_secs)?,
            time_between_waves: timing(
                "waves.time_between_waves_secs",
                waves.time_between_waves_secs,
            )?,
            start_count: waves.start_count,
            add_per_wave: waves.add_per_wave,
            spawn_interval: timing("waves.spawn_interval_secs", waves.spawn_interval_secs)?,
            max_alive_cap: waves.max_alive_cap,
            placement: self.placement,
            rng_seed: self.seed ^ WAVE_STREAM,
            ..WaveConfig::default()
        })
    }

    /// Kill tracker configuration of the level.
    pub fn progression_config(&self) -> Result<ProgressionConfig, LevelConfigError> {
        let progression = &self.progression;
        Ok(ProgressionConfig {
            default_boss_threshold: progression.default_boss_threshold,
            level_thresholds: progression.level_thresholds.clone(),
            duplicate_block_window: seconds(
                "progression.duplicate_block_window_secs",
                progression.duplicate_block_window_secs,
            )?,
            boss: self.boss_for(BossSource::KillTracker),
            placement: PlacementConfig {
                side_margin: non_negative("boss.side_margin", self.boss.side_margin)?,
                edge_padding: 0.0,
                circle_radius: non_negative("boss.spawn_radius", self.boss.spawn_radius)?,
                ..PlacementConfig::default()
            },
            rng_seed: self.seed ^ BOSS_STREAM,
        })
    }

    /// Loot configuration of the level.
    pub fn loot_config(&self) -> Result<LootConfig, LevelConfigError> {
        let loot = &self.loot;
        let max_coins = MAX_COINS_PER_DROP as f32;
        for (field, value) in [("loot.coin_min", loot.coin_min), ("loot.coin_max", loot.coin_max)] {
            let _ = at_most(field, value as f32, max_coins)?;
        }
        let boss_coin_multiplier = non_negative(
            "loot.boss_coin_multiplier",
            loot.boss_coin_multiplier,
        )?;
        Ok(LootConfig {
            coin: self.prototypes.coin.as_ref().map(|_| COIN),
            coin_min: loot.coin_min,
            coin_max: loot.coin_max,
            boss_coin_multiplier: at_most(
                "loot.boss_coin_multiplier",
                boss_coin_multiplier,
                MAX_BOSS_COIN_MULTIPLIER,
            )?,
            coin_lifetime: seconds("loot.coin_lifetime_secs", loot.coin_lifetime_secs)?,
            coin_value: loot.coin_value,
            magnet_radius: non_negative("loot.magnet_radius", loot.magnet_radius)?,
            magnet_speed: non_negative("loot.magnet_speed", loot.magnet_speed)?,
            pickup_radius: non_negative("loot.pickup_radius", loot.pickup_radius)?,
            rng_seed: self.seed ^ LOOT_STREAM,
        })
    }

    /// Targeting configuration of the player's shooter.
    pub fn aim_config(&self) -> Result<AimConfig, LevelConfigError> {
        let weapon = &self.weapon;
        Ok(AimConfig {
            only_if_on_screen: weapon.only_if_on_screen,
            screen_edge_padding: non_negative(
                "weapon.screen_edge_padding",
                weapon.screen_edge_padding,
            )?,
            bullet_lifetime: seconds("weapon.bullet_lifetime_secs", weapon.bullet_lifetime_secs)?,
        })
    }

    /// Weapon preset equipped at level start, if any.
    #[must_use]
    pub fn shooter_preset(&self) -> Option<ShooterPreset> {
        self.bullet().and_then(|bullet| self.weapon.preset.preset(bullet))
    }

    /// Bullet prototype, when the level registers one.
    #[must_use]
    pub fn bullet(&self) -> Option<PrototypeId> {
        self.prototypes.bullet.as_ref().map(|_| BULLET)
    }

    fn boss_for(&self, source: BossSource) -> Option<PrototypeId> {
        if self.boss.source != source {
            return None;
        }
        self.prototypes.boss.as_ref().map(|_| BOSS)
    }
}

/// Converts seconds to a duration rounded to the nearest microsecond.
fn duration(value: f32) -> Option<Duration> {
    let micros = (f64::from(value) * 1_000_000.0).round();
    if !micros.is_finite() || micros < 0.0 || micros > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_micros(micros as u64))
}

fn seconds(field: &'static str, value: f32) -> Result<Duration, LevelConfigError> {
    duration(value).ok_or(LevelConfigError::InvalidSeconds { field, value })
}

fn non_negative(field: &'static str, value: f32) -> Result<f32, LevelConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(LevelConfigError::InvalidValue { field, value })
    }
}

fn at_most(field: &'static str, value: f32, max: f32) -> Result<f32, LevelConfigError> {
    if value <= max {
        Ok(value)
    } else {
        Err(LevelConfigError::OutOfRange { field, value, max })
    }
}
