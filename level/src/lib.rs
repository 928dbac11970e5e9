#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Level orchestration wiring the world to every run-progression system.
//!
//! A [`Level`] owns the [`World`] and the pure systems. Each call feeds one
//! command into the world, hands the resulting events to the systems and
//! applies the commands they emit until no further commands are produced.

pub mod config;

use std::time::Duration;

use glam::Vec2;
use horde_survival_core::{
    CameraView, Command, Event, PrototypeDescriptor, PrototypeId, SpawnOrigin,
};
use horde_survival_system_auto_aim::{AutoAim, Shot};
use horde_survival_system_loot::Loot;
use horde_survival_system_progression::ProgressionTracker;
use horde_survival_system_wave_scheduler::WaveScheduler;
use horde_survival_world::{self as world, query, World};
use tracing::{debug, error, info};

pub use config::{LevelConfig, LevelConfigError, WeaponKind};

/// Upper bound on command rounds processed for a single input command.
pub const MAX_PUMP_ROUNDS: usize = 64;

/// Receives every event the level broadcasts, progression events included.
pub trait LevelObserver {
    /// Called once per event in the order the level produced them.
    fn notify(&mut self, event: &Event);
}

/// Running level: world state plus the systems reacting to it.
pub struct Level {
    name: String,
    world: World,
    waves: WaveScheduler,
    progression: ProgressionTracker,
    loot: Loot,
    shooter: AutoAim,
    bullet: Option<PrototypeId>,
    camera: Option<(f32, f32)>,
    player: Vec2,
    observers: Vec<Box<dyn LevelObserver>>,
    shots: Vec<Shot>,
    complete: bool,
}

impl Level {
    /// Validates the configuration, registers prototypes and prewarms their pools.
    pub fn start(config: &LevelConfig) -> Result<Self, LevelConfigError> {
        config.validate()?;

        let mut shooter = AutoAim::new(config.aim_config()?);
        if let Some(preset) = config.shooter_preset() {
            shooter.equip(preset);
        }

        let waves = match config.wave_config() {
            Ok(waves) => WaveScheduler::new(waves),
            Err(error) => WaveScheduler::halted(error),
        };

        let mut level = Self {
            name: config.name.clone(),
            world: World::new(),
            waves,
            progression: ProgressionTracker::new(&config.progression_config()?, &config.name),
            loot: Loot::new(config.loot_config()?),
            shooter,
            bullet: config.bullet(),
            camera: config
                .camera
                .enabled
                .then_some((config.camera.orthographic_size, config.camera.aspect)),
            player: Vec2::ZERO,
            observers: Vec::new(),
            shots: Vec::new(),
            complete: false,
        };

        for (id, name, role, prewarm) in config.prototypes.entries() {
            let descriptor = PrototypeDescriptor::new(id, name, role);
            let _ = level.pump(Command::RegisterPrototype { descriptor });
            if prewarm > 0 {
                let _ = level.pump(Command::PrewarmPool {
                    prototype: id,
                    count: prewarm,
                });
            }
        }
        let _ = level.pump(level.viewport_command());

        info!(
            level = %level.name,
            threshold = level.progression.threshold(),
            "level started"
        );
        Ok(level)
    }

    /// Registers an observer for every subsequent event.
    pub fn subscribe(&mut self, observer: impl LevelObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Advances simulated time by `dt`.
    pub fn step(&mut self, dt: Duration) -> Vec<Event> {
        self.pump(Command::Tick { dt })
    }

    /// Submits an external command, such as a kill reported by combat.
    pub fn apply(&mut self, command: Command) -> Vec<Event> {
        self.pump(command)
    }

    /// Moves the player; the camera and fallback spawn circle follow.
    pub fn move_player(&mut self, position: Vec2) -> Vec<Event> {
        self.player = position;
        self.pump(self.viewport_command())
    }

    /// Ends the level, cancelling timers and destroying every instance.
    pub fn tear_down(&mut self) -> Vec<Event> {
        info!(level = %self.name, kills = self.progression.kills(), "tearing down level");
        self.pump(Command::TearDown)
    }

    /// Drains the shots fired since the previous call.
    pub fn take_shots(&mut self) -> Vec<Shot> {
        std::mem::take(&mut self.shots)
    }

    /// Name of the level.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only access to the world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Wave scheduler of the level.
    #[must_use]
    pub const fn waves(&self) -> &WaveScheduler {
        &self.waves
    }

    /// Kill tracker of the level.
    #[must_use]
    pub const fn progression(&self) -> &ProgressionTracker {
        &self.progression
    }

    /// Loot system of the level.
    #[must_use]
    pub const fn loot(&self) -> &Loot {
        &self.loot
    }

    /// Player's shooter.
    #[must_use]
    pub const fn shooter(&self) -> &AutoAim {
        &self.shooter
    }

    /// Swaps the player's weapon; unarmed when no bullet prototype is registered.
    pub fn equip(&mut self, weapon: WeaponKind) {
        match self.bullet.and_then(|bullet| weapon.preset(bullet)) {
            Some(preset) => self.shooter.equip(preset),
            None => {
                debug!(?weapon, "player unarmed");
                self.shooter.unequip();
            }
        }
    }

    /// Current player position.
    #[must_use]
    pub const fn player(&self) -> Vec2 {
        self.player
    }

    /// Reports whether the boss of the level has been defeated.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    fn viewport_command(&self) -> Command {
        Command::SetViewport {
            camera: self
                .camera
                .map(|(size, aspect)| CameraView::from_orthographic(self.player, size, aspect)),
            focus: self.player,
        }
    }

    fn pump(&mut self, command: Command) -> Vec<Event> {
        let mut log = Vec::new();
        let mut pending = vec![command];

        for _ in 0..MAX_PUMP_ROUNDS {
            if pending.is_empty() {
                return log;
            }

            let mut events = Vec::new();
            for command in pending.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }
            if events.is_empty() {
                continue;
            }

            let frame = query::spawn_frame(&self.world);
            let mut progress = Vec::new();
            self.waves.handle(&events, &frame, &mut pending);
            self.progression
                .handle(&events, &frame, &mut progress, &mut pending);
            self.loot
                .handle(&events, self.player, &mut progress, &mut pending);
            if let Some(shot) = self.shooter.handle(
                &events,
                self.player,
                frame.camera,
                &query::hostile_view(&self.world),
                &mut pending,
            ) {
                self.shots.push(shot);
            }

            events.append(&mut progress);
            self.broadcast(&events);
            log.append(&mut events);
        }

        self.drop_unsettled(&pending);
        log
    }

    fn drop_unsettled(&mut self, pending: &[Command]) {
        if pending.is_empty() {
            return;
        }

        let wave_spawns = pending
            .iter()
            .filter(|command| {
                matches!(
                    command,
                    Command::SpawnActor {
                        origin: SpawnOrigin::Wave,
                        ..
                    }
                )
            })
            .count();
        error!(
            dropped = pending.len(),
            wave_spawns, "command pump did not settle, dropping remaining commands"
        );
        self.waves
            .forget_spawns(u32::try_from(wave_spawns).unwrap_or(u32::MAX));
    }

    fn broadcast(&mut self, events: &[Event]) {
        for event in events {
            if matches!(event, Event::LevelComplete) {
                debug!(level = %self.name, "level complete");
                self.complete = true;
            }
            for observer in &mut self.observers {
                observer.notify(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_survival_core::ActorRole;
    use horde_survival_system_wave_scheduler::ConfigError;

    #[test]
    fn start_registers_and_prewarms_configured_prototypes() {
        let level = Level::start(&LevelConfig::default()).expect("valid config");

        assert!(query::prototype(level.world(), config::MINION).is_some());
        assert!(query::prototype(level.world(), config::BOSS).is_some());
        assert_eq!(query::pool_stats(level.world(), config::MINION).free, 32);
        assert_eq!(query::pool_stats(level.world(), config::COIN).free, 32);
        assert_eq!(query::pool_stats(level.world(), config::BULLET).free, 16);
        assert_eq!(query::pool_stats(level.world(), config::BOSS).free, 0);
        assert_eq!(query::live_count(level.world()), 0);
    }

    #[test]
    fn camera_follows_the_player() {
        let mut level = Level::start(&LevelConfig::default()).expect("valid config");
        let _ = level.move_player(Vec2::new(4.0, -1.0));

        let camera = query::camera(level.world()).expect("camera enabled");
        assert_eq!(camera.center(), Vec2::new(4.0, -1.0));
        assert_eq!(query::focus(level.world()), Vec2::new(4.0, -1.0));
    }

    #[test]
    fn disabled_camera_leaves_only_the_focus() {
        let mut config = LevelConfig::default();
        config.camera.enabled = false;
        let level = Level::start(&config).expect("valid config");
        assert!(query::camera(level.world()).is_none());
    }

    #[test]
    fn invalid_configuration_is_rejected_at_start() {
        let mut config = LevelConfig::default();
        config.loot.coin_lifetime_secs = f32::NAN;
        assert!(matches!(
            Level::start(&config),
            Err(LevelConfigError::InvalidSeconds { .. })
        ));
    }

    #[test]
    fn negative_wave_timing_halts_the_waves_only() {
        let mut config = LevelConfig::default();
        config.waves.time_between_waves_secs = -1.0;
        let mut level = Level::start(&config).expect("wave timings are not fatal");
        let _ = level.step(Duration::from_secs(5));

        assert!(level.waves().is_halted());
        assert_eq!(
            level.waves().diagnostic(),
            Some(ConfigError::InvalidTiming {
                field: "waves.time_between_waves_secs"
            })
        );
        assert_eq!(query::live_count_of(level.world(), ActorRole::Minion), 0);
    }

    #[test]
    fn unsettled_wave_spawns_are_forgotten() {
        let mut level = Level::start(&LevelConfig::default()).expect("valid config");
        let frame = query::spawn_frame(level.world());
        let mut commands = Vec::new();
        level.waves.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_secs(1),
            }],
            &frame,
            &mut commands,
        );
        assert!(level.waves().pending_spawns() > 0);

        level.drop_unsettled(&commands);
        assert_eq!(level.waves().pending_spawns(), 0);
    }

    #[test]
    fn weapons_can_be_swapped_and_dropped() {
        let mut level = Level::start(&LevelConfig::default()).expect("valid config");
        assert!(level.shooter().preset().is_some());

        level.equip(WeaponKind::None);
        assert!(!level.shooter().preset().is_some());

        level.equip(WeaponKind::Smg);
        assert!(level.shooter().preset().is_some());

        let mut config = LevelConfig::default();
        config.prototypes.bullet = None;
        let mut unarmed = Level::start(&config).expect("valid config");
        unarmed.equip(WeaponKind::Ak47);
        assert!(!unarmed.shooter().preset().is_some());
    }

    #[test]
    fn missing_minion_halts_the_waves_only() {
        let mut config = LevelConfig::default();
        config.prototypes.minion = None;
        let mut level = Level::start(&config).expect("scheduler errors are not fatal");
        let _ = level.step(Duration::from_secs(5));

        assert!(level.waves().is_halted());
        assert_eq!(query::live_count_of(level.world(), ActorRole::Minion), 0);
    }
}
