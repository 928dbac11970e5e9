#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-driven wave scheduler emitting minion and boss spawn commands.
//!
//! The scheduler is an explicit state machine advanced by the simulation
//! tick. Suspension points (initial silence, waiting for capacity, the pause
//! between waves and the spacing inside a wave) are phases holding the time
//! left before they resolve, so tearing the level down simply stops the
//! machine.

use std::{collections::HashMap, time::Duration};

use horde_survival_core::{
    ActorRole, Command, Event, Handle, PrototypeId, SpawnFrame, SpawnOrigin,
    CAPACITY_RECHECK_INTERVAL,
};
use horde_survival_system_spawn_placement::{PlacementConfig, SpawnPlacer};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Configuration parameters required to construct the wave scheduler.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveConfig {
    /// Prototype spawned by every wave.
    pub minion: Option<PrototypeId>,
    /// Prototype spawned once enough minions died, if any.
    pub boss: Option<PrototypeId>,
    /// Minion deaths required before a boss is requested; zero disables bosses.
    pub boss_every_minion_kills: u32,
    /// Lets boss spawns exceed the alive cap.
    pub ignore_alive_cap_for_boss: bool,
    /// Delay before the first wave.
    pub initial_silence: Duration,
    /// Pause between the end of one wave and the start of the next.
    pub time_between_waves: Duration,
    /// Size of the first wave.
    pub start_count: u32,
    /// Growth of the wave size per wave.
    pub add_per_wave: u32,
    /// Spacing between spawns inside a wave.
    pub spawn_interval: Duration,
    /// Maximum number of scheduler-spawned actors alive at once.
    pub max_alive_cap: u32,
    /// Cadence at which a saturated scheduler re-checks the alive cap.
    pub capacity_recheck: Duration,
    /// Rules used to choose spawn positions.
    pub placement: PlacementConfig,
    /// Seed of the placement random stream.
    pub rng_seed: u64,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            minion: None,
            boss: None,
            boss_every_minion_kills: 50,
            ignore_alive_cap_for_boss: true,
            initial_silence: Duration::ZERO,
            time_between_waves: Duration::from_secs(3),
            start_count: 4,
            add_per_wave: 2,
            spawn_interval: Duration::from_millis(200),
            max_alive_cap: 60,
            capacity_recheck: CAPACITY_RECHECK_INTERVAL,
            placement: PlacementConfig::default(),
            rng_seed: 0x5eed_f00d,
        }
    }
}

impl WaveConfig {
    /// Checks the preconditions the scheduler needs to run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minion.is_none() {
            return Err(ConfigError::MissingMinionPrototype);
        }
        if self.time_between_waves.is_zero() {
            return Err(ConfigError::ZeroTimeBetweenWaves);
        }
        if self.capacity_recheck.is_zero() {
            return Err(ConfigError::ZeroCapacityRecheck);
        }
        Ok(())
    }

    /// Number of minions spawned by the wave with the provided index.
    #[must_use]
    pub fn wave_size(&self, wave_index: u32) -> u32 {
        self.start_count
            .saturating_add(wave_index.saturating_mul(self.add_per_wave))
    }
}

/// Fatal configuration problems that halt the scheduler.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No minion prototype was configured.
    #[error("no minion prototype is configured")]
    MissingMinionPrototype,
    /// The pause between waves must be positive.
    #[error("time between waves must be positive")]
    ZeroTimeBetweenWaves,
    /// The capacity re-check cadence must be positive.
    #[error("capacity re-check interval must be positive")]
    ZeroCapacityRecheck,
    /// A timing parameter could not be turned into a duration.
    #[error("`{field}` must be a finite, non-negative number of seconds")]
    InvalidTiming {
        /// Name of the offending parameter.
        field: &'static str,
    },
    /// The world refused to spawn the minion prototype.
    #[error("minion prototype {0:?} was rejected by the world")]
    PrototypeRejected(PrototypeId),
}

/// Counters owned exclusively by the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaveState {
    /// Index of the next wave to start.
    pub wave_index: u32,
    /// Scheduler-spawned actors currently alive.
    pub alive_count: u32,
    /// Minion deaths observed since the last boss request.
    pub minion_kills_since_boss: u32,
    /// Minion deaths required before the next boss request.
    pub next_boss_threshold: u32,
}

/// Phase of the scheduler state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No time has been observed yet.
    Idle,
    /// Waiting out the initial silence.
    Silence {
        /// Time left before the first wave is prepared.
        remaining: Duration,
    },
    /// Suspended until the alive cap frees up.
    AwaitingCapacity {
        /// Time left before the cap is checked again.
        recheck_in: Duration,
    },
    /// Emitting the spawns of the current wave.
    WaveBurst {
        /// Spawns left in the wave.
        remaining: u32,
        /// Time left before the next spawn slot.
        next_spawn_in: Duration,
    },
    /// Pausing between two waves.
    InterWaveDelay {
        /// Time left before the next wave is prepared.
        remaining: Duration,
    },
    /// Disabled by a fatal configuration error.
    Halted,
    /// Stopped because the level was torn down.
    Stopped,
}

/// Pure system that schedules waves of spawns with back-pressure.
#[derive(Debug)]
pub struct WaveScheduler {
    config: WaveConfig,
    placer: SpawnPlacer,
    rng: ChaCha8Rng,
    state: WaveState,
    phase: Phase,
    pending_spawns: u32,
    tracked: HashMap<Handle, ActorRole>,
    boss_pending: bool,
    boss_enabled: bool,
    diagnostic: Option<ConfigError>,
}

impl WaveScheduler {
    /// Creates a new scheduler, halting immediately when the configuration is invalid.
    #[must_use]
    pub fn new(config: WaveConfig) -> Self {
        let diagnostic = config.validate().err();
        Self::build(config, diagnostic)
    }

    /// Creates a scheduler that never spawns and reports `error` as its diagnostic.
    #[must_use]
    pub fn halted(error: ConfigError) -> Self {
        Self::build(WaveConfig::default(), Some(error))
    }

    fn build(config: WaveConfig, diagnostic: Option<ConfigError>) -> Self {
        let phase = match diagnostic {
            Some(error) => {
                error!(%error, "wave scheduler disabled");
                Phase::Halted
            }
            None => Phase::Idle,
        };

        Self {
            placer: SpawnPlacer::new(config.placement),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            state: WaveState {
                next_boss_threshold: config.boss_every_minion_kills,
                ..WaveState::default()
            },
            phase,
            pending_spawns: 0,
            tracked: HashMap::new(),
            boss_pending: false,
            boss_enabled: config.boss.is_some() && config.boss_every_minion_kills > 0,
            diagnostic,
            config,
        }
    }

    /// Counters of the scheduler.
    #[must_use]
    pub const fn state(&self) -> WaveState {
        self.state
    }

    /// Current phase of the state machine.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Fatal configuration error that halted the scheduler, if any.
    #[must_use]
    pub const fn diagnostic(&self) -> Option<ConfigError> {
        self.diagnostic
    }

    /// Reports whether the scheduler was disabled by a configuration error.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        matches!(self.phase, Phase::Halted)
    }

    /// Reports whether a boss request is waiting for capacity.
    #[must_use]
    pub const fn is_boss_pending(&self) -> bool {
        self.boss_pending
    }

    /// Spawn requests issued but not yet confirmed by the world.
    #[must_use]
    pub const fn pending_spawns(&self) -> u32 {
        self.pending_spawns
    }

    /// Forgets `count` spawn requests that will never reach the world.
    pub fn forget_spawns(&mut self, count: u32) {
        if count > 0 {
            warn!(count, pending = self.pending_spawns, "forgetting unapplied spawn requests");
        }
        self.pending_spawns = self.pending_spawns.saturating_sub(count);
    }

    /// Consumes world events and emits spawn commands.
    pub fn handle(&mut self, events: &[Event], frame: &SpawnFrame, out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::ActorSpawned {
                    actor,
                    role,
                    origin: SpawnOrigin::Wave,
                    ..
                } => self.on_spawned(*actor, *role),
                Event::SpawnRejected {
                    prototype,
                    origin: SpawnOrigin::Wave,
                    ..
                } => self.on_rejected(*prototype),
                Event::LevelTornDown { .. } => self.stop(),
                _ => {}
            }
        }

        for event in events {
            match event {
                Event::ActorDied { actor, .. } => self.on_gone(*actor, true),
                Event::ActorRecycled { actor, .. } | Event::ActorDestroyed { actor } => {
                    self.on_gone(*actor, false);
                }
                _ => {}
            }
        }

        if !self.is_running() {
            return;
        }

        self.try_spawn_boss(frame, out);

        let mut elapsed = Duration::ZERO;
        let mut tick_observed = false;
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                elapsed = elapsed.saturating_add(*dt);
                tick_observed = true;
            }
        }

        if tick_observed {
            self.advance(elapsed, frame, out);
        }
    }

    fn is_running(&self) -> bool {
        !matches!(self.phase, Phase::Halted | Phase::Stopped)
    }

    fn on_spawned(&mut self, actor: Handle, role: ActorRole) {
        self.pending_spawns = self.pending_spawns.saturating_sub(1);
        if self.tracked.insert(actor, role).is_none() {
            self.state.alive_count = self.state.alive_count.saturating_add(1);
        }
    }

    fn on_rejected(&mut self, prototype: PrototypeId) {
        self.pending_spawns = self.pending_spawns.saturating_sub(1);
        if !self.is_running() {
            return;
        }
        if Some(prototype) == self.config.minion {
            let error = ConfigError::PrototypeRejected(prototype);
            error!(%error, "wave scheduler disabled");
            self.diagnostic = Some(error);
            self.phase = Phase::Halted;
        } else if Some(prototype) == self.config.boss && self.boss_enabled {
            warn!(?prototype, "boss prototype rejected, disabling boss spawns");
            self.boss_enabled = false;
            self.boss_pending = false;
        }
    }

    fn on_gone(&mut self, actor: Handle, died: bool) {
        let Some(role) = self.tracked.remove(&actor) else {
            return;
        };
        self.state.alive_count = self.state.alive_count.saturating_sub(1);

        if died && role == ActorRole::Minion {
            self.state.minion_kills_since_boss = self.state.minion_kills_since_boss.saturating_add(1);
            if self.boss_enabled
                && self.state.minion_kills_since_boss >= self.state.next_boss_threshold
            {
                self.boss_pending = true;
            }
        }
    }

    fn stop(&mut self) {
        debug!(phase = ?self.phase, "wave scheduler stopped by teardown");
        self.phase = Phase::Stopped;
        self.pending_spawns = 0;
        self.boss_pending = false;
        self.tracked.clear();
    }

    fn has_capacity(&self) -> bool {
        self.state.alive_count.saturating_add(self.pending_spawns) < self.config.max_alive_cap
    }

    fn try_spawn_boss(&mut self, frame: &SpawnFrame, out: &mut Vec<Command>) {
        if !self.boss_pending {
            return;
        }
        let Some(boss) = self.config.boss else {
            self.boss_pending = false;
            return;
        };
        if !self.config.ignore_alive_cap_for_boss && !self.has_capacity() {
            return;
        }

        info!(
            kills = self.state.minion_kills_since_boss,
            "requesting boss after minion kills"
        );
        self.spawn(boss, frame, out);
        self.state.minion_kills_since_boss = 0;
        self.boss_pending = false;
    }

    fn spawn(&mut self, prototype: PrototypeId, frame: &SpawnFrame, out: &mut Vec<Command>) {
        let position = self.placer.sample(frame, &mut self.rng);
        self.pending_spawns = self.pending_spawns.saturating_add(1);
        out.push(Command::SpawnActor {
            prototype,
            position,
            rotation: 0.0,
            origin: SpawnOrigin::Wave,
        });
    }

    fn prepare_wave(&mut self) -> Phase {
        if !self.has_capacity() {
            debug!(
                alive = self.state.alive_count,
                cap = self.config.max_alive_cap,
                "alive cap reached, waiting for capacity"
            );
            return Phase::AwaitingCapacity {
                recheck_in: self.config.capacity_recheck,
            };
        }

        let size = self.config.wave_size(self.state.wave_index);
        info!(
            wave = self.state.wave_index.saturating_add(1),
            size, "starting wave"
        );
        Phase::WaveBurst {
            remaining: size,
            next_spawn_in: Duration::ZERO,
        }
    }

    fn advance(&mut self, mut budget: Duration, frame: &SpawnFrame, out: &mut Vec<Command>) {
        loop {
            match self.phase {
                Phase::Idle => {
                    self.phase = if self.config.initial_silence.is_zero() {
                        self.prepare_wave()
                    } else {
                        Phase::Silence {
                            remaining: self.config.initial_silence,
                        }
                    };
                }
                Phase::Silence { remaining } => {
                    if budget < remaining {
                        self.phase = Phase::Silence {
                            remaining: remaining - budget,
                        };
                        return;
                    }
                    budget -= remaining;
                    self.phase = self.prepare_wave();
                }
                Phase::AwaitingCapacity { recheck_in } => {
                    if budget < recheck_in {
                        self.phase = Phase::AwaitingCapacity {
                            recheck_in: recheck_in - budget,
                        };
                        return;
                    }
                    budget -= recheck_in;
                    self.phase = self.prepare_wave();
                }
                Phase::WaveBurst {
                    remaining,
                    next_spawn_in,
                } => {
                    if budget < next_spawn_in {
                        self.phase = Phase::WaveBurst {
                            remaining,
                            next_spawn_in: next_spawn_in - budget,
                        };
                        return;
                    }
                    budget -= next_spawn_in;

                    if remaining == 0 {
                        self.state.wave_index = self.state.wave_index.saturating_add(1);
                        self.phase = Phase::InterWaveDelay {
                            remaining: self.config.time_between_waves,
                        };
                        continue;
                    }

                    if let Some(minion) = self.config.minion {
                        if self.has_capacity() {
                            self.spawn(minion, frame, out);
                        } else {
                            debug!("alive cap reached mid-wave, skipping spawn");
                        }
                    }
                    self.phase = Phase::WaveBurst {
                        remaining: remaining - 1,
                        next_spawn_in: self.config.spawn_interval,
                    };
                }
                Phase::InterWaveDelay { remaining } => {
                    if budget < remaining {
                        self.phase = Phase::InterWaveDelay {
                            remaining: remaining - budget,
                        };
                        return;
                    }
                    budget -= remaining;
                    self.phase = self.prepare_wave();
                }
                Phase::Halted | Phase::Stopped => return,
            }
        }
    }
}
