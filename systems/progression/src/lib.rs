#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Kill counting and boss progression for a single level.
//!
//! Every kill notification, whether it names its victim or not, funnels into
//! [`ProgressionTracker::register_kill`], which consults the [`KillLedger`]
//! with a single check-and-insert before the counter moves.

use std::{
    collections::{BTreeMap, HashSet},
    time::Duration,
};

use horde_survival_core::{
    ActorRole, Command, Event, Handle, PrototypeId, SpawnFrame, SpawnOrigin,
    DEFAULT_DUPLICATE_KILL_WINDOW,
};
use horde_survival_system_spawn_placement::{PlacementConfig, SpawnPlacer};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

/// Configuration parameters required to construct the progression tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressionConfig {
    /// Kills per boss for levels missing from the threshold table.
    pub default_boss_threshold: u32,
    /// Kills per boss keyed by level name.
    pub level_thresholds: BTreeMap<String, u32>,
    /// Window inside which a second victim-less kill is ignored.
    pub duplicate_block_window: Duration,
    /// Prototype spawned when the kill counter crosses a threshold.
    pub boss: Option<PrototypeId>,
    /// Rules used to place triggered bosses.
    pub placement: PlacementConfig,
    /// Seed of the boss placement random stream.
    pub rng_seed: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        let level_thresholds = [("Level1", 50), ("Level2", 30)]
            .into_iter()
            .map(|(level, threshold)| (level.to_owned(), threshold))
            .collect();

        Self {
            default_boss_threshold: 50,
            level_thresholds,
            duplicate_block_window: DEFAULT_DUPLICATE_KILL_WINDOW,
            boss: None,
            placement: PlacementConfig {
                edge_padding: 0.0,
                ..PlacementConfig::default()
            },
            rng_seed: 0xb055_5eed,
        }
    }
}

impl ProgressionConfig {
    /// Kills per boss for the named level, never below one.
    #[must_use]
    pub fn threshold_for(&self, level: &str) -> u32 {
        self.level_thresholds
            .get(level)
            .copied()
            .unwrap_or(self.default_boss_threshold)
            .max(1)
    }
}

/// Victims already counted plus the time of the last accepted kill.
///
/// Entries are never evicted; the ledger lives exactly as long as its level.
#[derive(Clone, Debug, Default)]
pub struct KillLedger {
    victims: HashSet<Handle>,
    last_accepted: Option<Duration>,
}

impl KillLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a kill notification counts, recording it when it does.
    ///
    /// A named victim counts once. A kill without a victim is rejected when it
    /// arrives less than `window` after the previous accepted kill.
    pub fn admit(&mut self, victim: Option<Handle>, now: Duration, window: Duration) -> bool {
        match victim {
            Some(victim) => {
                if !self.victims.insert(victim) {
                    return false;
                }
            }
            None => {
                if let Some(last) = self.last_accepted {
                    if now.saturating_sub(last) < window {
                        return false;
                    }
                }
            }
        }

        self.last_accepted = Some(now);
        true
    }

    /// Reports whether the victim was already counted.
    #[cfg(test)]
    fn contains(&self, victim: Handle) -> bool {
        self.victims.contains(&victim)
    }

    /// Number of distinct victims counted.
    #[must_use]
    pub fn counted_victims(&self) -> usize {
        self.victims.len()
    }

    /// Time of the last accepted kill.
    #[must_use]
    pub const fn last_accepted(&self) -> Option<Duration> {
        self.last_accepted
    }
}

/// Result of a kill registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KillOutcome {
    /// The kill moved the counter.
    Counted {
        /// Counter value after the kill.
        kills: u32,
        /// Whether the kill crossed the boss threshold.
        boss_triggered: bool,
    },
    /// The victim had already been counted.
    Duplicate,
    /// A victim-less kill arrived inside the duplicate window.
    RateLimited,
    /// The level was torn down.
    Stopped,
}

/// Pure system owning the kill counter and boss thresholds of a level.
#[derive(Debug)]
pub struct ProgressionTracker {
    boss: Option<PrototypeId>,
    window: Duration,
    threshold: u32,
    next_boss_at: u32,
    kills: u32,
    boss_active: bool,
    ledger: KillLedger,
    clock: Duration,
    stopped: bool,
    placer: SpawnPlacer,
    rng: ChaCha8Rng,
}

impl ProgressionTracker {
    /// Creates a tracker for the named level.
    #[must_use]
    pub fn new(config: &ProgressionConfig, level: &str) -> Self {
        let threshold = config.threshold_for(level);
        debug!(level, threshold, "progression tracker created");

        Self {
            boss: config.boss,
            window: config.duplicate_block_window,
            threshold,
            next_boss_at: threshold,
            kills: 0,
            boss_active: false,
            ledger: KillLedger::new(),
            clock: Duration::ZERO,
            stopped: false,
            placer: SpawnPlacer::new(config.placement),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Kills counted so far.
    #[must_use]
    pub const fn kills(&self) -> u32 {
        self.kills
    }

    /// Kill count at which the next boss triggers.
    #[must_use]
    pub const fn next_boss_at(&self) -> u32 {
        self.next_boss_at
    }

    /// Kills per boss selected for the level.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Reports whether a boss is currently alive.
    #[must_use]
    pub const fn is_boss_active(&self) -> bool {
        self.boss_active
    }

    /// Ledger of counted victims.
    #[must_use]
    pub const fn ledger(&self) -> &KillLedger {
        &self.ledger
    }

    /// Time observed by the tracker.
    #[must_use]
    pub const fn clock(&self) -> Duration {
        self.clock
    }

    /// Consumes world events, emitting progression events and boss spawns.
    pub fn handle(
        &mut self,
        events: &[Event],
        frame: &SpawnFrame,
        out_events: &mut Vec<Event>,
        out_commands: &mut Vec<Command>,
    ) {
        for event in events {
            if self.stopped {
                return;
            }

            match event {
                Event::TimeAdvanced { dt } => self.clock = self.clock.saturating_add(*dt),
                Event::ActorSpawned {
                    actor,
                    role: ActorRole::Boss,
                    ..
                } => self.register_boss_spawned(*actor, out_events),
                Event::ActorDied { actor, role, .. } if role.is_hostile() => {
                    let _ = self.register_kill(Some(*actor), frame, out_events, out_commands);
                    if *role == ActorRole::Boss {
                        self.register_boss_death(out_events);
                    }
                }
                Event::KillCredited { victim } => {
                    let _ = self.register_kill(*victim, frame, out_events, out_commands);
                }
                Event::LevelTornDown { .. } => {
                    debug!(
                        kills = self.kills,
                        victims = self.ledger.counted_victims(),
                        "progression tracker stopped by teardown"
                    );
                    self.stopped = true;
                }
                _ => {}
            }
        }
    }

    /// Counts a kill unless it duplicates an already counted one.
    pub fn register_kill(
        &mut self,
        victim: Option<Handle>,
        frame: &SpawnFrame,
        out_events: &mut Vec<Event>,
        out_commands: &mut Vec<Command>,
    ) -> KillOutcome {
        if self.stopped {
            return KillOutcome::Stopped;
        }
        if !self.ledger.admit(victim, self.clock, self.window) {
            debug!(?victim, "duplicate kill notification absorbed");
            return if victim.is_some() {
                KillOutcome::Duplicate
            } else {
                KillOutcome::RateLimited
            };
        }

        self.kills = self.kills.saturating_add(1);
        out_events.push(Event::KillsChanged { kills: self.kills });

        let boss_triggered = self.kills >= self.next_boss_at;
        if boss_triggered {
            self.trigger_boss(frame, out_events, out_commands);
            self.next_boss_at = self.next_boss_at.saturating_add(self.threshold);
        }

        KillOutcome::Counted {
            kills: self.kills,
            boss_triggered,
        }
    }

    /// Marks a boss as alive and announces it.
    pub fn register_boss_spawned(&mut self, actor: Handle, out_events: &mut Vec<Event>) {
        self.boss_active = true;
        out_events.push(Event::BossSpawned { actor });
    }

    /// Marks the boss as dead and announces that the level is complete.
    pub fn register_boss_death(&mut self, out_events: &mut Vec<Event>) {
        self.boss_active = false;
        info!(kills = self.kills, "boss defeated, level complete");
        out_events.push(Event::LevelComplete);
    }

    fn trigger_boss(
        &mut self,
        frame: &SpawnFrame,
        out_events: &mut Vec<Event>,
        out_commands: &mut Vec<Command>,
    ) {
        info!(
            kills = self.kills,
            threshold = self.threshold,
            "kill threshold reached, triggering boss"
        );
        out_events.push(Event::BossTriggered { kills: self.kills });

        let Some(boss) = self.boss else {
            warn!("boss triggered but no boss prototype is configured");
            return;
        };
        let position = self.placer.sample(frame, &mut self.rng);
        out_commands.push(Command::SpawnActor {
            prototype: boss,
            position,
            rotation: 0.0,
            origin: SpawnOrigin::BossTrigger,
        });
    }
}
