#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Coin drops spawned where hostiles die, pulled towards and collected by the player.

use std::{collections::BTreeMap, f32::consts::TAU, time::Duration};

use glam::Vec2;
use horde_survival_core::{ActorRole, Command, Event, Handle, PrototypeId, SpawnOrigin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Upper bound on the coins a single death may drop.
pub const MAX_COINS_PER_DROP: u32 = 1_000;

/// Configuration parameters required to construct the loot system.
#[derive(Clone, Debug, PartialEq)]
pub struct LootConfig {
    /// Pickup prototype dropped by dying hostiles.
    pub coin: Option<PrototypeId>,
    /// Fewest coins a minion drops.
    pub coin_min: u32,
    /// Most coins a minion drops.
    pub coin_max: u32,
    /// Factor applied to the coin count of a boss.
    pub boss_coin_multiplier: f32,
    /// Time a dropped coin stays in the world; zero keeps coins until collected.
    pub coin_lifetime: Duration,
    /// Value credited per collected coin.
    pub coin_value: u32,
    /// Distance from the player inside which coins are pulled in.
    pub magnet_radius: f32,
    /// Speed at which pulled coins travel.
    pub magnet_speed: f32,
    /// Distance from the player at which a coin is collected.
    pub pickup_radius: f32,
    /// Seed of the drop random stream.
    pub rng_seed: u64,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self {
            coin: None,
            coin_min: 1,
            coin_max: 2,
            boss_coin_multiplier: 4.0,
            coin_lifetime: Duration::from_secs(7),
            coin_value: 1,
            magnet_radius: 4.0,
            magnet_speed: 8.0,
            pickup_radius: 0.5,
            rng_seed: 0xc011_5eed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Coin {
    position: Vec2,
    age: Duration,
}

/// Pure system that turns hostile deaths into pooled coins and credits collected ones.
#[derive(Debug)]
pub struct Loot {
    config: LootConfig,
    rng: ChaCha8Rng,
    coins: BTreeMap<Handle, Coin>,
    dropped: u64,
    collected: u32,
    stopped: bool,
}

impl Loot {
    /// Creates a new loot system using the supplied configuration.
    #[must_use]
    pub fn new(config: LootConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            config,
            coins: BTreeMap::new(),
            dropped: 0,
            collected: 0,
            stopped: false,
        }
    }

    /// Total coins requested so far.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Total coin value the player collected.
    #[must_use]
    pub const fn collected(&self) -> u32 {
        self.collected
    }

    /// Coins currently lying in the world.
    #[must_use]
    pub fn on_ground(&self) -> usize {
        self.coins.len()
    }

    /// Consumes world events, emitting coin spawns, magnet moves and releases.
    pub fn handle(
        &mut self,
        events: &[Event],
        player: Vec2,
        out_events: &mut Vec<Event>,
        out_commands: &mut Vec<Command>,
    ) {
        let mut elapsed = Duration::ZERO;
        let mut tick_observed = false;

        for event in events {
            if self.stopped {
                return;
            }

            match event {
                Event::TimeAdvanced { dt } => {
                    elapsed = elapsed.saturating_add(*dt);
                    tick_observed = true;
                }
                Event::ActorDied {
                    role, position, ..
                } if role.is_hostile() => self.drop_coins(*role, *position, out_commands),
                Event::ActorSpawned {
                    actor,
                    position,
                    origin: SpawnOrigin::Loot,
                    ..
                } => {
                    let _ = self.coins.insert(
                        *actor,
                        Coin {
                            position: *position,
                            age: Duration::ZERO,
                        },
                    );
                }
                Event::ActorRecycled { actor, .. } | Event::ActorDestroyed { actor } => {
                    let _ = self.coins.remove(actor);
                }
                Event::LevelTornDown { .. } => {
                    self.coins.clear();
                    self.stopped = true;
                }
                _ => {}
            }
        }

        if tick_observed && !self.stopped {
            self.advance(elapsed, player, out_events, out_commands);
        }
    }

    fn drop_coins(&mut self, role: ActorRole, position: Vec2, out: &mut Vec<Command>) {
        let Some(coin) = self.config.coin else {
            return;
        };
        let count = self.roll_count(role);
        debug!(count, ?role, "dropping coins");
        for _ in 0..count {
            out.push(Command::SpawnActor {
                prototype: coin,
                position,
                rotation: self.rng.gen_range(0.0..TAU),
                origin: SpawnOrigin::Loot,
            });
        }
        self.dropped = self.dropped.saturating_add(u64::from(count));
    }

    fn advance(
        &mut self,
        elapsed: Duration,
        player: Vec2,
        out_events: &mut Vec<Event>,
        out_commands: &mut Vec<Command>,
    ) {
        let lifetime = self.config.coin_lifetime;
        let magnet_radius = self.config.magnet_radius;
        let pickup_radius = self.config.pickup_radius;
        let step = self.config.magnet_speed * elapsed.as_secs_f32();

        let mut gained = 0_u32;
        let mut gone = Vec::new();
        for (handle, coin) in &mut self.coins {
            coin.age = coin.age.saturating_add(elapsed);
            if !lifetime.is_zero() && coin.age >= lifetime {
                gone.push(*handle);
                continue;
            }

            let distance = coin.position.distance(player);
            if distance > pickup_radius && distance <= magnet_radius && step > 0.0 {
                coin.position += (player - coin.position).clamp_length_max(step);
                out_commands.push(Command::MoveActor {
                    actor: *handle,
                    position: coin.position,
                });
            }
            if coin.position.distance(player) <= pickup_radius {
                gained = gained.saturating_add(self.config.coin_value);
                gone.push(*handle);
            }
        }

        for handle in gone {
            let _ = self.coins.remove(&handle);
            out_commands.push(Command::ReleaseActor {
                actor: handle,
                delay: Duration::ZERO,
            });
        }

        if gained > 0 {
            self.collected = self.collected.saturating_add(gained);
            debug!(gained, total = self.collected, "coins collected");
            out_events.push(Event::CoinsChanged {
                coins: self.collected,
            });
        }
    }

    fn roll_count(&mut self, role: ActorRole) -> u32 {
        let low = self.config.coin_min.min(self.config.coin_max);
        let high = self
            .config
            .coin_min
            .max(self.config.coin_max)
            .min(MAX_COINS_PER_DROP);
        let count = self.rng.gen_range(low.min(high)..=high);

        if role == ActorRole::Boss {
            let scaled = (count as f32 * self.config.boss_coin_multiplier).round();
            (scaled.min(MAX_COINS_PER_DROP as f32) as u32).max(1)
        } else {
            count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_survival_core::InstanceId;

    const COIN: PrototypeId = PrototypeId::new(5);

    fn death(role: ActorRole) -> Event {
        Event::ActorDied {
            actor: Handle::new(InstanceId::new(1), 1),
            prototype: PrototypeId::new(1),
            role,
            position: Vec2::new(3.0, -2.0),
        }
    }

    fn coin_spawned(id: u32, position: Vec2) -> Event {
        Event::ActorSpawned {
            actor: Handle::new(InstanceId::new(id), 1),
            prototype: COIN,
            role: ActorRole::Pickup,
            position,
            origin: SpawnOrigin::Loot,
        }
    }

    fn tick(millis: u64) -> Event {
        Event::TimeAdvanced {
            dt: Duration::from_millis(millis),
        }
    }

    fn run(loot: &mut Loot, events: &[Event]) -> (Vec<Event>, Vec<Command>) {
        let mut out_events = Vec::new();
        let mut out_commands = Vec::new();
        loot.handle(events, Vec2::ZERO, &mut out_events, &mut out_commands);
        (out_events, out_commands)
    }

    fn coins(commands: &[Command]) -> usize {
        commands
            .iter()
            .filter(|command| {
                matches!(
                    command,
                    Command::SpawnActor {
                        origin: SpawnOrigin::Loot,
                        ..
                    }
                )
            })
            .count()
    }

    fn loot() -> Loot {
        Loot::new(LootConfig {
            coin: Some(COIN),
            ..LootConfig::default()
        })
    }

    #[test]
    fn minion_drops_within_configured_range() {
        let mut loot = loot();
        for _ in 0..64 {
            let (_, out) = run(&mut loot, &[death(ActorRole::Minion)]);
            assert!((1..=2).contains(&coins(&out)));
        }
    }

    #[test]
    fn boss_drops_are_multiplied() {
        let mut loot = Loot::new(LootConfig {
            coin: Some(COIN),
            coin_min: 2,
            coin_max: 2,
            ..LootConfig::default()
        });
        let (_, out) = run(&mut loot, &[death(ActorRole::Boss)]);
        assert_eq!(coins(&out), 8);
    }

    #[test]
    fn boss_drops_at_least_one_coin() {
        let mut loot = Loot::new(LootConfig {
            coin: Some(COIN),
            coin_min: 0,
            coin_max: 0,
            ..LootConfig::default()
        });
        let (_, out) = run(&mut loot, &[death(ActorRole::Boss)]);
        assert_eq!(coins(&out), 1);
    }

    #[test]
    fn oversized_multipliers_are_capped() {
        let mut loot = Loot::new(LootConfig {
            coin: Some(COIN),
            coin_min: 2,
            coin_max: 2,
            boss_coin_multiplier: 1.0e12,
            ..LootConfig::default()
        });
        let (_, out) = run(&mut loot, &[death(ActorRole::Boss)]);
        assert_eq!(coins(&out), MAX_COINS_PER_DROP as usize);
    }

    #[test]
    fn pickups_and_projectiles_drop_nothing() {
        let mut loot = loot();
        let (_, out) = run(
            &mut loot,
            &[death(ActorRole::Pickup), death(ActorRole::Projectile)],
        );
        assert!(out.is_empty());
    }

    #[test]
    fn coins_drop_at_the_death_position() {
        let mut loot = loot();
        let (_, out) = run(&mut loot, &[death(ActorRole::Minion)]);
        for command in out {
            match command {
                Command::SpawnActor {
                    prototype,
                    position,
                    rotation,
                    ..
                } => {
                    assert_eq!(prototype, COIN);
                    assert_eq!(position, Vec2::new(3.0, -2.0));
                    assert!((0.0..TAU).contains(&rotation));
                }
                other => panic!("unexpected command: {other:?}"),
            }
        }
    }

    #[test]
    fn coins_inside_the_magnet_radius_drift_towards_the_player() {
        let mut loot = loot();
        let (_, _) = run(&mut loot, &[coin_spawned(7, Vec2::new(3.0, 0.0))]);
        let (events, commands) = run(&mut loot, &[tick(100)]);

        assert!(events.is_empty());
        match commands.as_slice() {
            [Command::MoveActor { actor, position }] => {
                assert_eq!(*actor, Handle::new(InstanceId::new(7), 1));
                assert!(position.abs_diff_eq(Vec2::new(2.2, 0.0), 1e-4));
            }
            other => panic!("unexpected commands: {other:?}"),
        }
    }

    #[test]
    fn coins_outside_the_magnet_radius_stay_put() {
        let mut loot = loot();
        let (_, _) = run(&mut loot, &[coin_spawned(7, Vec2::new(10.0, 0.0))]);
        let (events, commands) = run(&mut loot, &[tick(100)]);
        assert!(events.is_empty());
        assert!(commands.is_empty());
        assert_eq!(loot.on_ground(), 1);
    }

    #[test]
    fn collected_coins_are_released_and_counted() {
        let mut loot = Loot::new(LootConfig {
            coin: Some(COIN),
            coin_value: 5,
            ..LootConfig::default()
        });
        let (_, _) = run(
            &mut loot,
            &[
                coin_spawned(1, Vec2::new(0.2, 0.0)),
                coin_spawned(2, Vec2::new(0.0, 0.3)),
            ],
        );
        let (events, commands) = run(&mut loot, &[tick(16)]);

        assert_eq!(events, vec![Event::CoinsChanged { coins: 10 }]);
        assert_eq!(
            commands
                .iter()
                .filter(|command| matches!(
                    command,
                    Command::ReleaseActor { delay, .. } if delay.is_zero()
                ))
                .count(),
            2
        );
        assert_eq!(loot.collected(), 10);
        assert_eq!(loot.on_ground(), 0);
    }

    #[test]
    fn uncollected_coins_expire() {
        let mut loot = loot();
        let (_, _) = run(&mut loot, &[coin_spawned(3, Vec2::new(20.0, 0.0))]);
        let (_, early) = run(&mut loot, &[tick(6_999)]);
        assert!(early.is_empty());

        let (events, expired) = run(&mut loot, &[tick(1)]);
        assert!(events.is_empty());
        assert_eq!(
            expired,
            vec![Command::ReleaseActor {
                actor: Handle::new(InstanceId::new(3), 1),
                delay: Duration::ZERO,
            }]
        );
        assert_eq!(loot.collected(), 0);
    }
}
