use std::time::Duration;

use glam::Vec2;
use horde_survival_core::{
    ActorRole, Command, Event, Handle, PrototypeDescriptor, PrototypeId, SpawnOrigin,
};
use horde_survival_system_progression::{ProgressionConfig, ProgressionTracker};
use horde_survival_world::{self as world, query, World};

const MINION: PrototypeId = PrototypeId::new(1);
const BOSS: PrototypeId = PrototypeId::new(2);

struct Harness {
    world: World,
    tracker: ProgressionTracker,
    progress: Vec<Event>,
}

impl Harness {
    fn new(config: ProgressionConfig, level: &str) -> Self {
        let mut world = World::new();
        let mut events = Vec::new();
        for descriptor in [
            PrototypeDescriptor::new(MINION, "zombie", ActorRole::Minion),
            PrototypeDescriptor::new(BOSS, "boss", ActorRole::Boss),
        ] {
            world::apply(
                &mut world,
                Command::RegisterPrototype { descriptor },
                &mut events,
            );
        }

        Self {
            world,
            tracker: ProgressionTracker::new(&config, level),
            progress: Vec::new(),
        }
    }

    fn submit(&mut self, command: Command) {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);

        while !events.is_empty() {
            let mut commands = Vec::new();
            let mut progress = Vec::new();
            self.tracker.handle(
                &events,
                &query::spawn_frame(&self.world),
                &mut progress,
                &mut commands,
            );
            self.progress.extend(progress);

            events.clear();
            for command in commands {
                world::apply(&mut self.world, command, &mut events);
            }
        }
    }

    fn spawn_minion(&mut self) -> Handle {
        self.submit(Command::SpawnActor {
            prototype: MINION,
            position: Vec2::ZERO,
            rotation: 0.0,
            origin: SpawnOrigin::External,
        });
        query::live_actors(&self.world)
            .filter(|actor| actor.role() == ActorRole::Minion)
            .map(|actor| actor.handle())
            .last()
            .expect("spawned minion")
    }

    fn kill(&mut self, actor: Handle) {
        self.submit(Command::KillActor {
            actor,
            release_delay: Duration::from_millis(500),
        });
    }

    fn tick(&mut self, millis: u64) {
        self.submit(Command::Tick {
            dt: Duration::from_millis(millis),
        });
    }

    fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.progress.iter().filter(|event| predicate(event)).count()
    }
}

#[test]
fn same_victim_reported_twice_counts_once() {
    let mut harness = Harness::new(ProgressionConfig::default(), "Level1");
    let victim = harness.spawn_minion();

    harness.kill(victim);
    harness.tick(100);
    harness.submit(Command::CreditKill {
        victim: Some(victim),
    });

    assert_eq!(harness.tracker.kills(), 1);
    assert_eq!(harness.count(|event| matches!(event, Event::KillsChanged { .. })), 1);
}

#[test]
fn redundant_anonymous_call_site_is_absorbed() {
    let mut harness = Harness::new(ProgressionConfig::default(), "Level1");
    let victim = harness.spawn_minion();

    harness.tick(16);
    harness.kill(victim);
    harness.submit(Command::CreditKill { victim: None });
    assert_eq!(harness.tracker.kills(), 1);

    harness.tick(50);
    harness.submit(Command::CreditKill { victim: None });
    assert_eq!(harness.tracker.kills(), 2);
}

#[test]
fn anonymous_kills_inside_the_window_count_once() {
    let mut harness = Harness::new(ProgressionConfig::default(), "Level1");

    harness.tick(1_000);
    harness.submit(Command::CreditKill { victim: None });
    harness.tick(39);
    harness.submit(Command::CreditKill { victim: None });
    assert_eq!(harness.tracker.kills(), 1);

    harness.tick(2);
    harness.submit(Command::CreditKill { victim: None });
    assert_eq!(harness.tracker.kills(), 2);
}

#[test]
fn boss_lifecycle_runs_from_trigger_to_level_complete() {
    let config = ProgressionConfig {
        default_boss_threshold: 3,
        boss: Some(BOSS),
        ..ProgressionConfig::default()
    };
    let mut harness = Harness::new(config, "Arena");

    let minions: Vec<Handle> = (0..3).map(|_| harness.spawn_minion()).collect();
    for minion in minions {
        harness.kill(minion);
    }

    assert_eq!(
        harness.count(|event| matches!(event, Event::BossTriggered { kills: 3 })),
        1
    );
    assert_eq!(harness.count(|event| matches!(event, Event::BossSpawned { .. })), 1);
    assert!(harness.tracker.is_boss_active());
    assert_eq!(harness.tracker.next_boss_at(), 6);

    let boss = query::live_actors(&harness.world)
        .find(|actor| actor.role() == ActorRole::Boss)
        .map(|actor| actor.handle())
        .expect("boss spawned by the trigger");
    harness.kill(boss);

    assert!(!harness.tracker.is_boss_active());
    assert_eq!(harness.tracker.kills(), 4);
    assert_eq!(harness.progress.last(), Some(&Event::LevelComplete));
}

#[test]
fn unknown_levels_use_the_default_threshold() {
    let harness = Harness::new(ProgressionConfig::default(), "Level2");
    assert_eq!(harness.tracker.next_boss_at(), 30);

    let harness = Harness::new(ProgressionConfig::default(), "Bonus");
    assert_eq!(harness.tracker.next_boss_at(), 50);
}

#[test]
fn kills_after_teardown_are_ignored() {
    let mut harness = Harness::new(ProgressionConfig::default(), "Level1");
    let victim = harness.spawn_minion();
    harness.kill(victim);
    harness.submit(Command::TearDown);
    harness.tick(100);
    harness.submit(Command::CreditKill { victim: None });

    assert_eq!(harness.tracker.kills(), 1);
}
