use std::time::Duration;

use glam::Vec2;
use horde_survival_core::{
    ActorRole, Command, Event, Handle, PrototypeDescriptor, PrototypeId, SpawnError, SpawnOrigin,
};
use horde_survival_world::{self as world, query, World};

const MINION: PrototypeId = PrototypeId::new(1);
const COIN: PrototypeId = PrototypeId::new(2);

fn configured_world() -> World {
    let mut world = World::new();
    let mut events = Vec::new();
    for descriptor in [
        PrototypeDescriptor::new(MINION, "minion", ActorRole::Minion),
        PrototypeDescriptor::new(COIN, "coin", ActorRole::Pickup),
    ] {
        world::apply(
            &mut world,
            Command::RegisterPrototype { descriptor },
            &mut events,
        );
    }
    world
}

fn spawn(world: &mut World, prototype: PrototypeId, position: Vec2) -> Handle {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::SpawnActor {
            prototype,
            position,
            rotation: 0.0,
            origin: SpawnOrigin::External,
        },
        &mut events,
    );
    match events.as_slice() {
        [Event::ActorSpawned { actor, .. }] => *actor,
        other => panic!("unexpected spawn events: {other:?}"),
    }
}

fn tick(world: &mut World, dt: Duration) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, Command::Tick { dt }, &mut events);
    events
}

#[test]
fn nearest_hostile_matches_expected_actor() {
    let mut world = configured_world();
    let near = spawn(&mut world, MINION, Vec2::new(1.0, 0.0));
    let _ = spawn(&mut world, MINION, Vec2::new(5.0, 0.0));
    let _ = spawn(&mut world, MINION, Vec2::new(0.0, 3.0));

    let nearest = query::hostile_view(&world).nearest(Vec2::ZERO, None);
    assert_eq!(nearest.map(|entry| entry.handle), Some(near));
}

#[test]
fn pickups_are_not_hostile_queryable() {
    let mut world = configured_world();
    let _ = spawn(&mut world, COIN, Vec2::new(0.5, 0.0));
    let minion = spawn(&mut world, MINION, Vec2::new(4.0, 0.0));

    let view = query::hostile_view(&world);
    assert_eq!(view.len(), 1);
    assert_eq!(view.nearest(Vec2::ZERO, None).map(|entry| entry.handle), Some(minion));
}

#[test]
fn spawning_unknown_prototype_is_rejected() {
    let mut world = configured_world();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::SpawnActor {
            prototype: PrototypeId::new(77),
            position: Vec2::ZERO,
            rotation: 0.0,
            origin: SpawnOrigin::Wave,
        },
        &mut events,
    );

    assert_eq!(
        events,
        vec![Event::SpawnRejected {
            prototype: PrototypeId::new(77),
            origin: SpawnOrigin::Wave,
            reason: SpawnError::InvalidPrototype(PrototypeId::new(77)),
        }]
    );
    assert_eq!(query::live_count(&world), 0);
}

#[test]
fn pool_conserves_instances_across_spawns_and_releases() {
    let mut world = configured_world();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::PrewarmPool {
            prototype: MINION,
            count: 3,
        },
        &mut events,
    );
    assert_eq!(
        events,
        vec![Event::PoolPrewarmed {
            prototype: MINION,
            added: 3
        }]
    );

    let mut live = Vec::new();
    for round in 0..20_u32 {
        if round % 4 == 3 {
            if let Some(handle) = live.pop() {
                let mut release_events = Vec::new();
                world::apply(
                    &mut world,
                    Command::ReleaseActor {
                        actor: handle,
                        delay: Duration::ZERO,
                    },
                    &mut release_events,
                );
                assert!(matches!(
                    release_events.as_slice(),
                    [Event::ActorRecycled { .. }]
                ));
            }
        } else {
            live.push(spawn(&mut world, MINION, Vec2::ZERO));
        }

        let stats = query::pool_stats(&world, MINION);
        assert_eq!(stats.free + stats.live, stats.constructed);
        assert_eq!(stats.live as usize, live.len());
    }
}

#[test]
fn kill_announces_death_then_recycles_after_delay() {
    let mut world = configured_world();
    let handle = spawn(&mut world, MINION, Vec2::new(2.0, 0.0));

    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::KillActor {
            actor: handle,
            release_delay: Duration::from_millis(300),
        },
        &mut events,
    );
    assert_eq!(
        events,
        vec![Event::ActorDied {
            actor: handle,
            prototype: MINION,
            role: ActorRole::Minion,
            position: Vec2::new(2.0, 0.0),
        }]
    );
    assert!(query::hostile_view(&world).is_empty());
    assert!(query::actor(&world, handle).is_some());

    let early = tick(&mut world, Duration::from_millis(200));
    assert_eq!(early, vec![Event::TimeAdvanced {
        dt: Duration::from_millis(200)
    }]);

    let due = tick(&mut world, Duration::from_millis(100));
    assert_eq!(
        due[1..],
        [Event::ActorRecycled {
            actor: handle,
            prototype: MINION
        }]
    );
    assert!(query::actor(&world, handle).is_none());
}

#[test]
fn second_kill_of_the_same_actor_is_absorbed() {
    let mut world = configured_world();
    let handle = spawn(&mut world, MINION, Vec2::ZERO);

    let mut events = Vec::new();
    for _ in 0..2 {
        world::apply(
            &mut world,
            Command::KillActor {
                actor: handle,
                release_delay: Duration::from_millis(50),
            },
            &mut events,
        );
    }

    let deaths = events
        .iter()
        .filter(|event| matches!(event, Event::ActorDied { .. }))
        .count();
    assert_eq!(deaths, 1);
}

#[test]
fn stale_handles_are_absorbed_after_recycling() {
    let mut world = configured_world();
    let first = spawn(&mut world, MINION, Vec2::ZERO);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ReleaseActor {
            actor: first,
            delay: Duration::ZERO,
        },
        &mut events,
    );

    let second = spawn(&mut world, MINION, Vec2::ZERO);
    assert_eq!(second.instance(), first.instance());
    assert_ne!(second, first);

    events.clear();
    world::apply(
        &mut world,
        Command::KillActor {
            actor: first,
            release_delay: Duration::ZERO,
        },
        &mut events,
    );
    assert!(events.is_empty());
    assert!(query::actor(&world, second).is_some());
}

#[test]
fn double_release_keeps_the_first_timer() {
    let mut world = configured_world();
    let handle = spawn(&mut world, MINION, Vec2::ZERO);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ReleaseActor {
            actor: handle,
            delay: Duration::from_millis(100),
        },
        &mut events,
    );
    world::apply(
        &mut world,
        Command::ReleaseActor {
            actor: handle,
            delay: Duration::ZERO,
        },
        &mut events,
    );

    assert!(events.is_empty());
    assert_eq!(query::pending_releases(&world), 1);

    let due = tick(&mut world, Duration::from_millis(100));
    let recycled = due
        .iter()
        .filter(|event| matches!(event, Event::ActorRecycled { .. }))
        .count();
    assert_eq!(recycled, 1);
}

#[test]
fn foreign_actors_are_destroyed_on_release() {
    let mut world = configured_world();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::PlaceActor {
            prototype: MINION,
            position: Vec2::ZERO,
            rotation: 0.0,
        },
        &mut events,
    );
    let handle = match events.as_slice() {
        [Event::ActorSpawned { actor, origin, .. }] => {
            assert_eq!(*origin, SpawnOrigin::External);
            *actor
        }
        other => panic!("unexpected events: {other:?}"),
    };

    events.clear();
    world::apply(
        &mut world,
        Command::ReleaseActor {
            actor: handle,
            delay: Duration::ZERO,
        },
        &mut events,
    );

    assert_eq!(events, vec![Event::ActorDestroyed { actor: handle }]);
    assert_eq!(query::pool_stats(&world, MINION).free, 0);
    assert_eq!(query::live_count(&world), 0);
}

#[test]
fn teardown_cancels_pending_releases_and_silences_the_world() {
    let mut world = configured_world();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::PrewarmPool {
            prototype: MINION,
            count: 2,
        },
        &mut events,
    );
    let dying = spawn(&mut world, MINION, Vec2::ZERO);
    let _ = spawn(&mut world, MINION, Vec2::ONE);
    world::apply(
        &mut world,
        Command::KillActor {
            actor: dying,
            release_delay: Duration::from_secs(1),
        },
        &mut events,
    );

    events.clear();
    world::apply(&mut world, Command::TearDown, &mut events);
    assert_eq!(
        events,
        vec![Event::LevelTornDown {
            cancelled_releases: 1,
            destroyed: 2,
        }]
    );
    assert!(query::is_torn_down(&world));

    let after = tick(&mut world, Duration::from_secs(2));
    assert!(after.is_empty(), "no callbacks may fire after teardown");

    events.clear();
    world::apply(
        &mut world,
        Command::SpawnActor {
            prototype: MINION,
            position: Vec2::ZERO,
            rotation: 0.0,
            origin: SpawnOrigin::Wave,
        },
        &mut events,
    );
    assert_eq!(
        events,
        vec![Event::SpawnRejected {
            prototype: MINION,
            origin: SpawnOrigin::Wave,
            reason: SpawnError::ContextTornDown,
        }]
    );
}

#[test]
fn credited_kills_are_echoed() {
    let mut world = configured_world();
    let mut events = Vec::new();
    world::apply(&mut world, Command::CreditKill { victim: None }, &mut events);
    assert_eq!(events, vec![Event::KillCredited { victim: None }]);
}
