use std::time::Duration;

use glam::Vec2;
use horde_survival_core::{
    ActorRole, Command, Event, PrototypeDescriptor, PrototypeId, SpawnOrigin,
};
use horde_survival_system_loot::{Loot, LootConfig};
use horde_survival_world::{self as world, query, World};

const MINION: PrototypeId = PrototypeId::new(1);
const COIN: PrototypeId = PrototypeId::new(3);

fn submit(world: &mut World, loot: &mut Loot, player: Vec2, command: Command) -> Vec<Event> {
    let mut log = Vec::new();
    let mut events = Vec::new();
    world::apply(world, command, &mut events);

    while !events.is_empty() {
        let mut notifications = Vec::new();
        let mut commands = Vec::new();
        loot.handle(&events, player, &mut notifications, &mut commands);
        log.append(&mut events);
        log.append(&mut notifications);
        for command in commands {
            world::apply(world, command, &mut events);
        }
    }
    log
}

fn setup(player: Vec2) -> (World, Loot) {
    let mut world = World::new();
    let mut loot = Loot::new(LootConfig {
        coin: Some(COIN),
        coin_min: 3,
        coin_max: 3,
        ..LootConfig::default()
    });
    for descriptor in [
        PrototypeDescriptor::new(MINION, "zombie", ActorRole::Minion),
        PrototypeDescriptor::new(COIN, "coin", ActorRole::Pickup),
    ] {
        let _ = submit(
            &mut world,
            &mut loot,
            player,
            Command::RegisterPrototype { descriptor },
        );
    }

    let spawned = submit(
        &mut world,
        &mut loot,
        player,
        Command::SpawnActor {
            prototype: MINION,
            position: Vec2::new(4.0, 4.0),
            rotation: 0.0,
            origin: SpawnOrigin::External,
        },
    );
    let victim = match spawned.as_slice() {
        [Event::ActorSpawned { actor, .. }] => *actor,
        other => panic!("unexpected events: {other:?}"),
    };

    let _ = submit(
        &mut world,
        &mut loot,
        player,
        Command::KillActor {
            actor: victim,
            release_delay: Duration::ZERO,
        },
    );
    (world, loot)
}

fn recycled_coins(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::ActorRecycled { prototype, .. } if *prototype == COIN))
        .count()
}

#[test]
fn dropped_coins_are_pooled_and_expire() {
    let far_away = Vec2::new(-50.0, -50.0);
    let (mut world, mut loot) = setup(far_away);
    assert_eq!(query::live_count_of(&world, ActorRole::Pickup), 3);
    assert!(query::hostile_view(&world).is_empty());
    assert_eq!(loot.on_ground(), 3);

    let early = submit(
        &mut world,
        &mut loot,
        far_away,
        Command::Tick {
            dt: Duration::from_millis(6_900),
        },
    );
    assert_eq!(recycled_coins(&early), 0);

    let expired = submit(
        &mut world,
        &mut loot,
        far_away,
        Command::Tick {
            dt: Duration::from_millis(100),
        },
    );
    assert_eq!(recycled_coins(&expired), 3);
    assert_eq!(query::pool_stats(&world, COIN).free, 3);
    assert_eq!(loot.dropped(), 3);
    assert_eq!(loot.collected(), 0);
    assert!(!expired
        .iter()
        .any(|event| matches!(event, Event::CoinsChanged { .. })));
}

#[test]
fn coins_near_the_player_are_pulled_in_and_collected() {
    let player = Vec2::new(2.0, 2.0);
    let (mut world, mut loot) = setup(player);

    let mut log = Vec::new();
    for _ in 0..30 {
        log.extend(submit(
            &mut world,
            &mut loot,
            player,
            Command::Tick {
                dt: Duration::from_millis(16),
            },
        ));
    }

    assert_eq!(recycled_coins(&log), 3);
    assert_eq!(query::live_count_of(&world, ActorRole::Pickup), 0);
    assert_eq!(query::pool_stats(&world, COIN).free, 3);
    assert_eq!(loot.collected(), 3);
    assert_eq!(loot.on_ground(), 0);
    assert_eq!(
        log.iter()
            .filter_map(|event| match event {
                Event::CoinsChanged { coins } => Some(*coins),
                _ => None,
            })
            .last(),
        Some(3)
    );
}
