#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Horde Survival.
//!
//! The world owns the prototype catalog, the [`pool::InstancePool`] of every
//! prototype, the set of live actors and the [`registry::SpatialRegistry`] of
//! hostile actors. All mutations flow through [`apply`].

pub mod pool;
pub mod registry;

use std::{collections::BTreeMap, time::Duration};

use glam::Vec2;
use horde_survival_core::{
    ActorRole, Command, Event, Handle, InstanceId, PrototypeDescriptor, PrototypeId, SpawnError,
    SpawnFrame, SpawnOrigin,
};
use tracing::{debug, info, warn};

use pool::{InstanceIds, InstancePool, InstanceState, Reclaim, Recyclable, ReleaseRequest};
use registry::SpatialRegistry;

/// Represents the authoritative Horde Survival world state.
#[derive(Debug)]
pub struct World {
    catalog: BTreeMap<PrototypeId, PrototypeDescriptor>,
    ids: InstanceIds,
    pool: InstancePool<Actor>,
    live: BTreeMap<InstanceId, Actor>,
    registry: SpatialRegistry,
    frame: SpawnFrame,
    clock: Duration,
    torn_down: bool,
}

impl World {
    /// Creates an empty world with no prototypes registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: BTreeMap::new(),
            ids: InstanceIds::new(),
            pool: InstancePool::new(),
            live: BTreeMap::new(),
            registry: SpatialRegistry::new(),
            frame: SpawnFrame::default(),
            clock: Duration::ZERO,
            torn_down: false,
        }
    }

    fn live_actor(&self, handle: Handle) -> Option<&Actor> {
        self.live
            .get(&handle.instance())
            .filter(|actor| actor.generation == handle.generation())
    }

    fn spawn(
        &mut self,
        prototype: PrototypeId,
        position: Vec2,
        rotation: f32,
        origin: SpawnOrigin,
        out_events: &mut Vec<Event>,
    ) {
        let Some(descriptor) = self.catalog.get(&prototype) else {
            warn!(?prototype, ?origin, "spawn requested for unregistered prototype");
            out_events.push(Event::SpawnRejected {
                prototype,
                origin,
                reason: SpawnError::InvalidPrototype(prototype),
            });
            return;
        };

        let actor = self
            .pool
            .acquire(descriptor, position, rotation, &mut self.ids);
        self.admit(actor, origin, out_events);
    }

    fn place(
        &mut self,
        prototype: PrototypeId,
        position: Vec2,
        rotation: f32,
        out_events: &mut Vec<Event>,
    ) {
        let Some(descriptor) = self.catalog.get(&prototype) else {
            out_events.push(Event::SpawnRejected {
                prototype,
                origin: SpawnOrigin::External,
                reason: SpawnError::InvalidPrototype(prototype),
            });
            return;
        };

        let mut actor = Actor::instantiate(self.ids.allocate(), descriptor);
        actor.activate(position, rotation);
        self.admit(actor, SpawnOrigin::External, out_events);
    }

    fn admit(&mut self, actor: Actor, origin: SpawnOrigin, out_events: &mut Vec<Event>) {
        let handle = actor.handle();
        let event = Event::ActorSpawned {
            actor: handle,
            prototype: actor.prototype,
            role: actor.role,
            position: actor.position,
            origin,
        };

        if actor.role.is_hostile() {
            let _ = self.registry.register(handle, actor.position);
        }
        let _ = self.live.insert(handle.instance(), actor);
        out_events.push(event);
    }

    fn kill(&mut self, handle: Handle, release_delay: Duration, out_events: &mut Vec<Event>) {
        let Some(actor) = self.live_actor(handle) else {
            debug!(?handle, "ignoring kill of an actor that is no longer live");
            return;
        };
        if self.pool.is_release_pending(handle.instance()) {
            debug!(?handle, "ignoring kill of an actor awaiting release");
            return;
        }

        let event = Event::ActorDied {
            actor: handle,
            prototype: actor.prototype,
            role: actor.role,
            position: actor.position,
        };
        let _ = self.registry.unregister(handle.instance());
        out_events.push(event);
        self.release(handle, release_delay, out_events);
    }

    fn release(&mut self, handle: Handle, delay: Duration, out_events: &mut Vec<Event>) {
        if self.live_actor(handle).is_none() {
            debug!(?handle, "ignoring release of an actor that is no longer live");
            return;
        }

        if delay.is_zero() {
            if self.pool.is_release_pending(handle.instance()) {
                warn!(?handle, "ignoring release of an actor already awaiting release");
                return;
            }
            self.finish_release(handle.instance(), out_events);
            return;
        }

        match self.pool.schedule_release(handle.instance(), delay) {
            ReleaseRequest::Scheduled => debug!(?handle, ?delay, "release scheduled"),
            ReleaseRequest::AlreadyPending => {
                warn!(?handle, "ignoring release of an actor already awaiting release");
            }
        }
    }

    fn finish_release(&mut self, instance: InstanceId, out_events: &mut Vec<Event>) {
        let Some(actor) = self.live.remove(&instance) else {
            return;
        };
        let _ = self.registry.unregister(instance);

        let handle = actor.handle();
        match self.pool.reclaim(actor) {
            Reclaim::Recycled(prototype) => out_events.push(Event::ActorRecycled {
                actor: handle,
                prototype,
            }),
            Reclaim::Disposed => out_events.push(Event::ActorDestroyed { actor: handle }),
        }
    }

    fn tear_down(&mut self, out_events: &mut Vec<Event>) {
        let report = self.pool.teardown();
        let live = u32::try_from(self.live.len()).unwrap_or(u32::MAX);
        self.live.clear();
        self.registry.clear();
        self.torn_down = true;

        info!(
            cancelled_releases = report.cancelled_releases,
            destroyed = report.destroyed_free.saturating_add(live),
            "level torn down"
        );
        out_events.push(Event::LevelTornDown {
            cancelled_releases: report.cancelled_releases,
            destroyed: report.destroyed_free.saturating_add(live),
        });
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    if world.torn_down {
        match command {
            Command::SpawnActor {
                prototype, origin, ..
            } => out_events.push(Event::SpawnRejected {
                prototype,
                origin,
                reason: SpawnError::ContextTornDown,
            }),
            Command::PlaceActor { prototype, .. } => out_events.push(Event::SpawnRejected {
                prototype,
                origin: SpawnOrigin::External,
                reason: SpawnError::ContextTornDown,
            }),
            other => debug!(command = ?other, "ignoring command after teardown"),
        }
        return;
    }

    match command {
        Command::RegisterPrototype { descriptor } => {
            let prototype = descriptor.id();
            let _ = world.catalog.insert(prototype, descriptor);
            out_events.push(Event::PrototypeRegistered { prototype });
        }
        Command::PrewarmPool { prototype, count } => {
            let Some(descriptor) = world.catalog.get(&prototype) else {
                debug!(?prototype, "ignoring prewarm of unregistered prototype");
                return;
            };
            let added = world.pool.prewarm(descriptor, count, &mut world.ids);
            if added > 0 {
                out_events.push(Event::PoolPrewarmed { prototype, added });
            }
        }
        Command::Tick { dt } => {
            world.clock = world.clock.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });

            for instance in world.pool.advance(dt) {
                world.finish_release(instance, out_events);
            }
        }
        Command::SetViewport { camera, focus } => {
            world.frame = SpawnFrame { camera, focus };
        }
        Command::SpawnActor {
            prototype,
            position,
            rotation,
            origin,
        } => world.spawn(prototype, position, rotation, origin, out_events),
        Command::PlaceActor {
            prototype,
            position,
            rotation,
        } => world.place(prototype, position, rotation, out_events),
        Command::MoveActor { actor, position } => {
            if let Some(live) = world
                .live
                .get_mut(&actor.instance())
                .filter(|live| live.generation == actor.generation())
            {
                live.position = position;
                let _ = world.registry.update(actor, position);
            }
        }
        Command::KillActor {
            actor,
            release_delay,
        } => world.kill(actor, release_delay, out_events),
        Command::ReleaseActor { actor, delay } => world.release(actor, delay, out_events),
        Command::CreditKill { victim } => out_events.push(Event::KillCredited { victim }),
        Command::TearDown => world.tear_down(out_events),
    }
}

/// Concrete actor instance managed by the world.
#[derive(Clone, Debug, PartialEq)]
pub struct Actor {
    id: InstanceId,
    prototype: PrototypeId,
    role: ActorRole,
    generation: u32,
    position: Vec2,
    rotation: f32,
    state: InstanceState,
}

impl Actor {
    /// Handle identifying the actor's current incarnation.
    #[must_use]
    pub const fn handle(&self) -> Handle {
        Handle::new(self.id, self.generation)
    }

    /// Prototype the actor derives from.
    #[must_use]
    pub const fn prototype(&self) -> PrototypeId {
        self.prototype
    }

    /// Role of the actor's prototype.
    #[must_use]
    pub const fn role(&self) -> ActorRole {
        self.role
    }

    /// Current world position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Current orientation in radians.
    #[must_use]
    pub const fn rotation(&self) -> f32 {
        self.rotation
    }
}

impl Recyclable for Actor {
    fn instantiate(id: InstanceId, prototype: &PrototypeDescriptor) -> Self {
        Self {
            id,
            prototype: prototype.id(),
            role: prototype.role(),
            generation: 0,
            position: Vec2::ZERO,
            rotation: 0.0,
            state: InstanceState::Free,
        }
    }

    fn id(&self) -> InstanceId {
        self.id
    }

    fn state(&self) -> InstanceState {
        self.state
    }

    fn activate(&mut self, position: Vec2, rotation: f32) {
        self.generation = self.generation.wrapping_add(1);
        self.position = position;
        self.rotation = rotation;
        self.state = InstanceState::Live;
    }

    fn deactivate(&mut self) {
        self.position = Vec2::ZERO;
        self.rotation = 0.0;
        self.state = InstanceState::Free;
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::{collections::BTreeMap, time::Duration};

    use glam::Vec2;
    use horde_survival_core::{
        ActorRole, CameraView, Handle, InstanceId, PrototypeDescriptor, PrototypeId, SpawnFrame,
    };

    use super::{Actor, World};
    use crate::{
        pool::PoolStats,
        registry::{RegisteredActor, SpatialRegistry},
    };

    /// Total simulated time applied to the world.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Reports whether the world has been torn down.
    #[must_use]
    pub fn is_torn_down(world: &World) -> bool {
        world.torn_down
    }

    /// Captures everything spawn placement depends on.
    #[must_use]
    pub fn spawn_frame(world: &World) -> SpawnFrame {
        world.frame
    }

    /// Player position the world was last told about.
    #[must_use]
    pub fn focus(world: &World) -> Vec2 {
        world.frame.focus
    }

    /// Camera rectangle the world was last told about, if any.
    #[must_use]
    pub fn camera(world: &World) -> Option<CameraView> {
        world.frame.camera
    }

    /// Looks up a registered prototype.
    #[must_use]
    pub fn prototype(world: &World, prototype: PrototypeId) -> Option<&PrototypeDescriptor> {
        world.catalog.get(&prototype)
    }

    /// Looks up the live actor behind a handle, ignoring stale handles.
    #[must_use]
    pub fn actor(world: &World, handle: Handle) -> Option<&Actor> {
        world.live_actor(handle)
    }

    /// Number of live actors, pooled and foreign.
    #[must_use]
    pub fn live_count(world: &World) -> usize {
        world.live.len()
    }

    /// Number of live actors with the provided role.
    #[must_use]
    pub fn live_count_of(world: &World, role: ActorRole) -> usize {
        world
            .live
            .values()
            .filter(|actor| actor.role == role)
            .count()
    }

    /// Iterator over the live actors in identifier order.
    pub fn live_actors(world: &World) -> impl Iterator<Item = &Actor> {
        world.live.values()
    }

    /// Counters for the instances of a prototype.
    #[must_use]
    pub fn pool_stats(world: &World, prototype: PrototypeId) -> PoolStats {
        world.pool.stats(prototype)
    }

    /// Number of deferred releases waiting to fire.
    #[must_use]
    pub fn pending_releases(world: &World) -> usize {
        world.pool.pending_releases()
    }

    /// Captures a read-only view of the hostile actors for targeting.
    #[must_use]
    pub fn hostile_view(world: &World) -> HostileView<'_> {
        HostileView {
            registry: &world.registry,
            live: &world.live,
        }
    }

    /// Read-only view over the registered hostile actors.
    #[derive(Clone, Copy, Debug)]
    pub struct HostileView<'a> {
        registry: &'a SpatialRegistry,
        live: &'a BTreeMap<InstanceId, Actor>,
    }

    impl<'a> HostileView<'a> {
        /// Nearest live hostile within `max_radius` (`None` for unlimited).
        #[must_use]
        pub fn nearest(&self, from: Vec2, max_radius: Option<f32>) -> Option<RegisteredActor> {
            self.registry
                .nearest(from, max_radius, |handle| self.is_live(handle))
        }

        /// Nearest live hostile within `max_radius` whose position passes `accept`.
        #[must_use]
        pub fn nearest_where<P>(
            &self,
            from: Vec2,
            max_radius: Option<f32>,
            accept: P,
        ) -> Option<RegisteredActor>
        where
            P: Fn(Vec2) -> bool,
        {
            self.registry
                .nearest_where(from, max_radius, |handle| self.is_live(handle), accept)
        }

        /// Number of registered hostiles.
        #[must_use]
        pub fn len(&self) -> usize {
            self.registry.len()
        }

        /// Reports whether no hostile is registered.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.registry.is_empty()
        }

        fn is_live(&self, handle: Handle) -> bool {
            self.live
                .get(&handle.instance())
                .map_or(false, |actor| actor.generation == handle.generation())
        }
    }
}
