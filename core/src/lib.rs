#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Horde Survival run-progression engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to deterministically. Systems consume event streams,
//! query immutable views, and respond exclusively with new command batches.

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Window inside which a second kill notification without a victim is ignored.
pub const DEFAULT_DUPLICATE_KILL_WINDOW: Duration = Duration::from_millis(40);

/// Cadence at which a saturated wave scheduler re-checks the alive cap.
pub const CAPACITY_RECHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Adds (or replaces) a prototype in the world's catalog.
    RegisterPrototype {
        /// Template describing the prototype.
        descriptor: PrototypeDescriptor,
    },
    /// Pre-populates the free-list of a prototype with inert instances.
    PrewarmPool {
        /// Prototype whose free-list should grow.
        prototype: PrototypeId,
        /// Number of instances to construct ahead of time.
        count: u32,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Updates the camera and the point spawns are arranged around.
    SetViewport {
        /// Visible camera rectangle, if a camera is available.
        camera: Option<CameraView>,
        /// World position of the player the fallback spawn circle centres on.
        focus: Vec2,
    },
    /// Requests a pooled instance of the prototype placed in the world.
    SpawnActor {
        /// Prototype to instantiate.
        prototype: PrototypeId,
        /// World position of the new actor.
        position: Vec2,
        /// Orientation of the new actor in radians.
        rotation: f32,
        /// System on whose behalf the spawn is requested.
        origin: SpawnOrigin,
    },
    /// Constructs an actor directly, bypassing the pool entirely.
    PlaceActor {
        /// Prototype to construct.
        prototype: PrototypeId,
        /// World position of the new actor.
        position: Vec2,
        /// Orientation of the new actor in radians.
        rotation: f32,
    },
    /// Moves a live actor to a new world position.
    MoveActor {
        /// Actor being moved.
        actor: Handle,
        /// Destination of the move.
        position: Vec2,
    },
    /// Reports that a live actor died and should be recycled after a delay.
    KillActor {
        /// Actor that died.
        actor: Handle,
        /// Time to wait before the instance returns to its pool.
        release_delay: Duration,
    },
    /// Returns a live actor to its pool after the provided delay.
    ReleaseActor {
        /// Actor being released.
        actor: Handle,
        /// Time to wait before the transition happens.
        delay: Duration,
    },
    /// Credits a kill from a call site that may not know its victim.
    CreditKill {
        /// Victim of the kill, when known.
        victim: Option<Handle>,
    },
    /// Tears down the level, cancelling timers and destroying every instance.
    TearDown,
}

/// Events broadcast by the world and progression systems.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a prototype is available for spawning.
    PrototypeRegistered {
        /// Prototype that was registered.
        prototype: PrototypeId,
    },
    /// Confirms that inert instances were added to a free-list.
    PoolPrewarmed {
        /// Prototype whose free-list grew.
        prototype: PrototypeId,
        /// Number of instances that were constructed.
        added: u32,
    },
    /// Confirms that an actor became live in the world.
    ActorSpawned {
        /// Handle identifying the new incarnation.
        actor: Handle,
        /// Prototype the actor derives from.
        prototype: PrototypeId,
        /// Role of the actor's prototype.
        role: ActorRole,
        /// World position the actor was placed at.
        position: Vec2,
        /// System on whose behalf the actor was spawned.
        origin: SpawnOrigin,
    },
    /// Reports that a spawn request produced no instance.
    SpawnRejected {
        /// Prototype named by the request.
        prototype: PrototypeId,
        /// System that issued the request.
        origin: SpawnOrigin,
        /// Specific reason the spawn failed.
        reason: SpawnError,
    },
    /// Announces that a live actor died.
    ActorDied {
        /// Actor that died.
        actor: Handle,
        /// Prototype the actor derives from.
        prototype: PrototypeId,
        /// Role of the actor's prototype.
        role: ActorRole,
        /// Position at the moment of death.
        position: Vec2,
    },
    /// Confirms that a pooled actor returned to its free-list.
    ActorRecycled {
        /// Incarnation that ended.
        actor: Handle,
        /// Prototype whose free-list received the instance.
        prototype: PrototypeId,
    },
    /// Confirms that an actor unknown to the pool was destroyed.
    ActorDestroyed {
        /// Actor that was destroyed.
        actor: Handle,
    },
    /// Echoes a kill credited by an external call site.
    KillCredited {
        /// Victim of the kill, when known.
        victim: Option<Handle>,
    },
    /// Announces the updated kill counter of the level.
    KillsChanged {
        /// Total kills counted so far.
        kills: u32,
    },
    /// Announces the updated coin total after the player collected coins.
    CoinsChanged {
        /// Total coin value collected so far.
        coins: u32,
    },
    /// Announces that the kill counter crossed the boss threshold.
    BossTriggered {
        /// Kill count at which the boss was triggered.
        kills: u32,
    },
    /// Announces that a boss became live.
    BossSpawned {
        /// Boss actor that spawned.
        actor: Handle,
    },
    /// Announces that the boss died and the level is complete.
    LevelComplete,
    /// Confirms that the level was torn down.
    LevelTornDown {
        /// Deferred releases that were cancelled.
        cancelled_releases: u32,
        /// Instances destroyed, free and live combined.
        destroyed: u32,
    },
}

/// Reasons a spawn request may be rejected by the world.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnError {
    /// The named prototype is not registered.
    #[error("prototype {0:?} is not registered")]
    InvalidPrototype(PrototypeId),
    /// The level has already been torn down.
    #[error("the level has been torn down")]
    ContextTornDown,
}

/// Identifier of an immutable actor template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrototypeId(u32);

impl PrototypeId {
    /// Creates a new prototype identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a concrete instance, stable across recycling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u32);

impl InstanceId {
    /// Creates a new instance identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identity of a single incarnation of an instance.
///
/// The pool bumps the generation every time an instance leaves its free-list,
/// so a recycled instance never aliases its previous life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle {
    instance: InstanceId,
    generation: u32,
}

impl Handle {
    /// Creates a handle for the provided instance incarnation.
    #[must_use]
    pub const fn new(instance: InstanceId, generation: u32) -> Self {
        Self {
            instance,
            generation,
        }
    }

    /// Instance the handle refers to.
    #[must_use]
    pub const fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Incarnation of the instance the handle refers to.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Gameplay role of a prototype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Ordinary hostile spawned in waves.
    Minion,
    /// Hostile whose death completes the level.
    Boss,
    /// Player projectile.
    Projectile,
    /// Collectable dropped by dying hostiles.
    Pickup,
}

impl ActorRole {
    /// Reports whether actors of this role take part in nearest-hostile queries.
    #[must_use]
    pub const fn is_hostile(self) -> bool {
        matches!(self, Self::Minion | Self::Boss)
    }
}

/// Immutable template from which pooled instances are derived.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrototypeDescriptor {
    id: PrototypeId,
    name: String,
    role: ActorRole,
}

impl PrototypeDescriptor {
    /// Creates a new prototype descriptor.
    #[must_use]
    pub fn new(id: PrototypeId, name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }

    /// Identifier of the prototype.
    #[must_use]
    pub const fn id(&self) -> PrototypeId {
        self.id
    }

    /// Human readable name of the prototype.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role shared by every instance of the prototype.
    #[must_use]
    pub const fn role(&self) -> ActorRole {
        self.role
    }
}

/// System on whose behalf a spawn was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnOrigin {
    /// Regular wave (and wave boss) spawns.
    Wave,
    /// Direct boss spawn triggered by the kill counter.
    BossTrigger,
    /// Pickups dropped by dying hostiles.
    Loot,
    /// Projectiles fired by the player.
    Projectile,
    /// Anything requested from outside the engine.
    External,
}

/// Visible orthographic camera rectangle in world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    center: Vec2,
    half_extents: Vec2,
}

impl CameraView {
    /// Creates a camera view from its centre and half extents.
    #[must_use]
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
        }
    }

    /// Creates a camera view from an orthographic size and aspect ratio.
    ///
    /// The orthographic size is the half height of the view; the half width
    /// follows from multiplying it by the aspect ratio.
    #[must_use]
    pub fn from_orthographic(center: Vec2, orthographic_size: f32, aspect: f32) -> Self {
        Self::new(
            center,
            Vec2::new(orthographic_size * aspect, orthographic_size),
        )
    }

    /// Centre of the view.
    #[must_use]
    pub const fn center(&self) -> Vec2 {
        self.center
    }

    /// Half width and half height of the view.
    #[must_use]
    pub const fn half_extents(&self) -> Vec2 {
        self.half_extents
    }

    /// Reports whether the point lies within the view grown by `padding`.
    ///
    /// `padding` is a fraction of the view size, so `0.05` accepts points up
    /// to five percent beyond each edge.
    #[must_use]
    pub fn contains(&self, point: Vec2, padding: f32) -> bool {
        let size = self.half_extents * 2.0;
        if size.x <= 0.0 || size.y <= 0.0 {
            return false;
        }

        let viewport = (point - (self.center - self.half_extents)) / size;
        let low = -padding;
        let high = 1.0 + padding;
        viewport.x >= low && viewport.x <= high && viewport.y >= low && viewport.y <= high
    }
}

/// Read-only snapshot of everything spawn placement depends on.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpawnFrame {
    /// Visible camera rectangle, if a camera is available.
    pub camera: Option<CameraView>,
    /// Player position the fallback spawn circle centres on.
    pub focus: Vec2,
}
