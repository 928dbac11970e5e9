//! Generic recycler of actor instances keyed by prototype identity.
//!
//! The pool owns every `Free` instance. Acquisition moves an instance out of
//! its free-list and hands ownership to the caller, release moves it back.
//! Deferred releases are kept as timers on the pool's own clock so teardown
//! can cancel them in one place.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use glam::Vec2;
use horde_survival_core::{InstanceId, PrototypeDescriptor, PrototypeId};

/// Ownership state of a pooled instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceState {
    /// Owned by the pool, inert and detached from the simulated world.
    Free,
    /// Owned by the simulation, active and positioned in world space.
    Live,
}

/// Behaviour required from values managed by an [`InstancePool`].
pub trait Recyclable {
    /// Constructs a new inert instance of the prototype.
    fn instantiate(id: InstanceId, prototype: &PrototypeDescriptor) -> Self;

    /// Identifier of the instance.
    fn id(&self) -> InstanceId;

    /// Current ownership state of the instance.
    fn state(&self) -> InstanceState;

    /// Transitions the instance to `Live` at the provided placement.
    fn activate(&mut self, position: Vec2, rotation: f32);

    /// Transitions the instance back to `Free`.
    fn deactivate(&mut self);
}

/// Monotonic allocator for instance identifiers.
#[derive(Debug, Default)]
pub struct InstanceIds {
    next: u32,
}

impl InstanceIds {
    /// Creates an allocator whose first identifier is zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next unused identifier.
    pub fn allocate(&mut self) -> InstanceId {
        let id = InstanceId::new(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Result of handing an instance back to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reclaim {
    /// The instance was issued by the pool and returned to its free-list.
    Recycled(PrototypeId),
    /// The pool never issued the instance, so it was dropped.
    Disposed,
}

/// Result of scheduling a deferred release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseRequest {
    /// A timer was armed for the instance.
    Scheduled,
    /// A timer for the instance was already armed; the request was ignored.
    AlreadyPending,
}

/// Counters describing one prototype's instances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances waiting in the free-list.
    pub free: u32,
    /// Instances issued by the pool and not yet returned.
    pub live: u32,
    /// Instances ever constructed for the prototype.
    pub constructed: u32,
}

/// Summary of a pool teardown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Deferred releases that never fired.
    pub cancelled_releases: u32,
    /// Free instances that were destroyed.
    pub destroyed_free: u32,
}

#[derive(Debug)]
struct Bucket<T> {
    free: Vec<T>,
    live: u32,
    constructed: u32,
}

impl<T> Bucket<T> {
    fn new() -> Self {
        Self {
            free: Vec::new(),
            live: 0,
            constructed: 0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingRelease {
    instance: InstanceId,
    due_at: Duration,
    sequence: u64,
}

/// Recycler of instances keyed by prototype identity.
#[derive(Debug)]
pub struct InstancePool<T> {
    buckets: BTreeMap<PrototypeId, Bucket<T>>,
    issued: HashMap<InstanceId, PrototypeId>,
    pending: Vec<PendingRelease>,
    clock: Duration,
    sequence: u64,
}

impl<T> Default for InstancePool<T> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            issued: HashMap::new(),
            pending: Vec::new(),
            clock: Duration::ZERO,
            sequence: 0,
        }
    }
}

impl<T: Recyclable> InstancePool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` inert instances to the prototype's free-list.
    ///
    /// Repeated calls accumulate. Returns the number of instances constructed.
    pub fn prewarm(
        &mut self,
        prototype: &PrototypeDescriptor,
        count: u32,
        ids: &mut InstanceIds,
    ) -> u32 {
        if count == 0 {
            return 0;
        }

        let bucket = self
            .buckets
            .entry(prototype.id())
            .or_insert_with(Bucket::new);
        bucket.free.reserve(count as usize);
        for _ in 0..count {
            bucket.free.push(T::instantiate(ids.allocate(), prototype));
        }
        bucket.constructed = bucket.constructed.saturating_add(count);
        count
    }

    /// Takes an instance of the prototype out of the pool and makes it live.
    ///
    /// Pops the free-list when possible and constructs a new instance
    /// otherwise, so acquisition never fails for a valid prototype.
    pub fn acquire(
        &mut self,
        prototype: &PrototypeDescriptor,
        position: Vec2,
        rotation: f32,
        ids: &mut InstanceIds,
    ) -> T {
        let bucket = self
            .buckets
            .entry(prototype.id())
            .or_insert_with(Bucket::new);
        let mut instance = match bucket.free.pop() {
            Some(instance) => instance,
            None => {
                bucket.constructed = bucket.constructed.saturating_add(1);
                T::instantiate(ids.allocate(), prototype)
            }
        };
        bucket.live = bucket.live.saturating_add(1);

        instance.activate(position, rotation);
        let _ = self.issued.insert(instance.id(), prototype.id());
        instance
    }

    /// Reports whether the pool issued the instance and still expects it back.
    #[cfg(test)]
    pub(crate) fn is_tracked(&self, instance: InstanceId) -> bool {
        self.issued.contains_key(&instance)
    }

    /// Reports whether a deferred release is armed for the instance.
    #[must_use]
    pub fn is_release_pending(&self, instance: InstanceId) -> bool {
        self.pending.iter().any(|pending| pending.instance == instance)
    }

    /// Arms a timer that reports the instance as due after `delay`.
    pub fn schedule_release(&mut self, instance: InstanceId, delay: Duration) -> ReleaseRequest {
        if self.is_release_pending(instance) {
            return ReleaseRequest::AlreadyPending;
        }

        self.pending.push(PendingRelease {
            instance,
            due_at: self.clock.saturating_add(delay),
            sequence: self.sequence,
        });
        self.sequence = self.sequence.wrapping_add(1);
        ReleaseRequest::Scheduled
    }

    /// Advances the pool clock and drains the releases that became due.
    ///
    /// Due instances are returned ordered by due time, then by the order in
    /// which they were scheduled.
    pub fn advance(&mut self, dt: Duration) -> Vec<InstanceId> {
        self.clock = self.clock.saturating_add(dt);
        if self.pending.is_empty() {
            return Vec::new();
        }

        let clock = self.clock;
        let mut due: Vec<PendingRelease> = Vec::new();
        self.pending.retain(|pending| {
            if pending.due_at <= clock {
                due.push(*pending);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|pending| (pending.due_at, pending.sequence));
        due.into_iter().map(|pending| pending.instance).collect()
    }

    /// Hands an instance back to the pool.
    ///
    /// Instances the pool issued return to their free-list; anything else is
    /// dropped so foreign instances never leak.
    pub fn reclaim(&mut self, mut instance: T) -> Reclaim {
        self.pending
            .retain(|pending| pending.instance != instance.id());

        let Some(prototype) = self.issued.remove(&instance.id()) else {
            return Reclaim::Disposed;
        };

        instance.deactivate();
        let bucket = self.buckets.entry(prototype).or_insert_with(Bucket::new);
        bucket.live = bucket.live.saturating_sub(1);
        bucket.free.push(instance);
        Reclaim::Recycled(prototype)
    }

    /// Number of deferred releases currently armed.
    #[must_use]
    pub fn pending_releases(&self) -> usize {
        self.pending.len()
    }

    /// Counters for the prototype's instances.
    #[must_use]
    pub fn stats(&self, prototype: PrototypeId) -> PoolStats {
        self.buckets
            .get(&prototype)
            .map_or_else(PoolStats::default, |bucket| PoolStats {
                free: u32::try_from(bucket.free.len()).unwrap_or(u32::MAX),
                live: bucket.live,
                constructed: bucket.constructed,
            })
    }

    /// Cancels every pending release and destroys every free instance.
    ///
    /// Instances that are live at the time of teardown are forgotten; their
    /// owner is expected to drop them.
    pub fn teardown(&mut self) -> TeardownReport {
        let cancelled_releases = u32::try_from(self.pending.len()).unwrap_or(u32::MAX);
        let destroyed_free = self
            .buckets
            .values()
            .map(|bucket| u32::try_from(bucket.free.len()).unwrap_or(u32::MAX))
            .fold(0_u32, u32::saturating_add);

        self.pending.clear();
        self.buckets.clear();
        self.issued.clear();

        TeardownReport {
            cancelled_releases,
            destroyed_free,
        }
    }
}
