//! Membership set of live hostile actors answering nearest-neighbour queries.

use std::collections::HashMap;

use glam::Vec2;
use horde_survival_core::{Handle, InstanceId};

/// Registered actor together with its last known position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegisteredActor {
    /// Incarnation that was registered.
    pub handle: Handle,
    /// Last position reported for the actor.
    pub position: Vec2,
}

/// Registered actors kept in registration order; exact distance ties resolve
/// to the earliest registration still present.
#[derive(Debug, Default)]
pub struct SpatialRegistry {
    entries: Vec<RegisteredActor>,
    slots: HashMap<InstanceId, usize>,
}

impl SpatialRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the actor to the set.
    ///
    /// Returns `false` when the instance was already registered, in which case
    /// its entry is overwritten with the new handle and position.
    pub fn register(&mut self, handle: Handle, position: Vec2) -> bool {
        let entry = RegisteredActor { handle, position };
        if let Some(&index) = self.slots.get(&handle.instance()) {
            self.entries[index] = entry;
            return false;
        }

        let _ = self.slots.insert(handle.instance(), self.entries.len());
        self.entries.push(entry);
        true
    }

    /// Removes the instance from the set, returning the handle it held.
    pub fn unregister(&mut self, instance: InstanceId) -> Option<Handle> {
        let index = self.slots.remove(&instance)?;
        let removed = self.entries.remove(index);
        for (offset, shifted) in self.entries[index..].iter().enumerate() {
            let _ = self.slots.insert(shifted.handle.instance(), index + offset);
        }
        Some(removed.handle)
    }

    /// Updates the position of a registered incarnation.
    ///
    /// Stale handles are ignored and reported as `false`.
    pub fn update(&mut self, handle: Handle, position: Vec2) -> bool {
        let Some(&index) = self.slots.get(&handle.instance()) else {
            return false;
        };
        let entry = &mut self.entries[index];
        if entry.handle != handle {
            return false;
        }
        entry.position = position;
        true
    }

    /// Reports whether the instance is registered.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn contains(&self, instance: InstanceId) -> bool {
        self.slots.contains_key(&instance)
    }

    /// Number of registered actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no actor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every registered actor.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.clear();
    }

    /// Iterator over registered actors in registration order.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &RegisteredActor> {
        self.entries.iter()
    }

    /// Finds the valid actor closest to `from`.
    ///
    /// `max_radius` of `None` searches without limit. Actors rejected by
    /// `is_valid` are skipped as if absent.
    pub fn nearest<V>(&self, from: Vec2, max_radius: Option<f32>, is_valid: V) -> Option<RegisteredActor>
    where
        V: Fn(Handle) -> bool,
    {
        self.nearest_where(from, max_radius, is_valid, |_| true)
    }

    /// Finds the closest valid actor whose position satisfies `accept`.
    ///
    /// Single linear scan; among exact ties the first actor encountered wins.
    pub fn nearest_where<V, P>(
        &self,
        from: Vec2,
        max_radius: Option<f32>,
        is_valid: V,
        accept: P,
    ) -> Option<RegisteredActor>
    where
        V: Fn(Handle) -> bool,
        P: Fn(Vec2) -> bool,
    {
        let limit_sq = match max_radius {
            Some(radius) if radius < 0.0 => return None,
            Some(radius) => radius * radius,
            None => f32::INFINITY,
        };

        let mut best: Option<(f32, RegisteredActor)> = None;
        for entry in &self.entries {
            let distance_sq = entry.position.distance_squared(from);
            if distance_sq > limit_sq {
                continue;
            }
            if best.map_or(false, |(best_sq, _)| distance_sq >= best_sq) {
                continue;
            }
            if !is_valid(entry.handle) || !accept(entry.position) {
                continue;
            }
            best = Some((distance_sq, *entry));
        }

        best.map(|(_, entry)| entry)
    }
}
