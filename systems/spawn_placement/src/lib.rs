#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spawn position selection shared by every system that spawns hostiles.
//!
//! Positions are chosen just outside one of the enabled screen edges, or on a
//! fixed circle around the player when no camera or edge is available.

use std::f32::consts::TAU;

use glam::Vec2;
use horde_survival_core::{CameraView, SpawnFrame};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tuning knobs controlling where spawns appear.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Allows spawns beyond the left screen edge.
    pub from_left: bool,
    /// Allows spawns beyond the right screen edge.
    pub from_right: bool,
    /// Allows spawns beyond the top screen edge.
    pub from_top: bool,
    /// Allows spawns beyond the bottom screen edge.
    pub from_bottom: bool,
    /// Distance outside the visible edge at which spawns appear.
    pub side_margin: f32,
    /// Distance kept from the corners along the spawning edge.
    pub edge_padding: f32,
    /// Radius of the fallback circle around the player.
    pub circle_radius: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            from_left: true,
            from_right: true,
            from_top: true,
            from_bottom: true,
            side_margin: 2.0,
            edge_padding: 0.5,
            circle_radius: 12.0,
        }
    }
}

/// Screen edge a spawn may appear beyond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Beyond the left edge.
    Left,
    /// Beyond the right edge.
    Right,
    /// Above the top edge.
    Top,
    /// Below the bottom edge.
    Bottom,
}

/// Picks spawn positions according to a [`PlacementConfig`].
#[derive(Clone, Debug)]
pub struct SpawnPlacer {
    config: PlacementConfig,
    edges: Vec<Edge>,
}

impl SpawnPlacer {
    /// Creates a placer for the provided configuration.
    #[must_use]
    pub fn new(config: PlacementConfig) -> Self {
        let edges = [
            (config.from_left, Edge::Left),
            (config.from_right, Edge::Right),
            (config.from_top, Edge::Top),
            (config.from_bottom, Edge::Bottom),
        ]
        .into_iter()
        .filter_map(|(enabled, edge)| enabled.then_some(edge))
        .collect();

        Self { config, edges }
    }

    /// Configuration the placer was built from.
    #[must_use]
    pub const fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Edges spawns may currently appear beyond.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Samples a spawn position for the provided frame.
    pub fn sample<R>(&self, frame: &SpawnFrame, rng: &mut R) -> Vec2
    where
        R: Rng + ?Sized,
    {
        match frame.camera {
            Some(camera) if !self.edges.is_empty() => self.sample_edge(&camera, rng),
            _ => self.sample_circle(frame.focus, rng),
        }
    }

    fn sample_edge<R>(&self, camera: &CameraView, rng: &mut R) -> Vec2
    where
        R: Rng + ?Sized,
    {
        let edge = self.edges[rng.gen_range(0..self.edges.len())];
        let center = camera.center();
        let half = camera.half_extents();
        let margin = self.config.side_margin;
        let padding = self.config.edge_padding;

        match edge {
            Edge::Left => Vec2::new(
                center.x - half.x - margin,
                uniform(rng, center.y - half.y + padding, center.y + half.y - padding),
            ),
            Edge::Right => Vec2::new(
                center.x + half.x + margin,
                uniform(rng, center.y - half.y + padding, center.y + half.y - padding),
            ),
            Edge::Top => Vec2::new(
                uniform(rng, center.x - half.x + padding, center.x + half.x - padding),
                center.y + half.y + margin,
            ),
            Edge::Bottom => Vec2::new(
                uniform(rng, center.x - half.x + padding, center.x + half.x - padding),
                center.y - half.y - margin,
            ),
        }
    }

    fn sample_circle<R>(&self, focus: Vec2, rng: &mut R) -> Vec2
    where
        R: Rng + ?Sized,
    {
        let angle = rng.gen_range(0.0..TAU);
        focus + Vec2::new(angle.cos(), angle.sin()) * self.config.circle_radius
    }
}

fn uniform<R>(rng: &mut R, low: f32, high: f32) -> f32
where
    R: Rng + ?Sized,
{
    if low < high {
        rng.gen_range(low..high)
    } else {
        (low + high) * 0.5
    }
}
