#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Auto-aim shooter firing pooled projectiles at the nearest hostile.

use std::time::Duration;

use glam::Vec2;
use horde_survival_core::{CameraView, Command, Event, Handle, PrototypeId, SpawnOrigin};
use horde_survival_world::query::HostileView;
use tracing::debug;

/// Capability of components whose cooldown can be forced to elapse.
pub trait ResettableCooldown {
    /// Makes the next action available immediately.
    fn reset_cooldown(&mut self);
}

/// Weapon parameters applied to the shooter on equip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShooterPreset {
    /// Projectile prototype fired by the weapon.
    pub bullet: PrototypeId,
    /// Speed handed to the projectile.
    pub bullet_speed: f32,
    /// Minimum time between two shots.
    pub fire_interval: Duration,
    /// Maximum distance of a target.
    pub detect_radius: f32,
}

impl ShooterPreset {
    /// Baseline pistol.
    #[must_use]
    pub const fn pistol(bullet: PrototypeId) -> Self {
        Self {
            bullet,
            bullet_speed: 18.0,
            fire_interval: Duration::from_millis(250),
            detect_radius: 15.0,
        }
    }

    /// Submachine gun firing roughly twice as fast as the pistol.
    #[must_use]
    pub const fn smg(bullet: PrototypeId) -> Self {
        Self {
            bullet,
            bullet_speed: 20.0,
            fire_interval: Duration::from_millis(120),
            detect_radius: 17.0,
        }
    }

    /// Rifle firing one and a half times as fast as the provided pistol.
    #[must_use]
    pub fn ak47(bullet: PrototypeId, pistol: &ShooterPreset) -> Self {
        Self {
            bullet,
            bullet_speed: 20.0,
            fire_interval: pistol.fire_interval.div_f32(1.5),
            detect_radius: 17.0,
        }
    }
}

/// Targeting and projectile lifetime settings of the shooter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AimConfig {
    /// Ignores targets outside the padded camera view.
    pub only_if_on_screen: bool,
    /// Viewport fraction a target may lie beyond the screen edge.
    pub screen_edge_padding: f32,
    /// Time a fired projectile stays in the world.
    pub bullet_lifetime: Duration,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            only_if_on_screen: true,
            screen_edge_padding: 0.05,
            bullet_lifetime: Duration::from_secs(3),
        }
    }
}

/// Projectile fired at a target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shot {
    /// Hostile the projectile was aimed at.
    pub target: Handle,
    /// Muzzle position.
    pub from: Vec2,
    /// Unit direction of travel.
    pub direction: Vec2,
    /// Speed of the projectile.
    pub speed: f32,
}

/// Pure system that fires at the nearest hostile whenever its cooldown allows.
#[derive(Debug)]
pub struct AutoAim {
    config: AimConfig,
    preset: Option<ShooterPreset>,
    timer: Duration,
    shots: u64,
    stopped: bool,
}

impl AutoAim {
    /// Creates an unarmed shooter.
    #[must_use]
    pub fn new(config: AimConfig) -> Self {
        Self {
            config,
            preset: None,
            timer: Duration::ZERO,
            shots: 0,
            stopped: false,
        }
    }

    /// Applies a weapon preset and makes the first shot immediate.
    pub fn equip(&mut self, preset: ShooterPreset) {
        debug!(?preset, "weapon equipped");
        self.preset = Some(preset);
        self.reset_cooldown();
    }

    /// Disarms the shooter.
    pub fn unequip(&mut self) {
        self.preset = None;
    }

    /// Weapon currently equipped.
    #[must_use]
    pub const fn preset(&self) -> Option<ShooterPreset> {
        self.preset
    }

    /// Projectiles fired so far.
    #[must_use]
    pub const fn shots(&self) -> u64 {
        self.shots
    }

    /// Consumes world events and fires at most one projectile.
    pub fn handle(
        &mut self,
        events: &[Event],
        shooter: Vec2,
        camera: Option<CameraView>,
        hostiles: &HostileView<'_>,
        out: &mut Vec<Command>,
    ) -> Option<Shot> {
        let mut elapsed = Duration::ZERO;
        let mut tick_observed = false;
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => {
                    elapsed = elapsed.saturating_add(*dt);
                    tick_observed = true;
                }
                Event::ActorSpawned {
                    actor,
                    origin: SpawnOrigin::Projectile,
                    ..
                } if !self.stopped && !self.config.bullet_lifetime.is_zero() => {
                    out.push(Command::ReleaseActor {
                        actor: *actor,
                        delay: self.config.bullet_lifetime,
                    });
                }
                Event::LevelTornDown { .. } => self.stopped = true,
                _ => {}
            }
        }

        if self.stopped || !tick_observed {
            return None;
        }
        let preset = self.preset?;

        self.timer = self.timer.saturating_add(elapsed).min(preset.fire_interval);
        if self.timer < preset.fire_interval {
            return None;
        }

        let padding = self.config.screen_edge_padding;
        let only_on_screen = self.config.only_if_on_screen;
        let target = hostiles.nearest_where(shooter, Some(preset.detect_radius), |position| {
            !only_on_screen || camera.map_or(true, |view| view.contains(position, padding))
        })?;

        let direction = (target.position - shooter).normalize_or_zero();
        out.push(Command::SpawnActor {
            prototype: preset.bullet,
            position: shooter,
            rotation: direction.y.atan2(direction.x),
            origin: SpawnOrigin::Projectile,
        });
        self.timer = Duration::ZERO;
        self.shots = self.shots.saturating_add(1);

        Some(Shot {
            target: target.handle,
            from: shooter,
            direction,
            speed: preset.bullet_speed,
        })
    }
}

impl ResettableCooldown for AutoAim {
    fn reset_cooldown(&mut self) {
        if let Some(preset) = self.preset {
            self.timer = preset.fire_interval;
        }
    }
}
