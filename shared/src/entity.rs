//! Entity model: ships, asteroids and lasers.
//!
//! Everything here is pure state plus deterministic step functions. Time is
//! passed in as seconds on whatever monotonic clock the caller uses, which
//! keeps the rules testable without sleeping.

use crate::{
    ASTEROID_COLOR, ASTEROID_MAX_RADIUS, ASTEROID_MIN_RADIUS, ASTEROID_START_HP,
    INVINCIBILITY_DURATION, LASER_SPEED, RELOAD_DURATION, RESPAWN_DURATION, SHIP_RADIUS,
    SHIP_SPEED, SHIP_START_HP, SHIP_START_SHOTS, SHIP_TURN_RATE, SHOT_COOLDOWN, WORLD_HEIGHT,
    WORLD_WIDTH,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// 2D point or vector. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector for a heading in degrees. Screen space: y grows downward,
    /// so positive angles turn counter-clockwise on screen.
    pub fn heading(angle_degrees: f32) -> Self {
        let radians = angle_degrees.to_radians();
        Self::new(radians.cos(), -radians.sin())
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f32; 2]> for Vec2 {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Vec2> for [f32; 2] {
    fn from(v: Vec2) -> Self {
        [v.x, v.y]
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

/// Dimensions of the play field.
///
/// Ships and asteroids live on a torus of this size; lasers do not wrap and
/// die once they leave it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayField {
    pub width: f32,
    pub height: f32,
}

impl PlayField {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Wraps a point into `[0, width) x [0, height)`.
    pub fn wrap(&self, point: Vec2) -> Vec2 {
        Vec2::new(wrap_axis(point.x, self.width), wrap_axis(point.y, self.height))
    }

    /// Closed bounds check, `[0, width] x [0, height]`.
    pub fn contains(&self, point: Vec2) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}

impl Default for PlayField {
    fn default() -> Self {
        Self::new(WORLD_WIDTH, WORLD_HEIGHT)
    }
}

fn wrap_axis(value: f32, extent: f32) -> f32 {
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

/// Movement intent for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub turn_left: bool,
    pub turn_right: bool,
    pub forward: bool,
    pub backward: bool,
    pub shoot: bool,
}

/// Timer transitions reported by [`Ship::tick_timers`] and [`Ship::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipEvent {
    Reloaded,
    Respawned,
}

/// A player's ship. Each slot owns exactly one for the lifetime of a match.
#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    pub slot: usize,
    pub position: Vec2,
    /// Heading in degrees, kept in `[0, 360)` when turned locally.
    pub angle: f32,
    pub hp: i32,
    pub shots: u32,
    pub is_reloading: bool,
    pub reload_started_at: f64,
    pub last_shot_at: Option<f64>,
    pub is_respawning: bool,
    pub respawn_started_at: f64,
    pub invincible_until: f64,
    spawn_position: Vec2,
    spawn_angle: f32,
}

impl Ship {
    /// Creates the ship for `slot` at its fixed spawn pose, invincible for
    /// the grace window starting at `now`.
    pub fn new(slot: usize, field: &PlayField, now: f64) -> Self {
        let (spawn_position, spawn_angle) = Self::spawn_pose(slot, field);
        Self {
            slot,
            position: spawn_position,
            angle: spawn_angle,
            hp: SHIP_START_HP,
            shots: SHIP_START_SHOTS,
            is_reloading: false,
            reload_started_at: 0.0,
            last_shot_at: None,
            is_respawning: false,
            respawn_started_at: 0.0,
            invincible_until: now + INVINCIBILITY_DURATION,
            spawn_position,
            spawn_angle,
        }
    }

    /// Slot 0 starts top-left facing right, slot 1 bottom-right facing left.
    pub fn spawn_pose(slot: usize, field: &PlayField) -> (Vec2, f32) {
        if slot == 0 {
            (Vec2::new(field.width * 0.2, field.height * 0.2), 0.0)
        } else {
            (Vec2::new(field.width * 0.8, field.height * 0.8), 180.0)
        }
    }

    pub fn radius(&self) -> f32 {
        SHIP_RADIUS
    }

    /// Restores hp, ammo and spawn pose and re-arms invincibility.
    pub fn reset(&mut self, now: f64) {
        self.hp = SHIP_START_HP;
        self.shots = SHIP_START_SHOTS;
        self.is_reloading = false;
        self.last_shot_at = None;
        self.is_respawning = false;
        self.position = self.spawn_position;
        self.angle = self.spawn_angle;
        self.invincible_until = now + INVINCIBILITY_DURATION;
    }

    pub fn is_invincible(&self, now: f64) -> bool {
        now < self.invincible_until
    }

    /// True when a hit at `now` would cost hp.
    pub fn is_vulnerable(&self, now: f64) -> bool {
        !self.is_respawning && !self.is_invincible(now)
    }

    /// Applies one point of damage. Returns `false` without touching the
    /// ship while it is respawning or inside its invincibility window.
    pub fn take_damage(&mut self, now: f64) -> bool {
        if !self.is_vulnerable(now) {
            return false;
        }

        self.hp = (self.hp - 1).max(0);
        self.invincible_until = now + INVINCIBILITY_DURATION;
        if self.hp == 0 {
            self.is_respawning = true;
            self.respawn_started_at = now;
        }
        true
    }

    /// Fires a laser from the ship's nose if ammo, reload, respawn and the
    /// per-shot cooldown allow it. The last round starts a reload.
    pub fn try_shoot(&mut self, now: f64) -> Option<Laser> {
        if self.is_respawning || self.is_reloading || self.shots == 0 {
            return None;
        }
        if let Some(last) = self.last_shot_at {
            if now - last < SHOT_COOLDOWN {
                return None;
            }
        }

        self.shots -= 1;
        self.last_shot_at = Some(now);
        if self.shots == 0 {
            self.is_reloading = true;
            self.reload_started_at = now;
        }

        let nose = self.position + Vec2::heading(self.angle) * self.radius();
        Some(Laser::fire(nose, self.angle, self.slot))
    }

    /// Applies a client-reported pose. Ignored while respawning.
    pub fn set_pose(&mut self, position: Vec2, angle: f32, field: &PlayField) {
        if self.is_respawning {
            return;
        }
        self.position = field.wrap(position);
        self.angle = angle.rem_euclid(360.0);
    }

    /// Advances reload and respawn timers without moving the ship.
    pub fn tick_timers(&mut self, now: f64) -> Option<ShipEvent> {
        if self.is_respawning {
            if now - self.respawn_started_at > RESPAWN_DURATION {
                self.reset(now);
                return Some(ShipEvent::Respawned);
            }
            return None;
        }

        if self.is_reloading && now - self.reload_started_at >= RELOAD_DURATION {
            self.is_reloading = false;
            self.shots = SHIP_START_SHOTS;
            return Some(ShipEvent::Reloaded);
        }
        None
    }

    /// One frame of local motion: turn, thrust along the heading, wrap, then
    /// advance timers. A respawning ship only waits out its respawn window.
    pub fn step(&mut self, controls: &ControlState, now: f64, field: &PlayField) -> Option<ShipEvent> {
        if self.is_respawning {
            return self.tick_timers(now);
        }

        if controls.turn_left {
            self.angle += SHIP_TURN_RATE;
        }
        if controls.turn_right {
            self.angle -= SHIP_TURN_RATE;
        }
        self.angle = self.angle.rem_euclid(360.0);

        let delta = Vec2::heading(self.angle) * SHIP_SPEED;
        if controls.forward {
            self.position += delta;
        }
        if controls.backward {
            self.position -= delta;
        }
        self.position = field.wrap(self.position);

        self.tick_timers(now)
    }
}

/// A drifting hazard. Destroyed when its hp reaches zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Asteroid {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub hp: i32,
    pub color: [u8; 3],
}

impl Asteroid {
    pub fn new(position: Vec2, velocity: Vec2, radius: f32) -> Self {
        Self {
            position,
            velocity,
            radius,
            hp: ASTEROID_START_HP,
            color: ASTEROID_COLOR,
        }
    }

    /// Random asteroid anywhere on the field. Smaller rocks move faster.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, field: &PlayField) -> Self {
        let radius = rng.gen_range(ASTEROID_MIN_RADIUS..=ASTEROID_MAX_RADIUS) as f32;
        let speed = Self::speed_for_radius(radius);
        let vx = if rng.gen_bool(0.5) { speed } else { -speed };
        let vy = if rng.gen_bool(0.5) { speed } else { -speed };
        let position = Vec2::new(rng.gen_range(0.0..field.width), rng.gen_range(0.0..field.height));
        Self::new(position, Vec2::new(vx, vy), radius)
    }

    /// Pixels per tick along each axis.
    pub fn speed_for_radius(radius: f32) -> f32 {
        (60.0 / radius).max(1.0)
    }

    pub fn step(&mut self, field: &PlayField) {
        self.position = field.wrap(self.position + self.velocity);
    }

    pub fn is_destroyed(&self) -> bool {
        self.hp <= 0
    }
}

/// A projectile. Leaves the match when it exits the field or hits something.
#[derive(Debug, Clone, PartialEq)]
pub struct Laser {
    pub position: Vec2,
    pub velocity: Vec2,
    pub owner: usize,
}

impl Laser {
    pub fn fire(origin: Vec2, angle_degrees: f32, owner: usize) -> Self {
        Self {
            position: origin,
            velocity: Vec2::heading(angle_degrees) * LASER_SPEED,
            owner,
        }
    }

    /// Moves the laser. Returns `false` once it is outside the field.
    pub fn step(&mut self, field: &PlayField) -> bool {
        self.position += self.velocity;
        field.contains(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn field() -> PlayField {
        PlayField::default()
    }

    #[test]
    fn test_vec2_serializes_as_pair() {
        let json = serde_json::to_string(&Vec2::new(1.5, -2.0)).unwrap();
        assert_eq!(json, "[1.5,-2.0]");
        let back: Vec2 = serde_json::from_str("[3,4]").unwrap();
        assert_eq!(back, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_heading_points_up_for_ninety_degrees() {
        let up = Vec2::heading(90.0);
        assert_approx_eq!(up.x, 0.0, 1e-6);
        assert_approx_eq!(up.y, -1.0, 1e-6);
    }

    #[test]
    fn test_wrap_handles_negative_and_overflow() {
        let f = field();
        let wrapped = f.wrap(Vec2::new(-10.0, 610.0));
        assert_approx_eq!(wrapped.x, 790.0, 1e-4);
        assert_approx_eq!(wrapped.y, 10.0, 1e-4);

        let edge = f.wrap(Vec2::new(-1e-9, 600.0));
        assert!(edge.x >= 0.0 && edge.x < f.width);
        assert_eq!(edge.y, 0.0);
    }

    #[test]
    fn test_ship_spawn_poses() {
        let f = field();
        let ship0 = Ship::new(0, &f, 0.0);
        let ship1 = Ship::new(1, &f, 0.0);

        assert_approx_eq!(ship0.position.x, 160.0, 1e-3);
        assert_approx_eq!(ship0.position.y, 120.0, 1e-3);
        assert_eq!(ship0.angle, 0.0);
        assert_approx_eq!(ship1.position.x, 640.0, 1e-3);
        assert_approx_eq!(ship1.position.y, 480.0, 1e-3);
        assert_eq!(ship1.angle, 180.0);
        assert_eq!(ship0.hp, SHIP_START_HP);
        assert_eq!(ship0.shots, SHIP_START_SHOTS);
        assert!(ship0.is_invincible(0.5));
        assert!(!ship0.is_invincible(0.6));
    }

    #[test]
    fn test_ship_step_moves_forward_and_turns() {
        let f = field();
        let mut ship = Ship::new(0, &f, 0.0);
        let start = ship.position;

        let forward = ControlState {
            forward: true,
            ..Default::default()
        };
        ship.step(&forward, 1.0, &f);
        assert_approx_eq!(ship.position.x, start.x + SHIP_SPEED, 1e-4);
        assert_approx_eq!(ship.position.y, start.y, 1e-4);

        let left = ControlState {
            turn_left: true,
            ..Default::default()
        };
        ship.step(&left, 1.0, &f);
        assert_approx_eq!(ship.angle, SHIP_TURN_RATE, 1e-4);

        let right = ControlState {
            turn_right: true,
            ..Default::default()
        };
        ship.step(&right, 1.0, &f);
        ship.step(&right, 1.0, &f);
        assert_approx_eq!(ship.angle, 360.0 - SHIP_TURN_RATE, 1e-4);
    }

    #[test]
    fn test_ship_step_wraps_position() {
        let f = field();
        let mut ship = Ship::new(0, &f, 0.0);
        ship.position = Vec2::new(f.width - 1.0, 10.0);
        let forward = ControlState {
            forward: true,
            ..Default::default()
        };

        ship.step(&forward, 1.0, &f);

        assert!(ship.position.x >= 0.0 && ship.position.x < f.width);
        assert_approx_eq!(ship.position.x, SHIP_SPEED - 1.0, 1e-3);
    }

    #[test]
    fn test_respawning_ship_ignores_controls() {
        let f = field();
        let mut ship = Ship::new(0, &f, 0.0);
        ship.hp = 1;
        assert!(ship.take_damage(1.0));
        assert!(ship.is_respawning);

        let before = ship.position;
        let controls = ControlState {
            forward: true,
            turn_left: true,
            ..Default::default()
        };
        assert_eq!(ship.step(&controls, 1.5, &f), None);
        assert_eq!(ship.position, before);
    }

    #[test]
    fn test_damage_ignored_during_invincibility() {
        let f = field();
        let mut ship = Ship::new(1, &f, 0.0);

        for _ in 0..5 {
            assert!(!ship.take_damage(0.3));
        }
        assert_eq!(ship.hp, SHIP_START_HP);

        assert!(ship.take_damage(1.0));
        assert_eq!(ship.hp, SHIP_START_HP - 1);
        // a second hit in the same tick lands inside the new window
        assert!(!ship.take_damage(1.0));
        assert!(!ship.take_damage(1.55));
        assert_eq!(ship.hp, SHIP_START_HP - 1);
        assert!(ship.take_damage(1.7));
    }

    #[test]
    fn test_destruction_triggers_single_respawn_cycle() {
        let f = field();
        let mut ship = Ship::new(0, &f, 0.0);
        ship.position = Vec2::new(10.0, 10.0);

        let mut now = 1.0;
        while ship.hp > 0 {
            ship.take_damage(now);
            now += 1.0;
        }
        assert_eq!(ship.hp, 0);
        assert!(ship.is_respawning);
        let died_at = ship.respawn_started_at;

        // further hits do nothing and do not restart the window
        assert!(!ship.take_damage(died_at + 1.0));
        assert_eq!(ship.hp, 0);
        assert_eq!(ship.respawn_started_at, died_at);

        let mut resets = 0;
        let mut t = died_at;
        while t < died_at + 4.0 {
            if ship.tick_timers(t) == Some(ShipEvent::Respawned) {
                resets += 1;
            }
            t += 1.0 / 60.0;
        }
        assert_eq!(resets, 1);
        assert_eq!(ship.hp, SHIP_START_HP);
        assert!(!ship.is_respawning);
        assert_eq!(ship.position, Ship::spawn_pose(0, &f).0);
    }

    #[test]
    fn test_shooting_empties_magazine_and_reloads() {
        let f = field();
        let mut ship = Ship::new(0, &f, 0.0);

        let mut now = 1.0;
        for _ in 0..SHIP_START_SHOTS {
            assert!(ship.try_shoot(now).is_some());
            now += SHOT_COOLDOWN + 0.01;
        }
        assert_eq!(ship.shots, 0);
        assert!(ship.is_reloading);
        assert!(ship.try_shoot(now).is_none());

        let reload_start = ship.reload_started_at;
        assert_eq!(ship.tick_timers(reload_start + 1.0), None);
        assert_eq!(
            ship.tick_timers(reload_start + RELOAD_DURATION + 0.01),
            Some(ShipEvent::Reloaded)
        );
        assert_eq!(ship.shots, SHIP_START_SHOTS);
        assert!(!ship.is_reloading);
    }

    #[test]
    fn test_shot_cooldown_blocks_rapid_fire() {
        let f = field();
        let mut ship = Ship::new(0, &f, 0.0);

        assert!(ship.try_shoot(1.0).is_some());
        assert!(ship.try_shoot(1.1).is_none());
        assert_eq!(ship.shots, SHIP_START_SHOTS - 1);
        assert!(ship.try_shoot(1.25).is_some());
    }

    #[test]
    fn test_laser_leaves_from_ship_nose() {
        let f = field();
        let mut ship = Ship::new(1, &f, 0.0);
        let laser = ship.try_shoot(1.0).unwrap();

        assert_eq!(laser.owner, 1);
        assert_approx_eq!(laser.position.x, ship.position.x - SHIP_RADIUS, 1e-3);
        assert_approx_eq!(laser.position.y, ship.position.y, 1e-3);
        assert_approx_eq!(laser.velocity.x, -LASER_SPEED, 1e-3);
    }

    #[test]
    fn test_laser_removed_when_leaving_field() {
        let f = field();
        let mut laser = Laser::fire(Vec2::new(f.width - 5.0, 100.0), 0.0, 0);

        assert!(!laser.step(&f));
        assert!(laser.position.x > f.width);

        let mut inside = Laser::fire(Vec2::new(100.0, 100.0), 90.0, 0);
        assert!(inside.step(&f));
    }

    #[test]
    fn test_asteroids_stay_on_torus() {
        let f = field();
        let mut rng = StdRng::seed_from_u64(7);
        let mut asteroids: Vec<Asteroid> = (0..50).map(|_| Asteroid::random(&mut rng, &f)).collect();

        for _ in 0..2_000 {
            for asteroid in &mut asteroids {
                asteroid.step(&f);
                assert!(asteroid.position.x >= 0.0 && asteroid.position.x < f.width);
                assert!(asteroid.position.y >= 0.0 && asteroid.position.y < f.height);
            }
        }
    }

    #[test]
    fn test_random_asteroid_ranges() {
        let f = field();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let asteroid = Asteroid::random(&mut rng, &f);
            assert!(asteroid.radius >= ASTEROID_MIN_RADIUS as f32);
            assert!(asteroid.radius <= ASTEROID_MAX_RADIUS as f32);
            assert_eq!(asteroid.hp, ASTEROID_START_HP);
            let speed = Asteroid::speed_for_radius(asteroid.radius);
            assert_approx_eq!(asteroid.velocity.x.abs(), speed, 1e-6);
            assert_approx_eq!(asteroid.velocity.y.abs(), speed, 1e-6);
        }

        assert!(Asteroid::speed_for_radius(20.0) > Asteroid::speed_for_radius(45.0));
    }
}
