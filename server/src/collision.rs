//! Per-tick collision detection and scoring
//!
//! All checks are circle distance tests against the live entity sets. Order
//! matters and is fixed: ship–asteroid, then lasers (ships before
//! asteroids), then the optional ship–ship rule.

use shared::{Asteroid, Laser, Ship, SHIP_HALF_WIDTH, SLOT_COUNT};

/// Rule switches for a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionRules {
    pub ship_collisions: bool,
}

/// What one pass of [`resolve_collisions`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollisionReport {
    /// Hits that actually cost a ship hp.
    pub ship_hits: usize,
    /// Slots whose ship reached zero hp this pass.
    pub ships_destroyed: Vec<usize>,
    pub asteroids_destroyed: usize,
    pub lasers_spent: usize,
}

impl CollisionReport {
    pub fn is_empty(&self) -> bool {
        *self == CollisionReport::default()
    }
}

pub fn resolve_collisions(
    ships: &mut [Ship; SLOT_COUNT],
    asteroids: &mut Vec<Asteroid>,
    lasers: &mut Vec<Laser>,
    scores: &mut [u32; SLOT_COUNT],
    rules: CollisionRules,
    now: f64,
) -> CollisionReport {
    let mut report = CollisionReport::default();

    ship_asteroid_pass(ships, asteroids, &mut report, now);
    laser_pass(ships, asteroids, lasers, scores, &mut report, now);

    if rules.ship_collisions {
        ship_ship_pass(ships, scores, &mut report, now);
    }

    let before = asteroids.len();
    asteroids.retain(|asteroid| !asteroid.is_destroyed());
    report.asteroids_destroyed = before - asteroids.len();

    report
}

fn record_damage(ship: &Ship, report: &mut CollisionReport) {
    report.ship_hits += 1;
    if ship.is_respawning {
        report.ships_destroyed.push(ship.slot);
    }
}

fn ship_asteroid_pass(
    ships: &mut [Ship; SLOT_COUNT],
    asteroids: &mut [Asteroid],
    report: &mut CollisionReport,
    now: f64,
) {
    for ship in ships.iter_mut() {
        for asteroid in asteroids.iter_mut() {
            if ship.is_respawning {
                break;
            }
            if asteroid.is_destroyed() {
                continue;
            }
            if ship.position.distance(asteroid.position) < ship.radius() + asteroid.radius {
                asteroid.hp -= 1;
                if ship.take_damage(now) {
                    record_damage(ship, report);
                }
            }
        }
    }
}

fn laser_pass(
    ships: &mut [Ship; SLOT_COUNT],
    asteroids: &mut [Asteroid],
    lasers: &mut Vec<Laser>,
    scores: &mut [u32; SLOT_COUNT],
    report: &mut CollisionReport,
    now: f64,
) {
    let incoming = std::mem::take(lasers);

    for laser in incoming {
        let ship_hit = ships.iter_mut().find(|ship| {
            ship.slot != laser.owner
                && !ship.is_respawning
                && laser.position.distance(ship.position) < ship.radius()
        });

        if let Some(ship) = ship_hit {
            if ship.take_damage(now) {
                record_damage(ship, report);
                if let Some(score) = scores.get_mut(laser.owner) {
                    *score += 1;
                }
            }
            report.lasers_spent += 1;
            continue;
        }

        let asteroid_hit = asteroids.iter_mut().find(|asteroid| {
            !asteroid.is_destroyed() && laser.position.distance(asteroid.position) < asteroid.radius
        });

        match asteroid_hit {
            Some(asteroid) => {
                asteroid.hp -= 1;
                report.lasers_spent += 1;
            }
            None => lasers.push(laser),
        }
    }
}

fn ship_ship_pass(
    ships: &mut [Ship; SLOT_COUNT],
    scores: &mut [u32; SLOT_COUNT],
    report: &mut CollisionReport,
    now: f64,
) {
    let [first, second] = ships;
    if first.is_respawning || second.is_respawning {
        return;
    }

    let threshold = (SHIP_HALF_WIDTH + SHIP_HALF_WIDTH) / 2.0;
    if first.position.distance(second.position) >= threshold {
        return;
    }

    let first_hit = first.take_damage(now);
    let second_hit = second.take_damage(now);

    if first_hit {
        record_damage(first, report);
        if first.is_respawning {
            scores[second.slot] += 1;
        }
    }
    if second_hit {
        record_damage(second, report);
        if second.is_respawning {
            scores[first.slot] += 1;
        }
    }
}
