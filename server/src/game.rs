use crate::collision::{resolve_collisions, CollisionReport, CollisionRules};
use crate::config::MatchConfig;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    Asteroid, AsteroidState, ClientPacket, Laser, LaserState, ServerPacket, Ship, ShipEvent,
    ShipState, Winner, SLOT_COUNT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Fewer than two players have ever been connected at once.
    Waiting,
    Running,
    /// Timer expired; the world is frozen until a restart.
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub scores: [u32; SLOT_COUNT],
    pub winner: Winner,
}

impl MatchResult {
    pub fn to_packet(&self) -> ServerPacket {
        ServerPacket::GameOver {
            scores: self.scores,
            winner: self.winner,
        }
    }
}

#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Set on the single tick where the match timer expires.
    pub finished: Option<MatchResult>,
    pub collisions: CollisionReport,
}

/// The authoritative world. Owned by the simulation loop and mutated only
/// from it.
#[derive(Debug)]
pub struct GameState {
    pub tick: u64,
    config: MatchConfig,
    pub ships: [Ship; SLOT_COUNT],
    pub asteroids: Vec<Asteroid>,
    pub lasers: Vec<Laser>,
    pub scores: [u32; SLOT_COUNT],
    phase: MatchPhase,
    started_at: f64,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: MatchConfig, now: f64) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let ships = [
            Ship::new(0, &config.field, now),
            Ship::new(1, &config.field, now),
        ];

        Self {
            tick: 0,
            config,
            ships,
            asteroids: Vec::new(),
            lasers: Vec::new(),
            scores: [0; SLOT_COUNT],
            phase: MatchPhase::Waiting,
            started_at: now,
            rng,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// True once the first match has begun. Never reverts.
    pub fn is_started(&self) -> bool {
        self.phase != MatchPhase::Waiting
    }

    /// Starts the first match. Returns false if one already started.
    pub fn start_match(&mut self, now: f64) -> bool {
        if self.is_started() {
            return false;
        }
        self.reset_world(now);
        self.phase = MatchPhase::Running;
        info!(
            "Match started ({}s, up to {} asteroids)",
            self.config.duration.as_secs(),
            self.config.max_asteroids
        );
        true
    }

    /// Resets timer, scores and world. Ignored before the first match.
    pub fn restart(&mut self, now: f64) -> bool {
        if !self.is_started() {
            debug!("Restart ignored, match has not started");
            return false;
        }
        self.reset_world(now);
        self.phase = MatchPhase::Running;
        info!("Match restarted");
        true
    }

    fn reset_world(&mut self, now: f64) {
        self.started_at = now;
        self.scores = [0; SLOT_COUNT];
        self.asteroids.clear();
        self.lasers.clear();
        for ship in &mut self.ships {
            ship.reset(now);
        }
    }

    /// Applies one client intent for `slot`, in arrival order.
    pub fn apply_command(&mut self, slot: usize, packet: ClientPacket, now: f64) {
        match packet {
            ClientPacket::UpdatePosition { pos, angle } => {
                if self.phase == MatchPhase::Ended {
                    return;
                }
                if !(pos.x.is_finite() && pos.y.is_finite() && angle.is_finite()) {
                    warn!("Slot {} sent a non-finite pose, ignoring", slot);
                    return;
                }
                let field = self.config.field;
                if let Some(ship) = self.ships.get_mut(slot) {
                    ship.set_pose(pos, angle, &field);
                }
            }
            ClientPacket::Shoot {} => {
                if self.phase != MatchPhase::Running {
                    return;
                }
                let Some(ship) = self.ships.get_mut(slot) else {
                    return;
                };
                match ship.try_shoot(now) {
                    Some(laser) => self.lasers.push(laser),
                    None => debug!(
                        "Slot {} shot refused (shots {}, reloading {}, respawning {})",
                        slot, ship.shots, ship.is_reloading, ship.is_respawning
                    ),
                }
            }
            ClientPacket::Restart {} => {
                info!("Slot {} requested restart", slot);
                self.restart(now);
            }
            ClientPacket::Hello { slot_id } => {
                warn!("Slot {} sent a repeated hello for slot {}, ignoring", slot, slot_id);
            }
        }
    }

    /// Advances the world by one tick. Does nothing unless running.
    pub fn tick(&mut self, now: f64) -> TickOutcome {
        self.tick += 1;
        if self.phase != MatchPhase::Running {
            return TickOutcome::default();
        }

        let field = self.config.field;

        while self.asteroids.len() < self.config.max_asteroids {
            self.asteroids.push(Asteroid::random(&mut self.rng, &field));
        }

        for asteroid in &mut self.asteroids {
            asteroid.step(&field);
        }
        self.lasers.retain_mut(|laser| laser.step(&field));

        let rules = CollisionRules {
            ship_collisions: self.config.ship_collisions,
        };
        let collisions = resolve_collisions(
            &mut self.ships,
            &mut self.asteroids,
            &mut self.lasers,
            &mut self.scores,
            rules,
            now,
        );
        if !collisions.is_empty() {
            debug!("Tick {}: {:?}", self.tick, collisions);
        }

        for ship in &mut self.ships {
            match ship.tick_timers(now) {
                Some(ShipEvent::Reloaded) => debug!("Slot {} reloaded", ship.slot),
                Some(ShipEvent::Respawned) => info!("Slot {} respawned", ship.slot),
                None => {}
            }
        }

        let mut finished = None;
        if now - self.started_at >= self.config.duration.as_secs_f64() {
            self.phase = MatchPhase::Ended;
            let result = MatchResult {
                scores: self.scores,
                winner: Winner::from_scores(self.scores),
            };
            info!(
                "Match over: {} (P1={}, P2={})",
                result.winner.label(),
                result.scores[0],
                result.scores[1]
            );
            finished = Some(result);
        }

        TickOutcome {
            finished,
            collisions,
        }
    }

    /// Whole seconds left on the match clock.
    pub fn time_left(&self, now: f64) -> u32 {
        let duration = self.config.duration.as_secs();
        match self.phase {
            MatchPhase::Waiting => duration as u32,
            MatchPhase::Ended => 0,
            MatchPhase::Running => {
                let elapsed = (now - self.started_at).max(0.0) as u64;
                duration.saturating_sub(elapsed) as u32
            }
        }
    }

    /// Per-tick broadcast: a waiting notice before the first match, the
    /// full world afterwards.
    pub fn snapshot(&self, now: f64, connected_count: usize) -> ServerPacket {
        if !self.is_started() {
            return ServerPacket::WaitingForPlayers { connected_count };
        }

        ServerPacket::UpdateState {
            ships: self.ships.iter().map(ShipState::from).collect(),
            asteroids: self.asteroids.iter().map(AsteroidState::from).collect(),
            lasers: self.lasers.iter().map(LaserState::from).collect(),
            score: self.scores,
            time_left: self.time_left(now),
        }
    }
}
