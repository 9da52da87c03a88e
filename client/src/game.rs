use log::{debug, info, warn};
use shared::{
    AsteroidState, ClientPacket, ControlState, LaserState, PlayField, ServerPacket, Ship,
    ShipState, Winner, RELOAD_DURATION, SLOT_COUNT,
};

/// What the client is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Handshake not yet acknowledged.
    Connecting,
    Waiting { connected_count: usize },
    Playing,
    /// Held until the player asks for a restart.
    GameOver {
        scores: [u32; SLOT_COUNT],
        winner: Winner,
    },
}

/// Values a HUD needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HudState {
    pub hp: i32,
    pub shots: u32,
    pub scores: [u32; SLOT_COUNT],
    pub time_left: u32,
    /// 0.0 to 1.0 while reloading.
    pub reload_progress: Option<f32>,
    pub respawning: bool,
    pub phase: ClientPhase,
}

/// Client-side view of the match
///
/// The own ship is predicted locally every frame and overwritten by each
/// snapshot (last write wins, no blending). Everything else is a plain copy
/// of the latest snapshot.
#[derive(Debug)]
pub struct ClientGameState {
    pub slot: usize,
    pub own: Ship,
    pub opponent: Option<ShipState>,
    pub asteroids: Vec<AsteroidState>,
    pub lasers: Vec<LaserState>,
    pub scores: [u32; SLOT_COUNT],
    pub time_left: u32,
    phase: ClientPhase,
    reload_started_at: Option<f64>,
    field: PlayField,
}

impl ClientGameState {
    pub fn new(slot: usize, now: f64) -> Self {
        let field = PlayField::default();
        Self {
            slot,
            own: Ship::new(slot, &field, now),
            opponent: None,
            asteroids: Vec::new(),
            lasers: Vec::new(),
            scores: [0; SLOT_COUNT],
            time_left: 0,
            phase: ClientPhase::Connecting,
            reload_started_at: None,
            field,
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// Moves the own ship for one frame and returns the pose report for the
    /// server. Nothing moves while the game-over screen is up.
    pub fn predict(&mut self, controls: &ControlState, now: f64) -> Option<ClientPacket> {
        if matches!(self.phase, ClientPhase::GameOver { .. }) {
            return None;
        }

        self.own.step(controls, now, &self.field);
        Some(ClientPacket::UpdatePosition {
            pos: self.own.position,
            angle: self.own.angle,
        })
    }

    /// Folds one server message into the local view.
    pub fn apply_server_packet(&mut self, packet: ServerPacket, now: f64) {
        match packet {
            ServerPacket::Accepted { slot_id } => {
                if slot_id != self.slot {
                    warn!("Server accepted slot {} but we asked for {}", slot_id, self.slot);
                }
                if self.phase == ClientPhase::Connecting {
                    self.phase = ClientPhase::Waiting { connected_count: 1 };
                }
            }

            ServerPacket::Rejected { reason } => {
                warn!("Server rejected us: {}", reason);
                self.phase = ClientPhase::Connecting;
            }

            ServerPacket::WaitingForPlayers { connected_count } => {
                if !matches!(self.phase, ClientPhase::GameOver { .. }) {
                    self.phase = ClientPhase::Waiting { connected_count };
                }
            }

            ServerPacket::UpdateState {
                ships,
                asteroids,
                lasers,
                score,
                time_left,
            } => {
                for ship in &ships {
                    if ship.id == self.slot {
                        self.reconcile_own(ship, now);
                    }
                }
                self.opponent = ships.into_iter().find(|ship| ship.id != self.slot);
                self.asteroids = asteroids;
                self.lasers = lasers;
                self.scores = score;
                self.time_left = time_left;

                if !matches!(self.phase, ClientPhase::GameOver { .. }) {
                    if self.phase != ClientPhase::Playing {
                        info!("Match running");
                    }
                    self.phase = ClientPhase::Playing;
                }
            }

            ServerPacket::GameOver { scores, winner } => {
                info!(
                    "Game over: {} (P1={}, P2={})",
                    winner.label(),
                    scores[0],
                    scores[1]
                );
                self.scores = scores;
                self.time_left = 0;
                self.phase = ClientPhase::GameOver { scores, winner };
            }
        }
    }

    fn reconcile_own(&mut self, state: &ShipState, now: f64) {
        if state.is_reloading && !self.own.is_reloading {
            self.reload_started_at = Some(now);
            self.own.reload_started_at = now;
        }
        if !state.is_reloading {
            self.reload_started_at = None;
        }
        if state.is_respawning && !self.own.is_respawning {
            debug!("Own ship destroyed");
            self.own.respawn_started_at = now;
        }

        self.own.hp = state.hp;
        self.own.shots = state.shots;
        self.own.position = state.pos;
        self.own.angle = state.angle;
        self.own.is_respawning = state.is_respawning;
        self.own.is_reloading = state.is_reloading;
    }

    /// Leaves the game-over screen and returns the restart intent.
    pub fn request_restart(&mut self, now: f64) -> ClientPacket {
        self.own.reset(now);
        self.reload_started_at = None;
        self.scores = [0; SLOT_COUNT];
        self.phase = ClientPhase::Playing;
        ClientPacket::Restart {}
    }

    /// Fraction of the reload completed, if one is in progress.
    pub fn reload_progress(&self, now: f64) -> Option<f32> {
        if !self.own.is_reloading {
            return None;
        }
        let started = self.reload_started_at?;
        Some(((now - started) / RELOAD_DURATION).clamp(0.0, 1.0) as f32)
    }

    pub fn hud(&self, now: f64) -> HudState {
        HudState {
            hp: self.own.hp,
            shots: self.own.shots,
            scores: self.scores,
            time_left: self.time_left,
            reload_progress: self.reload_progress(now),
            respawning: self.own.is_respawning,
            phase: self.phase,
        }
    }
}
