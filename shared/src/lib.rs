//! Types shared by the duel server and client: tuning constants, the entity
//! model and the line-delimited wire protocol.
//!
//! Both sides run the same [`Ship::step`] so that the client's local
//! prediction of its own ship matches what the server would compute.

pub mod entity;
pub mod protocol;

pub use entity::{Asteroid, ControlState, Laser, PlayField, Ship, ShipEvent, Vec2};
pub use protocol::{
    decode_line, encode_line, parse_handshake, validate_slot, AsteroidState, ClientPacket,
    HandshakeError, LaserState, ProtocolError, ServerPacket, ShipState, Winner,
};

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;

/// Number of player slots in a match.
pub const SLOT_COUNT: usize = 2;

pub const SHIP_RADIUS: f32 = 20.0;
/// Half of the ship sprite's width, used by the optional ship–ship rule.
pub const SHIP_HALF_WIDTH: f32 = 25.0;
/// Pixels per tick.
pub const SHIP_SPEED: f32 = 5.0;
/// Degrees per tick.
pub const SHIP_TURN_RATE: f32 = 5.0;
pub const SHIP_START_HP: i32 = 3;
pub const SHIP_START_SHOTS: u32 = 10;

pub const RELOAD_DURATION: f64 = 1.5;
pub const SHOT_COOLDOWN: f64 = 0.2;
pub const RESPAWN_DURATION: f64 = 2.0;
pub const INVINCIBILITY_DURATION: f64 = 0.6;

/// Pixels per tick.
pub const LASER_SPEED: f32 = 10.0;

pub const ASTEROID_MIN_RADIUS: u32 = 20;
pub const ASTEROID_MAX_RADIUS: u32 = 45;
pub const ASTEROID_START_HP: i32 = 1;
pub const ASTEROID_COLOR: [u8; 3] = [101, 101, 101];

pub const DEFAULT_PORT: u16 = 12355;
pub const DEFAULT_TICK_RATE: u32 = 60;
pub const DEFAULT_MATCH_DURATION: u32 = 60;
pub const DEFAULT_MAX_ASTEROIDS: usize = 10;
