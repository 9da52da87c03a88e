//! Line-delimited JSON wire protocol.
//!
//! Every message is one JSON object followed by `\n`. Client messages are
//! tagged with `action`, server messages with `event`; both carry their
//! fields under `payload`:
//!
//! ```text
//! {"action":"hello","payload":{"slot_id":0}}
//! {"event":"waiting_for_players","payload":{"connected_count":1}}
//! ```
//!
//! Tags decode into closed enums, so an unknown tag is a decode error at the
//! boundary rather than a silently ignored message.

use crate::entity::{Asteroid, Laser, Ship, Vec2};
use crate::SLOT_COUNT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Messages sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum ClientPacket {
    /// Mandatory first message claiming a slot.
    Hello { slot_id: i64 },
    /// Client-predicted pose of its own ship, sent every frame.
    UpdatePosition { pos: Vec2, angle: f32 },
    Shoot {},
    Restart {},
}

/// Messages sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerPacket {
    Accepted {
        slot_id: usize,
    },
    Rejected {
        reason: String,
    },
    UpdateState {
        ships: Vec<ShipState>,
        asteroids: Vec<AsteroidState>,
        lasers: Vec<LaserState>,
        score: [u32; SLOT_COUNT],
        time_left: u32,
    },
    WaitingForPlayers {
        connected_count: usize,
    },
    GameOver {
        scores: [u32; SLOT_COUNT],
        winner: Winner,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipState {
    pub id: usize,
    pub hp: i32,
    pub pos: Vec2,
    pub angle: f32,
    pub shots: u32,
    pub is_respawning: bool,
    pub is_reloading: bool,
}

impl From<&Ship> for ShipState {
    fn from(ship: &Ship) -> Self {
        Self {
            id: ship.slot,
            hp: ship.hp,
            pos: ship.position,
            angle: ship.angle,
            shots: ship.shots,
            is_respawning: ship.is_respawning,
            is_reloading: ship.is_reloading,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsteroidState {
    pub pos: Vec2,
    pub radius: f32,
    pub color: [u8; 3],
}

impl From<&Asteroid> for AsteroidState {
    fn from(asteroid: &Asteroid) -> Self {
        Self {
            pos: asteroid.position,
            radius: asteroid.radius,
            color: asteroid.color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserState {
    pub pos: Vec2,
    pub owner: usize,
}

impl From<&Laser> for LaserState {
    fn from(laser: &Laser) -> Self {
        Self {
            pos: laser.position,
            owner: laser.owner,
        }
    }
}

/// Match outcome. On the wire: 0 = draw, 1 = slot 0, 2 = slot 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Winner {
    Draw,
    First,
    Second,
}

impl Winner {
    pub fn from_scores(scores: [u32; SLOT_COUNT]) -> Self {
        match scores[0].cmp(&scores[1]) {
            std::cmp::Ordering::Greater => Winner::First,
            std::cmp::Ordering::Less => Winner::Second,
            std::cmp::Ordering::Equal => Winner::Draw,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Winner::Draw => 0,
            Winner::First => 1,
            Winner::Second => 2,
        }
    }

    /// Human-facing name, as shown to players and written to the results log.
    pub fn label(self) -> &'static str {
        match self {
            Winner::Draw => "Draw",
            Winner::First => "Player1",
            Winner::Second => "Player2",
        }
    }

    /// Winning slot, if any.
    pub fn slot(self) -> Option<usize> {
        match self {
            Winner::Draw => None,
            Winner::First => Some(0),
            Winner::Second => Some(1),
        }
    }
}

impl From<Winner> for u8 {
    fn from(winner: Winner) -> u8 {
        winner.code()
    }
}

impl TryFrom<u8> for Winner {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Winner::Draw),
            1 => Ok(Winner::First),
            2 => Ok(Winner::Second),
            other => Err(ProtocolError::InvalidWinner(other)),
        }
    }
}

/// Failure to encode or decode a single line.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    EmptyLine,

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid winner code {0}")]
    InvalidWinner(u8),
}

/// Reasons a connection is refused before it owns a slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("first message must be hello")]
    NotHello,

    #[error("invalid slot id {0}")]
    InvalidSlot(i64),

    #[error("slot {0} is already connected")]
    SlotTaken(usize),

    #[error("handshake timed out")]
    Timeout,

    #[error("connection closed before handshake")]
    Closed,

    #[error("server is not accepting players")]
    ServerUnavailable,
}

/// Serializes a message and appends the line delimiter.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decodes one line, with or without its trailing delimiter.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::EmptyLine);
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Checks a requested slot id against the fixed slot range.
pub fn validate_slot(slot_id: i64) -> Result<usize, HandshakeError> {
    match usize::try_from(slot_id) {
        Ok(slot) if slot < SLOT_COUNT => Ok(slot),
        _ => Err(HandshakeError::InvalidSlot(slot_id)),
    }
}

/// Interprets the first line of a connection as a slot claim.
pub fn parse_handshake(line: &str) -> Result<usize, HandshakeError> {
    match decode_line::<ClientPacket>(line) {
        Ok(ClientPacket::Hello { slot_id }) => validate_slot(slot_id),
        Ok(_) | Err(_) => Err(HandshakeError::NotHello),
    }
}
