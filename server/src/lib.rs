//! # Duel Server Library
//!
//! This library provides the authoritative server for the two-player asteroid
//! duel. It owns the canonical world, arbitrates every hit and score, and
//! streams the result to both players so their screens stay in agreement.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Asteroids, lasers, damage, respawns, reloads and the match clock are all
//! decided here. Clients report their own ship pose and intents; everything
//! else they render is a shadow of the server's snapshots.
//!
//! ### Session Management
//! Exactly two player slots exist. Handles the lifecycle of each slot:
//! - Handshake (`hello{slot_id}`) and slot claim, rejecting occupied slots
//! - Intent forwarding from each connection into the simulation loop
//! - Disconnect detection, keeping the ship and score for a reconnect
//!
//! ### State Broadcasting
//! Every tick the server broadcasts either a waiting notice (before the
//! first match) or the full world snapshot. The end of a match is announced
//! exactly once per connected slot.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! One task owns the session table and the world. Connection tasks never
//! touch shared state; they send [`network::ServerMessage`]s through an
//! unbounded queue, and the loop applies them in arrival order between
//! ticks. There are no locks around game state.
//!
//! ### TCP Line Protocol
//! Each client holds one TCP connection carrying newline-delimited JSON in
//! both directions (see `shared::protocol`). A malformed line is logged and
//! skipped without dropping the connection.
//!
//! ### Non-Blocking Fan-Out
//! Snapshots are encoded once per tick and pushed into each slot's bounded
//! writer queue without waiting. A slot whose queue is full misses that
//! frame, so a stalled peer cannot slow the tick for the other player.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Two-slot registry of live connections, keyed by connection id so stale
//! disconnect notices are harmless.
//!
//! ### Collision Module (`collision`)
//! Per-tick ship–asteroid, laser and optional ship–ship checks plus scoring.
//!
//! ### Config Module (`config`)
//! Server and match settings with validation.
//!
//! ### Game Module (`game`)
//! The world, match phases, intent handling and snapshot construction.
//!
//! ### Network Module (`network`)
//! Listener, per-connection reader/writer tasks and the main loop.
//!
//! ### Results Module (`results`)
//! Append-only text log of finished matches.
//!
//! ### Ticker Module (`ticker`)
//! Fixed-rate scheduling on absolute deadlines with drift tracking.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "0.0.0.0:12355".to_string(),
//!         ..Default::default()
//!     };
//!
//!     // Binds the listener; nothing is simulated until `run`
//!     let server = Server::bind(config).await?;
//!
//!     // Accepts players, ticks at 60Hz and broadcasts until the process ends
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod collision;
pub mod config;
pub mod game;
pub mod network;
pub mod results;
pub mod ticker;
