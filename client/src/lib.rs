//! # Duel Client Library
//!
//! This library provides the client side of the two-player asteroid duel:
//! a TCP session with the authoritative server, local prediction of the
//! player's own ship and a read-only shadow of everything else.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! The own ship is stepped locally every frame with the same
//! [`shared::Ship::step`] the server uses, and its pose is reported to the
//! server each frame. Input never waits for a round trip.
//!
//! ### Server Reconciliation
//! Every `update_state` snapshot overwrites the own ship's authoritative
//! fields (hp, ammo, pose, respawn and reload flags). The last snapshot
//! wins; there is no blending or input replay.
//!
//! ### Reconnects
//! Transport failures are retried a fixed number of times with a fixed
//! delay. A `rejected` handshake is final.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Predicted own ship, server shadow, match phase and HUD values.
//!
//! ### Input Module (`input`)
//! The [`input::InputSource`] seam plus idle and scripted sources.
//!
//! ### Network Module (`network`)
//! Handshake, reader task, frame loop and reconnect policy.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::IdleInput;
//! use client::network::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         server_addr: "127.0.0.1:12355".to_string(),
//!         slot: 1,
//!         ..Default::default()
//!     };
//!
//!     let mut client = Client::new(config, IdleInput);
//!     client.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
