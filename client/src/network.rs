use crate::game::{ClientGameState, ClientPhase};
use crate::input::InputSource;
use log::{debug, error, info, warn};
use shared::{
    decode_line, encode_line, ClientPacket, ProtocolError, ServerPacket, DEFAULT_PORT,
    SLOT_COUNT,
};
use std::io;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] io::Error),

    #[error("server rejected the handshake: {0}")]
    Rejected(String),

    #[error("unexpected handshake reply: {0:?}")]
    UnexpectedReply(ServerPacket),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("server closed the connection")]
    Closed,

    #[error("gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub slot: usize,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub handshake_timeout: Duration,
    pub frame_rate: u32,
    /// Stop after this many frames. Runs until disconnected when `None`.
    pub max_frames: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            slot: 0,
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(5),
            frame_rate: 60,
            max_frames: None,
        }
    }
}

/// An accepted session: the write half plus decoded server messages
pub struct Connection {
    writer: OwnedWriteHalf,
    incoming: mpsc::UnboundedReceiver<ServerPacket>,
}

impl Connection {
    /// Connects, claims `slot` and waits for the server's verdict
    pub async fn open(config: &ClientConfig) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(&config.server_addr).await?;
        stream.set_nodelay(true)?;
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let hello = encode_line(&ClientPacket::Hello {
            slot_id: config.slot as i64,
        })?;
        writer.write_all(hello.as_bytes()).await?;

        let reply = match timeout(config.handshake_timeout, lines.next_line()).await {
            Err(_) => return Err(ClientError::HandshakeTimeout),
            Ok(Ok(Some(line))) => decode_line::<ServerPacket>(&line)?,
            Ok(Ok(None)) => return Err(ClientError::Closed),
            Ok(Err(e)) => return Err(e.into()),
        };

        match reply {
            ServerPacket::Accepted { slot_id } => info!("Connected as slot {}", slot_id),
            ServerPacket::Rejected { reason } => return Err(ClientError::Rejected(reason)),
            other => return Err(ClientError::UnexpectedReply(other)),
        }

        let (tx, incoming) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match decode_line::<ServerPacket>(&line) {
                            Ok(packet) => {
                                if tx.send(packet).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Discarding server line: {}", e),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading from server: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self { writer, incoming })
    }

    pub async fn send(&mut self, packet: &ClientPacket) -> Result<(), ClientError> {
        let line = encode_line(packet)?;
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Next server message; `None` once the server has gone away.
    pub async fn recv(&mut self) -> Option<ServerPacket> {
        self.incoming.recv().await
    }
}

/// Headless client: predicts its own ship, reports it every frame and
/// follows the server's snapshots
pub struct Client<I: InputSource> {
    config: ClientConfig,
    game_state: ClientGameState,
    input: I,
    epoch: Instant,
    frames: u64,
}

impl<I: InputSource> Client<I> {
    pub fn new(config: ClientConfig, input: I) -> Self {
        let slot = config.slot.min(SLOT_COUNT - 1);
        Self {
            config,
            game_state: ClientGameState::new(slot, 0.0),
            input,
            epoch: Instant::now(),
            frames: 0,
        }
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn finished(&self) -> bool {
        self.config.max_frames.is_some_and(|max| self.frames >= max)
    }

    /// Runs sessions until the frame budget is spent, reconnecting with a
    /// fixed delay after transport failures. A rejection is final.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let mut failures = 0;

        loop {
            match Connection::open(&self.config).await {
                Ok(connection) => {
                    failures = 0;
                    match self.session(connection).await {
                        Ok(()) => return Ok(()),
                        Err(e) => warn!("Session ended: {}", e),
                    }
                }
                Err(e @ ClientError::Rejected(_)) => return Err(e),
                Err(e) => warn!("Connection attempt failed: {}", e),
            }

            failures += 1;
            if failures > self.config.reconnect_attempts {
                return Err(ClientError::RetriesExhausted(self.config.reconnect_attempts));
            }
            info!(
                "Reconnecting in {:?} (attempt {}/{})",
                self.config.reconnect_delay, failures, self.config.reconnect_attempts
            );
            sleep(self.config.reconnect_delay).await;
        }
    }

    async fn session(&mut self, mut connection: Connection) -> Result<(), ClientError> {
        let now = self.now();
        self.game_state
            .apply_server_packet(ServerPacket::Accepted { slot_id: self.game_state.slot }, now);

        let period = Duration::from_secs_f64(1.0 / self.config.frame_rate.max(1) as f64);
        let mut frame_interval = interval(period);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_phase = self.game_state.phase();

        loop {
            tokio::select! {
                packet = connection.recv() => {
                    let Some(packet) = packet else {
                        return Err(ClientError::Closed);
                    };
                    let now = self.now();
                    self.game_state.apply_server_packet(packet, now);
                },

                _ = frame_interval.tick() => {
                    if self.finished() {
                        return Ok(());
                    }
                    self.frames += 1;

                    for packet in self.frame() {
                        connection.send(&packet).await?;
                    }
                },
            }

            let phase = self.game_state.phase();
            if phase != last_phase {
                info!("{:?}", phase);
                last_phase = phase;
            }
        }
    }

    /// Collects the intents for one frame
    fn frame(&mut self) -> Vec<ClientPacket> {
        let now = self.now();
        let input = self.input.poll();
        let mut packets = Vec::with_capacity(2);

        if input.restart && matches!(self.game_state.phase(), ClientPhase::GameOver { .. }) {
            packets.push(self.game_state.request_restart(now));
        }

        if let Some(pose) = self.game_state.predict(&input.controls, now) {
            packets.push(pose);
        }

        if input.controls.shoot && self.game_state.phase() == ClientPhase::Playing {
            packets.push(ClientPacket::Shoot {});
        }

        if self.frames % 300 == 0 {
            debug!("{:?}", self.game_state.hud(now));
        }

        packets
    }
}
