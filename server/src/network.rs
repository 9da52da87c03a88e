//! Server network layer handling TCP sessions and game loop coordination

use crate::client_manager::{ClientManager, ConnectionId, Delivery};
use crate::config::ServerConfig;
use crate::game::{GameState, MatchResult};
use crate::results::ResultLog;
use crate::ticker::FixedTicker;
use log::{debug, error, info, warn};
use shared::{decode_line, encode_line, parse_handshake, ClientPacket, HandshakeError, ServerPacket};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    /// Handshake succeeded on the wire; asks the loop for the slot.
    Claim {
        slot: usize,
        addr: SocketAddr,
        sender: mpsc::Sender<Arc<str>>,
        reply: oneshot::Sender<Result<ConnectionId, HandshakeError>>,
    },
    Packet {
        slot: usize,
        connection_id: ConnectionId,
        packet: ClientPacket,
    },
    Disconnected {
        slot: usize,
        connection_id: ConnectionId,
        reason: String,
    },
}

/// Per-connection limits copied into each connection task
#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    handshake_timeout: Duration,
    write_timeout: Duration,
    outgoing_buffer: usize,
    max_line_len: usize,
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            handshake_timeout: config.handshake_timeout,
            write_timeout: config.write_timeout,
            outgoing_buffer: config.outgoing_buffer.max(1),
            max_line_len: config.max_line_len.max(1),
        }
    }
}

/// Main server coordinating sessions and game simulation
///
/// The server loop is the only owner of the session table and the world.
/// Connection tasks reach it exclusively through `server_tx`.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    clients: ClientManager,
    game_state: GameState,
    results: Option<ResultLog>,
    epoch: Instant,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let epoch = Instant::now();
        let game_state = GameState::new(config.match_config.clone(), 0.0);
        let results = config.results_path.clone().map(ResultLog::new);

        Ok(Server {
            listener: Some(listener),
            local_addr,
            config,
            clients: ClientManager::new(),
            game_state,
            results,
            epoch,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Seconds since the server was bound; the clock every game rule uses.
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Spawns task that accepts connections and starts a session task for each
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();
        let settings = ConnectionSettings::from(&self.config);

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        tokio::spawn(handle_connection(stream, addr, server_tx.clone(), settings));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Processes one message from a connection task
    fn handle_message(&mut self, message: ServerMessage) {
        let now = self.now();

        match message {
            ServerMessage::Claim {
                slot,
                addr,
                sender,
                reply,
            } => {
                match self.clients.claim(slot, addr, sender) {
                    Ok(connection_id) => {
                        if let Some(line) = encode(&ServerPacket::Accepted { slot_id: slot }) {
                            self.clients.send_to(slot, line);
                        }
                        if reply.send(Ok(connection_id)).is_err() {
                            warn!("Connection for slot {} went away during handshake", slot);
                            self.clients.release(slot, connection_id);
                            return;
                        }

                        if self.clients.all_active() && self.game_state.start_match(now) {
                            info!("Both players connected");
                        }
                    }
                    Err(e) => {
                        info!("Rejected claim for slot {} from {}: {}", slot, addr, e);
                        let _ = reply.send(Err(e));
                    }
                }
            }

            ServerMessage::Packet {
                slot,
                connection_id,
                packet,
            } => {
                if self.clients.is_current(slot, connection_id) {
                    self.game_state.apply_command(slot, packet, now);
                } else {
                    debug!("Dropping packet from stale connection {} on slot {}", connection_id, slot);
                }
            }

            ServerMessage::Disconnected {
                slot,
                connection_id,
                reason,
            } => {
                if self.clients.release(slot, connection_id) {
                    info!("Slot {} disconnected: {}", slot, reason);
                }
            }
        }
    }

    /// Advances the simulation and fans the results out to every slot
    fn run_tick(&mut self) {
        let now = self.now();
        let outcome = self.game_state.tick(now);

        if let Some(result) = outcome.finished {
            if let Some(line) = encode(&result.to_packet()) {
                self.clients.broadcast(&line, Delivery::Reliable);
            }
            self.record_result(result);
        }

        let snapshot = self.game_state.snapshot(now, self.clients.connected_count());
        if let Some(line) = encode(&snapshot) {
            self.clients.broadcast(&line, Delivery::BestEffort);
        }
    }

    /// Appends to the results log off the simulation task
    fn record_result(&self, result: MatchResult) {
        let Some(log) = self.results.clone() else {
            return;
        };

        tokio::task::spawn_blocking(move || {
            if let Err(e) = log.append(&result) {
                error!("Failed to write result to {}: {}", log.path().display(), e);
            }
        });
    }

    /// Main server loop coordinating all operations
    pub async fn run(mut self) -> std::io::Result<()> {
        self.spawn_acceptor();

        let mut ticker = FixedTicker::new(
            self.config.tick_duration(),
            self.config.max_tick_lag,
            Instant::now(),
        );
        let report_every = u64::from(self.config.tick_rate) * 10;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle connection events
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = ticker.wait() => {
                    let timing = ticker.complete_tick(Instant::now());
                    if timing.resynced {
                        warn!(
                            "Tick loop fell {:?} behind, skipped {} ticks",
                            timing.lateness, timing.skipped
                        );
                    }

                    self.run_tick();

                    // Periodic performance monitoring
                    if ticker.ticks() % report_every == 0 {
                        debug!(
                            "Tick {}: {} clients, avg lateness {:?}, {} resyncs",
                            ticker.ticks(),
                            self.clients.connected_count(),
                            ticker.average_lateness(),
                            ticker.resyncs()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}

fn encode(packet: &ServerPacket) -> Option<Arc<str>> {
    match encode_line(packet) {
        Ok(line) => Some(Arc::from(line)),
        Err(e) => {
            error!("Failed to encode {:?}: {}", packet, e);
            None
        }
    }
}

/// Runs the handshake, then the session of one connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    settings: ConnectionSettings,
) {
    let _ = stream.set_nodelay(true);
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let max_line_len = settings.max_line_len;

    let (sender, outgoing) = mpsc::channel(settings.outgoing_buffer);
    let handshake = read_capped_line(&mut reader, max_line_len);
    let claimed = match timeout(settings.handshake_timeout, handshake).await {
        Err(_) => Err(HandshakeError::Timeout),
        Ok(Ok(Some(line))) => match parse_handshake(&line) {
            Ok(slot) => claim_slot(slot, addr, sender.clone(), &server_tx).await,
            Err(e) => Err(e),
        },
        Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
            debug!("Unreadable handshake from {}: {}", addr, e);
            Err(HandshakeError::NotHello)
        }
        Ok(Ok(None)) | Ok(Err(_)) => Err(HandshakeError::Closed),
    };

    let (slot, connection_id) = match claimed {
        Ok(claimed) => claimed,
        Err(e) => {
            info!("Handshake with {} failed: {}", addr, e);
            if e != HandshakeError::Closed {
                reject(&mut write_half, &e, settings.write_timeout).await;
            }
            let _ = write_half.shutdown().await;
            return;
        }
    };

    tokio::spawn(write_loop(write_half, outgoing, settings.write_timeout, slot));

    let reason = read_loop(reader, max_line_len, slot, connection_id, sender, &server_tx).await;
    let _ = server_tx.send(ServerMessage::Disconnected {
        slot,
        connection_id,
        reason,
    });
}

async fn claim_slot(
    slot: usize,
    addr: SocketAddr,
    sender: mpsc::Sender<Arc<str>>,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> Result<(usize, ConnectionId), HandshakeError> {
    let (reply, response) = oneshot::channel();
    server_tx
        .send(ServerMessage::Claim {
            slot,
            addr,
            sender,
            reply,
        })
        .map_err(|_| HandshakeError::ServerUnavailable)?;

    let connection_id = response
        .await
        .map_err(|_| HandshakeError::ServerUnavailable)??;
    Ok((slot, connection_id))
}

async fn reject(writer: &mut OwnedWriteHalf, error: &HandshakeError, write_timeout: Duration) {
    let packet = ServerPacket::Rejected {
        reason: error.to_string(),
    };
    let Some(line) = encode(&packet) else {
        return;
    };
    if let Ok(Err(e)) = timeout(write_timeout, writer.write_all(line.as_bytes())).await {
        debug!("Failed to send rejection: {}", e);
    }
}

/// Writes queued lines until the channel closes or a write fails
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outgoing: mpsc::Receiver<Arc<str>>,
    write_timeout: Duration,
    slot: usize,
) {
    while let Some(line) = outgoing.recv().await {
        match timeout(write_timeout, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Write to slot {} failed: {}", slot, e);
                break;
            }
            Err(_) => {
                warn!("Write to slot {} timed out after {:?}", slot, write_timeout);
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
}

/// Reads one `\n`-terminated line of at most `max_len` bytes, without the
/// terminator. A longer line fails with `InvalidData` instead of buffering
/// without bound. `Ok(None)` means the peer closed the stream.
async fn read_capped_line<R>(reader: &mut R, max_len: usize) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = max_len as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds {} bytes", max_len),
        ));
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Forwards decoded intents until the peer or the writer goes away.
/// Returns the reason the session ended.
async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    max_line_len: usize,
    slot: usize,
    connection_id: ConnectionId,
    outgoing: mpsc::Sender<Arc<str>>,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> String {
    loop {
        tokio::select! {
            line = read_capped_line(&mut reader, max_line_len) => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode_line::<ClientPacket>(&line) {
                        Ok(packet) => {
                            let message = ServerMessage::Packet { slot, connection_id, packet };
                            if server_tx.send(message).is_err() {
                                return "server stopped".to_string();
                            }
                        }
                        Err(e) => warn!("Discarding line from slot {}: {}", slot, e),
                    }
                }
                Ok(None) => return "connection closed".to_string(),
                Err(e) => return format!("read error: {}", e),
            },

            _ = outgoing.closed() => return "writer closed".to_string(),
        }
    }
}
