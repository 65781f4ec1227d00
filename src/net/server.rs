//! Room Server
//!
//! TCP frame server: accepts clients, first-fit assigns them to rooms,
//! starts full rooms with a shared random seed, ticks every playing room
//! at 20 Hz, broadcasts ServerFrames, serves FRAME_LOSS replays and
//! sweeps idle clients and empty rooms.
//!
//! Concurrency model: one accept loop, one task per connection (the sole
//! writer for its socket is a dedicated writer task fed by a channel),
//! one ticker task per playing room, one global sweeper. Rooms sit
//! behind their own mutex; the registry behind another. Lock order is
//! always registry before room, never the reverse.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::net::protocol::{
    read_packet, ConnectMsg, Packet, ProtocolError, ServerFrameMsg,
};
use crate::net::room::{Room, RoomClient, RoomStatus};
use crate::physics::layers::LayerMatrix;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Players per room; a full room starts playing.
    pub max_players: usize,
    /// Room tick interval (default 50 ms = 20 Hz).
    pub tick_interval: Duration,
    /// Rolling read deadline; expiry is non-fatal.
    pub read_timeout: Duration,
    /// Clients idle beyond this are disconnected by the sweeper.
    pub idle_timeout: Duration,
    /// Sweeper cadence.
    pub sweep_interval: Duration,
    /// Delay between a room filling and GAME_START.
    pub start_debounce: Duration,
    /// ServerFrames retained per room for FRAME_LOSS replay.
    pub history_limit: usize,
    /// Layer pairs installed into the boot collision matrix.
    pub ignored_layer_pairs: Vec<(u8, u8)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7777".parse().expect("static addr parses"),
            max_players: 2,
            tick_interval: Duration::from_millis(crate::TICK_INTERVAL_MS),
            read_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
            start_debounce: Duration::from_millis(500),
            history_limit: 600,
            ignored_layer_pairs: Vec::new(),
        }
    }
}

/// Server startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind the listen address.
    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

struct RegistryInner {
    rooms: BTreeMap<u64, Arc<Mutex<Room>>>,
    next_room_id: u64,
    next_player_id: u32,
}

/// The frame broadcaster.
pub struct FrameServer {
    config: ServerConfig,
    registry: Arc<Mutex<RegistryInner>>,
    boot_layers: LayerMatrix,
}

impl FrameServer {
    /// Create a server from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let mut boot_layers = LayerMatrix::new();
        for (a, b) in &config.ignored_layer_pairs {
            boot_layers.set_ignored(*a, *b);
        }
        Self {
            config,
            registry: Arc::new(Mutex::new(RegistryInner {
                rooms: BTreeMap::new(),
                next_room_id: 0,
                next_player_id: 0,
            })),
            boot_layers,
        }
    }

    /// Collision matrix built from the configured ignored pairs, for
    /// hosts that embed a simulation next to the server.
    pub fn boot_layers(&self) -> LayerMatrix {
        self.boot_layers
    }

    /// Bind and serve forever.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("frame server listening on {}", self.config.bind_addr);
        self.serve(listener).await;
        Ok(())
    }

    /// Serve on an already bound listener (tests bind to port 0 and pass
    /// the listener in).
    pub async fn serve(&self, listener: TcpListener) {
        let sweeper_registry = self.registry.clone();
        let sweeper_config = self.config.clone();
        tokio::spawn(async move {
            Self::run_sweeper(sweeper_registry, sweeper_config).await;
        });

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("new connection from {addr}");
                    let registry = self.registry.clone();
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        Self::handle_connection(stream, addr, registry, config).await;
                    });
                }
                Err(e) => {
                    error!("accept error: {e}");
                }
            }
        }
    }

    /// Per-connection read loop. The paired writer task is the only
    /// writer for this socket.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        registry: Arc<Mutex<RegistryInner>>,
        config: ServerConfig,
    ) {
        let (mut reader, mut writer) = stream.into_split();
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);

        let writer_task = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            while let Some(bytes) = rx.recv().await {
                if writer.write_all(&bytes).await.is_err() {
                    break;
                }
            }
        });

        // Set once CONNECT succeeds.
        let mut session: Option<(u32, Arc<Mutex<Room>>)> = None;

        loop {
            let packet = match Self::read_with_deadline(&mut reader, config.read_timeout).await {
                ReadOutcome::Packet(p) => p,
                ReadOutcome::TimedOut => continue, // rolling deadline, keep reading
                ReadOutcome::Recoverable(e) => {
                    debug!("{addr}: dropped malformed message: {e}");
                    continue;
                }
                ReadOutcome::Fatal(e) => {
                    debug!("{addr}: connection closed: {e}");
                    break;
                }
            };

            // Any inbound message refreshes liveness.
            if let Some((player_id, room)) = &session {
                room.lock().await.touch(*player_id, Instant::now());
            }

            match packet {
                Packet::Connect(connect) => {
                    if session.is_some() {
                        debug!("{addr}: duplicate CONNECT ignored");
                        continue;
                    }
                    session = Some(
                        Self::join_room(connect, tx.clone(), &registry, &config).await,
                    );
                }
                Packet::FrameData(input) => {
                    let Some((_, room)) = &session else {
                        continue;
                    };
                    let accepted = room.lock().await.buffer_input(input);
                    if !accepted {
                        debug!("{addr}: FRAME_DATA before playing dropped");
                    }
                }
                Packet::FrameLoss(request) => {
                    let Some((_, room)) = &session else {
                        continue;
                    };
                    let frames: Vec<ServerFrameMsg> =
                        room.lock().await.frames_for(&request.frame_numbers);
                    for frame in frames {
                        let bytes = Packet::ServerFrame(frame).encode_frame();
                        if tx.send(bytes).await.is_err() {
                            break;
                        }
                    }
                }
                Packet::Heartbeat => {
                    // Liveness already refreshed above.
                }
                Packet::Disconnect => {
                    debug!("{addr}: client requested disconnect");
                    break;
                }
                Packet::ServerFrame(_) | Packet::GameStart(_) => {
                    // Server-to-client messages arriving inbound are a
                    // client bug; drop them.
                    debug!("{addr}: unexpected server-bound message dropped");
                }
            }
        }

        if let Some((player_id, room)) = session {
            let mut room = room.lock().await;
            if let Some(new_host) = room.remove_client(player_id) {
                info!(room = room.id, "host left; player {new_host} promoted");
            }
            info!(room = room.id, "player {player_id} disconnected");
        }
        writer_task.abort();
    }

    /// First-fit room assignment: lowest-id waiting room with space,
    /// else a fresh room with the next sequential id.
    async fn join_room(
        connect: ConnectMsg,
        sender: mpsc::Sender<Vec<u8>>,
        registry: &Arc<Mutex<RegistryInner>>,
        config: &ServerConfig,
    ) -> (u32, Arc<Mutex<Room>>) {
        let mut reg = registry.lock().await;
        reg.next_player_id += 1;
        let player_id = reg.next_player_id;

        let mut target: Option<Arc<Mutex<Room>>> = None;
        for room in reg.rooms.values() {
            if room.lock().await.can_join() {
                target = Some(room.clone());
                break;
            }
        }
        let room = match target {
            Some(room) => room,
            None => {
                reg.next_room_id += 1;
                let id = reg.next_room_id;
                let room = Arc::new(Mutex::new(Room::new(
                    id,
                    config.max_players,
                    config.history_limit,
                )));
                reg.rooms.insert(id, room.clone());
                info!("created room {id}");
                room
            }
        };

        // Add while still holding the registry so two concurrent joins
        // cannot both take the last slot.
        let should_start = {
            let mut room_guard = room.lock().await;
            room_guard.add_client(RoomClient {
                player_id,
                name: connect.player_name.clone(),
                sender: sender.clone(),
                last_seen: Instant::now(),
            });
            info!(
                room = room_guard.id,
                "player {player_id} ({}) joined ({}/{})",
                connect.player_name,
                room_guard.client_count(),
                config.max_players,
            );
            room_guard.is_full() && room_guard.status == RoomStatus::Waiting
        };
        drop(reg);

        // Acknowledge with the assigned id.
        let ack = Packet::Connect(ConnectMsg {
            player_id,
            player_name: connect.player_name,
        });
        let _ = sender.send(ack.encode_frame()).await;

        if should_start {
            let room = room.clone();
            let config = config.clone();
            tokio::spawn(async move {
                Self::start_room(room, config).await;
            });
        }

        (player_id, room)
    }

    /// Debounced room start: pick the seed, broadcast GAME_START to every
    /// member, then spin up the ticker. The seed reaches every client
    /// before the first ServerFrame because both go through the same
    /// per-client ordered channels.
    async fn start_room(room: Arc<Mutex<Room>>, config: ServerConfig) {
        tokio::time::sleep(config.start_debounce).await;

        let (start_bytes, senders) = {
            let mut room_guard = room.lock().await;
            if room_guard.status != RoomStatus::Waiting || !room_guard.is_full() {
                return; // someone left during the debounce
            }
            room_guard.status = RoomStatus::Playing;
            room_guard.random_seed = Utc::now().timestamp_nanos_opt().unwrap_or_default();

            let start = Packet::GameStart(crate::net::protocol::GameStartMsg {
                room_id: room_guard.id,
                random_seed: room_guard.random_seed,
                player_ids: room_guard.player_ids(),
            });
            info!(
                room = room_guard.id,
                seed = room_guard.random_seed,
                "room starting with {} players",
                room_guard.client_count()
            );
            (start.encode_frame(), room_guard.senders())
        };

        for sender in &senders {
            let _ = sender.send(start_bytes.clone()).await;
        }

        Self::run_ticker(room, config).await;
    }

    /// 20 Hz broadcaster for one playing room.
    async fn run_ticker(room: Arc<Mutex<Room>>, config: ServerConfig) {
        let mut ticker = interval(config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let (bytes, senders) = {
                let mut room_guard = room.lock().await;
                if room_guard.status != RoomStatus::Playing || room_guard.is_empty() {
                    info!(room = room_guard.id, "ticker stopping");
                    return;
                }
                let frame = room_guard.tick(Utc::now().timestamp_millis());
                (
                    Packet::ServerFrame(frame).encode_frame(),
                    room_guard.senders(),
                )
            };

            // Sends happen outside the room lock; per-client channels
            // preserve ordering on their own.
            for sender in &senders {
                let _ = sender.send(bytes.clone()).await;
            }
        }
    }

    /// Periodic sweep: drop idle clients, then remove empty rooms.
    async fn run_sweeper(registry: Arc<Mutex<RegistryInner>>, config: ServerConfig) {
        let mut ticker = interval(config.sweep_interval);
        loop {
            ticker.tick().await;

            let rooms: Vec<Arc<Mutex<Room>>> = {
                let reg = registry.lock().await;
                reg.rooms.values().cloned().collect()
            };

            for room in rooms {
                let mut room_guard = room.lock().await;
                let now = Instant::now();
                for player_id in room_guard.idle_clients(now, config.idle_timeout) {
                    warn!(
                        room = room_guard.id,
                        "player {player_id} timed out; disconnecting"
                    );
                    if let Some(sender) = room_guard.sender_of(player_id) {
                        let _ = sender.try_send(Packet::Disconnect.encode_frame());
                    }
                    if let Some(new_host) = room_guard.remove_client(player_id) {
                        info!(room = room_guard.id, "player {new_host} promoted to host");
                    }
                }
            }

            // Registry first, then each room: consistent lock order.
            let mut reg = registry.lock().await;
            let ids: Vec<u64> = reg.rooms.keys().copied().collect();
            for id in ids {
                let empty = {
                    let room = reg.rooms.get(&id).expect("id just listed");
                    room.lock().await.is_empty()
                };
                if empty {
                    reg.rooms.remove(&id);
                    info!("removed empty room {id}");
                }
            }
        }
    }

    async fn read_with_deadline(
        reader: &mut OwnedReadHalf,
        deadline: Duration,
    ) -> ReadOutcome {
        match timeout(deadline, read_packet(reader)).await {
            Err(_) => ReadOutcome::TimedOut,
            Ok(Ok(packet)) => ReadOutcome::Packet(packet),
            Ok(Err(e)) if e.is_recoverable() => ReadOutcome::Recoverable(e),
            Ok(Err(e)) => ReadOutcome::Fatal(e),
        }
    }

    /// Rooms currently registered (observability).
    pub async fn room_count(&self) -> usize {
        self.registry.lock().await.rooms.len()
    }
}

enum ReadOutcome {
    Packet(Packet),
    TimedOut,
    Recoverable(ProtocolError),
    Fatal(ProtocolError),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::{write_packet, FrameDataMsg, FrameLossMsg};
    use tokio::net::TcpStream;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_players: 2,
            tick_interval: Duration::from_millis(10),
            start_debounce: Duration::from_millis(10),
            sweep_interval: Duration::from_millis(50),
            ..Default::default()
        }
    }

    async fn start_server(config: ServerConfig) -> SocketAddr {
        let listener = TcpListener::bind(config.bind_addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = FrameServer::new(config);
        tokio::spawn(async move {
            server.serve(listener).await;
        });
        addr
    }

    async fn connect(addr: SocketAddr, name: &str) -> (TcpStream, u32) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_packet(
            &mut stream,
            &Packet::Connect(ConnectMsg {
                player_id: 0,
                player_name: name.to_string(),
            }),
        )
        .await
        .unwrap();
        let reply = read_packet(&mut stream).await.unwrap();
        let Packet::Connect(ack) = reply else {
            panic!("expected CONNECT ack, got {reply:?}");
        };
        (stream, ack.player_id)
    }

    async fn expect_game_start(stream: &mut TcpStream) -> crate::net::protocol::GameStartMsg {
        loop {
            match read_packet(stream).await.unwrap() {
                Packet::GameStart(msg) => return msg,
                Packet::ServerFrame(_) => panic!("ServerFrame before GAME_START"),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_connect_assigns_monotonic_ids() {
        let addr = start_server(ServerConfig {
            max_players: 8,
            ..test_config()
        })
        .await;
        let (_s1, id1) = connect(addr, "alice").await;
        let (_s2, id2) = connect(addr, "bob").await;
        let (_s3, id3) = connect(addr, "carol").await;
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(id3, 3);
    }

    #[tokio::test]
    async fn test_full_room_starts_with_shared_seed() {
        let addr = start_server(test_config()).await;
        let (mut s1, id1) = connect(addr, "alice").await;
        let (mut s2, id2) = connect(addr, "bob").await;

        let start1 = expect_game_start(&mut s1).await;
        let start2 = expect_game_start(&mut s2).await;

        // Same room, same seed, same ordered player list, on both clients
        // and before any ServerFrame (checked inside expect_game_start).
        assert_eq!(start1.room_id, start2.room_id);
        assert_eq!(start1.random_seed, start2.random_seed);
        assert_eq!(start1.player_ids, vec![id1, id2]);
        assert_eq!(start2.player_ids, vec![id1, id2]);
    }

    #[tokio::test]
    async fn test_third_client_gets_second_room() {
        let addr = start_server(test_config()).await;
        let (mut s1, _) = connect(addr, "a").await;
        let (_s2, _) = connect(addr, "b").await;
        let (_s3, _) = connect(addr, "c").await;

        let start1 = expect_game_start(&mut s1).await;
        assert_eq!(start1.room_id, 1);
        // The third client waits alone in room 2; it must not receive a
        // GAME_START within the debounce window.
        // (Covered implicitly: its room never fills in this test.)
    }

    #[tokio::test]
    async fn test_frames_are_monotonic_and_carry_inputs() {
        let addr = start_server(test_config()).await;
        let (mut s1, id1) = connect(addr, "alice").await;
        let (mut s2, _) = connect(addr, "bob").await;
        expect_game_start(&mut s1).await;
        expect_game_start(&mut s2).await;

        // Send one input; it must show up in a subsequent frame.
        write_packet(
            &mut s1,
            &Packet::FrameData(FrameDataMsg {
                player_id: id1,
                direction: 1,
                frame_number: 1,
            }),
        )
        .await
        .unwrap();

        let mut last_frame = 0u64;
        let mut saw_input = false;
        for _ in 0..30 {
            let Packet::ServerFrame(frame) = read_packet(&mut s1).await.unwrap() else {
                continue;
            };
            // Property 9: strictly increasing, gap-free from 1.
            assert_eq!(frame.frame_number, last_frame + 1);
            last_frame = frame.frame_number;
            if frame
                .frame_datas
                .iter()
                .any(|f| f.player_id == id1 && f.direction == 1)
            {
                saw_input = true;
                break;
            }
        }
        assert!(saw_input, "buffered input must be broadcast");
    }

    #[tokio::test]
    async fn test_frame_loss_replays_history() {
        let addr = start_server(test_config()).await;
        let (mut s1, _) = connect(addr, "alice").await;
        let (mut s2, _) = connect(addr, "bob").await;
        expect_game_start(&mut s1).await;
        expect_game_start(&mut s2).await;

        // Let a few frames flow.
        let mut newest = 0;
        while newest < 3 {
            if let Packet::ServerFrame(f) = read_packet(&mut s2).await.unwrap() {
                newest = f.frame_number;
            }
        }

        // Ask for frame 1 again.
        write_packet(
            &mut s2,
            &Packet::FrameLoss(FrameLossMsg {
                frame_numbers: vec![1],
            }),
        )
        .await
        .unwrap();

        // The replayed frame 1 arrives amid the live stream.
        let mut got_replay = false;
        for _ in 0..30 {
            if let Packet::ServerFrame(f) = read_packet(&mut s2).await.unwrap() {
                if f.frame_number == 1 {
                    got_replay = true;
                    break;
                }
            }
        }
        assert!(got_replay, "FRAME_LOSS must re-broadcast the frame");
    }

    #[tokio::test]
    async fn test_unknown_message_does_not_kill_connection() {
        let addr = start_server(test_config()).await;
        let (mut s1, _) = connect(addr, "alice").await;

        // Hand-rolled frame with an unknown type code.
        use tokio::io::AsyncWriteExt;
        s1.write_all(&[0, 0, 0, 1, 99]).await.unwrap();
        // The connection survives: a heartbeat still goes through and the
        // socket stays open for a second client to fill the room.
        write_packet(&mut s1, &Packet::Heartbeat).await.unwrap();

        let (mut s2, _) = connect(addr, "bob").await;
        expect_game_start(&mut s1).await;
        expect_game_start(&mut s2).await;
    }
}
