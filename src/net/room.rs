//! Room State
//!
//! One room = one lockstep session. Clients join in order (the first is
//! the host), inputs buffer between ticks, and the 20 Hz ticker drains
//! the buffer into a strictly increasing, gap-free ServerFrame stream.
//! Recent frames are retained to serve FRAME_LOSS replays.
//!
//! All methods are called with the room's mutex held; none of them block.

use std::collections::BTreeMap;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::collections::OrderedMap;
use crate::net::protocol::{FrameDataMsg, ServerFrameMsg};

/// Room lifecycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RoomStatus {
    /// Accepting clients.
    Waiting,
    /// Ticking; FRAME_DATA is accepted, new clients are not.
    Playing,
}

/// A connected client as the room sees it.
pub struct RoomClient {
    /// Assigned player id.
    pub player_id: u32,
    /// Display name from CONNECT.
    pub name: String,
    /// Pre-encoded frames are pushed here; the connection's writer task
    /// owns the socket.
    pub sender: mpsc::Sender<Vec<u8>>,
    /// Refreshed by any inbound message.
    pub last_seen: Instant,
}

/// A single game room.
pub struct Room {
    /// Room id, sequential.
    pub id: u64,
    /// Lifecycle state.
    pub status: RoomStatus,
    /// Simulation seed, chosen when the room starts.
    pub random_seed: i64,
    /// Clients in join order; the first entry is the host.
    clients: OrderedMap<u32, RoomClient>,
    /// Last broadcast frame number; the next broadcast is `+ 1`.
    frame_number: u64,
    /// Inputs buffered since the previous tick, in arrival order.
    input_buffer: Vec<FrameDataMsg>,
    /// Recent ServerFrames for FRAME_LOSS replay.
    history: BTreeMap<u64, ServerFrameMsg>,
    /// Retention bound for `history`.
    history_limit: usize,
    /// Capacity.
    max_players: usize,
}

impl Room {
    /// New empty room in `Waiting`.
    pub fn new(id: u64, max_players: usize, history_limit: usize) -> Self {
        Self {
            id,
            status: RoomStatus::Waiting,
            random_seed: 0,
            clients: OrderedMap::new(),
            frame_number: 0,
            input_buffer: Vec::new(),
            history: BTreeMap::new(),
            history_limit: history_limit.max(1),
            max_players: max_players.max(1),
        }
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// True when another client fits and the room is still waiting.
    pub fn can_join(&self) -> bool {
        self.status == RoomStatus::Waiting && self.clients.len() < self.max_players
    }

    /// True once the room holds `max_players`.
    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_players
    }

    /// The host: first client in join order.
    pub fn host(&self) -> Option<u32> {
        self.clients.front().map(|(id, _)| *id)
    }

    /// Player ids in join order.
    pub fn player_ids(&self) -> Vec<u32> {
        self.clients.keys().copied().collect()
    }

    /// Outbound channels of every client, in join order.
    pub fn senders(&self) -> Vec<mpsc::Sender<Vec<u8>>> {
        self.clients.values().map(|c| c.sender.clone()).collect()
    }

    /// Outbound channel of one client.
    pub fn sender_of(&self, player_id: u32) -> Option<mpsc::Sender<Vec<u8>>> {
        self.clients.get(&player_id).map(|c| c.sender.clone())
    }

    /// Add a client. Callers check `can_join` first.
    pub fn add_client(&mut self, client: RoomClient) {
        self.clients.insert(client.player_id, client);
    }

    /// Remove a client. Returns the new host if the host changed.
    pub fn remove_client(&mut self, player_id: u32) -> Option<u32> {
        let was_host = self.host() == Some(player_id);
        self.clients.remove(&player_id);
        if was_host {
            self.host()
        } else {
            None
        }
    }

    /// True once no clients remain (the cleanup sweep removes the room).
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Refresh a client's liveness timestamp.
    pub fn touch(&mut self, player_id: u32, now: Instant) {
        if let Some(client) = self.clients.get_mut(&player_id) {
            client.last_seen = now;
        }
    }

    /// Clients idle beyond `timeout`, in join order.
    pub fn idle_clients(&self, now: Instant, timeout: std::time::Duration) -> Vec<u32> {
        self.clients
            .iter()
            .filter(|(_, c)| now.duration_since(c.last_seen) > timeout)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Buffer an input. Only accepted while `Playing`; early or late
    /// inputs are dropped (the caller logs).
    pub fn buffer_input(&mut self, input: FrameDataMsg) -> bool {
        if self.status != RoomStatus::Playing {
            return false;
        }
        self.input_buffer.push(input);
        true
    }

    /// One ticker iteration: atomically drain the buffer, advance the
    /// frame counter and build the broadcast. Frame numbers are strictly
    /// increasing and gap-free, starting at 1.
    pub fn tick(&mut self, timestamp: i64) -> ServerFrameMsg {
        self.frame_number += 1;
        let frame = ServerFrameMsg {
            frame_number: self.frame_number,
            timestamp,
            frame_datas: std::mem::take(&mut self.input_buffer),
        };
        self.history.insert(frame.frame_number, frame.clone());
        while self.history.len() > self.history_limit {
            self.history.pop_first();
        }
        frame
    }

    /// Last broadcast frame number.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Retained frames for a FRAME_LOSS request, in ascending order.
    /// Frames that fell out of retention are silently absent.
    pub fn frames_for(&self, requested: &[u64]) -> Vec<ServerFrameMsg> {
        let mut sorted: Vec<u64> = requested.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
            .into_iter()
            .filter_map(|f| self.history.get(&f).cloned())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: u32) -> RoomClient {
        let (tx, _rx) = mpsc::channel(8);
        RoomClient {
            player_id: id,
            name: format!("p{id}"),
            sender: tx,
            last_seen: Instant::now(),
        }
    }

    fn input(player_id: u32, direction: i32) -> FrameDataMsg {
        FrameDataMsg {
            player_id,
            direction,
            frame_number: 0,
        }
    }

    #[test]
    fn test_join_order_and_host() {
        let mut room = Room::new(1, 4, 16);
        room.add_client(client(10));
        room.add_client(client(20));
        room.add_client(client(30));

        assert_eq!(room.host(), Some(10));
        assert_eq!(room.player_ids(), vec![10, 20, 30]);
        assert!(!room.is_full());
        assert!(room.can_join());
    }

    #[test]
    fn test_host_promotion_on_departure() {
        let mut room = Room::new(1, 4, 16);
        room.add_client(client(10));
        room.add_client(client(20));
        room.add_client(client(30));

        // Non-host leaving promotes nobody
        assert_eq!(room.remove_client(20), None);
        // Host leaving promotes the next in join order
        assert_eq!(room.remove_client(10), Some(30));
        assert_eq!(room.host(), Some(30));
        assert_eq!(room.remove_client(30), None);
        assert!(room.is_empty());
    }

    #[test]
    fn test_capacity_gates_join() {
        let mut room = Room::new(1, 2, 16);
        room.add_client(client(1));
        assert!(room.can_join());
        room.add_client(client(2));
        assert!(room.is_full());
        assert!(!room.can_join());
        room.status = RoomStatus::Playing;
        assert!(!room.can_join());
    }

    #[test]
    fn test_inputs_dropped_until_playing() {
        let mut room = Room::new(1, 2, 16);
        assert!(!room.buffer_input(input(1, 1)));
        room.status = RoomStatus::Playing;
        assert!(room.buffer_input(input(1, 1)));
    }

    #[test]
    fn test_tick_monotonic_and_gap_free() {
        // Property 9: frame numbers strictly increase from 1.
        let mut room = Room::new(1, 2, 64);
        room.status = RoomStatus::Playing;
        for expected in 1..=50u64 {
            let frame = room.tick(0);
            assert_eq!(frame.frame_number, expected);
        }
    }

    #[test]
    fn test_tick_drains_in_arrival_order() {
        let mut room = Room::new(1, 4, 16);
        room.status = RoomStatus::Playing;
        room.buffer_input(input(3, 1));
        room.buffer_input(input(1, 4));
        room.buffer_input(input(2, 2));

        let frame = room.tick(123);
        assert_eq!(frame.timestamp, 123);
        let order: Vec<u32> = frame.frame_datas.iter().map(|f| f.player_id).collect();
        assert_eq!(order, vec![3, 1, 2]);

        // Buffer drained: the next tick is empty
        let frame = room.tick(124);
        assert!(frame.frame_datas.is_empty());
    }

    #[test]
    fn test_frame_loss_replay() {
        let mut room = Room::new(1, 2, 16);
        room.status = RoomStatus::Playing;
        for _ in 0..5 {
            room.tick(0);
        }

        let frames = room.frames_for(&[4, 2, 2, 99]);
        let numbers: Vec<u64> = frames.iter().map(|f| f.frame_number).collect();
        assert_eq!(numbers, vec![2, 4]);
    }

    #[test]
    fn test_history_retention_bound() {
        let mut room = Room::new(1, 2, 3);
        room.status = RoomStatus::Playing;
        for _ in 0..10 {
            room.tick(0);
        }
        // Only the newest three frames survive
        assert!(room.frames_for(&[7]).is_empty());
        let kept = room.frames_for(&[8, 9, 10]);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_idle_detection() {
        let mut room = Room::new(1, 4, 16);
        let mut old = client(1);
        old.last_seen = Instant::now() - std::time::Duration::from_secs(120);
        room.add_client(old);
        room.add_client(client(2));

        let idle = room.idle_clients(Instant::now(), std::time::Duration::from_secs(30));
        assert_eq!(idle, vec![1]);

        // Any inbound message refreshes liveness
        room.touch(1, Instant::now());
        assert!(room
            .idle_clients(Instant::now(), std::time::Duration::from_secs(30))
            .is_empty());
    }
}
