//! Per-client sessions and the connection state machine.
//!
//! A session walks handshake → status | login → configuration → play →
//! closing, driven entirely by inbound packet ids interpreted against the
//! current state. Unknown ids are decoded to `Unknown` and dropped (their
//! length prefix bounded the read). Fatal errors emit a best-effort
//! disconnect packet and move the session to closing; the server reaps it
//! on the next pass.

use crate::config::ServerConfig;
use crate::gameplay::{self, WorldEvent};
use crate::registry::RegistryStore;
use crate::WorldState;
use picocraft_net::{
    config_disconnect, config_finish, config_known_packs, config_registry_data, config_update_tags,
    decode_config, decode_handshake, decode_login, decode_status, login_disconnect,
    login_success, play_disconnect, play_game_event, play_keep_alive, play_login,
    play_set_center_chunk, play_set_default_spawn, play_set_time, play_sync_position,
    ConfigPacket, FramedConn, LoginPacket, LoginPlay, NetError, StatusPacket, Transport,
    GAME_EVENT_START_CHUNKS, GAME_VERSION, PROTOCOL_VERSION,
};
use picocraft_world::Inventory;
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inbound packets handled per session per poll; keeps one chatty client
/// from starving the tick.
const PACKET_BUDGET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshake,
    Status,
    Login,
    Configuration,
    Play,
    Closing,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Handshake => "handshake",
            SessionState::Status => "status",
            SessionState::Login => "login",
            SessionState::Configuration => "configuration",
            SessionState::Play => "play",
            SessionState::Closing => "closing",
        }
    }
}

/// An open container view (currently only chests).
#[derive(Debug, Clone, Copy)]
pub struct OpenWindow {
    pub id: i32,
    pub chest: (i32, u8, i32),
}

pub struct Session<T: Transport> {
    pub conn: FramedConn<T>,
    pub state: SessionState,
    pub protocol_version: i32,
    pub username: String,
    pub uuid: u128,
    pub entity_id: i32,

    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,

    pub view_distance: u8,
    pub inventory: Inventory,
    /// Stack held on the cursor while a container is open.
    pub cursor: picocraft_world::ItemStack,
    pub open_window: Option<OpenWindow>,
    next_window_id: i32,

    pub last_keepalive_sent: Instant,
    pub last_keepalive_ack: Instant,
    pub pending_keepalive: Option<i64>,
    pub pending_teleport: Option<i32>,
    next_teleport_id: i32,

    pub spawn_sent: bool,
    pub loaded_chunks: HashSet<(i32, i32)>,
    pub pending_chunks: VecDeque<(i32, i32)>,
}

impl<T: Transport> Session<T> {
    pub fn new(conn: FramedConn<T>, entity_id: i32, view_distance: u8) -> Self {
        let now = Instant::now();
        Self {
            conn,
            state: SessionState::Handshake,
            protocol_version: 0,
            username: String::new(),
            uuid: 0,
            entity_id,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            on_ground: false,
            view_distance,
            inventory: Inventory::default(),
            cursor: picocraft_world::ItemStack::default(),
            open_window: None,
            next_window_id: 1,
            last_keepalive_sent: now,
            last_keepalive_ack: now,
            pending_keepalive: None,
            pending_teleport: None,
            next_teleport_id: 1,
            spawn_sent: false,
            loaded_chunks: HashSet::new(),
            pending_chunks: VecDeque::new(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Play
    }

    pub fn is_closing(&self) -> bool {
        self.state == SessionState::Closing
    }

    /// The chunk the player currently stands in.
    pub fn chunk_pos(&self) -> (i32, i32) {
        (
            (self.x.floor() as i32).div_euclid(16),
            (self.z.floor() as i32).div_euclid(16),
        )
    }

    pub fn next_window_id(&mut self) -> i32 {
        self.next_window_id = (self.next_window_id % 100) + 1;
        self.next_window_id
    }

    /// Drain inbound packets up to the per-poll budget, producing world
    /// events for the server to apply.
    pub fn poll(
        &mut self,
        world: &mut WorldState,
        registries: &RegistryStore,
        config: &ServerConfig,
        online_players: usize,
    ) -> Result<Vec<WorldEvent>, NetError> {
        let mut events = Vec::new();
        for _ in 0..PACKET_BUDGET {
            if self.state == SessionState::Closing {
                break;
            }
            let Some(payload) = self.conn.read_packet(true)? else {
                break;
            };
            self.dispatch(&payload, world, registries, config, online_players, &mut events)?;
        }
        if !events.is_empty() || self.state == SessionState::Play {
            self.conn.packet_flush()?;
        }
        Ok(events)
    }

    fn dispatch(
        &mut self,
        payload: &[u8],
        world: &mut WorldState,
        registries: &RegistryStore,
        config: &ServerConfig,
        online_players: usize,
        events: &mut Vec<WorldEvent>,
    ) -> Result<(), NetError> {
        match self.state {
            SessionState::Handshake => self.handle_handshake(payload),
            SessionState::Status => self.handle_status(payload, config, online_players),
            SessionState::Login => self.handle_login(payload, registries),
            SessionState::Configuration => self.handle_config(payload, world, config, registries),
            SessionState::Play => {
                gameplay::handle_play(self, payload, world, registries, config, events)
            }
            SessionState::Closing => Ok(()),
        }
    }

    fn handle_handshake(&mut self, payload: &[u8]) -> Result<(), NetError> {
        let hs = decode_handshake(payload)?;
        self.protocol_version = hs.protocol_version;
        match hs.next_state {
            1 => self.state = SessionState::Status,
            2 => self.state = SessionState::Login,
            other => {
                debug!(next_state = other, "handshake requested unknown state");
                self.state = SessionState::Closing;
            }
        }
        Ok(())
    }

    fn handle_status(
        &mut self,
        payload: &[u8],
        config: &ServerConfig,
        online_players: usize,
    ) -> Result<(), NetError> {
        match decode_status(payload)? {
            StatusPacket::Request => {
                let status = json!({
                    "version": { "name": GAME_VERSION, "protocol": PROTOCOL_VERSION },
                    "players": { "max": config.max_players, "online": online_players },
                    "description": { "text": config.motd },
                });
                let response = picocraft_net::status_response(&status.to_string());
                self.conn.write_packet(&response)?;
                self.conn.packet_flush()?;
            }
            StatusPacket::Ping { payload } => {
                let pong = picocraft_net::status_pong(payload);
                self.conn.write_packet(&pong)?;
                self.conn.packet_flush()?;
                // Pings conclude the status exchange.
                self.state = SessionState::Closing;
            }
            StatusPacket::Unknown { id } => {
                debug!(id = format_args!("{id:#04x}"), "unknown status packet");
            }
        }
        Ok(())
    }

    fn handle_login(&mut self, payload: &[u8], registries: &RegistryStore) -> Result<(), NetError> {
        match decode_login(payload)? {
            LoginPacket::Start { username, uuid } => {
                if self.protocol_version != PROTOCOL_VERSION {
                    warn!(
                        version = self.protocol_version,
                        "rejecting client with wrong protocol version"
                    );
                    let reason = format!("This server speaks protocol {PROTOCOL_VERSION}");
                    self.conn.send_best_effort(&login_disconnect(&reason));
                    self.state = SessionState::Closing;
                    return Err(NetError::VersionMismatch(self.protocol_version));
                }
                info!(%username, "login start");
                self.username = username;
                self.uuid = uuid;
                // No compression: advertise a negative threshold.
                self.conn
                    .write_packet(&picocraft_net::login_set_compression(-1))?;
                let success = login_success(self.uuid, &self.username);
                self.conn.write_packet(&success)?;
                self.conn.packet_flush()?;
            }
            LoginPacket::Acknowledged => {
                self.state = SessionState::Configuration;
                self.begin_configuration(registries)?;
            }
            LoginPacket::Unknown { id } => {
                debug!(id = format_args!("{id:#04x}"), "unknown login packet");
            }
        }
        Ok(())
    }

    /// Send the configuration-state payload: known packs, the registry
    /// dumps verbatim, tags, then finish.
    fn begin_configuration(&mut self, registries: &RegistryStore) -> Result<(), NetError> {
        self.conn.write_packet(&config_known_packs())?;
        for blob in &registries.registries {
            self.conn.write_packet(&config_registry_data(&blob.payload))?;
        }
        if let Some(tags) = &registries.tags {
            self.conn.write_packet(&config_update_tags(tags))?;
        }
        self.conn.write_packet(&config_finish())?;
        self.conn.packet_flush()?;
        Ok(())
    }

    fn handle_config(
        &mut self,
        payload: &[u8],
        world: &mut WorldState,
        config: &ServerConfig,
        registries: &RegistryStore,
    ) -> Result<(), NetError> {
        match decode_config(payload)? {
            ConfigPacket::FinishAck => {
                self.state = SessionState::Play;
                self.enter_play(world, config, registries)?;
            }
            ConfigPacket::ClientInformation | ConfigPacket::KnownPacks => {}
            ConfigPacket::KeepAlive { .. } => {}
            ConfigPacket::Unknown { id } => {
                debug!(id = format_args!("{id:#04x}"), "unknown configuration packet");
            }
        }
        Ok(())
    }

    /// The login-play burst: world metadata, spawn, initial position.
    /// Exactly one login-play packet per session.
    fn enter_play(
        &mut self,
        world: &mut WorldState,
        config: &ServerConfig,
        _registries: &RegistryStore,
    ) -> Result<(), NetError> {
        let (sx, sy, sz) = world.spawn;
        if let Some(saved) = world.offline_players.get(&self.uuid) {
            self.x = saved.x;
            self.y = saved.y;
            self.z = saved.z;
            self.yaw = saved.yaw;
            self.pitch = saved.pitch;
            self.inventory = saved.inventory.clone();
        } else {
            self.x = sx as f64 + 0.5;
            self.y = sy as f64;
            self.z = sz as f64 + 0.5;
        }

        let login = play_login(&LoginPlay {
            entity_id: self.entity_id,
            view_distance: self.view_distance as i32,
            max_players: config.max_players as i32,
            hashed_seed: world.engine.seed() as i64,
            dimension_name: "minecraft:overworld".into(),
        });
        self.conn.write_packet(&login)?;
        self.conn
            .write_packet(&play_game_event(GAME_EVENT_START_CHUNKS, 0.0))?;
        let (ccx, ccz) = self.chunk_pos();
        self.conn.write_packet(&play_set_center_chunk(ccx, ccz))?;
        self.conn.write_packet(&play_set_default_spawn(sx, sy, sz))?;
        self.conn.write_packet(&play_set_time(
            world.time.tick as i64,
            world.time.day_time as i64,
        ))?;

        let teleport_id = self.next_teleport_id;
        self.next_teleport_id += 1;
        self.pending_teleport = Some(teleport_id);
        self.conn.write_packet(&play_sync_position(
            teleport_id,
            self.x,
            self.y,
            self.z,
            self.yaw,
            self.pitch,
        ))?;
        // Mobs that already exist must be visible to the newcomer.
        for mob in &world.mobs {
            self.conn.write_packet(&picocraft_net::play_spawn_entity(
                mob.id,
                crate::mob_uuid(mob.id),
                mob.kind.protocol_id(),
                mob.x,
                mob.y,
                mob.z,
                mob.yaw,
                mob.pitch,
            ))?;
        }
        self.conn.packet_flush()?;

        self.spawn_sent = true;
        self.queue_view_chunks();
        info!(username = %self.username, "entered play state");
        Ok(())
    }

    /// Enqueue every column in the view window that is not already loaded,
    /// nearest first, and unload columns that fell out.
    pub fn queue_view_chunks(&mut self) {
        let (ccx, ccz) = self.chunk_pos();
        let r = self.view_distance as i32;

        let mut wanted: Vec<(i32, i32)> = Vec::new();
        for cx in (ccx - r)..=(ccx + r) {
            for cz in (ccz - r)..=(ccz + r) {
                wanted.push((cx, cz));
            }
        }
        wanted.sort_by_key(|&(cx, cz)| {
            let dx = cx - ccx;
            let dz = cz - ccz;
            dx * dx + dz * dz
        });

        self.pending_chunks.retain(|pos| wanted.contains(pos));
        for pos in wanted {
            if !self.loaded_chunks.contains(&pos) && !self.pending_chunks.contains(&pos) {
                self.pending_chunks.push_back(pos);
            }
        }
    }

    /// Columns outside the current view window, to be unloaded.
    pub fn out_of_range_chunks(&self) -> Vec<(i32, i32)> {
        let (ccx, ccz) = self.chunk_pos();
        let r = self.view_distance as i32;
        self.loaded_chunks
            .iter()
            .copied()
            .filter(|&(cx, cz)| (cx - ccx).abs() > r || (cz - ccz).abs() > r)
            .collect()
    }

    /// Close the session with a reason, sending the right disconnect shape
    /// for the current state. Best effort; the socket may already be gone.
    pub fn kick(&mut self, reason: &str) {
        match self.state {
            SessionState::Login => self.conn.send_best_effort(&login_disconnect(reason)),
            SessionState::Configuration => self.conn.send_best_effort(&config_disconnect(reason)),
            SessionState::Play => self.conn.send_best_effort(&play_disconnect(reason)),
            _ => {}
        }
        info!(username = %self.username, reason, "session closed");
        self.state = SessionState::Closing;
    }

    /// Keepalive bookkeeping; returns false when the peer timed out.
    pub fn tick_keepalive(&mut self, config: &ServerConfig) -> Result<bool, NetError> {
        if self.state != SessionState::Play {
            return Ok(true);
        }
        if self.last_keepalive_ack.elapsed() > config.keepalive_timeout() {
            return Ok(false);
        }
        if self.last_keepalive_sent.elapsed() > config.keepalive_interval() {
            let id = self.last_keepalive_sent.elapsed().as_millis() as i64;
            self.pending_keepalive = Some(id);
            self.conn.write_packet(&play_keep_alive(id))?;
            self.last_keepalive_sent = Instant::now();
        }
        Ok(true)
    }
}
