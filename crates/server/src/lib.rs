//! The authoritative server: owned world state, sessions, and the
//! cooperative accept/dispatch/tick loop.
//!
//! Everything mutable lives on [`Server`]: the chunk engine, the
//! block-change overlay, the session table, mobs, chests. Sessions borrow
//! the world only inside their own packet handlers or a single tick;
//! there are no background threads and no ambient globals.

pub mod config;
mod gameplay;
mod registry;
mod session;
mod tick;

pub use config::ServerConfig;
pub use gameplay::WorldEvent;
pub use registry::{BlockStateTable, ItemTable, RegistryBlob, RegistryStore};
pub use session::{OpenWindow, Session, SessionState};

use anyhow::{Context, Result};
use picocraft_net::{
    play_block_update, play_system_chat, FramedConn, FramingConfig, Listener, NetError,
    TcpAcceptor, TransportError,
};
use picocraft_world::{
    load_world, world_seed_from_raw, Chest, ChunkEngine, EngineConfig, FluidSim, GenParams, Mob,
    SavedPlayer, SavedWorld, WeatherState, WorldTime, Xorshift32,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Nominal world tick: 20 Hz.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// All simulation state the server owns.
pub struct WorldState {
    pub engine: ChunkEngine,
    pub time: WorldTime,
    pub fluids: FluidSim,
    pub mobs: Vec<Mob>,
    pub chests: HashMap<(i32, u8, i32), Chest>,
    pub weather: WeatherState,
    pub spawn: (i32, i32, i32),
    /// Saved state of players who are not currently connected.
    pub offline_players: HashMap<u128, SavedPlayer>,
}

impl WorldState {
    pub fn new(config: &ServerConfig) -> Self {
        let seed = world_seed_from_raw(config.world_seed);
        let params = GenParams {
            seed,
            base_height: config.terrain_base_height,
            cave_depth: config.cave_base_depth,
            biome_size: config.biome_size,
            biome_radius: config.biome_radius,
        };
        let engine = ChunkEngine::new(
            params,
            EngineConfig {
                cache_entries: config.chunk_cache_size,
                max_block_changes: config.max_block_changes,
                allow_chests: config.allow_chests,
            },
        );
        let spawn_y = engine.height_at(8, 8) as i32 + 1;
        Self {
            engine,
            time: WorldTime::default(),
            fluids: FluidSim::new(),
            mobs: Vec::new(),
            chests: HashMap::new(),
            weather: WeatherState::new(),
            spawn: (8, spawn_y, 8),
            offline_players: HashMap::new(),
        }
    }

    /// Restore a saved world if it matches this seed; anything else keeps
    /// the fresh state (the load "rolls back" by never being applied).
    fn restore(&mut self, saved: SavedWorld) {
        if saved.seed != self.engine.seed() {
            warn!(
                saved = saved.seed,
                current = self.engine.seed(),
                "save file is for a different world seed; starting fresh"
            );
            return;
        }
        self.time = WorldTime::new(saved.day_time);
        if let Err(err) = self.engine.load_changes(saved.changes) {
            warn!("saved block changes exceed the configured index size: {err}");
        }
        for player in saved.players {
            self.offline_players.insert(player.uuid, player);
        }
        info!(
            changes = self.engine.changes().len(),
            players = self.offline_players.len(),
            "world restored from save"
        );
    }
}

/// UUID namespace for server-spawned mobs.
pub(crate) fn mob_uuid(entity_id: i32) -> u128 {
    0x5069_636F_0000_0000_0000_0000_0000_0000u128 | entity_id as u32 as u128
}

pub struct Server<L: Listener> {
    listener: L,
    pub config: ServerConfig,
    pub registries: RegistryStore,
    pub world: WorldState,
    sessions: Vec<Session<L::Conn>>,
    next_entity_id: i32,
    pub(crate) rng: Xorshift32,
    last_tick: Instant,
    last_save: Instant,
}

impl Server<TcpAcceptor> {
    /// Bind the TCP listener and bring up the world.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpAcceptor::bind(("0.0.0.0", config.port))
            .with_context(|| format!("binding port {}", config.port))?;
        Self::with_listener(listener, config)
    }
}

impl<L: Listener> Server<L> {
    /// Assemble a server over any accept source (tests use the in-memory
    /// listener).
    pub fn with_listener(listener: L, config: ServerConfig) -> Result<Self> {
        let registries = RegistryStore::load(&config.registry_dir);
        let mut world = WorldState::new(&config);
        match load_world(&config.save_path) {
            Ok(Some(saved)) => world.restore(saved),
            Ok(None) => info!("no save at {}, starting fresh", config.save_path.display()),
            Err(err) => warn!("unreadable save ({err:#}); starting fresh"),
        }
        let rng_seed = world.engine.seed() ^ 0xE2B9_419;
        Ok(Self {
            listener,
            config,
            registries,
            world,
            sessions: Vec::new(),
            next_entity_id: 1,
            rng: Xorshift32::new(rng_seed),
            last_tick: Instant::now(),
            last_save: Instant::now(),
        })
    }

    pub fn sessions(&self) -> &[Session<L::Conn>] {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut Vec<Session<L::Conn>> {
        &mut self.sessions
    }

    pub(crate) fn alloc_entity_id(&mut self) -> i32 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// The blocking outer loop: poll until the listener dies, then save.
    pub fn run(&mut self) -> Result<()> {
        info!("server loop started");
        loop {
            if let Err(err) = self.poll_once() {
                warn!("server loop stopping: {err:#}");
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.save().context("final save")
    }

    /// One pass of the cooperative loop: accept, drain sessions, tick if
    /// due, reap, save if due.
    pub fn poll_once(&mut self) -> Result<()> {
        self.accept_new()?;

        let online = self.sessions.iter().filter(|s| s.is_playing()).count();
        let mut events = Vec::new();
        for i in 0..self.sessions.len() {
            let result =
                self.sessions[i].poll(&mut self.world, &self.registries, &self.config, online);
            match result {
                Ok(mut session_events) => events.append(&mut session_events),
                Err(err) => self.handle_session_error(i, err),
            }
        }
        if !events.is_empty() {
            self.apply_events(&events);
            // Broadcasts must reach the wire in the same pass as the edit
            // that caused them.
            for session in &mut self.sessions {
                if session.is_playing() {
                    if let Err(err) = session.conn.packet_flush() {
                        warn!(username = %session.username, "flush failed: {err}");
                        session.kick("Connection lost");
                    }
                }
            }
        }

        if self.last_tick.elapsed() >= TICK_INTERVAL {
            self.last_tick = Instant::now();
            self.world_tick();
        }

        self.reap();

        if self.last_save.elapsed() >= self.config.save_interval() {
            self.last_save = Instant::now();
            if let Err(err) = self.save() {
                warn!("periodic save failed: {err:#}");
            }
        }
        Ok(())
    }

    fn accept_new(&mut self) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok(Some((conn, peer))) => {
                    if self.sessions.len() >= self.config.max_players + 4 {
                        // Over the hard cap even counting pre-play
                        // sessions; drop the connection outright.
                        warn!(%peer, "connection refused, server full");
                        continue;
                    }
                    let framed = FramedConn::new(
                        conn,
                        FramingConfig {
                            max_recv_len: self.config.max_recv_buf_len,
                            packet_buf_len: self.config.packet_buffer_size,
                            timeout: self.config.network_timeout(),
                        },
                    );
                    let entity_id = self.alloc_entity_id();
                    info!(%peer, entity_id, "connection accepted");
                    self.sessions
                        .push(Session::new(framed, entity_id, self.config.view_distance));
                }
                Ok(None) => return Ok(()),
                Err(TransportError::WouldBlock) => return Ok(()),
                Err(err) => return Err(err).context("accept failed"),
            }
        }
    }

    fn handle_session_error(&mut self, index: usize, err: NetError) {
        let session = &mut self.sessions[index];
        match &err {
            NetError::Transport(TransportError::Closed) => {
                info!(username = %session.username, "client disconnected");
                session.state = SessionState::Closing;
            }
            NetError::WorldFull => session.kick("The world is full"),
            NetError::Timeout(_) => session.kick("Timed out"),
            NetError::VersionMismatch(_) => {
                // Already told the client during login.
                session.state = SessionState::Closing;
            }
            other => {
                warn!(username = %session.username, "session error: {other}");
                session.kick("Protocol error");
            }
        }
    }

    /// Broadcast the effects of this poll's packets. A tick's block-update
    /// broadcasts always follow the edit that caused them.
    fn apply_events(&mut self, events: &[WorldEvent]) {
        for event in events {
            match event {
                WorldEvent::BlockChanged { x, y, z, block } => {
                    let state = self.registries.block_states.state_for(*block);
                    let payload = play_block_update(*x, *y as i32, *z, state);
                    for session in &mut self.sessions {
                        if session.is_playing()
                            && gameplay::sees_chunk(&session.loaded_chunks, *x, *z)
                        {
                            let _ = session.conn.write_packet(&payload);
                        }
                    }
                }
                WorldEvent::Chat { from, message } => {
                    let line = format!("<{from}> {message}");
                    info!("{line}");
                    let payload = play_system_chat(&line);
                    for session in &mut self.sessions {
                        if session.is_playing() {
                            let _ = session.conn.write_packet(&payload);
                        }
                    }
                }
            }
        }
    }

    /// Remove sessions that reached closing, preserving their player state
    /// for the next join and the next save.
    fn reap(&mut self) {
        let mut removed = Vec::new();
        let mut i = 0;
        while i < self.sessions.len() {
            if self.sessions[i].is_closing() {
                let mut session = self.sessions.remove(i);
                gameplay::abandon_session_state(&mut session);
                if session.spawn_sent {
                    self.world.offline_players.insert(
                        session.uuid,
                        SavedPlayer {
                            username: session.username.clone(),
                            uuid: session.uuid,
                            x: session.x,
                            y: session.y,
                            z: session.z,
                            yaw: session.yaw,
                            pitch: session.pitch,
                            inventory: session.inventory.clone(),
                        },
                    );
                }
                session.conn.shutdown();
                removed.push(session.username);
            } else {
                i += 1;
            }
        }
        for username in removed {
            if !username.is_empty() {
                info!(%username, "session reaped");
            }
        }
    }

    /// Serialize the world: seed, clock, overlay, and every known player.
    pub fn save(&mut self) -> Result<()> {
        let mut players: Vec<SavedPlayer> = self.world.offline_players.values().cloned().collect();
        for session in &self.sessions {
            if session.spawn_sent {
                players.retain(|p| p.uuid != session.uuid);
                players.push(SavedPlayer {
                    username: session.username.clone(),
                    uuid: session.uuid,
                    x: session.x,
                    y: session.y,
                    z: session.z,
                    yaw: session.yaw,
                    pitch: session.pitch,
                    inventory: session.inventory.clone(),
                });
            }
        }
        let saved = SavedWorld {
            seed: self.world.engine.seed(),
            day_time: self.world.time.day_time,
            changes: self.world.engine.changes().iter().copied().collect(),
            players,
        };
        picocraft_world::save_world(&self.config.save_path, &saved)
    }
}
