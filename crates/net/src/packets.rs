//! Packet ids and typed encode/decode for protocol 772 (1.21.8).
//!
//! Serverbound packets decode into per-state enums; clientbound packets
//! are built as payload byte vectors (id + fields) ready for
//! [`crate::framing::FramedConn::write_packet`]. Unknown serverbound ids
//! decode to `Unknown` so the session can discard them by length.

use crate::codec::{Reader, Writer};
use crate::error::CodecError;

/// Protocol version this server speaks.
pub const PROTOCOL_VERSION: i32 = 772;
/// Game version advertised in status responses.
pub const GAME_VERSION: &str = "1.21.8";

/// Longest username the login path accepts.
pub const MAX_USERNAME_LEN: usize = 16;
/// Bound for chat and other free-form strings.
pub const MAX_CHAT_LEN: usize = 256;

/// Packet ids, grouped by state and direction.
pub mod ids {
    /// Handshake, serverbound.
    pub mod handshake {
        pub const INTENTION: i32 = 0x00;
    }

    /// Status state.
    pub mod status {
        pub const SB_REQUEST: i32 = 0x00;
        pub const SB_PING: i32 = 0x01;
        pub const CB_RESPONSE: i32 = 0x00;
        pub const CB_PONG: i32 = 0x01;
    }

    /// Login state.
    pub mod login {
        pub const SB_START: i32 = 0x00;
        pub const SB_ACKNOWLEDGED: i32 = 0x03;
        pub const CB_DISCONNECT: i32 = 0x00;
        pub const CB_SUCCESS: i32 = 0x02;
        pub const CB_SET_COMPRESSION: i32 = 0x03;
    }

    /// Configuration state.
    pub mod config {
        pub const SB_CLIENT_INFORMATION: i32 = 0x00;
        pub const SB_CUSTOM_PAYLOAD: i32 = 0x02;
        pub const SB_FINISH_ACK: i32 = 0x03;
        pub const SB_KEEP_ALIVE: i32 = 0x04;
        pub const SB_KNOWN_PACKS: i32 = 0x07;
        pub const CB_CUSTOM_PAYLOAD: i32 = 0x01;
        pub const CB_DISCONNECT: i32 = 0x02;
        pub const CB_FINISH: i32 = 0x03;
        pub const CB_KEEP_ALIVE: i32 = 0x04;
        pub const CB_REGISTRY_DATA: i32 = 0x07;
        pub const CB_UPDATE_TAGS: i32 = 0x0D;
        pub const CB_KNOWN_PACKS: i32 = 0x0E;
    }

    /// Play state, serverbound.
    pub mod play_sb {
        pub const CONFIRM_TELEPORT: i32 = 0x00;
        pub const CHAT: i32 = 0x08;
        pub const CLICK_CONTAINER: i32 = 0x11;
        pub const CLOSE_CONTAINER: i32 = 0x12;
        pub const KEEP_ALIVE: i32 = 0x1A;
        pub const MOVE_POSITION: i32 = 0x1D;
        pub const MOVE_POSITION_ROTATION: i32 = 0x1E;
        pub const MOVE_ROTATION: i32 = 0x1F;
        pub const MOVE_FLAGS: i32 = 0x20;
        pub const PLAYER_ACTION: i32 = 0x28;
        pub const SET_HELD_ITEM: i32 = 0x34;
        pub const SWING_ARM: i32 = 0x3C;
        pub const USE_ITEM_ON: i32 = 0x3F;
        pub const USE_ITEM: i32 = 0x40;
    }

    /// Play state, clientbound.
    pub mod play_cb {
        pub const SPAWN_ENTITY: i32 = 0x01;
        pub const ACK_BLOCK_CHANGE: i32 = 0x05;
        pub const BLOCK_UPDATE: i32 = 0x09;
        pub const SET_CONTAINER_CONTENT: i32 = 0x12;
        pub const SET_CONTAINER_SLOT: i32 = 0x14;
        pub const DISCONNECT: i32 = 0x1C;
        pub const SYNC_ENTITY_POSITION: i32 = 0x1F;
        pub const UNLOAD_CHUNK: i32 = 0x21;
        pub const GAME_EVENT: i32 = 0x22;
        pub const KEEP_ALIVE: i32 = 0x26;
        pub const CHUNK_DATA: i32 = 0x27;
        pub const LOGIN: i32 = 0x2B;
        pub const MOVE_ENTITY_POSITION: i32 = 0x2E;
        pub const MOVE_ENTITY_POSITION_ROTATION: i32 = 0x2F;
        pub const MOVE_ENTITY_ROTATION: i32 = 0x30;
        pub const OPEN_SCREEN: i32 = 0x34;
        pub const REMOVE_ENTITIES: i32 = 0x46;
        pub const SYNC_PLAYER_POSITION: i32 = 0x41;
        pub const SET_CENTER_CHUNK: i32 = 0x57;
        pub const SET_DEFAULT_SPAWN: i32 = 0x5A;
        pub const SET_TIME: i32 = 0x6A;
        pub const SYSTEM_CHAT: i32 = 0x72;
    }
}

/// `GameEvent` id for "start waiting for level chunks".
pub const GAME_EVENT_START_CHUNKS: u8 = 13;
/// `GameEvent` ids for weather transitions.
pub const GAME_EVENT_END_RAIN: u8 = 1;
pub const GAME_EVENT_BEGIN_RAIN: u8 = 2;

// ---------------------------------------------------------------------------
// Serverbound decoding
// ---------------------------------------------------------------------------

/// The single handshake packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: i32,
}

pub fn decode_handshake(payload: &[u8]) -> Result<Handshake, CodecError> {
    let mut r = Reader::new(payload);
    let id = r.varint()?;
    if id != ids::handshake::INTENTION {
        // The handshake state has exactly one packet; anything else is
        // garbage framing.
        return Err(CodecError::ShortRead);
    }
    Ok(Handshake {
        protocol_version: r.varint()?,
        server_address: r.string(255)?,
        server_port: r.u16()?,
        next_state: r.varint()?,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusPacket {
    Request,
    Ping { payload: i64 },
    Unknown { id: i32 },
}

pub fn decode_status(payload: &[u8]) -> Result<StatusPacket, CodecError> {
    let mut r = Reader::new(payload);
    match r.varint()? {
        ids::status::SB_REQUEST => Ok(StatusPacket::Request),
        ids::status::SB_PING => Ok(StatusPacket::Ping {
            payload: r.i64()?,
        }),
        id => Ok(StatusPacket::Unknown { id }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginPacket {
    Start { username: String, uuid: u128 },
    Acknowledged,
    Unknown { id: i32 },
}

pub fn decode_login(payload: &[u8]) -> Result<LoginPacket, CodecError> {
    let mut r = Reader::new(payload);
    match r.varint()? {
        ids::login::SB_START => Ok(LoginPacket::Start {
            username: r.string(MAX_USERNAME_LEN)?,
            uuid: r.u128()?,
        }),
        ids::login::SB_ACKNOWLEDGED => Ok(LoginPacket::Acknowledged),
        id => Ok(LoginPacket::Unknown { id }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigPacket {
    ClientInformation,
    KnownPacks,
    FinishAck,
    KeepAlive { id: i64 },
    Unknown { id: i32 },
}

pub fn decode_config(payload: &[u8]) -> Result<ConfigPacket, CodecError> {
    let mut r = Reader::new(payload);
    match r.varint()? {
        ids::config::SB_CLIENT_INFORMATION => Ok(ConfigPacket::ClientInformation),
        ids::config::SB_KNOWN_PACKS => Ok(ConfigPacket::KnownPacks),
        ids::config::SB_FINISH_ACK => Ok(ConfigPacket::FinishAck),
        ids::config::SB_KEEP_ALIVE => Ok(ConfigPacket::KeepAlive { id: r.i64()? }),
        id => Ok(ConfigPacket::Unknown { id }),
    }
}

/// Dig states within `PlayerAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigStatus {
    Started,
    Cancelled,
    Finished,
    Other(i32),
}

impl DigStatus {
    fn from_raw(raw: i32) -> Self {
        match raw {
            0 => DigStatus::Started,
            1 => DigStatus::Cancelled,
            2 => DigStatus::Finished,
            other => DigStatus::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayPacket {
    ConfirmTeleport {
        teleport_id: i32,
    },
    Chat {
        message: String,
    },
    ClickContainer {
        window_id: i32,
        slot: i16,
        button: i8,
        mode: i32,
    },
    CloseContainer {
        window_id: i32,
    },
    KeepAlive {
        id: i64,
    },
    MovePosition {
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
    },
    MovePositionRotation {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    MoveRotation {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    MoveFlags {
        on_ground: bool,
    },
    PlayerAction {
        status: DigStatus,
        x: i32,
        y: i32,
        z: i32,
        face: u8,
        sequence: i32,
    },
    SetHeldItem {
        slot: i16,
    },
    SwingArm,
    UseItemOn {
        hand: i32,
        x: i32,
        y: i32,
        z: i32,
        face: i32,
        sequence: i32,
    },
    UseItem,
    Unknown {
        id: i32,
    },
}

pub fn decode_play(payload: &[u8]) -> Result<PlayPacket, CodecError> {
    let mut r = Reader::new(payload);
    let packet = match r.varint()? {
        ids::play_sb::CONFIRM_TELEPORT => PlayPacket::ConfirmTeleport {
            teleport_id: r.varint()?,
        },
        ids::play_sb::CHAT => PlayPacket::Chat {
            message: r.string(MAX_CHAT_LEN)?,
        },
        ids::play_sb::CLICK_CONTAINER => {
            let window_id = r.varint()?;
            let _state_id = r.varint()?;
            let slot = r.i16()?;
            let button = r.i8()?;
            let mode = r.varint()?;
            PlayPacket::ClickContainer {
                window_id,
                slot,
                button,
                mode,
            }
        }
        ids::play_sb::CLOSE_CONTAINER => PlayPacket::CloseContainer {
            window_id: r.varint()?,
        },
        ids::play_sb::KEEP_ALIVE => PlayPacket::KeepAlive { id: r.i64()? },
        ids::play_sb::MOVE_POSITION => PlayPacket::MovePosition {
            x: r.f64()?,
            y: r.f64()?,
            z: r.f64()?,
            on_ground: r.u8()? & 1 != 0,
        },
        ids::play_sb::MOVE_POSITION_ROTATION => PlayPacket::MovePositionRotation {
            x: r.f64()?,
            y: r.f64()?,
            z: r.f64()?,
            yaw: r.f32()?,
            pitch: r.f32()?,
            on_ground: r.u8()? & 1 != 0,
        },
        ids::play_sb::MOVE_ROTATION => PlayPacket::MoveRotation {
            yaw: r.f32()?,
            pitch: r.f32()?,
            on_ground: r.u8()? & 1 != 0,
        },
        ids::play_sb::MOVE_FLAGS => PlayPacket::MoveFlags {
            on_ground: r.u8()? & 1 != 0,
        },
        ids::play_sb::PLAYER_ACTION => {
            let status = DigStatus::from_raw(r.varint()?);
            let (x, y, z) = r.position()?;
            let face = r.u8()?;
            let sequence = r.varint()?;
            PlayPacket::PlayerAction {
                status,
                x,
                y,
                z,
                face,
                sequence,
            }
        }
        ids::play_sb::SET_HELD_ITEM => PlayPacket::SetHeldItem { slot: r.i16()? },
        ids::play_sb::SWING_ARM => PlayPacket::SwingArm,
        ids::play_sb::USE_ITEM_ON => {
            let hand = r.varint()?;
            let (x, y, z) = r.position()?;
            let face = r.varint()?;
            // Cursor position and inside-block flag are irrelevant to a
            // voxel-grid placement.
            let _cx = r.f32()?;
            let _cy = r.f32()?;
            let _cz = r.f32()?;
            let _inside = r.bool()?;
            let _world_border_hit = r.bool()?;
            let sequence = r.varint()?;
            PlayPacket::UseItemOn {
                hand,
                x,
                y,
                z,
                face,
                sequence,
            }
        }
        ids::play_sb::USE_ITEM => PlayPacket::UseItem,
        id => PlayPacket::Unknown { id },
    };
    Ok(packet)
}

/// Whether a play-state packet id is a movement packet (stale-drain set).
pub fn is_movement_id(id: i32) -> bool {
    (ids::play_sb::MOVE_POSITION..=ids::play_sb::MOVE_FLAGS).contains(&id)
}

// ---------------------------------------------------------------------------
// Clientbound building
// ---------------------------------------------------------------------------

/// Minimal network-NBT text component: an unnamed TAG_String.
fn write_text_component(w: &mut Writer, text: &str) {
    w.u8(0x08);
    w.u16(text.len() as u16);
    w.raw(text.as_bytes());
}

pub fn status_response(json: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::status::CB_RESPONSE).string(json);
    w.into_inner()
}

pub fn status_pong(payload: i64) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::status::CB_PONG).i64(payload);
    w.into_inner()
}

/// Login disconnect carries a JSON reason.
pub fn login_disconnect(reason: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::login::CB_DISCONNECT);
    w.string(&format!("{{\"text\":{}}}", serde_json::Value::from(reason)));
    w.into_inner()
}

/// Compression stays off: a negative threshold tells the client no packet
/// is ever compressed.
pub fn login_set_compression(threshold: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::login::CB_SET_COMPRESSION);
    w.varint(threshold);
    w.into_inner()
}

pub fn login_success(uuid: u128, username: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::login::CB_SUCCESS);
    w.u128(uuid);
    w.string(username);
    // No profile properties without online mode.
    w.varint(0);
    w.into_inner()
}

/// Our half of the known-packs exchange: core pack only.
pub fn config_known_packs() -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::config::CB_KNOWN_PACKS);
    w.varint(1);
    w.string("minecraft").string("core").string(GAME_VERSION);
    w.into_inner()
}

/// A registry-data packet replayed verbatim from the extracted dump.
pub fn config_registry_data(blob: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::config::CB_REGISTRY_DATA);
    w.raw(blob);
    w.into_inner()
}

/// Tag lists replayed verbatim from the extracted dump.
pub fn config_update_tags(blob: &[u8]) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::config::CB_UPDATE_TAGS);
    w.raw(blob);
    w.into_inner()
}

pub fn config_finish() -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::config::CB_FINISH);
    w.into_inner()
}

pub fn config_disconnect(reason: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::config::CB_DISCONNECT);
    write_text_component(&mut w, reason);
    w.into_inner()
}

/// Fields the login-play packet needs from the server.
#[derive(Debug, Clone)]
pub struct LoginPlay {
    pub entity_id: i32,
    pub view_distance: i32,
    pub max_players: i32,
    pub hashed_seed: i64,
    pub dimension_name: String,
}

pub fn play_login(info: &LoginPlay) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::LOGIN);
    w.i32(info.entity_id);
    w.bool(false); // hardcore
    w.varint(1).string(&info.dimension_name);
    w.varint(info.max_players);
    w.varint(info.view_distance);
    w.varint(info.view_distance); // simulation distance
    w.bool(false); // reduced debug info
    w.bool(true); // enable respawn screen
    w.bool(false); // limited crafting
    w.varint(0); // dimension type registry index
    w.string(&info.dimension_name);
    w.i64(info.hashed_seed);
    w.u8(0); // gamemode: survival
    w.i8(-1); // previous gamemode: none
    w.bool(false); // debug world
    w.bool(false); // flat world
    w.bool(false); // death location
    w.varint(0); // portal cooldown
    w.varint(63); // sea level
    w.bool(false); // enforces secure chat
    w.into_inner()
}

pub fn play_game_event(event: u8, value: f32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::GAME_EVENT);
    w.u8(event);
    w.f32(value);
    w.into_inner()
}

pub fn play_keep_alive(id: i64) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::KEEP_ALIVE).i64(id);
    w.into_inner()
}

pub fn play_set_time(world_age: i64, day_time: i64) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SET_TIME);
    w.i64(world_age);
    w.i64(day_time);
    w.bool(true); // client keeps advancing time between updates
    w.into_inner()
}

pub fn play_block_update(x: i32, y: i32, z: i32, block_state: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::BLOCK_UPDATE);
    w.position(x, y, z);
    w.varint(block_state);
    w.into_inner()
}

/// Acknowledge a client block-action sequence number so the client drops
/// its prediction for it.
pub fn play_ack_block_change(sequence: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::ACK_BLOCK_CHANGE);
    w.varint(sequence);
    w.into_inner()
}

pub fn play_set_default_spawn(x: i32, y: i32, z: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SET_DEFAULT_SPAWN);
    w.position(x, y, z);
    w.f32(0.0); // spawn angle
    w.into_inner()
}

pub fn play_sync_position(teleport_id: i32, x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SYNC_PLAYER_POSITION);
    w.varint(teleport_id);
    w.f64(x).f64(y).f64(z);
    // Zero velocity on teleport.
    w.f64(0.0).f64(0.0).f64(0.0);
    w.f32(yaw).f32(pitch);
    w.i32(0); // absolute flags
    w.into_inner()
}

pub fn play_set_center_chunk(cx: i32, cz: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SET_CENTER_CHUNK);
    w.varint(cx).varint(cz);
    w.into_inner()
}

pub fn play_unload_chunk(cx: i32, cz: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::UNLOAD_CHUNK);
    // Z before X in this packet.
    w.i32(cz).i32(cx);
    w.into_inner()
}

pub fn play_disconnect(reason: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::DISCONNECT);
    write_text_component(&mut w, reason);
    w.into_inner()
}

pub fn play_system_chat(message: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SYSTEM_CHAT);
    write_text_component(&mut w, message);
    w.bool(false); // not an overlay/actionbar
    w.into_inner()
}

/// One chunk section ready for the wire.
pub struct SectionData<'a> {
    /// Non-air block count for the client's heuristics.
    pub non_air: u16,
    /// 4096 palette indices in the reversed-octet layout, sent verbatim.
    pub bytes: &'a [u8; 4096],
    /// Biome registry index for the whole section.
    pub biome: i32,
}

/// Level chunk with light. Sections are 8-bit indirect-paletted with the
/// full palette table; the reversed-octet cache layout is exactly the
/// big-endian long array the client expects, so section bytes are copied
/// straight in.
pub fn play_chunk_data(cx: i32, cz: i32, sections: &[SectionData<'_>], palette: &[i32]) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::CHUNK_DATA);
    w.i32(cx).i32(cz);

    // Heightmaps: none; the client recomputes what it needs.
    w.varint(0);

    // Section payloads.
    let mut body = Writer::new();
    for section in sections {
        body.i16(section.non_air as i16);
        // Block states: 8 bits per entry, indirect palette over the full
        // block-state table.
        body.u8(8);
        body.varint(palette.len() as i32);
        for &state in palette {
            body.varint(state);
        }
        body.varint((section.bytes.len() / 8) as i32);
        body.raw(&section.bytes[..]);
        // Biomes: single-value palette.
        body.u8(0);
        body.varint(section.biome);
        body.varint(0);
    }
    w.varint(body.len() as i32);
    w.raw(body.as_slice());

    // Block entities: none.
    w.varint(0);

    // Light: full-bright sky light over every section, no block light.
    let section_count = sections.len();
    let light_sections = section_count + 2;
    let sky_mask: u64 = if light_sections >= 64 {
        u64::MAX
    } else {
        (1u64 << light_sections) - 1
    };
    w.varint(1).u64(sky_mask); // sky light mask
    w.varint(0); // block light mask
    w.varint(0); // empty sky light mask
    w.varint(1).u64(sky_mask); // empty block light mask
    w.varint(light_sections as i32);
    for _ in 0..light_sections {
        w.varint(2048);
        w.raw(&[0xFF; 2048]);
    }
    w.varint(0); // block light arrays
    w.into_inner()
}

pub fn play_spawn_entity(
    entity_id: i32,
    uuid: u128,
    kind: i32,
    x: f64,
    y: f64,
    z: f64,
    yaw: f32,
    pitch: f32,
) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SPAWN_ENTITY);
    w.varint(entity_id);
    w.u128(uuid);
    w.varint(kind);
    w.f64(x).f64(y).f64(z);
    w.u8(angle_byte(pitch));
    w.u8(angle_byte(yaw));
    w.u8(angle_byte(yaw)); // head yaw
    w.varint(0); // data
    w.i16(0).i16(0).i16(0); // velocity
    w.into_inner()
}

pub fn play_remove_entities(entity_ids: &[i32]) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::REMOVE_ENTITIES);
    w.varint(entity_ids.len() as i32);
    for &id in entity_ids {
        w.varint(id);
    }
    w.into_inner()
}

/// Relative entity move; deltas are in 1/4096ths of a block and must stay
/// within ±8 blocks.
pub fn play_entity_move(entity_id: i32, dx: f64, dy: f64, dz: f64, on_ground: bool) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::MOVE_ENTITY_POSITION);
    w.varint(entity_id);
    w.i16(delta_fixed(dx)).i16(delta_fixed(dy)).i16(delta_fixed(dz));
    w.bool(on_ground);
    w.into_inner()
}

pub fn play_entity_move_rotate(
    entity_id: i32,
    dx: f64,
    dy: f64,
    dz: f64,
    yaw: f32,
    pitch: f32,
    on_ground: bool,
) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::MOVE_ENTITY_POSITION_ROTATION);
    w.varint(entity_id);
    w.i16(delta_fixed(dx)).i16(delta_fixed(dy)).i16(delta_fixed(dz));
    w.u8(angle_byte(yaw)).u8(angle_byte(pitch));
    w.bool(on_ground);
    w.into_inner()
}

/// Absolute entity teleport, used when deltas overflow or for periodic
/// keyframes under mob interpolation.
pub fn play_entity_teleport(
    entity_id: i32,
    x: f64,
    y: f64,
    z: f64,
    yaw: f32,
    pitch: f32,
    on_ground: bool,
) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SYNC_ENTITY_POSITION);
    w.varint(entity_id);
    w.f64(x).f64(y).f64(z);
    w.f64(0.0).f64(0.0).f64(0.0); // velocity
    w.f32(yaw).f32(pitch);
    w.bool(on_ground);
    w.into_inner()
}

pub fn play_open_screen(window_id: i32, screen_kind: i32, title: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::OPEN_SCREEN);
    w.varint(window_id);
    w.varint(screen_kind);
    write_text_component(&mut w, title);
    w.into_inner()
}

/// An item stack on the wire: `(item_id, count)`, id in the item registry.
pub type WireSlot = Option<(i32, u8)>;

fn write_slot(w: &mut Writer, slot: WireSlot) {
    match slot {
        None => {
            w.varint(0);
        }
        Some((item, count)) => {
            w.varint(count as i32);
            w.varint(item);
            // No data components either way.
            w.varint(0);
            w.varint(0);
        }
    }
}

pub fn play_container_content(window_id: i32, state_id: i32, slots: &[WireSlot]) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SET_CONTAINER_CONTENT);
    w.varint(window_id);
    w.varint(state_id);
    w.varint(slots.len() as i32);
    for &slot in slots {
        write_slot(&mut w, slot);
    }
    write_slot(&mut w, None); // carried item
    w.into_inner()
}

pub fn play_container_slot(window_id: i32, state_id: i32, slot_index: i16, slot: WireSlot) -> Vec<u8> {
    let mut w = Writer::new();
    w.varint(ids::play_cb::SET_CONTAINER_SLOT);
    w.varint(window_id);
    w.varint(state_id);
    w.i16(slot_index);
    write_slot(&mut w, slot);
    w.into_inner()
}

fn angle_byte(degrees: f32) -> u8 {
    ((degrees / 360.0) * 256.0) as i32 as u8
}

fn delta_fixed(delta: f64) -> i16 {
    (delta * 4096.0).clamp(i16::MIN as f64, i16::MAX as f64) as i16
}
