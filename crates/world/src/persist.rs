//! World persistence.
//!
//! A single little-endian flat file: header (magic + version), world seed,
//! day time, the block-change records, then per-player records. Loading is
//! tolerant of damage: any truncation or invalid content fails the load as
//! a whole so the caller keeps its pre-load state.

use crate::block;
use crate::changes::BlockChange;
use crate::inventory::{Inventory, ItemStack, INVENTORY_SIZE};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// "PCW1" little-endian.
const SAVE_MAGIC: u32 = 0x3157_4350;
const SAVE_VERSION: u16 = 1;

/// Longest username accepted from a save file.
const MAX_NAME_LEN: usize = 16;

/// Everything a world save captures.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedWorld {
    pub seed: u32,
    pub day_time: u64,
    pub changes: Vec<BlockChange>,
    pub players: Vec<SavedPlayer>,
}

/// Offline player state keyed by uuid.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedPlayer {
    pub username: String,
    pub uuid: u128,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub inventory: Inventory,
}

/// Serialize the world to `path`, replacing any previous save.
pub fn save_world(path: &Path, world: &SavedWorld) -> Result<()> {
    let mut out = Vec::with_capacity(64 + world.changes.len() * 10);
    out.extend_from_slice(&SAVE_MAGIC.to_le_bytes());
    out.extend_from_slice(&SAVE_VERSION.to_le_bytes());
    out.extend_from_slice(&world.seed.to_le_bytes());
    out.extend_from_slice(&world.day_time.to_le_bytes());

    out.extend_from_slice(&(world.changes.len() as u32).to_le_bytes());
    for change in &world.changes {
        out.extend_from_slice(&change.x.to_le_bytes());
        out.push(change.y);
        out.extend_from_slice(&change.z.to_le_bytes());
        out.push(change.block);
    }

    out.extend_from_slice(&(world.players.len() as u16).to_le_bytes());
    for player in &world.players {
        let name = player.username.as_bytes();
        out.push(name.len().min(MAX_NAME_LEN) as u8);
        out.extend_from_slice(&name[..name.len().min(MAX_NAME_LEN)]);
        out.extend_from_slice(&player.uuid.to_le_bytes());
        out.extend_from_slice(&player.x.to_le_bytes());
        out.extend_from_slice(&player.y.to_le_bytes());
        out.extend_from_slice(&player.z.to_le_bytes());
        out.extend_from_slice(&player.yaw.to_le_bytes());
        out.extend_from_slice(&player.pitch.to_le_bytes());
        out.push(player.inventory.selected);
        for slot in player.inventory.slots() {
            out.push(slot.item);
            out.push(slot.count);
        }
    }

    // Write to a sibling temp file first so a crash mid-write cannot
    // destroy the previous save.
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &out).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    info!(
        changes = world.changes.len(),
        players = world.players.len(),
        "world saved to {}",
        path.display()
    );
    Ok(())
}

/// Load a save. `Ok(None)` when the file does not exist; any malformed or
/// truncated content is an error and the caller keeps its current world.
pub fn load_world(path: &Path) -> Result<Option<SavedWorld>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };

    let mut cur = Cursor::new(&data);
    let magic = cur.u32()?;
    if magic != SAVE_MAGIC {
        bail!("bad save magic {magic:#010x}");
    }
    let version = cur.u16()?;
    if version != SAVE_VERSION {
        bail!("unsupported save version {version}");
    }

    let seed = cur.u32()?;
    let day_time = cur.u64()?;

    let change_count = cur.u32()? as usize;
    let mut changes = Vec::with_capacity(change_count.min(1 << 20));
    for _ in 0..change_count {
        let x = cur.i32()?;
        let y = cur.u8()?;
        let z = cur.i32()?;
        let b = cur.u8()?;
        if !block::is_known(b) {
            bail!("unknown block id {b} in saved block change at ({x}, {y}, {z})");
        }
        changes.push(BlockChange { x, y, z, block: b });
    }

    let player_count = cur.u16()? as usize;
    let mut players = Vec::with_capacity(player_count);
    for _ in 0..player_count {
        let name_len = cur.u8()? as usize;
        if name_len > MAX_NAME_LEN {
            bail!("player name length {name_len} exceeds limit");
        }
        let name_bytes = cur.bytes(name_len)?;
        let username = std::str::from_utf8(name_bytes)
            .context("player name is not UTF-8")?
            .to_string();
        let uuid = cur.u128()?;
        let x = cur.f64()?;
        let y = cur.f64()?;
        let z = cur.f64()?;
        let yaw = cur.f32()?;
        let pitch = cur.f32()?;
        let selected = cur.u8()?;
        if selected > 8 {
            bail!("selected hotbar slot {selected} out of range");
        }
        let mut inventory = Inventory::default();
        inventory.selected = selected;
        for slot in 0..INVENTORY_SIZE {
            let item = cur.u8()?;
            let count = cur.u8()?;
            if count > 0 && !block::is_known(item) {
                bail!("unknown item id {item} in saved inventory");
            }
            inventory.set_slot(slot, ItemStack::new(item, count));
        }
        players.push(SavedPlayer {
            username,
            uuid,
            x,
            y,
            z,
            yaw,
            pitch,
            inventory,
        });
    }

    if cur.remaining() != 0 {
        warn!(
            trailing = cur.remaining(),
            "ignoring trailing bytes in {}",
            path.display()
        );
    }

    Ok(Some(SavedWorld {
        seed,
        day_time,
        changes,
        players,
    }))
}

/// Little-endian slice reader; every read fails cleanly at EOF.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            bail!("save file truncated at offset {}", self.pos);
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.bytes(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.bytes(8)?.try_into().unwrap()))
    }

    fn u128(&mut self) -> Result<u128> {
        Ok(u128::from_le_bytes(self.bytes(16)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.bytes(8)?.try_into().unwrap()))
    }
}
