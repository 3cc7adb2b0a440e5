//! Play-state packet handlers.
//!
//! Handlers mutate the session and the world, and report cross-session
//! effects as [`WorldEvent`]s; the server loop applies those to every
//! other session so broadcasts happen after the edit that caused them.

use crate::config::ServerConfig;
use crate::registry::RegistryStore;
use crate::session::{OpenWindow, Session, SessionState};
use crate::WorldState;
use picocraft_net::{
    decode_play, play_ack_block_change, play_block_update, play_container_content,
    play_open_screen, play_set_center_chunk, DigStatus, NetError, PlayPacket, Transport, WireSlot,
};
use picocraft_world::{
    self as world_crate, Block, Chest, ItemStack, CHEST_SIZE, HOTBAR_START, SLOT_CRAFT_START,
    SLOT_RESULT,
};
use tracing::debug;

/// Maximum reach for digging and placing, squared.
const REACH_SQ: f64 = 36.0;

/// Screen kind id for a generic 9x3 container.
const SCREEN_GENERIC_9X3: i32 = 2;

/// Cross-session effects produced by one session's packet.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    BlockChanged { x: i32, y: u8, z: i32, block: Block },
    Chat { from: String, message: String },
}

pub fn handle_play<T: Transport>(
    session: &mut Session<T>,
    payload: &[u8],
    world: &mut WorldState,
    registries: &RegistryStore,
    config: &ServerConfig,
    events: &mut Vec<WorldEvent>,
) -> Result<(), NetError> {
    match decode_play(payload)? {
        PlayPacket::ConfirmTeleport { teleport_id } => {
            if session.pending_teleport == Some(teleport_id) {
                session.pending_teleport = None;
            }
        }
        PlayPacket::KeepAlive { id } => {
            if session.pending_keepalive == Some(id) {
                session.pending_keepalive = None;
                session.last_keepalive_ack = std::time::Instant::now();
            }
        }
        PlayPacket::MovePosition { x, y, z, on_ground } => {
            apply_move(session, Some((x, y, z)), None, on_ground)?;
        }
        PlayPacket::MovePositionRotation {
            x,
            y,
            z,
            yaw,
            pitch,
            on_ground,
        } => {
            apply_move(session, Some((x, y, z)), Some((yaw, pitch)), on_ground)?;
        }
        PlayPacket::MoveRotation { yaw, pitch, on_ground } => {
            apply_move(session, None, Some((yaw, pitch)), on_ground)?;
        }
        PlayPacket::MoveFlags { on_ground } => {
            session.on_ground = on_ground;
        }
        PlayPacket::Chat { message } => {
            if !message.is_empty() {
                events.push(WorldEvent::Chat {
                    from: session.username.clone(),
                    message,
                });
            }
        }
        PlayPacket::PlayerAction {
            status,
            x,
            y,
            z,
            sequence,
            ..
        } => {
            // Survival clients send started + finished; the break lands
            // on the finish. Every action gets its sequence acknowledged
            // so client prediction settles.
            if status == DigStatus::Finished {
                dig(session, world, registries, x, y, z, events)?;
            }
            session.conn.write_packet(&play_ack_block_change(sequence))?;
        }
        PlayPacket::UseItemOn {
            x, y, z, face, sequence, ..
        } => {
            use_item_on(session, world, registries, config, x, y, z, face, events)?;
            session.conn.write_packet(&play_ack_block_change(sequence))?;
        }
        PlayPacket::UseItem => {}
        PlayPacket::SetHeldItem { slot } => {
            if (0..=8).contains(&slot) {
                session.inventory.selected = slot as u8;
            }
        }
        PlayPacket::SwingArm => {}
        PlayPacket::ClickContainer {
            window_id,
            slot,
            mode,
            ..
        } => {
            click_container(session, world, registries, window_id, slot, mode)?;
        }
        PlayPacket::CloseContainer { .. } => {
            close_container(session);
        }
        PlayPacket::Unknown { id } => {
            debug!(id = format_args!("{id:#04x}"), "unknown play packet discarded");
        }
    }
    Ok(())
}

/// Movement: the server trusts client positions within sanity bounds,
/// like the upstream loop. Crossing a chunk border re-centers the view
/// and re-queues the streaming window.
fn apply_move<T: Transport>(
    session: &mut Session<T>,
    position: Option<(f64, f64, f64)>,
    rotation: Option<(f32, f32)>,
    on_ground: bool,
) -> Result<(), NetError> {
    // Ignore stale movement while a teleport is unconfirmed.
    if session.pending_teleport.is_some() {
        return Ok(());
    }
    let before = session.chunk_pos();
    if let Some((x, y, z)) = position {
        if !x.is_finite() || !y.is_finite() || !z.is_finite() {
            return Ok(());
        }
        session.x = x;
        session.y = y.clamp(-64.0, 512.0);
        session.z = z;
    }
    if let Some((yaw, pitch)) = rotation {
        session.yaw = yaw;
        session.pitch = pitch;
    }
    session.on_ground = on_ground;

    let after = session.chunk_pos();
    if before != after {
        session
            .conn
            .write_packet(&play_set_center_chunk(after.0, after.1))?;
        session.queue_view_chunks();
    }
    Ok(())
}

fn within_reach<T: Transport>(session: &Session<T>, x: i32, y: i32, z: i32) -> bool {
    let dx = x as f64 + 0.5 - session.x;
    let dy = y as f64 + 0.5 - (session.y + 1.6);
    let dz = z as f64 + 0.5 - session.z;
    dx * dx + dy * dy + dz * dz <= REACH_SQ
}

/// Break a block: validate, overlay, invalidate, hand out the drop, and
/// queue the broadcast.
fn dig<T: Transport>(
    session: &mut Session<T>,
    world: &mut WorldState,
    registries: &RegistryStore,
    x: i32,
    y: i32,
    z: i32,
    events: &mut Vec<WorldEvent>,
) -> Result<(), NetError> {
    if !(0..=255).contains(&y) || !within_reach(session, x, y, z) {
        return Ok(());
    }
    let y8 = y as u8;
    let current = world.engine.block_at(x, y, z);
    if current == world_crate::BLOCK_AIR || world_crate::is_unbreakable(current) {
        // Resend the truth so a mispredicting client heals.
        let state = registries.block_states.state_for(current);
        session.conn.write_packet(&play_block_update(x, y, z, state))?;
        return Ok(());
    }

    if world.engine.set_block(x, y8, z, world_crate::BLOCK_AIR).is_err() {
        return Err(NetError::WorldFull);
    }
    if current == world_crate::BLOCK_CHEST {
        world.chests.remove(&(x, y8, z));
    }
    if let Some(drop) = world_crate::mined_drop(current) {
        let leftover = session.inventory.give(drop, 1);
        if leftover > 0 {
            debug!("inventory full, drop discarded");
        }
    }
    world.fluids.disturb(&world.engine, x, y8, z);
    events.push(WorldEvent::BlockChanged {
        x,
        y: y8,
        z,
        block: world_crate::BLOCK_AIR,
    });
    Ok(())
}

/// Use-item-on either opens a chest or places the held block against the
/// clicked face.
#[allow(clippy::too_many_arguments)]
fn use_item_on<T: Transport>(
    session: &mut Session<T>,
    world: &mut WorldState,
    registries: &RegistryStore,
    config: &ServerConfig,
    x: i32,
    y: i32,
    z: i32,
    face: i32,
    events: &mut Vec<WorldEvent>,
) -> Result<(), NetError> {
    if !(0..=255).contains(&y) || !within_reach(session, x, y, z) {
        return Ok(());
    }

    let clicked = world.engine.block_at(x, y, z);
    if clicked == world_crate::BLOCK_CHEST && config.allow_chests {
        return open_chest(session, world, registries, (x, y as u8, z));
    }

    let held = session.inventory.held();
    if held.is_empty() || !is_placeable(held.item) {
        return Ok(());
    }
    if held.item == world_crate::BLOCK_CHEST && !config.allow_chests {
        return Ok(());
    }

    let (tx, ty, tz) = offset_by_face(x, y, z, face);
    if !(0..=255).contains(&ty) || !within_reach(session, tx, ty, tz) {
        return Ok(());
    }
    let target = world.engine.block_at(tx, ty, tz);
    if !world_crate::is_replaceable(target) {
        return Ok(());
    }
    // Refuse to entomb the placer.
    if overlaps_player(session, tx, ty, tz) {
        return Ok(());
    }

    let ty8 = ty as u8;
    if world.engine.set_block(tx, ty8, tz, held.item).is_err() {
        return Err(NetError::WorldFull);
    }
    if held.item == world_crate::BLOCK_CHEST {
        world.chests.insert((tx, ty8, tz), Chest::default());
    }
    session.inventory.consume_held(1);
    world.fluids.disturb(&world.engine, tx, ty8, tz);
    events.push(WorldEvent::BlockChanged {
        x: tx,
        y: ty8,
        z: tz,
        block: held.item,
    });
    Ok(())
}

fn is_placeable(item: Block) -> bool {
    item != world_crate::BLOCK_AIR
        && world_crate::is_known(item)
        && (item as usize) < world_crate::ITEM_STICK as usize
}

fn offset_by_face(x: i32, y: i32, z: i32, face: i32) -> (i32, i32, i32) {
    match face {
        0 => (x, y - 1, z),
        1 => (x, y + 1, z),
        2 => (x, y, z - 1),
        3 => (x, y, z + 1),
        4 => (x - 1, y, z),
        _ => (x + 1, y, z),
    }
}

fn overlaps_player<T: Transport>(session: &Session<T>, x: i32, y: i32, z: i32) -> bool {
    let feet = session.y.floor() as i32;
    let px = session.x.floor() as i32;
    let pz = session.z.floor() as i32;
    px == x && pz == z && (y == feet || y == feet + 1)
}

fn open_chest<T: Transport>(
    session: &mut Session<T>,
    world: &mut WorldState,
    registries: &RegistryStore,
    pos: (i32, u8, i32),
) -> Result<(), NetError> {
    let window_id = session.next_window_id();
    session.open_window = Some(OpenWindow {
        id: window_id,
        chest: pos,
    });
    session
        .conn
        .write_packet(&play_open_screen(window_id, SCREEN_GENERIC_9X3, "Chest"))?;
    sync_open_window(session, world, registries)
}

fn close_container<T: Transport>(session: &mut Session<T>) {
    session.open_window = None;
    // Whatever rode the cursor goes back to the inventory.
    if !session.cursor.is_empty() {
        let cursor = session.cursor;
        session.inventory.give(cursor.item, cursor.count);
        session.cursor = ItemStack::default();
    }
}

/// Wire slot for an item stack under the item-registry mapping.
fn wire_slot(registries: &RegistryStore, stack: ItemStack) -> WireSlot {
    if stack.is_empty() {
        None
    } else {
        Some((registries.items.item_for(stack.item), stack.count))
    }
}

/// The player's main and hotbar rows as they appear at the tail of every
/// container window.
fn push_player_slots<T: Transport>(
    session: &Session<T>,
    registries: &RegistryStore,
    slots: &mut Vec<WireSlot>,
) {
    let inv = &session.inventory;
    for i in 5..HOTBAR_START {
        slots.push(wire_slot(registries, inv.slot(i)));
    }
    for i in HOTBAR_START..HOTBAR_START + 9 {
        slots.push(wire_slot(registries, inv.slot(i)));
    }
}

/// Resend the full contents of whichever window is open, window 0 (the
/// player inventory) otherwise. Plain full resyncs keep the container
/// logic honest without tracking per-slot deltas.
fn sync_open_window<T: Transport>(
    session: &mut Session<T>,
    world: &WorldState,
    registries: &RegistryStore,
) -> Result<(), NetError> {
    match session.open_window {
        Some(window) => {
            let chest = world.chests.get(&window.chest);
            let mut slots: Vec<WireSlot> = Vec::with_capacity(CHEST_SIZE + 36);
            for i in 0..CHEST_SIZE {
                let stack = chest.map(|c| c.slot(i)).unwrap_or_default();
                slots.push(wire_slot(registries, stack));
            }
            push_player_slots(session, registries, &mut slots);
            let payload = play_container_content(window.id, 0, &slots);
            session.conn.write_packet(&payload)
        }
        None => {
            let inv = &session.inventory;
            let mut slots: Vec<WireSlot> = Vec::with_capacity(46);
            // Result, crafting grid, armor (unused), main, hotbar.
            slots.push(wire_slot(registries, inv.slot(SLOT_RESULT)));
            for i in SLOT_CRAFT_START..SLOT_CRAFT_START + 4 {
                slots.push(wire_slot(registries, inv.slot(i)));
            }
            for _ in 0..4 {
                slots.push(None);
            }
            for i in 5..HOTBAR_START {
                slots.push(wire_slot(registries, inv.slot(i)));
            }
            for i in HOTBAR_START..HOTBAR_START + 9 {
                slots.push(wire_slot(registries, inv.slot(i)));
            }
            slots.push(None); // offhand
            let payload = play_container_content(0, 0, &slots);
            session.conn.write_packet(&payload)
        }
    }
}

/// Map a wire slot index of the player window to our inventory index.
/// Armor and offhand slots have no storage and return `None`.
fn player_window_slot(wire: i16) -> Option<usize> {
    match wire {
        0 => Some(SLOT_RESULT),
        1..=4 => Some(wire as usize),
        5..=8 => None,
        9..=35 => Some(wire as usize - 4),
        36..=44 => Some(HOTBAR_START + wire as usize - 36),
        _ => None,
    }
}

/// Simple pickup/place click handling: the cursor swaps or merges with
/// the clicked slot. Crafting results are taken through the recipe
/// engine. A full resync follows every click.
fn click_container<T: Transport>(
    session: &mut Session<T>,
    world: &mut WorldState,
    registries: &RegistryStore,
    window_id: i32,
    slot: i16,
    _mode: i32,
) -> Result<(), NetError> {
    match session.open_window {
        Some(window) if window.id == window_id => {
            let chest_slots = CHEST_SIZE as i16;
            if slot >= 0 && slot < chest_slots {
                if let Some(chest) = world.chests.get_mut(&window.chest) {
                    let current = chest.slot(slot as usize);
                    let cursor = session.cursor;
                    let (new_slot, new_cursor) = click_swap(current, cursor);
                    chest.set_slot(slot as usize, new_slot);
                    session.cursor = new_cursor;
                }
            } else if slot >= chest_slots {
                // Player section of the chest window: 27 main, then 9
                // hotbar.
                let rel = (slot - chest_slots) as usize;
                let index = if rel < 27 { 5 + rel } else { HOTBAR_START + rel - 27 };
                let current = session.inventory.slot(index);
                let cursor = session.cursor;
                let (new_slot, new_cursor) = click_swap(current, cursor);
                session.inventory.set_slot(index, new_slot);
                session.cursor = new_cursor;
            }
        }
        _ if window_id == 0 => {
            if slot == SLOT_RESULT as i16 {
                if let Some(crafted) = session.inventory.take_craft_result() {
                    let leftover = session.inventory.give(crafted.item, crafted.count);
                    if leftover > 0 {
                        debug!("crafted items did not fit, {leftover} discarded");
                    }
                }
            } else if let Some(index) = player_window_slot(slot) {
                let current = session.inventory.slot(index);
                let cursor = session.cursor;
                let (new_slot, new_cursor) = click_swap(current, cursor);
                session.inventory.set_slot(index, new_slot);
                session.cursor = new_cursor;
                if (SLOT_CRAFT_START..SLOT_CRAFT_START + 4).contains(&index) {
                    session.inventory.refresh_craft_result();
                }
            }
        }
        _ => {
            debug!(window_id, "click for a window that is not open");
        }
    }
    sync_open_window(session, world, registries)
}

/// Cursor-versus-slot resolution: merge same items, otherwise swap.
fn click_swap(slot: ItemStack, cursor: ItemStack) -> (ItemStack, ItemStack) {
    if !slot.is_empty() && !cursor.is_empty() && slot.item == cursor.item {
        let room = 64u8.saturating_sub(slot.count);
        let moved = room.min(cursor.count);
        let merged = ItemStack::new(slot.item, slot.count + moved);
        let rest = cursor.count - moved;
        let remaining = if rest == 0 {
            ItemStack::default()
        } else {
            ItemStack::new(cursor.item, rest)
        };
        (merged, remaining)
    } else {
        (cursor, slot)
    }
}

/// Sessions that should see a block update at the given position.
pub fn sees_chunk(loaded: &std::collections::HashSet<(i32, i32)>, x: i32, z: i32) -> bool {
    loaded.contains(&(x.div_euclid(16), z.div_euclid(16)))
}

/// Close-out used when a session dies mid-window.
pub fn abandon_session_state<T: Transport>(session: &mut Session<T>) {
    if session.state == SessionState::Play {
        close_container(session);
    }
}
