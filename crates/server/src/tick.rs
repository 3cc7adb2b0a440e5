//! The world tick: time, fluids, mobs, chunk streaming, keepalives.

use crate::{mob_uuid, Server};
use picocraft_net::{
    play_chunk_data, play_entity_move_rotate, play_entity_teleport, play_remove_entities,
    play_set_time, play_spawn_entity, play_unload_chunk, Listener, SectionData,
};
use picocraft_world::{Mob, MobKind, MobStep, SECTION_BYTES};
use tracing::{debug, warn};

/// Chunk columns streamed per player per tick.
const COLUMNS_PER_TICK: usize = 2;
/// Fluids advance every this many world ticks.
const FLUID_TICK_DIVIDER: u64 = 5;
/// Keyframe cadence under opt-in mob interpolation, in ticks.
const MOB_KEYFRAME_INTERVAL: u64 = 20;
/// Sections per column for the 0..=255 build height.
const SECTIONS_PER_COLUMN: usize = 16;

impl<L: Listener> Server<L> {
    /// One fixed-cadence world tick. Order matters: inbound packets were
    /// already drained by the poll pass, so time, fluids and mobs see the
    /// freshest world, then per-player streaming and flushes go out.
    pub fn world_tick(&mut self) {
        let time_due = self.world.time.advance();
        if time_due {
            let payload = play_set_time(
                self.world.time.tick as i64,
                self.world.time.day_time as i64,
            );
            for session in self.sessions_mut() {
                if session.is_playing() {
                    let _ = session.conn.write_packet(&payload);
                }
            }
        }

        if let Some(weather) = self.world.weather.tick(&mut self.rng) {
            let event = match weather {
                picocraft_world::Weather::Raining => picocraft_net::GAME_EVENT_BEGIN_RAIN,
                picocraft_world::Weather::Clear => picocraft_net::GAME_EVENT_END_RAIN,
            };
            let payload = picocraft_net::play_game_event(event, 0.0);
            for session in &mut self.sessions {
                if session.is_playing() {
                    let _ = session.conn.write_packet(&payload);
                }
            }
        }

        if self.config.do_fluid_flow && self.world.time.tick % FLUID_TICK_DIVIDER == 0 {
            self.tick_fluids();
        }

        self.tick_mobs();
        self.maybe_spawn_mob();
        self.tick_keepalives();
        self.stream_chunks();

        for session in self.sessions_mut() {
            if session.is_playing() {
                if let Err(err) = session.conn.packet_flush() {
                    warn!(username = %session.username, "flush failed: {err}");
                    session.kick("Connection lost");
                }
            }
        }
    }

    fn tick_fluids(&mut self) {
        let updates = self.world.fluids.tick(&mut self.world.engine);
        if updates.is_empty() {
            return;
        }
        for update in updates {
            let state = self.registries.block_states.state_for(update.block);
            let payload =
                picocraft_net::play_block_update(update.x, update.y as i32, update.z, state);
            for session in &mut self.sessions {
                if session.is_playing()
                    && crate::gameplay::sees_chunk(&session.loaded_chunks, update.x, update.z)
                {
                    let _ = session.conn.write_packet(&payload);
                }
            }
        }
    }

    /// AI step, movement, and packet fan-out for every mob.
    fn tick_mobs(&mut self) {
        let players: Vec<(i32, f64, f64, f64)> = self
            .sessions()
            .iter()
            .filter(|s| s.is_playing())
            .map(|s| (s.entity_id, s.x, s.y, s.z))
            .collect();

        let tick = self.world.time.tick;
        let keyframe = self.config.mob_interpolation && tick % MOB_KEYFRAME_INTERVAL == 0;

        let mut mobs = std::mem::take(&mut self.world.mobs);
        let mut despawned: Vec<i32> = Vec::new();
        mobs.retain_mut(|mob| {
            match mob.tick(&self.world.engine, &players, &mut self.rng, tick) {
                MobStep::Despawn => {
                    despawned.push(mob.id);
                    false
                }
                MobStep::Idle => {
                    if keyframe {
                        self.broadcast_mob_keyframe(mob);
                    }
                    true
                }
                MobStep::Moved { dx, dy, dz } => {
                    let small = dx.abs() < 7.9 && dy.abs() < 7.9 && dz.abs() < 7.9;
                    if small && !keyframe {
                        let payload = play_entity_move_rotate(
                            mob.id, dx, dy, dz, mob.yaw, mob.pitch, true,
                        );
                        for session in &mut self.sessions {
                            if session.is_playing() {
                                let _ = session.conn.write_packet(&payload);
                            }
                        }
                    } else {
                        self.broadcast_mob_keyframe(mob);
                    }
                    true
                }
            }
        });
        self.world.mobs = mobs;

        if !despawned.is_empty() {
            let payload = play_remove_entities(&despawned);
            for session in self.sessions_mut() {
                if session.is_playing() {
                    let _ = session.conn.write_packet(&payload);
                }
            }
        }
    }

    fn broadcast_mob_keyframe(&mut self, mob: &Mob) {
        let payload =
            play_entity_teleport(mob.id, mob.x, mob.y, mob.z, mob.yaw, mob.pitch, true);
        for session in self.sessions_mut() {
            if session.is_playing() {
                let _ = session.conn.write_packet(&payload);
            }
        }
    }

    /// Occasionally spawn a mob near a random player: hostile at night,
    /// passive in daylight.
    fn maybe_spawn_mob(&mut self) {
        if self.world.mobs.len() >= self.config.max_mobs {
            return;
        }
        if self.rng.next_below(100) != 0 {
            return;
        }
        let players: Vec<(f64, f64)> = self
            .sessions()
            .iter()
            .filter(|s| s.is_playing())
            .map(|s| (s.x, s.z))
            .collect();
        if players.is_empty() {
            return;
        }
        let (px, pz) = players[self.rng.next_below(players.len() as u32) as usize];
        let dx = self.rng.next_below(33) as i32 - 16;
        let dz = self.rng.next_below(33) as i32 - 16;
        let x = px.floor() as i32 + dx;
        let z = pz.floor() as i32 + dz;
        let y = self.world.engine.height_at(x, z) as f64 + 1.0;

        let kind = if self.world.time.is_day() {
            MobKind::Pig
        } else {
            MobKind::Zombie
        };
        let id = self.alloc_entity_id();
        let mob = Mob::new(id, kind, x as f64 + 0.5, y, z as f64 + 0.5);
        debug!(id, ?kind, x, z, "mob spawned");

        let payload = play_spawn_entity(
            mob.id,
            mob_uuid(mob.id),
            kind.protocol_id(),
            mob.x,
            mob.y,
            mob.z,
            mob.yaw,
            mob.pitch,
        );
        for session in self.sessions_mut() {
            if session.is_playing() {
                let _ = session.conn.write_packet(&payload);
            }
        }
        self.world.mobs.push(mob);
    }

    fn tick_keepalives(&mut self) {
        let config = self.config.clone();
        for session in self.sessions_mut() {
            match session.tick_keepalive(&config) {
                Ok(true) => {}
                Ok(false) => session.kick("Timed out"),
                Err(err) => {
                    warn!(username = %session.username, "keepalive failed: {err}");
                    session.kick("Connection lost");
                }
            }
        }
    }

    /// Per-player view-window maintenance: unload columns that fell out,
    /// then send a bounded number of pending columns, nearest first.
    fn stream_chunks(&mut self) {
        for i in 0..self.sessions.len() {
            if !self.sessions[i].is_playing() {
                continue;
            }

            for (cx, cz) in self.sessions[i].out_of_range_chunks() {
                self.sessions[i].loaded_chunks.remove(&(cx, cz));
                let _ = self.sessions[i]
                    .conn
                    .write_packet(&play_unload_chunk(cx, cz));
            }

            for _ in 0..COLUMNS_PER_TICK {
                let Some((cx, cz)) = self.sessions[i].pending_chunks.pop_front() else {
                    break;
                };
                if let Err(err) = self.send_chunk_column(i, cx, cz) {
                    warn!("chunk send failed: {err}");
                    self.sessions[i].kick("Connection lost");
                    break;
                }
                self.sessions[i].loaded_chunks.insert((cx, cz));
            }
        }
    }

    /// Build and transmit one full chunk column (16 stacked sections).
    fn send_chunk_column(&mut self, index: usize, cx: i32, cz: i32) -> Result<(), picocraft_net::NetError> {
        let mut sections: Vec<([u8; SECTION_BYTES], u16, i32)> =
            Vec::with_capacity(SECTIONS_PER_COLUMN);
        for sy in 0..SECTIONS_PER_COLUMN {
            let (biome, bytes) = self.world.engine.build_section(cx, sy as i32, cz);
            let non_air = bytes.iter().filter(|&&b| b != 0).count() as u16;
            let biome_index = self.registries.biome_index(biome);
            sections.push((*bytes, non_air, biome_index));
        }

        let section_data: Vec<SectionData<'_>> = sections
            .iter()
            .map(|(bytes, non_air, biome)| SectionData {
                non_air: *non_air,
                bytes,
                biome: *biome,
            })
            .collect();
        let payload = play_chunk_data(cx, cz, &section_data, self.registries.block_states.palette());
        self.sessions[index].conn.write_packet(&payload)
    }
}
