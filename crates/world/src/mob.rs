//! Mobs: the entity table and the per-tick AI step.
//!
//! AI is intentionally small: mobs wander with xorshift-driven heading
//! changes, lock onto a player that comes close, and walk the terrain
//! height with simple gravity. The server layer turns position deltas
//! into entity packets.

use crate::block;
use crate::chunks::ChunkEngine;
use crate::hash::Xorshift32;

/// How close a player must be for a mob to start following, in blocks.
const TARGET_RANGE: f64 = 16.0;
/// Mobs further than this from every player are despawned.
const DESPAWN_RANGE: f64 = 128.0;
/// Walking speed, blocks per tick.
const WALK_SPEED: f64 = 0.1;
const WANDER_SPEED: f64 = 0.05;
const GRAVITY: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobKind {
    Zombie,
    Pig,
}

impl MobKind {
    /// Entity-type id in the 1.21.8 registry.
    pub fn protocol_id(self) -> i32 {
        match self {
            MobKind::Zombie => 145,
            MobKind::Pig => 98,
        }
    }

    pub fn max_health(self) -> f32 {
        match self {
            MobKind::Zombie => 20.0,
            MobKind::Pig => 10.0,
        }
    }

    /// Hostile mobs chase players; passive ones only wander.
    pub fn is_hostile(self) -> bool {
        matches!(self, MobKind::Zombie)
    }
}

#[derive(Debug, Clone)]
pub struct Mob {
    pub id: i32,
    pub kind: MobKind,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub health: f32,
    /// Entity id of the chased player, if any.
    pub target: Option<i32>,
    pub last_tick: u64,
}

/// What a mob did this tick, for packet emission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MobStep {
    Idle,
    Moved { dx: f64, dy: f64, dz: f64 },
    Despawn,
}

impl Mob {
    pub fn new(id: i32, kind: MobKind, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            kind,
            x,
            y,
            z,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            health: kind.max_health(),
            target: None,
            last_tick: 0,
        }
    }

    /// One AI step against the player list: pick/keep a target, move,
    /// collide with terrain.
    pub fn tick(
        &mut self,
        engine: &ChunkEngine,
        players: &[(i32, f64, f64, f64)],
        rng: &mut Xorshift32,
        tick: u64,
    ) -> MobStep {
        self.last_tick = tick;
        let (px, py, pz) = (self.x, self.y, self.z);

        let nearest = players
            .iter()
            .map(|&(id, x, y, z)| {
                let d = (x - self.x).hypot(z - self.z).hypot(y - self.y);
                (id, x, z, d)
            })
            .min_by(|a, b| a.3.total_cmp(&b.3));

        match nearest {
            None => return MobStep::Idle,
            Some((_, _, _, d)) if d > DESPAWN_RANGE => return MobStep::Despawn,
            Some((id, x, z, d)) => {
                if self.kind.is_hostile() && d < TARGET_RANGE {
                    self.target = Some(id);
                    let angle = (x - self.x).atan2(-(z - self.z));
                    self.yaw = -angle.to_degrees() as f32;
                    let len = (x - self.x).hypot(z - self.z).max(0.001);
                    self.vx = (x - self.x) / len * WALK_SPEED;
                    self.vz = (z - self.z) / len * WALK_SPEED;
                } else {
                    self.target = None;
                    // Change heading roughly every four seconds.
                    if rng.next_below(80) == 0 {
                        self.yaw = (rng.next_below(360) as f32) - 180.0;
                    }
                    let rad = (-self.yaw as f64).to_radians();
                    self.vx = rad.sin() * WANDER_SPEED;
                    self.vz = rad.cos() * WANDER_SPEED;
                }
            }
        }

        let next_x = self.x + self.vx;
        let next_z = self.z + self.vz;

        // Walk the surface: step up one block, fall otherwise.
        let ground = self.ground_height(engine, next_x, next_z);
        if ground - self.y > 1.0 {
            // Too tall to climb; stay put horizontally.
            self.vx = 0.0;
            self.vz = 0.0;
        } else {
            self.x = next_x;
            self.z = next_z;
        }

        if self.y > ground {
            self.vy -= GRAVITY;
            self.y = (self.y + self.vy).max(ground);
        } else {
            self.vy = 0.0;
            self.y = ground;
        }

        let (dx, dy, dz) = (self.x - px, self.y - py, self.z - pz);
        if dx == 0.0 && dy == 0.0 && dz == 0.0 {
            MobStep::Idle
        } else {
            MobStep::Moved { dx, dy, dz }
        }
    }

    /// Y of the first air block above solid ground at the mob's column.
    fn ground_height(&self, engine: &ChunkEngine, x: f64, z: f64) -> f64 {
        let bx = x.floor() as i32;
        let bz = z.floor() as i32;
        let mut y = (self.y.floor() as i32 + 2).clamp(0, 255);
        while y > 0 && !block::is_solid(engine.block_at(bx, y - 1, bz)) {
            y -= 1;
        }
        y as f64
    }
}
