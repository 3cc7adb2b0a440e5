//! Fluid flow over the block-change overlay.
//!
//! There is no separate fluid grid: a fluid cell is simply a water or
//! lava block, whether generated or player-placed. Edits mark nearby
//! fluid cells active; each fluid tick drains the active set, spreading
//! down first and then sideways, writing results back through the
//! overlay. Spread carries a budget so a breached ocean wall floods a
//! crater rather than the whole world.

use crate::block::{self, Block};
use crate::chunks::ChunkEngine;
use tracing::warn;

/// Water keeps flowing this many blocks from where it was disturbed.
const WATER_SPREAD: u8 = 7;
/// Lava is shorter-ranged.
const LAVA_SPREAD: u8 = 3;
/// Lava only moves every fourth fluid tick.
const LAVA_TICK_DIVIDER: u64 = 4;
/// Cap on cells processed per tick so a huge breach cannot stall the
/// whole server tick.
const MAX_FLOWS_PER_TICK: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveCell {
    x: i32,
    y: u8,
    z: i32,
    budget: u8,
}

/// A block update produced by fluid flow, for broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluidUpdate {
    pub x: i32,
    pub y: u8,
    pub z: i32,
    pub block: Block,
}

/// Tracks which fluid cells may move on upcoming ticks.
#[derive(Debug, Default)]
pub struct FluidSim {
    active: Vec<ActiveCell>,
    tick: u64,
}

impl FluidSim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_cells(&self) -> usize {
        self.active.len()
    }

    /// Mark fluid cells adjacent to an edited block (and the block itself)
    /// as active. Called by the block dig/place handlers.
    pub fn disturb(&mut self, engine: &ChunkEngine, x: i32, y: u8, z: i32) {
        const NEIGHBORS: [(i32, i32, i32); 7] = [
            (0, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (1, 0, 0),
            (-1, 0, 0),
            (0, 0, 1),
            (0, 0, -1),
        ];
        for (dx, dy, dz) in NEIGHBORS {
            let ny = y as i32 + dy;
            if !(0..=255).contains(&ny) {
                continue;
            }
            let (nx, ny, nz) = (x + dx, ny as u8, z + dz);
            let b = engine.block_at(nx, ny as i32, nz);
            if block::is_fluid(b) {
                self.mark(nx, ny, nz, spread_budget(b));
            }
        }
    }

    fn mark(&mut self, x: i32, y: u8, z: i32, budget: u8) {
        if self
            .active
            .iter()
            .any(|c| c.x == x && c.y == y && c.z == z)
        {
            return;
        }
        self.active.push(ActiveCell { x, y, z, budget });
    }

    /// Run one fluid tick: each active cell tries to flow, newly wetted
    /// cells become active with a reduced budget. Returns the block
    /// updates to broadcast.
    pub fn tick(&mut self, engine: &mut ChunkEngine) -> Vec<FluidUpdate> {
        self.tick += 1;
        let mut updates = Vec::new();
        if self.active.is_empty() {
            return updates;
        }

        let batch: Vec<ActiveCell> = if self.active.len() > MAX_FLOWS_PER_TICK {
            self.active.drain(..MAX_FLOWS_PER_TICK).collect()
        } else {
            std::mem::take(&mut self.active)
        };

        for cell in batch {
            let fluid = engine.block_at(cell.x, cell.y as i32, cell.z);
            if !block::is_fluid(fluid) {
                continue;
            }
            if fluid == block::BLOCK_LAVA && self.tick % LAVA_TICK_DIVIDER != 0 {
                // Not lava's turn yet; keep it active.
                self.mark(cell.x, cell.y, cell.z, cell.budget);
                continue;
            }

            // Down first; sideways only when the floor holds.
            if cell.y > 0 {
                let below = engine.block_at(cell.x, cell.y as i32 - 1, cell.z);
                if below == block::BLOCK_AIR {
                    self.flow_into(engine, cell.x, cell.y - 1, cell.z, fluid, spread_budget(fluid), &mut updates);
                    continue;
                }
            }
            if cell.budget == 0 {
                continue;
            }
            for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let (nx, nz) = (cell.x + dx, cell.z + dz);
                let target = engine.block_at(nx, cell.y as i32, nz);
                if target == block::BLOCK_AIR {
                    self.flow_into(engine, nx, cell.y, nz, fluid, cell.budget - 1, &mut updates);
                }
            }
        }

        updates
    }

    fn flow_into(
        &mut self,
        engine: &mut ChunkEngine,
        x: i32,
        y: u8,
        z: i32,
        fluid: Block,
        budget: u8,
        updates: &mut Vec<FluidUpdate>,
    ) {
        match engine.set_block(x, y, z, fluid) {
            Ok(()) => {
                self.mark(x, y, z, budget);
                updates.push(FluidUpdate { x, y, z, block: fluid });
            }
            Err(err) => {
                // Flow is best-effort; a full index just stops the spread.
                warn!("fluid flow stopped: {err}");
                self.active.clear();
            }
        }
    }
}

fn spread_budget(fluid: Block) -> u8 {
    if fluid == block::BLOCK_LAVA {
        LAVA_SPREAD
    } else {
        WATER_SPREAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::EngineConfig;
    use crate::hash::world_seed_from_raw;
    use crate::terrain::GenParams;

    fn engine() -> ChunkEngine {
        let seed = world_seed_from_raw(0xA103_DE6C);
        ChunkEngine::new(GenParams::new(seed), EngineConfig::default())
    }

    /// Build a sealed stone pocket high above terrain so flows are fully
    /// controlled by the test.
    fn sealed_box(engine: &mut ChunkEngine, x0: i32, y0: u8, z0: i32, size: i32) {
        for x in (x0 - 1)..=(x0 + size) {
            for z in (z0 - 1)..=(z0 + size) {
                for y in (y0 - 1)..=(y0 + 3) {
                    let wall = x == x0 - 1
                        || x == x0 + size
                        || z == z0 - 1
                        || z == z0 + size
                        || y == y0 - 1;
                    let b = if wall {
                        block::BLOCK_STONE
                    } else {
                        block::BLOCK_AIR
                    };
                    engine.set_block(x, y, z, b).unwrap();
                }
            }
        }
    }

    #[test]
    fn water_falls_before_spreading() {
        let mut engine = engine();
        let mut sim = FluidSim::new();
        sealed_box(&mut engine, 0, 200, 0, 3);
        engine.set_block(1, 202, 1, block::BLOCK_WATER).unwrap();
        sim.disturb(&engine, 1, 202, 1);

        let updates = sim.tick(&mut engine);
        assert!(updates
            .iter()
            .any(|u| u.x == 1 && u.y == 201 && u.z == 1 && u.block == block::BLOCK_WATER));
        // No horizontal spread on the falling tick.
        assert!(!updates.iter().any(|u| u.y == 202 && (u.x != 1 || u.z != 1)));
    }

    #[test]
    fn water_spreads_on_a_floor_and_respects_walls() {
        let mut engine = engine();
        let mut sim = FluidSim::new();
        sealed_box(&mut engine, 0, 200, 0, 3);
        engine.set_block(1, 200, 1, block::BLOCK_WATER).unwrap();
        sim.disturb(&engine, 1, 200, 1);

        for _ in 0..16 {
            sim.tick(&mut engine);
        }
        // The 3x3 floor ends up wet; the stone shell does not.
        for x in 0..3 {
            for z in 0..3 {
                assert_eq!(engine.block_at(x, 200, z), block::BLOCK_WATER, "({x},{z})");
            }
        }
        assert_eq!(engine.block_at(-1, 200, 0), block::BLOCK_STONE);
    }

    #[test]
    fn spread_budget_limits_range() {
        let mut engine = engine();
        let mut sim = FluidSim::new();
        // A long sealed corridor, much longer than the water budget.
        sealed_box(&mut engine, 0, 220, 0, 1);
        for x in 1..14 {
            engine.set_block(x, 219, 0, block::BLOCK_STONE).unwrap();
            engine.set_block(x, 220, 0, block::BLOCK_AIR).unwrap();
            engine.set_block(x, 221, 0, block::BLOCK_STONE).unwrap();
            engine.set_block(x, 220, 1, block::BLOCK_STONE).unwrap();
            engine.set_block(x, 220, -1, block::BLOCK_STONE).unwrap();
        }
        engine.set_block(14, 220, 0, block::BLOCK_STONE).unwrap();
        engine.set_block(0, 220, 0, block::BLOCK_WATER).unwrap();
        sim.disturb(&engine, 0, 220, 0);

        for _ in 0..32 {
            sim.tick(&mut engine);
        }
        // Within budget: wet. Beyond budget: dry.
        assert_eq!(engine.block_at(6, 220, 0), block::BLOCK_WATER);
        assert_eq!(engine.block_at(12, 220, 0), block::BLOCK_AIR);
    }

    #[test]
    fn lava_moves_slower_than_water() {
        let mut engine = engine();
        let mut sim = FluidSim::new();
        sealed_box(&mut engine, 0, 200, 0, 3);
        engine.set_block(1, 200, 1, block::BLOCK_LAVA).unwrap();
        sim.disturb(&engine, 1, 200, 1);

        // Three ticks: lava has not had a turn yet.
        for _ in 0..3 {
            let updates = sim.tick(&mut engine);
            assert!(updates.is_empty());
        }
        let updates = sim.tick(&mut engine);
        assert!(!updates.is_empty());
    }

    #[test]
    fn undisturbed_world_stays_idle() {
        let mut engine = engine();
        let mut sim = FluidSim::new();
        assert!(sim.tick(&mut engine).is_empty());
        assert_eq!(sim.active_cells(), 0);
    }
}
