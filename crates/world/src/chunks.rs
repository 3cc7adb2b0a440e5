//! The chunk engine: terrain + section cache + block-change overlay.
//!
//! Sections are stored and transmitted in the reversed-octet layout: for
//! the linear address `addr = x + (z << 4) + (y << 8)`, the byte lives at
//! `(addr & !7) | (7 - (addr & 7))`. The client expects big-endian longs
//! of 8-bit palette entries, so flipping each run of eight X-adjacent
//! cells at build time lets cached sections go out on the wire verbatim.

use crate::biome::Biome;
use crate::block::{self, Block};
use crate::changes::{BlockChanges, IndexFull};
use crate::section::{SectionCache, SECTION_BYTES};
use crate::terrain::{ChunkAnchor, GenParams, TerrainGenerator, CHUNK_SIZE};

/// Byte index of a section-local block in the reversed-octet layout.
#[inline]
pub fn section_index(dx: usize, dy: usize, dz: usize) -> usize {
    let addr = dx + (dz << 4) + (dy << 8);
    (addr & !7) | (7 - (addr & 7))
}

/// Engine configuration beyond terrain parameters.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub cache_entries: usize,
    pub max_block_changes: usize,
    /// When chests are enabled their changes are never baked into
    /// sections, mirroring torches.
    pub allow_chests: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_entries: 4096,
            max_block_changes: 20_000,
            allow_chests: false,
        }
    }
}

/// Owns the deterministic world: generator, cache, overlay, scratch.
pub struct ChunkEngine {
    terrain: TerrainGenerator,
    cache: SectionCache,
    changes: BlockChanges,
    scratch: Box<[u8; SECTION_BYTES]>,
    allow_chests: bool,
}

impl ChunkEngine {
    pub fn new(params: GenParams, config: EngineConfig) -> Self {
        Self {
            terrain: TerrainGenerator::new(params),
            cache: SectionCache::new(config.cache_entries),
            changes: BlockChanges::new(config.max_block_changes),
            scratch: Box::new([0; SECTION_BYTES]),
            allow_chests: config.allow_chests,
        }
    }

    pub fn terrain(&self) -> &TerrainGenerator {
        &self.terrain
    }

    pub fn changes(&self) -> &BlockChanges {
        &self.changes
    }

    pub fn seed(&self) -> u32 {
        self.terrain.seed()
    }

    /// Blocks whose overlay entries are sent as block updates instead of
    /// being baked into section bytes.
    fn never_baked(&self, b: Block) -> bool {
        b == block::BLOCK_TORCH || (self.allow_chests && b == block::BLOCK_CHEST)
    }

    /// Build the section at section coordinates `(sx, sy, sz)` into the
    /// shared scratch buffer and return its biome along with the bytes.
    ///
    /// Cache hits copy the stored bytes and re-apply overlapping block
    /// changes; misses generate, apply, and install in the cache. The
    /// returned slice aliases the engine's scratch buffer and must not be
    /// held across another engine call.
    pub fn build_section(&mut self, sx: i32, sy: i32, sz: i32) -> (Biome, &[u8; SECTION_BYTES]) {
        if let Some((biome, data)) = self.cache.get(sx, sy, sz) {
            self.scratch.copy_from_slice(data);
            Self::apply_changes(
                &self.changes,
                self.allow_chests,
                sx,
                sy,
                sz,
                &mut self.scratch,
            );
            return (biome, &self.scratch);
        }

        let biome = Self::generate_section(&self.terrain, sx, sy, sz, &mut self.scratch);
        Self::apply_changes(
            &self.changes,
            self.allow_chests,
            sx,
            sy,
            sz,
            &mut self.scratch,
        );
        self.cache.put(sx, sy, sz, biome, &self.scratch);
        (biome, &self.scratch)
    }

    /// Generate a section from terrain alone, bypassing cache and overlay.
    /// Used by cache-transparency tests and the bench tool.
    pub fn generate_uncached(&self, sx: i32, sy: i32, sz: i32, out: &mut [u8; SECTION_BYTES]) -> Biome {
        Self::generate_section(&self.terrain, sx, sy, sz, out)
    }

    fn generate_section(
        terrain: &TerrainGenerator,
        sx: i32,
        sy: i32,
        sz: i32,
        out: &mut [u8; SECTION_BYTES],
    ) -> Biome {
        // The 2×2 anchor square covering this chunk and its +X/+Z
        // neighbors, needed for corner interpolation.
        let corners = [
            terrain.anchor(sx, sz),
            terrain.anchor(sx + 1, sz),
            terrain.anchor(sx, sz + 1),
            terrain.anchor(sx + 1, sz + 1),
        ];
        let anchor = corners[0];
        let feature = terrain.feature_from_anchor(&anchor);

        // Column heights for the whole section footprint.
        let mut heights = [[0u8; 16]; 16];
        for (rz, row) in heights.iter_mut().enumerate() {
            for (rx, h) in row.iter_mut().enumerate() {
                *h = terrain.height_from_corners(rx as i32, rz as i32, &corners);
            }
        }

        let base_x = sx * CHUNK_SIZE;
        let base_z = sz * CHUNK_SIZE;
        let base_y = sy * CHUNK_SIZE;

        for addr in 0..SECTION_BYTES {
            let rx = (addr & 15) as i32;
            let rz = ((addr >> 4) & 15) as i32;
            let ry = (addr >> 8) as i32;
            let b = terrain.terrain_at(
                base_x + rx,
                base_y + ry,
                base_z + rz,
                rx,
                rz,
                &anchor,
                &feature,
                heights[rz as usize][rx as usize],
            );
            out[(addr & !7) | (7 - (addr & 7))] = b;
        }

        anchor.biome
    }

    fn apply_changes(
        changes: &BlockChanges,
        allow_chests: bool,
        sx: i32,
        sy: i32,
        sz: i32,
        out: &mut [u8; SECTION_BYTES],
    ) {
        if changes.is_empty() {
            return;
        }
        let x0 = sx * CHUNK_SIZE;
        let y0 = sy * CHUNK_SIZE;
        let z0 = sz * CHUNK_SIZE;
        for change in changes.iter() {
            let b = change.block;
            if b == block::BLOCK_NONE || b == block::BLOCK_TORCH {
                continue;
            }
            if allow_chests && b == block::BLOCK_CHEST {
                continue;
            }
            if change.x < x0 || change.x >= x0 + CHUNK_SIZE {
                continue;
            }
            let y = change.y as i32;
            if y < y0 || y >= y0 + CHUNK_SIZE {
                continue;
            }
            if change.z < z0 || change.z >= z0 + CHUNK_SIZE {
                continue;
            }
            let dx = (change.x - x0) as usize;
            let dy = (y - y0) as usize;
            let dz = (change.z - z0) as usize;
            out[section_index(dx, dy, dz)] = b;
        }
    }

    /// The effective block at world coordinates: overlay first, then
    /// terrain. Below the world floor everything is bedrock.
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> Block {
        if y < 0 {
            return block::BLOCK_BEDROCK;
        }
        if y <= u8::MAX as i32 {
            if let Some(b) = self.changes.get(x, y as u8, z) {
                return b;
            }
        }
        let anchor = self.anchor_for_block(x, z);
        self.terrain.block_at(x, y, z, &anchor)
    }

    fn anchor_for_block(&self, x: i32, z: i32) -> ChunkAnchor {
        self.terrain
            .anchor(x.div_euclid(CHUNK_SIZE), z.div_euclid(CHUNK_SIZE))
    }

    /// Record a block edit and invalidate the containing cached section.
    pub fn set_block(&mut self, x: i32, y: u8, z: i32, b: Block) -> Result<(), IndexFull> {
        self.changes.set(x, y, z, b)?;
        self.cache.invalidate(x, y, z);
        Ok(())
    }

    /// Remove an override so generated terrain shows through again.
    pub fn clear_block_override(&mut self, x: i32, y: u8, z: i32) {
        self.changes.remove(x, y, z);
        self.cache.invalidate(x, y, z);
    }

    /// Load persisted overrides wholesale (world load).
    pub fn load_changes(
        &mut self,
        records: impl IntoIterator<Item = crate::changes::BlockChange>,
    ) -> Result<(), IndexFull> {
        self.changes.replace_all(records)?;
        self.cache.clear();
        Ok(())
    }

    /// Terrain height helper for spawn placement and mob grounding.
    pub fn height_at(&self, x: i32, z: i32) -> u8 {
        self.terrain.height_at(x, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::world_seed_from_raw;

    fn engine() -> ChunkEngine {
        let seed = world_seed_from_raw(0xA103_DE6C);
        ChunkEngine::new(GenParams::new(seed), EngineConfig::default())
    }

    #[test]
    fn reversed_octet_index_flips_low_three_bits() {
        assert_eq!(section_index(0, 0, 0), 7);
        assert_eq!(section_index(7, 0, 0), 0);
        assert_eq!(section_index(8, 0, 0), 15);
        // addr = 8 + (8<<4) + (8<<8) = 2184 -> (2184 & !7) | (7 - 0) = 2191
        assert_eq!(section_index(8, 8, 8), 2191);
    }

    #[test]
    fn build_section_is_deterministic() {
        let mut engine = engine();
        let first = *engine.build_section(0, 3, 0).1;
        let second = *engine.build_section(0, 3, 0).1;
        assert_eq!(first[..], second[..]);
    }

    #[test]
    fn negative_sections_are_deterministic() {
        let mut engine = engine();
        let first = *engine.build_section(-1, 0, -1).1;
        let second = *engine.build_section(-1, 0, -1).1;
        assert_eq!(first[..], second[..]);
    }

    #[test]
    fn cache_is_transparent() {
        let mut engine = engine();
        let cached = *engine.build_section(2, 3, -4).1;
        let mut fresh = [0u8; SECTION_BYTES];
        engine.generate_uncached(2, 3, -4, &mut fresh);
        assert_eq!(cached[..], fresh[..]);
        // A second pass through the cache still matches.
        let again = *engine.build_section(2, 3, -4).1;
        assert_eq!(again[..], fresh[..]);
    }

    #[test]
    fn overlay_lands_at_the_reversed_octet_index() {
        let mut engine = engine();
        let _ = engine.build_section(0, 0, 0);
        engine.set_block(8, 8, 8, block::BLOCK_DIAMOND_BLOCK).unwrap();
        let (_, data) = engine.build_section(0, 0, 0);
        let addr = 8 + (8 << 4) + (8 << 8);
        let index = (addr & !7) | (7 - (addr & 7));
        assert_eq!(data[index], block::BLOCK_DIAMOND_BLOCK);
    }

    #[test]
    fn overlay_applies_on_cache_hit_without_invalidation() {
        // Changes loaded after a section is cached must still show up.
        let mut engine = engine();
        let _ = engine.build_section(0, 0, 0);
        engine.set_block(1, 1, 1, block::BLOCK_DIAMOND_BLOCK).unwrap();
        // set_block invalidated; rebuild and cache again.
        let _ = engine.build_section(0, 0, 0);
        let (_, data) = engine.build_section(0, 0, 0);
        assert_eq!(data[section_index(1, 1, 1)], block::BLOCK_DIAMOND_BLOCK);
    }

    #[test]
    fn torches_are_never_baked() {
        let mut engine = engine();
        engine.set_block(4, 4, 4, block::BLOCK_TORCH).unwrap();
        let (_, data) = engine.build_section(0, 0, 0);
        assert_ne!(data[section_index(4, 4, 4)], block::BLOCK_TORCH);
        // The overlay still reports the torch for spot queries.
        assert_eq!(engine.block_at(4, 4, 4), block::BLOCK_TORCH);
    }

    #[test]
    fn chests_are_never_baked_when_enabled() {
        let seed = world_seed_from_raw(0xA103_DE6C);
        let mut engine = ChunkEngine::new(
            GenParams::new(seed),
            EngineConfig {
                allow_chests: true,
                ..EngineConfig::default()
            },
        );
        engine.set_block(4, 4, 4, block::BLOCK_CHEST).unwrap();
        let (_, data) = engine.build_section(0, 0, 0);
        assert_ne!(data[section_index(4, 4, 4)], block::BLOCK_CHEST);
    }

    #[test]
    fn block_at_prefers_overlay_and_floors_at_bedrock() {
        let mut engine = engine();
        assert_eq!(engine.block_at(0, -1, 0), block::BLOCK_BEDROCK);
        engine.set_block(0, 70, 0, block::BLOCK_DIAMOND_BLOCK).unwrap();
        assert_eq!(engine.block_at(0, 70, 0), block::BLOCK_DIAMOND_BLOCK);
        engine.clear_block_override(0, 70, 0);
        let anchor = engine.terrain.anchor(0, 0);
        assert_eq!(
            engine.block_at(0, 70, 0),
            engine.terrain.block_at(0, 70, 0, &anchor)
        );
    }

    #[test]
    fn section_bytes_agree_with_spot_queries() {
        let mut engine = engine();
        let (_, data) = engine.build_section(0, 3, 0);
        let data = *data;
        for (dx, dz, dy) in [(0usize, 0usize, 0usize), (5, 9, 3), (15, 15, 15), (8, 0, 12)] {
            let b = data[section_index(dx, dy, dz)];
            let world = engine.block_at(dx as i32, 48 + dy as i32, dz as i32);
            assert_eq!(b, world, "mismatch at ({dx},{dy},{dz})");
        }
    }
}
