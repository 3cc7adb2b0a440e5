//! Deterministic terrain generation.
//!
//! Every voxel is a pure function of the world seed. Per chunk there is an
//! anchor (coordinates, hash, biome); corner heights derive from hash
//! slices, column heights from bilinear interpolation of the four
//! surrounding corners, and the optional decoration (tree, cactus, lily
//! pad, moss patch, grass stub) from the same hash. These formulas are the
//! world's identity: changing any of them changes every world.

use crate::biome::{biome_at, Biome};
use crate::block::{self, Block};
use crate::hash::chunk_hash;

/// Chunks are 16 blocks on each horizontal axis.
pub const CHUNK_SIZE: i32 = 16;

/// Feature `y` value meaning "no feature in this chunk".
pub const NO_FEATURE: u8 = 0xFF;

/// Terrain tuning knobs, fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct GenParams {
    /// Hashed 32-bit world seed.
    pub seed: u32,
    /// Baseline terrain height biome offsets build on.
    pub base_height: u8,
    /// Center of the mirrored cave band.
    pub cave_depth: u8,
    /// Biome tile edge length, in chunks.
    pub biome_size: i32,
    /// Radius of the biome disk inside each tile, in chunks.
    pub biome_radius: i32,
}

impl GenParams {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            base_height: 64,
            cave_depth: 32,
            biome_size: 8,
            biome_radius: 4,
        }
    }
}

/// Per-chunk record everything else derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkAnchor {
    pub cx: i32,
    pub cz: i32,
    pub hash: u32,
    pub biome: Biome,
}

/// Optional per-chunk decoration. `x`/`z` are world-absolute once placed;
/// `y == NO_FEATURE` means the chunk has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkFeature {
    pub x: i32,
    pub z: i32,
    pub y: u8,
    pub variant: u8,
}

impl ChunkFeature {
    pub fn none() -> Self {
        Self {
            x: 0,
            z: 0,
            y: NO_FEATURE,
            variant: 0,
        }
    }
}

/// Stateless voxel resolver for a fixed parameter set.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    params: GenParams,
}

impl TerrainGenerator {
    pub fn new(params: GenParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GenParams {
        &self.params
    }

    pub fn seed(&self) -> u32 {
        self.params.seed
    }

    /// Anchor for the chunk at `(cx, cz)`.
    pub fn anchor(&self, cx: i32, cz: i32) -> ChunkAnchor {
        ChunkAnchor {
            cx,
            cz,
            hash: chunk_hash(cx, cz, self.params.seed),
            biome: biome_at(
                cx,
                cz,
                self.params.seed,
                self.params.biome_size,
                self.params.biome_radius,
            ),
        }
    }

    /// Terrain height at a chunk corner.
    ///
    /// Slices of the hash act as stacked small random values: several
    /// narrow picks stabilize the distribution while still allowing the
    /// occasional larger swing.
    pub fn corner_height(&self, hash: u32, biome: Biome) -> u8 {
        let mut height = self.params.base_height;
        match biome {
            Biome::MangroveSwamp => {
                height = height.wrapping_add(
                    ((hash % 3) + ((hash >> 4) % 3) + ((hash >> 8) % 3) + ((hash >> 12) % 3)) as u8,
                );
                // Push sub-sea columns down further; this is what carves the
                // large swamp ponds.
                if height < 64 {
                    height = height.wrapping_sub(((hash >> 24) & 3) as u8);
                }
            }
            Biome::Plains => {
                height = height.wrapping_add(
                    ((hash & 3) + ((hash >> 4) & 3) + ((hash >> 8) & 3) + ((hash >> 12) & 3)) as u8,
                );
            }
            Biome::Desert => {
                height = height.wrapping_add(4 + ((hash & 3) + ((hash >> 4) & 3)) as u8);
            }
            Biome::Beach => {
                // Start slightly below sea level so beaches stay wet.
                height = 62u8.wrapping_sub(((hash & 3) + ((hash >> 4) & 3) + ((hash >> 8) & 3)) as u8);
            }
            Biome::SnowyPlains => {
                // Fewer components with wider ranges: hills.
                height = height.wrapping_add(((hash & 7) + ((hash >> 4) & 7)) as u8);
            }
        }
        height
    }

    /// Bilinear interpolation between the four corner heights of a chunk,
    /// in chunk-local coordinates.
    fn interpolate(a: u8, b: u8, c: u8, d: u8, x: i32, z: i32) -> u8 {
        let (a, b, c, d) = (a as u16, b as u16, c as u16, d as u16);
        let (x, z) = (x as u16, z as u16);
        let cs = CHUNK_SIZE as u16;
        let top = a * (cs - x) + b * x;
        let bottom = c * (cs - x) + d * x;
        ((top * (cs - z) + bottom * z) / (cs * cs)) as u8
    }

    /// Column height from the chunk's anchor plus its +X/+Z neighbors.
    ///
    /// `corners` is the 2×2 anchor square `[(cx,cz), (cx+1,cz), (cx,cz+1),
    /// (cx+1,cz+1)]`; `rx`/`rz` are chunk-local.
    pub fn height_from_corners(&self, rx: i32, rz: i32, corners: &[ChunkAnchor; 4]) -> u8 {
        if rx == 0 && rz == 0 {
            // Sharpen isolated peaks so corners read as summits.
            let height = self.corner_height(corners[0].hash, corners[0].biome);
            if height > 67 {
                return height - 1;
            }
        }
        Self::interpolate(
            self.corner_height(corners[0].hash, corners[0].biome),
            self.corner_height(corners[1].hash, corners[1].biome),
            self.corner_height(corners[2].hash, corners[2].biome),
            self.corner_height(corners[3].hash, corners[3].biome),
            rx,
            rz,
        )
    }

    /// Column height when only the containing chunk's anchor is at hand.
    pub fn height_from_hash(&self, rx: i32, rz: i32, cx: i32, cz: i32, hash: u32, biome: Biome) -> u8 {
        let corners = self.corner_square(cx, cz, hash, biome);
        self.height_from_corners(rx, rz, &corners)
    }

    fn corner_square(&self, cx: i32, cz: i32, hash: u32, biome: Biome) -> [ChunkAnchor; 4] {
        [
            ChunkAnchor {
                cx,
                cz,
                hash,
                biome,
            },
            self.anchor(cx + 1, cz),
            self.anchor(cx, cz + 1),
            self.anchor(cx + 1, cz + 1),
        ]
    }

    /// Terrain height at world column `(x, z)`, ignoring block changes.
    pub fn height_at(&self, x: i32, z: i32) -> u8 {
        let cx = x.div_euclid(CHUNK_SIZE);
        let cz = z.div_euclid(CHUNK_SIZE);
        let rx = x.rem_euclid(CHUNK_SIZE);
        let rz = z.rem_euclid(CHUNK_SIZE);
        let anchor = self.anchor(cx, cz);
        self.height_from_hash(rx, rz, cx, cz, anchor.hash, anchor.biome)
    }

    /// Derive the chunk's optional feature from its anchor.
    pub fn feature_from_anchor(&self, anchor: &ChunkAnchor) -> ChunkFeature {
        let position = (anchor.hash % (CHUNK_SIZE * CHUNK_SIZE) as u32) as i32;
        let fx = position % CHUNK_SIZE;
        let fz = position / CHUNK_SIZE;

        // Keeping features off chunk edges stops trees from crossing
        // section boundaries and thins the overall feature count. Swamps
        // are exempt, they would be very boring otherwise.
        if anchor.biome != Biome::MangroveSwamp
            && (fx < 3 || fx > CHUNK_SIZE - 3 || fz < 3 || fz > CHUNK_SIZE - 3)
        {
            return ChunkFeature::none();
        }

        let x = fx + anchor.cx * CHUNK_SIZE;
        let z = fz + anchor.cz * CHUNK_SIZE;
        let y = self
            .height_from_hash(fx, fz, anchor.cx, anchor.cz, anchor.hash, anchor.biome)
            .wrapping_add(1);
        let variant = (anchor.hash.wrapping_shr((x + z) as u32) & 1) as u8;
        ChunkFeature { x, z, y, variant }
    }

    /// The block at `(x, y, z)` given the precomputed anchor, feature and
    /// column height for its containing chunk.
    ///
    /// `rx`/`rz` are the chunk-local coordinates of the column.
    #[allow(clippy::too_many_arguments)]
    pub fn terrain_at(
        &self,
        x: i32,
        y: i32,
        z: i32,
        rx: i32,
        rz: i32,
        anchor: &ChunkAnchor,
        feature: &ChunkFeature,
        height: u8,
    ) -> Block {
        let h = height as i32;

        if y >= 64 && y >= h && feature.y != NO_FEATURE {
            let fy = feature.y as i32;
            let variant = feature.variant as i32;
            match anchor.biome {
                Biome::Plains => {
                    // Trees never generate underwater.
                    if fy >= 64 {
                        if x == feature.x && z == feature.z {
                            if y == fy - 1 {
                                return block::BLOCK_DIRT;
                            }
                            if y >= fy && y < fy - variant + 6 {
                                return block::BLOCK_OAK_LOG;
                            }
                        }

                        let dx = (x - feature.x).abs();
                        let dz = (z - feature.z).abs();

                        // Two stacked plus-shaped leaf discs with trimmed
                        // corners.
                        if dx < 3 && dz < 3 && y > fy - variant + 2 && y < fy - variant + 5 {
                            if !(y == fy - variant + 4 && dx == 2 && dz == 2) {
                                return block::BLOCK_OAK_LEAVES;
                            }
                        } else if dx < 2 && dz < 2 && y >= fy - variant + 5 && y <= fy - variant + 6
                        {
                            if !(y == fy - variant + 6 && dx == 1 && dz == 1) {
                                return block::BLOCK_OAK_LEAVES;
                            }
                        } else {
                            // Above sea level in plains there is nothing else
                            // to resolve in this column.
                            if y == h {
                                return block::BLOCK_GRASS_BLOCK;
                            }
                            return block::BLOCK_AIR;
                        }
                    }
                }
                Biome::Desert => {
                    if x == feature.x && z == feature.z {
                        if variant == 0 {
                            if y == h + 1 {
                                return block::BLOCK_DEAD_BUSH;
                            }
                        } else if y > h {
                            // Cactus height keys off the parity of the
                            // terrain height at its column.
                            if height & 1 != 0 && y <= h + 3 {
                                return block::BLOCK_CACTUS;
                            }
                            if y <= h + 2 {
                                return block::BLOCK_CACTUS;
                            }
                        }
                    }
                }
                Biome::MangroveSwamp => {
                    if x == feature.x && z == feature.z && y == 64 && h < 63 {
                        return block::BLOCK_LILY_PAD;
                    }
                    if y == h + 1 {
                        let dx = (x - feature.x).abs();
                        let dz = (z - feature.z).abs();
                        if dx + dz < 4 {
                            return block::BLOCK_MOSS_CARPET;
                        }
                    }
                }
                Biome::SnowyPlains => {
                    if x == feature.x && z == feature.z && y == h + 1 && h >= 64 {
                        return block::BLOCK_SHORT_GRASS;
                    }
                }
                Biome::Beach => {}
            }
        }

        // The very topmost blocks.
        if h >= 63 {
            if y == h {
                return match anchor.biome {
                    Biome::MangroveSwamp => block::BLOCK_MUD,
                    Biome::SnowyPlains => block::BLOCK_SNOWY_GRASS_BLOCK,
                    Biome::Desert | Biome::Beach => block::BLOCK_SAND,
                    Biome::Plains => block::BLOCK_GRASS_BLOCK,
                };
            }
            if anchor.biome == Biome::SnowyPlains && y == h + 1 {
                return block::BLOCK_SNOW;
            }
        }

        // Minerals and caves start four blocks under the surface.
        if y <= h - 4 {
            // Caves reuse the surface shape, mirrored around the cave depth.
            let gap = h - self.params.base_height as i32;
            let depth = self.params.cave_depth as i32;
            if y < depth + gap && y > depth - gap {
                return block::BLOCK_AIR;
            }

            // The chunk-local column index seeds a tiny xorshift, which
            // guarantees exactly one ore candidate Y per column.
            let mut ore_y = (((rx & 15) << 4) + (rz & 15)) as u8;
            ore_y ^= ore_y << 4;
            ore_y ^= ore_y >> 5;
            ore_y ^= ore_y << 1;
            ore_y &= 63;

            if y == ore_y as i32 {
                // The candidate Y doubles as a shift amount into the anchor
                // hash, giving an 8-bit rarity roll for this column.
                let ore_probability = (anchor.hash >> (ore_y % 24)) & 255;
                if y < 15 {
                    if ore_probability < 10 {
                        return block::BLOCK_DIAMOND_ORE;
                    }
                    if ore_probability < 12 {
                        return block::BLOCK_GOLD_ORE;
                    }
                    if ore_probability < 15 {
                        return block::BLOCK_REDSTONE_ORE;
                    }
                }
                if y < 30 {
                    if ore_probability < 3 {
                        return block::BLOCK_GOLD_ORE;
                    }
                    if ore_probability < 8 {
                        return block::BLOCK_REDSTONE_ORE;
                    }
                }
                if y < 54 {
                    if ore_probability < 30 {
                        return block::BLOCK_IRON_ORE;
                    }
                    if ore_probability < 40 {
                        return block::BLOCK_COPPER_ORE;
                    }
                }
                if ore_probability < 60 {
                    return block::BLOCK_COAL_ORE;
                }
                if y < 5 {
                    return block::BLOCK_LAVA;
                }
                return block::BLOCK_COBBLESTONE;
            }

            return block::BLOCK_STONE;
        }

        // The band between stone and the surface block.
        if y <= h {
            return match anchor.biome {
                Biome::Desert => block::BLOCK_SANDSTONE,
                Biome::MangroveSwamp => block::BLOCK_MUD,
                Biome::Beach if h > 64 => block::BLOCK_SANDSTONE,
                _ => block::BLOCK_DIRT,
            };
        }

        // Below sea level, fill with water (ice on snowy surfaces).
        if y == 63 && anchor.biome == Biome::SnowyPlains {
            return block::BLOCK_ICE;
        }
        if y < 64 {
            return block::BLOCK_WATER;
        }

        block::BLOCK_AIR
    }

    /// The terrain block at world coordinates, deriving the column context
    /// from the anchor. Slower than section generation, used for spot
    /// queries.
    pub fn block_at(&self, x: i32, y: i32, z: i32, anchor: &ChunkAnchor) -> Block {
        if y > 80 {
            return block::BLOCK_AIR;
        }

        let rx = x.rem_euclid(CHUNK_SIZE);
        let rz = z.rem_euclid(CHUNK_SIZE);

        let feature = self.feature_from_anchor(anchor);
        let height = self.height_from_hash(rx, rz, anchor.cx, anchor.cz, anchor.hash, anchor.biome);
        self.terrain_at(x, y, z, rx, rz, anchor, &feature, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::world_seed_from_raw;

    fn generator() -> TerrainGenerator {
        TerrainGenerator::new(GenParams::new(world_seed_from_raw(0xA103_DE6C)))
    }

    #[test]
    fn heights_are_deterministic() {
        let gen1 = generator();
        let gen2 = generator();
        for x in -40..40 {
            for z in -40..40 {
                assert_eq!(gen1.height_at(x, z), gen2.height_at(x, z));
            }
        }
    }

    #[test]
    fn corner_height_stays_in_sane_band() {
        let gen = generator();
        for hash in [0u32, 1, 0xFFFF_FFFF, 0x1234_5678, 0xDEAD_BEEF] {
            for biome in [
                Biome::Plains,
                Biome::Desert,
                Biome::MangroveSwamp,
                Biome::SnowyPlains,
                Biome::Beach,
            ] {
                let h = gen.corner_height(hash, biome);
                assert!((50..=80).contains(&h), "height {h} out of band for {biome:?}");
            }
        }
    }

    #[test]
    fn beach_corners_sit_at_or_below_sea_level() {
        let gen = generator();
        for hash in 0..2000u32 {
            let h = gen.corner_height(hash.wrapping_mul(0x9E37_79B9), Biome::Beach);
            assert!(h <= 62);
        }
    }

    #[test]
    fn peak_sharpening_applies_only_on_the_corner() {
        let gen = generator();
        // Find a corner whose raw height exceeds 67, then confirm the
        // sharpened value is returned exactly at (0, 0).
        for cx in -64..64 {
            let anchor = gen.anchor(cx, 7);
            let raw = gen.corner_height(anchor.hash, anchor.biome);
            if raw > 67 {
                let corners = gen.corner_square(anchor.cx, anchor.cz, anchor.hash, anchor.biome);
                assert_eq!(gen.height_from_corners(0, 0, &corners), raw - 1);
                return;
            }
        }
        panic!("no peak above 67 found in scan range");
    }

    #[test]
    fn interpolation_matches_corners_at_origin() {
        let gen = generator();
        for cx in -8..8 {
            for cz in -8..8 {
                let anchor = gen.anchor(cx, cz);
                let raw = gen.corner_height(anchor.hash, anchor.biome);
                if raw <= 67 {
                    let corners = gen.corner_square(cx, cz, anchor.hash, anchor.biome);
                    assert_eq!(gen.height_from_corners(0, 0, &corners), raw);
                }
            }
        }
    }

    #[test]
    fn every_column_has_exactly_one_ore_candidate() {
        // The 6-bit xorshift of the column index must land in 0..64.
        for rx in 0..16 {
            for rz in 0..16 {
                let mut ore_y = (((rx & 15) << 4) + (rz & 15)) as u8;
                ore_y ^= ore_y << 4;
                ore_y ^= ore_y >> 5;
                ore_y ^= ore_y << 1;
                ore_y &= 63;
                assert!(ore_y < 64);
            }
        }
    }

    #[test]
    fn deep_terrain_is_stone_lava_or_ore() {
        let gen = generator();
        let anchor = gen.anchor(0, 0);
        let feature = gen.feature_from_anchor(&anchor);
        let height = gen.height_at(5, 5);
        for y in 0..(height as i32 - 4) {
            let b = gen.terrain_at(5, y, 5, 5, 5, &anchor, &feature, height);
            assert!(
                matches!(
                    b,
                    block::BLOCK_STONE
                        | block::BLOCK_AIR
                        | block::BLOCK_LAVA
                        | block::BLOCK_COBBLESTONE
                        | block::BLOCK_COAL_ORE
                        | block::BLOCK_IRON_ORE
                        | block::BLOCK_COPPER_ORE
                        | block::BLOCK_GOLD_ORE
                        | block::BLOCK_REDSTONE_ORE
                        | block::BLOCK_DIAMOND_ORE
                ),
                "unexpected deep block {b} at y={y}"
            );
        }
    }

    #[test]
    fn air_above_height_limit() {
        let gen = generator();
        let anchor = gen.anchor(3, -2);
        assert_eq!(gen.block_at(50, 81, -30, &anchor), block::BLOCK_AIR);
        assert_eq!(gen.block_at(50, 255, -30, &anchor), block::BLOCK_AIR);
    }

    #[test]
    fn features_keep_off_chunk_edges_outside_swamps() {
        let gen = generator();
        for cx in -32..32 {
            for cz in -32..32 {
                let anchor = gen.anchor(cx, cz);
                let feature = gen.feature_from_anchor(&anchor);
                if feature.y == NO_FEATURE || anchor.biome == Biome::MangroveSwamp {
                    continue;
                }
                let fx = feature.x.rem_euclid(CHUNK_SIZE);
                let fz = feature.z.rem_euclid(CHUNK_SIZE);
                assert!((3..=13).contains(&fx), "feature x {fx} on edge");
                assert!((3..=13).contains(&fz), "feature z {fz} on edge");
            }
        }
    }

    #[test]
    fn plains_tree_has_log_column_above_surface() {
        let gen = generator();
        // Scan for a plains chunk with a feature above sea level.
        for cx in -64..64 {
            for cz in -64..64 {
                let anchor = gen.anchor(cx, cz);
                if anchor.biome != Biome::Plains {
                    continue;
                }
                let feature = gen.feature_from_anchor(&anchor);
                if feature.y == NO_FEATURE || feature.y < 64 {
                    continue;
                }
                let b = gen.block_at(feature.x, feature.y as i32, feature.z, &anchor);
                assert_eq!(b, block::BLOCK_OAK_LOG, "chunk ({cx},{cz})");
                let below = gen.block_at(feature.x, feature.y as i32 - 1, feature.z, &anchor);
                assert_eq!(below, block::BLOCK_DIRT);
                return;
            }
        }
        panic!("no plains tree found in scan range");
    }

    #[test]
    fn sea_fills_low_columns_with_water() {
        let gen = generator();
        // Beaches guarantee sub-sea columns in the gaps between biome
        // disks; scan an off-center row that crosses the beach ring.
        for cx in -16..16 {
            let anchor = gen.anchor(cx, 3);
            if anchor.biome != Biome::Beach {
                continue;
            }
            let x = cx * CHUNK_SIZE + 8;
            let z = 3 * CHUNK_SIZE + 8;
            let height = gen.height_at(x, z) as i32;
            if height < 62 {
                let b = gen.block_at(x, height + 1, z, &anchor);
                assert!(
                    b == block::BLOCK_WATER || b == block::BLOCK_AIR,
                    "expected water above beach floor, got {b}"
                );
                let b63 = gen.block_at(x, 63, z, &anchor);
                assert_eq!(b63, block::BLOCK_WATER);
                return;
            }
        }
        panic!("no sub-sea beach column found");
    }
}
