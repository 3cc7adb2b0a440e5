//! Biome assignment.
//!
//! Biomes tile a grid of `biome_size × biome_size` chunks. Each tile hosts
//! a circular biome "island" of radius `biome_radius`; everything outside
//! the disk is beach. The island's biome is plucked straight out of the
//! 32-bit world seed, treated as a repeating 4×4 matrix of 2-bit entries,
//! which avoids layering yet another hash on top of the chunk hash.

use serde::{Deserialize, Serialize};

/// The five biomes. Only the first four appear inside biome disks; beach
/// fills the space between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    Plains = 0,
    Desert = 1,
    MangroveSwamp = 2,
    SnowyPlains = 3,
    Beach = 4,
}

impl Biome {
    /// Decode a 2-bit seed slice.
    pub fn from_seed_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Biome::Plains,
            1 => Biome::Desert,
            2 => Biome::MangroveSwamp,
            _ => Biome::SnowyPlains,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Biome::Plains => "plains",
            Biome::Desert => "desert",
            Biome::MangroveSwamp => "mangrove_swamp",
            Biome::SnowyPlains => "snowy_plains",
            Biome::Beach => "beach",
        }
    }
}

/// Biome at chunk coordinates `(cx, cz)` under `seed`.
pub fn biome_at(cx: i32, cz: i32, seed: u32, biome_size: i32, biome_radius: i32) -> Biome {
    // Center biome disks on chunk 0,0.
    let x = cx + biome_radius;
    let z = cz + biome_radius;

    // Distance from the center of the containing tile.
    let dx = biome_radius - x.rem_euclid(biome_size);
    let dz = biome_radius - z.rem_euclid(biome_size);
    if dx * dx + dz * dz > biome_radius * biome_radius {
        return Biome::Beach;
    }

    // Tile coordinates, one step above chunk coordinates.
    let bx = x.div_euclid(biome_size);
    let bz = z.div_euclid(biome_size);

    // Seed-as-matrix: 16 cells of 2 bits each.
    let index = (bx & 3) + ((bz * 4) & 15);
    Biome::from_seed_bits(seed >> (index * 2))
}
