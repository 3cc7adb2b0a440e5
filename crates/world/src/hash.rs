//! Seed mixing and fast pseudo-random numbers.
//!
//! All terrain identity flows through `splitmix64` over packed chunk
//! coordinates; `Xorshift32` covers everything that only needs cheap
//! per-call randomness (mob wander, pick jitter).

/// The standard splitmix64 mixing function.
pub fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the working world seed from the raw configured seed.
///
/// The raw seed is mixed twice before first use so that small config
/// values still produce well-spread chunk hashes.
pub fn world_seed_from_raw(raw: u64) -> u32 {
    splitmix64(splitmix64(raw)) as u32
}

/// Hash a chunk coordinate pair under the world seed.
///
/// Packs `(cx: i16, cz: i16, seed: u32)` little-endian into 8 bytes and
/// feeds them through [`splitmix64`], truncated to 32 bits. Every anchor
/// value (heights, features, ores) derives from this hash.
pub fn chunk_hash(cx: i32, cz: i32, seed: u32) -> u32 {
    let mut buf = [0u8; 8];
    buf[0..2].copy_from_slice(&(cx as i16).to_le_bytes());
    buf[2..4].copy_from_slice(&(cz as i16).to_le_bytes());
    buf[4..8].copy_from_slice(&seed.to_le_bytes());
    splitmix64(u64::from_le_bytes(buf)) as u32
}

/// Small xorshift PRNG for per-call randomness.
///
/// Not used by terrain generation, which must stay a pure function of the
/// chunk hash.
#[derive(Debug, Clone)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Seed the generator. A zero seed is remapped, xorshift cannot leave 0.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0xE2B9_419 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    /// Uniform-ish value in `0..bound` (bound > 0).
    pub fn next_below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitmix64_matches_reference_vectors() {
        // First outputs of the canonical generator seeded with 0 and 1.
        assert_eq!(splitmix64(0), 0xE220_A839_7B1D_CDAF);
        assert_eq!(splitmix64(1), 0x910A_2DEC_8902_5CC1);
    }

    #[test]
    fn chunk_hash_is_stable_and_coordinate_sensitive() {
        let seed = world_seed_from_raw(0xA103_DE6C);
        let h = chunk_hash(0, 0, seed);
        assert_eq!(h, chunk_hash(0, 0, seed));
        assert_ne!(h, chunk_hash(1, 0, seed));
        assert_ne!(h, chunk_hash(0, 1, seed));
        assert_ne!(h, chunk_hash(-1, -1, seed));
    }

    #[test]
    fn chunk_hash_packs_negative_coordinates() {
        let seed = 12345;
        // -1 and 0xFFFF must collapse to the same i16 packing.
        assert_eq!(chunk_hash(-1, -1, seed), chunk_hash(0xFFFF, 0xFFFF, seed));
    }

    #[test]
    fn xorshift_never_sticks_at_zero() {
        let mut rng = Xorshift32::new(0);
        for _ in 0..1000 {
            assert_ne!(rng.next_u32(), 0);
        }
    }

    #[test]
    fn xorshift_matches_reference_sequence() {
        let mut rng = Xorshift32::new(1);
        // x ^= x<<13; x ^= x>>17; x ^= x<<5 starting from 1.
        assert_eq!(rng.next_u32(), 270_369);
        assert_eq!(rng.next_u32(), 67_634_689);
    }
}
