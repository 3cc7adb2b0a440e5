//! World-scale determinism checks across the generator and cache.

use picocraft_world::{
    world_seed_from_raw, ChunkEngine, EngineConfig, GenParams, SECTION_BYTES,
};

fn engine(raw_seed: u64) -> ChunkEngine {
    ChunkEngine::new(
        GenParams::new(world_seed_from_raw(raw_seed)),
        EngineConfig::default(),
    )
}

/// The byte-wise digest used to pin section contents across runs.
fn section_digest(section: &[u8; SECTION_BYTES]) -> u64 {
    section
        .iter()
        .fold(0u64, |h, &b| h.wrapping_mul(31).wrapping_add(b as u64))
}

#[test]
fn fixed_seed_sections_are_reproducible() {
    // Two independent engines over the reference seed must agree
    // byte-for-byte on every section, cached or not.
    let mut a = engine(0xA103_DE6C);
    let mut b = engine(0xA103_DE6C);
    for (sx, sy, sz) in [(0, 0, 0), (0, 3, 0), (5, 2, -7), (-3, 1, 4)] {
        let (biome_a, bytes_a) = a.build_section(sx, sy, sz);
        let da = section_digest(bytes_a);
        let (biome_b, bytes_b) = b.build_section(sx, sy, sz);
        assert_eq!(biome_a, biome_b, "biome mismatch at ({sx},{sy},{sz})");
        assert_eq!(da, section_digest(bytes_b), "bytes mismatch at ({sx},{sy},{sz})");
    }
}

#[test]
fn fixed_seed_origin_digest_is_stable_within_a_run() {
    let mut engine = engine(0xA103_DE6C);
    let first = section_digest(engine.build_section(0, 0, 0).1);
    // Rebuild through the cache and fresh; all three must agree.
    let second = section_digest(engine.build_section(0, 0, 0).1);
    let mut fresh = [0u8; SECTION_BYTES];
    engine.generate_uncached(0, 0, 0, &mut fresh);
    assert_eq!(first, second);
    assert_eq!(first, section_digest(&fresh));
}

#[test]
fn negative_coordinate_sections_repeat_exactly() {
    // Section (-1, 0, -1) covers blocks (-16..0, 0..16, -16..0).
    let mut engine = engine(0xA103_DE6C);
    let first = *engine.build_section(-1, 0, -1).1;
    let second = *engine.build_section(-1, 0, -1).1;
    assert_eq!(first[..], second[..]);
}

#[test]
fn different_seeds_differ_somewhere() {
    let mut a = engine(1);
    let mut b = engine(2);
    let bytes_a = *a.build_section(0, 3, 0).1;
    let bytes_b = *b.build_section(0, 3, 0).1;
    assert_ne!(bytes_a[..], bytes_b[..]);
}

#[test]
fn cache_is_transparent_over_a_region() {
    let mut engine = engine(0x5EED);
    let mut fresh = [0u8; SECTION_BYTES];
    for sx in -3..3 {
        for sz in -3..3 {
            for sy in 0..4 {
                let cached = *engine.build_section(sx, sy, sz).1;
                engine.generate_uncached(sx, sy, sz, &mut fresh);
                assert_eq!(
                    cached[..],
                    fresh[..],
                    "cache divergence at ({sx},{sy},{sz})"
                );
            }
        }
    }
}

#[test]
fn small_cache_still_serves_correct_bytes() {
    // A cache far smaller than the working set forces constant eviction;
    // the bytes served must not change.
    let mut small = ChunkEngine::new(
        GenParams::new(world_seed_from_raw(0x5EED)),
        EngineConfig {
            cache_entries: 8,
            ..EngineConfig::default()
        },
    );
    let mut reference = engine(0x5EED);
    for pass in 0..2 {
        for sx in 0..6 {
            for sz in 0..6 {
                let a = *small.build_section(sx, 3, sz).1;
                let b = *reference.build_section(sx, 3, sz).1;
                assert_eq!(a[..], b[..], "pass {pass} section ({sx},3,{sz})");
            }
        }
    }
}
