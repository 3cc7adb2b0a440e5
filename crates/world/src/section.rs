//! Open-addressed LRU cache for generated chunk sections.
//!
//! Slots are probed linearly from the key's home bucket for at most
//! `MAX_PROBE` steps. Insertions never land outside that window: when the
//! window is full, the entry with the oldest access stamp inside it is
//! evicted. This keeps every cached entry reachable from its home bucket
//! in bounded time, which is the whole point of the bound.

use crate::biome::Biome;

/// Bytes per 16×16×16 chunk section.
pub const SECTION_BYTES: usize = 4096;

/// Maximum linear-probe distance for lookups, insertions and eviction.
pub const MAX_PROBE: usize = 32;

struct CachedSection {
    sx: i32,
    sy: i32,
    sz: i32,
    biome: Biome,
    stamp: u64,
    data: [u8; SECTION_BYTES],
}

/// Fixed-capacity section cache keyed by section coordinates.
pub struct SectionCache {
    slots: Vec<Option<Box<CachedSection>>>,
    clock: u64,
}

impl SectionCache {
    /// Create a cache with room for `capacity` sections (~4 KiB each).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, clock: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn probe_window(&self) -> usize {
        MAX_PROBE.min(self.slots.len())
    }

    fn home(&self, sx: i32, sy: i32, sz: i32) -> usize {
        let h = (sx as u32).wrapping_mul(73_856_093)
            ^ (sy as u32).wrapping_mul(19_349_663)
            ^ (sz as u32).wrapping_mul(83_492_791);
        h as usize % self.slots.len()
    }

    /// Look up a cached section, refreshing its access stamp on hit.
    pub fn get(&mut self, sx: i32, sy: i32, sz: i32) -> Option<(Biome, &[u8; SECTION_BYTES])> {
        let home = self.home(sx, sy, sz);
        let len = self.slots.len();
        for i in 0..self.probe_window() {
            let idx = (home + i) % len;
            let hit = match &self.slots[idx] {
                Some(s) => s.sx == sx && s.sy == sy && s.sz == sz,
                None => false,
            };
            if hit {
                self.clock += 1;
                let slot = self.slots[idx].as_mut().unwrap();
                slot.stamp = self.clock;
                let slot = self.slots[idx].as_ref().unwrap();
                return Some((slot.biome, &slot.data));
            }
        }
        None
    }

    /// Install a section, evicting the stalest entry in the probe window
    /// when no slot is free.
    pub fn put(&mut self, sx: i32, sy: i32, sz: i32, biome: Biome, data: &[u8; SECTION_BYTES]) {
        let home = self.home(sx, sy, sz);
        let len = self.slots.len();
        let window = self.probe_window();

        let mut target = None;
        for i in 0..window {
            let idx = (home + i) % len;
            if self.slots[idx].is_none() {
                target = Some(idx);
                break;
            }
        }

        let idx = target.unwrap_or_else(|| {
            // No free slot within reach of the home bucket: evict the
            // oldest entry there so the new one stays findable.
            let mut oldest_idx = home;
            let mut oldest_age = 0u64;
            for i in 0..window {
                let idx = (home + i) % len;
                let age = match &self.slots[idx] {
                    Some(s) => self.clock - s.stamp,
                    None => u64::MAX,
                };
                if age > oldest_age {
                    oldest_age = age;
                    oldest_idx = idx;
                }
            }
            oldest_idx
        });

        self.clock += 1;
        self.slots[idx] = Some(Box::new(CachedSection {
            sx,
            sy,
            sz,
            biome,
            stamp: self.clock,
            data: *data,
        }));
    }

    /// Drop the cached section containing block `(x, y, z)`, if present.
    pub fn invalidate(&mut self, x: i32, y: u8, z: i32) {
        let sx = x.div_euclid(16);
        let sy = (y / 16) as i32;
        let sz = z.div_euclid(16);
        let home = self.home(sx, sy, sz);
        let len = self.slots.len();
        for i in 0..self.probe_window() {
            let idx = (home + i) % len;
            let hit = match &self.slots[idx] {
                Some(s) => s.sx == sx && s.sy == sy && s.sz == sz,
                None => false,
            };
            if hit {
                self.slots[idx] = None;
                return;
            }
        }
    }

    /// Drop everything (world seed change).
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Number of occupied slots; used by tests and diagnostics.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
