//! Registry dumps from the external extraction step.
//!
//! The configuration state must replay registry data (dimension types,
//! biomes, tags) the client validates against, and the play state needs
//! the palette-to-block-state table. All of it is produced offline by the
//! extraction tool; the server stores the blobs opaquely and transmits
//! them verbatim. When the dump directory is missing, a built-in fallback
//! table keeps status and the handshake tests working.

use anyhow::{Context, Result};
use picocraft_world::{Biome, Block};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// One registry-data packet body, replayed verbatim.
#[derive(Debug, Clone)]
pub struct RegistryBlob {
    pub name: String,
    pub payload: Vec<u8>,
}

/// Palette index to global block-state id.
#[derive(Debug, Clone)]
pub struct BlockStateTable {
    states: [i32; 256],
}

impl BlockStateTable {
    pub fn state_for(&self, block: Block) -> i32 {
        self.states[block as usize]
    }

    /// The full 256-entry palette used in chunk-section payloads.
    pub fn palette(&self) -> &[i32; 256] {
        &self.states
    }
}

impl Default for BlockStateTable {
    fn default() -> Self {
        // Fallback state ids for the built-in palette, matching the
        // 1.21.8 vanilla report ordering closely enough for development
        // without the extraction output.
        const DEFAULTS: &[(Block, i32)] = &[
            (picocraft_world::BLOCK_AIR, 0),
            (picocraft_world::BLOCK_STONE, 1),
            (picocraft_world::BLOCK_COBBLESTONE, 14),
            (picocraft_world::BLOCK_DIRT, 10),
            (picocraft_world::BLOCK_GRASS_BLOCK, 9),
            (picocraft_world::BLOCK_SNOWY_GRASS_BLOCK, 8),
            (picocraft_world::BLOCK_SAND, 112),
            (picocraft_world::BLOCK_SANDSTONE, 535),
            (picocraft_world::BLOCK_MUD, 29),
            (picocraft_world::BLOCK_MOSS_CARPET, 26634),
            (picocraft_world::BLOCK_LILY_PAD, 7892),
            (picocraft_world::BLOCK_WATER, 86),
            (picocraft_world::BLOCK_LAVA, 102),
            (picocraft_world::BLOCK_ICE, 8583),
            (picocraft_world::BLOCK_SNOW, 8575),
            (picocraft_world::BLOCK_BEDROCK, 79),
            (picocraft_world::BLOCK_OAK_LOG, 130),
            (picocraft_world::BLOCK_OAK_LEAVES, 262),
            (picocraft_world::BLOCK_OAK_PLANKS, 15),
            (picocraft_world::BLOCK_CACTUS, 5684),
            (picocraft_world::BLOCK_DEAD_BUSH, 1870),
            (picocraft_world::BLOCK_SHORT_GRASS, 1867),
            (picocraft_world::BLOCK_COAL_ORE, 127),
            (picocraft_world::BLOCK_IRON_ORE, 125),
            (picocraft_world::BLOCK_COPPER_ORE, 22948),
            (picocraft_world::BLOCK_GOLD_ORE, 123),
            (picocraft_world::BLOCK_REDSTONE_ORE, 5734),
            (picocraft_world::BLOCK_DIAMOND_ORE, 5693),
            (picocraft_world::BLOCK_DIAMOND_BLOCK, 5695),
            (picocraft_world::BLOCK_TORCH, 2886),
            (picocraft_world::BLOCK_CHEST, 2910),
            (picocraft_world::BLOCK_CRAFTING_TABLE, 5930),
        ];
        let mut states = [0i32; 256];
        for &(block, state) in DEFAULTS {
            states[block as usize] = state;
        }
        Self { states }
    }
}

/// Palette index to item-registry id, for slot payloads.
#[derive(Debug, Clone)]
pub struct ItemTable {
    items: [i32; 256],
}

impl ItemTable {
    pub fn item_for(&self, block: Block) -> i32 {
        self.items[block as usize]
    }
}

impl Default for ItemTable {
    fn default() -> Self {
        // Fallback item ids mirroring the block table; close enough for
        // development without the extraction output.
        const DEFAULTS: &[(Block, i32)] = &[
            (picocraft_world::BLOCK_STONE, 1),
            (picocraft_world::BLOCK_COBBLESTONE, 12),
            (picocraft_world::BLOCK_DIRT, 8),
            (picocraft_world::BLOCK_GRASS_BLOCK, 9),
            (picocraft_world::BLOCK_SAND, 19),
            (picocraft_world::BLOCK_SANDSTONE, 146),
            (picocraft_world::BLOCK_OAK_LOG, 36),
            (picocraft_world::BLOCK_OAK_PLANKS, 23),
            (picocraft_world::BLOCK_CACTUS, 255),
            (picocraft_world::BLOCK_TORCH, 256),
            (picocraft_world::BLOCK_CHEST, 249),
            (picocraft_world::BLOCK_CRAFTING_TABLE, 251),
            (picocraft_world::BLOCK_DIAMOND_BLOCK, 86),
            (picocraft_world::ITEM_STICK, 844),
            (picocraft_world::ITEM_COAL, 799),
            (picocraft_world::ITEM_DIAMOND, 801),
            (picocraft_world::ITEM_RAW_IRON, 805),
            (picocraft_world::ITEM_RAW_COPPER, 807),
            (picocraft_world::ITEM_RAW_GOLD, 810),
            (picocraft_world::ITEM_REDSTONE, 929),
        ];
        let mut items = [0i32; 256];
        for &(block, item) in DEFAULTS {
            items[block as usize] = item;
        }
        Self { items }
    }
}

/// The blocks-catalog dump format: palette index -> state id, plus the
/// matching item ids when the extractor provides them.
#[derive(Debug, Deserialize)]
struct BlocksCatalog {
    states: Vec<i32>,
    #[serde(default)]
    items: Vec<i32>,
}

/// Everything loaded from the registry dump directory.
#[derive(Debug)]
pub struct RegistryStore {
    /// Registry-data packet bodies, in transmission order.
    pub registries: Vec<RegistryBlob>,
    /// The update-tags packet body, if dumped.
    pub tags: Option<Vec<u8>>,
    pub block_states: BlockStateTable,
    pub items: ItemTable,
}

impl RegistryStore {
    /// Load from the dump directory; every missing piece degrades to a
    /// warning and a fallback.
    pub fn load(dir: &Path) -> Self {
        let mut store = Self {
            registries: Vec::new(),
            tags: None,
            block_states: BlockStateTable::default(),
            items: ItemTable::default(),
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "registry dump directory {} unavailable ({err}); using built-in fallbacks",
                    dir.display()
                );
                return store;
            }
        };

        let mut blob_paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("registry_") && n.ends_with(".bin"))
            })
            .collect();
        blob_paths.sort();

        for path in blob_paths {
            match fs::read(&path) {
                Ok(payload) => {
                    let name = path
                        .file_stem()
                        .and_then(|n| n.to_str())
                        .unwrap_or_default()
                        .trim_start_matches("registry_")
                        .to_string();
                    store.registries.push(RegistryBlob { name, payload });
                }
                Err(err) => warn!("skipping registry dump {}: {err}", path.display()),
            }
        }

        match fs::read(dir.join("tags.bin")) {
            Ok(payload) => store.tags = Some(payload),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("skipping tags dump: {err}"),
        }

        match Self::load_catalog(&dir.join("blocks.json")) {
            Ok(Some((states, items))) => {
                store.block_states = states;
                if let Some(items) = items {
                    store.items = items;
                }
            }
            Ok(None) => {}
            Err(err) => warn!("blocks catalog unusable ({err:#}); using built-in table"),
        }

        info!(
            registries = store.registries.len(),
            tags = store.tags.is_some(),
            "registry dumps loaded from {}",
            dir.display()
        );
        store
    }

    fn load_catalog(path: &Path) -> Result<Option<(BlockStateTable, Option<ItemTable>)>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).context("reading blocks catalog"),
        };
        let catalog: BlocksCatalog =
            serde_json::from_str(&contents).context("parsing blocks catalog")?;
        if catalog.states.len() > 256 || catalog.items.len() > 256 {
            anyhow::bail!("blocks catalog lists more than 256 entries");
        }
        let mut states = [0i32; 256];
        for (i, &state) in catalog.states.iter().enumerate() {
            states[i] = state;
        }
        let items = if catalog.items.is_empty() {
            None
        } else {
            let mut items = [0i32; 256];
            for (i, &item) in catalog.items.iter().enumerate() {
                items[i] = item;
            }
            Some(ItemTable { items })
        };
        Ok(Some((BlockStateTable { states }, items)))
    }

    /// Biome registry index used in chunk payloads.
    pub fn biome_index(&self, biome: Biome) -> i32 {
        biome as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picocraft_world::{BLOCK_AIR, BLOCK_STONE};

    #[test]
    fn fallback_table_maps_air_to_zero() {
        let table = BlockStateTable::default();
        assert_eq!(table.state_for(BLOCK_AIR), 0);
        assert_ne!(table.state_for(BLOCK_STONE), 0);
    }

    #[test]
    fn missing_directory_degrades_to_fallbacks() {
        let store = RegistryStore::load(Path::new("/nonexistent/registries"));
        assert!(store.registries.is_empty());
        assert!(store.tags.is_none());
    }

    #[test]
    fn dumps_are_loaded_in_sorted_order() {
        let dir = std::env::temp_dir().join("picocraft-registry-order");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("registry_02_biome.bin"), b"b").unwrap();
        fs::write(dir.join("registry_01_dimension.bin"), b"a").unwrap();
        fs::write(dir.join("tags.bin"), b"t").unwrap();

        let store = RegistryStore::load(&dir);
        assert_eq!(store.registries.len(), 2);
        assert_eq!(store.registries[0].name, "01_dimension");
        assert_eq!(store.registries[1].name, "02_biome");
        assert_eq!(store.tags.as_deref(), Some(&b"t"[..]));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn blocks_catalog_overrides_the_table() {
        let dir = std::env::temp_dir().join("picocraft-registry-catalog");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("blocks.json"), r#"{"states": [5, 6, 7]}"#).unwrap();

        let store = RegistryStore::load(&dir);
        assert_eq!(store.block_states.state_for(0), 5);
        assert_eq!(store.block_states.state_for(2), 7);

        fs::remove_dir_all(&dir).ok();
    }
}
