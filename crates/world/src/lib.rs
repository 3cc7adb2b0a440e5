mod biome;
mod block;
mod changes;
mod chunks;
mod fluid;
mod hash;
mod inventory;
mod mob;
mod persist;
mod section;
mod terrain;
mod time;
mod weather;

pub use biome::{biome_at, Biome};
pub use block::*;
pub use changes::{BlockChange, BlockChanges, IndexFull};
pub use chunks::{section_index, ChunkEngine, EngineConfig};
pub use fluid::{FluidSim, FluidUpdate};
pub use hash::{chunk_hash, splitmix64, world_seed_from_raw, Xorshift32};
pub use inventory::{
    Chest, Inventory, ItemStack, CHEST_SIZE, HOTBAR_START, INVENTORY_SIZE, SLOT_CRAFT_START,
    SLOT_RESULT,
};
pub use mob::{Mob, MobKind, MobStep};
pub use persist::{load_world, save_world, SavedPlayer, SavedWorld};
pub use section::{SectionCache, MAX_PROBE, SECTION_BYTES};
pub use terrain::{
    ChunkAnchor, ChunkFeature, GenParams, TerrainGenerator, CHUNK_SIZE, NO_FEATURE,
};
pub use time::{WorldTime, TICKS_PER_DAY, TIME_BROADCAST_INTERVAL};
pub use weather::{Weather, WeatherState};
