//! Player inventories, the 2×2 crafting grid, and chest storage.
//!
//! Slot layout follows the survival window: slot 0 is the crafting
//! result, 1..=4 the 2×2 grid, 5..=31 the main inventory, 32..=40 the
//! hotbar. Items share the block palette's id space.

use crate::block::{self, Block};
use serde::{Deserialize, Serialize};

/// Total slots per player.
pub const INVENTORY_SIZE: usize = 41;
/// First hotbar slot; the hotbar is 9 wide.
pub const HOTBAR_START: usize = 32;
/// Crafting result slot.
pub const SLOT_RESULT: usize = 0;
/// First crafting-grid slot (2×2, slots 1..=4).
pub const SLOT_CRAFT_START: usize = 1;
/// Chests hold 27 slots.
pub const CHEST_SIZE: usize = 27;

const MAX_STACK: u8 = 64;

/// One inventory slot. A count of zero means empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: Block,
    pub count: u8,
}

impl ItemStack {
    pub fn new(item: Block, count: u8) -> Self {
        Self { item, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        *self = ItemStack::default();
    }
}

/// A 2×2 crafting recipe: the grid pattern (reading order, `None` = empty
/// cell) and its output.
struct Recipe {
    grid: [Option<Block>; 4],
    output: ItemStack,
}

/// Recipes the survival loop needs: wood processing, light, storage.
fn recipes() -> &'static [Recipe] {
    const fn stack(item: Block, count: u8) -> ItemStack {
        ItemStack { item, count }
    }
    static RECIPES: &[Recipe] = &[
        // One log anywhere -> four planks.
        Recipe {
            grid: [Some(block::BLOCK_OAK_LOG), None, None, None],
            output: stack(block::BLOCK_OAK_PLANKS, 4),
        },
        // Two planks stacked -> four sticks.
        Recipe {
            grid: [Some(block::BLOCK_OAK_PLANKS), None, Some(block::BLOCK_OAK_PLANKS), None],
            output: stack(block::ITEM_STICK, 4),
        },
        // Full grid of planks -> crafting table.
        Recipe {
            grid: [
                Some(block::BLOCK_OAK_PLANKS),
                Some(block::BLOCK_OAK_PLANKS),
                Some(block::BLOCK_OAK_PLANKS),
                Some(block::BLOCK_OAK_PLANKS),
            ],
            output: stack(block::BLOCK_CRAFTING_TABLE, 1),
        },
        // Coal over stick -> four torches.
        Recipe {
            grid: [Some(block::ITEM_COAL), None, Some(block::ITEM_STICK), None],
            output: stack(block::BLOCK_TORCH, 4),
        },
        // Planks over planks beside planks over planks is taken by the
        // crafting table; chests compress from sticks + planks instead.
        Recipe {
            grid: [Some(block::BLOCK_OAK_PLANKS), Some(block::ITEM_STICK), Some(block::BLOCK_OAK_PLANKS), Some(block::ITEM_STICK)],
            output: stack(block::BLOCK_CHEST, 1),
        },
    ];
    RECIPES
}

/// Match the player's 2×2 grid against a recipe, normalizing the pattern
/// position so a lone log matches in any cell.
fn match_recipe(grid: &[ItemStack; 4]) -> Option<ItemStack> {
    let cells: [Option<Block>; 4] = [
        (!grid[0].is_empty()).then_some(grid[0].item),
        (!grid[1].is_empty()).then_some(grid[1].item),
        (!grid[2].is_empty()).then_some(grid[2].item),
        (!grid[3].is_empty()).then_some(grid[3].item),
    ];

    // Translate the used cells into the top-left corner.
    let used: Vec<usize> = (0..4).filter(|&i| cells[i].is_some()).collect();
    if used.is_empty() {
        return None;
    }
    let min_col = used.iter().map(|i| i % 2).min().unwrap();
    let min_row = used.iter().map(|i| i / 2).min().unwrap();
    let mut normalized = [None; 4];
    for &i in &used {
        let (row, col) = (i / 2 - min_row, i % 2 - min_col);
        normalized[row * 2 + col] = cells[i];
    }

    recipes()
        .iter()
        .find(|r| r.grid == normalized)
        .map(|r| r.output)
}

/// The 41-slot player inventory plus hotbar selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(with = "serde_arrays")]
    slots: [ItemStack; INVENTORY_SIZE],
    /// Selected hotbar index, 0..=8.
    pub selected: u8,
}

/// Serde helpers for the fixed-size slot array.
mod serde_arrays {
    use super::{ItemStack, INVENTORY_SIZE};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        slots: &[ItemStack; INVENTORY_SIZE],
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        slots.as_slice().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<[ItemStack; INVENTORY_SIZE], D::Error> {
        let v = Vec::<ItemStack>::deserialize(de)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("bad inventory length"))
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            slots: [ItemStack::default(); INVENTORY_SIZE],
            selected: 0,
        }
    }
}

impl Inventory {
    pub fn slots(&self) -> &[ItemStack; INVENTORY_SIZE] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> ItemStack {
        self.slots[index]
    }

    pub fn set_slot(&mut self, index: usize, stack: ItemStack) {
        self.slots[index] = stack;
    }

    /// The stack under the selected hotbar slot.
    pub fn held(&self) -> ItemStack {
        self.slots[HOTBAR_START + self.selected as usize]
    }

    /// Consume `n` items from the held stack.
    pub fn consume_held(&mut self, n: u8) {
        let slot = &mut self.slots[HOTBAR_START + self.selected as usize];
        slot.count = slot.count.saturating_sub(n);
        if slot.count == 0 {
            slot.clear();
        }
    }

    /// Insert items, preferring existing stacks, then the hotbar, then the
    /// main inventory. Returns the count that did not fit.
    pub fn give(&mut self, item: Block, mut count: u8) -> u8 {
        // Top up matching stacks first.
        for index in (HOTBAR_START..INVENTORY_SIZE).chain(5..HOTBAR_START) {
            if count == 0 {
                break;
            }
            let slot = &mut self.slots[index];
            if slot.item == item && !slot.is_empty() && slot.count < MAX_STACK {
                let room = MAX_STACK - slot.count;
                let moved = room.min(count);
                slot.count += moved;
                count -= moved;
            }
        }
        // Then fill empty slots.
        for index in (HOTBAR_START..INVENTORY_SIZE).chain(5..HOTBAR_START) {
            if count == 0 {
                break;
            }
            let slot = &mut self.slots[index];
            if slot.is_empty() {
                let moved = MAX_STACK.min(count);
                *slot = ItemStack::new(item, moved);
                count -= moved;
            }
        }
        count
    }

    /// Current crafting-grid contents.
    fn craft_grid(&self) -> [ItemStack; 4] {
        [
            self.slots[SLOT_CRAFT_START],
            self.slots[SLOT_CRAFT_START + 1],
            self.slots[SLOT_CRAFT_START + 2],
            self.slots[SLOT_CRAFT_START + 3],
        ]
    }

    /// Recompute the crafting result slot from the grid.
    pub fn refresh_craft_result(&mut self) {
        self.slots[SLOT_RESULT] = match_recipe(&self.craft_grid()).unwrap_or_default();
    }

    /// Take the crafting result: consumes one item from each used grid
    /// cell and returns the crafted stack, or `None` when nothing matches.
    pub fn take_craft_result(&mut self) -> Option<ItemStack> {
        let result = match_recipe(&self.craft_grid())?;
        for i in SLOT_CRAFT_START..SLOT_CRAFT_START + 4 {
            let slot = &mut self.slots[i];
            if !slot.is_empty() {
                slot.count -= 1;
                if slot.count == 0 {
                    slot.clear();
                }
            }
        }
        self.refresh_craft_result();
        Some(result)
    }
}

/// A placed chest's 27 slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chest {
    slots: Vec<ItemStack>,
}

impl Default for Chest {
    fn default() -> Self {
        Self {
            slots: vec![ItemStack::default(); CHEST_SIZE],
        }
    }
}

impl Chest {
    pub fn slot(&self, index: usize) -> ItemStack {
        self.slots[index]
    }

    pub fn set_slot(&mut self, index: usize, stack: ItemStack) {
        self.slots[index] = stack;
    }

    pub fn slots(&self) -> &[ItemStack] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(ItemStack::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn give_prefers_hotbar_then_stacks() {
        let mut inv = Inventory::default();
        assert_eq!(inv.give(block::BLOCK_COBBLESTONE, 10), 0);
        assert_eq!(inv.held(), ItemStack::new(block::BLOCK_COBBLESTONE, 10));
        assert_eq!(inv.give(block::BLOCK_COBBLESTONE, 60), 0);
        // 64 in the first slot, 6 spill into the next.
        assert_eq!(inv.slot(HOTBAR_START).count, 64);
        assert_eq!(inv.slot(HOTBAR_START + 1).count, 6);
    }

    #[test]
    fn give_reports_overflow() {
        let mut inv = Inventory::default();
        for _ in 0..INVENTORY_SIZE {
            inv.give(block::BLOCK_COBBLESTONE, 64);
        }
        assert!(inv.give(block::BLOCK_COBBLESTONE, 5) > 0);
    }

    #[test]
    fn consume_held_clears_empty_stacks() {
        let mut inv = Inventory::default();
        inv.give(block::BLOCK_DIRT, 2);
        inv.consume_held(1);
        assert_eq!(inv.held().count, 1);
        inv.consume_held(1);
        assert!(inv.held().is_empty());
    }

    #[test]
    fn log_crafts_planks_in_any_cell() {
        for cell in SLOT_CRAFT_START..SLOT_CRAFT_START + 4 {
            let mut inv = Inventory::default();
            inv.set_slot(cell, ItemStack::new(block::BLOCK_OAK_LOG, 1));
            inv.refresh_craft_result();
            assert_eq!(
                inv.slot(SLOT_RESULT),
                ItemStack::new(block::BLOCK_OAK_PLANKS, 4),
                "cell {cell}"
            );
        }
    }

    #[test]
    fn sticks_need_a_vertical_pair() {
        let mut inv = Inventory::default();
        inv.set_slot(SLOT_CRAFT_START, ItemStack::new(block::BLOCK_OAK_PLANKS, 1));
        inv.set_slot(SLOT_CRAFT_START + 2, ItemStack::new(block::BLOCK_OAK_PLANKS, 1));
        inv.refresh_craft_result();
        assert_eq!(inv.slot(SLOT_RESULT).item, block::ITEM_STICK);

        // A horizontal pair is not sticks.
        let mut inv = Inventory::default();
        inv.set_slot(SLOT_CRAFT_START, ItemStack::new(block::BLOCK_OAK_PLANKS, 1));
        inv.set_slot(SLOT_CRAFT_START + 1, ItemStack::new(block::BLOCK_OAK_PLANKS, 1));
        inv.refresh_craft_result();
        assert!(inv.slot(SLOT_RESULT).is_empty());
    }

    #[test]
    fn taking_the_result_consumes_ingredients() {
        let mut inv = Inventory::default();
        inv.set_slot(SLOT_CRAFT_START, ItemStack::new(block::BLOCK_OAK_LOG, 2));
        let crafted = inv.take_craft_result().expect("recipe matches");
        assert_eq!(crafted, ItemStack::new(block::BLOCK_OAK_PLANKS, 4));
        assert_eq!(inv.slot(SLOT_CRAFT_START).count, 1);
        // Result refreshes while ingredients remain.
        assert_eq!(inv.slot(SLOT_RESULT).item, block::BLOCK_OAK_PLANKS);
    }

    #[test]
    fn full_plank_grid_is_a_crafting_table() {
        let mut inv = Inventory::default();
        for cell in SLOT_CRAFT_START..SLOT_CRAFT_START + 4 {
            inv.set_slot(cell, ItemStack::new(block::BLOCK_OAK_PLANKS, 1));
        }
        inv.refresh_craft_result();
        assert_eq!(inv.slot(SLOT_RESULT).item, block::BLOCK_CRAFTING_TABLE);
    }

    #[test]
    fn chest_starts_empty() {
        let chest = Chest::default();
        assert!(chest.is_empty());
        assert_eq!(chest.slots().len(), CHEST_SIZE);
    }
}
