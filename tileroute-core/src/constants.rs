//! Fixed identifiers shared by the route pipeline.
//!
//! Synthetic tile ids only exist after post-processing; they never appear in
//! a recorded log and are chosen well above every real tile id.

/// Tile id standing in for "before the first visit of a run".
pub const RUN_START: u32 = 20_000;
/// Tile id standing in for "after the last visit of a run".
pub const RUN_END: u32 = 20_001;
/// Tile id a save & quit event is rewritten to.
pub const SAVE_QUIT_TILE_ID: u32 = 30_000;
/// Tile id a reset event is rewritten to.
pub const RESET_TILE_ID: u32 = 50_000;

/// Story event id logged on save & quit.
pub const SAVE_QUIT_EVENT_ID: u32 = 0;
/// Story event id logged on death.
pub const DEATH_EVENT_ID: u32 = 1;
/// Story event id logged on reset.
pub const RESET_EVENT_ID: u32 = 15;

/// Unlock index for an item that never shows up in a run.
pub const ITEM_NEVER_FOUND: usize = usize::MAX;

pub const RUN_START_NAME: &str = "RUN_START";
pub const RUN_END_NAME: &str = "RUN_END";
pub const SAVE_QUIT_NAME: &str = "S&Q";
pub const RESET_NAME: &str = "RESET";

/// Synthetic tiles paired with their display names.
pub const SYNTHETIC_TILES: [(u32, &str); 4] = [
    (RUN_START, RUN_START_NAME),
    (RUN_END, RUN_END_NAME),
    (RESET_TILE_ID, RESET_NAME),
    (SAVE_QUIT_TILE_ID, SAVE_QUIT_NAME),
];

/// Prefix marking metadata lines at the top of a run log.
pub const META_PREFIX: char = '#';

// Run log columns ---------------------------------------------------------
pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_TILE_ID: &str = "tile_id";
pub const COL_LEGACY_TILE_ID: &str = "transition_id";
pub const COL_LOCATION_ID: &str = "location_id";
pub const COL_ITEM_ID: &str = "item_id";
pub const COL_EVENT_ID: &str = "event_id";

// Reference data files ----------------------------------------------------
pub const TILES_FILE: &str = "tiles.json";
pub const CHECKS_FILE: &str = "checks.json";
pub const ITEMS_FILE: &str = "items.json";
pub const EVENTS_FILE: &str = "events.json";

/// Seed for the row hasher; changing it changes every logic-tile id.
pub const ROW_HASH_SEED: u64 = 0;
