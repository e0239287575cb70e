// Central place for notice strings, wire paths and other non-localized constants.
// Keep these out of session.rs so the wording can be tweaked in one place.

// Backend endpoints (relative to the configured base URL).
pub const API_DOCUMENT: &str = "/api/document";
pub const API_DOCUMENT_HASH: &str = "/api/document/hash";
pub const API_STATUS: &str = "/api/status";
pub const API_LOG: &str = "/api/log";
pub const API_FAVORITES_PREFIX: &str = "/api/favorites/";
pub const API_CATALOG_PREFIX: &str = "/api/catalog/";
pub const API_FACTIONS_PREFIX: &str = "/api/factions/";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8765";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

// Poll and quiet-period defaults (milliseconds).
pub const DEFAULT_DRIFT_INTERVAL_MS: u64 = 2_500;
pub const DEFAULT_LIVENESS_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_EDIT_COOLDOWN_MS: u64 = 3_000;
pub const DEFAULT_PUSH_DEBOUNCE_MS: u64 = 750;

// Presets that are always favorited and cannot be removed.
pub const DEFAULT_PINNED_PRESETS: &[&str] = &["- Zeroed Sliders -", "Zeroed Sliders"];

// Liveness payload values.
pub const STATUS_ACTIVE: &str = "active";

// Favorites / catalog wire keys.
pub const KEY_FAVORITES: &str = "favorites";
pub const KEY_PLUGINS: &str = "plugins";
pub const KEY_FACTIONS: &str = "factions";
pub const KEY_HASH: &str = "hash";
pub const KEY_STATUS: &str = "status";

// Catalog categories as written by the backend exporters.
pub const CATEGORY_NPCS: &str = "npcs";
pub const CATEGORY_ARMORS: &str = "armors";
pub const CATEGORY_OUTFITS: &str = "outfits";
pub const CATEGORY_WEAPONS: &str = "weapons";
pub const EQUIPMENT_CATEGORIES: [&str; 3] = [CATEGORY_ARMORS, CATEGORY_OUTFITS, CATEGORY_WEAPONS];

// English notice strings (EN_ prefix to make future localization easier)
pub const EN_APP_TITLE: &str = "PDA Assist";

pub const EN_NOTICE_LOADED: &str = "Configuration loaded";
pub const EN_NOTICE_RELOADED: &str = "Configuration changed on disk, reloaded";
pub const EN_NOTICE_LOAD_FAILED: &str = "Could not load the configuration. Use reload to retry.";
pub const EN_NOTICE_SAVE_FAILED: &str = "Saved locally, but the backend did not accept the change";
pub const EN_NOTICE_FAVORITES_SAVE_FAILED: &str = "Favorites kept locally, but could not be saved";
pub const EN_NOTICE_CONNECTION_LOST: &str = "Connection lost: the game is not ready";
pub const EN_NOTICE_CONNECTION_RESTORED: &str = "Connection restored";
pub const EN_NOTICE_UNREACHABLE: &str = "Backend unreachable";
pub const EN_NOTICE_DELETION_STAGED: &str = "Deletion staged, confirm to apply";
pub const EN_NOTICE_DELETED: &str = "Deleted";
pub const EN_NOTICE_EDIT_APPLIED: &str = "Edit applied";
pub const EN_NOTICE_CATALOG_FAILED: &str = "Could not refresh catalog";

pub const EN_ERR_NO_OPEN_SECTION: &str = "no section is open";
pub const EN_ERR_NO_SELECTION: &str = "nothing is selected";
pub const EN_ERR_NOTHING_STAGED: &str = "no deletion is staged";
pub const EN_ERR_UNKNOWN_ENTRY: &str = "entry is not in the catalog";
pub const EN_ERR_NON_FINITE: &str = "NaN and Infinity cannot be stored as JSON";

pub const EN_LITERAL_MISSING: &str = "<missing>";
pub const EN_LABEL_WHOLE_SECTION: &str = "(whole section)";
