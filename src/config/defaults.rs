//! System-wide default constants.
//!
//! Values marked "fixed" are design constants of the segmentation engine and
//! are not exposed in `deckwatch.toml`.

// ============================================================================
// Current-Phase Classification
// ============================================================================

/// Powered episodes spanning this many rows or fewer (`end - start <= 3`)
/// are discarded as noise before phase labelling. Fixed.
pub const MIN_EPISODE_ROWS: usize = 3;

/// Default mean-current level at or below which a sample counts as steady (A).
pub const DEFAULT_STEADY_THRESHOLD: f64 = 69.0;

/// Default number of consecutive steady samples that close a rise run.
pub const DEFAULT_STEADY_WINDOW: usize = 1;

// ============================================================================
// Swing Counting
// ============================================================================

/// Amount subtracted from the front threshold before the directional-rule
/// swing comparison. The back threshold is not damped. Fixed.
pub const FRONT_ANGLE_DAMPING_DEG: f64 = 5.0;

// ============================================================================
// Audits
// ============================================================================

/// Completeness grid resolution (seconds). Fixed.
pub const GRID_STEP_SECS: i64 = 60;

/// Port/starboard angle disagreement above this is reported (degrees).
pub const DEFAULT_ANGLE_MISMATCH_TOLERANCE_DEG: f64 = 5.0;

// ============================================================================
// Reporting
// ============================================================================

/// Decimal places for energy and ratio figures. Fixed.
pub const REPORT_DECIMALS: i32 = 2;

// ============================================================================
// Data Access
// ============================================================================

/// Directory holding one CSV per table.
pub const DEFAULT_DATA_DIR: &str = "database_in_use";

/// Timestamp column present in every table.
pub const DEFAULT_TIME_COLUMN: &str = "csvTime";

/// Timestamp layout written by the shipboard logger.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Token the logger writes when a sensor could not be read.
pub const DEFAULT_UNREADABLE_TOKEN: &str = "error";

// ============================================================================
// Config Discovery
// ============================================================================

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "DECKWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "deckwatch.toml";
