//! Engine constants and tuning parameters.

/// Simulation tick rate (Hz).
pub const TICK_RATE: u32 = 60;

/// Seconds per tick.
pub const DT: f64 = 1.0 / TICK_RATE as f64;

// --- Scheduling ---

/// Medium pass runs on every Nth tick.
pub const MEDIUM_PASS_INTERVAL: u64 = 10;

/// Slow pass runs on every Nth tick.
pub const SLOW_PASS_INTERVAL: u64 = 100;

/// Default number of worker threads for steering computations.
pub const DEFAULT_WORKER_THREADS: usize = 4;

// --- Steering ---

/// Below this angle (radians) no rotation axis can be computed reliably.
pub const MIN_ROTATION_ANGLE: f64 = 0.001;

/// Accelerate only when heading is within this angle (radians) of the desired direction.
pub const ANGLE_ACCELERATE_WHEN: f64 = 0.02;

/// Default rotation limit per tick (2 degrees).
pub const DEFAULT_ROTATION_PER_TICK: f64 = 0.034_906_585_039_886_6;

/// Proximity detonation fires when velocity alignment with the desired
/// direction drops below this cosine (about 5.7 degrees off).
pub const COS_ANGLE_DETONATE: f64 = 0.995;

/// Ticks of travel predicted ahead for the obstruction ray.
pub const OBSTRUCTION_LOOKAHEAD_TICKS: f64 = 5.0;

/// Contact point must be at least this far (m) from the projectile to relocate onto it.
pub const RELOCATE_MIN_DISTANCE: f64 = 0.1;

/// Rail stage ends after travelling this multiple of the projectile's own diagonal.
pub const RAIL_ARMING_DIAGONALS: f64 = 2.0;

/// Intercept solver multiplies tangential velocity by this when trying hard.
pub const TRY_HARD_TANGENTIAL_FACTOR: f64 = 3.0;

// --- Targeting ---

/// A sighting younger than this (seconds) is considered live.
pub const SIGHTING_RECENT_SECS: f64 = 2.0;

/// Wait this long (seconds) after a failed network retarget before scanning again.
pub const RETARGET_BACKOFF_SECS: f64 = 10.0;

/// Rounds with less guidance than this (seconds) are claimed but not guided.
pub const MIN_GUIDANCE_SECS: f64 = 1.0;

// --- Cluster ---

/// Master velocity change per tick (m/s) treated as the master being destroyed.
pub const CLUSTER_VELOCITY_ANOMALY: f64 = 100.0;

/// A slave within this distance (m) of its formation slot is considered in place.
pub const CLUSTER_SLOT_TOLERANCE: f64 = 0.05;

/// Maximum closing speed (m/s) a slave may use to regain its slot.
pub const CLUSTER_MAX_CLOSING_SPEED: f64 = 20.0;

/// Spread multiplier moves toward its goal by at most this much per update.
pub const CLUSTER_SPREAD_STEP: f64 = 0.1;

// --- Launcher ---

/// Inventory is rescanned at most once per this many ticks.
pub const INVENTORY_CHECK_INTERVAL: u64 = TICK_RATE as u64;

/// Maximum rectangular distance between round and launcher forward vectors.
pub const CLAIM_FACING_TOLERANCE: f64 = 0.01;

/// Slewing mounts inflate their spawn box by this many grid cells.
pub const TURRET_SPAWN_BOX_INFLATE_CELLS: f64 = 2.0;

/// Weapons reporting less range than this (m) fall back to the round's maximum travel.
pub const MIN_WEAPON_RANGE: f64 = 1.0;
