//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and pipeline defaults so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "reviewloom";

/// Crate version, as reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local config filename (e.g. `.reviewloom.toml` in repo root).
pub const CONFIG_FILENAME: &str = ".reviewloom.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "reviewloom";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "REVIEWLOOM_PROVIDER";
pub const ENV_MODEL: &str = "REVIEWLOOM_MODEL";
pub const ENV_API_KEY: &str = "REVIEWLOOM_API_KEY";
pub const ENV_BASE_URL: &str = "REVIEWLOOM_BASE_URL";
pub const ENV_MAX_CONCURRENT: &str = "REVIEWLOOM_MAX_CONCURRENT";

// ── Pipeline defaults ───────────────────────────────────────────────

/// Simultaneous pipeline runs.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Hard ceiling on turns in one run.
pub const DEFAULT_MAX_MESSAGES: usize = 200;

/// Whole-run deadline.
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

/// Minimum length of a structured payload for the final-output heuristic.
pub const DEFAULT_FINAL_MIN_LEN: usize = 200;

/// Retry hint returned with `concurrency_exceeded`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Fuzzy line-match threshold.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.5;

/// Lines on each side returned by the context lookup.
pub const DEFAULT_CONTEXT_WINDOW: usize = 1;

/// Reputation score assumed for an unknown submitter.
pub const DEFAULT_REPUTATION_SCORE: i64 = 60;

/// Maximum characters of raw stage text embedded in an `unparsed_result` finding.
pub const UNPARSED_EXCERPT_CHARS: usize = 500;

/// Maximum characters of the repository description sent to stages.
pub const README_EXCERPT_CHARS: usize = 4000;
