//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and processing limits so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "sovereign";

/// Local config filename (e.g. `.sovereign.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".sovereign.toml";

/// Directory name under `~/.config/` for global config and session state.
pub const CONFIG_DIR: &str = "sovereign";

/// Files larger than this are never queued or written back.
pub const MAX_FILE_BYTES: u64 = 1_000_000;

/// Upper bound on the project-context excerpt held in memory.
pub const MAX_CONTEXT_CHARS: usize = 4_000;

/// Bounded number of journal entries kept for observers.
pub const JOURNAL_CAPACITY: usize = 60;

/// How many times a pipeline step is re-prompted after a guardrail rejection.
pub const GUARDRAIL_RETRIES: u32 = 2;


// ── Environment variable names ──────────────────────────────────────

pub const ENV_REPO: &str = "SOVEREIGN_REPO";
pub const ENV_MODEL: &str = "SOVEREIGN_MODEL";
pub const ENV_REPO_TOKEN: &str = "SOVEREIGN_REPO_TOKEN";
pub const ENV_MODEL_KEY: &str = "SOVEREIGN_MODEL_KEY";
