//! Run policy knobs.

use serde::{Deserialize, Serialize};

const fn default_lock_wait_secs() -> u64 {
    30
}

/// What to do when source and target share one physical database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedDatabasePolicy {
    /// Log the risk and continue.
    #[default]
    Warn,
    /// Refuse the run before any step executes.
    Deny,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub shared_database: SharedDatabasePolicy,

    /// Pass `force=true` to the diff endpoint, bypassing platform version checks.
    #[serde(default)]
    pub force_diff: bool,

    /// How long to wait for another run holding the target lock, in seconds.
    #[serde(default = "default_lock_wait_secs")]
    pub lock_wait_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            shared_database: SharedDatabasePolicy::default(),
            force_diff: false,
            lock_wait_secs: default_lock_wait_secs(),
        }
    }
}
