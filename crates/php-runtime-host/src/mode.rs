//! Runtime execution modes.

use serde::{Deserialize, Serialize};

/// Execution mode of a runtime.
///
/// Each mode is backed by its own runtime instance; modules are compiled
/// for the mode of the runtime they are bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every operation completes before returning.
    Sync,
    /// Operations may suspend and resume on a later tick.
    Async,
    /// Paused mode: async machinery driven as if it were synchronous.
    Psync,
}

impl Mode {
    /// All modes, in accessor order.
    pub const ALL: [Mode; 3] = [Mode::Async, Mode::Psync, Mode::Sync];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Sync => "sync",
            Mode::Async => "async",
            Mode::Psync => "psync",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
