//! History retention policy for the root multistore.

use serde::{Deserialize, Serialize};

use basalt_primitives::Version;

/// Which committed versions stay queryable.
///
/// After committing version `v`, the version `v - keep_recent` is dropped
/// unless `keep_every` is non-zero and divides it. `keep_recent = 0` keeps
/// everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningOptions {
    pub keep_recent: u64,
    pub keep_every: u64,
}

impl Default for PruningOptions {
    fn default() -> Self {
        Self {
            keep_recent: 100,
            keep_every: 10_000,
        }
    }
}

impl PruningOptions {
    pub fn new(keep_recent: u64, keep_every: u64) -> Self {
        Self {
            keep_recent,
            keep_every,
        }
    }

    /// Keep only the latest version.
    pub fn nothing() -> Self {
        Self::new(1, 0)
    }

    /// Keep every version.
    pub fn everything() -> Self {
        Self::new(0, 0)
    }

    /// The version that falls out of the window when `committed` lands.
    pub fn version_to_prune(&self, committed: Version) -> Option<Version> {
        if self.keep_recent == 0 || committed <= self.keep_recent {
            return None;
        }
        let candidate = committed - self.keep_recent;
        if self.keep_every > 0 && candidate % self.keep_every == 0 {
            return None;
        }
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_everything() {
        let opts = PruningOptions::everything();
        assert_eq!(opts.version_to_prune(1_000_000), None);
    }

    #[test]
    fn test_keep_nothing() {
        let opts = PruningOptions::nothing();
        assert_eq!(opts.version_to_prune(1), None);
        assert_eq!(opts.version_to_prune(2), Some(1));
        assert_eq!(opts.version_to_prune(10), Some(9));
    }

    #[test]
    fn test_keep_recent_with_snapshots() {
        let opts = PruningOptions::new(2, 5);
        assert_eq!(opts.version_to_prune(2), None);
        assert_eq!(opts.version_to_prune(3), Some(1));
        assert_eq!(opts.version_to_prune(7), None);
        assert_eq!(opts.version_to_prune(8), Some(6));
    }

    #[test]
    fn test_default_from_json() {
        let opts: PruningOptions = serde_json::from_str(r#"{"keep_recent": 3}"#).unwrap();
        assert_eq!(opts.keep_recent, 3);
        assert_eq!(opts.keep_every, 10_000);
    }
}
