//! Configuration merge system
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. Host config (~/.config/petcare-edge/edge.toml)
//! 3. Project config (.petcare/edge.toml)
//! 4. CLI overrides

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::builtin_layer;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
pub use settings::EdgeSettings;

use std::path::{Path, PathBuf};

/// Host config location, if a home directory is known.
pub fn host_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("petcare-edge")
            .join("edge.toml")
    })
}

/// Project config location under a project root.
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(".petcare").join("edge.toml")
}
