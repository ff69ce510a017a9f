//! Loading entry point

use super::merge::merge_policy::builder_with_defaults;
use super::sources;
use super::ReactiveConfig;
use config::ConfigError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `reactive-actions.toml` from `dir` if present, then environment overrides
    pub fn load(dir: &Path) -> Result<ReactiveConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = sources::add_file(builder, &sources::config_file_in(dir), false)?;
        let builder = sources::add_env(builder)?;
        builder.build()?.try_deserialize()
    }

    /// Load a specific file, which must exist, then environment overrides
    pub fn load_from_file(path: &Path) -> Result<ReactiveConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = sources::add_file(builder, path, true)?;
        let builder = sources::add_env(builder)?;
        builder.build()?.try_deserialize()
    }

    /// Built-in defaults only
    pub fn defaults() -> ReactiveConfig {
        ReactiveConfig::default()
    }
}
