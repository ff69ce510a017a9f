//! Configuration sources layered on top of the defaults

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in a directory by [`super::ConfigLoader::load`]
pub const CONFIG_FILE_NAME: &str = "reactive-actions.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "REACTIVE_ACTIONS";

/// Default config file location inside `dir`
pub fn config_file_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Add a TOML file source
pub fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if !required && !path.exists() {
        debug!(config_path = %path.display(), "No configuration file, using defaults");
        return Ok(builder);
    }
    let path = path
        .to_str()
        .ok_or_else(|| ConfigError::Message(format!("Non UTF-8 config path: {:?}", path)))?;
    Ok(builder.add_source(File::new(path, FileFormat::Toml).required(required)))
}

/// Add `REACTIVE_ACTIONS__*` environment overrides
pub fn add_env(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    ))
}
