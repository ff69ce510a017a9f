//! Merge rules: defaults first, later sources override earlier ones.

use super::super::{
    default_command_timeout_ms, default_connection_timeout_ms, default_redis_prefix,
    default_redis_url, default_verify_tracked_results,
};
use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("store.backend", "memory")?
        .set_default("store.redis.url", default_redis_url())?
        .set_default("store.redis.prefix", default_redis_prefix())?
        .set_default(
            "store.redis.connection_timeout_ms",
            default_connection_timeout_ms(),
        )?
        .set_default("store.redis.command_timeout_ms", default_command_timeout_ms())?
        .set_default(
            "executor.verify_tracked_results",
            default_verify_tracked_results(),
        )?
        .set_default("logging.level", "info")
}
