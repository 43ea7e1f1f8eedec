//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("params.auto_skip_task", false)?
        .set_default("params.continue_on_error", false)?
        .set_default("params.use_compression", true)?
        .set_default("params.use_tar_shapefiles", true)
}
