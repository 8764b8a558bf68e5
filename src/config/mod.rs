mod settings;

use std::env;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings, UpstreamSettings};

/// Environment variable selecting the `.env.<name>` file to load.
pub const ENV_SELECTOR: &str = "WSRELAY_ENV";

/// Default location of the optional configuration file (any format `config` knows).
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Loads `.env.<WSRELAY_ENV>` (or `.env` when unset) into the process
/// environment, if the file exists. Variables already set are kept.
///
/// Returns the path that was loaded. Runs before logging is configured, so
/// reporting it is left to the caller.
pub fn load_env_file() -> Option<PathBuf> {
    match env::var(ENV_SELECTOR) {
        Ok(name) => dotenvy::from_filename(format!(".env.{name}")).ok(),
        Err(_) => dotenvy::dotenv().ok(),
    }
}

/// Loads the configuration from the default file and environment variables.
/// Call [`load_env_file`] first if `.env` files should be honoured.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads the configuration from `path` (optional) and environment variables,
/// merged over the defaults.
///
/// Environment variables use the `WSRELAY` prefix and `__` between levels,
/// e.g. `WSRELAY__SERVER__PORT=9000`. `REDIS_HOST` and `REDIS_PORT` override
/// the upstream address.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("WSRELAY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("upstream.host", env::var("REDIS_HOST").ok())?
        .set_override_option("upstream.port", env::var("REDIS_PORT").ok())?;

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

#[cfg(test)]
mod tests;
