mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LogSettings, PartialSettings, ServerSettings, SessionSettings, Settings,
};

/// Prefix of the environment variables read by [`load_config`].
pub const ENV_PREFIX: &str = "CHATRELAY";

/// Builds [`Settings`] from built-in defaults, an optional `config/default`
/// file and `CHATRELAY__`-prefixed environment variables, later sources
/// taking precedence.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}
