use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};

/// Default location of the TOML configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

/// Prefix for environment overrides, e.g. `CALSPREAD_SCANNER__WORKERS=8`.
pub const ENV_PREFIX: &str = "CALSPREAD_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration by layering built-in defaults, the TOML file at
    /// `path`, prefixed environment variables and an optional JSON sibling.
    ///
    /// Missing files are skipped, so an empty directory yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let json_path = std::path::Path::new(path).with_extension("json");

        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(json_path))
            .extract()?;

        Ok(config)
    }
}
