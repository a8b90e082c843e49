use {
    super::{
        api,
        metrics,
        services,
    },
    anyhow::{
        Context,
        Result,
    },
    config as config_rs,
    config_rs::{
        Environment,
        File,
    },
    serde::Deserialize,
    std::path::Path,
};

/// Configuration for all components of the catalog.
#[derive(Deserialize, Debug)]
pub struct Config {
    pub api:            api::Config,
    #[serde(default)]
    pub viewer:         services::viewer::Config,
    pub metrics_server: Option<metrics::Config>,
}

impl Config {
    pub fn new(config_file: impl AsRef<Path>) -> Result<Self> {
        Self::load(config_file, Environment::with_prefix("catalog"))
    }

    // Build a new configuration object, allowing the default values to be
    // overridden by those in the config_file or "CATALOG_"-prefixed environment
    // variables. Nested keys are separated by "__", e.g. CATALOG_API__API_KEY.
    fn load(config_file: impl AsRef<Path>, environment: Environment) -> Result<Self> {
        config_rs::Config::builder()
            .add_source(File::from(config_file.as_ref()))
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
            .map_err(|e| e.into())
    }
}

/// Loads `KEY=value` pairs from an env file into the process environment.
/// Returns `false` when the file does not exist; any other failure, such as a
/// malformed line, is an error.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(err) if err.not_found() => Ok(false),
        Err(err) => Err(err).with_context(|| format!("Could not load {}", path.display())),
    }
}
