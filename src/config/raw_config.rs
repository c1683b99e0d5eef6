use crate::config::WorkerConfig;
use figment::{providers, providers::Format, Figment};
use serde::{Deserialize, Serialize};

/// Raw configuration structure that is used to read the configuration from the file.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RawConfig {
    /// Configuration for the workers.
    pub worker: WorkerConfig,
}

impl RawConfig {
    /// Reads the configuration from the file (TOML) and merges it with the default values.
    pub fn read_from_file(path: &str) -> anyhow::Result<Self> {
        Ok(
            Figment::from(providers::Serialized::defaults(Self::default()))
                .merge(providers::Toml::file(path))
                .merge(providers::Env::prefixed("WORKER2_").split("__"))
                .extract()?,
        )
    }
}
