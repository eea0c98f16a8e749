use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems. Any of these aborts startup before the
/// first network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing configuration values: {}. Set them as environment variables or in the config file", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
