use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("repository error: {0}")]
    Repository(#[from] famhub_repo::RepositoryError),

    #[error("fabric error: {0}")]
    Fabric(#[from] famhub_fabric::FabricError),
}

pub type HubResult<T> = Result<T, HubError>;
