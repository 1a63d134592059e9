/// Failure while querying the container runtime for its inventory.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("failed to list containers: {0}")]
    List(#[source] bollard::errors::Error),
    #[error("failed to inspect container `{name}`: {source}")]
    Inspect {
        name: String,
        #[source]
        source: bollard::errors::Error,
    },
}

/// Failure while rendering a snapshot into the text exposition format.
#[derive(Debug, thiserror::Error)]
pub enum ExpositionError {
    #[error("failed to encode metric families: {0}")]
    Encode(#[from] prometheus::Error),
    #[error("encoded metrics are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
