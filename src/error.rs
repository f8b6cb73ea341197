use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Recovery(#[from] pool_recovery::Error),

    #[error("store: {0}")]
    Store(#[from] pool_recovery_store::StoreError),

    #[error("config: {0}")]
    Config(String),

    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
