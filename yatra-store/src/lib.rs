pub mod app_config;
pub mod draft_store;
pub mod http_backend;
pub mod session_store;

pub use app_config::Config;
pub use draft_store::FileDraftStore;
pub use http_backend::HttpBookingBackend;
pub use session_store::FileSessionStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity error: {0}")]
    Identity(#[from] yatra_core::CoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
