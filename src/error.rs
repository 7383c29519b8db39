use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid trip input: {0}")]
    InvalidInput(String),

    #[error("invalid fuel price: {0} (must be a positive number)")]
    InvalidPrice(f64),

    #[error("invalid trip record: {0}")]
    InvalidRecord(String),

    #[error("fuel price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("trip {0} not found")]
    NotFound(i64),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Keyring(#[from] keyring::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    ConfigLoad(#[from] config::ConfigError),
}
