use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Dampening(#[from] alert_dampening::Error),

    #[error("invalid cluster member id: {0}")]
    InvalidMemberId(String),

    #[error("invalid definitions: {0}")]
    Json(#[from] serde_json::Error),

    #[error("definitions store unavailable: {0}")]
    Definitions(String),
}

pub type Result<T> = std::result::Result<T, Error>;
