use thiserror::Error;

use crate::types::DampeningKey;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid dampening for {key}: {reason}")]
    InvalidConfig { key: DampeningKey, reason: String },
}

impl Error {
    pub fn invalid_config(key: &DampeningKey, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
