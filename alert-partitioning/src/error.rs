use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("membership list is empty, refusing to rebuild the bucket table")]
    EmptyMembership,

    #[error("partition manager already started")]
    AlreadyStarted,

    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, Error>;
