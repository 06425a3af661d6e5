#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("empty image reference")]
    Empty,
    #[error("repository name `{0}` exceeds 255 bytes")]
    NameTooLong(String),
    #[error("invalid repository name: `{0}`")]
    InvalidRepository(String),
    #[error("invalid tag: `{0}`")]
    InvalidTag(String),
    #[error("invalid digest: `{0}`")]
    InvalidDigest(String),
}

pub type Result<T> = std::result::Result<T, Error>;
