#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset '{0}' is not tracked")]
    NotTracked(String),

    #[error("asset '{key}' is type {actual:?}, expected {expected:?}")]
    WrongType {
        key: String,
        expected: crate::AssetType,
        actual: crate::AssetType,
    },

    #[error("failed to decode asset: {0}")]
    DecodeFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssetError>;
