use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame payload of {0} bytes exceeds the configured maximum of {1} bytes")]
    FrameTooLarge(u32, u32),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload serialization error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("checkpoint serialization error: {0}")]
    CheckpointEncoding(#[from] serde_json::Error),

    #[error("unexpected end of stream while reading a frame")]
    Truncated,
}

pub type Result<T> = std::result::Result<T, WireError>;
