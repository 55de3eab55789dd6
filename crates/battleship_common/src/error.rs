use std::io;

/// The error taxonomy carried across the wire codec, the client handler
/// and the match driver.
///
/// `Corrupted` and `ReplayOrGap` never escape [`crate::codec::FrameCodec`]
/// itself: a bad frame is logged and dropped internally so the stream
/// keeps running.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("corrupted frame: {0}")]
    Corrupted(String),

    #[error("replay or sequence gap: expected {expected}, got {got}")]
    ReplayOrGap { expected: u64, got: u64 },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid input: {0}")]
    User(String),

    #[error("timed out waiting for input")]
    Timeout,
}

impl From<io::Error> for GameError {
    fn from(e: io::Error) -> Self {
        GameError::ConnectionLost(e.to_string())
    }
}

impl From<serde_json::Error> for GameError {
    fn from(e: serde_json::Error) -> Self {
        GameError::Protocol(e.to_string())
    }
}

pub type GameResult<T> = Result<T, GameError>;
