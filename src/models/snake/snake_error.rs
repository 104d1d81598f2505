use std::time::Duration;

pub type Result<T> = std::result::Result<T, SnakeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnakeError {
    InvalidBoardSize { width: usize, height: usize },
    InvalidStartingSnake,
    InvalidDuration(Duration),
    /// Every cell is covered by the snake so food has nowhere to go.
    NoFreeCell,
    UnknownDirection(String),
    /// The session main loop is no longer running.
    SessionClosed,
}

impl std::fmt::Display for SnakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnakeError::InvalidBoardSize { width, height } => {
                write!(f, "invalid board size {width}x{height}")
            }
            SnakeError::InvalidStartingSnake => write!(f, "invalid starting snake"),
            SnakeError::InvalidDuration(d) => write!(f, "invalid duration {d:?}"),
            SnakeError::NoFreeCell => write!(f, "no free cell left for food"),
            SnakeError::UnknownDirection(token) => write!(f, "unknown direction '{token}'"),
            SnakeError::SessionClosed => write!(f, "session is closed"),
        }
    }
}

impl std::error::Error for SnakeError {}
