//! Tunable settings for a channel game.
use std::time::Duration;

use log::{debug, warn};

use super::snake_error::{Result, SnakeError};

/// Default board width.
pub const DEFAULT_WIDTH: usize = 8;
/// Default board height.
pub const DEFAULT_HEIGHT: usize = 7;
/// Length of one voting window.
pub const DEFAULT_ROUND_SECS: u64 = 300;
/// Pause between game over and the automatic restart.
pub const DEFAULT_RESTART_SECS: u64 = 10;
/// Min board size on either axis.
pub const MIN_BOARD_SIZE: usize = 2;
/// Max board size on either axis. Keeps the rendered message under chat limits.
pub const MAX_BOARD_SIZE: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameParams {
    pub width: usize,
    pub height: usize,
    pub round_duration: Duration,
    pub restart_cooldown: Duration,
}

impl GameParams {
    /// Checks the parameters describe a playable game.
    ///
    /// # Errors
    ///
    /// Returns a [`SnakeError`] if the board is out of bounds or a duration is zero.
    pub fn validate(&self) -> Result<()> {
        let size_range = MIN_BOARD_SIZE..=MAX_BOARD_SIZE;
        if !size_range.contains(&self.width) || !size_range.contains(&self.height) {
            return Err(SnakeError::InvalidBoardSize {
                width: self.width,
                height: self.height,
            });
        }
        for d in [self.round_duration, self.restart_cooldown] {
            if d.is_zero() {
                return Err(SnakeError::InvalidDuration(d));
            }
        }
        Ok(())
    }

    /// Defaults overridden by `SNAKE_WIDTH`, `SNAKE_HEIGHT`, `SNAKE_ROUND_SECS`
    /// and `SNAKE_RESTART_SECS` when they are set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GameParams::from_env`] but reading from `lookup`.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut params = Self::default();
        if let Some(w) = parse_var(&lookup, "SNAKE_WIDTH") {
            params.width = w;
        }
        if let Some(h) = parse_var(&lookup, "SNAKE_HEIGHT") {
            params.height = h;
        }
        if let Some(secs) = parse_var(&lookup, "SNAKE_ROUND_SECS") {
            params.round_duration = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "SNAKE_RESTART_SECS") {
            params.restart_cooldown = Duration::from_secs(secs);
        }
        debug!("Game params: {params:?}");
        params
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}

impl Default for GameParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            round_duration: Duration::from_secs(DEFAULT_ROUND_SECS),
            restart_cooldown: Duration::from_secs(DEFAULT_RESTART_SECS),
        }
    }
}
