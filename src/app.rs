//! Inbound events from the chat client and the replies they get.
use log::{debug, error, warn};

use crate::{
    display::ChatDisplay,
    models::snake::{
        snake_direction::Direction,
        snake_error::Result,
        snake_params::GameParams,
        snake_session::{StartOutcome, StopOutcome, VoteRejection},
        vote_tally::{VoteOutcome, VoterId},
    },
    view_models::snake::session_view_model::SessionViewModel,
};

/// Channel used when `SNAKE_CHANNEL_ID` is not set.
pub const DEFAULT_CHANNEL_ID: i64 = 0;

pub const ALREADY_RUNNING: &str = "⚠️ Game is already running!";
pub const NOTHING_TO_STOP: &str = "⚠️ No active game to stop!";
pub const STOPPED: &str = "🐍 Game stopped!";
pub const START_FAILED: &str = "⚠️ Could not start a game";
pub const ALREADY_VOTED: &str = "You already voted this direction!";

/// Identity of the chat a command or vote came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// The only chat whose commands and votes are honoured.
    pub channel: ChatId,
    pub params: GameParams,
}

impl AppConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let channel = match std::env::var("SNAKE_CHANNEL_ID") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring SNAKE_CHANNEL_ID={raw:?}: not a valid chat id");
                DEFAULT_CHANNEL_ID
            }),
            Err(_) => DEFAULT_CHANNEL_ID,
        };
        Self {
            channel: ChatId(channel),
            params: GameParams::from_env(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel: ChatId(DEFAULT_CHANNEL_ID),
            params: GameParams::default(),
        }
    }
}

/// Acknowledgment text for an accepted vote.
#[must_use]
pub fn vote_ack(direction: Direction, outcome: VoteOutcome) -> String {
    match outcome {
        VoteOutcome::New => format!("Voted {direction}!"),
        VoteOutcome::Duplicate => ALREADY_VOTED.to_string(),
        VoteOutcome::Changed { .. } => format!("Changed vote to {direction}!"),
    }
}

#[derive(Debug)]
pub struct SnakeApp {
    channel: ChatId,
    session: SessionViewModel,
}

impl SnakeApp {
    /// Spawns the session for `config.channel`. Needs a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::models::snake::snake_error::SnakeError`] if the game params are invalid.
    pub fn new<D: ChatDisplay>(config: AppConfig, display: D) -> Result<Self> {
        Ok(Self {
            channel: config.channel,
            session: SessionViewModel::new(config.params, display)?,
        })
    }

    /// `/start`. Returns the reply to post, if any. A successful start
    /// replies through the board message itself.
    pub async fn on_start_command(&self, source: ChatId) -> Option<String> {
        if source != self.channel {
            debug!("Ignoring start from {source:?}");
            return None;
        }
        match self.session.start().await {
            Ok(StartOutcome::Started) => None,
            Ok(StartOutcome::AlreadyRunning) => Some(ALREADY_RUNNING.to_string()),
            Err(e) => {
                error!("Start failed: {e}");
                Some(START_FAILED.to_string())
            }
        }
    }

    /// `/stop`. Returns the reply to post, if any.
    pub async fn on_stop_command(&self, source: ChatId) -> Option<String> {
        if source != self.channel {
            debug!("Ignoring stop from {source:?}");
            return None;
        }
        match self.session.stop().await {
            Ok(StopOutcome::Stopped) => Some(STOPPED.to_string()),
            Ok(StopOutcome::NothingToStop) => Some(NOTHING_TO_STOP.to_string()),
            Err(e) => {
                error!("Stop failed: {e}");
                Some(VoteRejection::SessionClosed.message())
            }
        }
    }

    /// A vote button press. Always answered so the client can clear its spinner.
    pub async fn on_vote_event(&self, chat: ChatId, voter: VoterId, token: &str) -> String {
        if chat != self.channel {
            return VoteRejection::WrongChannel.message();
        }
        let Ok(direction) = token.parse::<Direction>() else {
            warn!("Vote from {voter:?} with unknown token {token:?}");
            return VoteRejection::UnknownDirection(token.to_string()).message();
        };
        match self.session.vote(voter, direction).await {
            Ok(outcome) => vote_ack(direction, outcome),
            Err(rejection) => rejection.message(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionViewModel {
        &self.session
    }

    pub async fn shutdown(self) {
        self.session.shutdown().await;
    }
}
