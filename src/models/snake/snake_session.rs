//! Lifecycle of one channel game: idle, running, game over.
//!
//! Everything here is synchronous and free of I/O. Timers and the display
//! live in [`crate::view_models::snake::session_view_model`].
use log::{error, info};
use rand::{rngs::StdRng, SeedableRng};
use tokio::time::Instant;

use crate::display::DisplayHandle;

use super::{
    snake_board::{Board, MoveOutcome},
    snake_direction::Direction,
    snake_error::Result,
    snake_params::GameParams,
    vote_tally::{VoteCounts, VoteOutcome, VoteTally, VoterId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NothingToStop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameOverReason {
    SelfCollision,
    /// The snake filled the grid and food could not be placed.
    BoardFull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundResolution {
    Continued {
        direction: Direction,
        outcome: MoveOutcome,
    },
    GameOver(GameOverReason),
    /// Nothing to resolve because the game is not running.
    NotRunning,
}

/// Why a vote was refused. No state changes when this is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteRejection {
    GameNotActive,
    UnknownDirection(String),
    WrongChannel,
    SessionClosed,
}

impl VoteRejection {
    /// Text shown to the voter.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            VoteRejection::GameNotActive => "Game not active. Start with /start".to_string(),
            VoteRejection::UnknownDirection(token) => format!("Unknown direction '{token}'"),
            VoteRejection::WrongChannel => "This game is played in another channel".to_string(),
            VoteRejection::SessionClosed => "Game is unavailable right now".to_string(),
        }
    }
}

/// Copy of everything the display needs, taken in one go.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub score: u32,
    pub move_count: u32,
    pub board: Board,
    pub counts: VoteCounts,
    pub round_deadline: Option<Instant>,
    pub display_handle: Option<DisplayHandle>,
}

#[derive(Debug)]
pub struct Session {
    params: GameParams,
    state: SessionState,
    board: Board,
    tally: VoteTally,
    score: u32,
    move_count: u32,
    round_deadline: Option<Instant>,
    display_handle: Option<DisplayHandle>,
    message_history: Vec<DisplayHandle>,
    seed: Option<u64>,
}

impl Session {
    /// Creates an idle session.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::models::snake::snake_error::SnakeError`] if `params` are invalid.
    pub fn new(params: GameParams) -> Result<Self> {
        Self::build(params, None)
    }

    /// Like [`Session::new`] but every board draws food from a seeded rng.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::models::snake::snake_error::SnakeError`] if `params` are invalid.
    pub fn with_seed(params: GameParams, seed: u64) -> Result<Self> {
        Self::build(params, Some(seed))
    }

    fn build(params: GameParams, seed: Option<u64>) -> Result<Self> {
        params.validate()?;
        let board = Self::fresh_board(&params, seed)?;
        Ok(Self {
            params,
            state: SessionState::Idle,
            board,
            tally: VoteTally::new(),
            score: 0,
            move_count: 0,
            round_deadline: None,
            display_handle: None,
            message_history: Vec::new(),
            seed,
        })
    }

    fn fresh_board(params: &GameParams, seed: Option<u64>) -> Result<Board> {
        match seed {
            Some(s) => Board::with_rng(params.width, params.height, StdRng::seed_from_u64(s)),
            None => Board::new(params.width, params.height),
        }
    }

    /// Starts a new game from idle or game over with a fresh board and tally.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::models::snake::snake_error::SnakeError`] if the board cannot be built.
    pub fn start(&mut self) -> Result<StartOutcome> {
        if self.state == SessionState::Running {
            return Ok(StartOutcome::AlreadyRunning);
        }
        // vary food between games when seeded
        self.seed = self.seed.map(|s| s.wrapping_add(1));
        self.board = Self::fresh_board(&self.params, self.seed)?;
        self.tally.reset();
        self.score = 0;
        self.move_count = 0;
        self.round_deadline = None;
        self.display_handle = None;
        self.state = SessionState::Running;
        info!("Game started on a {}x{} board", self.params.width, self.params.height);
        Ok(StartOutcome::Started)
    }

    pub fn stop(&mut self) -> StopOutcome {
        if self.state == SessionState::Idle {
            return StopOutcome::NothingToStop;
        }
        info!("Game stopped with score {}", self.score);
        self.state = SessionState::Idle;
        self.round_deadline = None;
        StopOutcome::Stopped
    }

    /// Opens a voting window ending one round duration after `now`.
    pub fn begin_round(&mut self, now: Instant) -> Instant {
        self.tally.reset();
        let deadline = now + self.params.round_duration;
        self.round_deadline = Some(deadline);
        deadline
    }

    /// Records a vote for the current round.
    ///
    /// # Errors
    ///
    /// Returns [`VoteRejection::GameNotActive`] unless the game is running.
    pub fn cast_vote(
        &mut self,
        voter: VoterId,
        direction: Direction,
    ) -> std::result::Result<VoteOutcome, VoteRejection> {
        if self.state != SessionState::Running {
            return Err(VoteRejection::GameNotActive);
        }
        Ok(self.tally.cast(voter, direction))
    }

    /// Applies the winning vote to the board.
    pub fn resolve_round(&mut self) -> RoundResolution {
        if self.state != SessionState::Running {
            return RoundResolution::NotRunning;
        }
        let winner = self.tally.winner(self.board.direction());
        self.board.propose_direction(winner);
        let direction = self.board.direction();
        self.move_count += 1;
        self.round_deadline = None;
        match self.board.apply_move() {
            Ok(MoveOutcome::Collided) => {
                info!("Game over after {} moves, score {}", self.move_count, self.score);
                self.state = SessionState::GameOver;
                RoundResolution::GameOver(GameOverReason::SelfCollision)
            }
            Ok(outcome) => {
                if outcome == MoveOutcome::Grew {
                    self.score += 1;
                }
                RoundResolution::Continued { direction, outcome }
            }
            Err(e) => {
                // only reachable after eating
                self.score += 1;
                error!("Forcing game over: {e}");
                self.state = SessionState::GameOver;
                RoundResolution::GameOver(GameOverReason::BoardFull)
            }
        }
    }

    /// Remembers the message showing the current round.
    pub fn record_display(&mut self, handle: DisplayHandle) {
        self.display_handle = Some(handle);
        self.message_history.push(handle);
    }

    /// Forgets the current message, e.g. after posting its successor failed.
    pub fn clear_display(&mut self) {
        self.display_handle = None;
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            score: self.score,
            move_count: self.move_count,
            board: self.board.clone(),
            counts: self.tally.counts(),
            round_deadline: self.round_deadline,
            display_handle: self.display_handle,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    #[must_use]
    pub fn params(&self) -> &GameParams {
        &self.params
    }

    #[must_use]
    pub fn round_deadline(&self) -> Option<Instant> {
        self.round_deadline
    }

    #[must_use]
    pub fn display_handle(&self) -> Option<DisplayHandle> {
        self.display_handle
    }

    #[must_use]
    pub fn message_history(&self) -> &[DisplayHandle] {
        &self.message_history
    }

    #[cfg(test)]
    pub(crate) fn set_board(&mut self, board: Board) {
        self.board = board;
    }
}
