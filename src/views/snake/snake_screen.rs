//! Message text and vote buttons for the channel game.
use std::time::Duration;

use tokio::time::Instant;

use crate::{
    display::{Button, DisplayContent, Keyboard},
    models::snake::{
        snake_board::Board, snake_direction::Direction, snake_session::SessionSnapshot,
        vote_tally::VoteCounts,
    },
};

pub const TITLE: &str = "👅 *CHANNEL PLAYS SNAKE* 👅";
pub const VOTE_PROMPT: &str = "Vote For The Next Move:\n⏳";

const BUTTON_ROWS: [[Direction; 2]; 2] = [
    [Direction::Up, Direction::Down],
    [Direction::Left, Direction::Right],
];

/// The round message: score, countdown, board and vote buttons.
#[must_use]
pub fn running_content(snapshot: &SessionSnapshot, now: Instant) -> DisplayContent {
    let text = format!(
        "{TITLE}\n{}\n\n{}\n\n{VOTE_PROMPT}",
        status(snapshot.score, snapshot.round_deadline, now),
        snapshot.board.render()
    );
    DisplayContent {
        text,
        buttons: Some(keyboard(&snapshot.board, snapshot.counts)),
    }
}

#[must_use]
pub fn game_over_content(snapshot: &SessionSnapshot, restart_in: Duration) -> DisplayContent {
    let text = format!(
        "🎮 *Game Over!* 🎮\n*💰Final Score:* {}\n\n{}\n\n*🚨 NEW GAME IN {} SECONDS 🚨*",
        snapshot.score,
        snapshot.board.render(),
        restart_in.as_secs()
    );
    DisplayContent {
        text,
        buttons: None,
    }
}

#[must_use]
pub fn stopped_content(snapshot: &SessionSnapshot) -> DisplayContent {
    let text = format!(
        "🐍 *Game stopped!*\n*💰Final Score:* {}\n\n{}",
        snapshot.score,
        snapshot.board.render()
    );
    DisplayContent {
        text,
        buttons: None,
    }
}

/// Vote buttons labelled with live counts. The button that would reverse a
/// snake longer than one cell is left out.
#[must_use]
pub fn keyboard(board: &Board, counts: VoteCounts) -> Keyboard {
    BUTTON_ROWS
        .iter()
        .map(|row| {
            row.iter()
                .filter(|d| !board.is_reversal(**d))
                .map(|d| Button {
                    label: format!("{} {} ({})", d.arrow(), d.label(), counts.get(*d)),
                    token: d.token().to_string(),
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

fn status(score: u32, deadline: Option<Instant>, now: Instant) -> String {
    let left = deadline.map_or(0, |d| d.saturating_duration_since(now).as_secs());
    let (mins, secs) = (left / 60, left % 60);
    format!("\n*💰Score:* {score} \n*⏰Next move in:* {mins:02}:{secs:02}")
}
