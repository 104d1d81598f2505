//! One vote per voter per round, with a fixed tie-break order.
use std::collections::HashMap;

use super::snake_direction::Direction;

/// Identity of whoever pressed a vote button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoterId(pub i64);

/// Where a voter stands in the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoterChoice {
    NoVote,
    Voted(Direction),
}

/// Result of [`VoteTally::cast`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    New,
    /// Same direction as before. Nothing changed.
    Duplicate,
    Changed { from: Direction },
}

/// Votes per direction, indexed like [`Direction::VARIANTS`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteCounts([u32; 4]);

impl VoteCounts {
    #[must_use]
    pub fn get(&self, direction: Direction) -> u32 {
        self.0[direction.index()]
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

#[derive(Clone, Debug, Default)]
pub struct VoteTally {
    counts: VoteCounts,
    voter_choice: HashMap<VoterId, Direction>,
}

impl VoteTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn choice_of(&self, voter: VoterId) -> VoterChoice {
        match self.voter_choice.get(&voter) {
            Some(d) => VoterChoice::Voted(*d),
            None => VoterChoice::NoVote,
        }
    }

    pub fn cast(&mut self, voter: VoterId, direction: Direction) -> VoteOutcome {
        match self.choice_of(voter) {
            VoterChoice::NoVote => {
                self.counts.0[direction.index()] += 1;
                self.voter_choice.insert(voter, direction);
                VoteOutcome::New
            }
            VoterChoice::Voted(previous) if previous == direction => VoteOutcome::Duplicate,
            VoterChoice::Voted(previous) => {
                let old = &mut self.counts.0[previous.index()];
                *old = old.saturating_sub(1);
                self.counts.0[direction.index()] += 1;
                self.voter_choice.insert(voter, direction);
                VoteOutcome::Changed { from: previous }
            }
        }
    }

    /// Direction with the most votes. Ties go to the earliest direction in
    /// [`Direction::VARIANTS`]; no votes at all keeps `current`.
    #[must_use]
    pub fn winner(&self, current: Direction) -> Direction {
        let max = Direction::VARIANTS
            .iter()
            .map(|d| self.counts.get(*d))
            .max()
            .unwrap_or(0);
        if max == 0 {
            return current;
        }
        Direction::VARIANTS
            .into_iter()
            .find(|d| self.counts.get(*d) == max)
            .unwrap_or(current)
    }

    pub fn reset(&mut self) {
        self.counts = VoteCounts::default();
        self.voter_choice.clear();
    }

    #[must_use]
    pub fn counts(&self) -> VoteCounts {
        self.counts
    }

    #[must_use]
    pub fn voter_count(&self) -> usize {
        self.voter_choice.len()
    }
}
