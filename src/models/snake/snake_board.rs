//! Toroidal board holding a single snake and one piece of food.
use std::collections::VecDeque;

use log::{debug, warn};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::{
    snake_direction::Direction,
    snake_error::{Result, SnakeError},
};

pub const BORDER_CORNER: &str = "⏺️";
pub const BORDER_HORIZONTAL: &str = "↔️";
pub const BORDER_VERTICAL: &str = "↕️";
pub const HEAD: &str = "🥵";
pub const BODY: &str = "🟠";
pub const FOOD: &str = "🍎";
pub const EMPTY: &str = "⬜️";

/// `(x, y)` with `(0, 0)` in the top left corner.
pub type Cell = (usize, usize);

/// What happened to the snake after [`Board::apply_move`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Moved one cell, length unchanged.
    Moved,
    /// Ate the food and grew by one. New food has been placed.
    Grew,
    /// The head landed on another segment. The body keeps the overlap.
    Collided,
}

#[derive(Clone, Debug)]
pub struct Board {
    width: usize,
    height: usize,
    snake: VecDeque<Cell>,
    food: Cell,
    direction: Direction,
    rng: StdRng,
}

impl Board {
    /// Creates a board with a one cell snake in the middle heading right.
    ///
    /// # Errors
    ///
    /// Returns a [`SnakeError`] if either dimension is zero or there is no room for food.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    /// Same as [`Board::new`] but food placement draws from `rng`.
    ///
    /// # Errors
    ///
    /// Returns a [`SnakeError`] if either dimension is zero or there is no room for food.
    pub fn with_rng(width: usize, height: usize, rng: StdRng) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SnakeError::InvalidBoardSize { width, height });
        }
        let mut snake = VecDeque::new();
        snake.push_front((width / 2, height / 2));
        let mut board = Self {
            width,
            height,
            snake,
            food: (0, 0),
            direction: Direction::Right,
            rng,
        };
        board.place_food()?;
        Ok(board)
    }

    /// Builds a board from an explicit layout. `snake[0]` is the head.
    ///
    /// # Errors
    ///
    /// Returns a [`SnakeError`] if the snake is empty, leaves the grid, overlaps
    /// itself, or covers the food.
    pub fn from_parts(
        width: usize,
        height: usize,
        snake: Vec<Cell>,
        direction: Direction,
        food: Cell,
        rng: StdRng,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SnakeError::InvalidBoardSize { width, height });
        }
        let in_bounds = |c: &Cell| c.0 < width && c.1 < height;
        if snake.is_empty() || !snake.iter().all(in_bounds) || !in_bounds(&food) {
            return Err(SnakeError::InvalidStartingSnake);
        }
        for (i, cell) in snake.iter().enumerate() {
            if snake[i + 1..].contains(cell) || *cell == food {
                return Err(SnakeError::InvalidStartingSnake);
            }
        }
        Ok(Self {
            width,
            height,
            snake: snake.into_iter().collect(),
            food,
            direction,
            rng,
        })
    }

    /// Moves the food to a uniformly random free cell.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::NoFreeCell`] when the snake covers the whole grid.
    pub fn place_food(&mut self) -> Result<Cell> {
        let mut available = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.snake.contains(&(x, y)) {
                    available.push((x, y));
                }
            }
        }
        let Some(cell) = available.choose(&mut self.rng).copied() else {
            warn!("No where left to place food");
            return Err(SnakeError::NoFreeCell);
        };
        self.food = cell;
        Ok(cell)
    }

    /// Replaces the current direction unless `direction` would turn the snake
    /// straight back into its own body. Returns whether it was accepted.
    pub fn propose_direction(&mut self, direction: Direction) -> bool {
        if self.snake.len() > 1 && direction == self.direction.get_opposite() {
            debug!("Ignoring reversal from {} to {direction}", self.direction);
            return false;
        }
        self.direction = direction;
        true
    }

    /// Advances the snake one cell in the current direction, wrapping at the edges.
    ///
    /// Collision is checked after the tail has moved, so the head may take the
    /// cell the tail just left.
    ///
    /// # Errors
    ///
    /// Returns [`SnakeError::NoFreeCell`] if the snake grew and filled the grid.
    pub fn apply_move(&mut self) -> Result<MoveOutcome> {
        let (head_x, head_y) = self.head();
        let (dx, dy) = self.direction.value();
        let new_head = (
            wrap(head_x, dx, self.width),
            wrap(head_y, dy, self.height),
        );
        self.snake.push_front(new_head);

        let ate = new_head == self.food;
        if !ate {
            self.snake.pop_back();
        }

        if self.snake.iter().skip(1).any(|c| *c == new_head) {
            debug!("Snake ran into itself at {new_head:?}");
            return Ok(MoveOutcome::Collided);
        }

        if ate {
            self.place_food()?;
            return Ok(MoveOutcome::Grew);
        }
        Ok(MoveOutcome::Moved)
    }

    /// Draws the board inside a border. Head beats body beats food.
    #[must_use]
    pub fn render(&self) -> String {
        let edge = format!(
            "{BORDER_CORNER}{}{BORDER_CORNER}",
            BORDER_HORIZONTAL.repeat(self.width)
        );
        let head = self.head();
        let mut lines = Vec::with_capacity(self.height + 2);
        lines.push(edge.clone());
        for y in 0..self.height {
            let mut row = String::from(BORDER_VERTICAL);
            for x in 0..self.width {
                let cell = (x, y);
                let symbol = if cell == head {
                    HEAD
                } else if self.snake.contains(&cell) {
                    BODY
                } else if cell == self.food {
                    FOOD
                } else {
                    EMPTY
                };
                row.push_str(symbol);
            }
            row.push_str(BORDER_VERTICAL);
            lines.push(row);
        }
        lines.push(edge);
        lines.join("\n")
    }

    #[must_use]
    pub fn head(&self) -> Cell {
        // never empty: construction requires a segment and moves push before popping
        self.snake.front().copied().unwrap_or_default()
    }

    #[must_use]
    pub fn snake(&self) -> &VecDeque<Cell> {
        &self.snake
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snake.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snake.is_empty()
    }

    #[must_use]
    pub fn food(&self) -> Cell {
        self.food
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether `direction` would currently be refused by [`Board::propose_direction`].
    #[must_use]
    pub fn is_reversal(&self, direction: Direction) -> bool {
        self.snake.len() > 1 && direction == self.direction.get_opposite()
    }
}

fn wrap(coord: usize, delta: i8, size: usize) -> usize {
    match delta {
        d if d < 0 => (coord + size - 1) % size,
        0 => coord,
        _ => (coord + 1) % size,
    }
}
