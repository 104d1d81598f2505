pub mod snake_board;
pub mod snake_direction;
pub mod snake_error;
pub mod snake_params;
pub mod snake_session;
pub mod vote_tally;
