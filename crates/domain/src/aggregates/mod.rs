//! Aggregate roots - domain objects that own their related data
//!
//! The game state is the only aggregate. It is mutated exclusively through
//! [`GameState::apply`], which returns the events describing what changed.

pub mod game_state;

pub use game_state::GameState;
