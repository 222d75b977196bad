//! Roguegen Engine library.
//!
//! Turns a theme into a complete, playable roguelike game by asking a model
//! for small JSON edits until every content requirement is met.
//!
//! ## Structure
//!
//! - `use_cases/` - Convergence loop, streaming seed, and targeted generators
//! - `infrastructure/` - Model backends (ports + adapters) and fixtures
//! - `api/` - HTTP entry points
//! - `config` - Environment-driven settings
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod config;
pub mod infrastructure;
pub mod use_cases;

/// Deterministic model gateways and sample games for tests.
#[cfg(test)]
pub mod test_fixtures;

pub use app::App;
