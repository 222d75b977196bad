//! Roguegen domain - the content schema of a generated roguelike and the rules
//! that govern it.
//!
//! Everything here is pure: no I/O, no model calls, no clocks. The engine
//! crate drives generation; this crate decides what a valid game looks like,
//! how edits merge into it, and what is still missing.

pub mod aggregates;
pub mod edit_operation;
pub mod entities;
pub mod error;
pub mod events;
pub mod requirements;
pub mod validation;
pub mod value_objects;

pub use aggregates::GameState;
pub use edit_operation::EditOperation;
pub use entities::{Area, Boss, Character, Item, ItemKind, Monster};
pub use error::DomainError;
pub use events::GameStateEvent;
pub use requirements::{missing_requirements, Requirement, REQUIRED_AREAS, REQUIRED_CHARACTERS};
pub use validation::Validate;
pub use value_objects::{Color, ElementType, MapStyle};
