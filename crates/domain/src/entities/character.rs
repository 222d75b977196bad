//! Character entity - a selectable player start

use serde::{Deserialize, Serialize};

use crate::validation::{require_names, require_non_empty, Validate};
use crate::DomainError;

/// A playable character choice.
///
/// Names need not be unique; nothing refers to a character by name.
/// `starting_items` are item references with the same dangling-reference
/// semantics as an area's lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub backstory: String,
    pub starting_items: Vec<String>,
}

impl Validate for Character {
    fn validate(&self) -> Result<(), DomainError> {
        let check = || -> Result<(), DomainError> {
            require_non_empty(&self.name, "name")?;
            require_names(&self.starting_items, "starting_items")
        };
        check().map_err(|e| e.in_context(format!("character '{}'", self.name)))
    }
}
