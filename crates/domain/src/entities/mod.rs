//! Entity modules - the records that make up a generated game

mod area;
mod boss;
mod character;
mod item;
mod monster;

pub use area::Area;
pub use boss::Boss;
pub use character::Character;
pub use item::{Item, ItemKind};
pub use monster::Monster;
