//! Display colors available to monsters and bosses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::lenient::deserialize_or_default;
use crate::DomainError;

/// Closed display palette understood by the game client.
///
/// Deserialization is lenient: anything outside the palette becomes
/// [`Color::Lightgray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Lightgray,
    Yellow,
    Gold,
    Orange,
    Pink,
    Red,
    Maroon,
    Green,
    Lime,
    Skyblue,
    Blue,
    Purple,
    Violet,
    Beige,
    Brown,
    White,
    Magenta,
    Silver,
    Gray,
    Grey,
    Black,
}

impl Color {
    pub const ALL: [Color; 21] = [
        Color::Lightgray,
        Color::Yellow,
        Color::Gold,
        Color::Orange,
        Color::Pink,
        Color::Red,
        Color::Maroon,
        Color::Green,
        Color::Lime,
        Color::Skyblue,
        Color::Blue,
        Color::Purple,
        Color::Violet,
        Color::Beige,
        Color::Brown,
        Color::White,
        Color::Magenta,
        Color::Silver,
        Color::Gray,
        Color::Grey,
        Color::Black,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Lightgray => "lightgray",
            Color::Yellow => "yellow",
            Color::Gold => "gold",
            Color::Orange => "orange",
            Color::Pink => "pink",
            Color::Red => "red",
            Color::Maroon => "maroon",
            Color::Green => "green",
            Color::Lime => "lime",
            Color::Skyblue => "skyblue",
            Color::Blue => "blue",
            Color::Purple => "purple",
            Color::Violet => "violet",
            Color::Beige => "beige",
            Color::Brown => "brown",
            Color::White => "white",
            Color::Magenta => "magenta",
            Color::Silver => "silver",
            Color::Gray => "gray",
            Color::Grey => "grey",
            Color::Black => "black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::ALL
            .into_iter()
            .find(|color| color.as_str() == s)
            .ok_or_else(|| DomainError::parse(format!("unknown color: {s}")))
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_or_default(deserializer)
    }
}
