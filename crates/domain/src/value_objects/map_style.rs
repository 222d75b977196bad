use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Map generator the client uses to lay out an area.
///
/// Unlike colors and types this vocabulary is strict: an area with an
/// unknown style is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStyle {
    SimpleRoomsAndCorridors,
    Caves,
    Hive,
    DenseRooms,
}

impl MapStyle {
    pub const ALL: [MapStyle; 4] = [
        MapStyle::SimpleRoomsAndCorridors,
        MapStyle::Caves,
        MapStyle::Hive,
        MapStyle::DenseRooms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapStyle::SimpleRoomsAndCorridors => "simple_rooms_and_corridors",
            MapStyle::Caves => "caves",
            MapStyle::Hive => "hive",
            MapStyle::DenseRooms => "dense_rooms",
        }
    }
}

impl fmt::Display for MapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapStyle {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MapStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| DomainError::parse(format!("unknown map style: {s}")))
    }
}
