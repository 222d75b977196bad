//! Read-only fixture repository.
//!
//! Holds the pregenerated game served for the `pregen` theme and the few-shot
//! examples used by the targeted generators. Loaded once at start-up and
//! shared behind an `Arc`.
//!
//! Layout of the fixtures directory:
//! - `pregen.json` - a complete [`GameState`] (required)
//! - `examples/<set>.json` - optional `{"input": {...}, "outputs": [...]}`
//!   overrides, where `<set>` is `areas`, `monsters`, `items` or `boss`.
//!   Sets without a file are derived from the pregen game.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use roguegen_domain::{DomainError, GameState, Validate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Failed to read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse fixture {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid pregen game: {0}")]
    Invalid(#[from] DomainError),
}

/// One in-context example: an input object and the records it should produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub input: Value,
    pub outputs: Vec<Value>,
}

/// Named example sets, one per targeted generator that uses examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExampleSet {
    Areas,
    Monsters,
    Items,
    Boss,
}

impl ExampleSet {
    pub const ALL: [ExampleSet; 4] = [Self::Areas, Self::Monsters, Self::Items, Self::Boss];

    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Areas => "areas",
            Self::Monsters => "monsters",
            Self::Items => "items",
            Self::Boss => "boss",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixtureRepository {
    pregen: GameState,
    examples: HashMap<ExampleSet, FewShotExample>,
}

impl FixtureRepository {
    /// Load `pregen.json` and any example overrides from `dir`.
    pub fn load(dir: &Path) -> Result<Self, FixtureError> {
        let pregen: GameState = read_json(&dir.join("pregen.json"))?;
        let mut repository = Self::from_pregen(pregen)?;

        for set in ExampleSet::ALL {
            let path = dir.join("examples").join(format!("{}.json", set.file_stem()));
            if path.exists() {
                let example: FewShotExample = read_json(&path)?;
                repository.examples.insert(set, example);
            }
        }

        tracing::info!(
            dir = %dir.display(),
            theme = repository.pregen.theme(),
            "Loaded fixtures"
        );
        Ok(repository)
    }

    /// Build from a complete game, deriving every example set from it.
    pub fn from_pregen(pregen: GameState) -> Result<Self, FixtureError> {
        pregen.validate()?;
        let examples = ExampleSet::ALL
            .into_iter()
            .map(|set| (set, derive_example(&pregen, set)))
            .collect();
        Ok(Self { pregen, examples })
    }

    pub fn pregen(&self) -> &GameState {
        &self.pregen
    }

    pub fn example(&self, set: ExampleSet) -> Option<&FewShotExample> {
        self.examples.get(&set)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, FixtureError> {
    let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| FixtureError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn to_values<T: Serialize>(records: &[T]) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| serde_json::to_value(record).ok())
        .collect()
}

fn derive_example(pregen: &GameState, set: ExampleSet) -> FewShotExample {
    let theme = pregen.theme();
    let setting_desc = pregen.setting_desc().unwrap_or_default();

    match set {
        ExampleSet::Areas => FewShotExample {
            input: json!({ "theme": theme, "setting_desc": setting_desc }),
            outputs: to_values(pregen.areas()),
        },
        ExampleSet::Monsters => FewShotExample {
            input: json!({
                "theme": theme,
                "setting_desc": setting_desc,
                "enemy_names": pregen.monsters().iter().map(|m| &m.name).collect::<Vec<_>>(),
            }),
            outputs: to_values(pregen.monsters()),
        },
        ExampleSet::Items => FewShotExample {
            input: json!({
                "theme": theme,
                "setting_desc": setting_desc,
                "item_names": pregen.items().iter().map(|i| &i.name).collect::<Vec<_>>(),
            }),
            outputs: to_values(pregen.items()),
        },
        ExampleSet::Boss => FewShotExample {
            input: json!({ "theme": theme, "setting_desc": setting_desc }),
            outputs: to_values(pregen.boss().as_slice()),
        },
    }
}
