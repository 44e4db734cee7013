//! Quest Registry
//!
//! The catalog of quest definitions. Loaded once at startup from TOML rows
//! and immutable afterwards; share it behind an `Arc`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::definition::{QuestDefinition, QuestId, RawQuest};
use crate::error::QuestError;

/// Registry for all quest definitions
#[derive(Debug, Default)]
pub struct QuestRegistry {
    quests: BTreeMap<QuestId, QuestDefinition>,
}

impl QuestRegistry {
    /// Build a registry from raw rows. Invalid rows are skipped.
    pub fn load(rows: impl IntoIterator<Item = RawQuest>) -> Self {
        let mut registry = Self::default();
        for raw in rows {
            registry.insert_row(&raw);
        }
        info!("Loaded {} quest definitions", registry.quests.len());
        registry
    }

    /// Load every `*.toml` file under `<data_dir>/quests`
    pub fn load_from_directory(data_dir: &Path) -> Result<Self, QuestError> {
        let quest_dir = data_dir.join("quests");
        info!("Loading quests from {:?}", quest_dir);

        if !quest_dir.exists() {
            warn!("Quest directory does not exist: {:?}", quest_dir);
            return Ok(Self::default());
        }

        let mut paths = Vec::new();
        collect_toml_files(&quest_dir, &mut paths)?;
        paths.sort();

        let mut rows = Vec::new();
        for path in paths {
            match read_quest_rows(&path) {
                Ok(file_rows) => rows.extend(file_rows),
                Err(e) => warn!("Skipping quest file {:?}: {}", path, e),
            }
        }

        Ok(Self::load(rows))
    }

    fn insert_row(&mut self, raw: &RawQuest) {
        if self.quests.contains_key(&raw.id) {
            warn!("Duplicate quest ID {} ('{}'), skipping row", raw.id, raw.name);
            return;
        }
        match QuestDefinition::from_raw(raw) {
            Ok(quest) => {
                info!("Loaded quest: {} ({})", quest.name, quest.id);
                self.quests.insert(quest.id, quest);
            }
            Err(e) => warn!("Skipping quest row: {}", e),
        }
    }

    /// Get a quest by ID
    pub fn get(&self, quest_id: QuestId) -> Result<&QuestDefinition, QuestError> {
        self.quests.get(&quest_id).ok_or_else(|| {
            error!("Quest {} is not in the registry", quest_id);
            QuestError::QuestNotFound(quest_id)
        })
    }

    /// Lookup without logging a miss
    pub fn find(&self, quest_id: QuestId) -> Option<&QuestDefinition> {
        self.quests.get(&quest_id)
    }

    pub fn contains(&self, quest_id: QuestId) -> bool {
        self.quests.contains_key(&quest_id)
    }

    /// All quest IDs, ascending
    pub fn ids(&self) -> impl Iterator<Item = QuestId> + '_ {
        self.quests.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestDefinition> {
        self.quests.values()
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), QuestError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| QuestError::Load(format!("failed to read directory {:?}: {}", dir, e)))?;

    for entry in entries {
        let entry = entry.map_err(|e| QuestError::Load(format!("failed to read entry: {}", e)))?;
        let path = entry.path();

        if path.is_dir() {
            collect_toml_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }

    Ok(())
}

/// Parse a quest file row by row; malformed rows are skipped
fn read_quest_rows(path: &Path) -> Result<Vec<RawQuest>, QuestError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| QuestError::Load(format!("failed to read {:?}: {}", path, e)))?;

    let table: toml::Table = toml::from_str(&content)
        .map_err(|e| QuestError::Load(format!("failed to parse {:?}: {}", path, e)))?;

    let Some(toml::Value::Array(entries)) = table.get("quest") else {
        warn!("Quest file {:?} has no [[quest]] rows", path);
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match entry.clone().try_into::<RawQuest>() {
            Ok(row) => rows.push(row),
            Err(e) => warn!("Skipping malformed row {} in {:?}: {}", index, path, e),
        }
    }
    Ok(rows)
}
