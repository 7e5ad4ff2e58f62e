/// Save slots: `{level_id, score, player_position}` keyed by a slot name.
///
/// ## File format:
///   One TOML document per slot, `save-<slot>.toml` in the saves dir:
///   ```toml
///   level_id = 2
///   score = 450
///
///   [player_position]
///   x = 3
///   y = 1
///   ```
///
/// Loading re-reads the level from its descriptor, so nothing about ice,
/// fruit or monsters is stored.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::domain::coord::Coord;
use crate::error::{IceError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    pub level_id: u32,
    pub score: u32,
    pub player_position: Coord,
}

/// Slot names become file names, so they must be a single plain component.
pub fn validate_slot(slot: &str) -> Result<()> {
    let ok = !slot.is_empty()
        && slot != "."
        && !slot.contains("..")
        && !slot.contains(['/', '\\'])
        && !slot.chars().any(char::is_control);
    if ok {
        Ok(())
    } else {
        Err(IceError::persistence(format!("invalid save slot name {slot:?}")))
    }
}

pub fn slot_path(dir: &Path, slot: &str) -> Result<PathBuf> {
    validate_slot(slot)?;
    Ok(dir.join(format!("save-{slot}.toml")))
}

pub fn write_save(dir: &Path, slot: &str, state: &SaveState) -> Result<()> {
    let path = slot_path(dir, slot)?;
    let text = toml::to_string(state)
        .map_err(|e| IceError::persistence_with("encoding save state", e))?;
    fs::create_dir_all(dir)
        .map_err(|e| IceError::persistence_with(format!("creating {}", dir.display()), e))?;
    fs::write(&path, text)
        .map_err(|e| IceError::persistence_with(format!("writing {}", path.display()), e))?;
    info!("saved slot {slot:?} to {}", path.display());
    Ok(())
}

pub fn read_save(dir: &Path, slot: &str) -> Result<SaveState> {
    let path = slot_path(dir, slot)?;
    let text = fs::read_to_string(&path)
        .map_err(|e| IceError::persistence_with(format!("reading {}", path.display()), e))?;
    toml::from_str(&text)
        .map_err(|e| IceError::persistence_with(format!("parsing {}", path.display()), e))
}
