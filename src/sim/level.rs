/// Level descriptors and the repository that hands them out.
///
/// ## Sources:
///   1. `levels_dir/level-<id>.toml` (FileLevelRepository)
///   2. Built-in levels, used when no file exists for that id
///   3. An in-memory map (MemoryLevelRepository, for tests and embedding)
///
/// ## File format:
///   Either explicit placements or an ASCII `map`, or both (explicit
///   placements are added on top of the map):
///   ```toml
///   id = 1
///   name = "Orchard"
///   map = [
///     "#####",
///     "#P.g#",
///     "#####",
///   ]
///
///   [[enemies]]
///   kind = "troll"
///   at = { x = 2, y = 1 }
///   patrol = ["left", "right"]
///   ```
///
/// ## Map legend:
///   '#' = Indestructible wall    'B' = Breakable wall (2 hits)
///   'g' = Grape   'b' = Banana   'p' = Pineapple   'c' = Cherry
///   'P' = Player spawn           'T' / 'O' / 'S' = Troll / Pot / OrangeSquid
///   '.' or ' ' = Empty
///
/// Every descriptor is validated before it leaves a repository, so the
/// world can build it without re-checking placements.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use crate::domain::coord::{Coord, Direction};
use crate::domain::entity::MonsterKind;
use crate::domain::object::FruitKind;
use crate::error::{IceError, Result};
use crate::sim::save::{self, SaveState};

pub const DEFAULT_BREAKABLE_HP: u32 = 2;

/// Largest accepted arena, in cells.
pub const MAX_LEVEL_CELLS: i32 = 1 << 20;

// ══════════════════════════════════════════════════════════════
// Descriptor
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticKind {
    Indestructible,
    Breakable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPlacement {
    pub kind: StaticKind,
    pub at: Coord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_points: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FruitPlacement {
    pub kind: FruitKind,
    pub at: Coord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
}

impl FruitPlacement {
    pub fn points(&self) -> u32 {
        self.points.unwrap_or_else(|| self.kind.default_points())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyPlacement {
    pub kind: MonsterKind,
    pub at: Coord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patrol: Vec<Direction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDescriptor {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub player: Coord,
    #[serde(default)]
    pub statics: Vec<StaticPlacement>,
    #[serde(default)]
    pub fruits: Vec<FruitPlacement>,
    #[serde(default)]
    pub enemies: Vec<EnemyPlacement>,
}

impl LevelDescriptor {
    /// Empty board of the given size with the player at `player`.
    pub fn new(id: u32, width: i32, height: i32, player: Coord) -> Self {
        LevelDescriptor {
            id,
            name: String::new(),
            width,
            height,
            player,
            statics: vec![],
            fruits: vec![],
            enemies: vec![],
        }
    }

    /// Build from ASCII rows (see the legend in the module docs).
    pub fn from_rows(id: u32, name: &str, rows: &[&str]) -> Result<Self> {
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;
        let mut player = None;
        let mut desc = LevelDescriptor::new(id, width, height, Coord::default());
        desc.name = name.to_string();

        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let at = Coord::new(x as i32, y as i32);
                match ch {
                    '.' | ' ' => {}
                    '#' => desc.statics.push(StaticPlacement { kind: StaticKind::Indestructible, at, hit_points: None }),
                    'B' => desc.statics.push(StaticPlacement { kind: StaticKind::Breakable, at, hit_points: None }),
                    'g' => desc.fruits.push(FruitPlacement { kind: FruitKind::Grape, at, points: None }),
                    'b' => desc.fruits.push(FruitPlacement { kind: FruitKind::Banana, at, points: None }),
                    'p' => desc.fruits.push(FruitPlacement { kind: FruitKind::Pineapple, at, points: None }),
                    'c' => desc.fruits.push(FruitPlacement { kind: FruitKind::Cherry, at, points: None }),
                    'T' => desc.enemies.push(EnemyPlacement { kind: MonsterKind::Troll, at, patrol: vec![] }),
                    'O' => desc.enemies.push(EnemyPlacement { kind: MonsterKind::Pot, at, patrol: vec![] }),
                    'S' => desc.enemies.push(EnemyPlacement { kind: MonsterKind::OrangeSquid, at, patrol: vec![] }),
                    'P' => {
                        if player.replace(at).is_some() {
                            return Err(invalid(id, "map has more than one player spawn"));
                        }
                    }
                    other => return Err(invalid(id, format!("unknown map symbol {other:?} at {at}"))),
                }
            }
        }

        desc.player = player.ok_or_else(|| invalid(id, "map has no player spawn"))?;
        Ok(desc)
    }

    pub fn contains(&self, pos: Coord) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Structural checks: positive bounded size, placements in bounds, one static
    /// per cell, actors never on walls or on each other, player not on fruit.
    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(invalid(self.id, format!("non-positive size {}x{}", self.width, self.height)));
        }
        match self.width.checked_mul(self.height) {
            Some(cells) if cells <= MAX_LEVEL_CELLS => {}
            _ => {
                return Err(invalid(
                    self.id,
                    format!("size {}x{} exceeds {MAX_LEVEL_CELLS} cells", self.width, self.height),
                ))
            }
        }

        let mut walls = HashSet::new();
        let mut statics = HashSet::new();
        let static_cells = self
            .statics
            .iter()
            .map(|s| (s.at, true))
            .chain(self.fruits.iter().map(|f| (f.at, false)));
        for (at, is_wall) in static_cells {
            self.check_bounds(at)?;
            if !statics.insert(at) {
                return Err(invalid(self.id, format!("two static objects at {at}")));
            }
            if is_wall {
                walls.insert(at);
            }
        }

        let mut actors = HashSet::new();
        let actor_cells = std::iter::once(self.player).chain(self.enemies.iter().map(|e| e.at));
        for at in actor_cells {
            self.check_bounds(at)?;
            if walls.contains(&at) {
                return Err(invalid(self.id, format!("actor spawns inside a wall at {at}")));
            }
            if !actors.insert(at) {
                return Err(invalid(self.id, format!("two actors spawn at {at}")));
            }
        }
        if statics.contains(&self.player) {
            return Err(invalid(self.id, format!("player spawns on an object at {}", self.player)));
        }
        Ok(())
    }

    fn check_bounds(&self, at: Coord) -> Result<()> {
        if self.contains(at) {
            Ok(())
        } else {
            Err(invalid(self.id, format!("placement {at} outside {}x{}", self.width, self.height)))
        }
    }

    /// Parse and validate a level file's contents.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: TomlLevel = toml::from_str(text)
            .map_err(|e| IceError::persistence_with("parsing level descriptor", e))?;
        let desc = raw.resolve()?;
        desc.validate()?;
        Ok(desc)
    }
}

fn invalid(id: u32, why: impl std::fmt::Display) -> IceError {
    IceError::persistence(format!("level {id}: {why}"))
}

// ── TOML Schema ──

#[derive(Deserialize, Debug)]
struct TomlLevel {
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    map: Vec<String>,
    width: Option<i32>,
    height: Option<i32>,
    player: Option<Coord>,
    #[serde(default)]
    statics: Vec<StaticPlacement>,
    #[serde(default)]
    fruits: Vec<FruitPlacement>,
    #[serde(default)]
    enemies: Vec<EnemyPlacement>,
}

impl TomlLevel {
    fn resolve(self) -> Result<LevelDescriptor> {
        let mut desc = if self.map.is_empty() {
            let missing = |field: &str| invalid(self.id, format!("missing `{field}` and no `map`"));
            LevelDescriptor::new(
                self.id,
                self.width.ok_or_else(|| missing("width"))?,
                self.height.ok_or_else(|| missing("height"))?,
                self.player.ok_or_else(|| missing("player"))?,
            )
        } else {
            let rows: Vec<&str> = self.map.iter().map(String::as_str).collect();
            LevelDescriptor::from_rows(self.id, &self.name, &rows)?
        };
        desc.name = self.name;
        desc.statics.extend(self.statics);
        desc.fruits.extend(self.fruits);
        desc.enemies.extend(self.enemies);
        Ok(desc)
    }
}

// ══════════════════════════════════════════════════════════════
// Built-in levels
// ══════════════════════════════════════════════════════════════

const BUILTIN: &[(u32, &str, &[&str])] = &[
    (1, "Orchard", &[
        "#########",
        "#g..b..g#",
        "#.##.##.#",
        "#P..T..c#",
        "#.##.##.#",
        "#p.....O#",
        "#########",
    ]),
    (2, "Squid Den", &[
        "###########",
        "#g...B...c#",
        "#.#.###.#.#",
        "#P..b.b..S#",
        "#.#.###.#.#",
        "#p...B...g#",
        "###########",
    ]),
];

pub fn builtin_level(id: u32) -> Option<Result<LevelDescriptor>> {
    let (_, name, rows) = BUILTIN.iter().find(|(bid, _, _)| *bid == id)?;
    Some(LevelDescriptor::from_rows(id, name, rows).and_then(|d| d.validate().map(|()| d)))
}

pub fn builtin_level_ids() -> impl Iterator<Item = u32> {
    BUILTIN.iter().map(|(id, _, _)| *id)
}

// ══════════════════════════════════════════════════════════════
// Repository
// ══════════════════════════════════════════════════════════════

/// Supplies validated level descriptors and stores save snapshots.
pub trait LevelRepository: Send {
    fn load_level(&self, id: u32) -> Result<LevelDescriptor>;
    fn save_game(&self, slot: &str, state: &SaveState) -> Result<()>;
    fn load_game(&self, slot: &str) -> Result<SaveState>;
}

#[derive(Default, Debug)]
struct MemoryStore {
    levels: HashMap<u32, LevelDescriptor>,
    saves: HashMap<String, SaveState>,
}

/// Clones share storage, so a test can keep a handle after giving one
/// to the world.
#[derive(Clone, Default, Debug)]
pub struct MemoryLevelRepository {
    store: Arc<Mutex<MemoryStore>>,
}

impl MemoryLevelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(self, level: LevelDescriptor) -> Self {
        self.insert_level(level);
        self
    }

    pub fn insert_level(&self, level: LevelDescriptor) {
        self.lock().levels.insert(level.id, level);
    }

    pub fn saved(&self, slot: &str) -> Option<SaveState> {
        self.lock().saves.get(slot).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LevelRepository for MemoryLevelRepository {
    fn load_level(&self, id: u32) -> Result<LevelDescriptor> {
        let level = self
            .lock()
            .levels
            .get(&id)
            .cloned()
            .ok_or_else(|| IceError::persistence(format!("no level with id {id}")))?;
        level.validate()?;
        Ok(level)
    }

    fn save_game(&self, slot: &str, state: &SaveState) -> Result<()> {
        save::validate_slot(slot)?;
        self.lock().saves.insert(slot.to_string(), *state);
        Ok(())
    }

    fn load_game(&self, slot: &str) -> Result<SaveState> {
        self.saved(slot)
            .ok_or_else(|| IceError::persistence(format!("save slot {slot:?} is empty")))
    }
}

#[derive(Clone, Debug)]
pub struct FileLevelRepository {
    levels_dir: PathBuf,
    saves_dir: PathBuf,
}

impl FileLevelRepository {
    pub fn new(levels_dir: impl Into<PathBuf>, saves_dir: impl Into<PathBuf>) -> Self {
        FileLevelRepository { levels_dir: levels_dir.into(), saves_dir: saves_dir.into() }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(&storage.levels_dir, &storage.saves_dir)
    }

    pub fn level_path(&self, id: u32) -> PathBuf {
        self.levels_dir.join(format!("level-{id}.toml"))
    }
}

impl LevelRepository for FileLevelRepository {
    fn load_level(&self, id: u32) -> Result<LevelDescriptor> {
        let path = self.level_path(id);
        if !path.exists() {
            if let Some(level) = builtin_level(id) {
                info!("{} not found, using built-in level {id}", path.display());
                return level;
            }
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| IceError::persistence_with(format!("reading {}", path.display()), e))?;
        let level = LevelDescriptor::from_toml_str(&text)?;
        if level.id != id {
            return Err(invalid(id, format!("{} declares id {}", path.display(), level.id)));
        }
        Ok(level)
    }

    fn save_game(&self, slot: &str, state: &SaveState) -> Result<()> {
        save::write_save(&self.saves_dir, slot, state)
    }

    fn load_game(&self, slot: &str) -> Result<SaveState> {
        save::read_save(&self.saves_dir, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_expand_to_placements() {
        let d = LevelDescriptor::from_rows(7, "t", &["#####", "#P.g#", "#B.S#", "#####"]).unwrap();
        assert_eq!((d.width, d.height), (5, 4));
        assert_eq!(d.player, Coord::new(1, 1));
        assert_eq!(d.fruits.len(), 1);
        assert_eq!(d.fruits[0].points(), 100);
        assert_eq!(d.enemies[0].kind, MonsterKind::OrangeSquid);
        assert!(d.statics.iter().any(|s| s.kind == StaticKind::Breakable && s.at == Coord::new(1, 2)));
        d.validate().unwrap();
    }

    #[test]
    fn rows_need_exactly_one_player() {
        assert!(LevelDescriptor::from_rows(1, "", &["..."]).is_err());
        assert!(LevelDescriptor::from_rows(1, "", &["P.P"]).is_err());
        assert!(LevelDescriptor::from_rows(1, "", &["P?."]).is_err());
    }

    #[test]
    fn validation_rejects_bad_layouts() {
        let base = LevelDescriptor::new(1, 3, 3, Coord::new(0, 0));
        base.validate().unwrap();

        let mut d = base.clone();
        d.width = 0;
        assert!(d.validate().is_err());

        let mut d = base.clone();
        d.fruits.push(FruitPlacement { kind: FruitKind::Grape, at: Coord::new(3, 0), points: None });
        assert!(d.validate().is_err());

        let mut d = base.clone();
        d.statics.push(StaticPlacement { kind: StaticKind::Indestructible, at: Coord::new(1, 1), hit_points: None });
        d.fruits.push(FruitPlacement { kind: FruitKind::Grape, at: Coord::new(1, 1), points: None });
        assert!(d.validate().is_err());

        let mut d = base.clone();
        d.enemies.push(EnemyPlacement { kind: MonsterKind::Pot, at: Coord::new(0, 0), patrol: vec![] });
        assert!(d.validate().is_err());

        let mut d = base.clone();
        d.fruits.push(FruitPlacement { kind: FruitKind::Grape, at: Coord::new(0, 0), points: None });
        assert!(d.validate().is_err());

        // A monster may start on fruit.
        let mut d = base;
        d.fruits.push(FruitPlacement { kind: FruitKind::Grape, at: Coord::new(2, 2), points: None });
        d.enemies.push(EnemyPlacement { kind: MonsterKind::Troll, at: Coord::new(2, 2), patrol: vec![] });
        d.validate().unwrap();
    }

    #[test]
    fn validation_rejects_oversized_arena() {
        let d = LevelDescriptor::new(1, 70_000, 70_000, Coord::new(0, 0));
        assert!(matches!(d.validate(), Err(IceError::Persistence { .. })));

        let d = LevelDescriptor::new(1, MAX_LEVEL_CELLS + 1, 1, Coord::new(0, 0));
        assert!(d.validate().is_err());

        LevelDescriptor::new(1, MAX_LEVEL_CELLS, 1, Coord::new(0, 0)).validate().unwrap();
    }

    #[test]
    fn toml_with_map_and_explicit_enemy() {
        let text = r######"
            id = 4
            name = "Mixed"
            map = ["#####", "#P.g#", "#####"]

            [[enemies]]
            kind = "troll"
            at = { x = 2, y = 1 }
            patrol = ["left", "right"]

            [[fruits]]
            kind = "cherry"
            at = { x = 3, y = 0 }
        "######;
        // (3, 0) is a wall in the map.
        assert!(LevelDescriptor::from_toml_str(text).is_err());

        let text = text.replace("x = 3, y = 0", "x = 2, y = 1");
        let d = LevelDescriptor::from_toml_str(&text).unwrap();
        assert_eq!(d.name, "Mixed");
        assert_eq!(d.enemies[0].patrol, vec![Direction::Left, Direction::Right]);
        assert_eq!(d.fruits.len(), 2);
    }

    #[test]
    fn toml_explicit_only() {
        let text = r#"
            id = 1
            width = 3
            height = 4
            player = { x = 1, y = 1 }

            [[fruits]]
            kind = "grape"
            at = { x = 1, y = 2 }
            points = 100
        "#;
        let d = LevelDescriptor::from_toml_str(text).unwrap();
        assert_eq!((d.width, d.height), (3, 4));
        assert_eq!(d.fruits[0].points(), 100);
        assert!(LevelDescriptor::from_toml_str("id = 1\nwidth = 3\n").is_err());
    }

    #[test]
    fn builtin_levels_are_valid() {
        for id in builtin_level_ids() {
            let level = builtin_level(id).unwrap().unwrap();
            assert_eq!(level.id, id);
            assert!(!level.fruits.is_empty());
        }
        assert!(builtin_level(99).is_none());
    }

    #[test]
    fn file_repository_reads_levels_and_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let levels = dir.path().join("levels");
        fs::create_dir(&levels).unwrap();
        fs::write(levels.join("level-5.toml"), "id = 5\nmap = [\"P.g\"]\n").unwrap();
        fs::write(levels.join("level-6.toml"), "id = 9\nmap = [\"P.g\"]\n").unwrap();
        let repo = FileLevelRepository::new(&levels, dir.path().join("saves"));

        assert_eq!(repo.load_level(5).unwrap().fruits.len(), 1);
        assert!(repo.load_level(6).is_err());
        assert_eq!(repo.load_level(1).unwrap().name, "Orchard");
        assert!(matches!(repo.load_level(42), Err(IceError::Persistence { .. })));
    }

    #[test]
    fn file_repository_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileLevelRepository::new(dir.path(), dir.path().join("saves"));
        let state = SaveState { level_id: 1, score: 250, player_position: Coord::new(2, 3) };
        repo.save_game("a", &state).unwrap();
        assert_eq!(repo.load_game("a").unwrap(), state);
        assert!(repo.load_game("b").is_err());
    }

    #[test]
    fn memory_repository_shares_storage_between_clones() {
        let repo = MemoryLevelRepository::new().with_level(LevelDescriptor::new(3, 2, 2, Coord::new(0, 0)));
        let handle = repo.clone();
        let state = SaveState { level_id: 3, score: 10, player_position: Coord::new(1, 1) };
        repo.save_game("q", &state).unwrap();
        assert_eq!(handle.saved("q"), Some(state));
        assert_eq!(handle.load_level(3).unwrap().id, 3);
        assert!(handle.load_level(4).is_err());
        assert!(handle.save_game("../q", &state).is_err());
    }
}
