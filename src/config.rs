/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory, the CWD or the
/// XDG data home. Falls back to defaults if the file is missing, partial
/// or malformed.

use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sim::dispatcher::DeliveryMode;

// ── Public Config Struct ──

#[derive(Clone, Debug, Default)]
pub struct GameConfig {
    pub rules: RulesConfig,
    pub events: EventsConfig,
    pub storage: StorageConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RulesConfig {
    pub ice_lifetime_ticks: u32,
    pub player_lives: u32,
    pub ice_cooldown_ticks: u32, // 0 = no limit between placements
    pub break_cooldown_ticks: u32,
    pub respawn_on_hit: bool,
}

#[derive(Clone, Debug, Default)]
pub struct EventsConfig {
    pub delivery: DeliveryMode,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub levels_dir: PathBuf,
    pub saves_dir: PathBuf,
}

impl Default for RulesConfig {
    fn default() -> Self {
        TomlRules::default().into()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            levels_dir: PathBuf::from(default_levels_dir()),
            saves_dir: PathBuf::from(default_saves_dir()),
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    events: TomlEvents,
    #[serde(default)]
    storage: TomlStorage,
}

#[derive(Deserialize, Debug)]
struct TomlRules {
    #[serde(default = "default_ice_lifetime")]
    ice_lifetime_ticks: u32,
    #[serde(default = "default_player_lives")]
    player_lives: u32,
    #[serde(default)]
    ice_cooldown_ticks: u32,
    #[serde(default = "default_break_cooldown")]
    break_cooldown_ticks: u32,
    #[serde(default = "default_respawn")]
    respawn_on_hit: bool,
}

#[derive(Deserialize, Debug, Default)]
struct TomlEvents {
    #[serde(default)]
    delivery: DeliveryMode,
}

#[derive(Deserialize, Debug)]
struct TomlStorage {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_saves_dir")]
    saves_dir: String,
}

// ── Defaults ──

fn default_ice_lifetime() -> u32 { 5 }
fn default_player_lives() -> u32 { 3 }
fn default_break_cooldown() -> u32 { 2 }
fn default_respawn() -> bool { true }
fn default_levels_dir() -> String { "levels".into() }
fn default_saves_dir() -> String { "saves".into() }

impl Default for TomlRules {
    fn default() -> Self {
        TomlRules {
            ice_lifetime_ticks: default_ice_lifetime(),
            player_lives: default_player_lives(),
            ice_cooldown_ticks: 0,
            break_cooldown_ticks: default_break_cooldown(),
            respawn_on_hit: default_respawn(),
        }
    }
}

impl Default for TomlStorage {
    fn default() -> Self {
        TomlStorage {
            levels_dir: default_levels_dir(),
            saves_dir: default_saves_dir(),
        }
    }
}

impl From<TomlRules> for RulesConfig {
    fn from(t: TomlRules) -> Self {
        RulesConfig {
            ice_lifetime_ticks: t.ice_lifetime_ticks.max(1),
            player_lives: t.player_lives.max(1),
            ice_cooldown_ticks: t.ice_cooldown_ticks,
            break_cooldown_ticks: t.break_cooldown_ticks,
            respawn_on_hit: t.respawn_on_hit,
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) `~/.local/share/icecream-arena`.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::resolve(toml_cfg, &search_dirs)
    }

    /// Parse a config document. Paths are taken as written.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let toml_cfg: TomlConfig = toml::from_str(text)?;
        Ok(Self::resolve(toml_cfg, &[]))
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        GameConfig {
            rules: toml_cfg.rules.into(),
            events: EventsConfig { delivery: toml_cfg.events.delivery },
            storage: StorageConfig {
                // Levels ship with the game, so look for them; saves are
                // written relative to the CWD unless absolute.
                levels_dir: find_dir(&toml_cfg.storage.levels_dir, search_dirs),
                saves_dir: PathBuf::from(toml_cfg.storage.saves_dir),
            },
        }
    }
}

fn find_dir(configured: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    search_dirs
        .iter()
        .map(|d| d.join(configured))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Candidate directories to search: exe dir + CWD + XDG data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/icecream-arena");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// First readable `config.toml` wins.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!("{}: parse error, using default settings: {e}", path.display());
                    return TomlConfig::default();
                }
            },
            Err(e) => warn!("could not read {}: {e}", path.display()),
        }
    }
    TomlConfig::default()
}
