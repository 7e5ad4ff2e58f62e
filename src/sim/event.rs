/// Events published by the world.
/// The presentation layer subscribes to these for rendering/animation/sound;
/// the simulation never reads them back.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::coord::Coord;
use crate::domain::entity::EntityId;
use crate::domain::object::ObjectId;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum GameEventKind {
    PlayerMoved,
    FruitCollected,
    BlockCreated,
    BlockDestroyed,
    PlayerHit,
    PlayerDied,
    LevelLoaded,
    LevelCompleted,
    EnemySpawned,
    SaveGame,
    LoadGame,
    MapUpdated,
    CellUpdated,
    Collision,
    IceCreated,
    IceDestroyed,
}

/// Who published an event.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EventSource {
    World,
    Entity(EntityId),
    Cell(Coord),
    Object(ObjectId),
}

impl From<EntityId> for EventSource {
    fn from(id: EntityId) -> Self {
        EventSource::Entity(id)
    }
}

/// Immutable once built: the builder methods consume `self`, and
/// `dispatch` takes the finished event by value.
#[derive(Clone, Debug, Serialize)]
pub struct GameEvent {
    kind: GameEventKind,
    source: Option<EventSource>,
    payload: Map<String, Value>,
    timestamp_ms: u64,
}

impl GameEvent {
    pub fn new(kind: GameEventKind) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        GameEvent { kind, source: None, payload: Map::new(), timestamp_ms }
    }

    pub fn from_source(mut self, source: impl Into<EventSource>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Shorthand for the common `x` / `y` payload pair.
    pub fn at(self, pos: Coord) -> Self {
        self.with("x", pos.x).with("y", pos.y)
    }

    pub fn kind(&self) -> GameEventKind {
        self.kind
    }

    pub fn source(&self) -> Option<EventSource> {
        self.source
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// The `x` / `y` payload pair, if present.
    pub fn position(&self) -> Option<Coord> {
        let x = self.get_i64("x")?;
        let y = self.get_i64("y")?;
        Some(Coord::new(x as i32, y as i32))
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}
