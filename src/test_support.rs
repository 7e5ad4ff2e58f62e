//! Fixtures shared by the unit tests.

use std::sync::{Arc, Mutex};

use crate::config::RulesConfig;
use crate::domain::coord::Direction;
use crate::domain::entity::MonsterKind;
use crate::domain::object::FruitKind;
use crate::sim::dispatcher::EventDispatcher;
use crate::sim::event::{GameEvent, GameEventKind};
use crate::sim::level::{
    EnemyPlacement, FruitPlacement, LevelDescriptor, MemoryLevelRepository, StaticKind,
    StaticPlacement,
};
use crate::sim::world::World;

/// Empty level 1 of the given size.
pub fn level(width: i32, height: i32, player: (i32, i32)) -> LevelDescriptor {
    LevelDescriptor::new(1, width, height, player.into())
}

pub fn wall(at: (i32, i32)) -> StaticPlacement {
    StaticPlacement { kind: StaticKind::Indestructible, at: at.into(), hit_points: None }
}

pub fn breakable(at: (i32, i32), hit_points: u32) -> StaticPlacement {
    StaticPlacement { kind: StaticKind::Breakable, at: at.into(), hit_points: Some(hit_points) }
}

pub fn fruit(at: (i32, i32), points: u32) -> FruitPlacement {
    FruitPlacement { kind: FruitKind::Grape, at: at.into(), points: Some(points) }
}

pub fn troll(at: (i32, i32), patrol: Vec<Direction>) -> EnemyPlacement {
    EnemyPlacement { kind: MonsterKind::Troll, at: at.into(), patrol }
}

pub fn chaser(at: (i32, i32)) -> EnemyPlacement {
    EnemyPlacement { kind: MonsterKind::Pot, at: at.into(), patrol: vec![] }
}

pub fn squid(at: (i32, i32)) -> EnemyPlacement {
    EnemyPlacement { kind: MonsterKind::OrangeSquid, at: at.into(), patrol: vec![] }
}

/// Unloaded world with default rules, sync delivery and `desc` in an
/// in-memory repository, plus a recorder of everything it publishes.
pub fn world_with(desc: LevelDescriptor) -> (World, EventLog) {
    let dispatcher = EventDispatcher::default();
    let log = EventLog::attach(&dispatcher);
    let repo = MemoryLevelRepository::new().with_level(desc);
    (World::new(RulesConfig::default(), dispatcher, repo), log)
}

#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn attach(dispatcher: &EventDispatcher) -> Self {
        let log = EventLog::default();
        let sink = Arc::clone(&log.events);
        dispatcher.subscribe_all(move |e| {
            sink.lock().unwrap().push(e.clone());
            Ok(())
        });
        log
    }

    pub fn kinds(&self) -> Vec<GameEventKind> {
        self.events.lock().unwrap().iter().map(GameEvent::kind).collect()
    }

    pub fn count(&self, kind: GameEventKind) -> usize {
        self.events.lock().unwrap().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn first(&self, kind: GameEventKind) -> Option<GameEvent> {
        self.events.lock().unwrap().iter().find(|e| e.kind() == kind).cloned()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

