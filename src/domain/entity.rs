/// Dynamic entities: the Player and the Monsters.
///
/// Entities hold their own coordinate but never write to the grid. The
/// world moves them and keeps `position` equal to the cell whose dynamic
/// slot names them, which is why the coordinate setters are crate-private.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ai::{MovementStrategy, PathChase, Patrol};
use super::coord::{Coord, Direction};
use super::pattern::MovementPattern;

/// Reference stored in a cell's dynamic slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum EntityId {
    Player,
    Monster(usize),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Player => write!(f, "player"),
            EntityId::Monster(i) => write!(f, "monster#{i}"),
        }
    }
}

// ── Player ──

#[derive(Clone, Debug)]
pub struct Player {
    pub(crate) position: Coord,
    pub(crate) spawn: Coord,
    pub(crate) facing: Direction,
    lives: u32,
    score: u32,
    ice_cooldown: u32,
}

impl Player {
    pub fn new(spawn: Coord, lives: u32) -> Self {
        Player {
            position: spawn,
            spawn,
            facing: Direction::default(),
            lives,
            score: 0,
            ice_cooldown: 0,
        }
    }

    pub fn position(&self) -> Coord {
        self.position
    }

    pub fn spawn(&self) -> Coord {
        self.spawn
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }

    pub fn add_score(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }

    pub(crate) fn set_score(&mut self, score: u32) {
        self.score = score;
    }

    /// Returns lives left after the hit.
    pub fn lose_life(&mut self) -> u32 {
        self.lives = self.lives.saturating_sub(1);
        self.lives
    }

    pub fn can_create_ice(&self) -> bool {
        self.ice_cooldown == 0
    }

    pub fn ice_cooldown(&self) -> u32 {
        self.ice_cooldown
    }

    pub(crate) fn start_ice_cooldown(&mut self, ticks: u32) {
        self.ice_cooldown = ticks;
    }

    /// Per-tick bookkeeping.
    pub fn update(&mut self) {
        self.ice_cooldown = self.ice_cooldown.saturating_sub(1);
    }
}

// ── Monster ──

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterKind {
    /// Walks a scripted loop.
    Troll,
    /// Chases the player along the shortest path.
    Pot,
    /// Chases and smashes ice in its way.
    OrangeSquid,
}

impl MonsterKind {
    pub fn name(self) -> &'static str {
        match self {
            MonsterKind::Troll => "troll",
            MonsterKind::Pot => "pot",
            MonsterKind::OrangeSquid => "orange_squid",
        }
    }

    /// Strategy a freshly spawned monster of this kind is bound to.
    pub fn default_strategy(
        self,
        patrol: Vec<Direction>,
        break_cooldown: u32,
    ) -> Box<dyn MovementStrategy> {
        match self {
            MonsterKind::Troll => Box::new(Patrol::new(MovementPattern::new(patrol))),
            MonsterKind::Pot => Box::new(PathChase::new()),
            MonsterKind::OrangeSquid => Box::new(PathChase::breaking(break_cooldown)),
        }
    }
}

pub struct Monster {
    index: usize,
    kind: MonsterKind,
    pub(crate) position: Coord,
    pub(crate) facing: Direction,
    pub(crate) strategy: Box<dyn MovementStrategy>,
    target: Option<EntityId>,
}

impl fmt::Debug for Monster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monster")
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("facing", &self.facing)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl Monster {
    pub fn new(index: usize, kind: MonsterKind, spawn: Coord, strategy: Box<dyn MovementStrategy>) -> Self {
        Monster {
            index,
            kind,
            position: spawn,
            facing: Direction::default(),
            strategy,
            target: Some(EntityId::Player),
        }
    }

    pub fn id(&self) -> EntityId {
        EntityId::Monster(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> MonsterKind {
        self.kind
    }

    pub fn position(&self) -> Coord {
        self.position
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<EntityId>) {
        self.target = target;
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Swap the bound strategy, returning the previous one.
    pub fn set_strategy(&mut self, strategy: Box<dyn MovementStrategy>) -> Box<dyn MovementStrategy> {
        std::mem::replace(&mut self.strategy, strategy)
    }
}
