/// World: the authoritative game state and its movement/collision resolver.
///
/// ## Ownership
///
/// The world owns the grid, the player and the monsters. Entities never
/// touch cells; every position change goes through `move_entity()`, which
/// keeps two invariants true between calls:
///   - each cell has at most one static object and one dynamic occupant
///   - an entity's stored position is the cell whose dynamic slot names it
///
/// ## Loading
///
/// `load_level` and `load_game` build the new board into a staging area
/// first and only swap it in once every placement succeeded, so a failed
/// load leaves the current game untouched. Building is silent; the event
/// notifier is attached afterwards and `LevelLoaded` announces the result.
///
/// ## Phases
///
///   Initializing ─load─▶ Running ◀─pause/resume─▶ Paused
///                          │
///                          ├─ last fruit collected ─▶ Completed
///                          └─ lives exhausted ──────▶ Defeat
///
/// The per-tick pipeline lives in `step.rs`; the command surface in
/// `command.rs`.

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::config::{GameConfig, RulesConfig};
use crate::domain::coord::{Coord, Direction};
use crate::domain::entity::{EntityId, Monster, Player};
use crate::domain::grid::Grid;
use crate::domain::object::{
    BreakableWall, Fruit, IceBlock, ObjectId, ObjectKind, Solid, StaticObject,
};
use crate::error::{IceError, Result};

use super::dispatcher::EventDispatcher;
use super::event::{EventSource, GameEvent, GameEventKind};
use super::level::{
    FileLevelRepository, LevelDescriptor, LevelRepository, StaticKind, DEFAULT_BREAKABLE_HP,
};
use super::save::SaveState;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum GamePhase {
    Initializing,
    Running,
    Paused,
    Completed,
    Defeat,
}

/// Result of a move that did not fail outright.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveOutcome {
    Moved,
    /// Player and monster met; the player was hit.
    Collided,
    /// Another monster holds the cell.
    Blocked,
}

/// A fully built level waiting to replace the live one.
struct Stage {
    grid: Grid,
    player: Player,
    monsters: Vec<Monster>,
    next_object_id: u32,
}

pub struct World {
    pub(crate) rules: RulesConfig,
    repository: Box<dyn LevelRepository>,
    dispatcher: EventDispatcher,
    pub(crate) grid: Grid,
    pub(crate) player: Option<Player>,
    pub(crate) monsters: Vec<Monster>,
    pub(crate) phase: GamePhase,
    level_id: Option<u32>,
    pub(crate) tick: u64,
    next_object_id: u32,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("level_id", &self.level_id)
            .field("phase", &self.phase)
            .field("tick", &self.tick)
            .field("player", &self.player)
            .field("monsters", &self.monsters)
            .finish_non_exhaustive()
    }
}

impl World {
    pub fn new(
        rules: RulesConfig,
        dispatcher: EventDispatcher,
        repository: impl LevelRepository + 'static,
    ) -> Self {
        World {
            rules,
            repository: Box::new(repository),
            dispatcher,
            grid: Grid::default(),
            player: None,
            monsters: Vec::new(),
            phase: GamePhase::Initializing,
            level_id: None,
            tick: 0,
            next_object_id: 1,
        }
    }

    /// File-backed world with the configured delivery mode.
    pub fn from_config(config: &GameConfig) -> Self {
        World::new(
            config.rules.clone(),
            EventDispatcher::new(config.events.delivery),
            FileLevelRepository::from_config(&config.storage),
        )
    }

    // ── Accessors ──

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn monsters(&self) -> &[Monster] {
        &self.monsters
    }

    /// For runtime strategy swaps and retargeting.
    pub fn monster_mut(&mut self, index: usize) -> Option<&mut Monster> {
        self.monsters.get_mut(index)
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn level_id(&self) -> Option<u32> {
        self.level_id
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn position_of(&self, entity: EntityId) -> Option<Coord> {
        match entity {
            EntityId::Player => self.player.as_ref().map(Player::position),
            EntityId::Monster(i) => self.monsters.get(i).map(Monster::position),
        }
    }

    pub(crate) fn publish(&self, event: GameEvent) {
        self.dispatcher.dispatch(event);
    }

    fn loaded_player(&self) -> Result<&Player> {
        self.player
            .as_ref()
            .ok_or_else(|| IceError::invalid_operation("no level loaded"))
    }

    fn loaded_player_mut(&mut self) -> Result<&mut Player> {
        self.player
            .as_mut()
            .ok_or_else(|| IceError::invalid_operation("no level loaded"))
    }

    pub(crate) fn require_running(&self) -> Result<()> {
        match self.phase {
            GamePhase::Running => Ok(()),
            other => Err(IceError::invalid_operation(format!("game is {other:?}, not running"))),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Level loading
    // ══════════════════════════════════════════════════════════════

    pub fn load_level(&mut self, id: u32) -> Result<()> {
        let desc = self.repository.load_level(id)?;
        let stage = self.build_level(&desc)?;
        self.install(stage, &desc);
        Ok(())
    }

    fn build_level(&self, desc: &LevelDescriptor) -> Result<Stage> {
        desc.validate()?;
        let mut grid = Grid::new(desc.width, desc.height);
        let mut next_id = 1;
        let mut alloc = || {
            let id = ObjectId(next_id);
            next_id += 1;
            id
        };

        for s in &desc.statics {
            let kind = match s.kind {
                StaticKind::Indestructible => ObjectKind::IndestructibleWall,
                StaticKind::Breakable => ObjectKind::BreakableWall(BreakableWall::new(
                    s.hit_points.unwrap_or(DEFAULT_BREAKABLE_HP),
                )),
            };
            grid.set_static(s.at, Some(StaticObject::new(alloc(), kind)))?;
        }
        for f in &desc.fruits {
            let fruit = ObjectKind::Fruit(Fruit::new(f.kind, f.points()));
            grid.set_static(f.at, Some(StaticObject::new(alloc(), fruit)))?;
        }

        let player = Player::new(desc.player, self.rules.player_lives);
        grid.set_dynamic(desc.player, Some(EntityId::Player))?;

        let mut monsters = Vec::with_capacity(desc.enemies.len());
        for (i, e) in desc.enemies.iter().enumerate() {
            let strategy = e.kind.default_strategy(e.patrol.clone(), self.rules.break_cooldown_ticks);
            grid.set_dynamic(e.at, Some(EntityId::Monster(i)))?;
            monsters.push(Monster::new(i, e.kind, e.at, strategy));
        }

        Ok(Stage { grid, player, monsters, next_object_id: alloc().0 })
    }

    fn install(&mut self, stage: Stage, desc: &LevelDescriptor) {
        self.grid = stage.grid;
        self.grid.attach_notifier(self.dispatcher.clone());
        self.player = Some(stage.player);
        self.monsters = stage.monsters;
        self.next_object_id = stage.next_object_id;
        self.level_id = Some(desc.id);
        self.phase = GamePhase::Running;
        self.tick = 0;

        for m in &self.monsters {
            self.publish(
                GameEvent::new(GameEventKind::EnemySpawned)
                    .from_source(m.id())
                    .at(m.position())
                    .with("index", m.index())
                    .with("kind", m.kind().name()),
            );
        }
        self.publish(
            GameEvent::new(GameEventKind::LevelLoaded)
                .with("level_id", desc.id)
                .with("name", desc.name.as_str())
                .with("width", desc.width)
                .with("height", desc.height)
                .with("fruits", desc.fruits.len()),
        );
        info!(
            "level {} {:?} loaded: {}x{}, {} fruit, {} monsters",
            desc.id,
            desc.name,
            desc.width,
            desc.height,
            desc.fruits.len(),
            self.monsters.len()
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Movement / collision resolver
    // ══════════════════════════════════════════════════════════════

    /// The only way an entity changes cell.
    ///
    /// Fails with `InvalidCoordinates` off the board and `CellBlocked` on a
    /// solid static object; nothing changes in either case. Running into
    /// another entity is not an error: the move is abandoned and the
    /// collision resolved.
    pub fn move_entity(&mut self, entity: EntityId, destination: Coord) -> Result<MoveOutcome> {
        let from = self
            .position_of(entity)
            .ok_or_else(|| IceError::invalid_operation(format!("{entity} is not on the board")))?;
        let cell = self.grid.cell(destination)?;
        if !cell.is_traversable() {
            return Err(IceError::CellBlocked(destination));
        }
        match cell.dynamic() {
            Some(other) if other != entity => {
                return Ok(self.resolve_collision(entity, other, destination));
            }
            Some(_) => return Ok(MoveOutcome::Moved),
            None => {}
        }

        self.grid.set_dynamic(from, None)?;
        self.grid.set_dynamic(destination, Some(entity))?;
        match entity {
            EntityId::Player => {
                if let Some(p) = self.player.as_mut() {
                    p.position = destination;
                }
                self.publish(
                    GameEvent::new(GameEventKind::PlayerMoved)
                        .from_source(EntityId::Player)
                        .with("from_x", from.x)
                        .with("from_y", from.y)
                        .at(destination),
                );
                self.resolve_static_interaction(destination)?;
            }
            EntityId::Monster(i) => {
                if let Some(m) = self.monsters.get_mut(i) {
                    m.position = destination;
                }
            }
        }
        Ok(MoveOutcome::Moved)
    }

    fn resolve_collision(&mut self, mover: EntityId, other: EntityId, at: Coord) -> MoveOutcome {
        let involves_player = mover == EntityId::Player || other == EntityId::Player;
        if !involves_player {
            trace!("{mover} blocked by {other} at {at}");
            return MoveOutcome::Blocked;
        }
        self.publish(
            GameEvent::new(GameEventKind::Collision)
                .from_source(mover)
                .at(at)
                .with("mover", mover.to_string())
                .with("other", other.to_string()),
        );
        self.hit_player();
        MoveOutcome::Collided
    }

    /// Take one life. With lives left, the player may be sent back to spawn.
    pub(crate) fn hit_player(&mut self) {
        let Some(player) = self.player.as_mut() else { return };
        if !player.is_alive() {
            return;
        }
        let lives = player.lose_life();
        let (pos, spawn) = (player.position(), player.spawn());
        debug!("player hit at {pos}, {lives} lives left");
        self.publish(
            GameEvent::new(GameEventKind::PlayerHit)
                .from_source(EntityId::Player)
                .at(pos)
                .with("lives", lives),
        );

        if lives == 0 {
            self.publish(GameEvent::new(GameEventKind::PlayerDied).from_source(EntityId::Player).at(pos));
            return;
        }
        if self.rules.respawn_on_hit && pos != spawn {
            self.respawn_player(pos, spawn);
        }
    }

    fn respawn_player(&mut self, from: Coord, spawn: Coord) {
        let free = self.grid.cell(spawn).is_ok_and(|c| c.is_free_for_dynamic());
        if !free {
            trace!("spawn {spawn} is taken, player stays at {from}");
            return;
        }
        if self.grid.set_dynamic(from, None).is_err()
            || self.grid.set_dynamic(spawn, Some(EntityId::Player)).is_err()
        {
            return;
        }
        if let Some(p) = self.player.as_mut() {
            p.position = spawn;
        }
        self.publish(
            GameEvent::new(GameEventKind::PlayerMoved)
                .from_source(EntityId::Player)
                .with("from_x", from.x)
                .with("from_y", from.y)
                .at(spawn)
                .with("reason", "respawn"),
        );
    }

    /// The player just entered `pos`: collect any fruit lying there.
    fn resolve_static_interaction(&mut self, pos: Coord) -> Result<()> {
        let Some(obj) = self.grid.static_at_mut(pos) else { return Ok(()) };
        let kind = match obj.kind() {
            ObjectKind::Fruit(f) => f.kind(),
            _ => return Ok(()),
        };
        let Some(points) = obj.as_collectible_mut().and_then(|c| c.collect()) else {
            return Ok(());
        };
        let object_id = obj.id();

        let score = match self.player.as_mut() {
            Some(p) => {
                p.add_score(points);
                p.score()
            }
            None => 0,
        };
        self.grid.set_static(pos, None)?;
        self.publish(
            GameEvent::new(GameEventKind::FruitCollected)
                .from_source(EventSource::Object(object_id))
                .at(pos)
                .with("kind", kind.name())
                .with("points", points)
                .with("score", score),
        );
        self.count_remaining_fruits();
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════
    // Ice and destructibles
    // ══════════════════════════════════════════════════════════════

    /// Place a fresh ice block. The cell must hold no static object and no
    /// entity.
    pub fn create_ice_at(&mut self, pos: Coord, owner: Option<EntityId>) -> Result<()> {
        self.loaded_player()?;
        let cell = self.grid.cell(pos)?;
        if cell.static_obj().is_some() {
            return Err(IceError::CellBlocked(pos));
        }
        if cell.dynamic().is_some() {
            return Err(IceError::CellOccupied(pos));
        }

        let id = ObjectId(self.next_object_id);
        let lifetime = self.rules.ice_lifetime_ticks;
        self.grid
            .set_static(pos, Some(StaticObject::new(id, ObjectKind::IceBlock(IceBlock::new(lifetime)))))?;
        self.next_object_id += 1;

        let source = owner.map_or(EventSource::World, EventSource::Entity);
        self.publish(
            GameEvent::new(GameEventKind::IceCreated)
                .from_source(source)
                .at(pos)
                .with("lifetime", lifetime),
        );
        Ok(())
    }

    /// One unit of damage to whatever destructible sits at `pos`. Returns
    /// true if that destroyed it. Empty cells and indestructible objects
    /// are left alone.
    pub fn destroy_ice_at(&mut self, pos: Coord) -> Result<bool> {
        self.grid.cell(pos)?;
        let Some(obj) = self.grid.static_at_mut(pos) else { return Ok(false) };
        let (id, label, is_ice) = (obj.id(), obj.label(), obj.is_ice());
        let Some(target) = obj.as_destructible_mut() else { return Ok(false) };
        if !target.take_hit() {
            debug!("{label} at {pos} damaged, {} left", target.remaining());
            return Ok(false);
        }

        self.grid.set_static(pos, None)?;
        debug!("{label} at {pos} destroyed");
        if is_ice {
            self.publish(
                GameEvent::new(GameEventKind::IceDestroyed)
                    .from_source(EventSource::Object(id))
                    .at(pos)
                    .with("reason", "broken"),
            );
        }
        self.publish(
            GameEvent::new(GameEventKind::BlockDestroyed)
                .from_source(EventSource::Object(id))
                .at(pos)
                .with("kind", label),
        );
        Ok(true)
    }

    // ══════════════════════════════════════════════════════════════
    // Fruit and phase transitions
    // ══════════════════════════════════════════════════════════════

    pub fn uncollected_fruits(&self) -> usize {
        self.grid
            .cells()
            .filter(|c| c.static_obj().is_some_and(StaticObject::is_uncollected_fruit))
            .count()
    }

    /// Count uncollected fruit. Reaching zero while Running completes the
    /// level (once: the phase changes with it).
    pub fn count_remaining_fruits(&mut self) -> usize {
        let remaining = self.uncollected_fruits();
        if remaining == 0 && self.phase == GamePhase::Running {
            self.phase = GamePhase::Completed;
            let score = self.player.as_ref().map_or(0, Player::score);
            info!("level {:?} completed with score {score}", self.level_id);
            self.publish(
                GameEvent::new(GameEventKind::LevelCompleted)
                    .with("level_id", self.level_id.unwrap_or_default())
                    .with("score", score),
            );
        }
        remaining
    }

    /// Running with no lives left becomes Defeat. Returns true when the
    /// game is lost.
    pub fn check_defeat(&mut self) -> bool {
        let dead = self.player.as_ref().is_some_and(|p| !p.is_alive());
        if dead && self.phase == GamePhase::Running {
            self.phase = GamePhase::Defeat;
            info!("level {:?} lost at tick {}", self.level_id, self.tick);
        }
        self.phase == GamePhase::Defeat
    }

    pub fn pause(&mut self) -> Result<()> {
        self.require_running()?;
        self.phase = GamePhase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.phase != GamePhase::Paused {
            return Err(IceError::invalid_operation(format!("game is {:?}, not paused", self.phase)));
        }
        self.phase = GamePhase::Running;
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════
    // Player actions
    // ══════════════════════════════════════════════════════════════

    /// Step one cell. Facing follows the direction unless the move fails.
    pub fn player_move(&mut self, dir: Direction) -> Result<MoveOutcome> {
        self.require_running()?;
        let dest = self.loaded_player()?.position().step(dir);
        let outcome = self.move_entity(EntityId::Player, dest)?;
        self.loaded_player_mut()?.facing = dir;
        Ok(outcome)
    }

    /// Freeze the cell the player faces. Returns where the ice went.
    pub fn player_create_ice(&mut self) -> Result<Coord> {
        self.require_running()?;
        let player = self.loaded_player()?;
        if !player.can_create_ice() {
            return Err(IceError::invalid_operation(format!(
                "ice is recharging ({} ticks)",
                player.ice_cooldown()
            )));
        }
        let target = player.position().step(player.facing());
        self.create_ice_at(target, Some(EntityId::Player))?;

        let cooldown = self.rules.ice_cooldown_ticks;
        self.loaded_player_mut()?.start_ice_cooldown(cooldown);
        self.publish(
            GameEvent::new(GameEventKind::BlockCreated)
                .from_source(EntityId::Player)
                .at(target)
                .with("kind", "ice-block"),
        );
        Ok(target)
    }

    /// Hit whatever lies one cell away in `dir`.
    pub fn player_destroy_ice(&mut self, dir: Direction) -> Result<bool> {
        self.require_running()?;
        let target = self.loaded_player()?.position().step(dir);
        self.destroy_ice_at(target)
    }

    // ══════════════════════════════════════════════════════════════
    // Save / load
    // ══════════════════════════════════════════════════════════════

    pub fn save_game(&mut self, slot: &str) -> Result<SaveState> {
        let level_id = self
            .level_id
            .ok_or_else(|| IceError::invalid_operation("no level loaded"))?;
        let player = self.loaded_player()?;
        let state = SaveState { level_id, score: player.score(), player_position: player.position() };
        self.repository.save_game(slot, &state)?;

        info!("game saved to slot {slot:?}: level {level_id}, score {}", state.score);
        self.publish(
            GameEvent::new(GameEventKind::SaveGame)
                .with("slot", slot)
                .with("level_id", level_id)
                .with("score", state.score),
        );
        Ok(state)
    }

    /// Reload the saved level from its descriptor, then put the player
    /// where the save says and restore the score. All or nothing.
    pub fn load_game(&mut self, slot: &str) -> Result<()> {
        let state = self.repository.load_game(slot)?;
        let desc = self.repository.load_level(state.level_id)?;
        let mut stage = self.build_level(&desc)?;

        let target = state.player_position;
        if target != stage.player.position() {
            let cell = stage.grid.cell(target)?;
            if !cell.is_traversable() {
                return Err(IceError::CellBlocked(target));
            }
            if cell.dynamic().is_some() {
                return Err(IceError::CellOccupied(target));
            }
            stage.grid.set_dynamic(stage.player.position(), None)?;
            stage.grid.set_dynamic(target, Some(EntityId::Player))?;
            stage.player.position = target;
        }
        stage.player.set_score(state.score);

        self.install(stage, &desc);
        info!("game loaded from slot {slot:?}: level {}, score {}", state.level_id, state.score);
        self.publish(
            GameEvent::new(GameEventKind::LoadGame)
                .with("slot", slot)
                .with("level_id", state.level_id)
                .with("score", state.score)
                .at(target),
        );
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════
    // Diagnostics
    // ══════════════════════════════════════════════════════════════

    /// Check the occupancy invariants across the whole board.
    pub fn audit_occupancy(&self) -> Result<()> {
        let broken = |why: String| -> Result<()> {
            Err(IceError::invalid_operation(format!("occupancy audit: {why}")))
        };

        let mut referenced = 0;
        for cell in self.grid.cells() {
            let Some(id) = cell.dynamic() else { continue };
            referenced += 1;
            if cell.static_obj().is_some_and(|o| o.is_solid()) {
                return broken(format!("{id} shares {} with a solid object", cell.pos()));
            }
            match self.position_of(id) {
                Some(p) if p == cell.pos() => {}
                Some(p) => return broken(format!("{id} stored at {p} but referenced by {}", cell.pos())),
                None => return broken(format!("{} references unknown {id}", cell.pos())),
            }
        }

        let entities = usize::from(self.player.is_some()) + self.monsters.len();
        if referenced != entities {
            return broken(format!("{referenced} cell references for {entities} entities"));
        }
        Ok(())
    }
}
