/// Board storage: a fixed `width × height` array of cells.
///
/// Each cell has two independent slots:
///   - static : wall, fruit or ice (`StaticObject`)
///   - dynamic: a reference to the player or a monster (`EntityId`)
///
/// Slot writes go through `Grid::set_static` / `Grid::set_dynamic`, which
/// enforce the one-occupant-per-slot rule and, once a notifier is attached,
/// publish `CellUpdated` followed by `MapUpdated`. Levels are built before
/// the notifier is attached, so loading a board is silent.

use crate::error::{IceError, Result};
use crate::sim::dispatcher::EventDispatcher;
use crate::sim::event::{EventSource, GameEvent, GameEventKind};

use super::coord::Coord;
use super::entity::EntityId;
use super::object::{Solid, StaticObject};

#[derive(Clone, Debug)]
pub struct Cell {
    pos: Coord,
    static_obj: Option<StaticObject>,
    dynamic: Option<EntityId>,
}

impl Cell {
    fn new(pos: Coord) -> Self {
        Cell { pos, static_obj: None, dynamic: None }
    }

    pub fn pos(&self) -> Coord {
        self.pos
    }

    pub fn static_obj(&self) -> Option<&StaticObject> {
        self.static_obj.as_ref()
    }

    pub fn dynamic(&self) -> Option<EntityId> {
        self.dynamic
    }

    /// Store or clear the static slot. Replacing an object with itself
    /// (same id) is accepted; replacing a different one is not.
    pub fn set_static(&mut self, obj: Option<StaticObject>) -> Result<()> {
        if let (Some(current), Some(new)) = (&self.static_obj, &obj) {
            if current.id() != new.id() {
                return Err(IceError::CellBlocked(self.pos));
            }
        }
        self.static_obj = obj;
        Ok(())
    }

    pub fn set_dynamic(&mut self, entity: Option<EntityId>) -> Result<()> {
        if let (Some(current), Some(new)) = (self.dynamic, entity) {
            if current != new {
                return Err(IceError::CellOccupied(self.pos));
            }
        }
        self.dynamic = entity;
        Ok(())
    }

    /// No static object, or a non-solid one. Ignores the dynamic slot.
    pub fn is_traversable(&self) -> bool {
        !self.static_obj.as_ref().is_some_and(|o| o.is_solid())
    }

    pub fn is_free_for_dynamic(&self) -> bool {
        self.dynamic.is_none() && self.is_traversable()
    }
}

#[derive(Debug)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    notifier: Option<EventDispatcher>,
}

impl Default for Grid {
    fn default() -> Self {
        Grid::new(0, 0)
    }
}

impl Grid {
    /// A 0×0 grid is valid and means "nothing loaded".
    pub fn new(width: i32, height: i32) -> Self {
        let (width, height) = (width.max(0), height.max(0));
        let capacity = (width as usize).checked_mul(height as usize).unwrap_or(0);
        let mut cells = Vec::with_capacity(capacity);
        for y in 0..height {
            for x in 0..width {
                cells.push(Cell::new(Coord::new(x, y)));
            }
        }
        Grid { width, height, cells, notifier: None }
    }

    pub fn attach_notifier(&mut self, notifier: EventDispatcher) {
        self.notifier = Some(notifier);
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, pos: Coord) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Coord) -> Result<usize> {
        if self.contains(pos) {
            Ok((pos.y * self.width + pos.x) as usize)
        } else {
            Err(IceError::InvalidCoordinates(pos))
        }
    }

    pub fn cell(&self, pos: Coord) -> Result<&Cell> {
        let i = self.index(pos)?;
        Ok(&self.cells[i])
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn is_traversable(&self, pos: Coord) -> bool {
        self.cell(pos).is_ok_and(Cell::is_traversable)
    }

    pub fn set_static(&mut self, pos: Coord, obj: Option<StaticObject>) -> Result<()> {
        let i = self.index(pos)?;
        self.cells[i].set_static(obj)?;
        self.notify(pos, "static");
        Ok(())
    }

    pub fn set_dynamic(&mut self, pos: Coord, entity: Option<EntityId>) -> Result<()> {
        let i = self.index(pos)?;
        self.cells[i].set_dynamic(entity)?;
        self.notify(pos, "dynamic");
        Ok(())
    }

    /// In-place access for damage and melting. Removal still has to go
    /// through `set_static(pos, None)` so it is announced.
    pub(crate) fn static_at_mut(&mut self, pos: Coord) -> Option<&mut StaticObject> {
        let i = self.index(pos).ok()?;
        self.cells[i].static_obj.as_mut()
    }

    fn notify(&self, pos: Coord, slot: &str) {
        let Some(notifier) = &self.notifier else { return };
        notifier.dispatch(
            GameEvent::new(GameEventKind::CellUpdated)
                .from_source(EventSource::Cell(pos))
                .at(pos)
                .with("slot", slot),
        );
        notifier.dispatch(GameEvent::new(GameEventKind::MapUpdated).at(pos));
    }
}
