/// Command surface for presentation adapters.
///
/// Every command maps onto one world operation. After it runs, the defeat
/// check is applied and a `ViewSnapshot` comes back for rendering. A
/// rejected command returns the error and leaves the world as it was.

use serde::{Deserialize, Serialize};

use crate::domain::coord::{Coord, Direction};
use crate::error::Result;

use super::world::{GamePhase, World};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Move(Direction),
    CreateIce,
    DestroyIce(Direction),
    Save(String),
    Load(String),
    Pause,
    Resume,
}

/// What a renderer needs after each command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    pub player_position: Option<Coord>,
    pub score: u32,
    pub lives: u32,
    pub remaining_fruits: usize,
    pub phase: GamePhase,
    pub tick: u64,
}

impl World {
    pub fn execute(&mut self, command: Command) -> Result<ViewSnapshot> {
        let result = match command {
            Command::Move(dir) => self.player_move(dir).map(|_| ()),
            Command::CreateIce => self.player_create_ice().map(|_| ()),
            Command::DestroyIce(dir) => self.player_destroy_ice(dir).map(|_| ()),
            Command::Save(slot) => self.save_game(&slot).map(|_| ()),
            Command::Load(slot) => self.load_game(&slot),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
        };
        self.check_defeat();
        result.map(|()| self.snapshot())
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let player = self.player();
        ViewSnapshot {
            player_position: player.map(|p| p.position()),
            score: player.map_or(0, |p| p.score()),
            lives: player.map_or(0, |p| p.lives()),
            remaining_fruits: self.uncollected_fruits(),
            phase: self.phase(),
            tick: self.tick_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IceError;
    use crate::test_support::{fruit, level, wall, world_with};

    #[test]
    fn move_returns_fresh_snapshot() {
        let mut desc = level(3, 3, (0, 0));
        desc.fruits.push(fruit((1, 0), 200));
        desc.fruits.push(fruit((2, 2), 100));
        let (mut w, _) = world_with(desc);
        w.load_level(1).unwrap();
        let view = w.execute(Command::Move(Direction::Right)).unwrap();
        assert_eq!(view.player_position, Some(Coord::new(1, 0)));
        assert_eq!(view.score, 200);
        assert_eq!(view.remaining_fruits, 1);
        assert_eq!(view.lives, 3);
        assert_eq!(view.phase, GamePhase::Running);
    }

    #[test]
    fn rejected_command_leaves_state_alone() {
        let mut desc = level(3, 1, (0, 0));
        desc.statics.push(wall((1, 0)));
        let (mut w, _) = world_with(desc);
        w.load_level(1).unwrap();
        let before = w.snapshot();
        let err = w.execute(Command::Move(Direction::Right)).unwrap_err();
        assert!(matches!(err, IceError::CellBlocked(_)));
        assert_eq!(w.snapshot(), before);
    }

    #[test]
    fn save_and_load_through_commands() {
        let (mut w, _) = world_with(level(3, 3, (0, 0)));
        w.load_level(1).unwrap();
        w.execute(Command::Move(Direction::Down)).unwrap();
        w.execute(Command::Save("slot1".into())).unwrap();
        w.execute(Command::Move(Direction::Right)).unwrap();
        let view = w.execute(Command::Load("slot1".into())).unwrap();
        assert_eq!(view.player_position, Some(Coord::new(0, 1)));
    }

    #[test]
    fn commands_parse_from_json() {
        let cmd: Command = serde_json::from_str(r#"{"move":"left"}"#).unwrap();
        assert_eq!(cmd, Command::Move(Direction::Left));
        let cmd: Command = serde_json::from_str(r#""create_ice""#).unwrap();
        assert_eq!(cmd, Command::CreateIce);
    }

    #[test]
    fn snapshot_before_load_is_empty() {
        let (w, _) = world_with(level(2, 2, (0, 0)));
        let view = w.snapshot();
        assert_eq!(view.player_position, None);
        assert_eq!(view.phase, GamePhase::Initializing);
    }
}
