//! Tick-driven tile arcade simulation.
//!
//! A bounded board of cells holding walls, fruit and player-made ice, one
//! player and a handful of monsters. `World` owns all of it and is the only
//! thing that mutates it; presentation drives it with `Command`s and
//! `tick()`, and follows along by subscribing to the `EventDispatcher`.
//!
//! ```no_run
//! use icecream_arena::{Command, Direction, GameConfig, World};
//!
//! let config = GameConfig::load();
//! let mut world = World::from_config(&config);
//! world.dispatcher().subscribe_all(|event| {
//!     println!("{:?} {:?}", event.kind(), event.payload());
//!     Ok(())
//! });
//! world.load_level(1)?;
//! let view = world.execute(Command::Move(Direction::Down))?;
//! world.tick();
//! println!("score {}", view.score);
//! # Ok::<(), icecream_arena::IceError>(())
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;

#[cfg(test)]
mod test_support;

pub use config::{GameConfig, RulesConfig};
pub use domain::coord::{Coord, Direction};
pub use domain::entity::{EntityId, MonsterKind};
pub use error::{IceError, Result};
pub use sim::command::{Command, ViewSnapshot};
pub use sim::dispatcher::{DeliveryMode, EventDispatcher, ListenerId};
pub use sim::event::{GameEvent, GameEventKind};
pub use sim::level::{FileLevelRepository, LevelDescriptor, LevelRepository, MemoryLevelRepository};
pub use sim::save::SaveState;
pub use sim::world::{GamePhase, MoveOutcome, World};
