//! Simulation: world state, tick pipeline, events, levels and saves.

pub mod command;
pub mod dispatcher;
pub mod event;
pub mod level;
pub mod save;
pub mod step;
pub mod world;
