//! Board model and monster intelligence. Nothing here publishes events on
//! its own except the grid, and only once the world attaches a notifier.

pub mod ai;
pub mod coord;
pub mod entity;
pub mod grid;
pub mod object;
pub mod pathfinder;
pub mod pattern;
