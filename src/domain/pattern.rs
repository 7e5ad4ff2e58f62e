/// Cyclic scripted direction sequence used by patrolling monsters.

use super::coord::Direction;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MovementPattern {
    directions: Vec<Direction>,
    cursor: usize,
}

impl MovementPattern {
    pub fn new(directions: Vec<Direction>) -> Self {
        MovementPattern { directions, cursor: 0 }
    }

    /// Direction at the cursor, then advance (wrapping). `None` when empty.
    pub fn next_direction(&mut self) -> Option<Direction> {
        let dir = *self.directions.get(self.cursor)?;
        self.cursor = (self.cursor + 1) % self.directions.len();
        Some(dir)
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

}
