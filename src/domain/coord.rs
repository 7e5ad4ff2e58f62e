/// Board coordinates and the four cardinal directions.
///
/// `y` grows downward, so `Up` is `(0, -1)`. Coordinates are signed:
/// stepping off the board produces a coordinate the grid rejects with
/// `InvalidCoordinates` instead of wrapping.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Coord { x, y }
    }

    /// Neighbor one step away in `dir`.
    pub fn step(self, dir: Direction) -> Coord {
        self + dir
    }

    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl Add<Direction> for Coord {
    type Output = Coord;

    fn add(self, dir: Direction) -> Coord {
        let (dx, dy) = dir.delta();
        Coord { x: self.x + dx, y: self.y + dy }
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Self {
        Coord { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Declaration order. Pathfinding and the patrol fallback both rely on
    /// this order staying fixed.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Direction from `from` to an orthogonally adjacent `to`.
    pub fn between(from: Coord, to: Coord) -> Option<Direction> {
        Direction::ALL.into_iter().find(|&d| from + d == to)
    }
}
