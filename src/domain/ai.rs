/// Monster AI: movement strategies behind one trait.
///
/// Strategies:
///   1. **Patrol**    : replays a `MovementPattern`; an empty pattern
///      cycles the four directions in declaration order.
///   2. **Path-chase**: BFS toward the target every decision, first step.
///   3. **Path-chase + break**: as above, and may smash an ice block it
///      faces. Breaking is rate-limited by a cooldown counted in decisions.
///
/// Strategies never mutate the world. They see it through an `AiView`
/// handed over at decision time; the world applies whatever they choose.

use super::coord::{Coord, Direction};
use super::grid::Grid;
use super::pathfinder;
use super::pattern::MovementPattern;

/// Read-only context for one decision.
#[derive(Clone, Copy)]
pub struct AiView<'a> {
    pub grid: &'a Grid,
    pub position: Coord,
    pub facing: Direction,
    /// Where the monster's target currently stands, if it has one.
    pub target: Option<Coord>,
}

pub trait MovementStrategy: Send {
    /// Direction to try this tick, or `None` to stay put.
    fn next_direction(&mut self, view: &AiView<'_>) -> Option<Direction>;

    fn name(&self) -> &'static str;

    fn can_break_ice(&self) -> bool {
        false
    }

    /// Consume a break charge. Only meaningful when `can_break_ice`.
    fn try_break(&mut self) -> bool {
        false
    }
}

// ── Patrol ──

#[derive(Clone, Debug, Default)]
pub struct Patrol {
    pattern: MovementPattern,
    fallback: usize,
}

impl Patrol {
    pub fn new(pattern: MovementPattern) -> Self {
        Patrol { pattern, fallback: 0 }
    }
}

impl MovementStrategy for Patrol {
    fn next_direction(&mut self, _view: &AiView<'_>) -> Option<Direction> {
        if let Some(dir) = self.pattern.next_direction() {
            return Some(dir);
        }
        let dir = Direction::ALL[self.fallback];
        self.fallback = (self.fallback + 1) % Direction::ALL.len();
        Some(dir)
    }

    fn name(&self) -> &'static str {
        "patrol"
    }
}

// ── Path chase ──

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BreakCooldown {
    period: u32,
    remaining: u32,
}

#[derive(Clone, Debug, Default)]
pub struct PathChase {
    breaker: Option<BreakCooldown>,
}

impl PathChase {
    pub fn new() -> Self {
        PathChase { breaker: None }
    }

    /// Chase that may break ice at most once every `cooldown` decisions.
    pub fn breaking(cooldown: u32) -> Self {
        PathChase { breaker: Some(BreakCooldown { period: cooldown, remaining: 0 }) }
    }
}

/// Step along the dominant axis toward `target`. Ties go horizontal.
pub fn greedy_direction(from: Coord, target: Coord) -> Option<Direction> {
    let (dx, dy) = (target.x - from.x, target.y - from.y);
    if dx == 0 && dy == 0 {
        None
    } else if dx.abs() >= dy.abs() {
        Some(if dx > 0 { Direction::Right } else { Direction::Left })
    } else {
        Some(if dy > 0 { Direction::Down } else { Direction::Up })
    }
}

impl MovementStrategy for PathChase {
    fn next_direction(&mut self, view: &AiView<'_>) -> Option<Direction> {
        if let Some(b) = self.breaker.as_mut() {
            b.remaining = b.remaining.saturating_sub(1);
        }
        let target = view.target?;
        match pathfinder::next_direction(view.grid, view.position, target) {
            Some(dir) => Some(dir),
            // Walled in: a breaker pushes toward the target so it can chew
            // through whatever ice is in the way.
            None if self.breaker.is_some() => greedy_direction(view.position, target),
            None => None,
        }
    }

    fn name(&self) -> &'static str {
        if self.breaker.is_some() {
            "path-chase-break"
        } else {
            "path-chase"
        }
    }

    fn can_break_ice(&self) -> bool {
        self.breaker.is_some()
    }

    fn try_break(&mut self) -> bool {
        match self.breaker.as_mut() {
            Some(b) if b.remaining == 0 => {
                b.remaining = b.period;
                true
            }
            _ => false,
        }
    }
}
