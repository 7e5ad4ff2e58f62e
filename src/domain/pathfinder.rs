/// Breadth-first shortest path over the 4-connected grid.
///
/// A cell is traversable when it holds no static object or a non-solid
/// one (fruit). Dynamic occupants are ignored: the path is a plan, and the
/// resolver decides what happens when a step runs into someone.
///
/// Neighbors are expanded in `Direction::ALL` order (Up, Down, Left,
/// Right), so among equal-length paths the result is deterministic.

use std::collections::VecDeque;

use super::coord::{Coord, Direction};
use super::grid::Grid;

/// Coordinates from `start` to `goal`, both inclusive. Empty when
/// `start == goal`, either end is off the board, or the goal is unreachable.
pub fn find_path(grid: &Grid, start: Coord, goal: Coord) -> Vec<Coord> {
    if start == goal || !grid.contains(start) || !grid.contains(goal) {
        return Vec::new();
    }

    let width = grid.width() as usize;
    let idx = |c: Coord| c.y as usize * width + c.x as usize;
    let size = width * grid.height() as usize;

    let mut visited = vec![false; size];
    let mut parent: Vec<Option<Coord>> = vec![None; size];
    let mut queue = VecDeque::with_capacity(64);

    visited[idx(start)] = true;
    queue.push_back(start);

    while let Some(cur) = queue.pop_front() {
        for dir in Direction::ALL {
            let next = cur.step(dir);
            if !grid.contains(next) || visited[idx(next)] || !grid.is_traversable(next) {
                continue;
            }
            visited[idx(next)] = true;
            parent[idx(next)] = Some(cur);
            if next == goal {
                return reconstruct(&parent, idx, start, goal);
            }
            queue.push_back(next);
        }
    }

    Vec::new()
}

fn reconstruct(
    parent: &[Option<Coord>],
    idx: impl Fn(Coord) -> usize,
    start: Coord,
    goal: Coord,
) -> Vec<Coord> {
    let mut path = vec![goal];
    let mut cur = goal;
    while cur != start {
        match parent[idx(cur)] {
            Some(p) => {
                path.push(p);
                cur = p;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// First step of the shortest path, as a direction.
pub fn next_direction(grid: &Grid, start: Coord, goal: Coord) -> Option<Direction> {
    let path = find_path(grid, start, goal);
    let step = *path.get(1)?;
    Direction::between(start, step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::object::{Fruit, FruitKind, ObjectId, ObjectKind, StaticObject};

    fn wall_at(grid: &mut Grid, id: u32, x: i32, y: i32) {
        grid.set_static(Coord::new(x, y), Some(StaticObject::new(ObjectId(id), ObjectKind::IndestructibleWall)))
            .unwrap();
    }

    #[test]
    fn routes_around_center_wall() {
        let mut g = Grid::new(3, 3);
        wall_at(&mut g, 1, 1, 1);
        let path = find_path(&g, Coord::new(0, 0), Coord::new(2, 2));
        assert_eq!(path.first(), Some(&Coord::new(0, 0)));
        assert_eq!(path.last(), Some(&Coord::new(2, 2)));
        assert_eq!(path.len(), 5);
        assert!(!path.contains(&Coord::new(1, 1)));
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan(pair[1]), 1);
        }
        // Down is expanded before Right.
        assert_eq!(path[1], Coord::new(0, 1));
    }

    #[test]
    fn same_cell_and_unreachable_are_empty() {
        let mut g = Grid::new(3, 1);
        assert!(find_path(&g, Coord::new(1, 0), Coord::new(1, 0)).is_empty());
        wall_at(&mut g, 1, 1, 0);
        assert!(find_path(&g, Coord::new(0, 0), Coord::new(2, 0)).is_empty());
        assert_eq!(next_direction(&g, Coord::new(0, 0), Coord::new(2, 0)), None);
        assert!(find_path(&g, Coord::new(0, 0), Coord::new(9, 0)).is_empty());
    }

    #[test]
    fn fruit_does_not_block_but_walls_do() {
        let mut g = Grid::new(3, 1);
        let fruit = StaticObject::new(ObjectId(2), ObjectKind::Fruit(Fruit::new(FruitKind::Grape, 100)));
        g.set_static(Coord::new(1, 0), Some(fruit)).unwrap();
        assert_eq!(find_path(&g, Coord::new(0, 0), Coord::new(2, 0)).len(), 3);
        assert_eq!(next_direction(&g, Coord::new(0, 0), Coord::new(2, 0)), Some(Direction::Right));
    }

    #[test]
    fn shortest_path_is_found_in_a_corridor() {
        // . # .
        // . # .
        // . . .
        let mut g = Grid::new(3, 3);
        wall_at(&mut g, 1, 1, 0);
        wall_at(&mut g, 2, 1, 1);
        let path = find_path(&g, Coord::new(0, 0), Coord::new(2, 0));
        assert_eq!(path.len(), 7);
        assert_eq!(next_direction(&g, Coord::new(2, 0), Coord::new(0, 0)), Some(Direction::Down));
    }
}
