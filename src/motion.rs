//! Constant-speed movement along cyclic waypoint paths.
//!
//! A follower steps toward its current target by a fixed magnitude per tick.
//! Once within [`ARRIVAL_EPSILON`] of the target it switches to the next
//! waypoint, wrapping back to the first one, so a path never terminates.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Distance under which a waypoint counts as reached.
pub const ARRIVAL_EPSILON: f64 = 1.0;

/// Default distance travelled per tick.
pub const DEFAULT_STEP: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Immutable waypoint sequence. Clones share the same backing slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    waypoints: Arc<[Point]>,
}

impl Path {
    pub fn new(waypoints: Vec<Point>) -> Self {
        Self {
            waypoints: waypoints.into(),
        }
    }

    pub fn waypoints(&self) -> &[Point] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn first(&self) -> Option<Point> {
        self.waypoints.first().copied()
    }
}

/// Moves `position` one step toward `path[target]`.
///
/// Returns the new position and the index of the waypoint to head for on the
/// next call. The final approach is clamped to the remaining distance so the
/// follower lands on the waypoint instead of oscillating around it.
pub fn advance(position: Point, path: &[Point], target: usize, step: f64) -> (Point, usize) {
    let Some(goal) = path.get(target) else {
        return (position, 0);
    };
    let dx = goal.x - position.x;
    let dy = goal.y - position.y;
    let distance = dx.hypot(dy);
    if distance > ARRIVAL_EPSILON {
        let travel = step.min(distance);
        let moved = Point::new(
            position.x + dx / distance * travel,
            position.y + dy / distance * travel,
        );
        (moved, target)
    } else {
        let next = if target + 1 >= path.len() {
            0
        } else {
            target + 1
        };
        (position, next)
    }
}

#[derive(Debug, Clone)]
pub struct PathFollower {
    path: Path,
    target: usize,
    step: f64,
}

impl PathFollower {
    pub fn new(path: Path, step: f64) -> Self {
        Self {
            path,
            target: 0,
            step,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target_index(&self) -> usize {
        self.target
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn advance(&mut self, position: &mut Point) {
        let (next_position, next_target) =
            advance(*position, self.path.waypoints(), self.target, self.step);
        *position = next_position;
        self.target = next_target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Path {
        Path::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 4.0),
        ])
    }

    #[test]
    fn moves_one_unit_toward_target() {
        let (pos, idx) = advance(Point::new(0.0, 0.0), &[Point::new(10.0, 0.0)], 0, 1.0);
        assert_eq!(pos, Point::new(1.0, 0.0));
        assert_eq!(idx, 0);
    }

    #[test]
    fn step_is_independent_of_remaining_distance() {
        let path = [Point::new(0.0, 400.0)];
        let (near, _) = advance(Point::new(0.0, 390.0), &path, 0, 1.0);
        let (far, _) = advance(Point::new(0.0, 0.0), &path, 0, 1.0);
        assert!((near.distance_to(Point::new(0.0, 390.0)) - 1.0).abs() < 1e-9);
        assert!((far.distance_to(Point::new(0.0, 0.0)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn final_approach_is_clamped() {
        let path = [Point::new(1.5, 0.0)];
        let (pos, idx) = advance(Point::new(0.0, 0.0), &path, 0, 5.0);
        assert_eq!(pos, Point::new(1.5, 0.0));
        assert_eq!(idx, 0);
        let (pos, idx) = advance(pos, &path, 0, 5.0);
        assert_eq!(pos, Point::new(1.5, 0.0));
        assert_eq!(idx, 0, "single waypoint path wraps onto itself");
    }

    #[test]
    fn within_epsilon_switches_target_without_moving() {
        let path = triangle();
        let start = Point::new(2.5, 0.0);
        let (pos, idx) = advance(start, path.waypoints(), 1, 1.0);
        assert_eq!(pos, start);
        assert_eq!(idx, 2);
    }

    #[test]
    fn path_cycles_back_to_first_waypoint() {
        let path = triangle();
        let mut follower = PathFollower::new(path.clone(), 1.0);
        let mut position = Point::new(0.0, 0.0);
        let mut visited = Vec::new();
        for _ in 0..64 {
            let before = follower.target_index();
            follower.advance(&mut position);
            if follower.target_index() != before {
                visited.push(follower.target_index());
            }
            if visited.len() == 4 {
                break;
            }
        }
        assert_eq!(visited, vec![1, 2, 0, 1]);

        // After wrapping the follower steps toward waypoint 0 again.
        let mut follower = PathFollower::new(path, 1.0);
        let mut position = Point::new(3.0, 4.0);
        follower.target = 2;
        follower.advance(&mut position);
        assert_eq!(follower.target_index(), 0);
        let before = position.distance_to(Point::new(0.0, 0.0));
        follower.advance(&mut position);
        assert!(position.distance_to(Point::new(0.0, 0.0)) < before);
    }

    #[test]
    fn empty_path_leaves_position_alone() {
        let mut follower = PathFollower::new(Path::new(Vec::new()), 1.0);
        let mut position = Point::new(7.0, 7.0);
        follower.advance(&mut position);
        assert_eq!(position, Point::new(7.0, 7.0));
        assert_eq!(follower.target_index(), 0);
    }
}
