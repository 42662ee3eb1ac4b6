//! Deterministic fleet layout from the road graph's node list.
//!
//! Every path visits three nodes picked by fixed index offsets, which keeps
//! runs reproducible for a given graph file.

use crate::errors::{SetupError, SetupResult};
use crate::motion::{Path, Point};
use crate::vehicle::{IdAllocator, SendPolicy, Vehicle, VehicleClass};

pub const WAYPOINTS_PER_PATH: usize = 3;

/// Start offsets that keep legitimate vehicles sharing a node from overlapping.
pub const LEGITIMATE_OFFSETS: [(f64, f64); 5] = [
    (5.0, 0.0),
    (0.0, 5.0),
    (-5.0, 0.0),
    (0.0, -5.0),
    (5.0, 5.0),
];

/// Paths `[i, i + stride, i + 2 * stride]` for `i in first..first + count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPlan {
    pub first: usize,
    pub count: usize,
    pub stride: usize,
}

impl PathPlan {
    pub fn new(first: usize, count: usize, stride: usize) -> Self {
        Self {
            first,
            count,
            stride,
        }
    }

    /// Number of graph nodes the plan indexes into.
    pub fn required_nodes(&self) -> usize {
        if self.count == 0 {
            return 0;
        }
        self.first + self.count + self.stride * (WAYPOINTS_PER_PATH - 1)
    }

    pub fn node_indices(&self) -> impl Iterator<Item = [usize; WAYPOINTS_PER_PATH]> + '_ {
        (self.first..self.first + self.count)
            .map(move |i| [i, i + self.stride, i + 2 * self.stride])
    }
}

/// Which vehicles to create, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetPlan {
    pub malicious: PathPlan,
    pub legitimate: PathPlan,
    pub malicious_policy: SendPolicy,
    pub legitimate_policy: SendPolicy,
    pub step: f64,
}

impl FleetPlan {
    /// Attackers on consecutive nodes followed by legitimate vehicles on
    /// every third node, starting right after the attackers' start nodes.
    pub fn mixed(malicious: usize, legitimate: usize) -> Self {
        Self {
            malicious: PathPlan::new(0, malicious, 1),
            legitimate: PathPlan::new(malicious, legitimate, 3),
            malicious_policy: SendPolicy::for_class(VehicleClass::Malicious),
            legitimate_policy: SendPolicy::for_class(VehicleClass::Legitimate),
            step: crate::motion::DEFAULT_STEP,
        }
    }

    pub fn legitimate_only(legitimate: usize) -> Self {
        Self::mixed(0, legitimate)
    }

    pub fn required_nodes(&self) -> usize {
        self.malicious
            .required_nodes()
            .max(self.legitimate.required_nodes())
    }

    /// Builds the fleet over `positions` (scaled node positions in
    /// declaration order). Malicious vehicles come first.
    pub fn build(&self, positions: &[Point], ids: &mut IdAllocator) -> SetupResult<Vec<Vehicle>> {
        let required = self.required_nodes();
        if positions.len() < required {
            return Err(SetupError::NotEnoughNodes {
                required,
                available: positions.len(),
            });
        }
        if !(self.step > 0.0 && self.step.is_finite()) {
            return Err(SetupError::Config(format!(
                "vehicle step must be positive (got {})",
                self.step
            )));
        }

        let mut vehicles = Vec::with_capacity(self.malicious.count + self.legitimate.count);
        for (idx, nodes) in self.malicious.node_indices().enumerate() {
            let path = path_through(positions, nodes);
            let start = positions[nodes[0]];
            vehicles.push(Vehicle::new(
                ids.allocate(),
                VehicleClass::Malicious,
                idx + 1,
                start,
                path,
                self.malicious_policy,
                self.step,
            ));
        }
        for (idx, nodes) in self.legitimate.node_indices().enumerate() {
            let path = path_through(positions, nodes);
            let (dx, dy) = LEGITIMATE_OFFSETS[idx % LEGITIMATE_OFFSETS.len()];
            let start = positions[nodes[0]].offset(dx, dy);
            vehicles.push(Vehicle::new(
                ids.allocate(),
                VehicleClass::Legitimate,
                idx + 1,
                start,
                path,
                self.legitimate_policy,
                self.step,
            ));
        }
        Ok(vehicles)
    }
}

fn path_through(positions: &[Point], nodes: [usize; WAYPOINTS_PER_PATH]) -> Path {
    Path::new(nodes.iter().map(|&idx| positions[idx]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Point> {
        (0..n).map(|i| Point::new(i as f64 * 10.0, 0.0)).collect()
    }

    #[test]
    fn mixed_plan_matches_node_offsets() {
        let plan = FleetPlan::mixed(5, 5);
        let malicious: Vec<_> = plan.malicious.node_indices().collect();
        assert_eq!(malicious[0], [0, 1, 2]);
        assert_eq!(malicious[4], [4, 5, 6]);
        let legitimate: Vec<_> = plan.legitimate.node_indices().collect();
        assert_eq!(legitimate[0], [5, 8, 11]);
        assert_eq!(legitimate[4], [9, 12, 15]);
        assert_eq!(plan.required_nodes(), 16);
    }

    #[test]
    fn baseline_plan_starts_at_first_node() {
        let plan = FleetPlan::legitimate_only(5);
        let legitimate: Vec<_> = plan.legitimate.node_indices().collect();
        assert_eq!(legitimate[0], [0, 3, 6]);
        assert_eq!(plan.required_nodes(), 11);
        assert_eq!(plan.malicious.required_nodes(), 0);
    }

    #[test]
    fn builds_ordered_fleet_with_offsets() {
        let plan = FleetPlan::mixed(2, 2);
        let mut ids = IdAllocator::new();
        let fleet = plan.build(&line(plan.required_nodes()), &mut ids).expect("fleet");
        let classes: Vec<_> = fleet.iter().map(|v| v.class()).collect();
        assert_eq!(
            classes,
            vec![
                VehicleClass::Malicious,
                VehicleClass::Malicious,
                VehicleClass::Legitimate,
                VehicleClass::Legitimate,
            ]
        );
        assert_eq!(fleet[0].position(), Point::new(0.0, 0.0));
        assert_eq!(fleet[2].position(), Point::new(25.0, 0.0));
        assert_eq!(fleet[3].position(), Point::new(30.0, 5.0));
        assert_eq!(fleet[3].label(), "Legitimate Vehicle 2");
        let ids: Vec<_> = fleet.iter().map(|v| v.id().get()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn too_small_graph_is_a_setup_error() {
        let plan = FleetPlan::mixed(5, 5);
        let mut ids = IdAllocator::new();
        let err = plan.build(&line(10), &mut ids).unwrap_err();
        assert_eq!(
            err,
            SetupError::NotEnoughNodes {
                required: 16,
                available: 10
            }
        );
    }
}
