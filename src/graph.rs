//! Static road graph used to lay out vehicle paths.
//!
//! The graph is consumed once at setup. Node order in the source file is the
//! declaration order that path plans index into, so loaders must preserve it.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::{SetupError, SetupResult};
use crate::motion::Point;

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoadGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<(String, String)>,
}

impl RoadGraph {
    /// Loads a graph from a `.toml` or `.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read road graph {path:?}"))?;
        let graph: RoadGraph = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse road graph {path:?}"))?,
            Some("toml") => toml::from_str(&contents)
                .with_context(|| format!("failed to parse road graph {path:?}"))?,
            other => return Err(anyhow!("unsupported road graph format: {other:?}")),
        };
        graph.validate()?;
        Ok(graph)
    }

    pub fn validate(&self) -> SetupResult<()> {
        if self.nodes.is_empty() {
            return Err(SetupError::EmptyGraph);
        }
        let mut names = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node.x.is_finite() || !node.y.is_finite() {
                return Err(SetupError::NonFiniteCoordinate(node.name.clone()));
            }
            if !names.insert(node.name.as_str()) {
                return Err(SetupError::DuplicateNode(node.name.clone()));
            }
        }
        for (a, b) in &self.edges {
            for end in [a, b] {
                if !names.contains(end.as_str()) {
                    return Err(SetupError::UnknownNode(end.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node positions mapped through `transform`, in declaration order.
    pub fn scaled_positions(&self, transform: &ScaleTransform) -> Vec<Point> {
        self.nodes
            .iter()
            .map(|node| transform.apply(node.x, node.y))
            .collect()
    }

    /// Edge endpoints mapped through `transform`.
    pub fn scaled_edges(&self, transform: &ScaleTransform) -> Vec<(Point, Point)> {
        let lookup = |name: &str| {
            self.nodes
                .iter()
                .find(|node| node.name == name)
                .map(|node| transform.apply(node.x, node.y))
        };
        self.edges
            .iter()
            .filter_map(|(a, b)| Some((lookup(a)?, lookup(b)?)))
            .collect()
    }
}

/// Maps the bounding box of the graph onto a `width` × `height` extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTransform {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    width: f64,
    height: f64,
}

impl ScaleTransform {
    pub fn fit(graph: &RoadGraph, width: u32, height: u32) -> SetupResult<Self> {
        graph.validate()?;
        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for node in &graph.nodes {
            min_x = min_x.min(node.x);
            max_x = max_x.max(node.x);
            min_y = min_y.min(node.y);
            max_y = max_y.max(node.y);
        }
        if max_x <= min_x {
            return Err(SetupError::DegenerateExtent { axis: "x" });
        }
        if max_y <= min_y {
            return Err(SetupError::DegenerateExtent { axis: "y" });
        }
        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
            width: f64::from(width),
            height: f64::from(height),
        })
    }

    /// Scales a raw coordinate, truncating to whole units.
    pub fn apply(&self, x: f64, y: f64) -> Point {
        let sx = (x - self.min_x) / (self.max_x - self.min_x) * self.width;
        let sy = (y - self.min_y) / (self.max_y - self.min_y) * self.height;
        Point::new(sx.trunc(), sy.trunc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, x: f64, y: f64) -> GraphNode {
        GraphNode {
            name: name.to_string(),
            x,
            y,
        }
    }

    fn square() -> RoadGraph {
        RoadGraph {
            nodes: vec![
                node("a", -3.2, 55.9),
                node("b", -3.1, 55.9),
                node("c", -3.1, 56.0),
                node("d", -3.2, 56.0),
            ],
            edges: vec![("a".into(), "b".into()), ("b".into(), "c".into())],
        }
    }

    #[test]
    fn scales_bounding_box_onto_extent() {
        let graph = square();
        let transform = ScaleTransform::fit(&graph, 800, 600).expect("fit");
        let positions = graph.scaled_positions(&transform);
        assert_eq!(positions[0], Point::new(0.0, 0.0));
        assert_eq!(positions[2], Point::new(800.0, 600.0));
        assert_eq!(graph.scaled_edges(&transform).len(), 2);
    }

    #[test]
    fn rejects_bad_graphs() {
        assert_eq!(RoadGraph::default().validate(), Err(SetupError::EmptyGraph));

        let mut duplicate = square();
        duplicate.nodes.push(node("a", 0.0, 0.0));
        assert_eq!(
            duplicate.validate(),
            Err(SetupError::DuplicateNode("a".into()))
        );

        let mut dangling = square();
        dangling.edges.push(("a".into(), "zz".into()));
        assert_eq!(
            dangling.validate(),
            Err(SetupError::UnknownNode("zz".into()))
        );

        let mut nan = square();
        nan.nodes[1].x = f64::NAN;
        assert_eq!(
            nan.validate(),
            Err(SetupError::NonFiniteCoordinate("b".into()))
        );
    }

    #[test]
    fn flat_graph_cannot_be_scaled() {
        let graph = RoadGraph {
            nodes: vec![node("a", 1.0, 5.0), node("b", 2.0, 5.0)],
            edges: Vec::new(),
        };
        assert_eq!(
            ScaleTransform::fit(&graph, 800, 600),
            Err(SetupError::DegenerateExtent { axis: "y" })
        );
    }

    #[test]
    fn parses_toml_and_json_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let toml_path = dir.path().join("graph.toml");
        fs::write(
            &toml_path,
            r#"
nodes = [
    { name = "a", x = 0.0, y = 0.0 },
    { name = "b", x = 1.0, y = 1.0 },
]
edges = [["a", "b"]]
"#,
        )
        .expect("write toml");
        let graph = RoadGraph::from_path(&toml_path).expect("toml graph");
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edges, vec![("a".to_string(), "b".to_string())]);

        let json_path = dir.path().join("graph.json");
        fs::write(&json_path, serde_json::to_string(&graph).expect("encode")).expect("write");
        assert_eq!(RoadGraph::from_path(&json_path).expect("json graph"), graph);

        let other = dir.path().join("graph.osm");
        fs::write(&other, "").expect("write");
        assert!(RoadGraph::from_path(&other).is_err());
    }
}
