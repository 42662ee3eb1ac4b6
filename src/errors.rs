use thiserror::Error;

/// Failures detected while assembling a run, before the first tick.
///
/// Dropped messages, throttled sends, revocations and an exhausted RSU are
/// normal policy outcomes and never surface here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    #[error("road graph has no nodes")]
    EmptyGraph,
    #[error("duplicate node name {0:?}")]
    DuplicateNode(String),
    #[error("edge references unknown node {0:?}")]
    UnknownNode(String),
    #[error("node {0:?} has a non-finite coordinate")]
    NonFiniteCoordinate(String),
    #[error("node coordinates do not span the {axis} axis")]
    DegenerateExtent { axis: &'static str },
    #[error("path plan needs {required} nodes but the graph has {available}")]
    NotEnoughNodes { required: usize, available: usize },
    #[error("configuration error: {0}")]
    Config(String),
}

pub type SetupResult<T> = Result<T, SetupError>;
