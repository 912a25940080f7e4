//! I/O infrastructure.
//!
//! - [`publisher`]: observer trait and pose-graph messages
//! - [`persistence`]: map sink writing PLY clouds and a location log
//! - [`replay`]: JSON-lines trajectory reader used by the replay binary

pub mod persistence;
pub mod publisher;
pub mod replay;

pub use persistence::{MapSink, PersistenceError, PlyMapWriter, write_ply};
pub use publisher::{
    EdgeKind, EdgeSegment, GraphPublisher, LogPublisher, NodePose, PoseGraphEdge,
    PoseGraphMessage, PoseGraphNode,
};
pub use replay::{ReplayError, TrajectoryReader, TrajectoryRecord, read_trajectory};
