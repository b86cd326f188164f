//! Port network: snapshot models, graph store, feature normalization and
//! visualization export.
//!
//! ## Architecture
//!
//! ```text
//! Snapshot ──► to_network ──► PortGraph::build ──► GraphTensors::from_graph
//!                                   │                       │
//!                                export               propagation backend
//! ```
//!
//! ## Modules
//!
//! - [`models`]: Snapshot DTOs, PortNode, RouteEdge
//! - [`store`]: `PortGraph` (petgraph wrapper with code ↔ index mapping)
//! - [`features`]: Feature normalization and `GraphTensors`
//! - [`export`]: Visualization projection

pub mod export;
pub mod features;
pub mod models;
pub mod store;

pub use export::{NetworkStructure, VisualEdge, VisualNode};
pub use features::{normalize_edge, normalize_node, GraphTensors};
pub use models::{PortNode, PortSnapshot, RouteEdge, RouteSnapshot, Snapshot, WeatherImpact};
pub use store::{GraphBuildError, PortGraph};
