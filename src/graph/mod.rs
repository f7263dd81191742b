//! Personal graph view built from the entity cache.
//!
//! [`personal`] holds the in-memory graph and its queries; [`snapshot`]
//! reads and writes the node-link JSON exchange format.

pub mod personal;
pub mod snapshot;

pub use personal::{
    GraphEdge, GraphNode, GraphStats, Layers, Neighbor, NodeKey, PersonalGraph, Recommendation,
    SimilarListener, TrackViaUser,
};
pub use snapshot::{export_graph, import_graph, Snapshot};
