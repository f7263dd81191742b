//! Node-link JSON snapshots of a personal graph.
//!
//! The format mirrors the conventional node-link layout:
//! `{"directed": true, "multigraph": true, "nodes": [...], "links": [...]}`.
//! Track nodes keep their raw numeric id; user and artist nodes use
//! `"user_<id>"` / `"artist_<id>"` strings so the three id spaces cannot
//! collide. Node and edge attributes round-trip exactly.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::graph::personal::{GraphEdge, GraphNode, NodeKey, PersonalGraph};
use crate::model::RelationType;

/// Serialized graph document.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub directed: bool,
    pub multigraph: bool,
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
}

/// One node entry, tagged by kind.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum NodeRecord {
    Track {
        id: i64,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artist_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artist_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        genre: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        permalink_url: Option<String>,
    },
    User {
        id: String,
        user_id: i64,
        username: String,
        followers_count: i64,
    },
    Artist {
        id: String,
        artist_id: i64,
        artist_name: String,
    },
}

/// One edge entry. `source` and `target` are the node ids described above,
/// so they are numbers for tracks and strings otherwise.
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkRecord {
    pub source: Value,
    pub target: Value,
    pub weight: f64,
    pub relation: String,
    pub layer: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<i64>,
}

fn key_to_value(key: NodeKey) -> Value {
    match key {
        NodeKey::Track(id) => Value::from(id),
        other => Value::from(other.to_string()),
    }
}

fn key_from_value(value: &Value) -> Result<NodeKey> {
    if let Some(id) = value.as_i64() {
        return Ok(NodeKey::Track(id));
    }
    let s = value
        .as_str()
        .ok_or_else(|| Error::snapshot(format!("node id is neither number nor string: {value}")))?;
    let parsed = if let Some(raw) = s.strip_prefix("user_") {
        raw.parse().ok().map(NodeKey::User)
    } else if let Some(raw) = s.strip_prefix("artist_") {
        raw.parse().ok().map(NodeKey::Artist)
    } else {
        None
    };
    parsed.ok_or_else(|| Error::snapshot(format!("unrecognized node id {s:?}")))
}

impl From<&GraphNode> for NodeRecord {
    fn from(node: &GraphNode) -> Self {
        match node {
            GraphNode::Track {
                id,
                title,
                artist_id,
                artist_name,
                genre,
                permalink_url,
            } => Self::Track {
                id: *id,
                title: title.clone(),
                artist_id: *artist_id,
                artist_name: artist_name.clone(),
                genre: genre.clone(),
                permalink_url: permalink_url.clone(),
            },
            GraphNode::User {
                id,
                username,
                followers_count,
            } => Self::User {
                id: NodeKey::User(*id).to_string(),
                user_id: *id,
                username: username.clone(),
                followers_count: *followers_count,
            },
            GraphNode::Artist { id, name } => Self::Artist {
                id: NodeKey::Artist(*id).to_string(),
                artist_id: *id,
                artist_name: name.clone(),
            },
        }
    }
}

impl From<NodeRecord> for GraphNode {
    fn from(record: NodeRecord) -> Self {
        match record {
            NodeRecord::Track {
                id,
                title,
                artist_id,
                artist_name,
                genre,
                permalink_url,
            } => Self::Track {
                id,
                title,
                artist_id,
                artist_name,
                genre,
                permalink_url,
            },
            NodeRecord::User {
                user_id,
                username,
                followers_count,
                ..
            } => Self::User {
                id: user_id,
                username,
                followers_count,
            },
            NodeRecord::Artist {
                artist_id,
                artist_name,
                ..
            } => Self::Artist {
                id: artist_id,
                name: artist_name,
            },
        }
    }
}

/// Serialize a graph into a snapshot document.
pub fn to_snapshot(graph: &PersonalGraph) -> Snapshot {
    let nodes = graph.nodes().map(NodeRecord::from).collect();
    let links = graph
        .edges()
        .map(|(src, dst, edge)| LinkRecord {
            source: key_to_value(src),
            target: key_to_value(dst),
            weight: edge.weight,
            relation: edge.relation.as_str().to_string(),
            layer: edge.layer,
            evidence: edge.evidence,
        })
        .collect();
    Snapshot {
        directed: true,
        multigraph: true,
        nodes,
        links,
    }
}

/// Rebuild a graph from a snapshot document.
///
/// Fails if a link references a node id that is not in the node list.
pub fn from_snapshot(snapshot: Snapshot) -> Result<PersonalGraph> {
    let mut graph = PersonalGraph::new();
    for record in snapshot.nodes {
        graph.intern(GraphNode::from(record));
    }
    for link in snapshot.links {
        let src = key_from_value(&link.source)?;
        let dst = key_from_value(&link.target)?;
        let added = graph.connect(
            src,
            dst,
            GraphEdge {
                relation: RelationType::parse(&link.relation),
                weight: link.weight,
                layer: link.layer,
                evidence: link.evidence,
            },
        );
        if !added {
            return Err(Error::snapshot(format!(
                "link references unknown node: {} -> {}",
                src, dst
            )));
        }
    }
    Ok(graph)
}

/// Write a graph to `path` as pretty-printed JSON, creating parent
/// directories as needed.
pub fn export_graph(graph: &PersonalGraph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let snapshot = to_snapshot(graph);
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| Error::snapshot(format!("serializing graph: {e}")))?;
    fs::write(path, json)?;
    info!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        links = snapshot.links.len(),
        "graph exported"
    );
    Ok(())
}

/// Load a graph previously written by [`export_graph`].
pub fn import_graph(path: &Path) -> Result<PersonalGraph> {
    let json = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&json)
        .map_err(|e| Error::snapshot(format!("parsing {}: {e}", path.display())))?;
    let graph = from_snapshot(snapshot)?;
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph loaded"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> PersonalGraph {
        let mut graph = PersonalGraph::new();
        graph.intern(GraphNode::Track {
            id: 1,
            title: "Night Drive".to_string(),
            artist_id: Some(100),
            artist_name: Some("driver".to_string()),
            genre: Some("synthwave".to_string()),
            permalink_url: None,
        });
        graph.intern(GraphNode::Track {
            id: 2,
            title: "Dawn Loop".to_string(),
            artist_id: None,
            artist_name: None,
            genre: None,
            permalink_url: None,
        });
        graph.intern(GraphNode::User {
            id: 10,
            username: "listener".to_string(),
            followers_count: 42,
        });
        graph.connect(
            NodeKey::Track(1),
            NodeKey::Track(2),
            GraphEdge {
                relation: RelationType::CoPlaylist,
                weight: 0.5,
                layer: 1,
                evidence: None,
            },
        );
        graph.connect(
            NodeKey::User(10),
            NodeKey::Track(1),
            GraphEdge {
                relation: RelationType::Other("like".to_string()),
                weight: 1.0,
                layer: 2,
                evidence: None,
            },
        );
        graph
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let graph = sample_graph();
        let restored = from_snapshot(to_snapshot(&graph)).unwrap();

        assert_eq!(restored.node_count(), 3);
        assert_eq!(restored.edge_count(), 2);
        assert_eq!(restored.node(NodeKey::Track(1)), graph.node(NodeKey::Track(1)));
        assert_eq!(restored.node(NodeKey::User(10)), graph.node(NodeKey::User(10)));

        let edges: Vec<_> = restored.edges().collect();
        assert!(edges.iter().any(|(src, dst, edge)| {
            *src == NodeKey::Track(1)
                && *dst == NodeKey::Track(2)
                && edge.relation == RelationType::CoPlaylist
                && (edge.weight - 0.5).abs() < 1e-9
                && edge.layer == 1
        }));
    }

    #[test]
    fn test_node_id_encoding() {
        let snapshot = to_snapshot(&sample_graph());
        let json = serde_json::to_value(&snapshot).unwrap();

        let ids: Vec<&Value> = json["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| &n["id"])
            .collect();
        assert!(ids.contains(&&Value::from(1)));
        assert!(ids.contains(&&Value::from("user_10")));

        let link_sources: Vec<&Value> = json["links"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| &l["source"])
            .collect();
        assert!(link_sources.contains(&&Value::from("user_10")));
    }

    #[test]
    fn test_export_import_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("graph.json");

        let graph = sample_graph();
        export_graph(&graph, &path).unwrap();
        let restored = import_graph(&path).unwrap();

        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edge_count(), graph.edge_count());
    }

    #[test]
    fn test_dangling_link_rejected() {
        let snapshot = Snapshot {
            directed: true,
            multigraph: true,
            nodes: vec![NodeRecord::Track {
                id: 1,
                title: "only".to_string(),
                artist_id: None,
                artist_name: None,
                genre: None,
                permalink_url: None,
            }],
            links: vec![LinkRecord {
                source: Value::from(1),
                target: Value::from(2),
                weight: 0.5,
                relation: "co_playlist".to_string(),
                layer: 1,
                evidence: None,
            }],
        };
        assert!(matches!(from_snapshot(snapshot), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_bad_node_id_rejected() {
        let err = key_from_value(&Value::from("banana_7")).unwrap_err();
        assert!(err.to_string().contains("banana_7"));
    }
}
