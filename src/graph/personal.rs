//! In-memory personal graph view over the entity cache.
//!
//! The graph is a derived, rebuildable structure: nodes are tracks, users
//! and artists discovered by a breadth-first expansion from a seed track,
//! edges carry the relationship layer they came from. It has no persistence
//! obligation of its own beyond the snapshot format in
//! [`crate::graph::snapshot`]; the cache is always the source of truth.

use std::collections::{HashMap, HashSet, VecDeque};
use std::collections::hash_map::Entry;

use bitflags::bitflags;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::db;
use crate::error::{Error, Result};
use crate::model::{RelationType, Track};

/// Engaging users attached per track during the build.
const ENGAGER_LIMIT: i64 = 50;
/// Similarity edges attached per user in the deferred pass.
const SIMILAR_USER_LIMIT: i64 = 20;
/// Similarity floor for the deferred pass.
const SIMILAR_USER_MIN_SCORE: f64 = 0.2;
/// Related artists attached per artist.
const RELATED_ARTIST_LIMIT: i64 = 20;
/// Strength floor for artist edges.
const RELATED_ARTIST_MIN_STRENGTH: f64 = 0.3;
/// Component counting is skipped above this node count.
const COMPONENT_COUNT_CEILING: usize = 10_000;

bitflags! {
    /// Relationship layers to include in a build.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Layers: u8 {
        /// Layer 1: track-to-track relations
        const TRACK_TRACK = 1 << 0;
        /// Layer 2: user-to-track engagements
        const USER_TRACK = 1 << 1;
        /// Layer 3: user-to-user similarity
        const USER_USER = 1 << 2;
        /// Layer 4: artist-to-artist relationships
        const ARTIST_ARTIST = 1 << 3;
    }
}

impl Layers {
    /// The 1-4 layer number this flag is reported as on edges and stats.
    pub fn number(self) -> u8 {
        match self {
            Self::TRACK_TRACK => 1,
            Self::USER_TRACK => 2,
            Self::USER_USER => 3,
            Self::ARTIST_ARTIST => 4,
            _ => 0,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::TRACK_TRACK),
            2 => Some(Self::USER_TRACK),
            3 => Some(Self::USER_USER),
            4 => Some(Self::ARTIST_ARTIST),
            _ => None,
        }
    }
}

/// Namespaced node identity.
///
/// Track, user and artist ids all live in the same remote numeric space,
/// so the kind is part of the key; a user and a track with the same raw id
/// are distinct nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Track(i64),
    User(i64),
    Artist(i64),
}

impl NodeKey {
    pub fn raw_id(&self) -> i64 {
        match *self {
            Self::Track(id) | Self::User(id) | Self::Artist(id) => id,
        }
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Track(id) => write!(f, "{id}"),
            Self::User(id) => write!(f, "user_{id}"),
            Self::Artist(id) => write!(f, "artist_{id}"),
        }
    }
}

/// A node in the personal graph, carrying the display attributes the
/// snapshot format round-trips.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphNode {
    Track {
        id: i64,
        title: String,
        artist_id: Option<i64>,
        artist_name: Option<String>,
        genre: Option<String>,
        permalink_url: Option<String>,
    },
    User {
        id: i64,
        username: String,
        followers_count: i64,
    },
    Artist {
        id: i64,
        name: String,
    },
}

impl GraphNode {
    pub fn key(&self) -> NodeKey {
        match *self {
            Self::Track { id, .. } => NodeKey::Track(id),
            Self::User { id, .. } => NodeKey::User(id),
            Self::Artist { id, .. } => NodeKey::Artist(id),
        }
    }

    /// Title, username or artist name, whichever applies.
    pub fn label(&self) -> &str {
        match self {
            Self::Track { title, .. } => title,
            Self::User { username, .. } => username,
            Self::Artist { name, .. } => name,
        }
    }

    fn from_track(track: &Track) -> Self {
        Self::Track {
            id: track.track_id,
            title: track.title.clone(),
            artist_id: track.artist_id,
            artist_name: track.artist_name.clone(),
            genre: track.genre.clone(),
            permalink_url: track.permalink_url.clone(),
        }
    }
}

/// An edge in the personal graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub relation: RelationType,
    pub weight: f64,
    /// 1-4, see [`Layers`]
    pub layer: u8,
    /// Supporting observation count: common tracks on similarity edges,
    /// evidence count on artist edges.
    pub evidence: Option<i64>,
}

/// A neighbor query result.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub node: GraphNode,
    pub relation: RelationType,
    pub weight: f64,
    pub layer: u8,
}

/// A two-hop collaborative-filtering recommendation.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub track_id: i64,
    pub title: String,
    pub artist_name: Option<String>,
    /// Distinct direct neighbors connecting the seed to this candidate
    pub common_neighbors: usize,
    /// Sum of connecting edge weights times `common_neighbors`
    pub score: f64,
}

/// A track reachable through a shared listener.
#[derive(Debug, Clone)]
pub struct TrackViaUser {
    pub track_id: i64,
    pub title: String,
    pub artist_name: Option<String>,
    pub via_user_id: i64,
    pub via_username: String,
}

/// A listener with similar taste, found through a track's engagers.
#[derive(Debug, Clone)]
pub struct SimilarListener {
    pub user_id: i64,
    pub username: String,
    pub similarity_score: f64,
    pub common_tracks: i64,
}

/// Whole-graph summary statistics.
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub track_nodes: usize,
    pub user_nodes: usize,
    pub artist_nodes: usize,
    pub density: f64,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub min_degree: usize,
    /// Weakly connected components; `None` only when the graph is too
    /// large to count them cheaply. An empty graph reports `Some(0)`.
    pub connected_components: Option<usize>,
    /// Edge counts indexed by layer number minus one
    pub layer_edges: [usize; 4],
}

/// Directed multi-relation graph built from the cache.
#[derive(Debug, Default)]
pub struct PersonalGraph {
    graph: StableDiGraph<GraphNode, GraphEdge>,
    index: HashMap<NodeKey, NodeIndex>,
}

impl PersonalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph by breadth-first expansion from a seed track.
    ///
    /// Track-to-track edges are followed up to `config.max_depth` hops,
    /// expanding the frontier in batches of `config.batch_size`. Engagement
    /// and artist edges are attached as each track is visited; similarity
    /// edges are added in a single pass after the BFS completes, over every
    /// user the build discovered, because similarity pairs may enter the
    /// graph through different branches.
    pub async fn build_from_seed(
        pool: &SqlitePool,
        seed_track_id: i64,
        layers: Layers,
        config: &GraphConfig,
    ) -> Result<Self> {
        if db::get_track(pool, seed_track_id).await?.is_none() {
            return Err(Error::invalid_record(format!(
                "seed track {seed_track_id} is not in the cache; harvest it first"
            )));
        }

        info!(
            seed = seed_track_id,
            max_depth = config.max_depth,
            ?layers,
            "building personal graph"
        );

        let mut graph = Self::new();
        let mut visited: HashSet<i64> = HashSet::new();
        let mut expanded_artists: HashSet<i64> = HashSet::new();
        let mut queue: VecDeque<(i64, usize)> = VecDeque::new();
        queue.push_back((seed_track_id, 0));

        while !queue.is_empty() {
            let mut batch = Vec::new();
            while batch.len() < config.batch_size {
                let Some((track_id, depth)) = queue.pop_front() else {
                    break;
                };
                if depth <= config.max_depth && visited.insert(track_id) {
                    batch.push((track_id, depth));
                }
            }

            for (track_id, depth) in batch {
                let Some(track) = db::get_track(pool, track_id).await? else {
                    continue;
                };
                graph.put(GraphNode::from_track(&track));

                if layers.contains(Layers::TRACK_TRACK) && depth < config.max_depth {
                    let related =
                        db::get_related_tracks(pool, track_id, None, 0.0, config.neighbor_limit)
                            .await?;
                    for rel in related {
                        graph.intern(GraphNode::Track {
                            id: rel.track_id,
                            title: rel.title.clone(),
                            artist_id: rel.artist_id,
                            artist_name: rel.artist_name.clone(),
                            genre: None,
                            permalink_url: None,
                        });
                        graph.connect(
                            NodeKey::Track(track_id),
                            NodeKey::Track(rel.track_id),
                            GraphEdge {
                                relation: RelationType::parse(&rel.relation_type),
                                weight: rel.weight,
                                layer: Layers::TRACK_TRACK.number(),
                                evidence: None,
                            },
                        );
                        if !visited.contains(&rel.track_id) {
                            queue.push_back((rel.track_id, depth + 1));
                        }
                    }
                }

                if layers.contains(Layers::USER_TRACK) {
                    graph.attach_engagers(pool, track_id).await?;
                }

                if layers.contains(Layers::ARTIST_ARTIST) {
                    if let Some(artist_id) = track.artist_id {
                        if expanded_artists.insert(artist_id) {
                            graph.attach_related_artists(pool, artist_id).await?;
                        }
                    }
                }
            }
        }

        if layers.contains(Layers::USER_USER) {
            graph.attach_user_similarities(pool).await?;
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "personal graph built"
        );
        Ok(graph)
    }

    /// Engagement edges (user -> track) for one visited track.
    async fn attach_engagers(&mut self, pool: &SqlitePool, track_id: i64) -> Result<()> {
        let engagers = db::get_track_engagers(pool, track_id, ENGAGER_LIMIT).await?;
        for engager in engagers {
            self.intern(GraphNode::User {
                id: engager.user_id,
                username: engager.username.clone(),
                followers_count: engager.followers_count,
            });
            self.connect(
                NodeKey::User(engager.user_id),
                NodeKey::Track(track_id),
                GraphEdge {
                    relation: RelationType::parse(&engager.engagement_type),
                    weight: 1.0,
                    layer: Layers::USER_TRACK.number(),
                    evidence: None,
                },
            );
        }
        Ok(())
    }

    /// Artist relationship edges for one artist, strongest first.
    async fn attach_related_artists(&mut self, pool: &SqlitePool, artist_id: i64) -> Result<()> {
        self.intern_artist(pool, artist_id).await?;
        let related = db::get_related_artists(pool, artist_id, RELATED_ARTIST_LIMIT).await?;
        for rel in related {
            if rel.strength < RELATED_ARTIST_MIN_STRENGTH {
                continue;
            }
            self.intern(GraphNode::Artist {
                id: rel.related_artist_id,
                name: rel
                    .artist_name
                    .clone()
                    .unwrap_or_else(|| format!("Artist {}", rel.related_artist_id)),
            });
            self.connect(
                NodeKey::Artist(artist_id),
                NodeKey::Artist(rel.related_artist_id),
                GraphEdge {
                    relation: RelationType::parse(&rel.relationship_type),
                    weight: rel.strength,
                    layer: Layers::ARTIST_ARTIST.number(),
                    evidence: Some(rel.evidence_count),
                },
            );
        }
        Ok(())
    }

    /// Deferred similarity pass over every user node in the graph.
    ///
    /// Iterates a snapshot of the user set taken at pass start; users pulled
    /// in by a similarity edge are added as nodes but not themselves
    /// expanded.
    async fn attach_user_similarities(&mut self, pool: &SqlitePool) -> Result<()> {
        let user_ids: Vec<i64> = self
            .index
            .keys()
            .filter_map(|k| match k {
                NodeKey::User(id) => Some(*id),
                _ => None,
            })
            .collect();

        debug!(users = user_ids.len(), "attaching similarity edges");
        for user_id in user_ids {
            let similar = db::get_similar_users(pool, user_id, SIMILAR_USER_LIMIT).await?;
            for sim in similar {
                if sim.similarity_score < SIMILAR_USER_MIN_SCORE {
                    continue;
                }
                self.intern_user(pool, sim.similar_user_id).await?;
                self.connect(
                    NodeKey::User(user_id),
                    NodeKey::User(sim.similar_user_id),
                    GraphEdge {
                        relation: RelationType::parse(&sim.similarity_type),
                        weight: sim.similarity_score,
                        layer: Layers::USER_USER.number(),
                        evidence: Some(sim.common_tracks),
                    },
                );
            }
        }
        Ok(())
    }

    /// Add a user node, backfilling its attributes from the cache.
    async fn intern_user(&mut self, pool: &SqlitePool, user_id: i64) -> Result<NodeIndex> {
        if let Some(&idx) = self.index.get(&NodeKey::User(user_id)) {
            return Ok(idx);
        }
        let node = match db::get_user(pool, user_id).await? {
            Some(user) => GraphNode::User {
                id: user_id,
                username: user.username,
                followers_count: user.followers_count,
            },
            None => GraphNode::User {
                id: user_id,
                username: format!("User {user_id}"),
                followers_count: 0,
            },
        };
        Ok(self.intern(node))
    }

    /// Add an artist node; artists are rows in the users table.
    async fn intern_artist(&mut self, pool: &SqlitePool, artist_id: i64) -> Result<NodeIndex> {
        if let Some(&idx) = self.index.get(&NodeKey::Artist(artist_id)) {
            return Ok(idx);
        }
        let name = match db::get_user(pool, artist_id).await? {
            Some(user) => user.username,
            None => format!("Artist {artist_id}"),
        };
        Ok(self.intern(GraphNode::Artist { id: artist_id, name }))
    }

    /// Insert a node if its key is new, returning its index either way.
    pub(crate) fn intern(&mut self, node: GraphNode) -> NodeIndex {
        let key = node.key();
        match self.index.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let idx = self.graph.add_node(node);
                entry.insert(idx);
                idx
            }
        }
    }

    /// Insert a node, overwriting the attributes of an existing stub.
    fn put(&mut self, node: GraphNode) -> NodeIndex {
        let key = node.key();
        match self.index.entry(key) {
            Entry::Occupied(entry) => {
                let idx = *entry.get();
                self.graph[idx] = node;
                idx
            }
            Entry::Vacant(entry) => {
                let idx = self.graph.add_node(node);
                entry.insert(idx);
                idx
            }
        }
    }

    /// Add an edge between two existing nodes. Parallel edges are allowed;
    /// a node may relate to the same neighbor on several layers.
    pub(crate) fn connect(&mut self, src: NodeKey, dst: NodeKey, edge: GraphEdge) -> bool {
        match (self.index.get(&src), self.index.get(&dst)) {
            (Some(&a), Some(&b)) => {
                self.graph.add_edge(a, b, edge);
                true
            }
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.index.contains_key(&key)
    }

    pub fn node(&self, key: NodeKey) -> Option<&GraphNode> {
        self.index.get(&key).map(|&idx| &self.graph[idx])
    }

    /// Iterate all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// Iterate all edges as (src, dst, edge) triples.
    pub fn edges(&self) -> impl Iterator<Item = (NodeKey, NodeKey, &GraphEdge)> {
        self.graph.edge_references().map(|e| {
            (
                self.graph[e.source()].key(),
                self.graph[e.target()].key(),
                e.weight(),
            )
        })
    }

    /// Outgoing neighbors of a node, heaviest edges first.
    ///
    /// `layer` restricts results to one relationship layer; a node connected
    /// through several parallel edges appears once per matching edge.
    pub fn neighbors(&self, key: NodeKey, limit: usize, layer: Option<u8>) -> Vec<Neighbor> {
        let Some(&idx) = self.index.get(&key) else {
            return Vec::new();
        };

        let mut out: Vec<Neighbor> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| layer.is_none_or(|l| e.weight().layer == l))
            .map(|e| Neighbor {
                node: self.graph[e.target()].clone(),
                relation: e.weight().relation.clone(),
                weight: e.weight().weight,
                layer: e.weight().layer,
            })
            .collect();
        out.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        out.truncate(limit);
        out
    }

    /// Unweighted shortest path between two nodes, following edge
    /// direction. `None` when either endpoint is absent or no path exists.
    pub fn shortest_path(&self, src: NodeKey, dst: NodeKey) -> Option<Vec<NodeKey>> {
        let &start = self.index.get(&src)?;
        let &goal = self.index.get(&dst)?;
        if start == goal {
            return Some(vec![src]);
        }

        let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if next == start || prev.contains_key(&next) {
                    continue;
                }
                prev.insert(next, current);
                if next == goal {
                    let mut path = vec![self.graph[goal].key()];
                    let mut at = goal;
                    while let Some(&p) = prev.get(&at) {
                        path.push(self.graph[p].key());
                        at = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Two-hop collaborative-filtering recommendations for a seed track.
    ///
    /// Candidates are track nodes at distance two: neighbors of the seed's
    /// direct neighbors, excluding the seed and the direct neighbors
    /// themselves. Each candidate is scored by the sum of the weights of
    /// the edges reaching it, times the number of distinct direct neighbors
    /// it is reached through.
    pub fn recommendations(
        &self,
        seed_track_id: i64,
        limit: usize,
        min_common_neighbors: usize,
    ) -> Vec<Recommendation> {
        let Some(&seed) = self.index.get(&NodeKey::Track(seed_track_id)) else {
            return Vec::new();
        };

        let direct: HashSet<NodeIndex> = self
            .graph
            .neighbors_directed(seed, Direction::Outgoing)
            .collect();

        struct Candidate {
            via: HashSet<NodeIndex>,
            total_weight: f64,
        }
        let mut candidates: HashMap<NodeIndex, Candidate> = HashMap::new();

        for &neighbor in &direct {
            for edge in self.graph.edges_directed(neighbor, Direction::Outgoing) {
                let candidate = edge.target();
                if candidate == seed || direct.contains(&candidate) {
                    continue;
                }
                if !matches!(self.graph[candidate], GraphNode::Track { .. }) {
                    continue;
                }
                let entry = candidates.entry(candidate).or_insert(Candidate {
                    via: HashSet::new(),
                    total_weight: 0.0,
                });
                entry.via.insert(neighbor);
                entry.total_weight += edge.weight().weight;
            }
        }

        let mut out: Vec<Recommendation> = candidates
            .into_iter()
            .filter(|(_, c)| c.via.len() >= min_common_neighbors)
            .filter_map(|(idx, c)| match &self.graph[idx] {
                GraphNode::Track {
                    id,
                    title,
                    artist_name,
                    ..
                } => Some(Recommendation {
                    track_id: *id,
                    title: title.clone(),
                    artist_name: artist_name.clone(),
                    common_neighbors: c.via.len(),
                    score: c.total_weight * c.via.len() as f64,
                }),
                _ => None,
            })
            .collect();
        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        out.truncate(limit);
        out
    }

    /// Tracks reachable as track -> engaging user -> other liked track.
    ///
    /// Engagement edges point user -> track, so the first hop walks
    /// incoming engagement edges and the second walks the user's outgoing
    /// ones.
    pub fn tracks_via_users(&self, track_id: i64, limit: usize) -> Vec<TrackViaUser> {
        let Some(&idx) = self.index.get(&NodeKey::Track(track_id)) else {
            return Vec::new();
        };

        let mut seen: HashSet<i64> = HashSet::from([track_id]);
        let mut out = Vec::new();
        for user_idx in self.graph.neighbors_directed(idx, Direction::Incoming) {
            let GraphNode::User { id: user_id, username, .. } = &self.graph[user_idx] else {
                continue;
            };
            for other_idx in self.graph.neighbors_directed(user_idx, Direction::Outgoing) {
                let GraphNode::Track { id, title, artist_name, .. } = &self.graph[other_idx] else {
                    continue;
                };
                if !seen.insert(*id) {
                    continue;
                }
                out.push(TrackViaUser {
                    track_id: *id,
                    title: title.clone(),
                    artist_name: artist_name.clone(),
                    via_user_id: *user_id,
                    via_username: username.clone(),
                });
                if out.len() >= limit {
                    return out;
                }
            }
        }
        out
    }

    /// Listeners similar to a track's engagers, via similarity edges.
    pub fn similar_listeners(&self, track_id: i64, limit: usize) -> Vec<SimilarListener> {
        let Some(&idx) = self.index.get(&NodeKey::Track(track_id)) else {
            return Vec::new();
        };

        let mut seen: HashSet<i64> = HashSet::new();
        let mut out = Vec::new();
        for user_idx in self.graph.neighbors_directed(idx, Direction::Incoming) {
            let GraphNode::User { id: user_id, .. } = &self.graph[user_idx] else {
                continue;
            };
            seen.insert(*user_id);
            for edge in self.graph.edges_directed(user_idx, Direction::Outgoing) {
                if edge.weight().layer != Layers::USER_USER.number() {
                    continue;
                }
                let GraphNode::User { id, username, .. } = &self.graph[edge.target()] else {
                    continue;
                };
                if !seen.insert(*id) {
                    continue;
                }
                out.push(SimilarListener {
                    user_id: *id,
                    username: username.clone(),
                    similarity_score: edge.weight().weight,
                    common_tracks: edge.weight().evidence.unwrap_or(0),
                });
                if out.len() >= limit {
                    return out;
                }
            }
        }
        out
    }

    /// Summary statistics for CLI reporting.
    pub fn stats(&self) -> GraphStats {
        let nodes = self.graph.node_count();
        if nodes == 0 {
            // an empty graph has zero components, not an unknown count
            return GraphStats {
                connected_components: Some(0),
                ..GraphStats::default()
            };
        }
        let edges = self.graph.edge_count();

        let mut track_nodes = 0;
        let mut user_nodes = 0;
        let mut artist_nodes = 0;
        for idx in self.graph.node_indices() {
            match self.graph[idx] {
                GraphNode::Track { .. } => track_nodes += 1,
                GraphNode::User { .. } => user_nodes += 1,
                GraphNode::Artist { .. } => artist_nodes += 1,
            }
        }

        let degrees: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                self.graph.edges_directed(idx, Direction::Outgoing).count()
                    + self.graph.edges_directed(idx, Direction::Incoming).count()
            })
            .collect();

        let mut layer_edges = [0usize; 4];
        for edge in self.graph.edge_references() {
            let layer = edge.weight().layer;
            if (1..=4).contains(&layer) {
                layer_edges[layer as usize - 1] += 1;
            }
        }

        // Directed density: e / (n * (n - 1)); a single node has no
        // possible edges.
        let density = if nodes > 1 {
            edges as f64 / (nodes as f64 * (nodes as f64 - 1.0))
        } else {
            0.0
        };

        let connected_components = if nodes < COMPONENT_COUNT_CEILING {
            Some(self.count_weak_components())
        } else {
            None
        };

        GraphStats {
            nodes,
            edges,
            track_nodes,
            user_nodes,
            artist_nodes,
            density,
            avg_degree: degrees.iter().sum::<usize>() as f64 / nodes as f64,
            max_degree: degrees.iter().copied().max().unwrap_or(0),
            min_degree: degrees.iter().copied().min().unwrap_or(0),
            connected_components,
            layer_edges,
        }
    }

    /// Count weakly connected components by undirected BFS.
    fn count_weak_components(&self) -> usize {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut components = 0;
        for start in self.graph.node_indices() {
            if visited.contains(&start) {
                continue;
            }
            components += 1;
            let mut queue = VecDeque::from([start]);
            visited.insert(start);
            while let Some(current) = queue.pop_front() {
                for next in self.graph.neighbors_undirected(current) {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        components
    }
}
