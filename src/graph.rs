//! Relationship graph: query → files → risks / anchors / observations, plus
//! query → observation edges for upstream search hits.
//!
//! Node IDs are namespaced by kind (`query:`, `file:`, `risk:`, `anchor:`,
//! `obs:`), and a node ID is only ever added once. Edges are not
//! de-duplicated. Both sets are bounded; additions past a cap are dropped.

use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::gateway::Gateway;
use crate::guide_search::search_guides;
use crate::guide_summary::{summarize, truncate_text, SummaryLimits};
use crate::models::GuideSummary;
use crate::observations::search_memory;
use crate::params::GraphOptions;

/// Observation IDs kept per summary before node expansion.
const SUMMARY_OBSERVATION_CAP: usize = 20;
/// Observation nodes linked from a single file.
const OBSERVATIONS_PER_FILE: usize = 8;
const RISK_LABEL_MAX: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Query {
        label: String,
    },
    File {
        label: String,
        source: String,
        guide: String,
        score: u32,
    },
    Risk {
        label: String,
    },
    Anchor {
        label: String,
        line: i64,
        text: String,
    },
    Observation {
        label: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Matches,
    HasRisk,
    HasAnchor,
    MapsToObservation,
    SearchHit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphResult {
    pub query: String,
    pub counts: GraphCounts,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub meta: GraphMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub edges: usize,
}

/// The effective limits a graph was built with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphMeta {
    pub guide_index: PathBuf,
    pub file_limit: u32,
    pub anchor_limit: u32,
    pub risk_limit: u32,
    pub memory_limit: u32,
    pub max_nodes: u32,
    pub max_edges: u32,
    pub include_memory: bool,
}

/// Node/edge accumulator enforcing the caps.
#[derive(Debug)]
pub struct GraphBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    seen: HashSet<String>,
    max_nodes: usize,
    max_edges: usize,
}

impl GraphBuilder {
    pub fn new(max_nodes: usize, max_edges: usize) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            seen: HashSet::new(),
            max_nodes,
            max_edges,
        }
    }

    /// Adds a node unless its ID is already present or the node cap is reached.
    pub fn add_node(&mut self, id: String, kind: NodeKind) {
        if self.seen.contains(&id) || self.nodes.len() >= self.max_nodes {
            return;
        }
        self.seen.insert(id.clone());
        self.nodes.push(GraphNode { id, kind });
    }

    /// Adds an edge unless the edge cap is reached or an endpoint was dropped.
    pub fn add_edge(&mut self, source: &str, target: &str, kind: EdgeKind) {
        if self.edges.len() >= self.max_edges
            || !self.seen.contains(source)
            || !self.seen.contains(target)
        {
            return;
        }
        self.edges.push(GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
        });
    }

    fn add_observation(&mut self, from: &str, id: u64, kind: EdgeKind) {
        let node_id = format!("obs:{}", id);
        self.add_node(
            node_id.clone(),
            NodeKind::Observation {
                label: format!("#{}", id),
            },
        );
        self.add_edge(from, &node_id, kind);
    }

    fn add_file(&mut self, query_id: &str, file: &GuideSummary) {
        let file_id = format!("file:{}", file.source);
        self.add_node(
            file_id.clone(),
            NodeKind::File {
                label: file.basename.clone(),
                source: file.source.clone(),
                guide: file.guide_md.clone(),
                score: file.score,
            },
        );
        self.add_edge(query_id, &file_id, EdgeKind::Matches);

        for risk in &file.risks {
            let risk_id = format!("risk:{}:{}", file.source, risk);
            self.add_node(
                risk_id.clone(),
                NodeKind::Risk {
                    label: truncate_text(risk, RISK_LABEL_MAX),
                },
            );
            self.add_edge(&file_id, &risk_id, EdgeKind::HasRisk);
        }

        for anchor in &file.anchors {
            let anchor_id = format!("anchor:{}:{}", file.source, anchor.line);
            self.add_node(
                anchor_id.clone(),
                NodeKind::Anchor {
                    label: format!("L{}", anchor.line),
                    line: anchor.line,
                    text: anchor.text.clone(),
                },
            );
            self.add_edge(&file_id, &anchor_id, EdgeKind::HasAnchor);
        }

        for id in file.observation_ids.iter().take(OBSERVATIONS_PER_FILE) {
            self.add_observation(&file_id, *id, EdgeKind::MapsToObservation);
        }
    }

    pub fn into_parts(self) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        (self.nodes, self.edges)
    }
}

/// Builds the relationship graph for a query.
pub async fn build_graph(gateway: &Gateway, opts: &GraphOptions) -> GraphResult {
    let limits = SummaryLimits {
        anchors: opts.anchor_limit as usize,
        risks: opts.risk_limit as usize,
        observations: SUMMARY_OBSERVATION_CAP,
    };

    let hits = search_guides(&gateway.guides, &opts.query, opts.file_limit as usize).await;
    let mut files = Vec::with_capacity(hits.len());
    for hit in &hits {
        files.push(summarize(gateway.guide_root(), hit, limits).await);
    }

    let mut graph = GraphBuilder::new(opts.max_nodes as usize, opts.max_edges as usize);
    let query_id = format!("query:{}", opts.query);
    graph.add_node(
        query_id.clone(),
        NodeKind::Query {
            label: opts.query.clone(),
        },
    );

    for file in &files {
        graph.add_file(&query_id, file);
    }

    if opts.include_memory {
        let memory = search_memory(&gateway.upstream, &opts.query, opts.memory_limit).await;
        for id in memory.ids.iter().take(opts.memory_limit as usize) {
            graph.add_observation(&query_id, *id, EdgeKind::SearchHit);
        }
    }

    let (nodes, edges) = graph.into_parts();
    GraphResult {
        query: opts.query.clone(),
        counts: GraphCounts {
            nodes: nodes.len(),
            edges: edges.len(),
        },
        nodes,
        edges,
        meta: GraphMeta {
            guide_index: gateway.guides.path().to_path_buf(),
            file_limit: opts.file_limit,
            anchor_limit: opts.anchor_limit,
            risk_limit: opts.risk_limit,
            memory_limit: opts.memory_limit,
            max_nodes: opts.max_nodes,
            max_edges: opts.max_edges,
            include_memory: opts.include_memory,
        },
    }
}
