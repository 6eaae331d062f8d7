use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand::seq::IndexedRandom;
use rand::seq::index::sample_weighted;
use serde::{Deserialize, Serialize};

use crate::dropout::{Dropout, DropoutCurve};
use crate::error::{CoreError, Result};
use crate::token::TokenId;

/// Graph node identifier. `SENTINEL` is reserved; real nodes start at 1.
pub type NodeId = u64;

/// Root/terminal node: "no context yet" and "sequence ends here" at once.
/// Created at construction, never removed.
pub const SENTINEL: NodeId = 0;

/// Hard cap on weighted-random walks. A cyclic subgraph with little weight
/// toward the sentinel could otherwise walk far past any latency budget.
pub const MAX_WALK_STEPS: usize = 256;

/// A context window of up to `order` trailing token ids ending in `value`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub context: Vec<TokenId>,
    pub value: TokenId,
}

impl GraphNode {
    /// The full trailing window this node represents: context then value.
    pub fn trailing_window(&self) -> Vec<TokenId> {
        let mut window = self.context.clone();
        window.push(self.value);
        window
    }
}

/// Directed weighted transition. References nodes only by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: f64,
}

/// An n-order weighted directed graph over token ids.
///
/// Nodes live in a `BTreeMap` keyed by monotonically increasing id, so
/// iteration order is insertion order and "first match wins" lookups are
/// structural rather than incidental. Edges store only `(from, to)` ids —
/// structural deletion during eviction is map/vec surgery, never reference
/// chasing.
///
/// Invariants outside of `evict`: every non-sentinel node has at least one
/// outgoing edge, and every edge references two live nodes. The sentinel is
/// exempt on both ends.
#[derive(Clone, Debug)]
pub struct TransitionGraph {
    order: usize,
    starting_weight: f64,
    weight_increase: f64,
    next_id: NodeId,
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: Vec<GraphEdge>,
}

impl TransitionGraph {
    pub fn new(order: usize, starting_weight: f64, weight_increase: f64) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            SENTINEL,
            GraphNode {
                id: SENTINEL,
                context: Vec::new(),
                value: 0,
            },
        );
        Self {
            order: order.max(1),
            starting_weight,
            weight_increase,
            next_id: 1,
            nodes,
            edges: Vec::new(),
        }
    }

    /// Rebuild a graph from deserialized parts. `next_id` resumes past the
    /// highest live id; the sentinel is inserted if the parts lack it.
    pub fn from_parts(
        order: usize,
        starting_weight: f64,
        weight_increase: f64,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> Self {
        let mut graph = Self::new(order, starting_weight, weight_increase);
        for node in nodes {
            if node.id != SENTINEL {
                graph.next_id = graph.next_id.max(node.id + 1);
                graph.nodes.insert(node.id, node);
            }
        }
        graph.edges = edges;
        graph
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn set_order(&mut self, order: usize) {
        self.order = order.max(1);
    }

    pub fn set_weights(&mut self, starting_weight: f64, weight_increase: f64) {
        self.starting_weight = starting_weight;
        self.weight_increase = weight_increase;
    }

    /// Node count including the sentinel.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Whether both structural invariants hold. Used by persistence to
    /// reject a corrupt archive and by tests after eviction.
    pub fn is_consistent(&self) -> bool {
        let endpoints_live = self
            .edges
            .iter()
            .all(|e| self.nodes.contains_key(&e.from) && self.nodes.contains_key(&e.to));
        let all_reachable_out = self
            .nodes
            .keys()
            .filter(|&&id| id != SENTINEL)
            .all(|&id| self.edges.iter().any(|e| e.from == id));
        endpoints_live && all_reachable_out
    }

    /// Context window a successor of `prev` would carry: the previous node's
    /// trailing window, truncated to the last `order - 1` ids.
    fn derive_context(&self, prev: NodeId) -> Vec<TokenId> {
        if prev == SENTINEL {
            return Vec::new();
        }
        let mut window = self.nodes[&prev].trailing_window();
        let keep = self.order - 1;
        if window.len() > keep {
            window.drain(..window.len() - keep);
        }
        window
    }

    /// First live node (insertion order) with exactly this context and value.
    /// Matching on the trailing window deliberately aliases nodes whose full
    /// history differs beyond `order` — that is the back-off behavior.
    fn find_exact(&self, context: &[TokenId], value: TokenId) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.id != SENTINEL && n.value == value && n.context == context)
            .map(|n| n.id)
    }

    fn bump_edge(&mut self, from: NodeId, to: NodeId) {
        match self.edges.iter_mut().find(|e| e.from == from && e.to == to) {
            Some(edge) => edge.weight += self.weight_increase,
            None => {
                // Structurally absent: created at 0, then reinforced
                self.edges.push(GraphEdge {
                    from,
                    to,
                    weight: self.weight_increase,
                });
            }
        }
    }

    /// Record one observed transition from `prev` to a window ending in
    /// `value`. Reuses a matching node and reinforces the edge, or creates a
    /// fresh node with an edge at `starting_weight`. Returns the node reached.
    pub fn reinforce(&mut self, prev: NodeId, value: TokenId) -> NodeId {
        let context = self.derive_context(prev);
        if let Some(id) = self.find_exact(&context, value) {
            self.bump_edge(prev, id);
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, GraphNode { id, context, value });
        self.edges.push(GraphEdge {
            from: prev,
            to: id,
            weight: self.starting_weight,
        });
        id
    }

    /// Train on one token sequence: walk it from the sentinel through
    /// `reinforce`, then close the path back to the sentinel.
    pub fn feed(&mut self, ids: &[TokenId]) {
        if ids.is_empty() {
            return;
        }
        let mut prev = SENTINEL;
        for &id in ids {
            prev = self.reinforce(prev, id);
        }
        match self
            .edges
            .iter_mut()
            .find(|e| e.from == prev && e.to == SENTINEL)
        {
            Some(edge) => edge.weight += self.weight_increase,
            None => self.edges.push(GraphEdge {
                from: prev,
                to: SENTINEL,
                weight: self.starting_weight,
            }),
        }
    }

    /// Weighted-random step from `from` (the sentinel when `None`). Sampling
    /// weight is `weight.max(1.0)` so a decayed edge stays reachable while
    /// still being biased against. `None` means the sequence ends here.
    pub fn sample(&self, from: Option<NodeId>, rng: &mut impl Rng) -> Option<NodeId> {
        let from = from.unwrap_or(SENTINEL);
        let outgoing: Vec<&GraphEdge> = self.edges.iter().filter(|e| e.from == from).collect();
        let edge = outgoing.choose_weighted(rng, |e| e.weight.max(1.0)).ok()?;
        if edge.to == SENTINEL { None } else { Some(edge.to) }
    }

    /// Walk from `start` collecting node values until the sentinel or the
    /// step cap. Non-deterministic.
    pub fn generate_sequence(&self, start: Option<NodeId>, rng: &mut impl Rng) -> Vec<TokenId> {
        let mut values = Vec::new();
        let mut current = start;
        for _ in 0..MAX_WALK_STEPS {
            match self.sample(current, rng) {
                Some(id) => {
                    values.push(self.nodes[&id].value);
                    current = Some(id);
                }
                None => break,
            }
        }
        values
    }

    /// First live node whose trailing window ends with `ids`
    /// (`ids.len() <= order`). Seeds generation at a specific token.
    pub fn find_node(&self, ids: &[TokenId]) -> Result<NodeId> {
        if ids.is_empty() || ids.len() > self.order {
            return Err(CoreError::NotFound(format!(
                "context window of length {}",
                ids.len()
            )));
        }
        self.nodes
            .values()
            .filter(|n| n.id != SENTINEL)
            .find(|n| {
                let window = n.trailing_window();
                window.len() >= ids.len() && window[window.len() - ids.len()..] == *ids
            })
            .map(|n| n.id)
            .ok_or_else(|| CoreError::NotFound(format!("node for context {ids:?}")))
    }

    /// Decay, select victims, remove, sanitize. Total: an empty or
    /// nearly-empty graph simply performs no removals. Both structural
    /// invariants hold again on return.
    pub fn evict(
        &mut self,
        policy: Dropout,
        curve: DropoutCurve,
        factor: f64,
        threshold: f64,
        rng: &mut impl Rng,
    ) {
        // Phase 1: decay every edge, collecting sub-threshold candidates.
        let mut candidates: Vec<usize> = Vec::new();
        for (idx, edge) in self.edges.iter_mut().enumerate() {
            edge.weight = curve.apply(edge.weight);
            if edge.weight < threshold {
                candidates.push(idx);
            }
        }

        // Phase 2: victim selection.
        let victims = self.select_victims(policy, &candidates, factor, rng);
        if victims.is_empty() {
            return;
        }

        // Phase 3: drop victim edges.
        let mut idx = 0;
        self.edges.retain(|_| {
            let keep = !victims.contains(&idx);
            idx += 1;
            keep
        });

        // Phase 4: cascading repair.
        self.sanitize();
    }

    fn select_victims(
        &self,
        policy: Dropout,
        candidates: &[usize],
        factor: f64,
        rng: &mut impl Rng,
    ) -> HashSet<usize> {
        match policy {
            Dropout::None => HashSet::new(),
            Dropout::All => candidates.iter().copied().collect(),
            Dropout::LeastUsed => {
                let mut sorted: Vec<usize> = candidates.to_vec();
                sorted.sort_by(|&a, &b| {
                    self.edges[a]
                        .weight
                        .partial_cmp(&self.edges[b].weight)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                let count = (sorted.len() as f64 * factor) as usize;
                sorted.truncate(count);
                sorted.into_iter().collect()
            }
            Dropout::Random => candidates
                .iter()
                .filter(|_| rng.random_bool(factor.clamp(0.0, 1.0)))
                .copied()
                .collect(),
            Dropout::RandomWeighted => {
                let count = (candidates.len() as f64 * factor) as usize;
                if count == 0 {
                    return HashSet::new();
                }
                // Invert so low weight samples high; +1 keeps every
                // inverted weight strictly positive
                let max_weight = candidates
                    .iter()
                    .map(|&i| self.edges[i].weight)
                    .fold(f64::MIN, f64::max);
                match sample_weighted(
                    rng,
                    candidates.len(),
                    |i| max_weight - self.edges[candidates[i]].weight + 1.0,
                    count,
                ) {
                    Ok(picked) => picked.into_iter().map(|i| candidates[i]).collect(),
                    Err(_) => HashSet::new(),
                }
            }
        }
    }

    /// Restore the structural invariants after edge removal: any non-sentinel
    /// node with zero outgoing edges is a dead end, so its incoming edges are
    /// removed too, repeating until a fixpoint; nodes no remaining edge
    /// touches are then deleted.
    fn sanitize(&mut self) {
        loop {
            let dead: HashSet<NodeId> = self
                .nodes
                .keys()
                .filter(|&&id| id != SENTINEL && !self.edges.iter().any(|e| e.from == id))
                .copied()
                .collect();
            let before = self.edges.len();
            self.edges.retain(|e| !dead.contains(&e.to));
            if self.edges.len() == before {
                break;
            }
        }

        let referenced: HashSet<NodeId> = self
            .edges
            .iter()
            .flat_map(|e| [e.from, e.to])
            .collect();
        self.nodes
            .retain(|&id, _| id == SENTINEL || referenced.contains(&id));
    }
}
