//! JSON wire format for the archive members.
//!
//! Wire types are kept separate from the domain types: `table.dat` is an
//! object keyed by token name, graph members key nodes by stringified id,
//! and `model.json` spells enum values as lowercase snake strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ramble_core::{
    Dropout, DropoutCurve, GraphEdge, GraphNode, Hyper, SENTINEL, TokenClass, TokenTable,
    TransitionGraph, WordTag,
};

use crate::error::{Result, StoreError};

// --- model.json ---

/// Persisted hyperparameters. The edge-weight constants are not part of the
/// archive format; they come from `Hyper::default()` on load.
#[derive(Serialize, Deserialize, Debug)]
pub struct WireHyper {
    pub dropout: String,
    pub dropout_curve: String,
    pub order: usize,
    pub message_buffer: usize,
    pub prediction_time_ms: u64,
    pub max_predictions: usize,
    pub context_bias: f64,
    pub dropout_chance: f64,
    pub dropout_factor: f64,
}

impl WireHyper {
    pub fn from_hyper(hyper: &Hyper) -> Self {
        Self {
            dropout: hyper.dropout.as_str().to_string(),
            dropout_curve: hyper.dropout_curve.as_str().to_string(),
            order: hyper.order,
            message_buffer: hyper.message_buffer,
            prediction_time_ms: hyper.prediction_time_ms,
            max_predictions: hyper.max_predictions,
            context_bias: hyper.context_bias,
            dropout_chance: hyper.dropout_chance,
            dropout_factor: hyper.dropout_factor,
        }
    }

    pub fn into_hyper(self) -> Result<Hyper> {
        if self.order == 0 {
            return Err(StoreError::InvalidData("order must be at least 1".into()));
        }
        Ok(Hyper {
            order: self.order,
            dropout: Dropout::from_str_lossy(&self.dropout),
            dropout_curve: DropoutCurve::from_str_lossy(&self.dropout_curve),
            dropout_factor: self.dropout_factor,
            dropout_chance: self.dropout_chance,
            context_bias: self.context_bias,
            message_buffer: self.message_buffer,
            prediction_time_ms: self.prediction_time_ms,
            max_predictions: self.max_predictions,
            ..Hyper::default()
        })
    }
}

// --- table.dat ---

#[derive(Serialize, Deserialize, Debug)]
pub struct WireToken {
    pub class: String,
    pub id: u32,
    pub tag: String,
}

pub type WireTable = BTreeMap<String, WireToken>;

pub fn table_to_wire(table: &TokenTable) -> WireTable {
    table
        .iter()
        .map(|t| {
            (
                t.name.clone(),
                WireToken {
                    class: t.class.as_str().to_string(),
                    id: t.id,
                    tag: t.tag.as_str().to_string(),
                },
            )
        })
        .collect()
}

fn parse_class(s: &str) -> Result<TokenClass> {
    match s {
        "start" => Ok(TokenClass::Start),
        "end" => Ok(TokenClass::End),
        "word" => Ok(TokenClass::Word),
        "separator" => Ok(TokenClass::Separator),
        "link" => Ok(TokenClass::Link),
        other => Err(StoreError::InvalidData(format!(
            "unknown token class '{other}'"
        ))),
    }
}

fn parse_tag(s: &str) -> Result<WordTag> {
    match s {
        "noun" => Ok(WordTag::Noun),
        "pronoun" => Ok(WordTag::Pronoun),
        other => Err(StoreError::InvalidData(format!(
            "unknown word tag '{other}'"
        ))),
    }
}

/// Rebuild a token table, enforcing dense first-seen ids `0..n`.
pub fn wire_to_table(wire: WireTable) -> Result<TokenTable> {
    let mut entries: Vec<(String, WireToken)> = wire.into_iter().collect();
    entries.sort_by_key(|(_, t)| t.id);

    let mut table = TokenTable::new();
    for (expected, (name, token)) in entries.into_iter().enumerate() {
        if token.id as usize != expected {
            return Err(StoreError::InvalidData(format!(
                "token ids are not dense: expected {expected}, found {} ('{name}')",
                token.id
            )));
        }
        table.intern(&name, parse_class(&token.class)?, parse_tag(&token.tag)?);
    }
    Ok(table)
}

// --- model1.dat / model2.dat ---

#[derive(Serialize, Deserialize, Debug)]
pub struct WireNode {
    pub value: u32,
    pub context: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireEdge {
    pub from: u64,
    pub to: u64,
    pub weight: f64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireGraph {
    pub nodes: BTreeMap<u64, WireNode>,
    pub edges: Vec<WireEdge>,
}

pub fn graph_to_wire(graph: &TransitionGraph) -> WireGraph {
    WireGraph {
        nodes: graph
            .nodes()
            .filter(|n| n.id != SENTINEL)
            .map(|n| {
                (
                    n.id,
                    WireNode {
                        value: n.value,
                        context: n.context.clone(),
                    },
                )
            })
            .collect(),
        edges: graph
            .edges()
            .iter()
            .map(|e| WireEdge {
                from: e.from,
                to: e.to,
                weight: e.weight,
            })
            .collect(),
    }
}

/// Rebuild a transition graph and check the structural invariants plus
/// token-id references against the table.
pub fn wire_to_graph(wire: WireGraph, hyper: &Hyper, table: &TokenTable) -> Result<TransitionGraph> {
    if wire.nodes.contains_key(&SENTINEL) {
        return Err(StoreError::InvalidData(
            "node id 0 is reserved for the sentinel".into(),
        ));
    }

    let token_count = table.len() as u32;
    let nodes: Vec<GraphNode> = wire
        .nodes
        .into_iter()
        .map(|(id, n)| {
            if n.value >= token_count || n.context.iter().any(|&t| t >= token_count) {
                return Err(StoreError::InvalidData(format!(
                    "node {id} references a token outside the table"
                )));
            }
            Ok(GraphNode {
                id,
                context: n.context,
                value: n.value,
            })
        })
        .collect::<Result<_>>()?;

    let edges: Vec<GraphEdge> = wire
        .edges
        .into_iter()
        .map(|e| GraphEdge {
            from: e.from,
            to: e.to,
            weight: e.weight,
        })
        .collect();

    let graph = TransitionGraph::from_parts(
        hyper.order,
        hyper.starting_weight,
        hyper.weight_increase,
        nodes,
        edges,
    );
    if !graph.is_consistent() {
        return Err(StoreError::InvalidData(
            "graph has dangling edges or unreachable nodes".into(),
        ));
    }
    Ok(graph)
}
