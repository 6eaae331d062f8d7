use std::collections::HashSet;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::context::ConversationContext;
use crate::dropout::{Dropout, DropoutCurve};
use crate::error::{CoreError, Result};
use crate::graph::TransitionGraph;
use crate::score::{ContextEvaluator, Evaluator, LocalEvaluator, blend, select};
use crate::token::{TokenClass, TokenId, TokenTable, WordTag};
use crate::tokenizer::{render, translate};

/// Model hyperparameters. Persisted as-is in the archive's `model.json`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyper {
    pub order: usize,
    pub starting_weight: f64,
    pub weight_increase: f64,
    pub dropout: Dropout,
    pub dropout_curve: DropoutCurve,
    pub dropout_factor: f64,
    pub dropout_chance: f64,
    pub context_bias: f64,
    pub message_buffer: usize,
    pub prediction_time_ms: u64,
    pub max_predictions: usize,
}

impl Default for Hyper {
    fn default() -> Self {
        Self {
            order: 3,
            starting_weight: 5.0,
            weight_increase: 1.0,
            dropout: Dropout::LeastUsed,
            dropout_curve: DropoutCurve::Decrement,
            dropout_factor: 0.25,
            dropout_chance: 1.0,
            context_bias: 0.5,
            message_buffer: 5,
            prediction_time_ms: 500,
            max_predictions: 10,
        }
    }
}

/// The conversational generator: one token table, a forward and a backward
/// transition graph, bounded conversation history, and a name blacklist.
///
/// Single-threaded by contract — every operation takes `&mut self` and the
/// caller serializes access.
pub struct Model {
    hyper: Hyper,
    table: TokenTable,
    forward: TransitionGraph,
    backward: TransitionGraph,
    context: ConversationContext,
    blacklist: HashSet<String>,
    local_eval: Box<dyn Evaluator>,
    context_eval: Box<dyn Evaluator>,
}

impl Model {
    pub fn new(hyper: Hyper) -> Self {
        Self {
            forward: TransitionGraph::new(hyper.order, hyper.starting_weight, hyper.weight_increase),
            backward: TransitionGraph::new(
                hyper.order,
                hyper.starting_weight,
                hyper.weight_increase,
            ),
            context: ConversationContext::new(hyper.message_buffer),
            table: TokenTable::new(),
            blacklist: HashSet::new(),
            local_eval: Box::new(LocalEvaluator),
            context_eval: Box::new(ContextEvaluator),
            hyper,
        }
    }

    /// Reassemble a model from persisted state.
    pub fn from_state(
        hyper: Hyper,
        table: TokenTable,
        forward: TransitionGraph,
        backward: TransitionGraph,
        blacklist: HashSet<String>,
    ) -> Self {
        Self {
            context: ConversationContext::new(hyper.message_buffer),
            table,
            forward,
            backward,
            blacklist,
            local_eval: Box::new(LocalEvaluator),
            context_eval: Box::new(ContextEvaluator),
            hyper,
        }
    }

    // --- State access (persistence, stats) ---

    pub fn hyper(&self) -> &Hyper {
        &self.hyper
    }

    pub fn table(&self) -> &TokenTable {
        &self.table
    }

    pub fn forward(&self) -> &TransitionGraph {
        &self.forward
    }

    pub fn backward(&self) -> &TransitionGraph {
        &self.backward
    }

    pub fn blacklist(&self) -> &HashSet<String> {
        &self.blacklist
    }

    /// Swap in real relevance evaluators (both default to uniform weight).
    pub fn set_evaluators(&mut self, local: Box<dyn Evaluator>, context: Box<dyn Evaluator>) {
        self.local_eval = local;
        self.context_eval = context;
    }

    // --- Hyperparameter setters ---

    pub fn set_order(&mut self, order: usize) {
        self.hyper.order = order.max(1);
        self.forward.set_order(self.hyper.order);
        self.backward.set_order(self.hyper.order);
    }

    pub fn set_weights(&mut self, starting_weight: f64, weight_increase: f64) {
        self.hyper.starting_weight = starting_weight;
        self.hyper.weight_increase = weight_increase;
        self.forward.set_weights(starting_weight, weight_increase);
        self.backward.set_weights(starting_weight, weight_increase);
    }

    pub fn set_dropout(&mut self, policy: Dropout) {
        self.hyper.dropout = policy;
    }

    pub fn set_dropout_curve(&mut self, curve: DropoutCurve) {
        self.hyper.dropout_curve = curve;
    }

    pub fn set_dropout_factor(&mut self, factor: f64) {
        self.hyper.dropout_factor = factor;
    }

    pub fn set_dropout_chance(&mut self, chance: f64) {
        self.hyper.dropout_chance = chance;
    }

    pub fn set_context_bias(&mut self, bias: f64) {
        self.hyper.context_bias = bias.clamp(0.0, 1.0);
    }

    pub fn set_prediction_time_ms(&mut self, ms: u64) {
        self.hyper.prediction_time_ms = ms;
    }

    pub fn set_max_predictions(&mut self, max: usize) {
        self.hyper.max_predictions = max.max(1);
    }

    pub fn set_message_buffer(&mut self, capacity: usize) {
        self.hyper.message_buffer = capacity.max(1);
        self.context.set_capacity(self.hyper.message_buffer);
    }

    // --- Blacklist ---

    pub fn blacklist_add(&mut self, name: &str) {
        self.blacklist.insert(name.to_lowercase());
    }

    pub fn blacklist_remove(&mut self, name: &str) {
        self.blacklist.remove(&name.to_lowercase());
    }

    // --- Training ---

    /// Learn from a message without replying: tokenize, record in the
    /// conversation buffer, train both graphs, evict.
    pub fn observe(&mut self, text: &str, key: &str, rng: &mut impl Rng) -> Result<()> {
        let ids = translate(&mut self.table, text);
        if ids.is_empty() {
            return Ok(());
        }
        self.context.push(key, ids.clone());
        self.train(&ids, rng);
        Ok(())
    }

    /// Feed the forward graph the sequence and the backward graph its
    /// reverse, then evict both with the observed reference semantics:
    /// `dropout_factor` as the victim fraction, `dropout_chance` as the
    /// weight threshold, on every training step.
    fn train(&mut self, ids: &[TokenId], rng: &mut impl Rng) {
        self.forward.feed(ids);
        let reversed: Vec<TokenId> = ids.iter().rev().copied().collect();
        self.backward.feed(&reversed);

        let h = &self.hyper;
        self.forward
            .evict(h.dropout, h.dropout_curve, h.dropout_factor, h.dropout_chance, rng);
        self.backward
            .evict(h.dropout, h.dropout_curve, h.dropout_factor, h.dropout_chance, rng);
    }

    // --- Generation ---

    /// Build a full sequence around one seed token: a forward tail from its
    /// node, then a backward head grown from the reversed leading window.
    pub fn generate_around(&self, seed: TokenId, rng: &mut impl Rng) -> Result<Vec<TokenId>> {
        let seed_name = self.table.get(seed).map(|t| t.name.clone())?;
        let node = self
            .forward
            .find_node(&[seed])
            .map_err(|_| CoreError::NoPath(seed_name.clone()))?;
        let tail = self.forward.generate_sequence(Some(node), rng);

        // The head must agree with the first order-1 continuation values
        let keep = (self.hyper.order - 1).min(tail.len());
        let mut window: Vec<TokenId> = Vec::with_capacity(keep + 1);
        window.push(seed);
        window.extend_from_slice(&tail[..keep]);
        window.reverse();

        let back_node = self
            .backward
            .find_node(&window)
            .map_err(|_| CoreError::NoPath(seed_name))?;
        let mut head = self.backward.generate_sequence(Some(back_node), rng);
        head.reverse();

        let mut out = head;
        out.push(seed);
        out.extend_from_slice(&tail);
        Ok(out)
    }

    /// Generate a reply: search for candidates around seed tokens drawn from
    /// the input, score them, pick one, then learn from the input.
    ///
    /// The search loop is a polled wall-clock timer — one attempt, check
    /// elapsed, loop — bounded by `prediction_time_ms` and `max_predictions`.
    pub fn respond(&mut self, text: &str, key: &str, rng: &mut impl Rng) -> Result<String> {
        let input_ids = translate(&mut self.table, text);

        let mut pool = self.seed_pool(&input_ids);
        let budget = Duration::from_millis(self.hyper.prediction_time_ms);
        let started = Instant::now();
        let mut candidates: Vec<Vec<TokenId>> = Vec::new();

        loop {
            if pool.is_empty() {
                pool.push(self.table.random(rng)?.id);
            }
            let idx = rng.random_range(0..pool.len());
            match self.generate_around(pool[idx], rng) {
                Ok(ids) => candidates.push(ids),
                Err(_) => {
                    pool.swap_remove(idx);
                }
            }
            if candidates.len() >= self.hyper.max_predictions || started.elapsed() >= budget {
                break;
            }
        }

        // Train on the input whether or not the search produced anything —
        // the first message a fresh model ever sees always lands here with
        // an unanswerable graph, and it still has to be learned.
        let result = self.pick_reply(candidates, key, rng);
        if !input_ids.is_empty() {
            self.train(&input_ids, rng);
        }
        result
    }

    /// Candidate seeds: input tokens that are words or links, not tagged as
    /// pronouns, not blacklisted. Deduplicated, input order.
    fn seed_pool(&self, input_ids: &[TokenId]) -> Vec<TokenId> {
        let mut seen = HashSet::new();
        input_ids
            .iter()
            .copied()
            .filter(|&id| seen.insert(id))
            .filter(|&id| match self.table.get(id) {
                Ok(t) => {
                    matches!(t.class, TokenClass::Word | TokenClass::Link)
                        && t.tag != WordTag::Pronoun
                        && !self.blacklist.contains(&t.name.to_lowercase())
                }
                Err(_) => false,
            })
            .collect()
    }

    fn pick_reply(
        &self,
        candidates: Vec<Vec<TokenId>>,
        key: &str,
        rng: &mut impl Rng,
    ) -> Result<String> {
        if candidates.is_empty() {
            return Err(CoreError::NoCandidates);
        }
        let scored: Vec<(Vec<TokenId>, f64)> = candidates
            .into_iter()
            .map(|ids| {
                let local = self.local_eval.score(&ids, &self.context, key);
                let conversation = self.context_eval.score(&ids, &self.context, key);
                let score = blend(local, conversation, self.hyper.context_bias);
                (ids, score)
            })
            .collect();
        let choice = select(&scored, rng).ok_or(CoreError::NoCandidates)?;
        render(&self.table, choice)
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new(Hyper::default())
    }
}
