//! Self-trained conversational text generator.
//!
//! Interns text into a token table, trains a pair of n-order weighted
//! transition graphs (forward and backward) online, prunes them with
//! decay-plus-eviction policies, and synthesizes replies by weighted random
//! traversal around a seed token.
//!
//! Zero I/O — pure logic with no opinions about transport or persistence.
//! Single-threaded by contract: callers serialize access.

pub mod context;
pub mod dropout;
pub mod error;
pub mod graph;
pub mod model;
pub mod score;
pub mod token;
pub mod tokenizer;

pub use context::ConversationContext;
pub use dropout::{Dropout, DropoutCurve};
pub use error::{CoreError, Result};
pub use graph::{GraphEdge, GraphNode, MAX_WALK_STEPS, NodeId, SENTINEL, TransitionGraph};
pub use model::{Hyper, Model};
pub use score::{ContextEvaluator, Evaluator, LocalEvaluator};
pub use token::{Token, TokenClass, TokenId, TokenTable, WordTag};
pub use tokenizer::{Span, render, scan, translate};
