use std::collections::{HashMap, VecDeque};

use crate::token::TokenId;

/// Bounded per-conversation message history, used as a scoring signal.
///
/// Each conversation key owns a ring of the last `capacity` token sequences;
/// pushing at capacity evicts the oldest entry.
#[derive(Clone, Debug, Default)]
pub struct ConversationContext {
    capacity: usize,
    buffers: HashMap<String, VecDeque<Vec<TokenId>>>,
}

impl ConversationContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize every buffer. Shrinking drops the oldest entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        for buffer in self.buffers.values_mut() {
            while buffer.len() > self.capacity {
                buffer.pop_front();
            }
        }
    }

    pub fn push(&mut self, key: &str, ids: Vec<TokenId>) {
        let buffer = self.buffers.entry(key.to_string()).or_default();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(ids);
    }

    /// Oldest-first history for one conversation.
    pub fn history(&self, key: &str) -> impl Iterator<Item = &[TokenId]> {
        self.buffers
            .get(key)
            .into_iter()
            .flat_map(|b| b.iter().map(|ids| ids.as_slice()))
    }

    pub fn len(&self, key: &str) -> usize {
        self.buffers.get(key).map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }
}
