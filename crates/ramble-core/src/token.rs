use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Dense token identifier. Equal to insertion ordinal, never reused.
pub type TokenId = u32;

/// Lexical class of a token, fixed at interning time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Start,
    End,
    Word,
    Separator,
    Link,
}

impl TokenClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenClass::Start => "start",
            TokenClass::End => "end",
            TokenClass::Word => "word",
            TokenClass::Separator => "separator",
            TokenClass::Link => "link",
        }
    }
}

/// Coarse grammatical category. Everything is tagged `Noun` until a real
/// tagger lands; `Pronoun` exists because generation filters on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordTag {
    Noun,
    Pronoun,
}

impl WordTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            WordTag::Noun => "noun",
            WordTag::Pronoun => "pronoun",
        }
    }
}

/// An interned text span. Immutable once created; owned by the [`TokenTable`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub name: String,
    pub class: TokenClass,
    pub tag: WordTag,
    pub id: TokenId,
}

/// Bidirectional name↔token map backed by an arena.
///
/// The arena index IS the token id, so id stability is structural: there is
/// no delete operation, and filtering happens at generation time through the
/// blacklist instead of removal.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenTable {
    tokens: Vec<Token>,
    #[serde(skip)]
    by_name: HashMap<String, TokenId>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create-or-return a token by name. The class and tag of the first
    /// sighting win; later interns of the same name ignore them.
    pub fn intern(&mut self, name: &str, class: TokenClass, tag: WordTag) -> TokenId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.tokens.len() as TokenId;
        self.tokens.push(Token {
            name: name.to_string(),
            class,
            tag,
            id,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, id: TokenId) -> Result<&Token> {
        self.tokens
            .get(id as usize)
            .ok_or_else(|| CoreError::NotFound(format!("token id {id}")))
    }

    pub fn by_name(&self, name: &str) -> Option<&Token> {
        self.by_name.get(name).map(|&id| &self.tokens[id as usize])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Uniformly random token. Fails `Empty` on an empty table.
    pub fn random(&self, rng: &mut impl Rng) -> Result<&Token> {
        if self.tokens.is_empty() {
            return Err(CoreError::Empty);
        }
        let idx = rng.random_range(0..self.tokens.len());
        Ok(&self.tokens[idx])
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    /// Rebuild the name index after deserialization (the index is skipped on
    /// the wire; the arena is the source of truth).
    pub fn rebuild_index(&mut self) {
        self.by_name = self
            .tokens
            .iter()
            .map(|t| (t.name.clone(), t.id))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn test_intern_assigns_dense_ids() {
        let mut table = TokenTable::new();
        let a = table.intern("hello", TokenClass::Word, WordTag::Noun);
        let b = table.intern(" ", TokenClass::Separator, WordTag::Noun);
        let c = table.intern("world", TokenClass::Word, WordTag::Noun);
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_intern_same_name_returns_same_id() {
        let mut table = TokenTable::new();
        let first = table.intern("hello", TokenClass::Word, WordTag::Noun);
        let second = table.intern("hello", TokenClass::Word, WordTag::Noun);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_first_sighting_class_wins() {
        let mut table = TokenTable::new();
        table.intern("x", TokenClass::Word, WordTag::Noun);
        let id = table.intern("x", TokenClass::Link, WordTag::Pronoun);
        let token = table.get(id).unwrap();
        assert_eq!(token.class, TokenClass::Word);
        assert_eq!(token.tag, WordTag::Noun);
    }

    #[test]
    fn test_get_out_of_range() {
        let table = TokenTable::new();
        assert!(matches!(table.get(0), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn test_random_empty_table() {
        let table = TokenTable::new();
        assert_eq!(table.random(&mut rng()).unwrap_err(), CoreError::Empty);
    }

    #[test]
    fn test_random_returns_live_token() {
        let mut table = TokenTable::new();
        table.intern("a", TokenClass::Word, WordTag::Noun);
        table.intern("b", TokenClass::Word, WordTag::Noun);
        let mut rng = rng();
        for _ in 0..10 {
            let t = table.random(&mut rng).unwrap();
            assert!(t.id < 2);
        }
    }

    #[test]
    fn test_contains() {
        let mut table = TokenTable::new();
        table.intern("hello", TokenClass::Word, WordTag::Noun);
        assert!(table.contains("hello"));
        assert!(!table.contains("world"));
    }

    #[test]
    fn test_rebuild_index() {
        let mut table = TokenTable::new();
        table.intern("hello", TokenClass::Word, WordTag::Noun);
        table.by_name.clear();
        table.rebuild_index();
        assert_eq!(table.by_name("hello").unwrap().id, 0);
    }
}
