use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::token::{TokenClass, TokenId, TokenTable, WordTag};

static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://\S+").unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w']+").unwrap());
static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s\p{P}\p{S}]+").unwrap());

/// Classified lexical span. Priority is LINK > WORD > SEPARATOR; anything
/// left over is a single-character `Mismatch` the caller rejects or skips.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Span<'a> {
    Link(&'a str),
    Word(&'a str),
    Separator(&'a str),
    Mismatch(char),
}

/// Split text into classified spans. Lossless: the concatenation of all
/// span texts (mismatches included) is the input.
pub fn scan(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(m) = LINK.find(rest) {
            spans.push(Span::Link(&rest[..m.end()]));
            rest = &rest[m.end()..];
        } else if let Some(m) = WORD.find(rest) {
            spans.push(Span::Word(&rest[..m.end()]));
            rest = &rest[m.end()..];
        } else if let Some(m) = SEPARATOR.find(rest) {
            spans.push(Span::Separator(&rest[..m.end()]));
            rest = &rest[m.end()..];
        } else {
            let c = rest.chars().next().unwrap();
            spans.push(Span::Mismatch(c));
            rest = &rest[c.len_utf8()..];
        }
    }

    spans
}

/// Intern every span of `text` into the table and return the id sequence.
/// Words are lowercased; links and separators keep their exact text.
/// Mismatched characters are skipped.
pub fn translate(table: &mut TokenTable, text: &str) -> Vec<TokenId> {
    scan(text)
        .into_iter()
        .filter_map(|span| match span {
            Span::Link(s) => Some(table.intern(s, TokenClass::Link, WordTag::Noun)),
            Span::Word(s) => {
                Some(table.intern(&s.to_lowercase(), TokenClass::Word, WordTag::Noun))
            }
            Span::Separator(s) => Some(table.intern(s, TokenClass::Separator, WordTag::Noun)),
            Span::Mismatch(_) => None,
        })
        .collect()
}

/// Concatenate token names verbatim. Whitespace survives only where it was
/// tokenized as a separator.
pub fn render(table: &TokenTable, ids: &[TokenId]) -> Result<String> {
    let mut out = String::new();
    for &id in ids {
        out.push_str(&table.get(id)?.name);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_scan_words_and_separators() {
        let spans = scan("hello world");
        assert_eq!(
            spans,
            vec![
                Span::Word("hello"),
                Span::Separator(" "),
                Span::Word("world"),
            ]
        );
    }

    #[test]
    fn test_scan_link_priority_over_word() {
        let spans = scan("see https://example.com/a?b=1 now");
        assert_eq!(spans[2], Span::Link("https://example.com/a?b=1"));
    }

    #[test]
    fn test_scan_punctuation_run_is_one_separator() {
        let spans = scan("wait... what?!");
        assert_eq!(
            spans,
            vec![
                Span::Word("wait"),
                Span::Separator("... "),
                Span::Word("what"),
                Span::Separator("?!"),
            ]
        );
    }

    #[test]
    fn test_scan_apostrophe_stays_in_word() {
        let spans = scan("don't");
        assert_eq!(spans, vec![Span::Word("don't")]);
    }

    #[test]
    fn test_scan_empty() {
        assert!(scan("").is_empty());
    }

    #[test]
    fn test_scan_is_lossless() {
        let text = "so... https://a.b/c, right?";
        let rebuilt: String = scan(text)
            .into_iter()
            .map(|s| match s {
                Span::Link(t) | Span::Word(t) | Span::Separator(t) => t.to_string(),
                Span::Mismatch(c) => c.to_string(),
            })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_translate_lowercases_words() {
        let mut table = TokenTable::new();
        let ids = translate(&mut table, "Hello WORLD");
        let names: Vec<&str> = ids
            .iter()
            .map(|&id| table.get(id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["hello", " ", "world"]);
    }

    #[test]
    fn test_translate_reuses_interned_ids() {
        let mut table = TokenTable::new();
        let first = translate(&mut table, "hello world");
        let second = translate(&mut table, "hello world");
        assert_eq!(first, second);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_translate_skips_mismatch() {
        let mut table = TokenTable::new();
        // U+0007 is neither word, separator, nor link material
        let ids = translate(&mut table, "a\u{7}b");
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_render_roundtrip() {
        let mut table = TokenTable::new();
        let ids = translate(&mut table, "hello, world");
        assert_eq!(render(&table, &ids).unwrap(), "hello, world");
    }

    #[test]
    fn test_render_unknown_id() {
        let table = TokenTable::new();
        assert!(matches!(render(&table, &[7]), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn test_link_classified_as_link() {
        let mut table = TokenTable::new();
        translate(&mut table, "https://example.com");
        let token = table.by_name("https://example.com").unwrap();
        assert_eq!(token.class, TokenClass::Link);
    }
}
