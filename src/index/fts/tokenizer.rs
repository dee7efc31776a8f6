//! Splits text on the separator class and drives each substring through the
//! filter pipeline, accumulating a token multiset.

use crate::error::Result;
use crate::index::fts::filters::FilterPipeline;

/// A token produced by the tokenizer: the (post-filter) text, how many times
/// it occurred in the current text, and, after resolution against the term
/// table, the id of the term it resolved to.
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub count: u32,
    pub term_id: Option<u32>,
}

/// Unique-by-text collection of tokens produced from one piece of text.
#[derive(Debug, Default)]
pub struct TokenSet {
    tokens: Vec<Token>,
    by_text: std::collections::HashMap<String, usize>,
    seen_count: u64,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `text`, deduplicating by the post-filter
    /// text and incrementing its count.
    pub fn record(&mut self, text: String) {
        if let Some(&idx) = self.by_text.get(&text) {
            self.tokens[idx].count += 1;
        } else {
            let idx = self.tokens.len();
            self.by_text.insert(text.clone(), idx);
            self.tokens.push(Token {
                text,
                count: 1,
                term_id: None,
            });
        }
        self.seen_count += 1;
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    pub fn unique_count(&self) -> usize {
        self.tokens.len()
    }

    /// Seen count, i.e. total token occurrences including duplicates.
    pub fn seen_count(&self) -> u64 {
        self.seen_count
    }

    pub fn total_text_bytes(&self) -> usize {
        self.tokens.iter().map(|t| t.text.len()).sum()
    }

    /// Tokens not yet resolved to a term id.
    pub fn staged(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.term_id.is_none())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, ',' | '.' | ';' | ':' | '|' | ' ' | '\t' | '\n')
}

/// `tokenize(pipeline, text) -> token_set`, splitting `text` on the
/// separator class `[,.;:| \t\n]` and running each non-empty substring
/// through the filter pipeline.
pub fn tokenize(pipeline: &FilterPipeline, text: &str) -> Result<TokenSet> {
    let mut set = TokenSet::new();
    for piece in text.split(is_separator) {
        if piece.is_empty() {
            continue;
        }
        let mut buf = piece.to_string();
        match pipeline.apply(&mut buf)? {
            crate::index::fts::filters::FilterOutcome::Mutated => set.record(buf),
            crate::index::fts::filters::FilterOutcome::Dropped => {}
        }
    }
    Ok(set)
}
