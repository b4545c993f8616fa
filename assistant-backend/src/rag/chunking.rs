//! Text splitting for document ingestion.
//!
//! The recursive splitter tries separators in priority order: it splits on
//! the first separator present in the text, keeps pieces that fit, and
//! recurses into oversized pieces with the remaining separators. Fitting
//! pieces are then merged back up to `chunk_size` with `chunk_overlap`
//! characters carried from one chunk into the next. Lengths are counted in
//! characters, not bytes.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::loader::PageText;

const RECURSIVE_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " ", ""];
const SEMANTIC_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOKEN_CHUNK_SIZE: usize = 512;
pub const DEFAULT_TOKEN_CHUNK_OVERLAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Paragraph, line, sentence, clause, word, then character boundaries
    #[default]
    Recursive,
    /// Whitespace tokens
    Token,
    /// Paragraph, line, sentence and word boundaries only
    Semantic,
}

impl ChunkingStrategy {
    /// (chunk_size, chunk_overlap) used when nothing is configured
    pub fn default_sizes(&self) -> (usize, usize) {
        match self {
            ChunkingStrategy::Token => (DEFAULT_TOKEN_CHUNK_SIZE, DEFAULT_TOKEN_CHUNK_OVERLAP),
            _ => (DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP),
        }
    }
}

/// One piece of a document ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub source: String,
    pub page: Option<i64>,
    /// Position within the whole document, across pages
    pub chunk_index: i64,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    strategy: ChunkingStrategy,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(strategy: ChunkingStrategy, chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            strategy,
            chunk_size,
            // Overlap must leave room for progress
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split every page, numbering chunks across the whole document
    pub fn split_pages(&self, pages: &[PageText]) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for content in self.split_text(&page.content) {
                chunks.push(TextChunk {
                    content,
                    source: page.source.clone(),
                    page: page.page,
                    chunk_index: chunks.len() as i64,
                });
            }
        }
        log::info!(
            "[RAG] Created {} chunks from {} pages ({} strategy, size={}, overlap={})",
            chunks.len(),
            pages.len(),
            self.strategy.as_ref(),
            self.chunk_size,
            self.chunk_overlap
        );
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        match self.strategy {
            ChunkingStrategy::Recursive => self.split_recursive(text, RECURSIVE_SEPARATORS),
            ChunkingStrategy::Semantic => self.split_recursive(text, SEMANTIC_SEPARATORS),
            ChunkingStrategy::Token => self.split_tokens(text),
        }
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();

        let (separator, remaining) = pick_separator(text, separators);
        let pieces = split_keeping_separator(text, separator);

        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    /// Greedily join pieces up to `chunk_size`, keeping a tail of up to
    /// `chunk_overlap` characters as the start of the next chunk
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut out, &window.concat());
                while !window.is_empty()
                    && (total > self.chunk_overlap || total + len > self.chunk_size)
                {
                    total -= char_len(window[0]);
                    window.remove(0);
                }
            }
            window.push(piece.as_str());
            total += len;
        }
        if !window.is_empty() {
            push_trimmed(&mut out, &window.concat());
        }
        out
    }

    fn split_tokens(&self, text: &str) -> Vec<String> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut out = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(tokens.len());
            out.push(tokens[start..end].join(" "));
            if end == tokens.len() {
                break;
            }
            start += step;
        }
        out
    }
}

/// First separator that occurs in `text`, plus the finer separators after it
fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return ("", &[]);
        }
        if text.contains(sep) {
            return (*sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split so that every piece after the first starts with its separator;
/// an empty separator splits into characters
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(text[start..idx].to_string());
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}

fn push_trimmed(out: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(content: &str, page: Option<i64>) -> PageText {
        PageText {
            content: content.to_string(),
            source: "doc.txt".to_string(),
            page,
        }
    }

    #[test]
    fn test_strategy_parses_from_config_names() {
        assert_eq!("semantic".parse::<ChunkingStrategy>().unwrap(), ChunkingStrategy::Semantic);
        assert_eq!(ChunkingStrategy::default(), ChunkingStrategy::Recursive);
        assert_eq!(ChunkingStrategy::Token.default_sizes(), (512, 50));
        assert_eq!(ChunkingStrategy::Recursive.as_ref(), "recursive");
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = Chunker::new(ChunkingStrategy::Recursive, 1000, 200);
        let chunks = chunker.split_text("  A short note about cats.  ");
        assert_eq!(chunks, vec!["A short note about cats.".to_string()]);
    }

    #[test]
    fn test_recursive_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(30);
        let para_b = "b".repeat(30);
        let text = format!("{}\n\n{}", para_a, para_b);

        let chunker = Chunker::new(ChunkingStrategy::Recursive, 40, 0);
        let chunks = chunker.split_text(&text);
        assert_eq!(chunks, vec![para_a, para_b]);
    }

    #[test]
    fn test_separator_starts_the_following_piece() {
        assert_eq!(
            split_keeping_separator("one. two. three", ". "),
            vec!["one", ". two", ". three"]
        );
        assert_eq!(split_keeping_separator("a\nb\n", "\n"), vec!["a", "\nb", "\n"]);
        assert_eq!(split_keeping_separator("\n\nlead", "\n\n"), vec!["\n\nlead"]);
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
    }

    #[test]
    fn test_sentence_separator_leads_next_chunk() {
        let chunker = Chunker::new(ChunkingStrategy::Semantic, 20, 0);
        let chunks = chunker.split_text("Cats purr often. Dogs bark loudly.");
        assert_eq!(chunks, vec!["Cats purr often", ". Dogs bark loudly."]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text = (0..200).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        let chunker = Chunker::new(ChunkingStrategy::Recursive, 100, 20);
        let chunks = chunker.split_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
        // Consecutive chunks share some words
        let last_word_of_first = chunks[0].split(' ').last().unwrap();
        assert!(chunks[1].contains(last_word_of_first));
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(250);
        let chunker = Chunker::new(ChunkingStrategy::Semantic, 100, 0);
        let chunks = chunker.split_text(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), 250);
    }

    #[test]
    fn test_token_strategy_windows() {
        let text = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let chunker = Chunker::new(ChunkingStrategy::Token, 4, 1);
        let chunks = chunker.split_text(&text);
        assert_eq!(chunks, vec!["1 2 3 4", "4 5 6 7", "7 8 9 10"]);
    }

    #[test]
    fn test_split_pages_numbers_across_pages() {
        let chunker = Chunker::new(ChunkingStrategy::Recursive, 1000, 200);
        let chunks = chunker.split_pages(&[page("first page", Some(1)), page("", Some(2)), page("third", Some(3))]);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].page, Some(3));
        assert_eq!(chunks[1].source, "doc.txt");
    }
}
