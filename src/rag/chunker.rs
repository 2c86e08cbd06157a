//! Text chunking for document processing (SPEC_FULL.md §4.G).
//!
//! `Recursive` is the default strategy: split on an ordered list of separators
//! (`["\n\n", "\n", ". ", " ", ""]`), recursing into a separator only when the previous one left
//! a piece larger than `size`, and reassembling pieces so each chunk honors `size` as an upper
//! bound while successive chunks share up to `overlap` characters. `Character` remains as a
//! simple fallback utility, as the teacher's chunker keeps alongside its word-aware strategies.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{CoreError, Result};

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkingStrategy {
    #[default]
    Recursive,
    Character,
}

impl FromStr for ChunkingStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "recursive" => Ok(Self::Recursive),
            "character" | "char" | "chars" => Ok(Self::Character),
            other => Err(CoreError::Validation(format!(
                "unknown chunking strategy: {other}. use: recursive, character"
            ))),
        }
    }
}

impl std::fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Recursive => "recursive",
            Self::Character => "character",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    #[serde(default)]
    pub strategy: ChunkingStrategy,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    2500
}

fn default_chunk_overlap() -> usize {
    250
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// A single chunk with its character-offset span in the original text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn with_recursive_chunking(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::new(ChunkerConfig {
            strategy: ChunkingStrategy::Recursive,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunk_with_metadata(text).into_iter().map(|c| c.content).collect()
    }

    pub fn chunk_with_metadata(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        let pieces = match self.config.strategy {
            ChunkingStrategy::Recursive => self.chunk_recursively(text),
            ChunkingStrategy::Character => self.chunk_by_characters(text),
        };
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, (content, start_offset, end_offset))| Chunk {
                index,
                content,
                start_offset,
                end_offset,
            })
            .collect()
    }

    /// Recursively split `text` on [`SEPARATORS`] in order, merging adjacent pieces back
    /// together up to `chunk_size` and carrying `chunk_overlap` characters of suffix into the
    /// next chunk. Deterministic given the same `text` and config.
    fn chunk_recursively(&self, text: &str) -> Vec<(String, usize, usize)> {
        let pieces = split_recursive(text, SEPARATORS, self.config.chunk_size);
        merge_with_overlap(text, &pieces, self.config.chunk_size, self.config.chunk_overlap)
    }

    fn chunk_by_characters(&self, text: &str) -> Vec<(String, usize, usize)> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut chunks = Vec::new();
        let step = self.config.chunk_size.saturating_sub(self.config.chunk_overlap).max(1);
        let mut i = 0;
        while i < chars.len() {
            let end = (i + self.config.chunk_size).min(chars.len());
            let start_byte = chars[i].0;
            let end_byte = chars.get(end).map(|(b, _)| *b).unwrap_or(text.len());
            chunks.push((text[start_byte..end_byte].to_string(), start_byte, end_byte));
            i += step;
        }
        chunks
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }
}

/// Split `text` into a flat, ordered sequence of non-empty spans, each at most `max_size`
/// characters where possible: try the first separator; any resulting span still over `max_size`
/// is recursively split on the next separator. The final separator `""` always terminates the
/// recursion by hard-slicing.
fn split_recursive<'a>(text: &'a str, separators: &[&str], max_size: usize) -> Vec<&'a str> {
    if text.len() <= max_size || separators.is_empty() {
        return vec![text];
    }
    let (sep, rest) = (separators[0], &separators[1..]);
    let pieces: Vec<&str> = if sep.is_empty() {
        // Hard split on char boundaries as the terminal case.
        hard_split(text, max_size)
    } else {
        text.split_inclusive(sep).collect()
    };

    let mut out = Vec::new();
    for piece in pieces {
        if piece.len() > max_size {
            out.extend(split_recursive(piece, rest, max_size));
        } else if !piece.is_empty() {
            out.push(piece);
        }
    }
    out
}

fn hard_split(text: &str, max_size: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    while start < bytes.len() {
        let mut end = (start + max_size).min(bytes.len());
        while end < bytes.len() && !text.is_char_boundary(end) {
            end -= 1;
        }
        out.push(&text[start..end]);
        start = end;
    }
    out
}

/// Greedily pack adjacent pieces into chunks up to `max_size`, then carry the last `overlap`
/// characters of each chunk as the start of the next one.
fn merge_with_overlap(
    original: &str,
    pieces: &[&str],
    max_size: usize,
    overlap: usize,
) -> Vec<(String, usize, usize)> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_start: Option<usize> = None;

    let piece_offset = |piece: &str| -> usize {
        (piece.as_ptr() as usize).saturating_sub(original.as_ptr() as usize)
    };

    for piece in pieces {
        if current.len() + piece.len() > max_size && !current.is_empty() {
            let start = current_start.unwrap_or(0);
            let end = start + current.len();
            chunks.push((std::mem::take(&mut current), start, end));

            let carry_len = overlap.min(chunks.last().unwrap().0.len());
            let carry: String = chunks
                .last()
                .unwrap()
                .0
                .chars()
                .rev()
                .take(carry_len)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            current_start = Some(end - carry.len());
            current = carry;
        }
        if current.is_empty() {
            current_start = Some(piece_offset(piece));
        }
        current.push_str(piece);
    }
    if !current.is_empty() {
        let start = current_start.unwrap_or(0);
        let end = start + current.len();
        chunks.push((current, start, end));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_chunking_respects_size_upper_bound() {
        let chunker = TextChunker::with_recursive_chunking(50, 10);
        let text = "Paragraph one is here.\n\nParagraph two follows with more words to fill space.\n\nAnd a third paragraph.";
        let chunks = chunker.chunk_with_metadata(text);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.content.len() <= 50 + 10, "chunk too large: {:?}", c.content);
        }
    }

    #[test]
    fn recursive_chunking_is_deterministic() {
        let chunker = TextChunker::with_recursive_chunking(100, 20);
        let text = "a b c d e f g h i j k l m n o p q r s t u v w x y z. ".repeat(5);
        let a = chunker.chunk(&text);
        let b = chunker.chunk(&text);
        assert_eq!(a, b);
    }

    #[test]
    fn successive_chunks_share_overlap() {
        let chunker = TextChunker::with_recursive_chunking(40, 10);
        let text = "word ".repeat(40);
        let chunks = chunker.chunk(&text);
        if chunks.len() > 1 {
            let tail_of_first: String = chunks[0].chars().rev().take(5).collect::<Vec<_>>().into_iter().rev().collect();
            assert!(chunks[1].contains(&tail_of_first) || chunks[1].starts_with(&tail_of_first[..1]));
        }
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let chunker = TextChunker::default();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn character_chunking_caps_chunk_length() {
        let chunker = TextChunker::new(ChunkerConfig {
            strategy: ChunkingStrategy::Character,
            chunk_size: 20,
            chunk_overlap: 5,
        });
        let text = "This is a test string that should be chunked by characters.";
        for c in chunker.chunk_with_metadata(text) {
            assert!(c.content.chars().count() <= 20);
        }
    }

    #[test]
    fn strategy_from_str() {
        assert_eq!("recursive".parse::<ChunkingStrategy>().unwrap(), ChunkingStrategy::Recursive);
        assert_eq!("character".parse::<ChunkingStrategy>().unwrap(), ChunkingStrategy::Character);
        assert!("bogus".parse::<ChunkingStrategy>().is_err());
    }

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = ChunkerConfig::default();
        assert_eq!(config.chunk_size, 2500);
        assert_eq!(config.chunk_overlap, 250);
    }
}
