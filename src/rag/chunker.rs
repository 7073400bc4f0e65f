//! Overlapping character-window chunking.

use serde::{Deserialize, Serialize};

use super::loader::SourceDocument;
use crate::core::config::IngestConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 20,
        }
    }
}

impl From<&IngestConfig> for ChunkerConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

/// A piece of one page, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub source_path: String,
    pub page_number: u32,
    /// Chunk index within the page
    pub sequence_index: usize,
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// `chunk_overlap < chunk_size` is enforced by config validation.
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn chunk_documents(&self, documents: &[SourceDocument]) -> Vec<TextChunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk_document(doc))
            .collect()
    }

    pub fn chunk_document(&self, document: &SourceDocument) -> Vec<TextChunk> {
        self.split_into_chunks(&document.raw_text)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| TextChunk {
                text,
                source_path: document.source_path.clone(),
                page_number: document.page_number,
                sequence_index,
            })
            .collect()
    }

    /// Split text into windows of at most `chunk_size` characters. Each window
    /// after the first starts `chunk_overlap` characters before the previous cut.
    fn split_into_chunks(&self, text: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap.min(chunk_size - 1);

        let mut chunks = Vec::new();
        if text.trim().is_empty() {
            return chunks;
        }

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut start = 0;

        loop {
            let end = (start + chunk_size).min(total_chars);
            let cut = if end < total_chars {
                // The cut must leave room for progress after stepping back by the overlap.
                let lowest = start + (chunk_size / 2).max(overlap + 1);
                find_boundary(&chars, lowest, end)
            } else {
                end
            };

            let chunk_text: String = chars[start..cut].iter().collect();
            if !chunk_text.trim().is_empty() {
                chunks.push(chunk_text);
            }

            if cut >= total_chars {
                break;
            }
            start = cut - overlap;
        }

        chunks
    }
}

/// Best exclusive cut position in `lowest..=end`, falling back to `end`.
fn find_boundary(chars: &[char], lowest: usize, end: usize) -> usize {
    if lowest > end {
        return end;
    }

    let paragraph = |p: usize| p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n';
    let line = |p: usize| chars[p - 1] == '\n';
    let sentence = |p: usize| {
        matches!(chars[p - 1], '.' | '!' | '?')
            && chars.get(p).map(|c| c.is_whitespace()).unwrap_or(false)
    };
    let space = |p: usize| chars[p - 1].is_whitespace();

    let rules: [&dyn Fn(usize) -> bool; 4] = [&paragraph, &line, &sentence, &space];
    for rule in rules {
        if let Some(p) = (lowest.max(1)..=end).rev().find(|&p| rule(p)) {
            return p;
        }
    }

    end
}
