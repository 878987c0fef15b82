#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A terminator run (`.`, `!`, `?`) closes a sentence; the leading part may be empty
/// so that every character of the input lands in exactly one sentence.
static SENTENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]*[.!?]+").expect("sentence pattern is valid"));

/// Rough number of PDF chunks that share one page at the default chunk size
const CHUNKS_PER_PDF_PAGE: usize = 5;

/// Represents a chunk of a source document ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// The chunk text, trimmed
    pub content: String,
    /// File name of the source document
    pub document_name: String,
    /// Full path of the source document
    pub source_path: PathBuf,
    /// The index of this chunk within the document
    pub chunk_index: usize,
    /// 1-based page estimate
    pub estimated_page_number: u32,
}

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Split text into sentences, keeping terminators attached.
///
/// Text after the last terminator becomes a final sentence of its own, and text
/// with no terminator at all is returned as a single sentence.
#[inline]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut consumed = 0;

    for found in SENTENCE_PATTERN.find_iter(text) {
        match found {
            Ok(m) => {
                sentences.push(m.as_str());
                consumed = m.end();
            }
            Err(e) => {
                warn!("Sentence matching aborted: {}", e);
                break;
            }
        }
    }

    if let Some(rest) = text.get(consumed..) {
        if !rest.is_empty() {
            sentences.push(rest);
        }
    }

    sentences
}

/// Greedily pack sentences into chunks of roughly `chunk_size` characters.
///
/// When the next sentence would overflow the buffer, the buffer is closed as a
/// trimmed chunk and a new one is seeded with its last `chunk_overlap` characters.
/// Sentences are never split, so a single sentence longer than `chunk_size`
/// produces an oversized chunk.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if buffer_len + sentence_len > config.chunk_size {
            if buffer_len > 0 {
                push_chunk(&mut chunks, &buffer);
            }

            let overlap = tail_chars(&buffer, config.chunk_overlap).to_string();
            buffer_len = overlap.chars().count();
            buffer = overlap;
        }

        buffer.push_str(sentence);
        buffer_len += sentence_len;
    }

    if buffer_len > 0 {
        push_chunk(&mut chunks, &buffer);
    }

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        text.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    chunks
}

fn push_chunk(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// The last `count` characters of `text`, or all of it when shorter
#[inline]
pub fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    text.char_indices()
        .nth(total - count)
        .and_then(|(start, _)| text.get(start..))
        .unwrap_or(text)
}

/// Chunk one document's extracted text and attach its metadata
#[inline]
pub fn chunk_document(
    text: &str,
    document_name: &str,
    source_path: PathBuf,
    is_pdf: bool,
    config: &ChunkingConfig,
) -> Vec<DocumentChunk> {
    chunk_text(text, config)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, content)| DocumentChunk {
            content,
            document_name: document_name.to_string(),
            source_path: source_path.clone(),
            chunk_index,
            estimated_page_number: estimate_page_number(chunk_index, is_pdf),
        })
        .collect()
}

/// PDFs are assumed to hold a fixed number of chunks per page; other formats are one page
#[inline]
pub fn estimate_page_number(chunk_index: usize, is_pdf: bool) -> u32 {
    if is_pdf {
        u32::try_from(chunk_index / CHUNKS_PER_PDF_PAGE + 1).unwrap_or(u32::MAX)
    } else {
        1
    }
}

/// Estimate token count as one token per four characters, rounded up
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
