//! Paragraph-boundary text chunker with overlap.
//!
//! Splits document body text into [`Chunk`]s that respect the configured
//! `chunk_size` (approximate tokens) and carry `chunk_overlap` tokens of
//! trailing context from the previous chunk into the next one. Splitting
//! occurs on paragraph boundaries (`\n\n`) to preserve semantic coherence.
//!
//! Each chunk gets a SHA-256 hash of its text for staleness detection when
//! embeddings are refreshed.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunks on paragraph boundaries.
///
/// `chunk_size` and `chunk_overlap` are in approximate tokens; the config
/// layer guarantees `chunk_overlap < chunk_size`. Returns chunks with
/// contiguous indices starting at 0; always at least one chunk.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<Chunk> {
    let max_chars = chunk_size.max(1) * CHARS_PER_TOKEN;
    let overlap_chars = chunk_overlap * CHARS_PER_TOKEN;

    if text.trim().is_empty() {
        return vec![make_chunk(document_id, 0, text.trim())];
    }

    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let mut chunks = Vec::new();
    let mut current_buf = String::new();
    let mut chunk_index: i64 = 0;

    for para in paragraphs {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        // If adding this paragraph would exceed max, flush current buffer
        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len() // +2 for \n\n separator
        };

        if would_be > max_chars && !current_buf.is_empty() {
            let carry = tail_overlap(&current_buf, overlap_chars);
            chunks.push(make_chunk(document_id, chunk_index, &current_buf));
            chunk_index += 1;
            current_buf = carry;
        }

        // A single paragraph larger than max gets hard-split
        if trimmed.len() > max_chars {
            if !current_buf.is_empty() {
                chunks.push(make_chunk(document_id, chunk_index, &current_buf));
                chunk_index += 1;
                current_buf.clear();
            }
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = prev_char_boundary(remaining, remaining.len().min(max_chars));
                // Prefer a newline or space boundary when splitting mid-paragraph
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                let piece = &remaining[..actual_split];
                chunks.push(make_chunk(document_id, chunk_index, piece.trim()));
                chunk_index += 1;

                if actual_split >= remaining.len() {
                    break;
                }
                // Step back by the overlap so consecutive pieces share context,
                // but always make forward progress.
                let step = if actual_split > overlap_chars {
                    actual_split - overlap_chars
                } else {
                    actual_split
                };
                remaining = &remaining[next_char_boundary(remaining, step.max(1))..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    // Flush remaining, but not if it is nothing beyond carried overlap that
    // was already emitted with the previous chunk
    if !current_buf.trim().is_empty() && (chunks.is_empty() || !ends_with_buf(&chunks, &current_buf))
    {
        chunks.push(make_chunk(document_id, chunk_index, &current_buf));
    }

    if chunks.is_empty() {
        chunks.push(make_chunk(document_id, 0, text.trim()));
    }

    chunks
}

/// True when the trailing buffer is exactly the overlap carried out of the
/// last emitted chunk (nothing new was appended after the flush).
fn ends_with_buf(chunks: &[Chunk], buf: &str) -> bool {
    chunks
        .last()
        .map(|c| c.text.ends_with(buf))
        .unwrap_or(false)
}

/// Take the trailing `overlap_chars` of `text` to seed the next chunk,
/// starting at a word boundary where possible.
fn tail_overlap(text: &str, overlap_chars: usize) -> String {
    if overlap_chars == 0 || text.is_empty() {
        return String::new();
    }
    if text.len() <= overlap_chars {
        return text.to_string();
    }
    let start = next_char_boundary(text, text.len() - overlap_chars);
    let tail = &text[start..];
    // Drop a leading partial word
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim_start().to_string(),
        None => tail.to_string(),
    }
}

fn prev_char_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn next_char_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
