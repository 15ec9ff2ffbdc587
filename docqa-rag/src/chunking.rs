//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`]: splits at paragraphs, lines, sentences, then words,
//!   falling back to a hard character cut, and carries an overlap between chunks
//! - [`FixedSizeChunker`]: plain character windows with configurable overlap
//!
//! Sizes and offsets are measured in characters, never bytes, so multi-byte
//! text is never cut inside a code point.

use std::collections::{HashMap, VecDeque};

use crate::document::{Chunk, SourceText};

/// A strategy for splitting extracted text into chunks.
///
/// Chunks carry text and position metadata but no embeddings; the
/// [`VectorIndex`](crate::VectorIndex) embeds them on insertion.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the text is empty or whitespace only. Chunk
    /// start offsets are strictly increasing.
    fn chunk(&self, source: &SourceText) -> Vec<Chunk>;
}

/// Separators tried in order, coarsest first. A piece that is still larger
/// than the chunk size after the last one is cut character by character.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// Splits text hierarchically and merges the pieces into overlapping chunks.
///
/// The text is first cut into contiguous pieces no longer than `chunk_size`
/// characters, preferring the coarsest separator that occurs in it. Pieces
/// are then merged greedily; when a chunk is full, pieces are dropped from
/// its front until at most `chunk_overlap` characters remain, and those
/// remaining pieces open the next chunk.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{RecursiveChunker, SourceText};
///
/// let chunker = RecursiveChunker::new(1000, 200);
/// let chunks = chunker.chunk(&SourceText::new("notes.txt", text));
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: target number of characters shared by consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

/// A contiguous byte range of the source text and its length in characters.
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// Cut `text` (which begins at byte `base` of the source) into pieces of at
/// most `chunk_size` characters.
fn collect_pieces(
    text: &str,
    base: usize,
    chunk_size: usize,
    separators: &[&str],
    out: &mut Vec<Piece>,
) {
    let chars = text.chars().count();
    if chars <= chunk_size {
        if chars > 0 {
            out.push(Piece { start: base, end: base + text.len(), chars });
        }
        return;
    }

    let Some(position) = separators.iter().position(|separator| text.contains(separator)) else {
        for (offset, ch) in text.char_indices() {
            let start = base + offset;
            out.push(Piece { start, end: start + ch.len_utf8(), chars: 1 });
        }
        return;
    };

    let remaining = &separators[position + 1..];
    let mut offset = 0;
    for segment in split_keeping_separator(text, separators[position]) {
        collect_pieces(segment, base + offset, chunk_size, remaining, out);
        offset += segment.len();
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Merge pieces into byte spans of at most `chunk_size` characters with a
/// carried-over tail of at most `chunk_overlap` characters.
fn merge_pieces(pieces: &[Piece], chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut window: VecDeque<Piece> = VecDeque::new();
    let mut total = 0;

    for piece in pieces {
        if total + piece.chars > chunk_size {
            if let (Some(first), Some(last)) = (window.front(), window.back()) {
                spans.push((first.start, last.end));
            }
            while let Some(front) = window.front() {
                if total <= chunk_overlap && total + piece.chars <= chunk_size {
                    break;
                }
                total -= front.chars;
                window.pop_front();
            }
        }
        window.push_back(*piece);
        total += piece.chars;
    }

    if let (Some(first), Some(last)) = (window.front(), window.back()) {
        spans.push((first.start, last.end));
    }

    spans
}

/// Turn byte spans into [`Chunk`]s, skipping whitespace-only spans and
/// translating byte offsets into character offsets.
fn build_chunks(source: &SourceText, spans: Vec<(usize, usize)>) -> Vec<Chunk> {
    let text = &source.text;
    let file_name = source.file_name();
    let mut chunks = Vec::with_capacity(spans.len());
    let mut cursor_byte = 0;
    let mut cursor_char = 0;

    for (start, end) in spans {
        let slice = &text[start..end];
        if slice.trim().is_empty() {
            continue;
        }

        cursor_char += text[cursor_byte..start].chars().count();
        cursor_byte = start;

        let sequence = chunks.len();
        let metadata = HashMap::from([
            ("source".to_string(), source.source_path.clone()),
            ("chunk_index".to_string(), sequence.to_string()),
            ("start_index".to_string(), cursor_char.to_string()),
        ]);

        chunks.push(Chunk {
            id: format!("{file_name}_{sequence}"),
            text: slice.to_string(),
            source_path: source.source_path.clone(),
            start_offset: cursor_char,
            sequence,
            metadata,
        });
    }

    chunks
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, source: &SourceText) -> Vec<Chunk> {
        if source.text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        collect_pieces(&source.text, 0, self.chunk_size, &SEPARATORS, &mut pieces);
        let spans = merge_pieces(&pieces, self.chunk_size, self.chunk_overlap);
        build_chunks(source, spans)
    }
}

/// Splits text into fixed-size character windows with configurable overlap.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50);
/// let chunks = chunker.chunk(&source);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, source: &SourceText) -> Vec<Chunk> {
        if source.text.trim().is_empty() {
            return Vec::new();
        }

        // Byte position of every character, plus the end of the text.
        let text = &source.text;
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_len = boundaries.len() - 1;
        let step = self.chunk_size.saturating_sub(self.chunk_overlap);

        let mut spans = Vec::new();
        let mut start = 0;
        while start < char_len {
            let end = (start + self.chunk_size).min(char_len);
            spans.push((boundaries[start], boundaries[end]));
            if step == 0 || end == char_len {
                break;
            }
            start += step;
        }

        build_chunks(source, spans)
    }
}
