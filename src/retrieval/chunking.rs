//! Chunk boundary strategies for document ingestion.
//!
//! Two strategies are provided and both matter:
//!
//! - Fixed word windows give predictable, boundary-agnostic chunks. Simple, but they can
//!   sever sentences, which is acceptable for dense prose.
//! - Sentence-aware packing keeps complete sentences together and is the better choice for
//!   documents where breaking mid-sentence loses meaning (legal or academic text).
//!
//! The sentence splitter works on runs of `.`, `!`, and `?`. It mis-splits abbreviations
//! ("Dr. Smith" becomes two fragments); that is a known limitation of the heuristic, not a
//! defect to patch silently.

use crate::config::ChunkStrategy;

use super::types::ChunkingError;

/// Word-budgeted chunker with a configurable overlap between adjacent chunks.
///
/// Construction validates the configuration: an overlap at or above the target size would
/// produce a zero-word window step and never terminate, so it is rejected up front.
#[derive(Debug, Clone)]
pub struct Chunker {
    target_size: usize,
    overlap_size: usize,
    overlap_sentence_words: usize,
}

impl Chunker {
    /// Build a chunker from a word budget and overlap.
    ///
    /// `overlap_sentence_words` is the assumed average sentence length used to translate the
    /// word overlap into a sentence count for [`Chunker::split_by_sentence`]. It is a rough
    /// heuristic (20 words per sentence by default upstream), kept tunable rather than baked in.
    pub fn new(
        target_size: usize,
        overlap_size: usize,
        overlap_sentence_words: usize,
    ) -> Result<Self, ChunkingError> {
        if target_size == 0 {
            return Err(ChunkingError::InvalidTargetSize);
        }
        if overlap_size >= target_size {
            return Err(ChunkingError::DegenerateOverlap {
                target_size,
                overlap_size,
            });
        }
        if overlap_sentence_words == 0 {
            return Err(ChunkingError::InvalidSentenceWordEstimate);
        }
        Ok(Self {
            target_size,
            overlap_size,
            overlap_sentence_words,
        })
    }

    /// Split `text` using the requested strategy.
    pub fn split(&self, text: &str, strategy: ChunkStrategy) -> Vec<String> {
        match strategy {
            ChunkStrategy::Fixed => self.split_fixed(text),
            ChunkStrategy::Sentence => self.split_by_sentence(text),
        }
    }

    /// Split text into overlapping fixed-width word windows.
    ///
    /// Window `i` covers words `[i*step, i*step + target_size)` with
    /// `step = target_size - overlap_size`. Words are rejoined with single spaces; the
    /// original whitespace is not preserved. The final window may be shorter than the
    /// target. Empty input yields an empty vector.
    pub fn split_fixed(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        // Guaranteed >= 1 by construction.
        let step = self.target_size - self.overlap_size;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + self.target_size).min(words.len());
            chunks.push(words[start..end].join(" "));
            start += step;
        }
        chunks
    }

    /// Split text into chunks that respect sentence boundaries.
    ///
    /// Sentences accumulate greedily until adding the next one would exceed the word budget
    /// while the current chunk is non-empty; the chunk is then emitted and
    /// `max(1, overlap_size / overlap_sentence_words)` trailing sentences carry over into the
    /// next chunk before the sentence that triggered the split. The final accumulated chunk
    /// is always emitted when non-empty, even if under-sized.
    pub fn split_by_sentence(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Vec::new();
        }

        let carry = (self.overlap_size / self.overlap_sentence_words).max(1);
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut word_count = 0usize;

        for sentence in sentences {
            let sentence_words = count_words(&sentence);
            if word_count + sentence_words > self.target_size && !current.is_empty() {
                chunks.push(current.join(" "));

                let keep_from = current.len().saturating_sub(carry);
                current.drain(..keep_from);
                current.push(sentence);
                word_count = current.iter().map(|s| count_words(s)).sum();
            } else {
                current.push(sentence);
                word_count += sentence_words;
            }
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }
}

/// Split text on runs of sentence-terminator punctuation, dropping empty fragments.
fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
