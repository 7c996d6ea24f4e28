//! Hierarchical text chunker
//!
//! Splits text into units that each fit a provider budget, preferring the
//! largest boundary that fits:
//! 1. Major separators: rule lines, or blank lines when there are no rules
//! 2. Sentence terminator followed by a newline
//! 3. Sentence terminator
//! 4. Whitespace, packing words greedily
//! 5. Grapheme slices, for a single word that alone exceeds the budget
//!
//! Segments are packed greedily, joined by a single space, while the packed
//! cost stays within budget. A segment that alone exceeds the budget is
//! handed to the next level down instead of being packed.

pub mod measure;
pub mod patterns;

use std::ops::Range;
use std::sync::Arc;

use longform_tts_core::{Budget, Unit};
use unicode_segmentation::UnicodeSegmentation;

pub use measure::{
    measurer_for, ByteMeasurer, EstimatedTokenMeasurer, SizeMeasurer, TokenMeasurer,
};
pub use patterns::TextPatterns;

use patterns::{split_after, split_on};

/// Boundary levels below the major split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    SentenceNewline,
    Sentence,
    Word,
    Character,
}

/// Text accumulated into one unit
#[derive(Debug)]
struct Piece {
    text: String,
    cost: usize,
    span: Range<usize>,
}

/// Byte offset of `part` inside `base`; `part` must be a subslice of `base`
fn offset_in(base: &str, part: &str) -> usize {
    (part.as_ptr() as usize).saturating_sub(base.as_ptr() as usize)
}

fn span_of(base: &str, part: &str) -> Range<usize> {
    let start = offset_in(base, part);
    start..start + part.len()
}

/// Splits text into budget-sized units
#[derive(Clone)]
pub struct HierarchicalChunker {
    patterns: Arc<TextPatterns>,
    measurer: Arc<dyn SizeMeasurer>,
}

impl HierarchicalChunker {
    pub fn new(patterns: Arc<TextPatterns>, measurer: Arc<dyn SizeMeasurer>) -> Self {
        Self { patterns, measurer }
    }

    pub fn measurer(&self) -> &Arc<dyn SizeMeasurer> {
        &self.measurer
    }

    pub fn patterns(&self) -> &Arc<TextPatterns> {
        &self.patterns
    }

    pub fn measure(&self, text: &str) -> usize {
        self.measurer.measure(text)
    }

    /// Chunk job input; units are produced at depth 0
    pub fn chunk(&self, text: &str, budget: Budget) -> Vec<Unit> {
        self.chunk_at_depth(text, budget, 0)
    }

    /// Chunk `text` into units tagged with `depth`
    ///
    /// Empty or whitespace-only input yields no units. Spans are byte ranges
    /// into `text`.
    pub fn chunk_at_depth(&self, text: &str, budget: Budget, depth: usize) -> Vec<Unit> {
        if budget.scheme != self.measurer.scheme() {
            tracing::debug!(
                budget = %budget.scheme,
                measurer = %self.measurer.scheme(),
                "budget scheme differs from measurer scheme"
            );
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let limit = budget.limit;
        let mut pieces = Vec::new();
        for part in self.major_parts(trimmed) {
            let cost = self.measurer.measure(part);
            if cost <= limit {
                pieces.push(Piece {
                    text: part.to_string(),
                    cost,
                    span: span_of(text, part),
                });
            } else {
                self.split_level(text, part, Level::SentenceNewline, limit, &mut pieces);
            }
        }

        let pieces = self.enforce_limit(pieces, limit);

        tracing::debug!(
            units = pieces.len(),
            limit,
            scheme = %budget.scheme,
            depth,
            "chunked text"
        );

        pieces
            .into_iter()
            .map(|piece| Unit {
                text: piece.text,
                cost: piece.cost,
                span: piece.span,
                depth,
            })
            .collect()
    }

    /// Rule-line parts if there are several, else blank-line parts if there
    /// are several, else the whole text
    fn major_parts<'a>(&self, text: &'a str) -> Vec<&'a str> {
        for separator in [&self.patterns.rule_separator, &self.patterns.blank_lines] {
            let parts = split_on(separator, text);
            if parts.len() > 1 {
                return parts;
            }
        }
        vec![text]
    }

    fn split_level(
        &self,
        base: &str,
        segment: &str,
        level: Level,
        limit: usize,
        out: &mut Vec<Piece>,
    ) {
        match level {
            Level::SentenceNewline => {
                let parts = split_after(&self.patterns.sentence_newline, segment);
                self.pack(base, parts, Level::Sentence, limit, out);
            }
            Level::Sentence => {
                let parts = split_after(&self.patterns.sentence, segment);
                self.pack(base, parts, Level::Word, limit, out);
            }
            Level::Word => {
                let parts = segment.split_whitespace().collect();
                self.pack(base, parts, Level::Character, limit, out);
            }
            Level::Character => self.slice_word(base, segment, limit, out),
        }
    }

    /// Greedy packing of segments; oversized segments go to `next`
    fn pack(
        &self,
        base: &str,
        segments: Vec<&str>,
        next: Level,
        limit: usize,
        out: &mut Vec<Piece>,
    ) {
        let mut current: Option<Piece> = None;

        for segment in segments {
            let cost = self.measurer.measure(segment);
            if cost > limit {
                out.extend(current.take());
                self.split_level(base, segment, next, limit, out);
                continue;
            }

            let span = span_of(base, segment);
            if let Some(piece) = current.as_mut() {
                let joined = self.measurer.joined_cost(&piece.text, piece.cost, segment);
                if joined <= limit {
                    piece.text.push(' ');
                    piece.text.push_str(segment);
                    piece.cost = joined;
                    piece.span.end = span.end;
                    continue;
                }
            }

            out.extend(current.replace(Piece {
                text: segment.to_string(),
                cost,
                span,
            }));
        }

        out.extend(current);
    }

    /// Slice one word into grapheme runs that fit `limit`
    ///
    /// Runs start at the budget's equivalent character count and shrink by
    /// halves until they fit. A single grapheme over budget is split into
    /// chars; a single char over budget is emitted as-is.
    fn slice_word(&self, base: &str, word: &str, limit: usize, out: &mut Vec<Piece>) {
        let boundaries: Vec<usize> = word.grapheme_indices(true).map(|(i, _)| i).collect();
        self.slice_runs(base, word, &boundaries, limit, out, true);
    }

    fn slice_runs(
        &self,
        base: &str,
        word: &str,
        boundaries: &[usize],
        limit: usize,
        out: &mut Vec<Piece>,
        graphemes: bool,
    ) {
        let count = boundaries.len();
        let initial = limit.saturating_mul(self.measurer.chars_per_cost()).max(1);
        let end_of = |index: usize| boundaries.get(index).copied().unwrap_or(word.len());

        let mut index = 0;
        while index < count {
            let mut take = initial.min(count - index);
            loop {
                let slice = &word[boundaries[index]..end_of(index + take)];
                let cost = self.measurer.measure(slice);
                if cost <= limit || take == 1 {
                    if cost > limit && graphemes && slice.chars().count() > 1 {
                        let chars: Vec<usize> = slice.char_indices().map(|(i, _)| i).collect();
                        self.slice_runs(base, slice, &chars, limit, out, false);
                    } else {
                        if cost > limit {
                            tracing::warn!(cost, limit, "single character exceeds budget");
                        }
                        out.push(Piece {
                            text: slice.to_string(),
                            cost,
                            span: span_of(base, slice),
                        });
                    }
                    index += take;
                    break;
                }
                take = (take / 2).max(1);
            }
        }
    }

    /// Re-slice anything that still measures over budget
    fn enforce_limit(&self, pieces: Vec<Piece>, limit: usize) -> Vec<Piece> {
        let mut checked = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let cost = self.measurer.measure(&piece.text);
            if cost <= limit {
                checked.push(Piece { cost, ..piece });
                continue;
            }

            tracing::debug!(cost, limit, "unit over budget after splitting, slicing");
            let mut sliced = Vec::new();
            self.slice_word(&piece.text, &piece.text, limit, &mut sliced);
            // Spans of the slices are relative to the piece; rebase them
            // proportionally within the piece's source span.
            let source_len = piece.span.len();
            let text_len = piece.text.len().max(1);
            for slice in sliced {
                let start = piece.span.start + slice.span.start * source_len / text_len;
                let end = piece.span.start + slice.span.end * source_len / text_len;
                checked.push(Piece {
                    span: start..end.max(start),
                    ..slice
                });
            }
        }
        checked
    }
}
