//! Token estimation shared by every budgeted component
//!
//! Chunk sizes, provider input limits, retrieval budgets and the prompt window
//! are all measured with the same [`TokenCounter`] so that the limits compose.
//! The default [`UnicodeTokenCounter`] approximates subword tokenizers: each
//! Unicode word or punctuation mark is a token, and long words are split into
//! pieces of at most [`MAX_TOKEN_CHARS`] characters.

use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;

/// Longest run of characters counted as a single token
pub const MAX_TOKEN_CHARS: usize = 12;

/// Counts tokens and reports their byte spans
pub trait TokenCounter: Send + Sync {
    /// Byte ranges of each token in `text`, in order, never overlapping
    fn token_spans(&self, text: &str) -> Vec<Range<usize>>;

    /// Number of tokens in `text`
    fn count(&self, text: &str) -> usize {
        self.token_spans(text).len()
    }
}

/// Word-boundary token estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeTokenCounter;

impl TokenCounter for UnicodeTokenCounter {
    fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans = Vec::new();

        for (start, word) in text.split_word_bound_indices() {
            if word.trim().is_empty() {
                continue;
            }

            let mut piece_start = start;
            let mut chars_in_piece = 0usize;
            for (offset, _) in word.char_indices() {
                if chars_in_piece == MAX_TOKEN_CHARS {
                    spans.push(piece_start..start + offset);
                    piece_start = start + offset;
                    chars_in_piece = 0;
                }
                chars_in_piece += 1;
            }
            spans.push(piece_start..start + word.len());
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_words_and_punctuation() {
        let counter = UnicodeTokenCounter;
        assert_eq!(counter.count("Hello, world!"), 4);
        assert_eq!(counter.count("   \n\t "), 0);
    }

    #[test]
    fn test_long_words_are_split() {
        let counter = UnicodeTokenCounter;
        let word = "a".repeat(30);
        let spans = counter.token_spans(&word);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0], 0..12);
        assert_eq!(spans[2], 24..30);
    }

    #[test]
    fn test_spans_are_valid_slices() {
        let counter = UnicodeTokenCounter;
        let text = "Photosynthèse convertit la lumière — énergie chimique.";
        for span in counter.token_spans(text) {
            assert!(!text[span].trim().is_empty());
        }
    }
}
