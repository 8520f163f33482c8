//! Sliding-window text chunker.
//!
//! Splits extracted document text into overlapping windows of whitespace
//! delimited words. Words stand in for tokens: a window holds at most
//! `window` words, and consecutive windows share `overlap` words.
//!
//! Chunking is pure and deterministic. Text with no words yields no chunks.

use crate::models::Chunk;

/// Default window size in words.
pub const WINDOW_TOKENS: usize = 700;

/// Default number of words shared by consecutive windows.
pub const OVERLAP_TOKENS: usize = 100;

/// Window geometry. `overlap` must be smaller than `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub window: usize,
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            window: WINDOW_TOKENS,
            overlap: OVERLAP_TOKENS,
        }
    }
}

impl ChunkParams {
    fn step(&self) -> usize {
        self.window.saturating_sub(self.overlap).max(1)
    }
}

/// Split text into overlapping word windows.
///
/// Windows start at word 0 and advance by `window - overlap` words. The
/// window that reaches the last word is emitted and ends the sequence, so
/// the final chunk may be shorter than `window`. Indices are contiguous
/// starting at 0.
pub fn chunk_text(document_id: &str, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let window = params.window.max(1);
    let step = params.step();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + window).min(words.len());
        let slice = &words[start..end];
        chunks.push(Chunk {
            document_id: document_id.to_string(),
            chunk_index: chunks.len() as i64,
            text: slice.join(" "),
            token_count: slice.len() as i64,
        });
        if end == words.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Number of chunks [`chunk_text`] produces for `words` words.
pub fn expected_chunk_count(words: usize, params: &ChunkParams) -> usize {
    if words == 0 {
        return 0;
    }
    if words <= params.window {
        return 1;
    }
    let step = params.step();
    (words - params.overlap).div_ceil(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn tokens(chunk: &Chunk) -> Vec<&str> {
        chunk.text.split(' ').collect()
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let params = ChunkParams::default();
        assert!(chunk_text("doc1", "", &params).is_empty());
        assert!(chunk_text("doc1", " \n\t  ", &params).is_empty());
    }

    #[test]
    fn test_single_word() {
        let chunks = chunk_text("doc1", "hello", &ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "hello");
        assert_eq!(chunks[0].token_count, 1);
        assert_eq!(chunks[0].document_id, "doc1");
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let chunks = chunk_text("doc1", "  alpha\n\nbeta\t gamma  ", &ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "alpha beta gamma");
        assert_eq!(chunks[0].token_count, 3);
    }

    #[test]
    fn test_exactly_one_window() {
        let chunks = chunk_text("doc1", &words(700), &ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].token_count, 700);
    }

    #[test]
    fn test_one_word_past_window() {
        let chunks = chunk_text("doc1", &words(701), &ChunkParams::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].token_count, 700);
        assert_eq!(chunks[1].token_count, 101);
        assert_eq!(tokens(&chunks[1])[0], "w600");
        assert_eq!(*tokens(&chunks[1]).last().unwrap(), "w700");
    }

    #[test]
    fn test_1300_words_two_chunks() {
        let chunks = chunk_text("doc1", &words(1300), &ChunkParams::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].token_count, 700);
        assert_eq!(chunks[1].token_count, 700);
    }

    #[test]
    fn test_1500_words_three_chunks() {
        let chunks = chunk_text("doc1", &words(1500), &ChunkParams::default());
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].token_count, 300);
        assert_eq!(tokens(&chunks[2])[0], "w1200");
    }

    #[test]
    fn test_count_matches_formula() {
        let params = ChunkParams::default();
        for n in [1, 2, 99, 100, 101, 699, 700, 701, 1299, 1300, 1301, 1900, 2800, 5000] {
            let chunks = chunk_text("doc1", &words(n), &params);
            assert_eq!(chunks.len(), expected_chunk_count(n, &params), "n = {}", n);
            if n > 700 {
                assert_eq!(chunks.len(), (n - 100).div_ceil(600), "n = {}", n);
            } else {
                assert_eq!(chunks.len(), 1, "n = {}", n);
            }
        }
    }

    #[test]
    fn test_indices_contiguous() {
        let chunks = chunk_text("doc1", &words(4000), &ChunkParams::default());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_overlap_region_is_shared() {
        let chunks = chunk_text("doc1", &words(2500), &ChunkParams::default());
        for pair in chunks.windows(2) {
            let a = tokens(&pair[0]);
            let b = tokens(&pair[1]);
            assert_eq!(&a[a.len() - 100..], &b[..100]);
        }
    }

    #[test]
    fn test_last_word_always_covered() {
        for n in [701, 1234, 3333] {
            let chunks = chunk_text("doc1", &words(n), &ChunkParams::default());
            let last = chunks.last().unwrap();
            assert_eq!(*tokens(last).last().unwrap(), format!("w{}", n - 1));
        }
    }

    #[test]
    fn test_custom_params() {
        let params = ChunkParams {
            window: 5,
            overlap: 2,
        };
        let chunks = chunk_text("doc1", "a b c d e f g h", &params);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b c d e", "d e f g h"]);
    }

    #[test]
    fn test_deterministic() {
        let text = words(3000);
        let c1 = chunk_text("doc1", &text, &ChunkParams::default());
        let c2 = chunk_text("doc1", &text, &ChunkParams::default());
        assert_eq!(c1, c2);
    }

    proptest! {
        #[test]
        fn prop_default_windows_follow_closed_form(n in 0usize..3000) {
            let chunks = chunk_text("d", &words(n), &ChunkParams::default());
            let expected = match n {
                0 => 0,
                1..=700 => 1,
                _ => (n - 100).div_ceil(600),
            };
            prop_assert_eq!(chunks.len(), expected);

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.chunk_index, i as i64);
            }
            for pair in chunks.windows(2) {
                let left = tokens(&pair[0]);
                let right = tokens(&pair[1]);
                prop_assert_eq!(&left[left.len() - 100..], &right[..100]);
            }
        }

        #[test]
        fn prop_any_geometry_covers_every_word(
            n in 0usize..400,
            window in 1usize..40,
            overlap_seed in 0usize..40,
        ) {
            let params = ChunkParams { window, overlap: overlap_seed % window };
            let chunks = chunk_text("d", &words(n), &params);

            prop_assert_eq!(chunks.len(), expected_chunk_count(n, &params));
            prop_assert!(chunks.iter().all(|c| c.token_count as usize <= window));
            prop_assert!(chunks.iter().all(|c| c.token_count as usize == tokens(c).len()));
            if let Some(last) = chunks.last() {
                let last_word = format!("w{}", n - 1);
                prop_assert_eq!(tokens(last).last().copied(), Some(last_word.as_str()));
            }
        }
    }
}
