//! Fixed-size sliding-window chunking.
//!
//! Windows are measured in chars. Each window starts `chunk_size - overlap` chars
//! after the previous one and the last window is cut at the end of the text.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{chunk_id, Chunk};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, chunk_overlap: DEFAULT_CHUNK_OVERLAP }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration("chunk_size must be greater than 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Validated chunker. Cheap to copy and safe to share between threads.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn split(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        // Byte position of every char, plus the end, so windows slice on char boundaries.
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let len = bounds.len() - 1;
        if len == 0 {
            return Vec::new();
        }

        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.config.chunk_size).min(len);
            windows.push((start, end));
            if end >= len {
                break;
            }
            start += self.config.step();
        }

        let total_chunks = windows.len();
        windows
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| Chunk {
                id: chunk_id(source_id, start),
                text: text[bounds[start]..bounds[end]].to_string(),
                source_id: source_id.to_string(),
                offset: start,
                length: end - start,
                chunk_index,
                total_chunks,
            })
            .collect()
    }
}

/// One-shot split with explicit parameters.
pub fn split(source_id: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(ChunkingConfig { chunk_size, chunk_overlap })?.split(source_id, text))
}

/// Number of chunks `split` produces for a text of `len` chars.
pub fn expected_chunk_count(len: usize, config: ChunkingConfig) -> usize {
    if len == 0 {
        return 0;
    }
    len.saturating_sub(config.chunk_overlap).div_ceil(config.step()).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(split("d", "abc", 0, 0), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(split("d", "abc", 10, 10), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(split("d", "abc", 10, 11), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split("d", "", 10, 2).expect("split").is_empty());
    }

    #[test]
    fn windows_advance_by_step() {
        let chunks = split("d", "abcdefghij", 4, 1).expect("split");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["abcd", "defg", "ghij"]);
        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, [0, 3, 6]);
        assert!(chunks.iter().all(|c| c.total_chunks == 3));
    }

    #[test]
    fn last_window_is_truncated() {
        let chunks = split("d", "abcdefghijk", 4, 1).expect("split");
        let last = chunks.last().expect("last");
        assert_eq!(last.text, "jk");
        assert_eq!(last.offset + last.length, 11);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let text = "Python is a versatile programming language used for web development, data science, and AI.";
        let chunks = split("py", text, 500, 50).expect("split");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        let shorter_than_overlap = split("d", "tiny", 500, 50).expect("split");
        assert_eq!(shorter_than_overlap.len(), 1);
    }

    #[test]
    fn multibyte_text_is_split_on_chars() {
        let chunks = split("d", "héllo wörld ✓✓", 5, 2).expect("split");
        assert_eq!(chunks[0].text, "héllo");
        assert_eq!(chunks[1].text, "lo wö");
        assert_eq!(chunks[1].offset, 3);
    }

    #[test]
    fn count_matches_formula() {
        let config = ChunkingConfig { chunk_size: 7, chunk_overlap: 3 };
        let chunker = Chunker::new(config).expect("chunker");
        for len in 0..60 {
            let text = "x".repeat(len);
            assert_eq!(chunker.split("d", &text).len(), expected_chunk_count(len, config), "len={len}");
        }
    }
}
