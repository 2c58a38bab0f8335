use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Entries retained per grid size.
pub const MAX_PER_GRID: usize = 10;

/// One finished game, as pushed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub score: u64,
    pub grid_size: u8,
    /// Unix seconds at game over.
    pub date: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<f32>,
    pub max_tile: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum ScoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed score file: {0}")]
    Format(#[from] serde_json::Error),
}

/// Where finished games get pushed. The game controller fires one record per
/// game over and ignores everything but logging the error, so an
/// implementation is free to fail without consequence to play.
pub trait ScoreSink: Send + Sync {
    fn record(&self, entry: &ScoreEntry) -> Result<(), ScoreError>;
}

/// High-score table with the retention policy applied on every insert:
/// entries sort by score descending and only the top [`MAX_PER_GRID`]
/// survive per grid size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBook {
    entries: Vec<ScoreEntry>,
}

impl ScoreBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ScoreEntry) {
        self.entries.push(entry);
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
        let mut kept = HashMap::new();
        self.entries.retain(|e| {
            let count = kept.entry(e.grid_size).or_insert(0usize);
            *count += 1;
            *count <= MAX_PER_GRID
        });
    }

    /// All entries, best first.
    pub fn all(&self) -> &[ScoreEntry] {
        &self.entries
    }

    /// Entries for one grid size, best first.
    pub fn for_grid_size(&self, grid_size: u8) -> Vec<&ScoreEntry> {
        self.entries
            .iter()
            .filter(|e| e.grid_size == grid_size)
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// File-backed score book: one JSON document at a fixed path.
///
/// A missing file reads as an empty book; parent directories are created on
/// save.
pub struct JsonScoreStore {
    path: PathBuf,
}

impl JsonScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<ScoreBook, ScoreError> {
        if !self.path.exists() {
            return Ok(ScoreBook::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, book: &ScoreBook) -> Result<(), ScoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(book)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl ScoreSink for JsonScoreStore {
    fn record(&self, entry: &ScoreEntry) -> Result<(), ScoreError> {
        let mut book = self.load()?;
        book.insert(entry.clone());
        self.save(&book)
    }
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: u64, grid_size: u8) -> ScoreEntry {
        ScoreEntry {
            score,
            grid_size,
            date: 1_700_000_000,
            duration_s: Some(12.5),
            max_tile: 256,
        }
    }

    #[test]
    fn insert_keeps_entries_sorted_by_score() {
        let mut book = ScoreBook::new();
        book.insert(entry(10, 4));
        book.insert(entry(30, 4));
        book.insert(entry(20, 4));
        let scores: Vec<u64> = book.all().iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![30, 20, 10]);
    }

    #[test]
    fn retention_is_per_grid_size() {
        let mut book = ScoreBook::new();
        for score in 0..15 {
            book.insert(entry(score, 4));
        }
        for score in 0..3 {
            book.insert(entry(score, 5));
        }
        assert_eq!(book.for_grid_size(4).len(), MAX_PER_GRID);
        assert_eq!(book.for_grid_size(5).len(), 3);
        assert_eq!(book.len(), MAX_PER_GRID + 3);
        // The survivors on the crowded grid are the highest scores.
        assert_eq!(book.for_grid_size(4)[0].score, 14);
        assert_eq!(book.for_grid_size(4)[MAX_PER_GRID - 1].score, 5);
    }

    #[test]
    fn clear_empties_the_book() {
        let mut book = ScoreBook::new();
        book.insert(entry(10, 4));
        book.clear();
        assert!(book.is_empty());
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonScoreStore::new(dir.path().join("scores.json"));
        let book = store.load().unwrap();
        assert!(book.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonScoreStore::new(dir.path().join("nested").join("scores.json"));
        let mut book = ScoreBook::new();
        book.insert(entry(42, 4));
        book.insert(entry(7, 5));
        store.save(&book).unwrap();
        assert_eq!(store.load().unwrap(), book);
    }

    #[test]
    fn record_accumulates_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonScoreStore::new(dir.path().join("scores.json"));
        store.record(&entry(5, 4)).unwrap();
        store.record(&entry(9, 4)).unwrap();
        let book = store.load().unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.all()[0].score, 9);
    }

    #[test]
    fn malformed_file_reports_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonScoreStore::new(path);
        assert!(matches!(store.load(), Err(ScoreError::Format(_))));
    }
}
