use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::types::GameSummary;

const TABLE_CAP: usize = 100;
const FILE_VERSION: u8 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredScoreEntry {
    pub name: String,
    pub score: i32,
    #[serde(rename = "levelReached", alias = "level_reached")]
    pub level_reached: u32,
    #[serde(rename = "durationMs", alias = "duration_ms")]
    pub duration_ms: u64,
    #[serde(rename = "dotsEaten", alias = "dots_eaten")]
    pub dots_eaten: i32,
    #[serde(rename = "ghostsEaten", alias = "ghosts_eaten")]
    pub ghosts_eaten: i32,
    #[serde(rename = "achievedAtMs", alias = "achieved_at_ms")]
    pub achieved_at_ms: u64,
}

impl StoredScoreEntry {
    /// Entries re-read from disk may have been edited by hand; drop anything
    /// that no longer looks like a real result.
    fn cleaned(mut self) -> Option<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() || self.score < 0 || self.level_reached == 0 {
            return None;
        }
        self.dots_eaten = self.dots_eaten.max(0);
        self.ghosts_eaten = self.ghosts_eaten.max(0);
        Some(self)
    }
}

fn rank_ordering(a: &StoredScoreEntry, b: &StoredScoreEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(b.level_reached.cmp(&a.level_reached))
        .then(a.duration_ms.cmp(&b.duration_ms))
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

#[derive(Serialize)]
struct TableOnDisk<'a> {
    version: u8,
    entries: &'a [StoredScoreEntry],
}

#[derive(Deserialize)]
struct TableFromDisk {
    version: u8,
    entries: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreboardResponse {
    #[serde(rename = "generatedAtIso")]
    pub generated_at_iso: String,
    pub entries: Vec<StoredScoreEntry>,
}

/// High-score table persisted as a single JSON file, loaded once at startup
/// and rewritten after every finished game.
pub struct ScoreStore {
    path: PathBuf,
    entries: Vec<StoredScoreEntry>,
}

impl ScoreStore {
    pub fn new(path: PathBuf) -> Self {
        let entries = read_table(&path);
        Self { path, entries }
    }

    pub fn record_game(&mut self, name: &str, summary: &GameSummary) {
        let candidate = StoredScoreEntry {
            name: name.to_string(),
            score: summary.score,
            level_reached: summary.level_reached,
            duration_ms: summary.duration_ms,
            dots_eaten: summary.dots_eaten,
            ghosts_eaten: summary.ghosts_eaten,
            achieved_at_ms: wall_clock_ms(),
        };
        let Some(entry) = candidate.cleaned() else {
            return;
        };
        self.entries.push(entry);
        self.entries.sort_by(rank_ordering);
        self.entries.truncate(TABLE_CAP);
        self.persist();
    }

    pub fn build_response(&self, requested_limit: Option<usize>) -> ScoreboardResponse {
        let limit = requested_limit.unwrap_or(10).clamp(1, TABLE_CAP);
        ScoreboardResponse {
            generated_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            entries: self.entries.iter().take(limit).cloned().collect(),
        }
    }

    fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                complain(&self.path, &format!("create parent dir: {error}"));
                return;
            }
        }
        let table = TableOnDisk {
            version: FILE_VERSION,
            entries: &self.entries,
        };
        let text = match serde_json::to_string_pretty(&table) {
            Ok(text) => text,
            Err(error) => {
                complain(&self.path, &format!("serialize table: {error}"));
                return;
            }
        };
        if let Err(error) = fs::write(&self.path, text) {
            complain(&self.path, &format!("write table: {error}"));
        }
    }
}

fn read_table(path: &Path) -> Vec<StoredScoreEntry> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                complain(path, &format!("read table: {error}"));
            }
            return Vec::new();
        }
    };
    let table: TableFromDisk = match serde_json::from_str(&text) {
        Ok(table) => table,
        Err(error) => {
            complain(path, &format!("parse table: {error}"));
            return Vec::new();
        }
    };
    if table.version != FILE_VERSION {
        complain(path, &format!("unsupported version {}", table.version));
        return Vec::new();
    }

    // One malformed entry should not wipe the rest of the board.
    let mut entries: Vec<StoredScoreEntry> = table
        .entries
        .into_iter()
        .filter_map(|raw| match serde_json::from_value(raw) {
            Ok(entry) => StoredScoreEntry::cleaned(entry),
            Err(error) => {
                complain(path, &format!("skipping malformed entry: {error}"));
                None
            }
        })
        .collect();
    entries.sort_by(rank_ordering);
    entries.truncate(TABLE_CAP);
    entries
}

fn complain(path: &Path, what: &str) {
    eprintln!("[scores] {}: {what}", path.display());
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
