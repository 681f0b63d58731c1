//! Raw log ingestion and text cleaning.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::types::{Interaction, RawInteraction};

/// Errors that can occur while reading the raw log
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read raw log: {0}")]
    Csv(#[from] csv::Error),
}

/// Result of parsing a raw log
#[derive(Debug, Default)]
pub struct RawLog {
    pub rows: Vec<RawInteraction>,
    /// Rows with too few columns or an unparseable play count
    pub malformed: usize,
}

impl RawLog {
    /// Distinct user ids in the raw rows
    pub fn distinct_users(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Distinct non-missing raw artist names
    pub fn distinct_artists(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.artist_name.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Read a tab-separated log from disk.
///
/// Columns are, in order: user id, artist mbid, artist name, play count.
/// There is no header row.
pub fn load_raw_log(path: &Path) -> Result<RawLog, IngestError> {
    info!(path = %path.display(), "Loading raw interaction log");
    let file = std::fs::File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let log = read_raw_log(file)?;
    info!(
        rows = log.rows.len(),
        malformed = log.malformed,
        "Loaded raw interaction log"
    );
    Ok(log)
}

/// Parse a tab-separated log from any reader.
pub fn read_raw_log<R: Read>(reader: R) -> Result<RawLog, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut log = RawLog::default();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        match parse_record(&record) {
            Some(row) => log.rows.push(row),
            None => {
                debug!(line = line + 1, "Skipping malformed row");
                log.malformed += 1;
            }
        }
    }
    Ok(log)
}

fn parse_record(record: &csv::StringRecord) -> Option<RawInteraction> {
    if record.len() < 4 {
        return None;
    }
    let user_id = record.get(0)?.to_string();
    if user_id.is_empty() {
        return None;
    }
    let play_count = record.get(3)?.trim().parse::<u64>().ok()?;

    Some(RawInteraction {
        user_id,
        artist_mbid: non_empty(record.get(1)),
        artist_name: non_empty(record.get(2)),
        play_count,
    })
}

fn non_empty(field: Option<&str>) -> Option<String> {
    field
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string)
}

/// Normalize an artist display name.
///
/// Lowercases and trims, drops every character that is not a word character,
/// whitespace, hyphen or apostrophe, and collapses whitespace runs into a
/// single space.
pub fn normalize_name(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| is_kept_char(*c))
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_kept_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '\'' || c.is_whitespace()
}

/// Outcome of dropping unusable rows and cleaning names
#[derive(Debug, Default)]
pub struct Cleaned {
    pub rows: Vec<Interaction>,
    /// Rows whose name was missing or became empty after normalization
    pub dropped_missing: usize,
}

/// Drop rows without a usable artist name and normalize the rest.
///
/// User ids pass through untouched.
pub fn clean(rows: Vec<RawInteraction>) -> Cleaned {
    let mut cleaned = Cleaned::default();
    let mut missing_mbid = 0usize;

    for row in rows {
        let Some(name) = row.artist_name.as_deref().map(normalize_name) else {
            cleaned.dropped_missing += 1;
            continue;
        };
        if name.is_empty() {
            cleaned.dropped_missing += 1;
            continue;
        }
        if row.artist_mbid.is_none() {
            missing_mbid += 1;
        }
        cleaned.rows.push(Interaction {
            user_id: row.user_id,
            artist_mbid: row.artist_mbid,
            artist_name: name,
            play_count: row.play_count,
        });
    }

    info!(
        dropped = cleaned.dropped_missing,
        kept = cleaned.rows.len(),
        missing_mbid,
        "Dropped rows with missing artist_name"
    );
    cleaned
}
