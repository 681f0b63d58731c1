//! On-disk layout of processed data.
//!
//! Everything lives in one directory:
//!
//! | File | Format |
//! |---|---|
//! | `train_interactions.csv`, `test_interactions.csv` | CSV with header |
//! | `user_mapping.json`, `artist_mapping.json` | flat `{"id": index}` |
//! | `user_item_matrix.bin` | bincode COO triplets + shape |
//! | `preprocessing_stats.json` | [`PreprocessingStats`](super::PreprocessingStats) |

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use super::matrix::{IdMapping, SparseMatrix, Triplets};
use crate::types::ConfidenceInteraction;

pub const TRAIN_FILE: &str = "train_interactions.csv";
pub const TEST_FILE: &str = "test_interactions.csv";
pub const USER_MAPPING_FILE: &str = "user_mapping.json";
pub const ARTIST_MAPPING_FILE: &str = "artist_mapping.json";
pub const MATRIX_FILE: &str = "user_item_matrix.bin";
pub const STATS_FILE: &str = "preprocessing_stats.json";

/// Errors reading or writing a persisted artifact
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid binary artifact {path}: {source}")]
    Bincode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("Corrupt artifact {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, ArtifactError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ArtifactError::io(parent, e))?;
    }
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| ArtifactError::io(path, e))
}

fn open(path: &Path) -> Result<BufReader<File>, ArtifactError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| ArtifactError::io(path, e))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    serde_json::to_writer_pretty(create(path)?, value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    serde_json::from_reader(open(path)?).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    bincode::serialize_into(create(path)?, value).map_err(|source| ArtifactError::Bincode {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    bincode::deserialize_from(open(path)?).map_err(|source| ArtifactError::Bincode {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_interactions(path: &Path, rows: &[ConfidenceInteraction]) -> Result<(), ArtifactError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    for row in rows {
        writer.serialize(row).map_err(|e| ArtifactError::csv(path, e))?;
    }
    writer
        .flush()
        .map_err(|e| ArtifactError::io(path, e))?;
    info!(path = %path.display(), rows = rows.len(), "Saved interactions");
    Ok(())
}

pub fn load_interactions(path: &Path) -> Result<Vec<ConfidenceInteraction>, ArtifactError> {
    let mut reader = csv::Reader::from_reader(open(path)?);
    reader
        .deserialize()
        .collect::<Result<Vec<ConfidenceInteraction>, _>>()
        .map_err(|e| ArtifactError::csv(path, e))
}

pub fn save_mapping(path: &Path, mapping: &IdMapping) -> Result<(), ArtifactError> {
    write_json(path, &mapping.to_map())
}

pub fn load_mapping(path: &Path) -> Result<IdMapping, ArtifactError> {
    let map: HashMap<String, usize> = read_json(path)?;
    IdMapping::from_map(map).ok_or_else(|| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        reason: "indices are not a contiguous range starting at 0".to_string(),
    })
}

pub fn save_matrix(path: &Path, matrix: &SparseMatrix) -> Result<(), ArtifactError> {
    write_bincode(path, &matrix.to_triplets())
}

pub fn load_matrix(path: &Path) -> Result<SparseMatrix, ArtifactError> {
    let triplets: Triplets = read_bincode(path)?;
    if triplets.row.len() != triplets.col.len() || triplets.row.len() != triplets.value.len() {
        return Err(ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: "triplet columns differ in length".to_string(),
        });
    }
    SparseMatrix::from_coo(&triplets).map_err(|e| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Everything the trainer and the serving layer read back
#[derive(Debug, Clone)]
pub struct ProcessedData {
    pub train: Vec<ConfidenceInteraction>,
    pub test: Vec<ConfidenceInteraction>,
    pub users: IdMapping,
    pub artists: IdMapping,
    pub matrix: SparseMatrix,
}

impl ProcessedData {
    /// Write every artifact except the statistics file into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), ArtifactError> {
        save_interactions(&dir.join(TRAIN_FILE), &self.train)?;
        save_interactions(&dir.join(TEST_FILE), &self.test)?;
        save_mapping(&dir.join(USER_MAPPING_FILE), &self.users)?;
        save_mapping(&dir.join(ARTIST_MAPPING_FILE), &self.artists)?;
        save_matrix(&dir.join(MATRIX_FILE), &self.matrix)?;
        info!(dir = %dir.display(), "Saved processed data");
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let data = Self {
            train: load_interactions(&dir.join(TRAIN_FILE))?,
            test: load_interactions(&dir.join(TEST_FILE))?,
            users: load_mapping(&dir.join(USER_MAPPING_FILE))?,
            artists: load_mapping(&dir.join(ARTIST_MAPPING_FILE))?,
            matrix: load_matrix(&dir.join(MATRIX_FILE))?,
        };

        let expected = (data.users.len(), data.artists.len());
        if data.matrix.shape() != expected {
            return Err(ArtifactError::Corrupt {
                path: dir.join(MATRIX_FILE),
                reason: format!(
                    "matrix shape {:?} does not match mappings {:?}",
                    data.matrix.shape(),
                    expected
                ),
            });
        }

        info!(
            dir = %dir.display(),
            train = data.train.len(),
            test = data.test.len(),
            users = data.users.len(),
            artists = data.artists.len(),
            "Loaded processed data"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::matrix::{build_mappings, build_matrix};
    use tempfile::TempDir;

    fn row(user: &str, artist: &str, plays: u64, mbid: Option<&str>) -> ConfidenceInteraction {
        ConfidenceInteraction {
            user_id: user.to_string(),
            artist_name: artist.to_string(),
            artist_mbid: mbid.map(ToString::to_string),
            play_count: plays,
            confidence: 1.0 + 40.0 * plays as f64,
            preference: 1,
        }
    }

    fn sample() -> ProcessedData {
        let train = vec![
            row("u1", "radiohead", 3, Some("a74b1b7f")),
            row("u2", "bon iver", 1, None),
        ];
        let test = vec![row("u1", "bon iver", 2, None)];
        let mut all = train.clone();
        all.extend(test.iter().cloned());
        let (users, artists) = build_mappings(&all);
        let matrix = build_matrix(&train, &users, &artists).unwrap();
        ProcessedData {
            train,
            test,
            users,
            artists,
            matrix,
        }
    }

    #[test]
    fn test_processed_data_round_trip() {
        let dir = TempDir::new().unwrap();
        let data = sample();
        data.save(dir.path()).unwrap();

        let loaded = ProcessedData::load(dir.path()).unwrap();
        assert_eq!(loaded.train, data.train);
        assert_eq!(loaded.test, data.test);
        assert_eq!(loaded.users, data.users);
        assert_eq!(loaded.artists, data.artists);
        assert_eq!(loaded.matrix, data.matrix);
    }

    #[test]
    fn test_interactions_csv_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TRAIN_FILE);
        save_interactions(&path, &sample().train).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "user_id,artist_name,artist_mbid,play_count,confidence,preference"
        );
    }

    #[test]
    fn test_mapping_file_is_flat_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(USER_MAPPING_FILE);
        save_mapping(&path, &sample().users).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["u1"], 0);
        assert_eq!(value["u2"], 1);
    }

    #[test]
    fn test_load_missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ProcessedData::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }

    #[test]
    fn test_load_rejects_non_contiguous_mapping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ARTIST_MAPPING_FILE);
        std::fs::write(&path, r#"{"a": 0, "b": 5}"#).unwrap();
        let err = load_mapping(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Corrupt { .. }));
    }
}
