//! Snapshot persistence for registry collections.
//!
//! A snapshot is one file per collection under the configured data directory,
//! `<data_dir>/<collection>.json` or `<data_dir>/<collection>.yaml`, holding
//! an envelope of the form:
//!
//! ```json
//! { "collection": "patients", "records": [ ... ] }
//! ```
//!
//! Files are replaced atomically: the new contents are written to a sibling
//! temporary file which is then renamed over the target. A crash mid-write
//! leaves the previous snapshot intact.

use crate::error::{ConfigError, SnapshotError, SnapshotResult};
use crate::validation::validate_collection_name;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// On-disk encoding of snapshot files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SnapshotFormat {
    #[default]
    Json,
    Yaml,
}

impl SnapshotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SnapshotFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "yaml" | "yml" => Ok(SnapshotFormat::Yaml),
            other => Err(ConfigError::InvalidInput(format!(
                "unknown snapshot format '{other}' (expected json or yaml)"
            ))),
        }
    }
}

/// Result of the snapshot write that follows a successful registry mutation.
///
/// The mutation itself has already been committed when any of these is
/// returned. `Degraded` means the in-memory state is ahead of the file.
#[derive(Debug)]
pub enum SnapshotStatus {
    /// The registry has no snapshot store bound.
    NotBound,
    /// A store is bound but auto-persistence is disabled.
    Deferred,
    Saved,
    Degraded(SnapshotError),
}

impl SnapshotStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SnapshotStatus::Degraded(_))
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, R> {
    collection: &'a str,
    records: &'a [R],
}

#[derive(Deserialize)]
struct Envelope {
    collection: String,
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

/// Reads and writes collection snapshots under one directory.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    format: SnapshotFormat,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, format: SnapshotFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Path of the snapshot file for `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::InvalidCollection`] if the name is not safe
    /// to use as a file stem.
    pub fn path_for(&self, collection: &str) -> SnapshotResult<PathBuf> {
        validate_collection_name(collection)?;
        Ok(self
            .dir
            .join(format!("{collection}.{}", self.format.extension())))
    }

    /// Whether a snapshot for `collection` exists on disk.
    pub fn exists(&self, collection: &str) -> SnapshotResult<bool> {
        Ok(self.path_for(collection)?.is_file())
    }

    /// Writes the full contents of a collection, replacing any previous snapshot.
    ///
    /// The data directory is created on first use.
    ///
    /// # Arguments
    ///
    /// * `collection` - Collection name; becomes the file stem.
    /// * `records` - Every record of the collection, in the order they should
    ///   appear in the file.
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` if:
    /// - the collection name is invalid,
    /// - the records cannot be encoded,
    /// - the directory, temporary file or rename fails.
    pub fn save<R: Serialize>(&self, collection: &str, records: &[R]) -> SnapshotResult<()> {
        let path = self.path_for(collection)?;
        let envelope = EnvelopeRef {
            collection,
            records,
        };
        let encoded = match self.format {
            SnapshotFormat::Json => serde_json::to_string_pretty(&envelope)
                .map_err(|e| SnapshotError::Encode(e.to_string()))?,
            SnapshotFormat::Yaml => serde_yaml::to_string(&envelope)
                .map_err(|e| SnapshotError::Encode(e.to_string()))?,
        };

        fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let tmp = path.with_extension(format!("{}.tmp", self.format.extension()));
        write_synced(&tmp, encoded.as_bytes()).map_err(|source| SnapshotError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            SnapshotError::Io {
                path: path.clone(),
                source,
            }
        })?;

        tracing::debug!(collection, records = records.len(), path = %path.display(), "snapshot written");
        Ok(())
    }

    /// Reads a collection snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot exists yet. Entries that cannot be
    /// decoded as `R` are skipped with a warning so that one damaged record
    /// does not hide the rest of the collection; callers are expected to
    /// re-validate what is returned.
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` if the file cannot be read, is not a valid
    /// envelope, or belongs to a different collection.
    pub fn load<R: DeserializeOwned>(&self, collection: &str) -> SnapshotResult<Option<Vec<R>>> {
        let path = self.path_for(collection)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };

        let envelope: Envelope = match self.format {
            SnapshotFormat::Json => {
                let de = &mut serde_json::Deserializer::from_str(&contents);
                serde_path_to_error::deserialize(de).map_err(|e| decode_error(&path, e))?
            }
            SnapshotFormat::Yaml => {
                let de = serde_yaml::Deserializer::from_str(&contents);
                serde_path_to_error::deserialize(de).map_err(|e| decode_error(&path, e))?
            }
        };

        if envelope.collection != collection {
            return Err(SnapshotError::CollectionMismatch {
                expected: collection.to_owned(),
                found: envelope.collection,
            });
        }

        let mut records = Vec::with_capacity(envelope.records.len());
        for (index, value) in envelope.records.into_iter().enumerate() {
            let decoded: Result<R, _> = serde_path_to_error::deserialize(value);
            match decoded {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        collection,
                        index,
                        location = %location_of(e.path()),
                        error = %e.inner(),
                        "skipping undecodable snapshot record"
                    );
                }
            }
        }
        Ok(Some(records))
    }

    /// Renames the snapshot of `collection` to `<collection>.<ext>.corrupt`
    /// so the next save does not overwrite it.
    ///
    /// Returns the new path, or `None` when there is no snapshot to move. A
    /// previous `.corrupt` file for the same collection is replaced.
    pub fn set_aside(&self, collection: &str) -> SnapshotResult<Option<PathBuf>> {
        let path = self.path_for(collection)?;
        if !path.is_file() {
            return Ok(None);
        }
        let target = path.with_extension(format!("{}.corrupt", self.format.extension()));
        fs::rename(&path, &target).map_err(|source| SnapshotError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(target))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn location_of(path: &serde_path_to_error::Path) -> String {
    let rendered = path.to_string();
    if rendered.is_empty() || rendered == "." {
        "<root>".to_string()
    } else {
        rendered
    }
}

fn decode_error<E: fmt::Display>(path: &Path, e: serde_path_to_error::Error<E>) -> SnapshotError {
    SnapshotError::Decode {
        path: path.to_path_buf(),
        location: location_of(e.path()),
        message: e.inner().to_string(),
    }
}
