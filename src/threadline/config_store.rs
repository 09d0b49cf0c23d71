//! File-per-record JSON persistence.
//!
//! A [`ConfigStore`] is one directory. Every record is written to its own file whose name
//! encodes the identifiers needed to find it again (resource id, parent ids, timestamps),
//! and lookups are a linear scan over file names followed by loading the candidates.
//!
//! ```text
//! config/
//!   asst_abc123_Resume Helper.json
//!   thread_xyz789_1700000000_asst_abc123_1.json
//!   file-def456_asst_abc123.json
//! ```
//!
//! There is no index, so lookup cost grows with the number of files in the directory.
//! There is no locking either: writes are atomic (temporary file plus rename), but two
//! processes racing to create the same logical record can both succeed. Such duplicates
//! are reported by [`ConfigStore::find_unique`] as [`StoreError::Duplicate`] instead of
//! silently picking one.
//!
//! # Example
//!
//! ```rust,no_run
//! use threadline::config_store::ConfigStore;
//! use threadline::records::UploadedFileRecord;
//!
//! # fn main() -> Result<(), threadline::error::StoreError> {
//! let store = ConfigStore::new("src/review_resume/config");
//! let record = UploadedFileRecord {
//!     id: "file-1".into(),
//!     assistant_id: "asst_1".into(),
//!     original_file_name: "resume.pdf".into(),
//!     created_at: 1_700_000_000,
//! };
//! store.save(&record, &[&record.id, &record.assistant_id])?;
//!
//! let names = store.find(Some("file"), Some("_asst_1.json"))?;
//! let loaded: UploadedFileRecord = store.load(&names[0])?;
//! assert_eq!(loaded, record);
//! # Ok(())
//! # }
//! ```

use crate::threadline::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Separator placed between name parts.
pub const NAME_SEPARATOR: &str = "_";
/// Extension of every record file.
pub const RECORD_EXTENSION: &str = ".json";

/// A directory of JSON records.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name a record saved with `name_parts` ends up in.
    pub fn file_name(name_parts: &[&str]) -> String {
        let joined = name_parts
            .iter()
            .map(|part| sanitize_component(part))
            .collect::<Vec<_>>()
            .join(NAME_SEPARATOR);
        format!("{}{}", joined, RECORD_EXTENSION)
    }

    /// Serialize `record` into the file named by `name_parts`, creating the directory
    /// if needed, and return the written path.
    ///
    /// An existing file with the same name is replaced.
    pub fn save<T: Serialize>(&self, record: &T, name_parts: &[&str]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let json = serde_json::to_vec(record).map_err(StoreError::Serialize)?;
        let path = self.dir.join(Self::file_name(name_parts));
        let tmp_path = self
            .dir
            .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));

        write_file(&tmp_path, &json)
            .and_then(|_| fs::rename(&tmp_path, &path))
            .map_err(|source| {
                let _ = fs::remove_file(&tmp_path);
                StoreError::Io {
                    path: path.clone(),
                    source,
                }
            })?;

        log::debug!("ConfigStore::save(...): wrote {}", path.display());
        Ok(path)
    }

    /// Names of the files starting with `prefix` and ending with `suffix`, sorted.
    ///
    /// `None` places no constraint on that end. A store directory that does not exist
    /// yet simply has no files.
    pub fn find(&self, prefix: Option<&str>, suffix: Option<&str>) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.ends_with(RECORD_EXTENSION) {
                continue;
            }
            if prefix.is_some_and(|p| !name.starts_with(p)) {
                continue;
            }
            if suffix.is_some_and(|s| !name.ends_with(s)) {
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    /// Deserialize the record stored in `file_name`.
    pub fn load<T: DeserializeOwned>(&self, file_name: &str) -> Result<T, StoreError> {
        let path = self.dir.join(file_name);
        let bytes = fs::read(&path).map_err(|source| StoreError::Io { path, source })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            file: file_name.to_string(),
            source,
        })
    }

    /// Load every record whose file name matches `prefix` / `suffix`.
    pub fn list_records<T: DeserializeOwned>(
        &self,
        prefix: Option<&str>,
        suffix: Option<&str>,
    ) -> Result<Vec<T>, StoreError> {
        self.find(prefix, suffix)?
            .iter()
            .map(|name| self.load(name))
            .collect()
    }

    /// Find the single record of `kind` identified by `key`.
    ///
    /// Candidates are narrowed by file name, then loaded and filtered with `predicate`.
    /// No match is `Ok(None)`; more than one match is [`StoreError::Duplicate`].
    pub fn find_unique<T, F>(
        &self,
        kind: &'static str,
        key: &str,
        prefix: Option<&str>,
        suffix: Option<&str>,
        predicate: F,
    ) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let mut matches: Vec<(String, T)> = Vec::new();
        for name in self.find(prefix, suffix)? {
            let record: T = self.load(&name)?;
            if predicate(&record) {
                matches.push((name, record));
            }
        }

        if matches.len() > 1 {
            let files: Vec<String> = matches.into_iter().map(|(name, _)| name).collect();
            log::error!(
                "ConfigStore::find_unique(...): {} '{}' matches {} records in {}",
                kind,
                key,
                files.len(),
                self.dir.display()
            );
            return Err(StoreError::Duplicate {
                kind,
                key: key.to_string(),
                files,
            });
        }

        Ok(matches.pop().map(|(_, record)| record))
    }
}

/// Make `part` safe to embed in a single file name.
///
/// Path separators and characters that are invalid on common filesystems become `-`.
/// Spaces are kept, so `"Resume Helper"` stays readable.
pub fn sanitize_component(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
