//! Filesystem-backed object store.
//!
//! Buckets are top-level directories under a configurable storage root; the
//! remaining key segments form the path inside the bucket. There is no
//! separate metadata database: the filesystem is the source of truth, and
//! ETags are recomputed on demand from file content.
//!
//! All writes follow the temp-fsync-rename discipline so a reader never
//! observes a half-written object.

use chrono::{DateTime, SecondsFormat, Utc};
use md5::{Digest, Md5};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A bucket or key segment would escape the storage root.
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result of a successful PUT.
#[derive(Debug)]
pub struct PutResult {
    /// Final path of the written object file.
    pub file_path: PathBuf,
    /// Directory the object landed in; handed to the sync coordinator as
    /// the manifest source hint.
    pub dir_path: PathBuf,
    /// ETag of the stored content.
    pub etag: String,
}

/// One entry of a list-bucket response.
#[derive(Debug)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    /// ISO-8601 UTC timestamp.
    pub last_modified: String,
    pub etag: String,
}

/// Result of a list operation. `is_truncated` is always false: pagination
/// is deliberately unsupported.
#[derive(Debug)]
pub struct ListResult {
    pub bucket: String,
    pub prefix: String,
    pub key_count: usize,
    pub max_keys: u32,
    pub is_truncated: bool,
    pub entries: Vec<ObjectEntry>,
}

/// Every `/`-separated segment must be a plain name: non-empty (which also
/// rejects leading, trailing, and doubled slashes), not `.` or `..`, and
/// free of path separators of its own.
fn valid_segments(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != ".." && !seg.contains('\\'))
}

/// Stores objects as files under a root directory.
pub struct ObjectStore {
    root: PathBuf,
    /// Part size for multipart-style ETags; 0 means whole-file MD5.
    etag_part_size: u64,
}

impl ObjectStore {
    /// Create a store rooted at `root`. The directory (and a `.tmp`
    /// scratch area for atomic writes) is created if absent.
    pub fn new(root: impl Into<PathBuf>, etag_part_size: u64) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(root.join(".tmp"))?;
        Ok(Self {
            root,
            etag_part_size,
        })
    }

    /// Resolve `bucket/key` to an absolute path inside the root.
    ///
    /// The single place path construction happens: the raw strings are
    /// validated segment by segment before any path is built, so absolute
    /// keys and empty segments are caught rather than collapsed away by
    /// path normalization.
    fn resolve(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let relative = if key.is_empty() {
            bucket.to_string()
        } else {
            format!("{bucket}/{key}")
        };
        if !valid_segments(bucket) || (!key.is_empty() && !valid_segments(key)) {
            return Err(StoreError::InvalidPath(relative));
        }
        Ok(self.root.join(relative))
    }

    fn temp_path(&self) -> PathBuf {
        let id = uuid::Uuid::new_v4();
        self.root.join(".tmp").join(format!("tmp-{id}"))
    }

    /// Write an object, creating the bucket and parent directories as
    /// needed. Full overwrite semantics via temp-fsync-rename.
    pub fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<PutResult, StoreError> {
        let final_path = self.resolve(bucket, key)?;

        let parent = final_path
            .parent()
            .ok_or_else(|| StoreError::InvalidPath(format!("{bucket}/{key}")))?
            .to_path_buf();
        std::fs::create_dir_all(&parent)?;

        let tmp_path = self.temp_path();
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &final_path)?;

        let etag = self.etag(&final_path, self.etag_part_size)?;

        Ok(PutResult {
            file_path: final_path,
            dir_path: parent,
            etag,
        })
    }

    /// Read an object's full content.
    pub fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(bucket, key)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(format!("{bucket}/{key}")));
        }
        Ok(std::fs::read(&path)?)
    }

    /// Existence probe. No metadata beyond the boolean.
    pub fn head(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(bucket, key)?;
        Ok(path.is_file())
    }

    /// Enumerate the immediate file entries under `bucket/prefix`.
    ///
    /// The directory is created if absent, so listing an empty prefix
    /// yields an empty result rather than an error. `max_keys` is echoed
    /// in the result but never truncates it.
    pub fn list(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: u32,
    ) -> Result<ListResult, StoreError> {
        let dir = self.resolve(bucket, prefix)?;
        std::fs::create_dir_all(&dir)?;

        let mut entries = Vec::new();
        let mut names: Vec<_> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .collect();
        names.sort_by_key(|e| e.file_name());

        for entry in names {
            let path = entry.path();
            let meta = entry.metadata()?;
            let modified: DateTime<Utc> = meta.modified()?.into();
            entries.push(ObjectEntry {
                key: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
                last_modified: modified.to_rfc3339_opts(SecondsFormat::Millis, true),
                etag: self.etag(&path, self.etag_part_size)?,
            });
        }

        Ok(ListResult {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            key_count: entries.len(),
            max_keys,
            is_truncated: false,
            entries,
        })
    }

    /// Compute an object's ETag from its current content.
    ///
    /// With `part_size_bytes == 0` this is the hex MD5 of the whole file.
    /// Otherwise the file is treated as `floor(size / part_size_bytes)`
    /// fixed-size parts the way AWS derives multipart ETags: MD5 each part,
    /// concatenate the hex digests, MD5 that string, and append
    /// `-<partCount>`. Remainder bytes past the last full part are not a
    /// part of their own.
    ///
    /// Edge rules: an empty file, or a part size at or above the file
    /// size, falls back to the whole-file MD5.
    pub fn etag(&self, path: &Path, part_size_bytes: u64) -> Result<String, StoreError> {
        let data = std::fs::read(path)?;
        let size = data.len() as u64;

        if part_size_bytes == 0 || size == 0 || part_size_bytes >= size {
            return Ok(hex::encode(Md5::digest(&data)));
        }

        let part_count = (size / part_size_bytes) as usize;
        let part_size = part_size_bytes as usize;
        let mut concatenated = String::with_capacity(part_count * 32);
        for i in 0..part_count {
            let chunk = &data[i * part_size..(i + 1) * part_size];
            concatenated.push_str(&hex::encode(Md5::digest(chunk)));
        }
        let composite = hex::encode(Md5::digest(concatenated.as_bytes()));
        Ok(format!("{composite}-{part_count}"))
    }
}

// ── Tests ───────────────────────────────────────────────────────────
