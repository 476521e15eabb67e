use crate::error::{ReportError, Result};
use crate::models::Dataset;
use crate::parser::ReportParser;
use moka::sync::Cache;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Identity of one version of a report file. A modified file yields a new key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl CacheKey {
    pub fn new(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }

    pub fn for_file(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ReportError::InputAbsent {
                path: path.to_path_buf(),
            },
            _ => ReportError::Io(e),
        })?;
        Ok(Self::new(path, metadata.modified()?))
    }
}

/// Memoizes parsed datasets by file identity and modification time.
///
/// Concurrent misses on one key may both parse; the results are equal, so the
/// later insert simply replaces the earlier one.
#[derive(Clone)]
pub struct DatasetCache {
    entries: Cache<CacheKey, Arc<Dataset>>,
    parser: Arc<ReportParser>,
}

impl DatasetCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::new(capacity),
            parser: Arc::new(ReportParser::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Dataset>> {
        self.entries.get(key)
    }

    /// Returns the cached dataset for `key`, parsing `lines` on a miss.
    pub fn get_or_parse<S: AsRef<str>>(&self, key: CacheKey, lines: &[S]) -> Arc<Dataset> {
        match self.lookup(&key) {
            Some(dataset) => dataset,
            None => self.parse_and_store(key, lines),
        }
    }

    /// Keys on the file's current modification time and reads it only on a miss.
    pub fn get_or_parse_file(&self, path: &Path) -> Result<Arc<Dataset>> {
        let key = CacheKey::for_file(path)?;
        if let Some(dataset) = self.lookup(&key) {
            return Ok(dataset);
        }
        let lines = self.parser.read_lines(path)?;
        Ok(self.parse_and_store(key, &lines))
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<Dataset>> {
        let found = self.entries.get(key);
        match &found {
            Some(_) => debug!(path = %key.path.display(), "dataset cache hit"),
            None => debug!(path = %key.path.display(), "dataset cache miss"),
        }
        found
    }

    fn parse_and_store<S: AsRef<str>>(&self, key: CacheKey, lines: &[S]) -> Arc<Dataset> {
        let dataset = Arc::new(self.parser.parse_lines(lines));
        self.entries.insert(key, Arc::clone(&dataset));
        dataset
    }

    pub fn evict(&self, key: &CacheKey) {
        self.entries.invalidate(key);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new(64)
    }
}
