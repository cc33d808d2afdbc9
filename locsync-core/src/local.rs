//! Local filesystem access: the app home cache, file discovery, reads and writes.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::SyncError;

pub const APP_HOME_DIR: &str = ".locsync";

/// Cached responses older than this are ignored.
pub const INVALIDATION_PERIOD: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone)]
pub struct Local {
    home: PathBuf,
}

impl Local {
    /// Uses `~/.locsync` as the app home.
    pub fn from_user_home() -> Result<Self, SyncError> {
        let home = dirs::home_dir().ok_or_else(|| {
            error!("error occurred on home dir retrieval");
            SyncError::Config("home directory could not be determined".into())
        })?;
        Ok(Local {
            home: home.join(APP_HOME_DIR),
        })
    }

    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Local { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Writes `body` to `<home>/<file_name>`, replacing any previous copy atomically.
    pub fn put_in_home(&self, file_name: &str, body: &[u8]) -> Result<PathBuf, SyncError> {
        fs::create_dir_all(&self.home).map_err(|e| {
            error!(error = ?e, path = %self.home.display(), "Failed to create app home");
            e
        })?;
        let target = self.home.join(file_name);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.home)?;
        tmp.write_all(body)?;
        tmp.persist(&target).map_err(|e| {
            error!(error = ?e.error, path = %target.display(), "Failed to persist cache file");
            e.error
        })?;
        debug!(path = %target.display(), bytes = body.len(), "Stored file in app home");
        Ok(target)
    }

    /// Returns the cached file and its modification time if it exists and is younger than `ttl`.
    pub fn load_cached(&self, file_name: &str, ttl: Duration) -> Option<(Vec<u8>, SystemTime)> {
        let path = self.home.join(file_name);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > ttl {
            debug!(path = %path.display(), age_secs = age.as_secs(), "Cached file is outdated");
            return None;
        }
        match fs::read(&path) {
            Ok(bytes) => Some((bytes, modified)),
            Err(e) => {
                error!(error = ?e, path = %path.display(), "problem on cached file read");
                None
            }
        }
    }
}

pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Writes `body` to `path`, creating parent directories.
pub fn write_file(path: &Path, body: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}

/// Expands `pattern` (a path or glob) into absolute file paths.
///
/// Directories are walked one level deep, or fully when `recursive`.
pub fn files_in_folder(pattern: &str, recursive: bool) -> Vec<PathBuf> {
    let matches: Vec<PathBuf> = match glob::glob(pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            info!(pattern, error = %e, "err occurred on files add");
            return Vec::new();
        }
    };
    if matches.is_empty() {
        let shown = std::path::absolute(pattern).unwrap_or_else(|_| PathBuf::from(pattern));
        info!("No files were found for {}", shown.display());
        return Vec::new();
    }

    let mut found = BTreeSet::new();
    for matched in matches {
        let walker = WalkDir::new(&matched).max_depth(if recursive { usize::MAX } else { 1 });
        for entry in walker.into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() {
                match std::path::absolute(entry.path()) {
                    Ok(abs) => {
                        found.insert(abs);
                    }
                    Err(e) => debug!(error = ?e, path = %entry.path().display(), "Skipping path"),
                }
            }
        }
    }
    found.into_iter().collect()
}
