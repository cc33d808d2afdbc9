//! Push candidate filtering: blacklist, workspace mime types, source-locale paths.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, error, info};

use crate::contract::{Persona, WorkspaceSnapshot};
use crate::error::SyncError;
use crate::session::Session;

/// Compiled `blacklist.sources`. Built once per invocation.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    rules: Vec<Regex>,
}

impl Blacklist {
    /// Compiles every pattern, failing on the first invalid one.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, SyncError> {
        let rules = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|source| SyncError::InvalidBlacklist {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Blacklist { rules })
    }

    pub fn is_blacklisted(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.rules.iter().any(|rule| rule.is_match(&text))
    }

    /// Drops blacklisted paths, keeping the order of the rest.
    pub fn filter(&self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        paths
            .into_iter()
            .filter(|path| {
                let excluded = self.is_blacklisted(path);
                if excluded {
                    info!("file {} is not pushed due to black list", path.display());
                }
                !excluded
            })
            .collect()
    }
}

/// Extensions the workspace accepts. Empty means everything passes.
#[derive(Debug, Clone, Default)]
pub struct MimeWhitelist {
    extensions: HashSet<String>,
}

impl MimeWhitelist {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MimeWhitelist {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_snapshot(snapshot: &WorkspaceSnapshot) -> Self {
        Self::new(snapshot.content_type_extensions.iter().cloned())
    }

    /// Checks the file's last dot-separated segment. Misses bump the skip counter.
    pub fn passes(&self, path: &Path, session: &Session) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parts: Vec<&str> = file_name.split('.').collect();
        let accepted = parts.len() >= 2
            && parts
                .last()
                .is_some_and(|ext| self.extensions.contains(*ext));
        if !accepted {
            info!(
                "[SKIPPED] File '{}' doesn't contain workspace mime type",
                path.display()
            );
            session.record_skipped();
        }
        accepted
    }
}

fn lower_without_extension(relative: &Path) -> String {
    let lower = relative.to_string_lossy().replace('\\', "/").to_lowercase();
    match lower.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => lower,
    }
}

const SEGMENT_BOUNDARIES: &[char] = &['/', '-', '_', '.'];

fn is_boundary(c: Option<char>) -> bool {
    c.map_or(true, |c| SEGMENT_BOUNDARIES.contains(&c))
}

/// `segment` occurs as a whole token: both neighbours are a path edge or a boundary character.
fn carries_segment(path: &str, segment: &str) -> bool {
    path.match_indices(segment).any(|(start, _)| {
        let before = path[..start].chars().next_back();
        let after = path[start + segment.len()..].chars().next();
        is_boundary(before) && is_boundary(after)
    })
}

/// Whether a relative push path names the source locale somewhere.
///
/// Each `-` segment of the persona code, then of its name, must appear as a
/// token delimited by `/`, `-`, `_`, `.` or the ends of the extensionless path.
/// `status/` therefore does not carry `us`, nor `kitchen` carry `en`.
pub fn matches_source_persona(relative: &Path, file_path: &Path, source: &Persona) -> bool {
    debug!(
        file = %file_path.display(),
        relative = %relative.display(),
        "Checking source locale in path"
    );
    let candidate = lower_without_extension(relative);
    let code_segments: Vec<&str> = source.code.split('-').collect();

    let segments: Vec<String> = source
        .code
        .split('-')
        .chain(source.name.split('-'))
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    for segment in &segments {
        if carries_segment(&candidate, segment) {
            return true;
        }
        debug!(relative = %relative.display(), segment = %segment, "Source segment not in path");
    }

    let (folder_hint, file_hint) = match code_segments.first() {
        Some(short) if code_segments.len() > 1 => {
            let code = &source.code;
            (
                format!("/{short}/, /{short}-xxx/, /xxx-{short}/, /{code}/, /{code}-xxx/, /xxx-{code}/"),
                format!("{short}., -{short}., {short}-, {code}., {code}-, -{code}"),
            )
        }
        _ => (String::new(), String::new()),
    };
    info!(
        "[SKIPPED] File path '{}' doesn't contain Source code. For example: {} or in file name {}.",
        file_path.display(),
        folder_hint,
        file_hint
    );
    false
}

/// Source-locale validation for path-aware pushes.
#[derive(Debug, Clone)]
pub struct SourceValidation {
    /// Paths are made relative to this folder before checking.
    pub base: PathBuf,
    pub source: Persona,
}

impl SourceValidation {
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        match path.strip_prefix(&self.base) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => path,
        }
    }
}

/// The three push filters applied in order: blacklist, source path, mime type.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    blacklist: Blacklist,
    mime: MimeWhitelist,
    source: Option<SourceValidation>,
}

impl FilterPipeline {
    pub fn new(blacklist: Blacklist, mime: MimeWhitelist, source: Option<SourceValidation>) -> Self {
        FilterPipeline {
            blacklist,
            mime,
            source,
        }
    }

    /// Keeps the paths that pass every filter. Order is preserved.
    ///
    /// Only mime misses touch the session's skip counter.
    pub fn filter(&self, paths: Vec<PathBuf>, session: &Session) -> Vec<PathBuf> {
        self.blacklist
            .filter(paths)
            .into_iter()
            .filter(|path| match fs::metadata(path) {
                Ok(meta) if meta.is_dir() => false,
                Ok(_) => true,
                Err(e) => {
                    error!(error = ?e, file = %path.display(), "file can't be read");
                    false
                }
            })
            .filter(|path| match &self.source {
                Some(validation) => {
                    matches_source_persona(validation.relative(path), path, &validation.source)
                }
                None => true,
            })
            .filter(|path| self.mime.passes(path, session))
            .collect()
    }
}
