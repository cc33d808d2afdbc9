//! # template: persona-driven path and file name construction
//!
//! Pure string work, no I/O. Given personas and remote file metadata it
//! computes:
//! - the source-language variants to look for in a stored directory,
//! - the token map (`<language_code>` → `fr-fr`, ...) for a target persona,
//! - the final local path of a downloaded file.
//!
//! Identical inputs always produce identical outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use crate::contract::{FileMetadata, Persona};
use crate::error::SyncError;

pub const ORIGINAL_SUFFIX: &str = "original";

/// Which persona-derived string replaces the source language in a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilePathPattern {
    LanguageCode,
    LanguageLangCode,
    LanguageName,
    LanguageNameCap,
    LanguageNameAllcap,
    LocalCapitalized,
}

impl FilePathPattern {
    pub const ALL: [FilePathPattern; 6] = [
        FilePathPattern::LanguageCode,
        FilePathPattern::LanguageLangCode,
        FilePathPattern::LanguageName,
        FilePathPattern::LanguageNameCap,
        FilePathPattern::LanguageNameAllcap,
        FilePathPattern::LocalCapitalized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilePathPattern::LanguageCode => "language_code",
            FilePathPattern::LanguageLangCode => "language_lang_code",
            FilePathPattern::LanguageName => "language_name",
            FilePathPattern::LanguageNameCap => "language_name_cap",
            FilePathPattern::LanguageNameAllcap => "language_name_allcap",
            FilePathPattern::LocalCapitalized => "local_capitalized",
        }
    }

    /// The `<...>` token used inside `download.target` templates.
    pub fn token(&self) -> String {
        format!("<{}>", self.as_str())
    }
}

impl FromStr for FilePathPattern {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilePathPattern::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SyncError::InvalidFilePathPattern(s.to_string()))
    }
}

/// Resolved `token → substitution` map for one target persona.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPattern {
    tokens: BTreeMap<String, String>,
}

impl PathPattern {
    pub fn get(&self, pattern: FilePathPattern) -> Option<&str> {
        self.tokens.get(&pattern.token()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Replaces every known token occurring in `template`.
    pub fn apply(&self, template: &str) -> String {
        self.tokens
            .iter()
            .fold(template.to_string(), |acc, (token, value)| acc.replace(token, value))
    }

    fn insert(&mut self, pattern: FilePathPattern, value: String) {
        self.tokens.insert(pattern.token(), value);
    }
}

/// What a download task needs from the templating engine for its persona.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    /// Replaces the source-language variant found in a stored directory.
    pub replace_in: String,
    pub tokens: PathPattern,
}

fn split_segments(value: &str) -> Vec<&str> {
    value.split('-').map(str::trim).collect()
}

/// Uppercases the first letter of every whitespace-separated word.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if at_word_start && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }
    out
}

/// Source-language spellings that may appear in a directory name.
///
/// The whole code comes first so `/en-us/` wins over the bare `/en-` prefix,
/// followed by every `-` segment of the code and of the name, each in lower,
/// original and upper case. Duplicates are dropped, order is kept.
pub fn build_variants(persona: &Persona) -> Vec<String> {
    let mut variants: Vec<String> = Vec::new();
    let mut push_cases = |value: &str| {
        for candidate in [value.to_lowercase(), value.to_string(), value.to_uppercase()] {
            if !candidate.is_empty() && !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    };
    let code = persona.code.trim();
    if code.contains('-') {
        push_cases(code);
    }
    for segment in split_segments(&persona.code) {
        push_cases(segment);
    }
    for segment in split_segments(&persona.name) {
        push_cases(segment);
    }
    variants
}

/// Token map and replacement string for `persona`.
///
/// Needs at least two `-` segments in both code and name. Otherwise only
/// `<language_code>` and `<language_lang_code>` are defined and the raw first
/// code segment is used as the replacement.
pub fn substitute(persona: &Persona, pattern: Option<FilePathPattern>) -> Substitution {
    let codes = split_segments(&persona.code);
    let names = split_segments(&persona.name);
    let mut tokens = PathPattern::default();
    let lang_code = codes.first().copied().unwrap_or_default().to_string();

    tokens.insert(FilePathPattern::LanguageCode, persona.code.clone());
    tokens.insert(FilePathPattern::LanguageLangCode, lang_code.clone());

    if codes.len() < 2 || names.len() < 2 {
        debug!(
            code = %persona.code,
            name = %persona.name,
            "Persona cannot be split into code/name segments, using the language code"
        );
        return Substitution {
            replace_in: lang_code,
            tokens,
        };
    }

    let first_name = names[0];
    tokens.insert(FilePathPattern::LanguageName, first_name.to_lowercase());
    tokens.insert(FilePathPattern::LanguageNameCap, title_case(first_name));
    tokens.insert(FilePathPattern::LanguageNameAllcap, first_name.to_uppercase());
    tokens.insert(FilePathPattern::LocalCapitalized, codes[1].to_uppercase());

    let replace_in = pattern
        .and_then(|p| tokens.get(p))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or(lang_code);
    Substitution { replace_in, tokens }
}

/// Rewrites the source language in a stored file path and returns its directory.
///
/// The first variant found as `/v/`, `/v-` or `-v/` is replaced (first
/// occurrence only). Separators are normalised to the platform's.
pub fn rewrite_directory(filepath: &str, source_variants: &[String], replace_in: &str) -> PathBuf {
    let mut rewritten = None;
    'variants: for variant in source_variants {
        let forms = [
            (format!("/{variant}/"), format!("/{replace_in}/")),
            (format!("/{variant}-"), format!("/{replace_in}-")),
            (format!("-{variant}/"), format!("-{replace_in}/")),
        ];
        for (needle, replacement) in forms {
            if filepath.contains(&needle) {
                rewritten = Some(filepath.replacen(&needle, &replacement, 1));
                break 'variants;
            }
        }
    }
    let dir_source = match rewritten {
        Some(path) => path,
        None => {
            info!(
                "In fileDir {} source patterns '{:?}' was not found. Don't update it then.",
                filepath, source_variants
            );
            filepath.to_string()
        }
    };
    let normalised: PathBuf = dir_source.split('/').collect();
    normalised
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

const FORBIDDEN_IN_FILE_NAME: &[char] = &[':', '?', '!', '\\', '*', '/', '|', '<', '>'];

/// Joins version and extra suffix with `_`; either may be empty.
pub fn combine_suffix(version: &str, suffix: &str) -> String {
    match (version.is_empty(), suffix.is_empty()) {
        (true, _) => suffix.to_string(),
        (false, true) => version.to_string(),
        (false, false) => format!("{version}_{suffix}"),
    }
}

/// Inserts `_<suffix>` before the extension and strips forbidden characters.
pub fn build_file_name(filename: &str, suffix: &str) -> String {
    let mut parts: Vec<String> = filename.split('.').map(str::to_string).collect();
    if parts.len() > 1 && !suffix.is_empty() {
        let stem = parts.len() - 2;
        parts[stem] = format!("{}_{}", parts[stem], suffix);
    }
    parts.join(".").replace(FORBIDDEN_IN_FILE_NAME, "")
}

/// Fills a `download.target` template for one file.
///
/// `<filename>` is the name without its extension, `<extension>` the part
/// after the last dot; persona tokens come from `tokens`. An empty template
/// keeps the remote file name.
pub fn build_target_file_name(filename: &str, target: &str, tokens: &PathPattern) -> String {
    if target.is_empty() {
        return filename.to_string();
    }
    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (filename, ""),
    };
    let filled = target
        .replace("<extension>", extension)
        .replace("<filename>", stem);
    tokens.apply(&filled)
}

/// How the local file name of a download is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingMode<'a> {
    /// Keep the stored directory, rewriting its source-language component.
    FilePath { source_variants: &'a [String] },
    /// Fill the configured `download.target` template.
    Target { template: &'a str },
}

/// Local path of a downloaded file, relative to the download root.
pub fn build_directory_file_path(
    file: &FileMetadata,
    substitution: &Substitution,
    suffix: &str,
    mode: NamingMode<'_>,
) -> PathBuf {
    let suffix = combine_suffix(&file.version, suffix);
    match mode {
        NamingMode::FilePath { source_variants } => {
            let name = build_file_name(&file.filename, &suffix);
            rewrite_directory(&file.filepath, source_variants, &substitution.replace_in).join(name)
        }
        NamingMode::Target { template } => {
            PathBuf::from(build_target_file_name(&file.filename, template, &substitution.tokens))
        }
    }
}
