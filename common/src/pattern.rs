//! Glob expansion of source patterns
//!
//! # Pattern Syntax
//!
//! - `*` matches anything except `/`
//! - `**` matches anything including `/` (crosses directories)
//! - `?` matches a single character (except `/`)
//! - `[...]` character classes, `{a,b}` alternatives
//! - Leading `!` negates the pattern: whatever it matches is removed from the result
//!
//! Every pattern is split into a literal prefix (the leading path segments without wildcards)
//! and a glob remainder. The prefix, resolved against the working directory, is the pattern's
//! *root*: the directory that is walked, and the directory that copied paths are made
//! relative to. A pattern without any wildcard is a literal path.
//!
//! # Examples
//!
//! ```
//! use common::pattern::PatternSet;
//!
//! let patterns = PatternSet::new(&["src/*.png", "!src/goat.png"]).unwrap();
//! assert_eq!(patterns.positives().count(), 1);
//! assert_eq!(patterns.negations().count(), 1);
//! ```

use async_recursion::async_recursion;
use std::path::{Component, Path, PathBuf};
use tracing::instrument;

use crate::error::{Error, Result};

pub const NEGATION_PREFIX: char = '!';

const GLOB_CHARS: [char; 4] = ['*', '?', '[', '{'];

/// A single compiled source pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// pattern as given by the user, including the `!` marker
    pub original: String,
    pub negated: bool,
    /// literal leading segments, relative to the working directory unless absolute
    prefix: PathBuf,
    /// compiled remainder, `None` for literal paths
    matcher: Option<globset::GlobMatcher>,
    /// deepest level below the root that can match, `None` for `**` and literal paths
    max_depth: Option<usize>,
    /// the remainder spells out a segment starting with `.`
    explicit_dot: bool,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let (negated, body) = match pattern.strip_prefix(NEGATION_PREFIX) {
            Some(body) => (true, body),
            None => (false, pattern),
        };
        if body.is_empty() {
            return Err(Error::Usage(format!(
                "empty source pattern `{pattern}` is not allowed"
            )));
        }
        let (prefix, remainder) = split_literal_prefix(body);
        let matcher = if remainder.is_empty() {
            None
        } else {
            let glob = globset::GlobBuilder::new(remainder)
                .literal_separator(true) // * doesn't match /
                .build()
                .map_err(|source| Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
            Some(glob.compile_matcher())
        };
        let max_depth = if remainder.is_empty() || remainder.contains("**") {
            None
        } else {
            Some(remainder.split('/').filter(|s| !s.is_empty()).count())
        };
        let explicit_dot = remainder.split('/').any(|segment| segment.starts_with('.'));
        Ok(Self {
            original: pattern.to_string(),
            negated,
            prefix: PathBuf::from(prefix),
            matcher,
            max_depth,
            explicit_dot,
        })
    }
    /// True when the pattern contains no wildcards at all.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.matcher.is_none()
    }
    /// Absolute directory (or file, for literals) the pattern is anchored at.
    #[must_use]
    pub fn root(&self, cwd: &Path) -> PathBuf {
        normalize(&cwd.join(&self.prefix))
    }
    fn allows_dot(&self, dot: bool) -> bool {
        dot || self.explicit_dot
    }
    /// Check a path, relative to this pattern's root, against the glob remainder.
    fn matches_relative(&self, relative: &Path, dot: bool) -> bool {
        if !self.allows_dot(dot) && has_dot_component(relative) {
            return false;
        }
        match &self.matcher {
            Some(matcher) => matcher.is_match(relative),
            None => true,
        }
    }
    /// Check an absolute path against the pattern, used for negations.
    #[must_use]
    pub fn matches(&self, path: &Path, cwd: &Path, dot: bool) -> bool {
        let root = self.root(cwd);
        if self.is_literal() {
            // a negated literal directory excludes everything below it
            return path.starts_with(&root);
        }
        match path.strip_prefix(&root) {
            Ok(relative) => self.matches_relative(relative, dot),
            Err(_) => false,
        }
    }
}

/// Ordered sequence of positive and negated patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| Pattern::parse(pattern.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if !patterns.iter().any(|pattern| !pattern.negated) {
            return Err(Error::Usage(
                "at least one source pattern that is not negated is required".to_string(),
            ));
        }
        Ok(Self { patterns })
    }
    pub fn positives(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter().filter(|pattern| !pattern.negated)
    }
    pub fn negations(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter().filter(|pattern| pattern.negated)
    }
}

impl std::fmt::Display for PatternSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let originals: Vec<&str> = self
            .patterns
            .iter()
            .map(|pattern| pattern.original.as_str())
            .collect();
        write!(f, "{}", originals.join(", "))
    }
}

/// A source file selected for copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// absolute path of the file
    pub source: PathBuf,
    /// directory the destination layout is computed relative to
    pub root: PathBuf,
}

/// Expand the pattern set into the sorted, deduplicated list of files to copy.
///
/// Positive patterns are expanded one by one; negations are applied afterwards, so an
/// exclusion wins no matter where it appears in the set.
#[instrument(skip(patterns), fields(patterns = %patterns))]
pub async fn expand(patterns: &PatternSet, cwd: &Path, dot: bool) -> Result<Vec<Match>> {
    let mut found = std::collections::BTreeMap::<PathBuf, PathBuf>::new();
    for pattern in patterns.positives() {
        let matches = expand_pattern(pattern, cwd, dot).await?;
        tracing::debug!("pattern {:?} matched {} files", pattern.original, matches.len());
        for Match { source, root } in matches {
            // the first pattern to reach a file decides its root
            found.entry(source).or_insert(root);
        }
    }
    let negations: Vec<&Pattern> = patterns.negations().collect();
    let matches: Vec<Match> = found
        .into_iter()
        .filter(|(source, _)| {
            match negations
                .iter()
                .find(|negation| negation.matches(source, cwd, dot))
            {
                Some(negation) => {
                    tracing::debug!("{source:?} excluded by {:?}", negation.original);
                    false
                }
                None => true,
            }
        })
        .map(|(source, root)| Match { source, root })
        .collect();
    if matches.is_empty() {
        return Err(Error::NoMatch {
            patterns: patterns.to_string(),
        });
    }
    Ok(matches)
}

async fn expand_pattern(pattern: &Pattern, cwd: &Path, dot: bool) -> Result<Vec<Match>> {
    let root = pattern.root(cwd);
    if pattern.is_literal() {
        let metadata = match tokio::fs::metadata(&root).await {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SourceNotFound {
                    path: pattern.original.clone(),
                });
            }
            Err(error) => {
                return Err(anyhow::Error::new(error)
                    .context(format!("failed reading metadata from {:?}", &root))
                    .into());
            }
        };
        if !metadata.is_dir() {
            // relative literals keep their path below cwd, absolute ones only their name
            let file_root = if pattern.prefix.is_absolute() {
                root.parent().map_or_else(|| root.clone(), Path::to_path_buf)
            } else {
                normalize(cwd)
            };
            return Ok(vec![Match {
                source: root,
                root: file_root,
            }]);
        }
    }
    let mut sources = vec![];
    walk(&root, Path::new(""), pattern, dot, &mut sources).await;
    Ok(sources
        .into_iter()
        .map(|source| Match {
            source,
            root: root.clone(),
        })
        .collect())
}

#[async_recursion]
async fn walk(
    dir: &Path,
    relative: &Path,
    pattern: &Pattern,
    dot: bool,
    found: &mut Vec<PathBuf>,
) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(error) => {
            // a glob root that doesn't exist simply has no matches
            if error.kind() != std::io::ErrorKind::NotFound || !relative.as_os_str().is_empty() {
                tracing::warn!("cannot read directory {:?}: {}", dir, error);
            }
            return;
        }
    };
    let depth = relative.components().count() + 1;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(error) => {
                tracing::warn!("failed listing directory {:?}: {}", dir, error);
                break;
            }
        };
        let name = entry.file_name();
        if !pattern.allows_dot(dot) && name.to_string_lossy().starts_with('.') {
            continue;
        }
        let entry_path = entry.path();
        let entry_relative = relative.join(&name);
        let is_dir = match is_directory(&entry).await {
            Ok(is_dir) => is_dir,
            Err(error) => {
                tracing::warn!("failed reading metadata from {:?}: {}", &entry_path, error);
                continue;
            }
        };
        match is_dir {
            Some(true) => {
                if pattern.max_depth.is_none_or(|max_depth| depth < max_depth) {
                    walk(&entry_path, &entry_relative, pattern, dot, found).await;
                }
            }
            Some(false) => {
                if pattern.matches_relative(&entry_relative, dot) {
                    found.push(entry_path);
                }
            }
            None => {}
        }
    }
}

/// `Some(true)` for directories, `Some(false)` for files, `None` for anything else.
///
/// Symlinks to files are followed, symlinks to directories are not descended into.
async fn is_directory(entry: &tokio::fs::DirEntry) -> std::io::Result<Option<bool>> {
    let file_type = entry.file_type().await?;
    if file_type.is_symlink() {
        let metadata = tokio::fs::metadata(entry.path()).await?;
        return Ok(metadata.is_file().then_some(false));
    }
    if file_type.is_dir() {
        Ok(Some(true))
    } else if file_type.is_file() {
        Ok(Some(false))
    } else {
        Ok(None)
    }
}

/// Split a pattern into its leading wildcard-free segments and the glob remainder.
///
/// - "src/**" -> ("src", "**")
/// - "src/foo/**/*.rs" -> ("src/foo", "**/*.rs")
/// - "**/*.rs" -> ("", "**/*.rs")
/// - "/tmp/*.txt" -> ("/tmp", "*.txt")
/// - "bar/baz.txt" -> ("bar/baz.txt", "")
fn split_literal_prefix(pattern: &str) -> (&str, &str) {
    let mut offset = 0;
    for segment in pattern.split('/') {
        if segment.contains(GLOB_CHARS) {
            let prefix = pattern[..offset].trim_end_matches('/');
            let prefix = if prefix.is_empty() && pattern.starts_with('/') {
                "/"
            } else {
                prefix
            };
            return (prefix, &pattern[offset..]);
        }
        offset += segment.len() + 1;
    }
    (pattern, "")
}

fn has_dot_component(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
