//! Destination planning: where every matched file goes and under which name

use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::config::RunConfiguration;
use crate::error::{Error, Result};
use crate::pattern::{normalize, Match};

/// Placeholder substituted by a rename template.
pub const BASENAME_PLACEHOLDER: &str = "{{basename}}";

/// How the final filename segment of each destination is produced.
#[derive(Clone, Default)]
pub enum RenameRule {
    /// keep the source basename
    #[default]
    None,
    /// replace the whole basename, extension included
    Literal(String),
    /// compute a new basename from the original one
    Template(std::sync::Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl RenameRule {
    /// Interpret a `--rename` value: it is a template if it contains `{{basename}}`.
    ///
    /// The value names only the final path segment, so it can't be empty, `.`, `..` or
    /// contain a path separator.
    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() || value == "." || value == ".." || value.contains('/') {
            return Err(Error::Usage(format!(
                "invalid rename `{value}`: expected a file name without directories"
            )));
        }
        if value.contains(BASENAME_PLACEHOLDER) {
            Ok(Self::template(value))
        } else {
            Ok(Self::Literal(value.to_string()))
        }
    }
    /// Template rule: the first `{{basename}}` becomes the name without extension and the
    /// original extension is appended to the result.
    ///
    /// ```
    /// use common::plan::RenameRule;
    ///
    /// let rule = RenameRule::template("hi-{{basename}}-1");
    /// assert_eq!(rule.apply("hello.js"), "hi-hello-1.js");
    /// ```
    #[must_use]
    pub fn template(template: &str) -> Self {
        let template = template.to_string();
        Self::Template(std::sync::Arc::new(move |basename: &str| {
            let (stem, extension) = split_extension(basename);
            let mut renamed = template.replacen(BASENAME_PLACEHOLDER, stem, 1);
            renamed.push_str(extension);
            renamed
        }))
    }
    #[must_use]
    pub fn apply(&self, basename: &str) -> String {
        match self {
            Self::None => basename.to_string(),
            Self::Literal(name) => name.clone(),
            Self::Template(rename) => rename(basename),
        }
    }
}

impl std::fmt::Debug for RenameRule {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Literal(name) => f.debug_tuple("Literal").field(name).finish(),
            Self::Template(_) => write!(f, "Template(..)"),
        }
    }
}

/// Split a basename on its last `.`: `archive.tar.gz` -> (`archive.tar`, `.gz`).
///
/// A name without a `.` has an empty extension.
#[must_use]
pub fn split_extension(basename: &str) -> (&str, &str) {
    match basename.rfind('.') {
        Some(pos) => basename.split_at(pos),
        None => (basename, ""),
    }
}

/// A single file copy, both paths absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl std::fmt::Display for CopyTask {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.source.display(),
            self.destination.display()
        )
    }
}

/// Compute a [`CopyTask`] for every match.
///
/// Without `flat` the path of each file relative to its pattern root is recreated below the
/// destination; with `flat` only the basename is kept. A relative destination is resolved
/// against the configured working directory.
#[instrument(skip(matches, config), fields(count = matches.len()))]
pub fn plan(matches: &[Match], destination: &Path, config: &RunConfiguration) -> Vec<CopyTask> {
    let destination_root = normalize(&config.cwd.join(destination));
    matches
        .iter()
        .filter_map(|m| {
            let Some(file_name) = m.source.file_name() else {
                tracing::warn!("skipping {:?}: path has no file name", &m.source);
                return None;
            };
            let relative = if config.flat {
                PathBuf::from(file_name)
            } else {
                match m.source.strip_prefix(&m.root) {
                    Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
                    // sources outside their root (e.g. `../file`) keep only their name
                    _ => PathBuf::from(file_name),
                }
            };
            let relative = match &config.rename {
                RenameRule::None => relative,
                rule => relative.with_file_name(rule.apply(&file_name.to_string_lossy())),
            };
            let task = CopyTask {
                source: m.source.clone(),
                destination: destination_root.join(relative),
            };
            tracing::trace!("planned {task}");
            Some(task)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(flat: bool, rename: RenameRule) -> RunConfiguration {
        RunConfiguration {
            flat,
            rename,
            ..RunConfiguration::new(PathBuf::from("/work"))
        }
    }

    fn found(source: &str, root: &str) -> Match {
        Match {
            source: PathBuf::from(source),
            root: PathBuf::from(root),
        }
    }

    #[test]
    fn preserves_structure_below_root() {
        let matches = vec![
            found("/work/src/a/b.txt", "/work/src"),
            found("/work/src/c.txt", "/work/src"),
        ];
        let tasks = plan(&matches, Path::new("/out"), &config(false, RenameRule::None));
        assert_eq!(tasks[0].destination, PathBuf::from("/out/a/b.txt"));
        assert_eq!(tasks[1].destination, PathBuf::from("/out/c.txt"));
        assert_eq!(tasks[0].source, PathBuf::from("/work/src/a/b.txt"));
    }

    #[test]
    fn flatten_drops_directories() {
        let matches = vec![
            found("/work/foo.js", "/work"),
            found("/work/src/bar.js", "/work"),
        ];
        let tasks = plan(
            &matches,
            Path::new("destination/subdir"),
            &config(true, RenameRule::None),
        );
        let destinations: Vec<_> = tasks.into_iter().map(|t| t.destination).collect();
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("/work/destination/subdir/foo.js"),
                PathBuf::from("/work/destination/subdir/bar.js"),
            ]
        );
    }

    #[test]
    fn rename_touches_only_the_file_name() {
        let matches = vec![found("/work/src/lib/hello.js", "/work/src")];
        let tasks = plan(
            &matches,
            Path::new("/out"),
            &config(false, RenameRule::parse("hi-{{basename}}-1").unwrap()),
        );
        assert_eq!(tasks[0].destination, PathBuf::from("/out/lib/hi-hello-1.js"));
        let tasks = plan(
            &matches,
            Path::new("/out"),
            &config(false, RenameRule::parse("hi.js").unwrap()),
        );
        assert_eq!(tasks[0].destination, PathBuf::from("/out/lib/hi.js"));
    }

    #[test]
    fn source_outside_root_keeps_basename() {
        let matches = vec![found("/elsewhere/x.txt", "/work")];
        let tasks = plan(&matches, Path::new("../out"), &config(false, RenameRule::None));
        assert_eq!(tasks[0].destination, PathBuf::from("/out/x.txt"));
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("hello.js"), ("hello", ".js"));
        assert_eq!(split_extension("Makefile"), ("Makefile", ""));
        assert_eq!(split_extension(".bashrc"), ("", ".bashrc"));
    }

    #[test]
    fn template_rules() {
        assert_eq!(RenameRule::template("{{basename}}").apply("a.b.c"), "a.b.c");
        assert_eq!(
            RenameRule::template("x-{{basename}}").apply("README"),
            "x-README"
        );
        // only the first placeholder is substituted
        assert_eq!(
            RenameRule::template("{{basename}}{{basename}}").apply("a.txt"),
            "a{{basename}}.txt"
        );
        assert!(matches!(
            RenameRule::parse("plain.txt"),
            Ok(RenameRule::Literal(_))
        ));
        assert!(matches!(
            RenameRule::parse("pre-{{basename}}"),
            Ok(RenameRule::Template(_))
        ));
    }

    #[test]
    fn rename_must_be_a_single_file_name() {
        for value in ["", ".", "..", "sub/hi.js", "/abs.js", "{{basename}}/x"] {
            assert!(
                matches!(RenameRule::parse(value), Err(Error::Usage(_))),
                "accepted {value:?}"
            );
        }
    }

    proptest! {
        #[test]
        fn split_extension_reassembles(name in "[a-z.]{0,12}") {
            let (stem, extension) = split_extension(&name);
            prop_assert_eq!(format!("{stem}{extension}"), name.clone());
            prop_assert!(!stem.contains('.') || extension.starts_with('.'));
            prop_assert!(extension.is_empty() || extension.starts_with('.'));
            prop_assert!(!extension[extension.len().min(1)..].contains('.'));
        }

        #[test]
        fn identity_template_is_identity(name in "[a-z]{1,8}(\\.[a-z]{1,3}){0,2}") {
            prop_assert_eq!(RenameRule::template(BASENAME_PLACEHOLDER).apply(&name), name);
        }
    }
}
