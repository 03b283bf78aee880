use crate::config::AppConfig;
use ahash::AHashSet;
use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Per-root override file, one glob per line.
pub const IGNORE_FILE_NAME: &str = ".hashdirignore";

/// Decides whether a path is excluded from traversal and hashing.
///
/// Returning `true` for a directory prunes the whole subtree.
pub trait IgnorePredicate: Send + Sync {
    fn should_skip(&self, path: &Path, is_directory: bool) -> bool;
}

impl<F> IgnorePredicate for F
where
    F: Fn(&Path, bool) -> bool + Send + Sync,
{
    fn should_skip(&self, path: &Path, is_directory: bool) -> bool {
        self(path, is_directory)
    }
}

/// Predicate built from configured directory names, file extensions and glob
/// patterns. Patterns are matched against both the absolute path and the path
/// relative to the scan root.
#[derive(Debug, Clone)]
pub struct GlobIgnore {
    root: PathBuf,
    dir_names: AHashSet<String>,
    extensions: AHashSet<String>,
    patterns: Vec<Pattern>,
}

impl GlobIgnore {
    pub fn new(root: &Path, config: &AppConfig) -> Self {
        let dir_names = config.ignore_dirs.iter().cloned().collect();
        let extensions = config
            .ignore_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self {
            root: root.to_path_buf(),
            dir_names,
            extensions,
            patterns: compile_patterns(&config.ignore_patterns),
        }
    }

    /// Config defaults merged with the root's `.hashdirignore`, if it exists.
    pub fn for_root(root: &Path, config: &AppConfig) -> io::Result<Self> {
        let mut ignore = Self::new(root, config);

        let override_path = root.join(IGNORE_FILE_NAME);
        match fs::read_to_string(&override_path) {
            Ok(contents) => {
                let extra = parse_ignore_file(&contents);
                debug!(
                    "Loaded {} patterns from {}",
                    extra.len(),
                    override_path.display()
                );
                ignore.patterns.extend(compile_patterns(&extra));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        Ok(ignore)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl IgnorePredicate for GlobIgnore {
    fn should_skip(&self, path: &Path, is_directory: bool) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy());

        if is_directory {
            if let Some(name) = &name {
                if self.dir_names.contains(name.as_ref()) {
                    return true;
                }
            }
        } else if let Some(ext) = path.extension() {
            if self.extensions.contains(&ext.to_string_lossy().to_lowercase()) {
                return true;
            }
        }

        let relative = path.strip_prefix(&self.root).ok();
        self.patterns.iter().any(|pattern| {
            pattern.matches_path(path) || relative.is_some_and(|rel| pattern.matches_path(rel))
        })
    }
}

/// Lines of an ignore file, minus blanks and `#` comments.
pub fn parse_ignore_file(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn compile_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}
