//! Deterministic source tree traversal.
//!
//! Both package forms walk the source directory the same way: regular files
//! only, lexical order by file name within each directory, and never into an
//! excluded subtree (typically the output directory when it is nested under
//! the source root). A symlink to a regular file is yielded under its own
//! name and archived with the target's bytes; symlinks to directories are
//! never descended into, and dangling links are skipped.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::error::{IoContext, MissingReason, PackError, PackResult};

/// A regular file found under a [`SourceTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// `/`-separated name relative to the tree root.
    pub name: String,
}

/// A source directory with optional excluded subtrees.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    exclude: Vec<PathBuf>,
}

impl SourceTree {
    /// Bind to `root`, which must be an existing directory.
    pub fn new(root: &Path) -> PackResult<Self> {
        let root = dunce::canonicalize(root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PackError::NotFound {
                entry: root.display().to_string(),
                location: "source tree".into(),
                reason: MissingReason::Absent,
            },
            _ => PackError::io(format!("resolving {}", root.display()), e),
        })?;
        if !root.is_dir() {
            return Err(PackError::NotFound {
                entry: root.display().to_string(),
                location: "source tree".into(),
                reason: MissingReason::NotDirectory,
            });
        }
        Ok(Self {
            root,
            exclude: Vec::new(),
        })
    }

    /// Skip `path` and everything below it. Paths that do not exist are
    /// ignored since there is nothing to skip.
    pub fn excluding(mut self, path: &Path) -> Self {
        if let Ok(canonical) = dunce::canonicalize(path) {
            if canonical != self.root {
                self.exclude.push(canonical);
            }
        }
        self
    }

    /// The canonical root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Regular files in deterministic order. Each call starts a fresh walk.
    pub fn files(&self) -> impl Iterator<Item = PackResult<SourceFile>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.exclude.iter().any(|x| entry.path() == x))
            .filter_map(move |entry| match entry {
                Ok(entry) => self.source_file(entry).transpose(),
                Err(err) => {
                    let context = format!("walking {}", self.root.display());
                    Some(Err(PackError::io(context, err.into())))
                }
            })
    }

    /// `Some` for a regular file or a symlink resolving to one.
    fn source_file(&self, entry: DirEntry) -> PackResult<Option<SourceFile>> {
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(path = %entry.path().display(), "skipping dangling symlink");
                    return Ok(None);
                }
                Err(e) => {
                    return Err(PackError::io(
                        format!("resolving {}", entry.path().display()),
                        e,
                    ))
                }
            }
        } else if !file_type.is_file() {
            return Ok(None);
        }
        let name = relative_path(entry.path(), &self.root)?;
        Ok(Some(SourceFile {
            path: entry.into_path(),
            name,
        }))
    }

    /// Walk eagerly, stopping at the first error.
    pub fn all_files(&self) -> PackResult<Vec<SourceFile>> {
        self.files().collect()
    }
}

/// `/`-joined name of `file` relative to `root`.
///
/// Fails when `file` is not below `root` or a component is not valid UTF-8.
pub fn relative_path(file: &Path, root: &Path) -> PackResult<String> {
    let rel = file.strip_prefix(root).map_err(|_| {
        PackError::io(
            format!("relativizing {}", file.display()),
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not below {}", root.display()),
            ),
        )
    })?;

    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "non-UTF-8 file name"))
                    .io_context(|| format!("naming {}", file.display()))?;
                parts.push(part);
            }
            Component::CurDir => {}
            _ => {
                return Err(PackError::io(
                    format!("relativizing {}", file.display()),
                    io::Error::new(io::ErrorKind::InvalidInput, "unexpected path component"),
                ))
            }
        }
    }
    Ok(parts.join("/"))
}

/// Validate an archive entry name for extraction.
///
/// Returns the relative path to join under the extraction root, or `None`
/// when the name is empty, absolute, or climbs with `..`.
pub fn safe_entry_path(name: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Compare an archive entry name to a fixed relative name, ignoring `./`
/// prefixes and trailing separators.
pub fn entry_matches(name: &Path, expected: &str) -> bool {
    safe_entry_path(name).is_some_and(|p| p == Path::new(expected))
}
