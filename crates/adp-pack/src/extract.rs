//! Writing archive entries beneath an extraction root.
//!
//! Callers vet every entry name with [`safe_entry_path`](crate::walk::safe_entry_path)
//! before anything is written, so a package with one hostile entry leaves
//! the target untouched.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IoContext, PackResult};

/// Entry kinds that extraction supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File { executable: bool },
    Directory,
}

/// Create `root/relative` as a directory.
pub(crate) fn extract_dir(root: &Path, relative: &Path) -> PackResult<()> {
    let dest = root.join(relative);
    fs::create_dir_all(&dest).io_context(|| format!("creating {}", dest.display()))
}

/// Stream `reader` into `root/relative`, creating parents as needed.
pub(crate) fn extract_file(
    root: &Path,
    relative: &Path,
    reader: &mut impl Read,
    executable: bool,
) -> PackResult<PathBuf> {
    let dest = root.join(relative);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).io_context(|| format!("creating {}", parent.display()))?;
    }
    let mut out = File::create(&dest).io_context(|| format!("creating {}", dest.display()))?;
    let written = io::copy(reader, &mut out).io_context(|| format!("writing {}", dest.display()))?;
    if executable {
        mark_executable(&dest)?;
    }
    debug!(path = %dest.display(), bytes = written, "extracted");
    Ok(dest)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> PackResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .io_context(|| format!("setting mode on {}", path.display()))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> PackResult<()> {
    Ok(())
}

/// Whether a file's permission bits include any execute bit.
#[cfg(unix)]
pub(crate) fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
pub(crate) fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}
