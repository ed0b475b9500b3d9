//! Writing generated scripts to standard output or to a file.

use std::convert::Infallible;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that can occur while writing a generated script.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write to standard output: {0}")]
    Stdout(#[source] io::Error),

    #[error("failed to write {}: {source}", .path.display())]
    File { path: PathBuf, source: io::Error },
}

/// Where a generated script goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

impl From<&str> for OutputTarget {
    fn from(value: &str) -> Self {
        match value {
            "" | "-" | "/dev/stdout" => OutputTarget::Stdout,
            path => OutputTarget::File(PathBuf::from(path)),
        }
    }
}

impl FromStr for OutputTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(OutputTarget::from(s))
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => f.write_str("standard output"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Write `content` to the target, replacing any existing file.
pub fn write_script(content: &str, target: &OutputTarget) -> Result<(), WriteError> {
    match target {
        OutputTarget::Stdout => {
            let mut out = io::stdout().lock();
            out.write_all(content.as_bytes())
                .and_then(|()| out.flush())
                .map_err(WriteError::Stdout)
        }
        OutputTarget::File(path) => write_file(content, path).map_err(|source| WriteError::File {
            path: path.clone(),
            source,
        }),
    }
}

/// Regular files are replaced atomically through a sibling temporary file;
/// anything else (devices, pipes) is written in place.
fn write_file(content: &str, path: &Path) -> io::Result<()> {
    let existing = fs::metadata(path).ok();
    if let Some(ref metadata) = existing {
        if !metadata.is_file() {
            let mut file = File::create(path)?;
            return file.write_all(content.as_bytes());
        }
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;

    match existing {
        Some(metadata) => file.as_file().set_permissions(metadata.permissions())?,
        None => set_default_permissions(file.as_file())?,
    }

    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_default_permissions(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &File) -> io::Result<()> {
    Ok(())
}
