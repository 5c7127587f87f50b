//! Writing into the output tree.

use crate::build::BuildError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn ensure_parent(path: &Path) -> Result<&Path, BuildError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    Ok(parent)
}

/// Write content to a file atomically.
///
/// The content goes to a temp file in the same directory, which is then
/// renamed over `path`. Readers see either the old or the new file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), BuildError> {
    let parent = ensure_parent(path)?;
    let mut temp = NamedTempFile::new_in(parent).map_err(|e| BuildError::io(parent, e))?;
    temp.write_all(content).map_err(|e| BuildError::io(temp.path(), e))?;
    temp.as_file().sync_all().map_err(|e| BuildError::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| BuildError::io(path, e.error))?;
    Ok(())
}

/// Copy one file, creating the destination's parent directories.
///
/// Returns the number of bytes copied.
pub fn copy_file(from: &Path, to: &Path) -> Result<u64, BuildError> {
    if !from.is_file() {
        return Err(BuildError::io(
            from,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source file not found"),
        ));
    }
    ensure_parent(to)?;
    fs::copy(from, to).map_err(|e| BuildError::io(to, e))
}
