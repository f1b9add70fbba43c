use std::{io::Write, path::Path};

use anyhow::{Context, Error};

/// Creates all directories in a path if they don't exist
pub fn create_dirs<S>(path: S) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    std::fs::create_dir_all(path.as_ref()).context(format!(
        "Could not create path: {}",
        path.as_ref().display()
    ))
}

/// Writes `contents` to `path`, creating parent directories if needed. The
/// contents go to a temporary file in the target directory first and are
/// renamed into place, so a run killed mid-write cannot leave a truncated
/// file behind.
pub fn write_file<S>(path: S, contents: &str) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    let parent = path
        .as_ref()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    create_dirs(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent).context(format!(
        "Could not create temporary file in: {}",
        parent.display()
    ))?;

    file.write_all(contents.as_bytes()).context(format!(
        "Could not write to temporary file for: {}",
        path.as_ref().display()
    ))?;

    file.persist(path.as_ref())
        .map_err(|e| e.error)
        .context(format!(
            "Could not persist file: {}",
            path.as_ref().display()
        ))?;

    Ok(())
}

/// Reads a file that may legitimately not exist yet.
pub fn read_optional<S>(path: S) -> Result<Option<String>, Error>
where
    S: AsRef<Path>,
{
    match std::fs::read_to_string(path.as_ref()) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).context(format!(
            "Could not read file contents: {}",
            path.as_ref().display()
        )),
    }
}
