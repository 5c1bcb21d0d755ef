//! Copy-then-delete archival and duplicate parking.

use crate::error::LocalIoError;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the directory, next to the incoming one, that holds duplicates
pub const DUPE_DIR_NAME: &str = "dupe";

/// What happened to an incoming file whose name is already archived
#[derive(Debug, PartialEq, Eq)]
pub enum DuplicateOutcome {
    /// Copied into the dupe directory under this path; incoming file removed
    Parked(PathBuf),
    /// No dupe directory; incoming file left where it is
    NoDupeDir(PathBuf),
}

/// Copies `source` into `archive_dir` as `name`, then removes `source`
///
/// # Errors
/// - `Copy`: nothing was changed, the source is intact
/// - `Remove`: the archive copy exists but the source could not be removed
pub fn archive_file(source: &Path, archive_dir: &Path, name: &str) -> Result<PathBuf, LocalIoError> {
    let target = archive_dir.join(name);
    copy_file(source, &target)?;
    remove_file(source)?;
    Ok(target)
}

/// Sibling `dupe` directory of an incoming directory
pub fn dupe_dir_for(incoming_dir: &Path) -> PathBuf {
    match incoming_dir.parent() {
        Some(parent) => parent.join(DUPE_DIR_NAME),
        None => PathBuf::from(DUPE_DIR_NAME),
    }
}

/// Today's local date as `YYYYMMDD`
pub fn date_stamp() -> String {
    Local::now().format("%Y%m%d").to_string()
}

/// True when `archive_dir` already holds a file called `name`
pub fn is_duplicate(archive_dir: &Path, name: &str) -> bool {
    archive_dir.join(name).is_file()
}

/// Moves a duplicate incoming file into `dupe_dir` as `<name>.<stamp>`
///
/// The archived copy is never touched. Without a dupe directory the incoming
/// file stays put so nothing is lost or overwritten.
///
/// # Errors
/// Copy or remove failures while parking the file
pub fn divert_duplicate(incoming: &Path, dupe_dir: &Path, stamp: &str) -> Result<DuplicateOutcome, LocalIoError> {
    if !dupe_dir.is_dir() {
        return Ok(DuplicateOutcome::NoDupeDir(incoming.to_path_buf()));
    }

    let name = incoming
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parked = dupe_dir.join(format!("{}.{}", name, stamp));
    copy_file(incoming, &parked)?;
    remove_file(incoming)?;
    Ok(DuplicateOutcome::Parked(parked))
}

/// Puts an incoming file in place and archives it
///
/// Copies to `target_dir/target_name`, then to `archive_dir` under the
/// incoming name, and only then removes the incoming file.
pub fn deliver(incoming: &Path, target_dir: &Path, target_name: &str, archive_dir: &Path) -> Result<PathBuf, LocalIoError> {
    let name = incoming
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = target_dir.join(target_name);
    copy_file(incoming, &target)?;
    copy_file(incoming, &archive_dir.join(&name))?;
    remove_file(incoming)?;
    Ok(target)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), LocalIoError> {
    fs::copy(from, to).map(|_| ()).map_err(|source| LocalIoError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

fn remove_file(path: &Path) -> Result<(), LocalIoError> {
    fs::remove_file(path).map_err(|source| LocalIoError::Remove {
        path: path.to_path_buf(),
        source,
    })
}
