//! Idempotent gunzip/untar of packed files.
//!
//! Both steps skip work whose output is already present, so a run that died
//! half way through can simply be repeated. The packed inputs stay on disk
//! until the caller has finished with the result and calls
//! [`Unpacked::discard_packed`].

use crate::error::LocalIoError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const GZIP_SUFFIX: &str = ".gz";
pub const TAR_SUFFIX: &str = ".tar";

/// Mode applied to an extracted artifact (owner read-only)
const EXTRACTED_MODE: u32 = 0o400;

/// Result of unpacking one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    /// Name of the file to carry on with
    pub name: String,
    pub gunzipped: bool,
    pub untarred: bool,
    /// Packed files the result was made from, outermost first
    pub packed: Vec<PathBuf>,
}

impl Unpacked {
    /// The name as it is, for profiles that do not unpack
    pub fn unchanged(name: &str) -> Self {
        Unpacked {
            name: name.to_string(),
            gunzipped: false,
            untarred: false,
            packed: Vec::new(),
        }
    }

    pub fn changed(&self) -> bool {
        self.gunzipped || self.untarred
    }

    /// Removes the packed inputs once the unpacked file has been dealt with
    ///
    /// # Errors
    /// The first file that could not be removed
    pub fn discard_packed(&self) -> Result<(), LocalIoError> {
        self.packed.iter().try_for_each(|path| remove_if_present(path))
    }
}

/// Unpacks `dir/name` next to itself
///
/// # Errors
/// Any failed step. Its input is left in place so the step can be retried.
pub fn unpack(dir: &Path, name: &str) -> Result<Unpacked, LocalIoError> {
    let mut current = name.to_string();
    let mut gunzipped = false;
    let mut untarred = false;
    let mut packed_files = Vec::new();

    if let Some(stem) = strip_suffix(&current, GZIP_SUFFIX) {
        let packed = dir.join(&current);
        let target = dir.join(stem);
        if !target.is_file() {
            gunzip(&packed, &target)?;
        }
        packed_files.push(packed);
        current = stem.to_string();
        gunzipped = true;
    }

    if let Some(stem) = strip_suffix(&current, TAR_SUFFIX) {
        let packed = dir.join(&current);
        let target = dir.join(stem);
        if !target.exists() {
            untar(&packed, dir)?;
        }
        fs::set_permissions(&target, fs::Permissions::from_mode(EXTRACTED_MODE)).map_err(|source| {
            LocalIoError::Permissions {
                path: target.clone(),
                source,
            }
        })?;
        packed_files.push(packed);
        current = stem.to_string();
        untarred = true;
    }

    Ok(Unpacked {
        name: current,
        gunzipped,
        untarred,
        packed: packed_files,
    })
}

/// `name` without `suffix`, if it ends in it and something is left over
fn strip_suffix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    name.strip_suffix(suffix).filter(|stem| !stem.is_empty())
}

fn gunzip(packed: &Path, target: &Path) -> Result<(), LocalIoError> {
    let result = (|| -> io::Result<()> {
        let mut decoder = GzDecoder::new(File::open(packed)?);
        let mut out = File::create(target)?;
        io::copy(&mut decoder, &mut out)?;
        out.sync_all()
    })();

    result.map_err(|source| {
        // a half-written target would make the next run skip this step
        let _ = fs::remove_file(target);
        LocalIoError::Gunzip {
            path: packed.to_path_buf(),
            source,
        }
    })
}

fn untar(packed: &Path, dir: &Path) -> Result<(), LocalIoError> {
    let file = File::open(packed).map_err(|source| LocalIoError::Untar {
        path: packed.to_path_buf(),
        source,
    })?;
    tar::Archive::new(file)
        .unpack(dir)
        .map_err(|source| LocalIoError::Untar {
            path: packed.to_path_buf(),
            source,
        })
}

fn remove_if_present(path: &Path) -> Result<(), LocalIoError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LocalIoError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}
