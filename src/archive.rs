// Archive sealing. An archive is written under a temp name and renamed into the pending
// directory only once complete; source files are removed only after that rename.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::period::{Stamp, archive_path};

/// Suffix of in-progress archives; never matches the `.zip` filter of the upload queue.
pub const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive io: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive already exists: {0}")]
    AlreadyExists(PathBuf),
}

/// Result of sealing one stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub archive: PathBuf,
    /// Source files that were packed.
    pub packed: Vec<PathBuf>,
    /// Sources that were archived but could not be deleted; recovery discards them later.
    pub leftover: Vec<PathBuf>,
}

fn partial_path(pending_dir: &Path, stamp: &Stamp) -> PathBuf {
    let name = format!(".{}{}", archive_name(stamp), PARTIAL_SUFFIX);
    pending_dir.join(name)
}

fn archive_name(stamp: &Stamp) -> String {
    crate::period::FileKind::Archive.file_name(stamp)
}

/// Packs every existing file in `sources` (under its base name) into `archive_<stamp>.zip`.
/// Missing sources are skipped. Never overwrites an existing archive for the stamp.
pub fn create_archive(
    pending_dir: &Path,
    stamp: &Stamp,
    sources: &[PathBuf],
) -> Result<(PathBuf, Vec<PathBuf>), ArchiveError> {
    let target = archive_path(pending_dir, stamp);
    if target.exists() {
        return Err(ArchiveError::AlreadyExists(target));
    }
    let partial = partial_path(pending_dir, stamp);

    match write_zip(&partial, sources) {
        Ok(packed) => {
            if target.exists() {
                let _ = std::fs::remove_file(&partial);
                return Err(ArchiveError::AlreadyExists(target));
            }
            if let Err(e) = std::fs::rename(&partial, &target) {
                let _ = std::fs::remove_file(&partial);
                return Err(e.into());
            }
            sync_dir(pending_dir);
            Ok((target, packed))
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn write_zip(partial: &Path, sources: &[PathBuf]) -> Result<Vec<PathBuf>, ArchiveError> {
    let file = File::create(partial)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut packed = Vec::new();

    for src in sources {
        let Some(name) = src.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let input = match File::open(src) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        writer.start_file(name, options)?;
        std::io::copy(&mut BufReader::new(input), &mut writer)?;
        packed.push(src.clone());
    }

    let mut buffered = writer.finish()?;
    buffered.flush()?;
    let file = buffered
        .into_inner()
        .map_err(|e| ArchiveError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(packed)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(d) = File::open(dir) {
        let _ = d.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Archive-then-delete. Sources stay untouched unless the archive is fully published.
pub fn seal(pending_dir: &Path, stamp: &Stamp, sources: &[PathBuf]) -> Result<Sealed, ArchiveError> {
    let (archive, packed) = create_archive(pending_dir, stamp, sources)?;
    let leftover = remove_files(&packed);
    Ok(Sealed {
        archive,
        packed,
        leftover,
    })
}

/// Removes files, returning those that could not be removed.
pub(crate) fn remove_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut leftover = Vec::new();
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    operation = "remove_source",
                    "failed to remove archived file"
                );
                leftover.push(path.clone());
            }
        }
    }
    leftover
}

/// True for `.archive_<stamp>.zip.partial` temp files left by an interrupted seal.
pub fn is_partial(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)
}
