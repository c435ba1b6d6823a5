//! Compressed-at-rest session around the note file.
//!
//! Opening a session inflates the canonical file into a sibling working copy
//! (`<canonical>...`) that all reads and rewrites operate on. Closing it
//! compresses the working copy back only when its content digest changed,
//! then removes the working copy.

use crate::core::codec;
use crate::core::shape::{parse_shape, split_file};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

const WORKING_SUFFIX: &str = "...";
const BACKUP_SUFFIX: &str = "_Backup";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// An open working copy of a canonical note file.
#[derive(Debug)]
pub struct Session {
    canonical: PathBuf,
    working: PathBuf,
    digest: blake3::Hash,
    closed: bool,
}

impl Session {
    /// Prepares the working copy of `canonical`.
    ///
    /// A compressed file is inflated, a plain-text file is copied verbatim, and
    /// a missing file yields an empty working copy. A plain store whose first
    /// tag happens to start with the container magic is still copied verbatim.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, or a codec error for a damaged container.
    pub fn open<P: AsRef<Path>>(canonical: P) -> Result<Self> {
        let canonical = canonical.as_ref().to_path_buf();
        let working = with_suffix(&canonical, WORKING_SUFFIX);

        let plain = match fs::read(&canonical) {
            Ok(bytes) => match codec::decompress(&bytes) {
                Ok(Some(inflated)) => inflated,
                Ok(None) => {
                    log::info!("{} is not compressed, using it as is", canonical.display());
                    bytes
                }
                Err(e) if is_plain_store(&bytes) => {
                    log::warn!(
                        "{} starts like a container but is a plain store ({e})",
                        canonical.display()
                    );
                    bytes
                }
                Err(e) => return Err(e.into()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        fs::write(&working, &plain)?;

        Ok(Self {
            canonical,
            working,
            digest: blake3::hash(&plain),
            closed: false,
        })
    }

    /// Path of the uncompressed file that storage reads and rewrites.
    pub fn working_path(&self) -> &Path {
        &self.working
    }

    /// Compresses the working copy back if it changed, then removes it.
    ///
    /// Returns whether the canonical file was rewritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O or codec error; the working copy is kept in that case so
    /// nothing is lost.
    pub fn close(mut self) -> Result<bool> {
        let plain = fs::read(&self.working)?;
        let changed = blake3::hash(&plain) != self.digest;
        if changed {
            let packed = codec::compress(&plain)?;
            fs::write(&self.canonical, packed)?;
            log::debug!("compressed {} back", self.canonical.display());
        }
        fs::remove_file(&self.working)?;
        self.closed = true;
        Ok(changed)
    }
}

fn is_plain_store(bytes: &[u8]) -> bool {
    split_file(bytes)
        .and_then(|(_, shape)| parse_shape(shape))
        .is_ok()
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed && self.working.exists() {
            log::warn!(
                "session on {} dropped without closing, discarding changes",
                self.canonical.display()
            );
            let _ = fs::remove_file(&self.working);
        }
    }
}

/// Copies the canonical file to `<canonical>_Backup` and returns that path.
///
/// # Errors
///
/// Returns an I/O error if the canonical file cannot be copied.
pub fn backup<P: AsRef<Path>>(canonical: P) -> Result<PathBuf> {
    let canonical = canonical.as_ref();
    let target = with_suffix(canonical, BACKUP_SUFFIX);
    fs::copy(canonical, &target)?;
    log::info!("backed up {} to {}", canonical.display(), target.display());
    Ok(target)
}
