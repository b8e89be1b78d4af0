//! Staging files and fan-out to destinations
//!
//! A fetch streams into a task-exclusive staging file. On success the
//! staging file is moved to the first destination and every other
//! destination receives a copy of that first file.

use crate::error::LinkfetchError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Build a unique staging path for a download headed to `first_destination`
///
/// The name is the destination's file name plus a random suffix, so
/// concurrent tasks never collide even when they share a base name.
pub fn staging_path(temp_dir: &Path, first_destination: &Path) -> PathBuf {
    let base = first_destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    let suffix = Uuid::new_v4().simple().to_string();

    temp_dir.join(format!("{}-{}.part", base, &suffix[..8]))
}

/// Move the finished staging file into place and fan out to all destinations
///
/// On error every destination written so far is removed again, so a source
/// either lands at all its destinations or at none.
pub async fn promote(staging: &Path, destinations: &[PathBuf]) -> Result<(), LinkfetchError> {
    let Some((first, rest)) = destinations.split_first() else {
        return Err(LinkfetchError::InvalidOperation(
            "source has no destinations".to_string(),
        ));
    };

    ensure_parent(first).await?;
    move_file(staging, first).await?;

    let mut written = vec![first.as_path()];
    for destination in rest {
        match copy_to(first, destination).await {
            Ok(true) => written.push(destination.as_path()),
            Ok(false) => {}
            Err(e) => {
                for path in &written {
                    discard(path).await;
                }
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Copy `first` to `destination` unless both name the same file
///
/// Returns whether a copy was made.
async fn copy_to(first: &Path, destination: &Path) -> Result<bool, LinkfetchError> {
    if is_same_file(first, destination).await {
        debug!("{:?} is the same file as {:?}, skipping copy", destination, first);
        return Ok(false);
    }

    ensure_parent(destination).await?;
    fs::copy(first, destination).await?;
    Ok(true)
}

/// Rename, falling back to copy + remove when crossing filesystems
async fn move_file(from: &Path, to: &Path) -> Result<(), LinkfetchError> {
    if let Err(e) = fs::rename(from, to).await {
        debug!("Rename {:?} -> {:?} failed ({}), copying instead", from, to, e);
        if let Err(e) = fs::copy(from, to).await {
            discard(to).await;
            return Err(e.into());
        }
        discard(from).await;
    }
    Ok(())
}

async fn ensure_parent(path: &Path) -> Result<(), LinkfetchError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Check whether two paths refer to the same file on disk
///
/// Paths are compared after resolving symlinks and `..` components. A path
/// that does not exist yet is resolved through its parent directory.
pub async fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }

    match (resolve(a).await, resolve(b).await) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

async fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path).await {
        return Some(canonical);
    }

    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::canonicalize(parent).await.ok().map(|p| p.join(name))
}

/// Remove a file, ignoring one that is already gone
pub async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}
