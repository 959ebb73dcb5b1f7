//! Streaming directory traversals
//!
//! Scope-wide operations walk the hierarchy one directory at a time so memory
//! stays bounded regardless of how many tiles a layer holds. Entries that
//! disappear mid-walk (concurrent deletes) are skipped rather than reported.

use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::pin::Pin;

use tilecache_core::TileBounds;
use tokio::fs;

use super::layout;
use super::record::HEADER_LEN;
use crate::error::StorageError;

type WalkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Total payload bytes of every committed blob below `dir`
pub fn payload_bytes(dir: &Path) -> WalkFuture<'_, u64> {
    Box::pin(async move {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut total = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if file_type.is_dir() {
                total += payload_bytes(&entry.path()).await?;
            } else if entry.file_name().to_str().is_some_and(layout::is_blob_file) {
                match entry.metadata().await {
                    Ok(meta) => total += meta.len().saturating_sub(HEADER_LEN as u64),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(total)
    })
}

/// Whether any committed blob exists below `dir`; stops at the first one found
pub fn contains_blob(dir: &Path) -> WalkFuture<'_, bool> {
    Box::pin(async move {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if file_type.is_dir() {
                if contains_blob(&entry.path()).await? {
                    return Ok(true);
                }
            } else if entry.file_name().to_str().is_some_and(layout::is_blob_file) {
                return Ok(true);
            }
        }

        Ok(false)
    })
}

/// Remove `dir` and everything below it, returning how many blobs were removed
pub fn purge(dir: &Path) -> WalkFuture<'_, u64> {
    Box::pin(async move {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                removed += purge(&path).await?;
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    if entry.file_name().to_str().is_some_and(layout::is_blob_file) {
                        removed += 1;
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        match fs::remove_dir(dir).await {
            Ok(()) => Ok(removed),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(removed),
            Err(e) => Err(e.into()),
        }
    })
}

/// Remove the tiles of one zoom directory that fall inside `bounds`
///
/// Only half-cell directories intersecting the bounds are opened. Emptied
/// half-cell directories are dropped.
pub async fn delete_tiles(
    zoom_dir: &Path,
    zoom: u32,
    bounds: &TileBounds,
    sync_writes: bool,
) -> Result<u64, StorageError> {
    let mut cells = match fs::read_dir(zoom_dir).await {
        Ok(cells) => cells,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0u64;
    while let Some(cell) = cells.next_entry().await? {
        let Some((hx, hy)) = cell.file_name().to_str().and_then(layout::parse_pair) else {
            continue;
        };
        if !layout::half_cell_bounds(zoom, hx, hy).intersects(bounds) {
            continue;
        }

        let cell_dir = cell.path();
        let mut tiles = match fs::read_dir(&cell_dir).await {
            Ok(tiles) => tiles,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        let mut removed_here = 0u64;
        while let Some(tile) = tiles.next_entry().await? {
            let Some((x, y)) = tile
                .file_name()
                .to_str()
                .and_then(layout::parse_tile_file_name)
            else {
                continue;
            };
            if !bounds.contains(x, y) {
                continue;
            }

            match fs::remove_file(tile.path()).await {
                Ok(()) => removed_here += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if removed_here > 0 && sync_writes {
            sync_dir(&cell_dir).await?;
        }
        // Fails while tiles or in-flight temp files remain
        let _ = fs::remove_dir(&cell_dir).await;
        removed += removed_here;
    }

    Ok(removed)
}

/// Create `dir` and any missing ancestors
///
/// With `sync_writes`, the parent of every directory created here is flushed
/// so the new entries survive a crash. `dir` itself is left to the caller.
pub async fn create_dirs(dir: &Path, sync_writes: bool) -> Result<(), StorageError> {
    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(path) = current {
        match fs::metadata(path).await {
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                missing.push(path);
                current = path.parent();
            }
            Err(e) => return Err(e.into()),
        }
    }
    if missing.is_empty() {
        return Ok(());
    }

    fs::create_dir_all(dir).await?;
    if sync_writes {
        // Outermost first, so each entry is durable before anything below it
        for created in missing.iter().rev() {
            let Some(parent) = created.parent() else { continue };
            match flush_dir(parent).await {
                Ok(()) => {}
                // Removed by a concurrent delete; the caller's write will notice
                Err(e) if e.kind() == ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

/// Flush a directory's entries to disk so renames and unlinks survive a crash
pub async fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    Ok(flush_dir(dir).await?)
}

#[cfg(unix)]
async fn flush_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn flush_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
