//! Coredump artifact probe
//!
//! Counts crash dumps left next to the controller. The walk is shallow and
//! tolerant: entries that cannot be read are skipped.

use crate::error::ProbeError;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default directory scanned for coredumps
pub const DEFAULT_COREDUMP_DIR: &str = "/var/crash";

/// File name prefix identifying a coredump
pub const COREDUMP_PREFIX: &str = "core";

/// Count coredump entries directly inside `dir`
///
/// A directory that does not exist holds no coredumps and yields 0.
pub async fn scan(dir: impl Into<PathBuf>) -> Result<u64, ProbeError> {
    let dir = dir.into();
    tokio::task::spawn_blocking(move || scan_blocking(&dir))
        .await
        .map_err(|e| ProbeError::Join(e.to_string()))?
}

fn scan_blocking(dir: &Path) -> Result<u64, ProbeError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %dir.display(), "Coredump directory does not exist");
            return Ok(0);
        }
        Err(source) => {
            return Err(ProbeError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut count = 0u64;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if is_coredump(&entry.file_name().to_string_lossy()) {
            count += 1;
        }
    }

    Ok(count)
}

fn is_coredump(file_name: &str) -> bool {
    file_name.starts_with(COREDUMP_PREFIX)
}
