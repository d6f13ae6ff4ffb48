//! Host mount state.
//!
//! [`MountTable`] answers "is anything mounted at this path right now?".  The
//! production implementation, [`ProcMountTable`], reads the kernel's view in
//! `/proc/self/mounts`, which stays correct across restarts of the
//! provisioner process.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::error::NfsError;

/// Default location of the kernel mount table.
pub const PROC_MOUNTS: &str = "/proc/self/mounts";

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mount source, e.g. `nfs1:/exports/data`.
    pub source: String,
    /// Where the source is mounted.
    pub mount_point: PathBuf,
    /// Filesystem type, e.g. `nfs4`.
    pub fs_type: String,
}

/// Read-only snapshot of the host's mounts.
#[async_trait]
pub trait MountTable: Send + Sync {
    /// Return every current mount.
    async fn entries(&self) -> Result<Vec<MountEntry>, NfsError>;

    /// Return `true` if `path` is currently a mount point.
    ///
    /// An unreadable table is treated as "not mounted": the subsequent
    /// mount attempt then reports the real problem.
    async fn is_mounted(&self, path: &Path) -> bool {
        match self.entries().await {
            Ok(entries) => entries.iter().any(|e| e.mount_point == path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read mount table");
                false
            }
        }
    }
}

/// [`MountTable`] backed by a `/proc/<pid>/mounts`-format file.
#[derive(Debug, Clone)]
pub struct ProcMountTable {
    path: PathBuf,
}

impl ProcMountTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcMountTable {
    fn default() -> Self {
        Self::new(PROC_MOUNTS)
    }
}

#[async_trait]
impl MountTable for ProcMountTable {
    async fn entries(&self) -> Result<Vec<MountEntry>, NfsError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| NfsError::io("read mount table", &self.path, e))?;
        Ok(parse_mounts(&contents))
    }
}

/// Parse `/proc/self/mounts` content.
///
/// Format: `<device> <mountpoint> <fstype> <options> <dump> <pass>`, with
/// whitespace and backslashes inside fields written as octal escapes
/// (`\040` for space).  Malformed lines are skipped.
pub fn parse_mounts(contents: &str) -> Vec<MountEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                source: unescape_octal(source),
                mount_point: PathBuf::from(unescape_octal(mount_point)),
                fs_type: fs_type.to_owned(),
            })
        })
        .collect()
}

fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let code = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(b) = u8::try_from(code) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
