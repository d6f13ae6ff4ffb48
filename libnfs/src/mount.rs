//! Export mounting.
//!
//! [`MountManager`] maps every export to a fixed local directory and makes
//! sure it is mounted there before volumes are created or removed.
//!
//! # Local layout
//!
//! ```text
//! <root>/
//!   <server>/
//!     <percent-encoded export path>/   # e.g. %2Fexports%2Fdata
//!       <volume dir>/
//! ```
//!
//! The host mount table is the only record of what is mounted; nothing is
//! cached between calls.  Concurrent calls for the same export are
//! serialized so the check-then-mount sequence runs once at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::NfsError;
use crate::executor::MountExecutor;
use crate::mount_table::MountTable;
use crate::types::{ExportRef, MountRecord};

/// Default root under which exports are mounted.
pub const DEFAULT_MOUNT_ROOT: &str = "/persistentvolumes";

/// Compute the local mount point of `export` under `root`.
///
/// The export path is query-escaped (`/` becomes `%2F`) so that every export
/// maps to exactly one directory level below the server.  `export` is taken
/// as given; pass the output of [`ExportRef::canonicalize`] so that spellings
/// of the same export share one mount point.
pub fn local_mount_point(root: &Path, export: &ExportRef) -> PathBuf {
    let encoded: String =
        url::form_urlencoded::byte_serialize(export.export_path.as_bytes()).collect();
    root.join(&export.server).join(encoded)
}

/// Ensures exports are mounted at their local mount point.
pub struct MountManager {
    root: PathBuf,
    table: Arc<dyn MountTable>,
    executor: Arc<dyn MountExecutor>,
    /// One lock per local mount point.  Entries are never removed; the set
    /// of exports a provisioner serves is small.
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl MountManager {
    pub fn new(
        root: impl Into<PathBuf>,
        table: Arc<dyn MountTable>,
        executor: Arc<dyn MountExecutor>,
    ) -> Self {
        Self {
            root: root.into(),
            table,
            executor,
            locks: DashMap::new(),
        }
    }

    /// Local mount point of `export` under this manager's root.
    pub fn local_mount_point(&self, export: &ExportRef) -> PathBuf {
        local_mount_point(&self.root, export)
    }

    /// Mount `export` unless the host already has it mounted.
    ///
    /// The export is validated and canonicalized first; the returned record
    /// carries the canonical form.  Directory creation and executor failures
    /// are both reported as mount errors and are not retried here.
    #[instrument(skip(self, export), fields(export = %export))]
    pub async fn ensure_mounted(&self, export: &ExportRef) -> Result<MountRecord, NfsError> {
        let export = export.canonicalize()?;
        let target = self.local_mount_point(&export);

        // Clone the Arc out so the map shard is not held across the await.
        let lock = match self.locks.entry(target.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                debug!(target = %target.display(), "new mount lock");
                entry.insert(Arc::default()).value().clone()
            }
        };
        let _guard = lock.lock().await;

        let record = MountRecord {
            export,
            local_mount_point: target.clone(),
        };

        if self.table.is_mounted(&target).await {
            debug!(target = %target.display(), "export already mounted");
            return Ok(record);
        }

        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| NfsError::MountFailed {
                remote: record.export.remote_spec(),
                path: target.display().to_string(),
                reason: format!("create mount point: {e}"),
            })?;

        self.executor
            .mount(&record.export.remote_spec(), &target)
            .await?;

        info!(target = %target.display(), "export mounted");
        Ok(record)
    }
}
