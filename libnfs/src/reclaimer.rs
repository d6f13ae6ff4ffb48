//! Volume deletion.
//!
//! [`VolumeReclaimer`] removes the directory behind a [`VolumeDescriptor`].
//! It needs nothing but the descriptor: the parent export is recovered from
//! the descriptor's export path and mounted again if necessary, so deletion
//! works from a freshly started process.

use std::io::ErrorKind;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::NfsError;
use crate::mount::MountManager;
use crate::types::{ReclaimPolicy, VolumeDescriptor, validate_dir_name};

/// Deletes volume directories created by a [`crate::VolumeProvisioner`]
/// with the same identity.
pub struct VolumeReclaimer {
    mounts: Arc<MountManager>,
    identity: String,
}

impl VolumeReclaimer {
    pub fn new(mounts: Arc<MountManager>, identity: impl Into<String>) -> Self {
        Self {
            mounts,
            identity: identity.into(),
        }
    }

    /// Reject descriptors not stamped with this instance's identity.
    fn check_ownership(&self, volume: &VolumeDescriptor) -> Result<(), NfsError> {
        match volume.provisioner_identity() {
            Some(found) if found == self.identity => Ok(()),
            found => Err(NfsError::OwnershipMismatch {
                volume: volume.name.clone(),
                expected: self.identity.clone(),
                found: found.map(str::to_owned),
            }),
        }
    }

    /// Remove the volume's backing directory.
    ///
    /// An already-removed directory counts as success.  The export stays
    /// mounted afterwards; other volumes share it.
    #[instrument(skip(self, volume), fields(volume = %volume.name, export = %volume.export))]
    pub async fn delete(&self, volume: &VolumeDescriptor) -> Result<(), NfsError> {
        self.check_ownership(volume)?;

        if volume.reclaim_policy == ReclaimPolicy::Retain {
            info!("reclaim policy is Retain, leaving volume data in place");
            return Ok(());
        }

        let (parent, segment) = volume.parent_export()?;
        let dir_name = volume.backing_dir.clone().unwrap_or(segment);
        validate_dir_name(&dir_name)?;

        let mount = self
            .mounts
            .ensure_mounted(&parent)
            .await
            .inspect_err(|e| warn!(parent = %parent, error = %e, "failed to mount parent export"))?;

        let volume_dir = mount.local_mount_point.join(&dir_name);
        match tokio::fs::remove_dir_all(&volume_dir).await {
            Ok(()) => info!(dir = %volume_dir.display(), "volume deleted"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %volume_dir.display(), "volume dir already gone");
            }
            Err(e) => return Err(NfsError::io("remove volume dir", &volume_dir, e)),
        }
        Ok(())
    }
}
