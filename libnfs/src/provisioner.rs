//! Volume creation.
//!
//! [`VolumeProvisioner`] turns a [`ProvisionRequest`] into a
//! [`VolumeDescriptor`] backed by a directory on the mounted export.  Every
//! step is safe to repeat, so an orchestrator retry after a partial failure
//! simply runs the whole sequence again.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::NfsError;
use crate::mount::MountManager;
use crate::naming::NameBuilder;
use crate::types::{
    ANN_PROVISIONER_IDENTITY, ExportRef, ProvisionRequest, VolumeDescriptor, validate_dir_name,
};

/// Creates volume directories on NFS exports.
pub struct VolumeProvisioner {
    mounts: Arc<MountManager>,
    names: NameBuilder,
    identity: String,
}

impl VolumeProvisioner {
    /// * `mounts`: shared with the reclaimer so both serialize on the same
    ///   per-export locks
    /// * `names`: volume id policy
    /// * `identity`: stamped on every descriptor this instance produces
    pub fn new(mounts: Arc<MountManager>, names: NameBuilder, identity: impl Into<String>) -> Self {
        Self {
            mounts,
            names,
            identity: identity.into(),
        }
    }

    /// Provision one volume.
    ///
    /// Input errors are reported before anything touches the host.  A mount
    /// failure leaves at most the shared mount point directory behind; a
    /// directory failure leaves the export mounted.
    #[instrument(skip(self, req), fields(export = %req.export, name = %req.requested_name))]
    pub async fn provision(&self, req: ProvisionRequest) -> Result<VolumeDescriptor, NfsError> {
        let export = req.export.canonicalize()?;
        validate_dir_name(&req.requested_name)?;
        // Capacity is not enforced as a quota; it only has to parse.
        let capacity_bytes = if req.capacity.0.is_empty() {
            None
        } else {
            Some(req.capacity.to_bytes()?)
        };
        let volume_id =
            self.names
                .build(&req.tenant, &req.stack, &req.service, &req.requested_name)?;

        let mount = self.mounts.ensure_mounted(&export).await?;

        // The directory is named after the request, the exported path after
        // the volume id.
        let volume_dir = mount.local_mount_point.join(&req.requested_name);
        tokio::fs::create_dir_all(&volume_dir)
            .await
            .map_err(|e| NfsError::io("create volume dir", &volume_dir, e))?;

        let export_path = Path::new(&export.export_path)
            .join(&volume_id)
            .to_string_lossy()
            .into_owned();

        info!(
            volume = %volume_id,
            dir = %volume_dir.display(),
            capacity_bytes = ?capacity_bytes,
            "volume provisioned",
        );

        Ok(VolumeDescriptor {
            name: volume_id,
            export: ExportRef::new(export.server, export_path),
            capacity: req.capacity,
            access_modes: req.access_modes,
            reclaim_policy: req.reclaim_policy,
            annotations: HashMap::from([(
                ANN_PROVISIONER_IDENTITY.to_owned(),
                self.identity.clone(),
            )]),
            backing_dir: Some(req.requested_name),
        })
    }
}
