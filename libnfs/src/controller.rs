//! Orchestrator-facing provisioner.
//!
//! The [`Provisioner`] trait is the call boundary the orchestrator drives:
//! one `provision` per new claim, one `delete` per released volume.
//! [`NfsProvisioner`] implements it on top of a [`VolumeProvisioner`] and a
//! [`VolumeReclaimer`] that share one [`MountManager`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProvisionerConfig;
use crate::error::NfsError;
use crate::executor::{CommandMountExecutor, MountExecutor};
use crate::mount::MountManager;
use crate::mount_table::{MountTable, ProcMountTable};
use crate::naming::NameBuilder;
use crate::provisioner::VolumeProvisioner;
use crate::reclaimer::VolumeReclaimer;
use crate::types::{ProvisionOptions, ProvisionRequest, VolumeDescriptor};

/// Volume lifecycle operations invoked by the orchestrator.
///
/// The orchestrator guarantees at most one in-flight call per volume and may
/// repeat a call after a partial failure; implementations must be safe to
/// call again with the same input.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Identity stamped on descriptors produced by this provisioner.
    fn identity(&self) -> &str;

    /// Create the volume described by `options` and return its descriptor.
    async fn provision(&self, options: ProvisionOptions) -> Result<VolumeDescriptor, NfsError>;

    /// Remove the on-disk data of a volume previously returned by
    /// [`Provisioner::provision`].
    async fn delete(&self, volume: &VolumeDescriptor) -> Result<(), NfsError>;
}

/// NFS-backed [`Provisioner`].
pub struct NfsProvisioner {
    identity: String,
    mounts: Arc<MountManager>,
    provisioner: VolumeProvisioner,
    reclaimer: VolumeReclaimer,
}

impl NfsProvisioner {
    /// Build a provisioner that reads `/proc/self/mounts` and runs the
    /// configured mount command.
    pub fn new(config: &ProvisionerConfig) -> Result<Self, NfsError> {
        config.validate()?;
        let executor = CommandMountExecutor::new(
            config.mount_command.clone(),
            config.mount_args.clone(),
            config.mount_timeout,
        );
        Ok(Self::with_parts(
            config,
            Arc::new(ProcMountTable::default()),
            Arc::new(executor),
        ))
    }

    /// Build a provisioner over an explicit mount table and executor.
    pub fn with_parts(
        config: &ProvisionerConfig,
        table: Arc<dyn MountTable>,
        executor: Arc<dyn MountExecutor>,
    ) -> Self {
        let mounts = Arc::new(MountManager::new(
            config.mount_root.clone(),
            table,
            executor,
        ));
        Self {
            identity: config.identity.clone(),
            provisioner: VolumeProvisioner::new(
                mounts.clone(),
                NameBuilder::new(config.naming_policy),
                config.identity.clone(),
            ),
            reclaimer: VolumeReclaimer::new(mounts.clone(), config.identity.clone()),
            mounts,
        }
    }

    pub fn mounts(&self) -> &MountManager {
        &self.mounts
    }
}

#[async_trait]
impl Provisioner for NfsProvisioner {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn provision(&self, options: ProvisionOptions) -> Result<VolumeDescriptor, NfsError> {
        let request = ProvisionRequest::try_from(options)?;
        self.provisioner.provision(request).await
    }

    async fn delete(&self, volume: &VolumeDescriptor) -> Result<(), NfsError> {
        self.reclaimer.delete(volume).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeMounts;
    use crate::types::{
        ExportRef, LABEL_SERVICE, LABEL_STACK, LABEL_TENANT, PARAM_NFS_PATH, PARAM_NFS_SERVER,
    };
    use std::collections::HashMap;
    use std::path::Path;

    fn config(root: &Path) -> ProvisionerConfig {
        ProvisionerConfig {
            identity: "wise2c.com/nfs".into(),
            mount_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    fn options(name: &str) -> ProvisionOptions {
        ProvisionOptions {
            volume_name: name.into(),
            parameters: HashMap::from([
                (PARAM_NFS_SERVER.into(), "nfs1".into()),
                (PARAM_NFS_PATH.into(), "/exports/data".into()),
            ]),
            labels: HashMap::from([
                (LABEL_TENANT.into(), "acme".into()),
                (LABEL_STACK.into(), "web".into()),
                (LABEL_SERVICE.into(), "api".into()),
            ]),
            capacity: "10Gi".into(),
            ..Default::default()
        }
    }

    #[test]
    fn new_requires_identity() {
        let result = NfsProvisioner::new(&ProvisionerConfig::default());
        assert!(matches!(result, Err(NfsError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn provision_then_delete_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mounts = Arc::new(FakeMounts::default());
        let p = NfsProvisioner::with_parts(&config(tmp.path()), mounts.clone(), mounts.clone());

        let desc = p.provision(options("vol-7")).await.unwrap();
        assert_eq!(desc.name, "acme-web-api-vol-7");
        assert_eq!(desc.export.export_path, "/exports/data/acme-web-api-vol-7");
        assert_eq!(desc.provisioner_identity(), Some(p.identity()));

        let mount_point = p
            .mounts()
            .local_mount_point(&ExportRef::new("nfs1", "/exports/data"));
        assert!(mount_point.join("vol-7").is_dir());

        p.delete(&desc).await.unwrap();
        assert!(!mount_point.join("vol-7").exists());
        assert_eq!(std::fs::read_dir(&mount_point).unwrap().count(), 0);
        // The shared export stays mounted.
        assert_eq!(mounts.mount_calls(), 1);
    }

    #[tokio::test]
    async fn missing_parameters_are_config_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let mounts = Arc::new(FakeMounts::default());
        let p = NfsProvisioner::with_parts(&config(tmp.path()), mounts.clone(), mounts.clone());

        let mut opts = options("vol-1");
        opts.parameters.clear();
        let err = p.provision(opts).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(mounts.mount_calls(), 0);
    }
}
