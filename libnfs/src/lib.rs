//! # libnfs: dynamic NFS volume provisioning for RK8s
//!
//! `libnfs` is the volume-lifecycle core of an NFS provisioner.  Given a
//! storage-class export (`nfsServer`, `nfsPath`) it mounts the export on the
//! local host once, creates one subdirectory per volume, and hands back a
//! [`VolumeDescriptor`] the orchestrator persists.  Deleting a volume needs
//! only that descriptor.  It follows the RK8s conventions (Tokio async
//! runtime, `tracing` for observability, `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data model: `ExportRef`, `ProvisionRequest`, `VolumeDescriptor`. |
//! | [`error`] | [`NfsError`] enum and its retry classes. |
//! | [`config`] | [`ProvisionerConfig`], read from the environment. |
//! | [`mount_table`] | [`MountTable`] trait: live host mount state. |
//! | [`executor`] | [`MountExecutor`] trait: bounded `mount(8)` invocation. |
//! | [`mount`] | [`MountManager`]: per-export serialized, idempotent mounting. |
//! | [`naming`] | Volume id construction and collision policy. |
//! | [`provisioner`] | [`VolumeProvisioner`]: volume creation. |
//! | [`reclaimer`] | [`VolumeReclaimer`]: volume deletion. |
//! | [`controller`] | [`Provisioner`] trait and [`NfsProvisioner`]. |
//! | [`message`] | [`ProvisionerMessage`] request/response envelope. |
//! | [`server`] | Line-oriented JSON service over any async stream. |

pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod message;
pub mod mount;
pub mod mount_table;
pub mod naming;
pub mod provisioner;
pub mod reclaimer;
pub mod server;
pub mod types;

#[cfg(test)]
mod fake;

// Re-export the most commonly used items at crate root for convenience.
pub use config::ProvisionerConfig;
pub use controller::{NfsProvisioner, Provisioner};
pub use error::{ErrorKind, NfsError};
pub use executor::{CommandMountExecutor, MountExecutor};
pub use message::ProvisionerMessage;
pub use mount::MountManager;
pub use mount_table::{MountTable, ProcMountTable};
pub use naming::{NameBuilder, NamePolicy};
pub use provisioner::VolumeProvisioner;
pub use reclaimer::VolumeReclaimer;
pub use types::*;
