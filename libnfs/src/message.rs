//! Provisioner protocol messages.
//!
//! [`ProvisionerMessage`] is the envelope for every request and response
//! exchanged with the orchestrator over the line-oriented service in
//! [`crate::server`].  Each request line is answered by exactly one response
//! line.

use serde::{Deserialize, Serialize};

use crate::error::NfsError;
use crate::types::{ProvisionOptions, VolumeDescriptor};

/// Top-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProvisionerMessage {
    // ----- Requests --------------------------------------------------------
    /// Provision a new volume.
    Provision(ProvisionOptions),
    /// Delete a previously provisioned volume.
    Delete(VolumeDescriptor),

    // ----- Responses -------------------------------------------------------
    /// A volume was provisioned.
    Provisioned(VolumeDescriptor),
    /// A volume was deleted.
    Deleted,
    /// The request failed.
    Error(NfsError),
}

impl std::fmt::Display for ProvisionerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provision(opts) => write!(f, "Provision(name={})", opts.volume_name),
            Self::Delete(vol) => write!(f, "Delete({})", vol.name),
            Self::Provisioned(vol) => write!(f, "Provisioned({})", vol.name),
            Self::Deleted => f.write_str("Deleted"),
            Self::Error(e) => write!(f, "Error({})", e),
        }
    }
}
