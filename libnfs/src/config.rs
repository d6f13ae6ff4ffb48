//! Provisioner configuration.
//!
//! Environment variables:
//! - `PROVISIONER_NAME`: identity of this provisioner instance. Required.
//! - `RKNFS_MOUNT_ROOT`: directory under which exports are mounted.
//!   Defaults to `/persistentvolumes`.
//! - `RKNFS_MOUNT_TIMEOUT_SECS`: deadline for one mount invocation.
//!   Defaults to `30`.
//! - `RKNFS_STRICT_NAMES`: set to `1` to reject grouping labels containing
//!   `-`. Defaults to `0`.
//! - `RKNFS_MOUNT_COMMAND`: mount command and leading arguments, split on
//!   whitespace, e.g. `mount -t nfs -o vers=4.1`. Defaults to `mount`.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::NfsError;
use crate::executor::DEFAULT_MOUNT_TIMEOUT;
use crate::mount::DEFAULT_MOUNT_ROOT;
use crate::naming::NamePolicy;

pub const ENV_PROVISIONER_NAME: &str = "PROVISIONER_NAME";
pub const ENV_MOUNT_ROOT: &str = "RKNFS_MOUNT_ROOT";
pub const ENV_MOUNT_TIMEOUT_SECS: &str = "RKNFS_MOUNT_TIMEOUT_SECS";
pub const ENV_STRICT_NAMES: &str = "RKNFS_STRICT_NAMES";
pub const ENV_MOUNT_COMMAND: &str = "RKNFS_MOUNT_COMMAND";

/// Settings shared by the provisioner and the reclaimer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Identity stamped on, and required of, every descriptor.
    pub identity: String,
    pub mount_root: PathBuf,
    pub mount_timeout: Duration,
    pub naming_policy: NamePolicy,
    /// Mount program.
    pub mount_command: String,
    /// Arguments placed before `<remote> <target>`.
    pub mount_args: Vec<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            identity: String::new(),
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
            mount_timeout: DEFAULT_MOUNT_TIMEOUT,
            naming_policy: NamePolicy::Plain,
            mount_command: "mount".to_owned(),
            mount_args: Vec::new(),
        }
    }
}

impl ProvisionerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, NfsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.  Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, NfsError> {
        let mut config = Self::default();

        if let Some(identity) = lookup(ENV_PROVISIONER_NAME) {
            config.identity = identity;
        }
        if let Some(root) = lookup(ENV_MOUNT_ROOT) {
            config.mount_root = PathBuf::from(root);
        }
        if let Some(secs) = lookup(ENV_MOUNT_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                NfsError::invalid(format!("{ENV_MOUNT_TIMEOUT_SECS}={secs:?}: {e}"))
            })?;
            config.mount_timeout = Duration::from_secs(secs);
        }
        if let Some(strict) = lookup(ENV_STRICT_NAMES) {
            config.naming_policy = if strict == "1" {
                NamePolicy::Strict
            } else {
                NamePolicy::Plain
            };
        }
        if let Some(command) = lookup(ENV_MOUNT_COMMAND) {
            let mut parts = command.split_whitespace().map(str::to_owned);
            let program = parts
                .next()
                .ok_or_else(|| NfsError::invalid(format!("{ENV_MOUNT_COMMAND} is empty")))?;
            config.mount_command = program;
            config.mount_args = parts.collect();
        }

        Ok(config)
    }

    /// Check the settings a provisioner cannot run without.
    pub fn validate(&self) -> Result<(), NfsError> {
        if self.identity.is_empty() {
            return Err(NfsError::invalid(format!(
                "provisioner identity is not set, set {ENV_PROVISIONER_NAME}"
            )));
        }
        // Mount points are compared with the absolute paths of the host
        // mount table.
        if !self.mount_root.is_absolute() {
            return Err(NfsError::invalid(format!(
                "mount root {} must be an absolute path",
                self.mount_root.display()
            )));
        }
        if self.mount_timeout.is_zero() {
            return Err(NfsError::invalid("mount timeout must be greater than zero"));
        }
        if self.mount_command.is_empty() {
            return Err(NfsError::invalid("mount command must not be empty"));
        }
        Ok(())
    }
}
