//! Core provisioner types: exports, requests, and volume descriptors.
//!
//! These types form the data model shared by the provisioner, the reclaimer,
//! and the stdio service.  They are all [`Serialize`]/[`Deserialize`] so the
//! orchestrator can hand them over as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::NfsError;

/// Storage-class parameter naming the NFS server.
pub const PARAM_NFS_SERVER: &str = "nfsServer";
/// Storage-class parameter naming the exported path on the server.
pub const PARAM_NFS_PATH: &str = "nfsPath";

/// Claim label carrying the tenant grouping key.
pub const LABEL_TENANT: &str = "io.wise2c.tenant";
/// Claim label carrying the stack grouping key.
pub const LABEL_STACK: &str = "io.wise2c.stack";
/// Claim label carrying the service grouping key.
pub const LABEL_SERVICE: &str = "io.wise2c.service";

/// Descriptor annotation recording which provisioner instance created the
/// volume.
pub const ANN_PROVISIONER_IDENTITY: &str = "nfsProvisionerIdentity";

// ---------------------------------------------------------------------------
// Exports and mounts
// ---------------------------------------------------------------------------

/// A remote NFS export, identified by server and exported path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ExportRef {
    /// Host name or address of the NFS server.
    pub server: String,
    /// Exported path on the server.
    pub export_path: String,
}

impl ExportRef {
    pub fn new(server: impl Into<String>, export_path: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            export_path: export_path.into(),
        }
    }

    /// The `server:path` form understood by `mount(8)`.
    pub fn remote_spec(&self) -> String {
        format!("{}:{}", self.server, self.export_path)
    }

    /// Reject exports that cannot be mapped to one directory under the
    /// mount root: empty fields, a server that is not a single path
    /// component, or an export path with `.`/`..` components.
    pub fn validate(&self) -> Result<(), NfsError> {
        if self.server.is_empty() {
            return Err(NfsError::invalid("nfsServer must not be empty"));
        }
        if self.export_path.is_empty() {
            return Err(NfsError::invalid("nfsPath must not be empty"));
        }
        validate_component("nfsServer", &self.server)?;
        if self.export_path.contains('\0')
            || self.export_path.split('/').any(|c| c == "." || c == "..")
        {
            return Err(NfsError::invalid(format!(
                "nfsPath {:?} must not contain . or .. components",
                self.export_path
            )));
        }
        Ok(())
    }

    /// Validate the export and return it with its path in canonical form:
    /// repeated `/` collapsed and any trailing `/` removed, except for `/`
    /// itself.
    ///
    /// Mount points and descriptor paths are derived from the canonical
    /// form only, so `/exports/data/` and `/exports//data` name the same
    /// export as `/exports/data`.
    pub fn canonicalize(&self) -> Result<Self, NfsError> {
        self.validate()?;
        let joined = self
            .export_path
            .split('/')
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        let export_path = if self.export_path.starts_with('/') {
            format!("/{joined}")
        } else {
            joined
        };
        Ok(Self::new(self.server.clone(), export_path))
    }
}

impl fmt::Display for ExportRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.export_path)
    }
}

/// An export together with the local path it is (or will be) mounted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub export: ExportRef,
    pub local_mount_point: PathBuf,
}

// ---------------------------------------------------------------------------
// Access mode, reclaim policy, capacity
// ---------------------------------------------------------------------------

/// Describes how a volume may be accessed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Single-node read-write.
    ReadWriteOnce,
    /// Multi-node read-only.
    ReadOnlyMany,
    /// Multi-node read-write.
    ReadWriteMany,
}

/// What happens to on-disk data when the volume record is deleted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReclaimPolicy {
    /// Remove the backing directory.
    #[default]
    Delete,
    /// Leave the backing directory in place.
    Retain,
}

/// Requested storage size in the orchestrator's quantity notation, e.g.
/// `"10Gi"` or `"500M"`.
///
/// The string form is what travels on the descriptor; [`Quantity::to_bytes`]
/// interprets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Quantity(pub String);

impl Quantity {
    /// Parse the quantity into a byte count, rounding fractions up.
    ///
    /// Accepts a non-negative decimal number (`1`, `1.5`, `.5`) followed by
    /// nothing, a binary suffix (`Ki`, `Mi`, `Gi`, `Ti`, `Pi`, `Ei`), a
    /// decimal suffix (`m`, `k`, `M`, `G`, `T`, `P`, `E`) or a decimal
    /// exponent (`e3`, `E-2`).
    pub fn to_bytes(&self) -> Result<u64, NfsError> {
        let invalid =
            |why: &str| NfsError::invalid(format!("invalid quantity {:?}: {why}", self.0));

        let s = self.0.trim();
        let s = s.strip_prefix('+').unwrap_or(s);
        let split = s
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        if !number.bytes().any(|b| b.is_ascii_digit()) || number.matches('.').count() > 1 {
            return Err(invalid("expected a number"));
        }
        let value: f64 = number.parse().map_err(|_| invalid("expected a number"))?;

        // Negative decimal exponents divide so that `1000m` is exactly 1.
        let scale = |exp: i32| {
            if exp >= 0 {
                value * 10f64.powi(exp)
            } else {
                value / 10f64.powi(exp.saturating_neg())
            }
        };
        let scaled = match suffix {
            "" => value,
            "m" => scale(-3),
            "k" => scale(3),
            "M" => scale(6),
            "G" => scale(9),
            "T" => scale(12),
            "P" => scale(15),
            "E" => scale(18),
            "Ki" => value * 2f64.powi(10),
            "Mi" => value * 2f64.powi(20),
            "Gi" => value * 2f64.powi(30),
            "Ti" => value * 2f64.powi(40),
            "Pi" => value * 2f64.powi(50),
            "Ei" => value * 2f64.powi(60),
            other => {
                let exponent = other
                    .strip_prefix(['e', 'E'])
                    .and_then(|exp| exp.parse::<i32>().ok())
                    .ok_or_else(|| invalid(&format!("unknown suffix {other:?}")))?;
                scale(exponent)
            }
        };

        let bytes = scaled.ceil();
        // 2^64 is exactly representable; anything at or above it overflows.
        if !bytes.is_finite() || bytes >= 2f64.powi(64) {
            return Err(invalid("overflows u64"));
        }
        Ok(bytes as u64)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Raw provisioning input as the orchestrator supplies it: storage-class
/// parameters, claim labels, and the claim's requested size and modes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionOptions {
    /// Orchestrator-generated name for the new volume.
    pub volume_name: String,
    /// Storage-class parameters; must contain `nfsServer` and `nfsPath`.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Claim labels; the `io.wise2c.*` grouping keys are read from here.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Requested capacity.
    #[serde(default)]
    pub capacity: Quantity,
    /// Requested access modes.
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    /// Storage-class reclaim policy.
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
}

/// A validated-shape request to provision one volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub export: ExportRef,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub service: String,
    /// Caller-supplied volume name; also the on-disk directory name.
    pub requested_name: String,
    #[serde(default)]
    pub capacity: Quantity,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
}

impl Default for ExportRef {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl TryFrom<ProvisionOptions> for ProvisionRequest {
    type Error = NfsError;

    /// Missing `nfsServer` / `nfsPath` keys are rejected here; empty values
    /// are rejected later by the provisioner.
    fn try_from(mut opts: ProvisionOptions) -> Result<Self, Self::Error> {
        let (Some(server), Some(path)) = (
            opts.parameters.remove(PARAM_NFS_SERVER),
            opts.parameters.remove(PARAM_NFS_PATH),
        ) else {
            return Err(NfsError::invalid(format!(
                "{PARAM_NFS_PATH} and {PARAM_NFS_SERVER} parameters required"
            )));
        };

        let mut label = |key: &str| opts.labels.remove(key).unwrap_or_default();
        let tenant = label(LABEL_TENANT);
        let stack = label(LABEL_STACK);
        let service = label(LABEL_SERVICE);

        Ok(Self {
            export: ExportRef::new(server, path),
            tenant,
            stack,
            service,
            requested_name: opts.volume_name,
            capacity: opts.capacity,
            access_modes: opts.access_modes,
            reclaim_policy: opts.reclaim_policy,
        })
    }
}

// ---------------------------------------------------------------------------
// Volume descriptor
// ---------------------------------------------------------------------------

/// Declarative record of a provisioned volume, handed to the orchestrator
/// for persistence and handed back to drive deletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeDescriptor {
    /// Volume id, `tenant-stack-service-name`.
    pub name: String,
    /// Export with `export_path` pointing at the volume's subdirectory.
    pub export: ExportRef,
    pub capacity: Quantity,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    /// Free-form annotations; carries the provisioner identity.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Name of the directory created under the export's mount point.
    /// Absent on descriptors that predate it, in which case the trailing
    /// segment of `export.export_path` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing_dir: Option<String>,
}

impl VolumeDescriptor {
    /// Identity of the provisioner instance that created the volume.
    pub fn provisioner_identity(&self) -> Option<&str> {
        self.annotations
            .get(ANN_PROVISIONER_IDENTITY)
            .map(String::as_str)
    }

    /// Split the descriptor's export path into the parent export and its
    /// trailing volume segment.
    ///
    /// `nfs1:/exports/data/acme-web-api-vol-7` yields
    /// (`nfs1:/exports/data`, `"acme-web-api-vol-7"`).
    pub fn parent_export(&self) -> Result<(ExportRef, String), NfsError> {
        let export = self.export.canonicalize()?;
        let path = Path::new(&export.export_path);
        let segment = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                NfsError::invalid(format!(
                    "export path {:?} has no volume segment",
                    self.export.export_path
                ))
            })?;
        let parent = path
            .parent()
            .and_then(|p| p.to_str())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                NfsError::invalid(format!(
                    "export path {:?} has no parent export",
                    self.export.export_path
                ))
            })?;
        Ok((
            ExportRef::new(export.server.clone(), parent),
            segment.to_owned(),
        ))
    }
}

/// Check that `name` is usable as a single directory component.
pub(crate) fn validate_dir_name(name: &str) -> Result<(), NfsError> {
    validate_component("volume directory name", name)
}

fn validate_component(what: &str, value: &str) -> Result<(), NfsError> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\0')
    {
        return Err(NfsError::invalid(format!("{value:?} is not a valid {what}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ProvisionOptions {
        ProvisionOptions {
            volume_name: "vol-7".into(),
            parameters: HashMap::from([
                (PARAM_NFS_SERVER.into(), "nfs1".into()),
                (PARAM_NFS_PATH.into(), "/exports/data".into()),
            ]),
            labels: HashMap::from([
                (LABEL_TENANT.into(), "acme".into()),
                (LABEL_STACK.into(), "web".into()),
            ]),
            capacity: "10Gi".into(),
            access_modes: vec![AccessMode::ReadWriteMany],
            reclaim_policy: ReclaimPolicy::Delete,
        }
    }

    #[test]
    fn export_remote_spec() {
        let export = ExportRef::new("nfs1", "/exports/data");
        assert_eq!(export.remote_spec(), "nfs1:/exports/data");
        assert_eq!(export.to_string(), "nfs1:/exports/data");
    }

    #[test]
    fn export_validate_rejects_empty_fields() {
        assert!(ExportRef::new("", "/exports").validate().is_err());
        assert!(ExportRef::new("nfs1", "").validate().is_err());
        assert!(ExportRef::new("nfs1", "/exports").validate().is_ok());
    }

    #[test]
    fn export_validate_rejects_traversal() {
        for server in ["..", ".", "../../outside", "a/b"] {
            assert!(
                ExportRef::new(server, "/exports").validate().is_err(),
                "server {server:?} accepted"
            );
        }
        for path in ["..", ".", "/exports/../etc", "/exports/./data", "../x"] {
            assert!(
                ExportRef::new("nfs1", path).validate().is_err(),
                "path {path:?} accepted"
            );
        }
        assert!(ExportRef::new("10.0.0.7", "/srv/nfs.v4").validate().is_ok());
    }

    #[test]
    fn export_canonical_path() {
        let canonical = |path: &str| {
            ExportRef::new("nfs1", path)
                .canonicalize()
                .unwrap()
                .export_path
        };
        assert_eq!(canonical("/exports/data"), "/exports/data");
        assert_eq!(canonical("/exports/data/"), "/exports/data");
        assert_eq!(canonical("//exports//data///"), "/exports/data");
        assert_eq!(canonical("/"), "/");
        assert_eq!(canonical("///"), "/");
        assert_eq!(canonical("exports/"), "exports");
        assert!(ExportRef::new("..", "/exports").canonicalize().is_err());
    }

    #[test]
    fn request_from_options() {
        let req = ProvisionRequest::try_from(options()).unwrap();
        assert_eq!(req.export, ExportRef::new("nfs1", "/exports/data"));
        assert_eq!(req.tenant, "acme");
        assert_eq!(req.stack, "web");
        // Missing labels become empty grouping keys.
        assert_eq!(req.service, "");
        assert_eq!(req.requested_name, "vol-7");
        assert_eq!(req.capacity, Quantity::from("10Gi"));
    }

    #[test]
    fn request_from_options_requires_server_and_path() {
        let mut opts = options();
        opts.parameters.remove(PARAM_NFS_SERVER);
        let err = ProvisionRequest::try_from(opts).unwrap_err();
        assert!(matches!(err, NfsError::InvalidArgument(_)));

        let mut opts = options();
        opts.parameters.remove(PARAM_NFS_PATH);
        assert!(ProvisionRequest::try_from(opts).is_err());
    }

    #[test]
    fn quantity_to_bytes() {
        assert_eq!(Quantity::from("10Gi").to_bytes().unwrap(), 10 << 30);
        assert_eq!(Quantity::from("500M").to_bytes().unwrap(), 500_000_000);
        assert_eq!(Quantity::from("1024").to_bytes().unwrap(), 1024);
        assert!(Quantity::from("").to_bytes().is_err());
        assert!(Quantity::from("5Xi").to_bytes().is_err());
        assert!(Quantity::from("1.2.3").to_bytes().is_err());
        assert!(Quantity::from("-1Gi").to_bytes().is_err());
        assert!(Quantity::from("99999999999Ei").to_bytes().is_err());
    }

    #[test]
    fn quantity_fractions_and_exponents() {
        assert_eq!(Quantity::from("1.5Gi").to_bytes().unwrap(), 3 << 29);
        assert_eq!(Quantity::from(".5Ki").to_bytes().unwrap(), 512);
        // Sub-byte values round up.
        assert_eq!(Quantity::from("500m").to_bytes().unwrap(), 1);
        assert_eq!(Quantity::from("2500m").to_bytes().unwrap(), 3);
        assert_eq!(Quantity::from("1000m").to_bytes().unwrap(), 1);
        assert_eq!(Quantity::from("1e3").to_bytes().unwrap(), 1000);
        assert_eq!(Quantity::from("12E2").to_bytes().unwrap(), 1200);
        assert_eq!(Quantity::from("1E").to_bytes().unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(Quantity::from("+2k").to_bytes().unwrap(), 2000);
    }

    #[test]
    fn descriptor_parent_export() {
        let desc = VolumeDescriptor {
            name: "acme-web-api-vol-7".into(),
            export: ExportRef::new("nfs1", "/exports/data/acme-web-api-vol-7"),
            capacity: "10Gi".into(),
            access_modes: vec![],
            reclaim_policy: ReclaimPolicy::Delete,
            annotations: HashMap::new(),
            backing_dir: None,
        };
        let (parent, segment) = desc.parent_export().unwrap();
        assert_eq!(parent, ExportRef::new("nfs1", "/exports/data"));
        assert_eq!(segment, "acme-web-api-vol-7");

        let mut untidy = desc.clone();
        untidy.export.export_path = "/exports//data/acme-web-api-vol-7/".into();
        assert_eq!(untidy.parent_export().unwrap(), (parent, segment));
    }

    #[test]
    fn descriptor_parent_export_rejects_bare_path() {
        let desc = VolumeDescriptor {
            name: "x".into(),
            export: ExportRef::new("nfs1", "x"),
            capacity: Quantity::default(),
            access_modes: vec![],
            reclaim_policy: ReclaimPolicy::Delete,
            annotations: HashMap::new(),
            backing_dir: None,
        };
        assert!(matches!(
            desc.parent_export(),
            Err(NfsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn descriptor_without_backing_dir_deserializes() {
        let json = r#"{
            "name": "a-b-c-d",
            "export": {"server": "nfs1", "export_path": "/exports/a-b-c-d"},
            "capacity": "1Gi"
        }"#;
        let desc: VolumeDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.backing_dir, None);
        assert_eq!(desc.reclaim_policy, ReclaimPolicy::Delete);
        assert_eq!(desc.provisioner_identity(), None);
    }

    #[test]
    fn dir_name_validation() {
        assert!(validate_dir_name("vol-7").is_ok());
        for bad in ["", ".", "..", "a/b"] {
            assert!(validate_dir_name(bad).is_err(), "{bad:?} accepted");
        }
    }
}
