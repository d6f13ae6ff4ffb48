//! Volume naming.
//!
//! A volume id is `tenant-stack-service-name`.  Components are joined as-is,
//! so `("a-b", "c", ...)` and `("a", "b-c", ...)` produce the same id under
//! [`NamePolicy::Plain`].  [`NamePolicy::Strict`] closes that gap by refusing
//! components that contain the separator.

use serde::{Deserialize, Serialize};

use crate::error::NfsError;

/// Separator between volume id components.
pub const VOLUME_NAME_SEPARATOR: char = '-';

/// Join the four grouping components into a volume id.
pub fn build_name(tenant: &str, stack: &str, service: &str, requested_name: &str) -> String {
    let sep = VOLUME_NAME_SEPARATOR;
    format!("{tenant}{sep}{stack}{sep}{service}{sep}{requested_name}")
}

/// How component values containing the separator are treated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NamePolicy {
    /// Join components verbatim; ids may collide.
    #[default]
    Plain,
    /// Reject tenant/stack/service values containing the separator.
    ///
    /// The requested name is the last component and may contain it: with
    /// separator-free prefixes the split point is unambiguous.
    Strict,
}

/// Builds volume ids under a [`NamePolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NameBuilder {
    policy: NamePolicy,
}

impl NameBuilder {
    pub fn new(policy: NamePolicy) -> Self {
        Self { policy }
    }

    /// Compute the volume id, enforcing the configured policy.
    ///
    /// The id is the last segment of the descriptor's export path, so a
    /// grouping value containing `/` is rejected under every policy.
    pub fn build(
        &self,
        tenant: &str,
        stack: &str,
        service: &str,
        requested_name: &str,
    ) -> Result<String, NfsError> {
        for (label, value) in [("tenant", tenant), ("stack", stack), ("service", service)] {
            if value.contains(['/', '\0']) {
                return Err(NfsError::invalid(format!(
                    "{label} {value:?} must not contain '/' or NUL"
                )));
            }
            if self.policy == NamePolicy::Strict && value.contains(VOLUME_NAME_SEPARATOR) {
                return Err(NfsError::invalid(format!(
                    "{label} {value:?} contains the volume name separator {VOLUME_NAME_SEPARATOR:?}"
                )));
            }
        }
        Ok(build_name(tenant, stack, service, requested_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_in_order() {
        assert_eq!(build_name("acme", "web", "api", "vol-7"), "acme-web-api-vol-7");
        assert_eq!(build_name("", "", "", "pvc-1"), "---pvc-1");
    }

    #[test]
    fn distinct_tuples_distinct_names() {
        let a = build_name("t1", "s1", "svc1", "vol1");
        assert_ne!(a, build_name("t1", "s1", "svc1", "vol2"));
        assert_ne!(a, build_name("t1-s1", "svc1", "vol1", "x"));
    }

    #[test]
    fn plain_policy_admits_collisions() {
        let names = NameBuilder::new(NamePolicy::Plain);
        let a = names.build("a-b", "c", "d", "e").unwrap();
        let b = names.build("a", "b-c", "d", "e").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn slash_in_grouping_value_is_rejected() {
        for policy in [NamePolicy::Plain, NamePolicy::Strict] {
            let names = NameBuilder::new(policy);
            assert!(names.build("acme/corp", "web", "api", "v").is_err());
            assert!(names.build("acme", "web/", "api", "v").is_err());
            assert!(names.build("acme", "web", "/api", "v").is_err());
        }
    }

    #[test]
    fn strict_policy_rejects_separator_in_prefix() {
        let names = NameBuilder::new(NamePolicy::Strict);
        let err = names.build("a-b", "c", "d", "e").unwrap_err();
        assert!(matches!(err, NfsError::InvalidArgument(_)));
        assert!(names.build("a", "b-c", "d", "e").is_err());
        assert!(names.build("a", "b", "c-d", "e").is_err());

        // The trailing name keeps its dashes.
        assert_eq!(
            names.build("acme", "web", "api", "vol-7").unwrap(),
            "acme-web-api-vol-7"
        );
    }
}
