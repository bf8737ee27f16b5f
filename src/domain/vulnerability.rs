use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::{Distribution, Repository, Severity};

/// How a fixed-in version range constrains affected architectures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchOp {
    /// The vulnerability affects every architecture.
    All,
    /// The vulnerability affects only the named architecture.
    Only(String),
}

/// Deduplication identity for a [`Vulnerability`]: a hash over the
/// identifying fields (§3: "Identity for deduplication is a hash over these
/// identifying fields").
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct VulnerabilityId(pub [u8; 32]);

/// A single vulnerability record as ingested from an updater feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vulnerability {
    pub name: String,
    pub description: String,
    pub upstream_severity: String,
    pub severity: Severity,
    pub issued: DateTime<Utc>,
    pub links: Vec<String>,
    pub affected_package_name: String,
    pub affected_distribution: Option<Distribution>,
    pub affected_repository: Option<Repository>,
    pub fixed_in_version: Option<String>,
    pub version_range: Option<String>,
    pub arch_op: ArchOp,
}

impl Vulnerability {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        upstream_severity: impl Into<String>,
        issued: DateTime<Utc>,
        links: Vec<String>,
        affected_package_name: impl Into<String>,
        affected_distribution: Option<Distribution>,
        affected_repository: Option<Repository>,
        fixed_in_version: Option<String>,
        version_range: Option<String>,
        arch_op: ArchOp,
    ) -> Self {
        let upstream_severity = upstream_severity.into();
        let severity = Severity::normalize(&upstream_severity);
        Self {
            name: name.into(),
            description: description.into(),
            upstream_severity,
            severity,
            issued,
            links,
            affected_package_name: affected_package_name.into(),
            affected_distribution,
            affected_repository,
            fixed_in_version,
            version_range,
            arch_op,
        }
    }

    pub fn id(&self) -> VulnerabilityId {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.affected_package_name.as_bytes());
        hasher.update(b"\0");
        if let Some(dist) = &self.affected_distribution {
            hasher.update(dist.id());
        }
        hasher.update(b"\0");
        if let Some(repo) = &self.affected_repository {
            hasher.update(repo.id());
        }
        hasher.update(b"\0");
        hasher.update(self.fixed_in_version.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\0");
        hasher.update(self.version_range.as_deref().unwrap_or("").as_bytes());
        VulnerabilityId(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vuln(name: &str, fixed_in: Option<&str>) -> Vulnerability {
        Vulnerability::new(
            name,
            "description",
            "high",
            Utc::now(),
            vec![],
            "openssl",
            None,
            None,
            fixed_in.map(str::to_owned),
            None,
            ArchOp::All,
        )
    }

    #[test]
    fn dedup_identity_ignores_description_and_links() {
        let a = vuln("CVE-2024-0001", Some("1.2.3"));
        let mut b = vuln("CVE-2024-0001", Some("1.2.3"));
        b.description = "a completely different description".to_string();
        b.links = vec!["https://example.test".to_string()];

        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn dedup_identity_changes_with_fixed_version() {
        let a = vuln("CVE-2024-0001", Some("1.2.3"));
        let b = vuln("CVE-2024-0001", Some("1.2.4"));

        assert_ne!(a.id(), b.id());
    }
}
