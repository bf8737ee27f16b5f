use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{EnrichmentRecord, PackageId, Vulnerability, VulnerabilityId};

/// Final per-manifest output linking packages to vulnerabilities and
/// enrichments.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    pub vulnerabilities: HashMap<VulnerabilityId, Vulnerability>,
    pub package_vulnerabilities: HashMap<PackageId, Vec<VulnerabilityId>>,
    pub enrichments: HashMap<String, Vec<EnrichmentRecord>>,
}

impl VulnerabilityReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `package` is affected by `vuln`, deduplicating both the
    /// vulnerability row and the per-package association.
    pub fn add_finding(&mut self, package: PackageId, vuln: Vulnerability) {
        let id = vuln.id();
        self.vulnerabilities.entry(id.clone()).or_insert(vuln);
        let entry = self.package_vulnerabilities.entry(package).or_default();
        if !entry.contains(&id) {
            entry.push(id);
        }
    }
}
