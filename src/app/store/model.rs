use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{PackageId, Vulnerability};

/// One equi-join tuple element a matcher needs the store to join on (§6:
/// "MatchConstraint — a discrete tuple element used to equi-join package
/// records with vulnerability records in the store").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchConstraint {
    PackageName,
    PackageModule,
    DistributionDid,
    DistributionVersionId,
    RepositoryName,
}

/// One candidate package the matcher wants checked against the store,
/// reduced to the fields a [`MatchConstraint`] set can equi-join on.
#[derive(Clone, Debug)]
pub struct MatchQueryRecord {
    pub package_id: PackageId,
    pub package_name: String,
    pub package_module: Option<String>,
    pub package_version: String,
    pub distribution_did: Option<String>,
    pub distribution_version_id: Option<String>,
    pub repository_name: Option<String>,
}

/// Options accompanying a [`crate::app::store::Store::get`] call.
#[derive(Clone, Debug, Default)]
pub struct MatchOptions {
    /// When `true`, the store applies version-range filtering itself rather
    /// than returning every candidate for the caller to filter.
    pub version_filtering: bool,
}

/// The output of an `Updater`'s `ParseVulnerability` step, consumed
/// by `Store::update_vulnerabilities` inside one transaction.
#[derive(Clone, Debug, Default)]
pub struct ParsedVulnerabilities {
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Per-package vulnerability results returned by the matcher query (§4.4:
/// "Get(records, opts) -> map[packageId][]Vulnerability").
pub type MatchResults = HashMap<PackageId, Vec<Vulnerability>>;
