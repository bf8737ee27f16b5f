//! Worked updater example (§6.1, §1: "we build one concrete OSV-shaped
//! parser as a worked example, not as the only supported format"). Fetches
//! an [OSV](https://ossf.github.io/osv-schema/) batch document over HTTP,
//! fingerprints it by content hash, and parses it into [`Vulnerability`]
//! rows.

use std::io::{Read, Write};

use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::app::store::ParsedVulnerabilities;
use crate::app::updater::{ConfigBlob, FeedArchive, FetchOutcome, Updater, UpdaterError, VulnerabilityParser};
use crate::domain::update_operation::Fingerprint;
use crate::domain::{ArchOp, Vulnerability};

const FEED_ENTRY: &str = "osv.json";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OsvConfig {
    /// URL of a batch OSV JSON document, e.g. a `GHSA`/`PYSEC` export.
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct OsvFeed {
    #[serde(default)]
    vulns: Vec<OsvEntry>,
}

#[derive(Debug, Deserialize)]
struct OsvEntry {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    severity: Vec<OsvSeverity>,
    #[serde(default)]
    affected: Vec<OsvAffected>,
    #[serde(default)]
    references: Vec<OsvReference>,
}

#[derive(Debug, Deserialize)]
struct OsvSeverity {
    #[serde(rename = "type")]
    #[serde(default)]
    kind: String,
    #[serde(default)]
    score: String,
}

#[derive(Debug, Deserialize)]
struct OsvAffected {
    package: OsvPackage,
    #[serde(default)]
    ranges: Vec<OsvRange>,
}

#[derive(Debug, Deserialize)]
struct OsvPackage {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OsvRange {
    #[serde(default)]
    events: Vec<OsvEvent>,
}

#[derive(Debug, Deserialize)]
struct OsvEvent {
    #[serde(default)]
    fixed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsvReference {
    url: String,
}

/// Maps an OSV `severity[].score` (a CVSS vector or a bare qualitative
/// word, depending on `kind`) onto this engine's normalized severity. OSV
/// doesn't have a single "the" severity string the way an OVAL/SecDB feed
/// does, so this falls back to `Severity::normalize` on the raw score,
/// which is still total (I6, P6) even when the score looks like a CVSS
/// vector rather than a word.
fn upstream_severity(entry: &OsvEntry) -> String {
    entry
        .severity
        .iter()
        .find(|s| s.kind == "CVSS_V3" || s.kind == "CVSS_V4")
        .map(|s| s.score.clone())
        .unwrap_or_default()
}

fn fixed_in_version(affected: &OsvAffected) -> Option<String> {
    affected.ranges.iter().find_map(|range| {
        range
            .events
            .iter()
            .rev()
            .find_map(|event| event.fixed.clone())
    })
}

fn to_vulnerabilities(feed: OsvFeed) -> Vec<Vulnerability> {
    let mut out = Vec::new();
    for entry in feed.vulns {
        let links = entry.references.iter().map(|r| r.url.clone()).collect::<Vec<_>>();
        let severity = upstream_severity(&entry);

        for affected in &entry.affected {
            out.push(Vulnerability::new(
                entry.id.clone(),
                if entry.details.is_empty() { entry.summary.clone() } else { entry.details.clone() },
                severity.clone(),
                chrono::Utc::now(),
                links.clone(),
                affected.package.name.clone(),
                None,
                None,
                fixed_in_version(affected),
                None,
                ArchOp::All,
            ));
        }
    }
    out
}

pub struct OsvUpdater {
    config: OsvConfig,
}

impl OsvUpdater {
    pub fn new(config: OsvConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Updater for OsvUpdater {
    fn name(&self) -> String {
        "osv".to_string()
    }

    async fn fetch(
        &self,
        ctx: CancellationToken,
        previous: Option<&Fingerprint>,
        zip: &mut ZipWriter<std::fs::File>,
        http: &reqwest::Client,
    ) -> Result<FetchOutcome, UpdaterError> {
        if ctx.is_cancelled() {
            return Err(UpdaterError::Io(std::io::Error::from(std::io::ErrorKind::Interrupted)));
        }

        let body = http.get(&self.config.url).send().await?.bytes().await?;

        let mut hasher = Sha256::new();
        hasher.update(&body);
        let fingerprint = Fingerprint::from_bytes(hasher.finalize().to_vec());

        if previous == Some(&fingerprint) {
            return Ok(FetchOutcome::Unchanged);
        }

        zip.start_file(FEED_ENTRY, SimpleFileOptions::default())?;
        zip.write_all(&body)?;

        Ok(FetchOutcome::Updated(fingerprint))
    }

    fn as_vulnerability_parser(&self) -> Option<&dyn VulnerabilityParser> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl VulnerabilityParser for OsvUpdater {
    async fn parse_vulnerability(
        &self,
        _ctx: CancellationToken,
        archive: &dyn FeedArchive,
    ) -> Result<ParsedVulnerabilities, UpdaterError> {
        let bytes = archive
            .read(FEED_ENTRY)
            .ok_or_else(|| UpdaterError::Parse(format!("{FEED_ENTRY} missing from archive")))?;

        let mut reader = std::io::Cursor::new(bytes);
        let mut contents = String::new();
        reader
            .read_to_string(&mut contents)
            .map_err(|e| UpdaterError::Parse(e.to_string()))?;

        let feed: OsvFeed = serde_json::from_str(&contents).map_err(|e| UpdaterError::Parse(e.to_string()))?;

        Ok(ParsedVulnerabilities {
            vulnerabilities: to_vulnerabilities(feed),
        })
    }
}

#[async_trait::async_trait]
impl crate::app::updater::UpdaterFactory for OsvUpdaterFactory {
    fn name(&self) -> String {
        "osv".to_string()
    }

    async fn create(&self, _ctx: CancellationToken, config: &ConfigBlob) -> Vec<std::sync::Arc<dyn Updater>> {
        let config: OsvConfig = config.unmarshal().unwrap_or_default();
        vec![std::sync::Arc::new(OsvUpdater::new(config))]
    }
}

pub struct OsvUpdaterFactory;
