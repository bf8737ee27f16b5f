//! Worked package-scanner example: parses the dpkg status database
//! (`/var/lib/dpkg/status`), a sequence of RFC822-style stanzas separated by
//! blank lines, into [`Package`] values.

use crate::app::scanner::{LayerFilesystem, PackageScanner, ScanError, VersionedScanner};
use crate::domain::{Layer, Package, PackageKind, ScannerKind, ScannerMeta};

const STATUS_PATH: &str = "/var/lib/dpkg/status";

fn parse_stanza(stanza: &str) -> Option<Package> {
    let mut name = None;
    let mut version = None;
    let mut architecture = None;
    let mut source = None;
    let mut installed = true;

    for line in stanza.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Package" => name = Some(value.to_string()),
            "Version" => version = Some(value.to_string()),
            "Architecture" => architecture = Some(value.to_string()),
            "Source" => source = Some(value.split_whitespace().next().unwrap_or(value).to_string()),
            "Status" => installed = value.contains("installed") && !value.contains("not-installed"),
            _ => {}
        }
    }

    if !installed {
        return None;
    }

    let name = name?;
    let version = version?;
    let architecture = architecture.unwrap_or_else(|| "all".to_string());

    Some(Package::new(
        name,
        version,
        PackageKind::Binary,
        architecture,
        None,
        STATUS_PATH,
        source.map(|src_name| {
            std::sync::Arc::new(Package::new(
                src_name,
                String::new(),
                PackageKind::Source,
                "all",
                None,
                STATUS_PATH,
                None,
            ))
        }),
    ))
}

pub struct DpkgScanner;

impl VersionedScanner for DpkgScanner {
    fn meta(&self) -> ScannerMeta {
        ScannerMeta::new("dpkg", "1", ScannerKind::Package)
    }
}

#[async_trait::async_trait]
impl PackageScanner for DpkgScanner {
    async fn scan(&self, _layer: &Layer, fs: &dyn LayerFilesystem) -> Result<Vec<Package>, ScanError> {
        let Some(bytes) = fs.read_file(STATUS_PATH) else {
            return Ok(vec![]);
        };
        let text = String::from_utf8_lossy(&bytes);

        Ok(text.split("\n\n").filter_map(parse_stanza).collect())
    }
}
