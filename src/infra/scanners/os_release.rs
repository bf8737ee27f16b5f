//! Worked distribution-scanner example (§6.2, S3): parses `/etc/os-release`
//! (falling back to `/usr/lib/os-release`) into a [`Distribution`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::app::scanner::{DistributionScanner, LayerFilesystem, ScanError, VersionedScanner};
use crate::domain::{Distribution, Layer, ScannerKind, ScannerMeta};

static VERSION_CODENAME_FALLBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+(?:\.\d+)*\s*\(([^)]+)\)\s*$").expect("static regex is valid"));

fn parse_os_release(contents: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        fields.insert(key.to_string(), value.to_string());
    }
    fields
}

/// Extracts the distribution's codename. Prefers the explicit
/// `VERSION_CODENAME` field; when absent, falls back to the parenthesized
/// token in `VERSION` (e.g. `VERSION="11 (bullseye)"` yields `bullseye`) —
/// "regex fallback on VERSION="11 (bullseye)" without VERSION_CODENAME
/// yields the same VersionCodeName".
fn version_code_name(fields: &HashMap<String, String>) -> String {
    if let Some(explicit) = fields.get("VERSION_CODENAME") {
        return explicit.clone();
    }
    fields
        .get("VERSION")
        .and_then(|version| VERSION_CODENAME_FALLBACK.captures(version))
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

pub struct OsReleaseScanner;

impl VersionedScanner for OsReleaseScanner {
    fn meta(&self) -> ScannerMeta {
        ScannerMeta::new("os-release", "1", ScannerKind::Distribution)
    }
}

#[async_trait::async_trait]
impl DistributionScanner for OsReleaseScanner {
    async fn scan(&self, _layer: &Layer, fs: &dyn LayerFilesystem) -> Result<Option<Distribution>, ScanError> {
        let contents = fs
            .read_file("/etc/os-release")
            .or_else(|| fs.read_file("/usr/lib/os-release"));

        let Some(bytes) = contents else {
            return Ok(None);
        };

        let text = String::from_utf8_lossy(&bytes);
        let fields = parse_os_release(&text);

        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(Distribution {
            did: fields.get("ID").cloned().unwrap_or_default(),
            name: fields.get("NAME").cloned().unwrap_or_default(),
            version: fields.get("VERSION").cloned().unwrap_or_default(),
            version_code_name: version_code_name(&fields),
            version_id: fields.get("VERSION_ID").cloned().unwrap_or_default(),
            arch: String::new(),
            cpe: fields.get("CPE_NAME").cloned().unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Digest;

    struct FakeFs(HashMap<&'static str, &'static [u8]>);

    impl LayerFilesystem for FakeFs {
        fn read_file(&self, path: &str) -> Option<Vec<u8>> {
            self.0.get(path).map(|b| b.to_vec())
        }
        fn list_files(&self) -> Vec<String> {
            self.0.keys().map(|s| s.to_string()).collect()
        }
    }

    fn layer() -> Layer {
        Layer::new(Digest::new("sha256:a"), 0)
    }

    #[tokio::test]
    async fn debian_os_release_with_explicit_codename() {
        let contents = b"ID=debian\nNAME=\"Debian GNU/Linux\"\nVERSION_ID=\"11\"\nVERSION_CODENAME=bullseye\n";
        let fs = FakeFs(HashMap::from([("/etc/os-release", contents.as_slice())]));

        let dist = OsReleaseScanner.scan(&layer(), &fs).await.unwrap().unwrap();

        assert_eq!(dist.did, "debian");
        assert_eq!(dist.version_id, "11");
        assert_eq!(dist.version_code_name, "bullseye");
    }

    #[tokio::test]
    async fn regex_fallback_extracts_codename_from_version_field() {
        let contents = b"ID=debian\nVERSION_ID=\"11\"\nVERSION=\"11 (bullseye)\"\n";
        let fs = FakeFs(HashMap::from([("/etc/os-release", contents.as_slice())]));

        let dist = OsReleaseScanner.scan(&layer(), &fs).await.unwrap().unwrap();

        assert_eq!(dist.version_code_name, "bullseye");
    }

    #[tokio::test]
    async fn missing_os_release_yields_none() {
        let fs = FakeFs(HashMap::new());
        assert!(OsReleaseScanner.scan(&layer(), &fs).await.unwrap().is_none());
    }
}
