//! Offline updater archive, zip-of-zips v1: a self-contained snapshot
//! of every updater's latest fetched feed, for air-gapped deployments that
//! cannot reach the network updaters normally hit.
//!
//! Layout:
//! - outer zip comment: `ClaircoreUpdaterExport=1`, percent-encoded
//! - `config.json` at the archive root
//! - one directory per updater, `<name>/data` (zstd), `<name>/fingerprint`
//!   and `<name>/ref` (deflate, small)

use std::io::{Cursor, Read, Write};

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use thiserror::Error;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::app::error::{Classify, ErrorKind};
use crate::domain::update_operation::Fingerprint;

const EXPORT_MARKER: &str = "ClaircoreUpdaterExport=1";

#[derive(Error, Debug)]
pub enum OfflineArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config.json is not valid JSON: {0}")]
    Config(#[from] serde_json::Error),

    #[error("archive is missing marker comment")]
    MissingMarker,

    #[error("archive entry {0} is missing")]
    MissingEntry(String),

    #[error("ref entry for updater {0} is not a valid uuid")]
    InvalidRef(String),
}

impl Classify for OfflineArchiveError {
    fn kind(&self) -> ErrorKind {
        match self {
            OfflineArchiveError::Zip(_) | OfflineArchiveError::Io(_) => ErrorKind::Internal,
            OfflineArchiveError::Config(_)
            | OfflineArchiveError::MissingMarker
            | OfflineArchiveError::MissingEntry(_)
            | OfflineArchiveError::InvalidRef(_) => ErrorKind::Permanent,
        }
    }
}

/// One updater's contribution to an offline export.
pub struct OfflineUpdaterEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub fingerprint: Fingerprint,
    pub reference: Uuid,
}

/// The full contents of a zip-of-zips export.
pub struct OfflineExport {
    pub config: serde_json::Value,
    pub entries: Vec<OfflineUpdaterEntry>,
}

pub fn write_offline_export(export: &OfflineExport) -> Result<Vec<u8>, OfflineArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    writer.start_file("config.json", SimpleFileOptions::default())?;
    writer.write_all(serde_json::to_string_pretty(&export.config)?.as_bytes())?;

    let small = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let large = SimpleFileOptions::default().compression_method(CompressionMethod::Zstd);

    for entry in &export.entries {
        writer.start_file(format!("{}/data", entry.name), large)?;
        writer.write_all(&entry.data)?;

        writer.start_file(format!("{}/fingerprint", entry.name), small)?;
        writer.write_all(&entry.fingerprint.0)?;

        writer.start_file(format!("{}/ref", entry.name), small)?;
        writer.write_all(entry.reference.to_string().as_bytes())?;
    }

    let marker: String = utf8_percent_encode(EXPORT_MARKER, NON_ALPHANUMERIC).collect();
    writer.set_comment(marker);
    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

pub fn read_offline_export(bytes: Vec<u8>) -> Result<OfflineExport, OfflineArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let comment = String::from_utf8_lossy(archive.comment()).into_owned();
    let decoded = percent_decode_str(&comment).decode_utf8_lossy();
    if decoded != EXPORT_MARKER {
        return Err(OfflineArchiveError::MissingMarker);
    }

    let config = read_entry_json(&mut archive, "config.json")?;

    let mut names: Vec<String> = archive
        .file_names()
        .filter_map(|path| path.strip_suffix("/data").map(str::to_string))
        .collect();
    names.sort();

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let data = read_entry_bytes(&mut archive, &format!("{name}/data"))?;
        let fingerprint = Fingerprint::from_bytes(read_entry_bytes(&mut archive, &format!("{name}/fingerprint"))?);
        let reference_raw = read_entry_bytes(&mut archive, &format!("{name}/ref"))?;
        let reference = Uuid::parse_str(String::from_utf8_lossy(&reference_raw).trim())
            .map_err(|_| OfflineArchiveError::InvalidRef(name.clone()))?;

        entries.push(OfflineUpdaterEntry {
            name,
            data,
            fingerprint,
            reference,
        });
    }

    Ok(OfflineExport { config, entries })
}

fn read_entry_bytes<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<Vec<u8>, OfflineArchiveError> {
    let mut file = archive
        .by_name(path)
        .map_err(|_| OfflineArchiveError::MissingEntry(path.to_string()))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_entry_json<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<serde_json::Value, OfflineArchiveError> {
    let bytes = read_entry_bytes(archive, path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
