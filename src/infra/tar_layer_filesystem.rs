//! Minimal tar-backed decoder for the abstract filesystem view scanners read
//! from (§1: "the on-disk layer archive decoder" is out of scope beyond a
//! decoder sufficient to exercise the pipeline). Reads the whole spool into
//! memory via the `tar` crate, already a teacher dependency.

use std::collections::HashMap;
use std::io::Read;

use crate::app::layer_fetch::{FetchedLayer, LayerFetchError, LayerUnpacker, Spool};
use crate::app::scanner::LayerFilesystem;

/// Every regular file in a layer's tar archive, slurped into memory keyed
/// by its absolute path (leading `/` normalized on).
pub struct TarLayerFilesystem {
    files: HashMap<String, Vec<u8>>,
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_start_matches("./");
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl LayerFilesystem for TarLayerFilesystem {
    fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(&normalize(path)).cloned()
    }

    fn list_files(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }
}

pub struct TarUnpacker;

impl LayerUnpacker for TarUnpacker {
    fn unpack(&self, fetched: &FetchedLayer) -> Result<std::sync::Arc<dyn LayerFilesystem>, LayerFetchError> {
        let digest = fetched.layer.digest.to_string();
        let bytes = match &fetched.spool {
            Spool::Memory(b) => b.to_vec(),
            Spool::Disk(f) => std::fs::read(f.path()).map_err(|source| LayerFetchError::Io {
                digest: digest.clone(),
                source,
            })?,
        };

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut files = HashMap::new();
        let entries = archive.entries().map_err(|source| LayerFetchError::Io {
            digest: digest.clone(),
            source,
        })?;

        for entry in entries {
            let mut entry = entry.map_err(|source| LayerFetchError::Io {
                digest: digest.clone(),
                source,
            })?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry
                .path()
                .map_err(|source| LayerFetchError::Io {
                    digest: digest.clone(),
                    source,
                })?
                .to_string_lossy()
                .into_owned();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(|source| LayerFetchError::Io {
                digest: digest.clone(),
                source,
            })?;
            files.insert(normalize(&path), content);
        }

        Ok(std::sync::Arc::new(TarLayerFilesystem { files }))
    }
}
