use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Identity of a Linux distribution as reported by a distribution scanner.
///
/// Generalizes the teacher's `domain::scanresult::OperatingSystem` (which
/// only carried a `Family` and a display `name`) to the full tuple the spec
/// requires for CPE-based matching.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub did: String,
    pub name: String,
    pub version: String,
    pub version_code_name: String,
    pub version_id: String,
    pub arch: String,
    pub cpe: String,
}

impl Distribution {
    pub fn is_empty(&self) -> bool {
        self.did.is_empty() && self.name.is_empty() && self.version.is_empty()
    }

    pub fn id(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for field in [
            &self.did,
            &self.name,
            &self.version,
            &self.version_code_name,
            &self.version_id,
            &self.arch,
            &self.cpe,
        ] {
            hasher.update(field.as_bytes());
            hasher.update(b"\0");
        }
        hasher.finalize().into()
    }
}
