use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// A package repository a package was installed from (e.g. an RPM repo).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub key: String,
    pub uri: String,
    pub cpe: String,
}

impl Repository {
    pub fn id(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for field in [&self.name, &self.key, &self.uri, &self.cpe] {
            hasher.update(field.as_bytes());
            hasher.update(b"\0");
        }
        hasher.finalize().into()
    }
}
