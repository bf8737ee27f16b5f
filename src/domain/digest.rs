use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// A content-addressed digest, e.g. `sha256:<hex>`.
///
/// Identity for a [`crate::domain::Manifest`] is derivable from its layer
/// digests (§3 I-nothing-numbered, "Manifest identity is a digest derivable
/// from its layer digests").
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest(String);

impl Digest {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a manifest digest from its ordered layer digests.
    ///
    /// Layer order is semantically significant (later layers mask earlier
    /// ones), so the hash folds digests in manifest order rather than a
    /// sorted order.
    pub fn from_layer_digests<'a>(layers: impl IntoIterator<Item = &'a Digest>) -> Self {
        let mut hasher = Sha256::new();
        for layer in layers {
            hasher.update(layer.as_str().as_bytes());
            hasher.update(b"\0");
        }
        Self(format!("sha256:{:x}", hasher.finalize()))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Digest {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_derivation_respects_order() {
        let a = Digest::new("sha256:aaa");
        let b = Digest::new("sha256:bbb");

        let forward = Digest::from_layer_digests([&a, &b]);
        let backward = Digest::from_layer_digests([&b, &a]);

        assert_ne!(forward, backward);
    }

    #[test]
    fn digest_derivation_is_deterministic() {
        let a = Digest::new("sha256:aaa");
        let b = Digest::new("sha256:bbb");

        let first = Digest::from_layer_digests([&a, &b]);
        let second = Digest::from_layer_digests([&a, &b]);

        assert_eq!(first, second);
    }
}
