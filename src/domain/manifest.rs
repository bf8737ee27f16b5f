use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Digest;

/// One filesystem layer reference inside a [`Manifest`].
///
/// This is the *reference*, not the unpacked layer content: it is what the
/// layer fetcher needs to retrieve the archive. The unpacked filesystem
/// view handed to scanners is an opaque type owned by `app::layer_fetch`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRef {
    pub digest: Digest,
    pub uri: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl LayerRef {
    pub fn new(digest: Digest, uri: impl Into<String>) -> Self {
        Self {
            digest,
            uri: uri.into(),
            headers: HashMap::new(),
        }
    }
}

/// An ordered sequence of layer references constituting a container image.
///
/// Layer order is semantically significant: later layers mask earlier ones.
/// Manifest identity is a digest derived from the ordered layer digests via
/// [`Digest::from_layer_digests`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    layers: Vec<LayerRef>,
}

impl Manifest {
    pub fn new(layers: Vec<LayerRef>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerRef] {
        &self.layers
    }

    pub fn hash(&self) -> Digest {
        Digest::from_layer_digests(self.layers.iter().map(|l| &l.digest))
    }
}
