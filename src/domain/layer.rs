use serde::{Deserialize, Serialize};

use super::Digest;

/// One filesystem archive in a manifest, as seen by scanners and coalescers.
///
/// Unlike the teacher's `domain::scanresult::Layer`, this type carries no
/// back-reference to the packages found in it: in this engine, package→layer
/// association is recorded in [`crate::domain::IndexReport`]'s
/// `package_introduced_in` map (I3), not as a mutable edge on the layer
/// itself. `Layer` is a plain, `Clone`-able value so it can be handed to
/// many concurrent `(layer, scanner)` tasks without synchronization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layer {
    digest: Digest,
    index: usize,
}

impl Layer {
    pub fn new(digest: Digest, index: usize) -> Self {
        Self { digest, index }
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Position within the manifest; 0 is the base layer.
    pub fn index(&self) -> usize {
        self.index
    }
}
