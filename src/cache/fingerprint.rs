use sha2::{Digest, Sha256};

use crate::resolver::{MediaKind, QualityTier};

/// Derives the positive-cache key for a resolution request.
///
/// Each field is length-prefixed before hashing, so no choice of source URL can
/// make two different tuples feed the same bytes to the digest.
pub fn fingerprint(source_url: &str, quality: QualityTier, kind: MediaKind) -> String {
    let mut hasher = Sha256::new();
    for part in [source_url, quality.as_str(), kind.as_str()] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
