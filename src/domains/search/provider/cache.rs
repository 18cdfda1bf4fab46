//! Cache fingerprinting. The fingerprint is built from the normalized
//! provider request only — the *assistant* language and any filter beyond
//! what the provider itself sees never participate, so the cache stays
//! stable across assistant-language changes (spec §8).

use sha2::{Digest, Sha256};

use crate::domains::search::pipeline::route_mapping::ProviderRequestMapping;

/// Bumped whenever the shape of the provider request or its caching
/// contract changes, so stale cache entries from a previous pipeline
/// version are never served.
pub const PIPELINE_VERSION: u32 = 1;

/// Fixed field mask placeholder — the spec treats the exact field
/// selection as an implementation detail, but it participates in the
/// fingerprint so a mask change invalidates old cache entries.
const FIELD_MASK: &str = "id,name,address,location,rating,reviewCount,priceLevel,businessStatus,openNow,photos";

pub fn fingerprint(mapping: &ProviderRequestMapping) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mapping.canonical_query.as_bytes());
    hasher.update(b"|");
    hasher.update(mapping.language_code.as_bytes());
    hasher.update(b"|");
    hasher.update(mapping.region_code.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"|");
    if let Some(bias) = mapping.bias {
        hasher.update(format!("{:.4},{:.4},{}", bias.latitude, bias.longitude, bias.radius_m).as_bytes());
    }
    hasher.update(b"|");
    hasher.update(FIELD_MASK.as_bytes());
    hasher.update(b"|");
    hasher.update(PIPELINE_VERSION.to_le_bytes());

    hex::encode(hasher.finalize())
}
