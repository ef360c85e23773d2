//! Canonical cache-key construction
//!
//! Every caller that touches the cache goes through these helpers so that
//! equivalent requests collide on the same key: datacenter names are
//! case-folded and item-id lists are filtered, sorted, and re-joined before
//! they become part of a key.

/// Key for the static datacenter list.
pub const DATA_CENTERS: &str = "data-centers:all";

/// Key for the static world list.
pub const WORLDS: &str = "worlds:all";

/// Canonical form of an item-id list: positive ids only, ascending.
///
/// Idempotent and order-independent, so `[3, 1, 2]` and `[1, 2, 3]` produce
/// the same key.
pub fn normalize_ids(ids: &[u32]) -> Vec<u32> {
    let mut ids: Vec<u32> = ids.iter().copied().filter(|&id| id > 0).collect();
    ids.sort_unstable();
    ids
}

/// Comma-joined canonical id list.
pub fn ids_csv(ids: &[u32]) -> String {
    normalize_ids(ids)
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Key for a market aggregate: `aggregated:<datacenter-lower>:<sorted-csv>`.
pub fn aggregated(datacenter: &str, ids: &[u32]) -> String {
    format!("aggregated:{}:{}", datacenter.to_lowercase(), ids_csv(ids))
}

/// Namespace a key for background revalidation so in-band requests and
/// revalidations never share an in-flight slot.
pub fn revalidation(key: &str) -> String {
    format!("revalidate:{key}")
}

/// Synthetic URL-form key for the edge tier.
pub fn edge_url(origin: &str, key: &str) -> String {
    format!("{}/__cache/{}", origin, urlencoding::encode(key))
}
