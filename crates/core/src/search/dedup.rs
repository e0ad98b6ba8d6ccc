//! Deduplication of fan-in results by record identifier.

use std::collections::HashSet;

use crate::source::MediaRecord;

/// Drop every record whose identifier was already seen, keeping the first
/// occurrence and preserving input order among survivors.
///
/// Identifiers are namespaced by the adapters that mint them, so the key is
/// the identifier string itself; two adapters surfacing the same underlying
/// item produce the same identifier and collapse to one record. Runs
/// single-threaded over the fully materialized fan-in result.
pub fn dedupe(records: Vec<MediaRecord>) -> Vec<MediaRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.identifier.clone()))
        .collect()
}
