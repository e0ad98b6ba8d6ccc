//! Canned records for tests.

use std::collections::BTreeMap;

use crate::source::{MediaRecord, RecordPayload};
use crate::validator::ValidationResult;

/// A validation result for a URL that answered 200.
pub fn reachable_validation() -> ValidationResult {
    ValidationResult {
        reachable: true,
        http_status: Some(200),
        sniffed_ext: Some("mp3".to_string()),
        sniffed_size_bytes: Some(1_000),
        latency_ms: 3,
    }
}

/// A valid leaf record pointing at a placeholder URL.
pub fn leaf_record(source: &str, identifier: &str, title: &str) -> MediaRecord {
    leaf_record_with_url(
        source,
        identifier,
        title,
        &format!("http://mock.invalid/{source}/{identifier}.mp3"),
    )
}

/// A valid leaf record pointing at a real URL (wiremock tests).
pub fn leaf_record_with_url(
    source: &str,
    identifier: &str,
    title: &str,
    url: &str,
) -> MediaRecord {
    MediaRecord {
        identifier: identifier.to_string(),
        title: title.to_string(),
        artists: "Test Artist".to_string(),
        album: "Test Album".to_string(),
        duration_secs: Some(180),
        lyric: None,
        cover_url: None,
        source: source.to_string(),
        payload: RecordPayload::Leaf {
            url: url.to_string(),
            ext: "mp3".to_string(),
            size_bytes: None,
            validation: reachable_validation(),
            download_headers: BTreeMap::new(),
            scratch_dir: None,
        },
    }
}
