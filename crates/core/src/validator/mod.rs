//! Link validation: reachability testing and content probing.
//!
//! Upstream APIs routinely lie about extension and size, and a URL that was
//! handed out seconds ago may already be dead. Before a result is surfaced,
//! its URL goes through [`LinkValidator::test`] (cheap existence check) and,
//! once a candidate wins, [`LinkValidator::probe`] (ranged read + magic-byte
//! sniffing) to correct the declared metadata.

mod link;
mod sniff;
mod types;

pub use link::LinkValidator;
pub use sniff::sniff_audio_ext;
pub use types::{ProbeReport, ValidationResult};
