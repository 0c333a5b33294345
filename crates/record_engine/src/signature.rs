use std::sync::OnceLock;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Content-addressable identifier: Sha256 over the canonical textual
/// form of `value`, hex-encoded.
///
/// Canonical means compact JSON with deterministic field order
/// (struct declaration order, insertion order for maps), so the same
/// logical value always hashes identically.
pub fn signature<T: Serialize + ?Sized>(value: &T) -> String {
    let canonical = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

static JOB_ID: OnceLock<String> = OnceLock::new();

/// Identifier for the current crawl job: computed once per process
/// from the instant it is first requested, stable for the process
/// lifetime.
pub fn job_id() -> &'static str {
    JOB_ID.get_or_init(|| signature(&Utc::now().to_rfc3339()))
}

#[cfg(test)]
mod tests {
    use super::{job_id, signature};
    use crate::location::SourceLocation;
    use pretty_assertions::assert_eq;

    #[test]
    fn signature_is_deterministic_across_calls() {
        let location = SourceLocation::parse("http://ycombinator.com");
        let first = signature(&(&location, "2019-01-01"));
        let second = signature(&(&SourceLocation::parse("http://ycombinator.com"), "2019-01-01"));
        assert_eq!(first, second);
    }

    #[test]
    fn signature_distinguishes_values() {
        assert_ne!(signature("a"), signature("b"));
    }

    #[test]
    fn job_id_is_stable_within_a_process() {
        assert_eq!(job_id(), job_id());
        assert_eq!(job_id().len(), 64);
    }
}
