// Golden vector integration test for mediadrop URL hashes
//
// This test validates the implementation against the canonical test vector
// defined in fixtures/golden_vectors.json. Stored media URLs depend on these
// values, so any difference MUST fail the build.

use std::collections::BTreeMap;
use std::fs;

use mediadrop_crypto::{fingerprint, sha256_hex, style_hash, FINGERPRINT_ALGO};
use serde::Deserialize;

/// Structure for parsing the golden vector file
#[derive(Deserialize)]
struct GoldenVector {
    hash_secret: String,
    content_utf8: String,
    fingerprint_hex: String,
    style_hashes: BTreeMap<String, String>,
}

fn load_golden_vector() -> GoldenVector {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/golden_vectors.json");
    let content = fs::read_to_string(path).expect("Failed to read golden_vectors.json");
    serde_json::from_str(&content).expect("Failed to parse golden_vectors.json")
}

#[test]
fn test_content_fingerprint() {
    let golden = load_golden_vector();

    let digest = fingerprint(golden.content_utf8.as_bytes());

    assert_eq!(digest.algo, FINGERPRINT_ALGO);
    assert_eq!(digest.value, golden.fingerprint_hex, "Fingerprint mismatch");
}

#[test]
fn test_style_hashes() {
    let golden = load_golden_vector();
    let fp = sha256_hex(golden.content_utf8.as_bytes());

    assert_eq!(golden.style_hashes.len(), 3);
    for (style, expected) in &golden.style_hashes {
        let actual = style_hash(&golden.hash_secret, style, &fp);
        assert_eq!(&actual, expected, "Hash mismatch for style '{}'", style);
    }
}

#[test]
fn test_wrong_secret_does_not_reproduce_hashes() {
    let golden = load_golden_vector();
    let fp = sha256_hex(golden.content_utf8.as_bytes());

    for (style, expected) in &golden.style_hashes {
        let actual = style_hash("not-the-secret", style, &fp);
        assert_ne!(&actual, expected);
    }
}
