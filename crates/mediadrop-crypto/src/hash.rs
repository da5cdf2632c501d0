// SHA-256 and HMAC-SHA256 helpers for mediadrop

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::types::ContentDigest;

type HmacSha256 = Hmac<Sha256>;

/// Computes the SHA-256 hash of the input bytes and returns it as a lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Fingerprints uploaded content. The fingerprint is stored with the item
/// and is the input of every per-style URL hash.
pub fn fingerprint(bytes: &[u8]) -> ContentDigest {
    ContentDigest::sha256(sha256_hex(bytes))
}

/// HMAC-SHA256 of `data` keyed with `secret`, lowercase hex.
pub fn keyed_hash_hex(secret: &[u8], data: &[u8]) -> String {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Hash segment of a media URL for one style of an attachment.
///
/// Computed as `HMAC-SHA256(secret, "<style>:<fingerprint>")`, so identical
/// content under the same secret always maps to the same URL while the
/// URL stays unguessable without the secret.
pub fn style_hash(secret: &str, style: &str, fingerprint: &str) -> String {
    let data = format!("{}:{}", style, fingerprint);
    keyed_hash_hex(secret.as_bytes(), data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_hash() {
        // SHA-256 of empty string is well-known
        let empty_hash = sha256_hex(b"");
        assert_eq!(
            empty_hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let hello_hash = sha256_hex(b"hello");
        assert_eq!(
            hello_hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_keyed_hash_rfc4231_case_2() {
        let mac = keyed_hash_hex(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_style_hash_is_deterministic() {
        let fp = sha256_hex(b"picture bytes");
        assert_eq!(
            style_hash("tamtam", "thumb", &fp),
            style_hash("tamtam", "thumb", &fp)
        );
    }

    #[test]
    fn test_style_hash_changes_with_single_byte() {
        let a = sha256_hex(b"picture bytes");
        let b = sha256_hex(b"picture bytez");
        assert_ne!(style_hash("tamtam", "medium", &a), style_hash("tamtam", "medium", &b));
    }

    #[test]
    fn test_style_hash_depends_on_secret_and_style() {
        let fp = sha256_hex(b"picture bytes");
        let base = style_hash("tamtam", "medium", &fp);
        assert_ne!(base, style_hash("other", "medium", &fp));
        assert_ne!(base, style_hash("tamtam", "thumb", &fp));
    }

    #[test]
    fn test_fingerprint_uses_sha256() {
        let digest = fingerprint(b"hello");
        assert_eq!(digest.algo, crate::types::FINGERPRINT_ALGO);
        assert_eq!(digest.value, sha256_hex(b"hello"));
    }
}
