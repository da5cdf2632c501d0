// mediadrop crypto - content fingerprints and keyed URL hashes

pub mod hash;
pub mod types;

pub use hash::{fingerprint, keyed_hash_hex, sha256_hex, style_hash};
pub use types::{ContentDigest, FINGERPRINT_ALGO};
