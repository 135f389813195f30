//! Cache utilities

pub mod hash;

pub use hash::{
    canonical_json, fingerprint_file, fingerprint_json, sha256_hex, short_hash, SHORT_HASH_LEN,
};
