use sha1::{Digest, Sha1};

pub fn sha1(payload: &str) -> String {
    let hash = Sha1::digest(payload);
    base16ct::lower::encode_string(&hash)
}

/// Stable 32-bit hash of `payload`, taken from the first four bytes of its SHA-1 digest.
pub fn stable_hash(payload: &str) -> u32 {
    let hash = Sha1::digest(payload);
    u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]])
}

/// Maps `id` within `group` into the `1..=normalizer` range.
pub fn normalized_hash(id: &str, group: &str, normalizer: u32) -> u32 {
    if normalizer == 0 {
        return 0;
    }
    stable_hash(format!("{group}:{id}").as_str()) % normalizer + 1
}

#[cfg(test)]
mod utils_tests {
    use crate::utils::{normalized_hash, sha1, stable_hash};

    #[test]
    fn sha1_hex() {
        assert_eq!(sha1("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn stable_hash_first_bytes() {
        assert_eq!(stable_hash("abc"), 0xa9993e36);
    }

    #[test]
    fn normalized_hash_range() {
        for i in 0..500 {
            let val = normalized_hash(i.to_string().as_str(), "group", 100);
            assert!((1..=100).contains(&val));
        }
        assert_eq!(normalized_hash("id", "group", 0), 0);
    }

    #[test]
    fn normalized_hash_is_stable() {
        assert_eq!(
            normalized_hash("user-1", "beta-ui", 100),
            normalized_hash("user-1", "beta-ui", 100)
        );
    }
}
