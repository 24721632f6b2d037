//! Request identity keys.

use sha2::{Digest, Sha256};

/// Compute the store key for a request: SHA-256 over method and canonical URL.
///
/// The method is uppercased so `get` and `GET` share an entry.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let a = compute_request_key("GET", "https://app.test/index.html");
        let b = compute_request_key("GET", "https://app.test/index.html");
        assert_eq!(a, b);
    }

    #[test]
    fn test_method_case_insensitive() {
        assert_eq!(
            compute_request_key("get", "https://app.test/"),
            compute_request_key("GET", "https://app.test/")
        );
    }

    #[test]
    fn test_key_differs_by_url() {
        assert_ne!(
            compute_request_key("GET", "https://app.test/a"),
            compute_request_key("GET", "https://app.test/b")
        );
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", "https://app.test/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
