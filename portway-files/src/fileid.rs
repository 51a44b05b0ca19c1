//! Content-addressed file identifiers (`spec.md` §9 open question iii):
//! `fileId = base64url(sha256(endpoint || filename || bytes))[..22]`.
//! Adopters needing the legacy naming scheme replace this function alone.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

pub fn compute(endpoint: &str, filename: &str, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update(filename.as_bytes());
    hasher.update(content);
    let digest = hasher.finalize();
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    encoded[..22].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic_for_the_same_inputs() {
        let a = compute("Invoices", "q3.pdf", b"hello");
        let b = compute("Invoices", "q3.pdf", b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 22);
    }

    #[test]
    fn differs_when_the_endpoint_differs() {
        let a = compute("Invoices", "q3.pdf", b"hello");
        let b = compute("Receipts", "q3.pdf", b"hello");
        assert_ne!(a, b);
    }

    #[test]
    fn differs_when_the_content_differs() {
        let a = compute("Invoices", "q3.pdf", b"hello");
        let b = compute("Invoices", "q3.pdf", b"hellp");
        assert_ne!(a, b);
    }
}
