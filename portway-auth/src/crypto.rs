//! PBKDF2-SHA256 hashing for bearer tokens and the CLI passphrase, plus the
//! CSPRNG token generator. A trait for the operation, a single `CryptoImpl`
//! behind it, so tests can substitute a fake without touching call sites.

use base64::{engine::general_purpose::STANDARD, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

pub const TOKEN_HASH_LEN: usize = 32;
pub const TOKEN_SALT_LEN: usize = 16;
pub const TOKEN_ITERATIONS: u32 = 10_000;

pub const PASSPHRASE_HASH_LEN: usize = 32;
pub const PASSPHRASE_SALT_LEN: usize = 16;
pub const PASSPHRASE_ITERATIONS: u32 = 310_000;

/// 128 characters drawn from `[A-Za-z0-9-_]`, per `spec.md` §4.A and §6.
const TOKEN_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
pub const TOKEN_LENGTH: usize = 128;

pub trait Crypto {
    fn random_bytes(&self, len: usize) -> Vec<u8>;

    fn generate_token(&self) -> String {
        let mut out = String::with_capacity(TOKEN_LENGTH);
        let raw = self.random_bytes(TOKEN_LENGTH);
        for byte in raw {
            out.push(TOKEN_ALPHABET[(byte as usize) % TOKEN_ALPHABET.len()] as char);
        }
        out
    }

    fn derive(&self, secret: &str, salt: &[u8], iterations: u32, out_len: usize) -> Vec<u8> {
        let mut out = vec![0u8; out_len];
        pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, iterations, &mut out);
        out
    }

    /// Constant-time equality so verification never short-circuits on
    /// length or content, avoiding the timing leak called out in `spec.md`
    /// §4.A.
    fn constant_time_eq(&self, a: &[u8], b: &[u8]) -> bool {
        let max_len = a.len().max(b.len());
        let mut diff: u8 = (a.len() ^ b.len()) as u8;
        for i in 0..max_len {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            diff |= x ^ y;
        }
        diff == 0
    }
}

pub struct CryptoImpl;

impl Crypto for CryptoImpl {
    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        OsRng.fill_bytes(&mut buf);
        buf
    }
}

pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn b64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_has_expected_shape() {
        let crypto = CryptoImpl;
        let token = crypto.generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token
            .bytes()
            .all(|b| TOKEN_ALPHABET.contains(&b)));
    }

    #[test]
    fn constant_time_eq_matches_regular_eq() {
        let crypto = CryptoImpl;
        assert!(crypto.constant_time_eq(b"abc", b"abc"));
        assert!(!crypto.constant_time_eq(b"abc", b"abd"));
        assert!(!crypto.constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn derive_is_deterministic_given_same_salt() {
        let crypto = CryptoImpl;
        let salt = b"fixed-salt-value";
        let a = crypto.derive("hunter2", salt, 1_000, 32);
        let b = crypto.derive("hunter2", salt, 1_000, 32);
        assert_eq!(a, b);
    }
}
