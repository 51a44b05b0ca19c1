//! The Token Store and CLI management record (`spec.md` §4.A, §3
//! `ManagementRecord`).

pub mod crypto;
pub mod error;
pub mod management;
pub mod models;
pub mod schema;
pub mod scope;
pub mod store;

pub use error::AuthError;
pub use management::ManagementStore;
pub use scope::{matches_any, parse_patterns};
pub use store::{IssuedToken, SqlitePool, TokenStore, VerifiedToken};

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (TokenStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");
        let store = TokenStore::new(path.to_str().unwrap()).unwrap();
        (store, dir)
    }

    #[test]
    fn issue_then_verify_round_trips_p4() {
        let (store, _dir) = temp_store();
        let issued = store.issue("alice", "Financial/*", "prod", None).unwrap();
        let verified = store.verify(&issued.plaintext).unwrap();
        assert_eq!(verified.username, "alice");
        assert!(verified.allows_scope("Financial/Invoices"));
        assert!(!verified.allows_scope("HR/Staff"));
    }

    #[test]
    fn verify_after_revoke_denies_p4() {
        let (store, _dir) = temp_store();
        let issued = store.issue("bob", "*", "*", None).unwrap();
        store.revoke(&issued.id).unwrap();
        assert!(store.verify(&issued.plaintext).is_err());
    }

    #[test]
    fn expired_token_is_inactive() {
        let (store, _dir) = temp_store();
        let issued = store.issue("carol", "*", "*", Some(-10)).unwrap();
        assert!(store.verify(&issued.plaintext).is_err());
    }

    #[test]
    fn rotate_preserves_scopes_but_invalidates_old_plaintext() {
        let (store, _dir) = temp_store();
        let issued = store.issue("dave", "Ops/*", "dev,prod", None).unwrap();
        let rotated = store.rotate(&issued.id).unwrap();

        assert!(store.verify(&issued.plaintext).is_err());
        let verified = store.verify(&rotated.plaintext).unwrap();
        assert_eq!(verified.username, "dave");
        assert!(verified.allows_environment("dev"));
        assert!(verified.allows_environment("prod"));
        assert!(!verified.allows_environment("staging"));
    }
}
