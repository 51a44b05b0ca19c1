//! The CLI passphrase and its lockout state machine (`spec.md` §3
//! `ManagementRecord`, §6 CLI, §9 "Passphrase lockout" design note): a
//! single writer updates the failure counters, and verification always
//! re-reads the record so a concurrent failure from another process is
//! observed before the lock boundary is evaluated.

use chrono::Utc;
use diesel::prelude::*;

use crate::crypto::{b64_decode, b64_encode, Crypto, CryptoImpl, PASSPHRASE_HASH_LEN, PASSPHRASE_ITERATIONS, PASSPHRASE_SALT_LEN};
use crate::error::AuthError;
use crate::models::{ManagementRow, NewManagementRow};
use crate::schema::management_record::dsl as m;
use crate::store::SqlitePool;

pub const MAX_FAILED_ATTEMPTS: i32 = 5;
pub const LOCKOUT_SECONDS: i64 = 15 * 60;
const RECORD_ID: i32 = 1;

pub struct ManagementStore {
    pool: SqlitePool,
    crypto: CryptoImpl,
}

impl ManagementStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            crypto: CryptoImpl,
        }
    }

    pub fn set_passphrase(&self, passphrase: &str) -> Result<(), AuthError> {
        let salt = self.crypto.random_bytes(PASSPHRASE_SALT_LEN);
        let hash = self
            .crypto
            .derive(passphrase, &salt, PASSPHRASE_ITERATIONS, PASSPHRASE_HASH_LEN);

        let mut conn = self.pool.get()?;
        let row = NewManagementRow {
            id: RECORD_ID,
            passphrase_hash: b64_encode(&hash),
            passphrase_salt: b64_encode(&salt),
            failed_attempts: 0,
            last_failed_at: None,
            locked_until: None,
        };
        diesel::insert_into(m::management_record)
            .values(&row)
            .on_conflict(m::id)
            .do_update()
            .set((
                m::passphrase_hash.eq(&row.passphrase_hash),
                m::passphrase_salt.eq(&row.passphrase_salt),
                m::failed_attempts.eq(0),
                m::last_failed_at.eq(None::<i64>),
                m::locked_until.eq(None::<i64>),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Verifies `passphrase` against the stored record, applying the
    /// lockout state machine: after `MAX_FAILED_ATTEMPTS` consecutive
    /// failures the record is locked for `LOCKOUT_SECONDS`.
    pub fn verify(&self, passphrase: &str) -> Result<(), AuthError> {
        let mut conn = self.pool.get()?;
        let row: ManagementRow = m::management_record
            .filter(m::id.eq(RECORD_ID))
            .first(&mut conn)?;

        let now = Utc::now().timestamp();
        if let Some(locked_until) = row.locked_until {
            if locked_until > now {
                return Err(AuthError::Locked(locked_until));
            }
        }

        let salt = b64_decode(&row.passphrase_salt).map_err(|e| AuthError::Storage(e.to_string()))?;
        let expected = b64_decode(&row.passphrase_hash).map_err(|e| AuthError::Storage(e.to_string()))?;
        let derived = self
            .crypto
            .derive(passphrase, &salt, PASSPHRASE_ITERATIONS, expected.len());

        if self.crypto.constant_time_eq(&derived, &expected) {
            diesel::update(m::management_record.filter(m::id.eq(RECORD_ID)))
                .set((
                    m::failed_attempts.eq(0),
                    m::last_failed_at.eq(None::<i64>),
                    m::locked_until.eq(None::<i64>),
                ))
                .execute(&mut conn)?;
            return Ok(());
        }

        let attempts = row.failed_attempts + 1;
        let locked_until = if attempts >= MAX_FAILED_ATTEMPTS {
            Some(now + LOCKOUT_SECONDS)
        } else {
            None
        };
        diesel::update(m::management_record.filter(m::id.eq(RECORD_ID)))
            .set((
                m::failed_attempts.eq(attempts),
                m::last_failed_at.eq(Some(now)),
                m::locked_until.eq(locked_until),
            ))
            .execute(&mut conn)?;

        Err(AuthError::InvalidPassphrase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/auth");

    fn test_pool() -> SqlitePool {
        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        pool.get().unwrap().run_pending_migrations(MIGRATIONS).unwrap();
        pool
    }

    #[test]
    fn wrong_passphrase_fails_and_correct_one_succeeds() {
        let pool = test_pool();
        let store = ManagementStore::new(pool);
        store.set_passphrase("correct-horse").unwrap();

        assert!(store.verify("wrong").is_err());
        assert!(store.verify("correct-horse").is_ok());
    }

    #[test]
    fn five_failures_lock_the_record() {
        let pool = test_pool();
        let store = ManagementStore::new(pool);
        store.set_passphrase("correct-horse").unwrap();

        for _ in 0..MAX_FAILED_ATTEMPTS {
            assert!(store.verify("wrong").is_err());
        }

        match store.verify("correct-horse") {
            Err(AuthError::Locked(_)) => {}
            other => panic!("expected Locked, got {:?}", other),
        }
    }
}
