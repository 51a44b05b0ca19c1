//! The Token Store (`spec.md` §4.A): opaque bearer tokens, PBKDF2
//! verification, scope/environment grants. Diesel + r2d2 against a single
//! sqlite file, per `spec.md` §6's "Token DB (single relational file)".

use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::crypto::{b64_decode, b64_encode, Crypto, CryptoImpl, TOKEN_HASH_LEN, TOKEN_ITERATIONS, TOKEN_SALT_LEN};
use crate::error::AuthError;
use crate::models::{NewTokenRow, TokenRow};
use crate::schema::tokens::dsl as t;
use crate::scope::{matches_any, parse_patterns};

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/auth");

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub id: String,
    pub plaintext: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub id: String,
    pub username: String,
    pub allowed_scopes: Vec<String>,
    pub allowed_environments: Vec<String>,
}

pub struct TokenStore {
    pool: SqlitePool,
    crypto: CryptoImpl,
}

impl TokenStore {
    pub fn new(database_url: &str) -> Result<Self, AuthError> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .build(manager)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        {
            let mut conn = pool.get()?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }
        Ok(Self {
            pool,
            crypto: CryptoImpl,
        })
    }

    /// `Issue(username, scopes, envs, ttl?) -> plaintextToken`.
    pub fn issue(
        &self,
        username: &str,
        scopes: &str,
        environments: &str,
        ttl_secs: Option<i64>,
    ) -> Result<IssuedToken, AuthError> {
        let plaintext = self.crypto.generate_token();
        let salt = self.crypto.random_bytes(TOKEN_SALT_LEN);
        let hash = self
            .crypto
            .derive(&plaintext, &salt, TOKEN_ITERATIONS, TOKEN_HASH_LEN);

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let expires_at = ttl_secs.map(|ttl| now + ttl);

        let row = NewTokenRow {
            id: id.clone(),
            username: username.to_owned(),
            hash: b64_encode(&hash),
            salt: b64_encode(&salt),
            created_at: now,
            revoked_at: None,
            expires_at,
            allowed_scopes: scopes.to_owned(),
            allowed_environments: environments.to_owned(),
        };

        let mut conn = self.pool.get()?;
        diesel::insert_into(t::tokens)
            .values(&row)
            .execute(&mut conn)?;

        Ok(IssuedToken { id, plaintext })
    }

    /// `Verify(plaintext) -> {ok, username, scopes, envs} | deny`.
    ///
    /// Iterates every active token and re-derives the hash under its stored
    /// salt; never short-circuits on a length mismatch so that verification
    /// time does not leak which prefix of the presented token was wrong.
    pub fn verify(&self, plaintext: &str) -> Result<VerifiedToken, AuthError> {
        let mut conn = self.pool.get()?;
        let now = Utc::now().timestamp();
        let candidates: Vec<TokenRow> = t::tokens.load(&mut conn)?;

        let mut found: Option<VerifiedToken> = None;
        for row in candidates {
            if !row.is_active(now) {
                continue;
            }
            let salt = match b64_decode(&row.salt) {
                Ok(s) => s,
                Err(_) => continue,
            };
            let expected = match b64_decode(&row.hash) {
                Ok(h) => h,
                Err(_) => continue,
            };
            let derived = self
                .crypto
                .derive(plaintext, &salt, TOKEN_ITERATIONS, expected.len());
            if self.crypto.constant_time_eq(&derived, &expected) {
                found = Some(VerifiedToken {
                    id: row.id.clone(),
                    username: row.username.clone(),
                    allowed_scopes: parse_patterns(&row.allowed_scopes),
                    allowed_environments: parse_patterns(&row.allowed_environments),
                });
                // Do not `break`: finish the scan so verification time is
                // independent of where (or whether) the match occurred.
            }
        }

        found.ok_or(AuthError::Unauthenticated)
    }

    pub fn revoke(&self, id: &str) -> Result<(), AuthError> {
        let mut conn = self.pool.get()?;
        let now = Utc::now().timestamp();
        let affected = diesel::update(t::tokens.filter(t::id.eq(id)))
            .set(t::revoked_at.eq(Some(now)))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    pub fn update_scopes(&self, id: &str, scopes: &str) -> Result<(), AuthError> {
        let mut conn = self.pool.get()?;
        let affected = diesel::update(t::tokens.filter(t::id.eq(id)))
            .set(t::allowed_scopes.eq(scopes))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    pub fn update_environments(&self, id: &str, environments: &str) -> Result<(), AuthError> {
        let mut conn = self.pool.get()?;
        let affected = diesel::update(t::tokens.filter(t::id.eq(id)))
            .set(t::allowed_environments.eq(environments))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    pub fn update_expiry(&self, id: &str, expires_at: Option<i64>) -> Result<(), AuthError> {
        let mut conn = self.pool.get()?;
        let affected = diesel::update(t::tokens.filter(t::id.eq(id)))
            .set(t::expires_at.eq(expires_at))
            .execute(&mut conn)?;
        if affected == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    /// `Rotate(id) -> newPlaintext`: revoke the old token and reissue one
    /// with the same scopes/environments.
    pub fn rotate(&self, id: &str) -> Result<IssuedToken, AuthError> {
        let mut conn = self.pool.get()?;
        let row: TokenRow = t::tokens.filter(t::id.eq(id)).first(&mut conn)?;
        drop(conn);

        self.revoke(id)?;
        self.issue(
            &row.username,
            &row.allowed_scopes,
            &row.allowed_environments,
            None,
        )
    }

    pub fn list(&self) -> Result<Vec<TokenRow>, AuthError> {
        let mut conn = self.pool.get()?;
        Ok(t::tokens.load(&mut conn)?)
    }

    /// Shares this store's connection pool with a [`crate::ManagementStore`]
    /// so both tables live in the same sqlite file, per `spec.md` §6.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }
}

/// Checks `token.AllowedScopes` against the endpoint's `FullPath` and
/// `token.AllowedEnvironments` against the requested environment, per
/// `spec.md` §4.I steps 3-4.
impl VerifiedToken {
    pub fn allows_scope(&self, full_path: &str) -> bool {
        matches_any(&self.allowed_scopes, full_path)
    }

    pub fn allows_environment(&self, env: &str) -> bool {
        matches_any(&self.allowed_environments, env)
    }
}
