use diesel::prelude::*;

use crate::schema::{management_record, tokens};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tokens)]
pub struct TokenRow {
    pub id: String,
    pub username: String,
    pub hash: String,
    pub salt: String,
    pub created_at: i64,
    pub revoked_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub allowed_scopes: String,
    pub allowed_environments: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tokens)]
pub struct NewTokenRow {
    pub id: String,
    pub username: String,
    pub hash: String,
    pub salt: String,
    pub created_at: i64,
    pub revoked_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub allowed_scopes: String,
    pub allowed_environments: String,
}

impl TokenRow {
    pub fn is_active(&self, now: i64) -> bool {
        self.revoked_at.is_none() && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = management_record)]
pub struct ManagementRow {
    pub id: i32,
    pub passphrase_hash: String,
    pub passphrase_salt: String,
    pub failed_attempts: i32,
    pub last_failed_at: Option<i64>,
    pub locked_until: Option<i64>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = management_record)]
pub struct NewManagementRow {
    pub id: i32,
    pub passphrase_hash: String,
    pub passphrase_salt: String,
    pub failed_attempts: i32,
    pub last_failed_at: Option<i64>,
    pub locked_until: Option<i64>,
}
