diesel::table! {
    tokens (id) {
        id -> Text,
        username -> Text,
        hash -> Text,
        salt -> Text,
        created_at -> BigInt,
        revoked_at -> Nullable<BigInt>,
        expires_at -> Nullable<BigInt>,
        allowed_scopes -> Text,
        allowed_environments -> Text,
    }
}

diesel::table! {
    management_record (id) {
        id -> Integer,
        passphrase_hash -> Text,
        passphrase_salt -> Text,
        failed_attempts -> Integer,
        last_failed_at -> Nullable<BigInt>,
        locked_until -> Nullable<BigInt>,
    }
}
