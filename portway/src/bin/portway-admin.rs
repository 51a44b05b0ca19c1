//! `portway-admin`: the CLI token-administration tool (`spec.md` §6).
//! Every mutating command first verifies the management passphrase against
//! `ManagementStore`, which enforces the 5-attempt/15-minute lockout.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use portway_auth::{AuthError, ManagementStore, TokenStore};
use portway_settings::Settings;

#[derive(Parser)]
#[command(name = "portway-admin", about = "Manage Portway bearer tokens")]
struct Cli {
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every token record.
    List,
    /// Issue a new token.
    Issue {
        #[arg(long)]
        username: String,
        /// Comma-separated scope patterns, e.g. `Financial/*,HR/Staff`.
        #[arg(long)]
        scopes: String,
        /// Comma-separated environment patterns, e.g. `prod,dev`.
        #[arg(long)]
        envs: String,
        /// Time-to-live in seconds; omit for no expiry.
        #[arg(long)]
        ttl_secs: Option<i64>,
    },
    /// Revoke a token by id.
    Revoke { id: String },
    /// Revoke a token and issue a replacement with the same grants.
    Rotate { id: String },
    /// Replace a token's scope grants.
    SetScopes { id: String, scopes: String },
    /// Replace a token's environment grants.
    SetEnvs { id: String, envs: String },
    /// Replace a token's expiry (seconds from now; omit to clear it).
    SetExpiry { id: String, ttl_secs: Option<i64> },
    /// Change the management passphrase.
    ChangePassphrase,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match Settings::with_env_and_config_file(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };

    let store = match TokenStore::new(&settings.token_db_url) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("could not open token store: {e}");
            return ExitCode::from(3);
        }
    };
    let management = ManagementStore::new(store.pool());

    // `list` is the one read-only command that does not mutate the token
    // table; every other command changes state and must clear the
    // passphrase gate first.
    if matches!(cli.command, Command::List) {
        return run_list(&store);
    }

    if let Err(code) = authenticate(&management) {
        return code;
    }

    match cli.command {
        Command::List => unreachable!(),
        Command::Issue { username, scopes, envs, ttl_secs } => {
            run(|| store.issue(&username, &scopes, &envs, ttl_secs).map(|t| {
                println!("id: {}", t.id);
                println!("token: {}", t.plaintext);
            }))
        }
        Command::Revoke { id } => run(|| store.revoke(&id)),
        Command::Rotate { id } => run(|| store.rotate(&id).map(|t| {
            println!("id: {}", t.id);
            println!("token: {}", t.plaintext);
        })),
        Command::SetScopes { id, scopes } => run(|| store.update_scopes(&id, &scopes)),
        Command::SetEnvs { id, envs } => run(|| store.update_environments(&id, &envs)),
        Command::SetExpiry { id, ttl_secs } => {
            run(|| store.update_expiry(&id, ttl_secs.map(|ttl| chrono::Utc::now().timestamp() + ttl)))
        }
        Command::ChangePassphrase => run(|| {
            let passphrase = prompt_passphrase("New passphrase: ")?;
            let confirm = prompt_passphrase("Confirm passphrase: ")?;
            if passphrase != confirm {
                eprintln!("passphrases did not match");
                return Err(AuthError::InvalidPassphrase);
            }
            management.set_passphrase(&passphrase)
        }),
    }
}

fn run_list(store: &TokenStore) -> ExitCode {
    match store.list() {
        Ok(rows) => {
            for row in rows {
                println!(
                    "{}\t{}\tscopes={}\tenvs={}\trevoked={}\texpires={}",
                    row.id,
                    row.username,
                    row.allowed_scopes,
                    row.allowed_environments,
                    row.revoked_at.is_some(),
                    row.expires_at.map(|e| e.to_string()).unwrap_or_else(|| "never".to_owned()),
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("runtime error: {e}");
            ExitCode::from(3)
        }
    }
}

/// Prompts for the management passphrase and checks it against
/// [`ManagementStore::verify`], mapping its outcome onto `spec.md` §6's exit
/// codes (0 success, 1 authentication failure, ≥3 runtime errors).
fn authenticate(management: &ManagementStore) -> Result<(), ExitCode> {
    let passphrase = prompt_passphrase("Management passphrase: ").map_err(|_| ExitCode::from(3))?;
    match management.verify(&passphrase) {
        Ok(()) => Ok(()),
        Err(AuthError::Locked(until)) => {
            eprintln!("management record is locked until unix time {until}");
            Err(ExitCode::from(1))
        }
        Err(AuthError::InvalidPassphrase) => {
            eprintln!("incorrect passphrase");
            Err(ExitCode::from(1))
        }
        Err(e) => {
            eprintln!("runtime error: {e}");
            Err(ExitCode::from(3))
        }
    }
}

fn prompt_passphrase(prompt: &str) -> Result<String, AuthError> {
    rpassword::prompt_password(prompt).map_err(|e| AuthError::Storage(e.to_string()))
}

/// Runs a command closure and maps its `Result<_, AuthError>` onto an exit
/// code: success is 0, a not-found/invalid-passphrase domain error is a
/// runtime error (≥3) since authentication already passed by this point.
fn run<T>(f: impl FnOnce() -> Result<T, AuthError>) -> ExitCode {
    match f() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("runtime error: {e}");
            ExitCode::from(3)
        }
    }
}
