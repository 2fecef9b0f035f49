//! Out-of-band admin account provisioning.
//!
//! Admin accounts are never created through the HTTP surface; an
//! operator runs this tool against the admin database directly.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bookspot_server::{AuthService, SqliteAdminStore, StoreRegistry};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite admin database file.
    #[clap(value_parser = parse_path)]
    pub admin_db: PathBuf,

    /// Path to a TOML file listing the store spots. The built-in
    /// registry is used when omitted.
    #[clap(long, value_parser = parse_path)]
    pub registry_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates an admin account bound to a store spot.
    AddAdmin {
        handle: String,
        password: String,
        store_spot: String,
    },

    /// Changes the password of an existing account.
    UpdatePassword { handle: String, password: String },

    /// Verifies a password without issuing a token or making any
    /// persistent change.
    CheckPassword { handle: String, password: String },

    /// Shows all account handles.
    Handles,

    /// Shows all registered store spots.
    Spots,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let registry = match &cli_args.registry_file {
        Some(path) => StoreRegistry::from_toml_file(path)?,
        None => StoreRegistry::with_defaults(),
    };

    let store = Arc::new(
        SqliteAdminStore::open(&cli_args.admin_db)
            .with_context(|| format!("Could not open {:?}", cli_args.admin_db))?,
    );
    // The TTL is irrelevant for provisioning, no tokens are issued here.
    let auth = AuthService::new(store, Duration::from_secs(1))?;

    match cli_args.command {
        Command::AddAdmin {
            handle,
            password,
            store_spot,
        } => {
            if !registry.is_valid(&store_spot) {
                bail!(
                    "'{}' is not a registered store spot. Known spots: {}",
                    store_spot,
                    registry
                        .spots()
                        .iter()
                        .map(|s| s.slug.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            let id = auth.create_account(&handle, &password, &store_spot)?;
            println!("Created account '{}' (id {}) for spot '{}'.", handle, id, store_spot);
        }
        Command::UpdatePassword { handle, password } => {
            auth.update_password(&handle, &password)?;
            println!("Password updated for '{}'.", handle);
        }
        Command::CheckPassword { handle, password } => {
            if auth.check_password(&handle, &password)? {
                println!("Password matches.");
            } else {
                println!("Password does NOT match.");
            }
        }
        Command::Handles => {
            for handle in auth.all_handles()? {
                println!("{}", handle);
            }
        }
        Command::Spots => {
            for spot in registry.spots() {
                println!("{}\t{}", spot.slug, spot.display_name);
            }
        }
    }

    Ok(())
}
