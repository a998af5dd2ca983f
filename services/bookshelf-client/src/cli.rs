//! Command-line interface

use clap::{Parser, Subcommand, ValueEnum};
use session_auth::AccountType;

#[derive(Parser, Debug)]
#[command(name = "bookshelf-client", version, about = "Command-line client for the bookshelf service")]
pub struct Cli {
    /// Config file (falls back to $CONFIG_PATH, then bookshelf-client.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account. Log in afterwards with `login`.
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Defaults to session.username from the config
        #[arg(long)]
        email: Option<String>,
        #[arg(long, value_enum, default_value_t = AccountKind::Reader)]
        account_type: AccountKind,
    },
    /// Log in with the configured username and password
    Login,
    /// End the session
    Logout,
    /// Print whether the session is authenticated
    Status,
    /// GET every path concurrently and print `status path body`
    Get {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Author,
    Reader,
}

impl From<AccountKind> for AccountType {
    fn from(kind: AccountKind) -> Self {
        match kind {
            AccountKind::Author => AccountType::Author,
            AccountKind::Reader => AccountType::Reader,
        }
    }
}
