//! Disc Vault CLI - database migrations, catalog seeding and user management.
//!
//! # Usage
//!
//! ```bash
//! # Create the schema and the session table
//! dv-cli migrate
//!
//! # Load categories, genres, creators, products, channels and authors
//! dv-cli seed catalog.yaml
//!
//! # Create an account, optionally as administrator
//! dv-cli user create -u alice -e alice@example.com -p 'correct horse' --admin
//!
//! # Change the role of an existing account
//! dv-cli user promote alice
//! dv-cli user promote alice --role user
//! ```
//!
//! All commands read `DISCVAULT_DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand, ValueEnum};

use discvault_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "dv-cli")]
#[command(author, version, about = "Disc Vault CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog, forum channels and news authors from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account with its built-in collections
    Create {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// At least 8 characters
        #[arg(short, long)]
        password: String,

        #[arg(short, long)]
        display_name: Option<String>,

        /// Make the account an administrator
        #[arg(long)]
        admin: bool,
    },
    /// Set the role of an existing account
    Promote {
        username: String,

        #[arg(short, long, value_enum, default_value_t = RoleArg::Admin)]
        role: RoleArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::User => Self::User,
            RoleArg::Admin => Self::Admin,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(&file).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                password,
                display_name,
                admin,
            } => {
                commands::users::create(
                    &username,
                    &email,
                    &password,
                    display_name.as_deref(),
                    admin,
                )
                .await?;
            }
            UserAction::Promote { username, role } => {
                commands::users::promote(&username, role.into()).await?;
            }
        },
    }
    Ok(())
}
