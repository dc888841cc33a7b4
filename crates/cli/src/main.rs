//! StyleSwap CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run studio database migrations
//! styleswap-cli migrate
//!
//! # Seed the built-in style templates
//! styleswap-cli seed styles
//!
//! # Set the admin password (login is disabled until this runs)
//! styleswap-cli admin set-password -u admin -p '...'
//!
//! # Manage the image generation credential pool
//! styleswap-cli credentials add --key AIza... --label "Team key"
//! styleswap-cli credentials list
//! styleswap-cli credentials remove <id>
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "styleswap-cli")]
#[command(author, version, about = "StyleSwap CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage the admin account
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage the image generation credential pool
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Write the built-in style templates
    Styles {
        /// Overwrite built-in styles even if the catalog is not empty
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Set the admin password
    SetPassword {
        /// Rename the admin account
        #[arg(short, long)]
        username: Option<String>,

        /// New password (at least 12 characters)
        #[arg(short, long, env = "STUDIO_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Add a key to the end of the pool
    Add {
        #[arg(short, long, env = "GEMINI_POOL_KEY", hide_env_values = true)]
        key: String,

        #[arg(short, long)]
        label: Option<String>,
    },
    /// List pooled keys (masked)
    List,
    /// Remove a key by id
    Remove { id: String },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Styles { force } => commands::seed::styles(force).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::SetPassword { username, password } => {
                commands::admin::set_password(username.as_deref(), &password).await?;
            }
        },
        Commands::Credentials { action } => match action {
            CredentialAction::Add { key, label } => {
                commands::credentials::add(&key, label.as_deref()).await?;
            }
            CredentialAction::List => commands::credentials::list().await?,
            CredentialAction::Remove { id } => commands::credentials::remove(&id).await?,
        },
    }
    Ok(())
}
