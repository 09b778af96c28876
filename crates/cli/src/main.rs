//! Crumb CLI - terminal host for the cart.
//!
//! # Usage
//!
//! ```bash
//! # Anonymous cart, stored on this device
//! crumb add cookie-1 --quantity 3
//! crumb show
//!
//! # Sign in: the device cart is merged into the user's remote cart once
//! crumb --user u-123 show
//!
//! # Sign out: the cart stays, now backed by this device again
//! crumb show
//!
//! # Create the remote cart tables
//! crumb migrate
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart and its subtotal
//! - `add` - Add a product from the catalog
//! - `set` - Set a product's quantity (0 removes it)
//! - `remove` - Remove a product
//! - `clear` - Empty the cart
//! - `migrate` - Run remote store migrations

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use crumb_cart::config::{CartConfig, ConfigError};
use crumb_core::{ProductId, UserId};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::cart::Action;

#[derive(Parser)]
#[command(name = "crumb")]
#[command(author, version, about = "Crumb bakery cart")]
struct Cli {
    /// Act as this signed-in user (omit to be signed out)
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add a product to the cart
    Add {
        /// Catalog product id
        product_id: String,

        /// How many to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a product already in the cart
    Set {
        /// Catalog product id
        product_id: String,

        /// New quantity (0 removes the line)
        quantity: u32,
    },
    /// Remove a product from the cart
    Remove {
        /// Catalog product id
        product_id: String,
    },
    /// Empty the cart
    Clear,
    /// Run remote store migrations
    Migrate,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Loaded before tracing so Sentry can be initialized first
    let config = CartConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Logs go to stderr; stdout is for the cart
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crumb_cart=info,crumb_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(
    cli: Cli,
    config: Result<CartConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let action = match cli.command {
        Commands::Migrate => {
            commands::migrate::run().await?;
            return Ok(());
        }
        Commands::Show => Action::Show,
        Commands::Add {
            product_id,
            quantity,
        } => Action::Add {
            product_id: ProductId::new(product_id),
            quantity,
        },
        Commands::Set {
            product_id,
            quantity,
        } => Action::Set {
            product_id: ProductId::new(product_id),
            quantity,
        },
        Commands::Remove { product_id } => Action::Remove {
            product_id: ProductId::new(product_id),
        },
        Commands::Clear => Action::Clear,
    };

    let config = config?;
    let user = cli.user.map(UserId::new);
    commands::cart::run(&config, user, action).await?;
    Ok(())
}
