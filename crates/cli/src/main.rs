//! Matty's Media CLI - Storefront cart and account tools.
//!
//! # Usage
//!
//! ```bash
//! # Browse the business card catalog
//! mm-cli products -c business-cards
//!
//! # Add two of a product with custom text
//! mm-cli cart add <product-id> -q 2 -t "MATTY'S MEDIA"
//!
//! # Show the cart with totals
//! mm-cli cart show
//!
//! # Sign in (merges the local cart with the server cart)
//! mm-cli login -e matty@example.com
//!
//! # Generate a WhatsApp order link
//! mm-cli checkout
//! ```
//!
//! # Commands
//!
//! - `products` - List the catalog
//! - `cart` - Inspect and edit the local cart
//! - `login` / `register` - Authenticate and reconcile the cart
//! - `logout` - Forget the session credential (the cart is kept)
//! - `whoami` - Show the signed-in user
//! - `checkout` - WhatsApp checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mattys_media_client::{ClientConfig, StorefrontContext};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "mm-cli")]
#[command(author, version, about = "Matty's Media storefront CLI")]
struct Cli {
    /// Directory holding the persisted cart and session
    #[arg(long, global = true, env = "MATTYS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog products
    Products {
        /// Only show this category (e.g. business-cards, banners, posters)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Inspect and edit the local cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Sign in and merge the local cart with the server cart
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "MATTYS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and merge the local cart with the server cart
    Register {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Account password
        #[arg(short, long, env = "MATTYS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out (the cart is kept)
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Generate a WhatsApp order link for the cart
    Checkout,
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and totals
    Show,
    /// Add a product to the cart
    Add {
        /// Product ID (as listed by `products`)
        product_id: String,

        /// Product name to use instead of the catalog entry
        #[arg(long, requires = "price")]
        name: Option<String>,

        /// Unit price to use instead of the catalog entry (e.g. 29.99)
        #[arg(long, requires = "name")]
        price: Option<String>,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,

        /// Personalization text
        #[arg(short = 't', long)]
        custom_text: Option<String>,
    },
    /// Remove the line at a position (as shown by `cart show`)
    Remove {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        position: u32,
    },
    /// Set the quantity of a line; zero or less removes it
    Set {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        position: u32,

        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove every line
    Clear {
        /// Also empty the server cart (requires a session)
        #[arg(long)]
        remote: bool,
    },
}

/// Initialize Sentry error tracking, if configured.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
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

#[allow(clippy::print_stderr)]
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data_dir = data_dir;
    }

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "mattys_media_client=info,mattys_media_cli=info".into()
    });
    let sentry_layer = config
        .sentry_dsn
        .is_some()
        .then(|| sentry_tracing::layer().event_filter(sentry_event_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = StorefrontContext::new(config)?;

    match cli.command {
        Commands::Products { category } => {
            commands::products::list(&ctx, category.as_deref()).await?;
        }
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx),
            CartAction::Add {
                product_id,
                name,
                price,
                quantity,
                custom_text,
            } => {
                let manual = name
                    .zip(price)
                    .map(|(name, price)| commands::cart::ManualEntry { name, price });
                commands::cart::add(&ctx, product_id, quantity, custom_text, manual).await?;
            }
            CartAction::Remove { position } => commands::cart::remove(&ctx, position)?,
            CartAction::Set { position, quantity } => {
                commands::cart::set_quantity(&ctx, position, quantity)?;
            }
            CartAction::Clear { remote } => commands::cart::clear(&ctx, remote).await?,
        },
        Commands::Login { email, password } => {
            commands::auth::login(&ctx, &email, password.into()).await?;
        }
        Commands::Register {
            email,
            name,
            password,
        } => commands::auth::register(&ctx, &email, &name, password.into()).await?,
        Commands::Logout => commands::auth::logout(&ctx)?,
        Commands::Whoami => commands::auth::whoami(&ctx).await,
        Commands::Checkout => commands::checkout::whatsapp(&ctx).await?,
    }
    Ok(())
}
