//! Shopfront CLI - a terminal storefront over the commerce API.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! shop products --search linen --page 1
//! shop product 42
//! shop categories
//!
//! # Sign in (password from SHOPFRONT_PASSWORD or stdin)
//! shop login kim@shop.com
//! shop whoami
//!
//! # Cart and checkout
//! shop cart add 42
//! shop cart set 42 3
//! shop cart show
//! shop checkout --name Kim --address "1 Main St" --city Seoul --postal-code 04524 --country KR
//!
//! # New account
//! shop signup send-code new@shop.com
//! shop signup verify new@shop.com 123456
//! shop signup register new@shop.com <token> --name Kim --phone 010-1234-5678
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPFRONT_API_URL` - API base URL (default `http://localhost:8080/api/v1`)
//! - `SHOPFRONT_DATA_DIR` - where tokens and the cart are kept (default `.shopfront`)
//! - `SHOPFRONT_HTTP_TIMEOUT_SECS`, `SHOPFRONT_CACHE_TTL_SECS`
//! - `RUST_LOG` - log filter; logs go to stderr

#![cfg_attr(not(test), forbid(unsafe_code))]
// Command results are the program's output
#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "shop")]
#[command(author, version, about = "Shopfront command-line storefront")]
struct Cli {
    /// Directory for persisted tokens and cart (overrides `SHOPFRONT_DATA_DIR`)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products
    Products {
        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Products per page
        #[arg(long, default_value_t = shopfront_client::api::DEFAULT_PAGE_SIZE)]
        size: u32,

        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,

        /// Category id filter
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one product
    Product {
        /// Product id
        id: String,
    },
    /// List categories
    Categories,
    /// Sign in
    Login {
        /// Account email
        email: String,

        /// Password; read from stdin when omitted
        #[arg(long, env = "SHOPFRONT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and forget the stored tokens
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Register a new account
    Signup {
        #[command(subcommand)]
        step: SignupStep,
    },
    /// Manage the local cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Order everything in the cart
    Checkout {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        postal_code: String,
        #[arg(long)]
        country: String,
    },
}

#[derive(Subcommand)]
enum SignupStep {
    /// Email a verification code
    SendCode {
        email: String,
    },
    /// Check the emailed code; prints the signup token
    Verify {
        email: String,
        code: String,
    },
    /// Create the account with the token from `verify`
    Register {
        email: String,
        token: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        phone: String,

        /// Password; read from stdin when omitted
        #[arg(long, env = "SHOPFRONT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and total
    Show,
    /// Add one unit of a product
    Add {
        product_id: String,
    },
    /// Remove a product's line
    Remove {
        product_id: String,
    },
    /// Set a line's quantity
    Set {
        product_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shopfront_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        println!("{}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = Context::load(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Products {
            page,
            size,
            search,
            category,
        } => commands::catalog::products(&ctx, page, size, search, category).await,
        Commands::Product { id } => commands::catalog::product(&ctx, &id).await,
        Commands::Categories => commands::catalog::categories(&ctx).await,
        Commands::Login { email, password } => {
            let password = password_or_stdin(password)?;
            commands::account::login(&ctx, &email, &password).await
        }
        Commands::Logout => commands::account::logout(&ctx).await,
        Commands::Whoami => commands::account::whoami(&ctx).await,
        Commands::Signup { step } => match step {
            SignupStep::SendCode { email } => commands::signup::send_code(&ctx, &email).await,
            SignupStep::Verify { email, code } => {
                commands::signup::verify(&ctx, &email, &code).await
            }
            SignupStep::Register {
                email,
                token,
                name,
                phone,
                password,
            } => {
                let password = password_or_stdin(password)?;
                commands::signup::register(&ctx, &email, &token, password, &name, &phone).await
            }
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx).await,
            CartAction::Add { product_id } => commands::cart::add(&ctx, &product_id).await,
            CartAction::Remove { product_id } => commands::cart::remove(&ctx, &product_id).await,
            CartAction::Set {
                product_id,
                quantity,
            } => commands::cart::set(&ctx, &product_id, quantity).await,
            CartAction::Clear => commands::cart::clear(&ctx).await,
        },
        Commands::Checkout {
            name,
            address,
            city,
            postal_code,
            country,
        } => {
            let shipping = shopfront_core::ShippingInfo {
                name,
                address,
                city,
                postal_code,
                country,
            };
            commands::checkout::run(&ctx, &shipping).await
        }
    }
}

/// Use the given password, or read one line from stdin.
fn password_or_stdin(password: Option<String>) -> Result<SecretString, CliError> {
    if let Some(password) = password {
        return Ok(SecretString::from(password));
    }
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(SecretString::from(line.trim_end_matches(['\r', '\n'])))
}
