//! CLI administration tool for link-shortener.
//!
//! Inspects links and the visit queue without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Show one link by short code
//! cargo run --bin admin -- link show ab12CD34
//!
//! # List an owner's links
//! cargo run --bin admin -- link list --owner 64b7f0c2e1a4
//!
//! # Visit stream length, pending entries and dead letters
//! cargo run --bin admin -- queue info
//!
//! # Move dead-lettered visit events back onto the visit stream
//! cargo run --bin admin -- queue requeue-dead
//!
//! # Generate a value for INTERNAL_API_TOKEN
//! cargo run --bin admin -- token generate
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required for `link` and `db`): PostgreSQL connection string
//! - `REDIS_URL` (required for `queue`): Redis connection string
//! - `VISIT_STREAM`, `VISIT_DEAD_LETTER_STREAM`, `VISIT_CONSUMER_GROUP`: same defaults as the server

use link_shortener::domain::entities::ShortLink;
use link_shortener::domain::repositories::LinkRepository;
use link_shortener::infrastructure::persistence::PgLinkRepository;
use link_shortener::infrastructure::queue::{RedisStreamQueue, StreamTopology};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing link-shortener.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Inspect short links
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Inspect and repair the visit queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Internal API token helpers
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Show a link by short code
    Show {
        /// 8-character short code
        short_code: String,
    },

    /// List links of one owner, newest first
    List {
        #[arg(short, long)]
        owner: String,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Show stream length, pending entries and dead letters
    Info,

    /// Move dead-lettered events back onto the visit stream
    RequeueDead {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Generate a random token and print its fingerprint
    Generate,

    /// Print the fingerprint of a token, to compare deployments without sharing it
    Fingerprint { token: String },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Link { action } => handle_link_action(action, &connect_database().await?).await?,
        Commands::Queue { action } => handle_queue_action(action, connect_queue().await?).await?,
        Commands::Token { action } => handle_token_action(action),
        Commands::Db { action } => handle_db_action(action, &connect_database().await?).await?,
    }

    Ok(())
}

async fn connect_database() -> Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")
}

async fn connect_queue() -> Result<RedisStreamQueue> {
    let redis_url = std::env::var("REDIS_URL").context("REDIS_URL must be set")?;

    let env_or = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    let topology = StreamTopology {
        stream: env_or("VISIT_STREAM", "visits"),
        dead_letter_stream: env_or("VISIT_DEAD_LETTER_STREAM", "visits:dead"),
        group: env_or("VISIT_CONSUMER_GROUP", "visit-counter"),
    };

    RedisStreamQueue::connect(&redis_url, topology)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to visit stream: {}", e))
}

/// Dispatches link inspection commands.
async fn handle_link_action(action: LinkAction, pool: &PgPool) -> Result<()> {
    let repo = PgLinkRepository::new(Arc::new(pool.clone()));

    match action {
        LinkAction::Show { short_code } => {
            let link = repo
                .find_by_code(&short_code)
                .await
                .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
                .context("Short link not found")?;

            print_link(&link);
        }
        LinkAction::List { owner } => {
            let links = repo
                .list_by_owner(&owner)
                .await
                .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

            print_link_table(&owner, &links);
        }
    }

    Ok(())
}

fn print_link(link: &ShortLink) {
    println!("{}", "🔗 Short Link".bright_blue().bold());
    println!();
    println!("  ID:       {}", link.id.to_string().bright_black());
    println!("  Code:     {}", link.short_code.cyan());
    println!("  Owner:    {}", link.owner_id);
    println!("  URL:      {}", link.full_url.bright_white());
    println!("  Visited:  {}", link.visited.to_string().bright_green().bold());
    println!(
        "  Created:  {}",
        link.created_at.format("%Y-%m-%d %H:%M").to_string().bright_black()
    );
    if let Some(updated_at) = link.updated_at {
        println!(
            "  Updated:  {}",
            updated_at.format("%Y-%m-%d %H:%M").to_string().bright_black()
        );
    }
    println!();
}

/// Prints an owner's links.
///
/// # Output Format
///
/// ```text
/// 📋 Links of 64b7f0c2e1a4
///
///   ID    Code      Visited  Created           URL
///   ──────────────────────────────────────────────────────────────────────────
///   3     ab12CD34  6        2024-01-15 10:30  https://example.com
/// ```
fn print_link_table(owner: &str, links: &[ShortLink]) {
    println!("{} {}", "📋 Links of".bright_blue().bold(), owner.bright_blue().bold());
    println!();

    if links.is_empty() {
        println!("{}", "  No links found".yellow());
        return;
    }

    println!(
        "  {:<5} {:<9} {:<8} {:<17} {}",
        "ID".bright_white().bold(),
        "Code".bright_white().bold(),
        "Visited".bright_white().bold(),
        "Created".bright_white().bold(),
        "URL".bright_white().bold()
    );
    println!("  {}", "─".repeat(75).bright_black());

    for link in links {
        println!(
            "  {:<5} {:<9} {:<8} {:<17} {}",
            link.id.to_string().bright_black(),
            link.short_code.cyan(),
            link.visited.to_string().bright_green(),
            link.created_at.format("%Y-%m-%d %H:%M").to_string().bright_black(),
            link.full_url
        );
    }

    println!();
    println!("  Total: {}", links.len().to_string().bright_white().bold());
    println!();
}

/// Dispatches visit queue commands.
async fn handle_queue_action(action: QueueAction, queue: RedisStreamQueue) -> Result<()> {
    match action {
        QueueAction::Info => {
            let stats = queue
                .stats()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read stream stats: {}", e))?;
            let topology = queue.topology();

            println!("{}", "📨 Visit Queue".bright_blue().bold());
            println!();
            println!("  Stream:        {}", topology.stream.cyan());
            println!("  Group:         {}", topology.group.cyan());
            println!("  Length:        {}", stats.length.to_string().bright_white().bold());
            println!("  Pending:       {}", stats.pending.to_string().bright_white().bold());

            let dead = stats.dead_letters.to_string();
            let dead = if stats.dead_letters == 0 {
                dead.bright_green()
            } else {
                dead.red()
            };
            println!("  Dead letters:  {} ({})", dead.bold(), topology.dead_letter_stream);
            println!();
        }
        QueueAction::RequeueDead { yes } => {
            let stats = queue
                .stats()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read stream stats: {}", e))?;

            if stats.dead_letters == 0 {
                println!("{}", "✅ No dead letters".green());
                return Ok(());
            }

            println!(
                "  {} dead-lettered visit events will be moved back to {}",
                stats.dead_letters.to_string().yellow().bold(),
                queue.topology().stream.cyan()
            );

            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt("Requeue them?")
                    .default(false)
                    .interact()?;

                if !confirmed {
                    println!("{}", "❌ Cancelled".red());
                    return Ok(());
                }
            }

            let moved = queue
                .requeue_dead_letters()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to requeue dead letters: {}", e))?;

            println!();
            println!(
                "{} {}",
                "✅ Requeued".green().bold(),
                moved.to_string().bright_white().bold()
            );
            println!();
        }
    }

    Ok(())
}

fn handle_token_action(action: TokenAction) {
    match action {
        TokenAction::Generate => {
            let token = generate_token();

            println!("{}", "🔑 Internal API Token".bright_blue().bold());
            println!();
            println!("  Token:       {}", token.bright_yellow().bold());
            println!("  Fingerprint: {}", fingerprint(&token).bright_black());
            println!();
            println!("{}", "Set it on this service and on every calling service:".bright_white());
            println!("  {}={}", "INTERNAL_API_TOKEN".bright_cyan(), token.bright_yellow());
            println!();
        }
        TokenAction::Fingerprint { token } => {
            println!("{}", fingerprint(&token));
        }
    }
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            PgLinkRepository::new(Arc::new(pool.clone()))
                .ping()
                .await
                .map_err(|e| anyhow::anyhow!("Database check failed: {}", e))?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;
            let links_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM short_links")
                .fetch_one(pool)
                .await?;
            let visits_total: i64 =
                sqlx::query_scalar("SELECT COALESCE(SUM(visited), 0)::BIGINT FROM short_links")
                    .fetch_one(pool)
                    .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!("  Links:      {}", links_count.to_string().bright_green().bold());
            println!("  Visits:     {}", visits_total.to_string().bright_green().bold());
            println!();
        }
    }

    Ok(())
}

/// Generates a random 48-character alphanumeric token.
fn generate_token() -> String {
    use rand::Rng;
    use rand::distr::Alphanumeric;

    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// Short SHA-256 fingerprint: first 16 hex characters.
fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}
