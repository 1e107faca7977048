//! # Lunchpair: recurring random lunch matches
//!
//! Usage:
//!   lunchpair serve                                  # Register all schedules and run
//!   lunchpair schedule create --org 7 --days MON,WED # Add a weekly schedule
//!   lunchpair schedule list --org 7
//!   lunchpair user add --first Ada --last Lovelace --email ada@example.com
//!   lunchpair join --schedule 1 --user 1
//!   lunchpair run --schedule 1                       # Fire one round now

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lunchpair_core::{LunchConfig, RecurrenceStore, ScheduleRequest};
use lunchpair_scheduler::{Collaborators, SchedulerEngine, SqliteStore, mailer_from_config, rules};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lunchpair", version, about = "🥪 Lunchpair: recurring random lunch matches")]
struct Cli {
    /// Config file (default: ~/.lunchpair/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the database path from config
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register every stored schedule and run until Ctrl-C
    Serve,
    /// Manage schedules
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Opt a user in to a schedule
    Join {
        #[arg(long)]
        schedule: u64,
        #[arg(long)]
        user: u64,
    },
    /// Run one matching round immediately and print the outcome as JSON
    Run {
        #[arg(long)]
        schedule: u64,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Create a weekly schedule
    ///
    /// The rule is stored only. A `serve` process that is already running
    /// does not see it until it restarts; `run --schedule <id>` fires it now.
    Create {
        #[arg(long)]
        org: u64,
        /// Comma-separated weekdays: SUN,MON,TUE,WED,THU,FRI,SAT
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
    },
    /// List schedules, optionally for one organization
    List {
        #[arg(long)]
        org: Option<u64>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Add a user
    Add {
        #[arg(long)]
        first: String,
        #[arg(long)]
        last: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "lunchpair=debug,lunchpair_scheduler=debug"
    } else {
        "lunchpair=info,lunchpair_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => LunchConfig::load_from(path)?,
        None => LunchConfig::load()?,
    };
    if let Some(db_path) = &cli.db_path {
        config.database.path = db_path.clone();
    }

    let db_path = config.database.resolved_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = Arc::new(SqliteStore::open(&db_path)?);

    match cli.command {
        Command::Serve => serve(config, store).await?,
        Command::Schedule { action } => match action {
            ScheduleAction::Create { org, days } => {
                let request = ScheduleRequest { org_id: org, days };
                let expression =
                    rules::expression_for(&request, config.schedule.hour, config.schedule.minute)?;
                let rule = store.create_rule(org, &expression).await?;
                println!("✅ Schedule {} created for organization {org}: '{}'", rule.id, rule.expression);
                println!("   A running `serve` picks it up at its next start.");
            }
            ScheduleAction::List { org } => {
                let all = match org {
                    Some(org) => store.list_org_rules(org).await?,
                    None => store.list_rules().await?,
                };
                for rule in all {
                    println!("{:>6}  org {:<6}  {}", rule.id, rule.org_id, rule.expression);
                }
            }
        },
        Command::User { action } => match action {
            UserAction::Add { first, last, email } => {
                let user = store.add_user(&first, &last, &email)?;
                println!("✅ User {} added: {} {} <{}>", user.user_id, user.first_name, user.last_name, user.email);
            }
        },
        Command::Join { schedule, user } => {
            store.add_participant(schedule, user).await?;
            println!("✅ User {user} joined schedule {schedule}");
        }
        Command::Run { schedule } => {
            let engine = engine(&config, store)?;
            let outcome = engine.run_now(schedule).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

fn engine(config: &LunchConfig, store: Arc<SqliteStore>) -> Result<SchedulerEngine> {
    let mailer = mailer_from_config(&config.mail)?;
    let collaborators = Collaborators {
        rules: store.clone(),
        matches: store.clone(),
        users: store,
        mailer,
    };
    Ok(SchedulerEngine::new(collaborators).with_schedule(config.schedule.clone()))
}

async fn serve(config: LunchConfig, store: Arc<SqliteStore>) -> Result<()> {
    let engine = engine(&config, store)?;

    // An unreachable store at startup is fatal.
    let registered = engine
        .register_all()
        .await
        .context("registering schedules at startup")?;

    println!("🥪 Lunchpair v{}", env!("CARGO_PKG_VERSION"));
    println!("   🗄️  Database:  {}", config.database.resolved_path().display());
    println!("   📧 Mail:      {}", if config.mail.enabled { config.mail.smtp_host.as_str() } else { "disabled (log only)" });
    println!("   📅 Schedules: {registered}");
    for timer in engine.timers().await {
        let next = timer
            .next_fire
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".into());
        println!("      {} schedule {} '{}' → next {next}", timer.handle, timer.rule_id, timer.expression);
    }
    println!();

    tokio::signal::ctrl_c().await?;
    let stopped = engine.shutdown().await;
    tracing::info!("👋 Shutting down, {stopped} timer(s) stopped");
    Ok(())
}
