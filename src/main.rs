use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod auth;
mod config;
mod db;
mod error;
mod lifecycle;
mod models;
mod report;
mod sentiment;

use auth::Session;
use config::Config;
use error::GrievanceError;
use lifecycle::{StatusUpdate, TransitionPolicy};
use models::{Category, Grievance, NewGrievance, Role, Status};
use sentiment::VaderScorer;

#[derive(Parser)]
#[command(name = "grievance-triage")]
#[command(about = "Grievance intake with sentiment-based triage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Credentials {
    #[arg(long, env = "GRIEVANCE_USER")]
    username: String,
    #[arg(long, env = "GRIEVANCE_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Score text without storing anything
    Analyze {
        text: String,
        #[arg(long)]
        json: bool,
    },
    #[command(flatten)]
    Db(DbCommands),
}

/// Commands that need a database connection.
#[derive(Subcommand)]
enum DbCommands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo accounts and grievances
    Seed,
    /// Create a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, default_value = "student")]
        role: Role,
    },
    /// Submit a new grievance
    Submit {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "Other")]
        category: Category,
        #[arg(long)]
        description: String,
        #[arg(long)]
        anonymous: bool,
        #[arg(long)]
        json: bool,
    },
    /// List your grievances (admins see every grievance)
    List {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Show the latest grievances for triage
    Queue {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Change a grievance's status and response
    Update {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        status: Status,
        #[arg(long)]
        response: Option<String>,
    },
    /// Rate how a resolved grievance was handled
    Rate {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        rating: i32,
    },
    /// Show headline numbers
    Dashboard {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Generate a markdown analytics report
    Report {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Import grievances from a CSV file
    Import {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        csv: PathBuf,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "grievance_triage=info".into());
    let log_format = std::env::var("GRIEVANCE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let scorer = VaderScorer::new();

    let command = match cli.command {
        Commands::Analyze { text, json } => {
            let triage = sentiment::analyze(&scorer, &text);
            if json {
                println!("{}", serde_json::to_string_pretty(&triage)?);
            } else {
                print_triage(&triage);
            }
            return Ok(());
        }
        Commands::Db(command) => command,
    };

    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match command {
        DbCommands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        DbCommands::Seed => {
            let inserted = db::seed(&pool, &scorer).await?;
            println!("Seed data inserted ({inserted} new grievances).");
        }
        DbCommands::Register {
            username,
            email,
            password,
            confirm_password,
            role,
        } => {
            auth::validate_registration(&password, &confirm_password)?;
            if !db::create_user(&pool, &username, &email, &password, role).await? {
                return Err(GrievanceError::DuplicateAccount.into());
            }
            info!(username = %username, role = %role, "registered account");
            println!("Registration successful! Please login.");
        }
        DbCommands::Submit {
            credentials,
            title,
            category,
            description,
            anonymous,
            json,
        } => {
            let session = login(&pool, &credentials).await?;
            let new = NewGrievance {
                submitter_id: if anonymous { None } else { Some(session.user_id) },
                title,
                category,
                description,
            };
            new.validate()?;

            let triage = sentiment::analyze(&scorer, &new.description);
            let id = db::submit_grievance(&pool, &new, &triage).await?;
            info!(%id, anonymous, priority = triage.priority.level(), "grievance submitted");

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "id": id, "triage": triage }))?
                );
            } else {
                println!("Grievance {id} submitted successfully!");
                print_triage(&triage);
            }
        }
        DbCommands::List { credentials } => {
            let session = login(&pool, &credentials).await?;
            let grievances = db::fetch_grievances(&pool, session.visible_submitter(), None).await?;
            if grievances.is_empty() {
                println!("You haven't submitted any grievances yet.");
                return Ok(());
            }
            for grievance in &grievances {
                print_grievance(grievance);
            }
        }
        DbCommands::Queue { credentials, limit } => {
            let session = login(&pool, &credentials).await?;
            session.require_staff()?;
            let grievances = db::fetch_grievances(&pool, None, Some(limit)).await?;
            if grievances.is_empty() {
                println!("No grievances to manage.");
                return Ok(());
            }
            for grievance in &grievances {
                print_grievance(grievance);
            }
        }
        DbCommands::Update {
            credentials,
            id,
            status,
            response,
        } => {
            let session = login(&pool, &credentials).await?;
            let update = StatusUpdate::new(status, response);
            update_status(&pool, &session, id, &update, config.transition_policy).await?;
            println!("Grievance updated!");
        }
        DbCommands::Rate {
            credentials,
            id,
            rating,
        } => {
            let session = login(&pool, &credentials).await?;
            let grievance = db::fetch_grievance(&pool, id)
                .await?
                .ok_or(GrievanceError::NotFound(id))?;
            lifecycle::check_rating(&session, &grievance, rating)?;
            db::set_rating(&pool, id, rating).await?;
            info!(%id, rating, "grievance rated");
            println!("Thanks for your feedback!");
        }
        DbCommands::Dashboard { credentials } => {
            login(&pool, &credentials).await?;
            let analytics = db::fetch_analytics(&pool).await?;
            print!("{}", report::render_dashboard(&analytics));
        }
        DbCommands::Report { credentials, out } => {
            let session = login(&pool, &credentials).await?;
            session.require_staff()?;
            let grievances = db::fetch_grievances(&pool, None, None).await?;
            let report = report::build_report(chrono::Utc::now().date_naive(), &grievances);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        DbCommands::Import { credentials, csv } => {
            let session = login(&pool, &credentials).await?;
            session.require_staff()?;
            let summary = db::import_csv(&pool, &csv, &scorer).await?;
            println!(
                "Inserted {} grievances from {} ({} skipped).",
                summary.inserted,
                csv.display(),
                summary.skipped
            );
        }
    }

    Ok(())
}

async fn login(pool: &PgPool, credentials: &Credentials) -> anyhow::Result<Session> {
    match db::authenticate_user(pool, &credentials.username, &credentials.password).await? {
        Some(user) => Ok(Session::from(user)),
        None => Err(GrievanceError::InvalidCredentials.into()),
    }
}

async fn update_status(
    pool: &PgPool,
    session: &Session,
    id: Uuid,
    update: &StatusUpdate,
    policy: TransitionPolicy,
) -> anyhow::Result<()> {
    let grievance = db::fetch_grievance(pool, id)
        .await?
        .ok_or(GrievanceError::NotFound(id))?;
    lifecycle::check_update(session, &grievance, update, policy)?;
    db::update_grievance_status(pool, id, update).await?;
    info!(
        %id,
        by = %session.username,
        from = %grievance.status,
        to = %update.status,
        "grievance status updated"
    );
    Ok(())
}

fn print_triage(triage: &sentiment::Triage) {
    println!("Sentiment: {}", triage.sentiment);
    println!("Priority: {}", triage.priority.label());
    println!("Impact score: {:.3}", triage.impact_score);
}

fn print_grievance(grievance: &Grievance) {
    println!("#{} - {} [{}]", grievance.id, grievance.title, grievance.status);
    println!(
        "  category {} | priority {} | sentiment {} | submitted {}",
        grievance.category,
        grievance.priority.level(),
        grievance.sentiment,
        grievance.created_at.format("%Y-%m-%d %H:%M")
    );
    println!(
        "  submitter: {}",
        grievance.submitter_name.as_deref().unwrap_or("anonymous")
    );
    println!("  {}", grievance.description);
    if let Some(response) = &grievance.response {
        println!("  response: {response}");
    }
    if let Some(rating) = grievance.rating {
        println!("  rating: {rating}/5");
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_parses_without_database_command() {
        let cli = Cli::try_parse_from(["grievance-triage", "analyze", "--json", "The heater is broken"]).unwrap();
        match cli.command {
            Commands::Analyze { text, json } => {
                assert_eq!(text, "The heater is broken");
                assert!(json);
            }
            Commands::Db(_) => panic!("analyze parsed as a database command"),
        }
    }

    #[test]
    fn database_commands_stay_top_level() {
        let cli = Cli::try_parse_from(["grievance-triage", "init-db"]).unwrap();
        assert!(matches!(cli.command, Commands::Db(DbCommands::InitDb)));

        let cli = Cli::try_parse_from([
            "grievance-triage",
            "update",
            "--username",
            "dana.staff",
            "--password",
            "password123",
            "--id",
            "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            "--status",
            "in-progress",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Db(DbCommands::Update {
                status: Status::InProgress,
                response: None,
                ..
            })
        ));
    }
}
