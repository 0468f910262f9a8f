//! sql-grader command-line shell.

use sql_grader::cli::{Cli, Command};
use sql_grader::config::Config;
use sql_grader::db::{self, ExecutionChannel};
use sql_grader::error::{GraderError, Result};
use sql_grader::grading::{GradingEngine, GradingSession};
use sql_grader::render::render_table;
use sql_grader::store::{assignments, grades, RecordStore};
use std::io::Read;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let store_path = match &cli.store {
        Some(path) => path.clone(),
        None => config.store_path()?,
    };
    let store = RecordStore::open(&store_path).await?;

    let result = dispatch(&cli, &config, &store).await;
    store.close().await;
    result
}

async fn dispatch(cli: &Cli, config: &Config, store: &RecordStore) -> Result<()> {
    match &cli.command {
        Command::Grade {
            user,
            assignment,
            file,
        } => {
            let sql = read_sql(file.as_ref(), None)?;
            let channel = open_channel(cli, config).await?;
            let engine = GradingEngine::new(channel.as_ref(), store);
            let session = GradingSession {
                user_id: *user,
                assignment_id: *assignment,
            };

            let report = engine.grade(&session, &sql).await;
            channel.close().await?;
            let report = report?;

            println!("Score: {}", report.score);
            println!("Best:  {}", report.best_score);
            println!("{}", report.feedback());
        }

        Command::Preview { sql, file } => {
            let sql = read_sql(file.as_ref(), sql.as_deref())?;
            let channel = open_channel(cli, config).await?;

            let result = channel.execute(&sql).await;
            channel.close().await?;

            match result {
                Ok(result) => print!("{}", render_table(&result)),
                Err(e) => {
                    eprintln!("Query failed: {e}");
                    std::process::exit(1);
                }
            }
        }

        Command::Assignments => {
            for assignment in assignments::list_assignments(store.pool()).await? {
                println!("{:>6}  {}", assignment.id, assignment.name);
            }
        }

        Command::Scores { user } => {
            let scores = grades::assignment_scores(store.pool(), *user).await?;
            if scores.is_empty() {
                println!("No grades recorded for user {user}.");
                return Ok(());
            }
            for score in &scores {
                println!("{:>6}  {}", score.grade, score.assignment_name);
            }
            if let Some(avg) = grades::average_grade(store.pool(), *user).await? {
                println!("Average: {avg:.2}");
            }
        }
    }

    Ok(())
}

/// Opens the grading channel, resolving the connection with precedence:
/// CLI arguments, then the config file's `[grading]` table, then `PG*`
/// environment variables as defaults.
async fn open_channel(cli: &Cli, config: &Config) -> Result<Box<dyn ExecutionChannel>> {
    let mut connection = cli.to_connection_config()?;

    if connection.is_none() {
        connection = config.grading.clone();
    }

    let mut connection = connection.ok_or_else(|| {
        GraderError::config(
            "No grading data source configured. Pass --grading-db or add a [grading] \
             table to the config file.",
        )
    })?;
    connection.apply_env_defaults();

    info!("Grading data source: {}", connection.display_string());
    db::connect(&connection).await
}

/// Reads SQL text from a file, an inline argument, or stdin.
fn read_sql(file: Option<&PathBuf>, inline: Option<&str>) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path).map_err(|e| {
            GraderError::config(format!("Failed to read SQL file {}: {e}", path.display()))
        });
    }

    if let Some(sql) = inline {
        return Ok(sql.to_string());
    }

    let mut sql = String::new();
    std::io::stdin()
        .read_to_string(&mut sql)
        .map_err(|e| GraderError::config(format!("Failed to read SQL from stdin: {e}")))?;

    if sql.trim().is_empty() {
        return Err(GraderError::config("No SQL provided"));
    }

    Ok(sql)
}
