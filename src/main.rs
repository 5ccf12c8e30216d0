use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use carbonboard::commands;
use carbonboard::commands::settings::SettingsPayload;
use carbonboard::db::Database;
use carbonboard::error::AppError;
use carbonboard::models::{DashboardScope, GroupBy, PostDraft};
use carbonboard::services::import::{import_demo, import_file};
use carbonboard::services::state::{validate_period, AppState};

#[derive(Parser)]
#[command(name = "carbonboard", version, about = "Carbon emissions dashboard")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "CARBONBOARD_DB", default_value = "carbonboard.sqlite")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the bundled demo dataset.
    Seed,
    /// Import companies and posts from a JSON dataset.
    Import { file: PathBuf },
    /// KPI figures and chart series for the current filter.
    Dashboard {
        #[arg(long, conflicts_with = "country")]
        company: Option<String>,
        #[arg(long)]
        country: Option<String>,
        /// Override the stored period start for this call only.
        #[arg(long)]
        from: Option<String>,
        /// Override the stored period end for this call only.
        #[arg(long)]
        to: Option<String>,
    },
    Companies,
    Countries,
    Posts {
        #[arg(long)]
        company: Option<String>,
    },
    /// Create a post, or update one when --id is given.
    SavePost {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        month: String,
        #[arg(long, default_value = "")]
        content: String,
    },
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long, value_parser = parse_group_by)]
        group_by: Option<GroupBy>,
    },
}

fn parse_group_by(value: &str) -> Result<GroupBy, String> {
    GroupBy::parse(value).ok_or_else(|| format!("expected 'company' or 'country', got '{}'", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = Database::new(cli.db.clone())
        .with_context(|| format!("Open database {}", cli.db.display()))?;
    let state = AppState::new(db);

    if let Err(err) = run(cli.command, &state).await {
        let retryable = err
            .downcast_ref::<AppError>()
            .map(AppError::is_retryable)
            .unwrap_or(false);
        if retryable {
            warn!("The request failed temporarily; nothing was lost, try again");
        }
        return Err(err);
    }
    Ok(())
}

async fn run(command: Command, state: &AppState) -> Result<()> {
    let source = state.source();

    match command {
        Command::Seed => print_json(&import_demo(&state.db)?),
        Command::Import { file } => print_json(&import_file(&state.db, &file)?),
        Command::Dashboard {
            company,
            country,
            from,
            to,
        } => {
            let mut settings = state.snapshot()?;
            if from.is_some() || to.is_some() {
                settings.period = validate_period(
                    from.as_deref().unwrap_or(settings.period.from.as_str()),
                    to.as_deref().unwrap_or(settings.period.to.as_str()),
                )?;
            }
            let scope = match (company, country) {
                (Some(id), _) => DashboardScope::Company(id),
                (None, Some(code)) => DashboardScope::Country(code),
                (None, None) => DashboardScope::All,
            };
            let view = commands::dashboard::get_dashboard(&source, &settings, scope).await?;
            print_json(&view)
        }
        Command::Companies => print_json(&commands::companies::list_companies(&source).await?),
        Command::Countries => print_json(&commands::companies::list_countries(&source).await?),
        Command::Posts { company } => {
            print_json(&commands::posts::list_posts(&source, company.as_deref()).await?)
        }
        Command::SavePost {
            id,
            title,
            company,
            month,
            content,
        } => {
            let draft = PostDraft {
                id,
                title,
                company_id: company,
                year_month: month,
                content,
            };
            print_json(&commands::posts::save_post(&source, &draft).await?)
        }
        Command::Settings { action } => match action {
            SettingsCommand::Show => print_json(&commands::settings::get_settings(state)?),
            SettingsCommand::Set {
                from,
                to,
                rate,
                group_by,
            } => {
                let payload = SettingsPayload {
                    period_from: from,
                    period_to: to,
                    rate_per_ton: rate,
                    group_by,
                };
                print_json(&commands::settings::save_settings(state, payload)?)
            }
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
