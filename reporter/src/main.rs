use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use gitlab_monitor_reporter::{aggregator, report, sink};
use shared::{email::Mailer, Config, GitlabClient};

#[derive(Deserialize)]
struct Env {
    gitlab_token: Option<String>,
    graph_token: Option<String>,
    smtp_password: Option<String>,
    config_file: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "gitlab-monitor-reporter",
    about = "Builds the weekly GitLab activity report and optionally mails it"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the token and list accessible projects with their ids
    Projects {
        /// Narrow the listing to projects matching this term
        #[arg(long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    let env = envy::from_env::<Env>()?;
    let config_file = env
        .config_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("Config.toml"));
    let config = Config::load_from_file(&config_file)?;
    let client = GitlabClient::new(&config.base_url, config.gitlab_token(env.gitlab_token.clone())?);

    match cli.command {
        Some(Command::Projects { search }) => list_projects(&client, search.as_deref()).await,
        None => generate_report(&client, &config, env).await,
    }
}

async fn generate_report(
    client: &GitlabClient,
    config: &Config,
    env: Env,
) -> anyhow::Result<()> {
    let now = chrono::Utc::now();
    let cutoff = aggregator::cutoff_date(now);
    info!("Looking for activity after {cutoff}");

    let records = aggregator::collect_activity(client, &config.projects, cutoff).await;
    let rows = report::build_report(&records);
    info!("Collected {} report entries", rows.len());
    if rows.is_empty() {
        warn!("No data was collected; check the errors above");
    }

    let today = now.date_naive();
    let path = sink::write_report(&rows, &config.report_dir, today)?;

    let Some(email) = &config.email else {
        info!("No email configured, skipping delivery");
        return Ok(());
    };

    let mailer = Mailer::from_config(email, env.graph_token, env.smtp_password)?;
    let timestamp = now.format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let filename = sink::report_filename(today);
    mailer
        .send(
            &email.to,
            &email.subject(today),
            &email.body(today, &timestamp, &filename),
            Some(&path),
        )
        .await?;
    info!("Report emailed to {}", email.to);

    Ok(())
}

async fn list_projects(client: &GitlabClient, search: Option<&str>) -> anyhow::Result<()> {
    let user = client
        .current_user()
        .await
        .context("Token validation failed")?;
    info!(
        "Token is valid, authenticated as {} (@{})",
        user.name, user.username
    );

    let projects = client.accessible_projects(search).await?;
    info!("Found {} accessible projects", projects.len());
    for project in projects {
        println!("{} (ID: {})", project.name, project.id);
    }

    Ok(())
}
