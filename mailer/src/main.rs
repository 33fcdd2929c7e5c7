use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{error::ErrorKind, Parser, Subcommand};
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use shared::{email::Mailer, Config};

#[derive(Deserialize)]
struct Env {
    graph_token: Option<String>,
    smtp_password: Option<String>,
    config_file: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "gitlab-monitor-mailer",
    about = "Sends an email through the configured transport"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send an email, optionally with an attachment
    Send {
        recipient: String,
        subject: String,
        body: String,
        attachment: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to send email: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let env = envy::from_env::<Env>()?;
    let config_file = env
        .config_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("Config.toml"));
    let config = Config::load_from_file(&config_file)?;
    let email = config.email.as_ref().context(
        "No [email] section in the config file: add one with from/to addresses and a transport",
    )?;
    let mailer = Mailer::from_config(email, env.graph_token, env.smtp_password)?;

    let Command::Send {
        recipient,
        subject,
        body,
        attachment,
    } = cli.command;
    mailer
        .send(&recipient, &subject, &body, attachment.as_deref())
        .await?;
    info!("Email sent to {recipient} at {}", chrono::Utc::now());

    Ok(())
}
