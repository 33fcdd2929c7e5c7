use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::email::{RelayOverride, TransportKind};
use crate::gitlab::Project;

/// Runtime configuration, loaded once at startup and passed by reference
/// into everything that needs it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    pub email: Option<EmailConfig>,
    gitlab_token: Option<String>,
}

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// The environment value wins; the config file is the fallback.
    pub fn gitlab_token(&self, env_value: Option<String>) -> anyhow::Result<String> {
        env_value.or_else(|| self.gitlab_token.clone()).context(
            "GitLab token is not configured: export GITLAB_TOKEN or set gitlab_token in the config file",
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    pub to: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_body")]
    pub body: String,
    #[serde(default)]
    pub transport: TransportKind,
    pub smtp_relay: Option<RelayOverride>,
    graph_token: Option<String>,
    smtp_password: Option<String>,
}

impl EmailConfig {
    pub fn subject(&self, date: NaiveDate) -> String {
        format_template(&self.subject, &[("date", &date.to_string())])
    }

    pub fn body(&self, date: NaiveDate, timestamp: &str, filename: &str) -> String {
        format_template(
            &self.body,
            &[
                ("date", &date.to_string()),
                ("timestamp", timestamp),
                ("filename", filename),
            ],
        )
    }

    pub fn graph_token(&self, env_value: Option<String>) -> anyhow::Result<String> {
        env_value.or_else(|| self.graph_token.clone()).context(
            "Graph token is not configured: export GRAPH_TOKEN or set email.graph_token in the config file",
        )
    }

    pub fn smtp_password(&self, env_value: Option<String>) -> anyhow::Result<String> {
        env_value.or_else(|| self.smtp_password.clone()).context(
            "SMTP password is not configured: export SMTP_PASSWORD or set email.smtp_password in the config file",
        )
    }
}

fn format_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut message = template.to_string();
    for (key, value) in values {
        message = message.replace(&format!("{{{key}}}"), value);
    }
    message
}

fn default_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_subject() -> String {
    "GitLab Activity Report - {date}".to_string()
}

fn default_body() -> String {
    "Hello,\n\n\
     Please find attached the GitLab activity report generated on {date}.\n\n\
     Report Details:\n\
     - Generated at: {timestamp}\n\
     - Report file: {filename}\n\
     - Monitoring script completed successfully\n\n\
     Best regards,\n\
     GitLab Monitoring System\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Config {
        toml::from_str(raw).unwrap()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse("");
        assert_eq!(config.base_url, "https://gitlab.com");
        assert_eq!(config.report_dir, PathBuf::from("."));
        assert!(config.projects.is_empty());
        assert!(config.email.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config = parse(
            r#"
            base_url = "https://gitlab.example.com/"
            gitlab_token = "file-token"

            [[projects]]
            name = "demo"
            id = 1

            [email]
            from = "sender@gmail.com"
            to = "recipient@example.com"
            transport = "smtp"

            [email.smtp_relay]
            host = "smtp.example.com"
            port = 2525
            "#,
        );
        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].name, "demo");
        let email = config.email.unwrap();
        assert_eq!(email.transport, TransportKind::Smtp);
        assert_eq!(email.smtp_relay.unwrap().host, "smtp.example.com");
    }

    #[test]
    fn env_token_wins_over_file() {
        let config = parse("gitlab_token = \"file-token\"");
        let token = config.gitlab_token(Some("env-token".to_string())).unwrap();
        assert_eq!(token, "env-token");
    }

    #[test]
    fn file_token_is_the_fallback() {
        let config = parse("gitlab_token = \"file-token\"");
        assert_eq!(config.gitlab_token(None).unwrap(), "file-token");
    }

    #[test]
    fn missing_token_reports_both_sources() {
        let config = parse("");
        let err = config.gitlab_token(None).unwrap_err().to_string();
        assert!(err.contains("GITLAB_TOKEN"));
        assert!(err.contains("gitlab_token"));
    }

    #[test]
    fn templates_substitute_placeholders() {
        let config = parse(
            r#"
            [email]
            from = "a@gmail.com"
            to = "b@example.com"
            subject = "Report - {date}"
            body = "{filename} generated at {timestamp} on {date}"
            "#,
        );
        let email = config.email.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        assert_eq!(email.subject(date), "Report - 2024-01-06");
        assert_eq!(
            email.body(date, "2024-01-06 09:00:00 UTC", "report.csv"),
            "report.csv generated at 2024-01-06 09:00:00 UTC on 2024-01-06"
        );
    }

    #[test]
    fn load_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        fs::write(&path, "base_url = \"https://git.internal\"").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.base_url, "https://git.internal");
    }
}
