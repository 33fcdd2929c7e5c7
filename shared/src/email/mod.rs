use std::path::Path;

use serde::Deserialize;

use crate::config::EmailConfig;

mod graph;
mod smtp;

pub use graph::GraphMailer;
pub use smtp::{Relay, RelayOverride, SmtpMailer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Graph,
    Smtp,
}

/// The two interchangeable delivery transports. One attempt per send, no
/// retry or queuing; a failure is surfaced to the caller.
pub enum Mailer {
    Graph(GraphMailer),
    Smtp(SmtpMailer),
}

impl Mailer {
    /// Builds the configured transport. Misconfiguration (missing
    /// credential, unrecognized sender domain) fails here, before any
    /// network attempt.
    pub fn from_config(
        email: &EmailConfig,
        graph_token: Option<String>,
        smtp_password: Option<String>,
    ) -> anyhow::Result<Self> {
        match email.transport {
            TransportKind::Graph => Ok(Self::Graph(GraphMailer::new(
                email.graph_token(graph_token)?,
            ))),
            TransportKind::Smtp => {
                let relay = Relay::for_sender(&email.from, email.smtp_relay.as_ref())?;
                Ok(Self::Smtp(SmtpMailer::new(
                    email.from.clone(),
                    email.smtp_password(smtp_password)?,
                    relay,
                )))
            }
        }
    }

    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> anyhow::Result<()> {
        match self {
            Self::Graph(mailer) => mailer.send(recipient, subject, body, attachment).await,
            Self::Smtp(mailer) => mailer.send(recipient, subject, body, attachment).await,
        }
    }
}
