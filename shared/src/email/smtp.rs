use std::fs;
use std::path::Path;

use anyhow::Context;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use tracing::{info, instrument};

/// Fallback relay for senders on domains outside the fixed mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayOverride {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    587
}

/// The closed set of known mail relays, keyed off the sender's domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relay {
    Gmail,
    Outlook,
    Yahoo,
    Custom { host: String, port: u16 },
}

impl Relay {
    /// Picks the relay for a sender address. A domain outside the fixed
    /// mapping needs a configured fallback; without one this fails before
    /// any connection is attempted.
    pub fn for_sender(sender: &str, fallback: Option<&RelayOverride>) -> anyhow::Result<Self> {
        let (_, domain) = sender
            .split_once('@')
            .with_context(|| format!("{sender} is not an email address"))?;
        let domain = domain.to_lowercase();

        if domain.contains("gmail") {
            Ok(Self::Gmail)
        } else if domain.contains("outlook") || domain.contains("hotmail") || domain.contains("live")
        {
            Ok(Self::Outlook)
        } else if domain.contains("yahoo") {
            Ok(Self::Yahoo)
        } else if let Some(fallback) = fallback {
            Ok(Self::Custom {
                host: fallback.host.clone(),
                port: fallback.port,
            })
        } else {
            anyhow::bail!(
                "Unknown email provider for {domain}: set email.smtp_relay in the config file"
            )
        }
    }

    pub fn endpoint(&self) -> (&str, u16) {
        match self {
            Self::Gmail => ("smtp.gmail.com", 587),
            Self::Outlook => ("smtp-mail.outlook.com", 587),
            Self::Yahoo => ("smtp.mail.yahoo.com", 587),
            Self::Custom { host, port } => (host, *port),
        }
    }
}

/// Credentialed STARTTLS transport through the sender's mail relay.
pub struct SmtpMailer {
    sender: String,
    password: String,
    relay: Relay,
}

impl SmtpMailer {
    pub fn new(sender: String, password: String, relay: Relay) -> Self {
        Self {
            sender,
            password,
            relay,
        }
    }

    #[instrument(skip(self, body))]
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> anyhow::Result<()> {
        let from: Mailbox = self
            .sender
            .parse()
            .with_context(|| format!("Invalid sender address {}", self.sender))?;
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("Invalid recipient address {recipient}"))?;
        let builder = Message::builder().from(from).to(to).subject(subject);

        let message = match attachment {
            Some(path) => {
                let content = fs::read(path)
                    .with_context(|| format!("Failed to read attachment {}", path.display()))?;
                let name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("attachment")
                    .to_string();
                info!(name = %name, bytes = content.len(), "Attaching file");
                let part = Attachment::new(name).body(content, ContentType::parse("text/csv")?);
                let text = SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(body.to_string());
                builder.multipart(MultiPart::mixed().singlepart(text).singlepart(part))?
            }
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string())?,
        };

        let (host, port) = self.relay.endpoint();
        info!(host, port, "Connecting to SMTP relay");
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(
                self.sender.clone(),
                self.password.clone(),
            ))
            .build();
        transport.send(message).await?;
        info!(recipient, "Email sent through SMTP");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_domains_map_to_their_relays() {
        let cases = [
            ("user@gmail.com", ("smtp.gmail.com", 587)),
            ("user@outlook.com", ("smtp-mail.outlook.com", 587)),
            ("user@hotmail.com", ("smtp-mail.outlook.com", 587)),
            ("user@live.com", ("smtp-mail.outlook.com", 587)),
            ("user@yahoo.com", ("smtp.mail.yahoo.com", 587)),
        ];
        for (sender, expected) in cases {
            let relay = Relay::for_sender(sender, None).unwrap();
            let (host, port) = relay.endpoint();
            assert_eq!((host, port), expected, "sender {sender}");
        }
    }

    #[test]
    fn domain_matching_ignores_case() {
        let relay = Relay::for_sender("User@GMAIL.com", None).unwrap();
        assert_eq!(relay, Relay::Gmail);
    }

    #[test]
    fn unknown_domain_without_fallback_fails() {
        let err = Relay::for_sender("user@example.com", None).unwrap_err();
        assert!(err.to_string().contains("smtp_relay"));
    }

    #[test]
    fn unknown_domain_uses_the_configured_fallback() {
        let fallback = RelayOverride {
            host: "smtp.example.com".to_string(),
            port: 2525,
        };
        let relay = Relay::for_sender("user@example.com", Some(&fallback)).unwrap();
        assert_eq!(relay.endpoint(), ("smtp.example.com", 2525));
    }

    #[test]
    fn fallback_port_defaults_to_starttls() {
        let fallback: RelayOverride = toml::from_str("host = \"smtp.example.com\"").unwrap();
        assert_eq!(fallback.port, 587);
    }

    #[test]
    fn missing_at_sign_is_rejected() {
        assert!(Relay::for_sender("not-an-address", None).is_err());
    }
}
