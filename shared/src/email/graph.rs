use std::fs;
use std::path::Path;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

const SEND_MAIL_URL: &str = "https://graph.microsoft.com/v1.0/me/sendMail";

/// Token-based transport over the Microsoft Graph sendMail endpoint.
pub struct GraphMailer {
    http: Client,
    token: String,
}

#[derive(Serialize)]
struct SendMailRequest {
    message: GraphMessage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    subject: String,
    body: GraphBody,
    to_recipients: Vec<Recipient>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<FileAttachment>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody {
    content_type: &'static str,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient {
    email_address: EmailAddress,
}

#[derive(Serialize)]
struct EmailAddress {
    address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileAttachment {
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    name: String,
    content_type: &'static str,
    content_bytes: String,
}

#[derive(Debug, Default, Deserialize)]
struct GraphError {
    #[serde(default)]
    error: GraphErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    Authentication,
    Permission,
    Unknown,
}

impl FailureKind {
    fn classify(code: &str, message: &str) -> Self {
        if code == "InvalidAuthenticationToken" {
            Self::Authentication
        } else if code == "Forbidden" || message.to_lowercase().contains("insufficient") {
            Self::Permission
        } else {
            Self::Unknown
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            Self::Authentication => {
                "Graph token rejected: tokens usually last an hour, request a fresh one with the Mail.Send scope"
            }
            Self::Permission => {
                "Graph token lacks the Mail.Send permission: consent to the scope and request a new token"
            }
            Self::Unknown => "Graph sendMail rejected the request",
        }
    }
}

impl GraphMailer {
    pub fn new(token: String) -> Self {
        Self {
            http: Client::new(),
            token,
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
        let mut message = GraphMessage {
            subject: subject.to_string(),
            body: GraphBody {
                content_type: "Text",
                content: body.to_string(),
            },
            to_recipients: vec![Recipient {
                email_address: EmailAddress {
                    address: recipient.to_string(),
                },
            }],
            attachments: Vec::new(),
        };

        if let Some(path) = attachment {
            let content = fs::read(path)
                .with_context(|| format!("Failed to read attachment {}", path.display()))?;
            let name = attachment_name(path);
            info!(name = %name, bytes = content.len(), "Attaching file");
            message.attachments.push(FileAttachment {
                odata_type: "#microsoft.graph.fileAttachment",
                name,
                content_type: "text/csv",
                content_bytes: BASE64.encode(&content),
            });
        }

        let response = self
            .http
            .post(SEND_MAIL_URL)
            .bearer_auth(&self.token)
            .json(&SendMailRequest { message })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            info!(recipient, "Email sent through Graph");
            return Ok(());
        }

        let raw = response.text().await.unwrap_or_default();
        let parsed: GraphError = serde_json::from_str(&raw).unwrap_or_default();
        let kind = FailureKind::classify(&parsed.error.code, &parsed.error.message);
        error!(
            %status,
            code = %parsed.error.code,
            message = %parsed.error.message,
            "{}",
            kind.guidance()
        );
        anyhow::bail!("Graph sendMail failed with {status} ({kind:?})")
    }
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("attachment")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_token_is_an_authentication_failure() {
        let kind = FailureKind::classify("InvalidAuthenticationToken", "Lifetime validation failed");
        assert_eq!(kind, FailureKind::Authentication);
    }

    #[test]
    fn forbidden_is_a_permission_failure() {
        assert_eq!(
            FailureKind::classify("Forbidden", "Access is denied"),
            FailureKind::Permission
        );
        assert_eq!(
            FailureKind::classify("ErrorAccessDenied", "Insufficient privileges"),
            FailureKind::Permission
        );
    }

    #[test]
    fn anything_else_is_unknown() {
        assert_eq!(
            FailureKind::classify("MailboxNotEnabledForRESTAPI", "mailbox is inactive"),
            FailureKind::Unknown
        );
    }

    #[test]
    fn error_body_parses_with_missing_fields() {
        let parsed: GraphError = serde_json::from_str("{}").unwrap_or_default();
        assert!(parsed.error.code.is_empty());

        let parsed: GraphError = serde_json::from_str(
            r#"{"error": {"code": "Forbidden", "message": "Access is denied"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.error.code, "Forbidden");
    }

    #[test]
    fn attachment_payload_is_base64() {
        let attachment = FileAttachment {
            odata_type: "#microsoft.graph.fileAttachment",
            name: "report.csv".to_string(),
            content_type: "text/csv",
            content_bytes: BASE64.encode(b"a,b\n1,2\n"),
        };
        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["@odata.type"], "#microsoft.graph.fileAttachment");
        assert_eq!(json["contentBytes"], "YSxiCjEsMgo=");
    }
}
