use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::{EmailBackend, MailConfig};
use crate::errors::{AppError, Result};

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Logs every message instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct ConsoleMailer {
    subject_prefix: String,
}

impl ConsoleMailer {
    pub fn new(subject_prefix: impl Into<String>) -> Self {
        Self {
            subject_prefix: subject_prefix.into(),
        }
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(
            to = to,
            subject = %format!("{}{}", self.subject_prefix, subject),
            "Outgoing email:\n{}",
            body
        );
        Ok(())
    }
}

/// Keeps sent messages in memory so callers can inspect them.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    subject_prefix: String,
    outbox: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn new(subject_prefix: impl Into<String>) -> Self {
        Self {
            subject_prefix: subject_prefix.into(),
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub fn outbox(&self) -> Vec<SentMail> {
        match self.outbox.lock() {
            Ok(outbox) => outbox.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let mail = SentMail {
            to: to.to_string(),
            subject: format!("{}{}", self.subject_prefix, subject),
            body: body.to_string(),
        };
        self.outbox
            .lock()
            .map_err(|_| AppError::service("mail outbox lock poisoned"))?
            .push(mail);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SendGridMailer {
    api_key: String,
    from_email: String,
    subject_prefix: String,
    client: Client,
}

impl SendGridMailer {
    pub fn new(api_key: String, from_email: String, subject_prefix: String) -> Self {
        Self {
            api_key,
            from_email,
            subject_prefix,
            client: Client::new(),
        }
    }

    fn payload(&self, to: &str, subject: &str, body: &str) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from_email },
            "subject": format!("{}{}", self.subject_prefix, subject),
            "content": [{ "type": "text/plain", "value": body }],
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&self.payload(to, subject, body))
            .send()
            .await
            .map_err(|e| AppError::external_api(format!("SendGrid API error: {}", e)))?;

        if response.status().is_success() {
            tracing::debug!("Email to {} accepted by SendGrid", to);
            Ok(())
        } else {
            Err(AppError::external_api(format!(
                "Email sending failed with status: {}",
                response.status()
            )))
        }
    }
}

pub fn build_mailer(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.backend {
        EmailBackend::Console => Arc::new(ConsoleMailer::new(config.subject_prefix.clone())),
        EmailBackend::Memory => Arc::new(MemoryMailer::new(config.subject_prefix.clone())),
        EmailBackend::SendGrid { api_key } => Arc::new(SendGridMailer::new(
            api_key.clone(),
            config.from_email.clone(),
            config.subject_prefix.clone(),
        )),
    }
}
