//! Mail delivery of run logs

use crate::managers::notification::LogArtifact;
use lettre::message::header::{ContentType, ContentTypeErr};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fs;
use std::path::PathBuf;
use tracing::info;

const ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Failed to read attachment {path:?}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("Invalid attachment content type: {0}")]
    ContentType(#[from] ContentTypeErr),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends one message carrying one log file
pub trait Mailer {
    fn send_log(&self, log: &LogArtifact, subject: &str) -> Result<(), MailError>;
}

/// SMTP over implicit TLS
pub struct SmtpMailer {
    host: String,
    port: u16,
    sender: String,
    recipient: String,
    password: String,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, sender: &str, recipient: &str, password: String) -> Self {
        Self {
            host: host.to_string(),
            port,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            password,
        }
    }

    /// Build the message: plain-text body plus the log as an opaque attachment
    pub fn build_message(&self, log: &LogArtifact, subject: &str) -> Result<Message, MailError> {
        let from = parse_mailbox(&self.sender)?;
        let to = parse_mailbox(&self.recipient)?;

        let data = fs::read(&log.path).map_err(|source| MailError::Attachment {
            path: log.path.clone(),
            source,
        })?;

        let body = format!(
            "Hello,\n\nAttached is the most recent log from the world backup run.\n\nLog date: {}\n",
            log.modified_label()
        );

        let content_type = ContentType::parse(ATTACHMENT_CONTENT_TYPE)?;
        let attachment = Attachment::new(log.file_name()).body(data, content_type);

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body))
                    .singlepart(attachment),
            )?;

        Ok(message)
    }
}

impl Mailer for SmtpMailer {
    fn send_log(&self, log: &LogArtifact, subject: &str) -> Result<(), MailError> {
        let message = self.build_message(log, subject)?;

        info!("Connecting to SMTP server {}:{}", self.host, self.port);
        let mailer = SmtpTransport::relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(self.sender.clone(), self.password.clone()))
            .build();

        mailer.send(&message)?;
        info!("Log email sent to {}", self.recipient);
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

/// Mock mailer for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recorded delivery
    #[derive(Clone, Debug)]
    pub struct SentMail {
        pub log_path: PathBuf,
        pub subject: String,
    }

    #[derive(Clone, Default)]
    pub struct MockMailer {
        pub sent: Arc<Mutex<Vec<SentMail>>>,
        should_fail: Arc<Mutex<bool>>,
    }

    impl MockMailer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure delivery to fail
        pub fn with_failure(self) -> Self {
            *self.should_fail.lock().unwrap() = true;
            self
        }

        pub fn get_sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Mailer for MockMailer {
        fn send_log(&self, log: &LogArtifact, subject: &str) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(SentMail {
                log_path: log.path.clone(),
                subject: subject.to_string(),
            });
            if *self.should_fail.lock().unwrap() {
                return Err(MailError::Attachment {
                    path: log.path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "mock mail failure"),
                });
            }
            Ok(())
        }
    }
}
