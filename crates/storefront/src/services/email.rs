//! Transactional email.
//!
//! Handlers enqueue messages on a bounded channel and never wait for SMTP.
//! A single background task drains the queue and sends through lettre.
//! Delivery is best effort: a full queue or a failed send is logged and the
//! message dropped.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use discvault_core::OrderId;

use crate::config::EmailConfig;

/// Messages buffered before new ones are dropped.
pub const QUEUE_CAPACITY: usize = 256;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// A transactional email waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailMessage {
    Welcome {
        to: String,
        username: String,
    },
    OrderConfirmation {
        to: String,
        username: String,
        order_id: OrderId,
        total: Decimal,
        item_count: i64,
    },
}

impl EmailMessage {
    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::Welcome { to, .. } | Self::OrderConfirmation { to, .. } => to,
        }
    }

    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Welcome { .. } => "Welcome to Disc Vault".to_string(),
            Self::OrderConfirmation { order_id, .. } => {
                format!("Disc Vault order #{order_id} confirmed")
            }
        }
    }

    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::Welcome { username, .. } => format!(
                "Hi {username},\n\n\
                 Your Disc Vault account is ready. Your Favorites and Look Again \
                 collections are waiting for you.\n\n\
                 Happy browsing!\n"
            ),
            Self::OrderConfirmation {
                username,
                order_id,
                total,
                item_count,
                ..
            } => format!(
                "Hi {username},\n\n\
                 Thanks for your order #{order_id}.\n\
                 Items: {item_count}\n\
                 Total: {total}\n\n\
                 We will let you know when it ships.\n"
            ),
        }
    }
}

/// SMTP sender used by the background worker.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    #[must_use]
    pub fn new(config: &EmailConfig) -> Self {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Self {
            mailer: builder.build(),
            from_address: config.from_address.clone(),
        }
    }

    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns error if an address is invalid or the SMTP exchange fails.
    pub async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let to = message.recipient();
        let subject = message.subject();
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(&subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body())?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Handle used by request handlers to enqueue email.
#[derive(Clone, Debug, Default)]
pub struct EmailQueue {
    sender: Option<mpsc::Sender<EmailMessage>>,
}

impl EmailQueue {
    /// Start the delivery worker, or return a disabled queue when SMTP is
    /// not configured. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(config: Option<&EmailConfig>) -> Self {
        let Some(config) = config else {
            tracing::info!("SMTP_HOST not set, outgoing email disabled");
            return Self::disabled();
        };

        let service = EmailService::new(config);
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(run_worker(service, receiver));

        tracing::info!(host = %config.smtp_host, port = config.smtp_port, "Email worker started");
        Self {
            sender: Some(sender),
        }
    }

    /// A queue that discards everything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    /// Queue a message without waiting. Returns whether it was accepted.
    pub fn enqueue(&self, message: EmailMessage) -> bool {
        let Some(sender) = &self.sender else {
            tracing::debug!(subject = %message.subject(), "Email disabled, message discarded");
            return false;
        };

        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                tracing::warn!(subject = %message.subject(), "Email queue full, message dropped");
                false
            }
            Err(TrySendError::Closed(message)) => {
                tracing::error!(subject = %message.subject(), "Email worker stopped, message dropped");
                false
            }
        }
    }
}

async fn run_worker(service: EmailService, mut receiver: mpsc::Receiver<EmailMessage>) {
    while let Some(message) = receiver.recv().await {
        if let Err(e) = service.send(&message).await {
            tracing::error!(
                error = %e,
                subject = %message.subject(),
                "Failed to send email"
            );
        }
    }
    tracing::info!("Email worker shut down");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn welcome() -> EmailMessage {
        EmailMessage::Welcome {
            to: "ana@example.com".to_string(),
            username: "ana".to_string(),
        }
    }

    #[test]
    fn test_order_confirmation_text() {
        let message = EmailMessage::OrderConfirmation {
            to: "ana@example.com".to_string(),
            username: "ana".to_string(),
            order_id: OrderId::new(42),
            total: Decimal::new(4498, 2),
            item_count: 3,
        };
        assert_eq!(message.subject(), "Disc Vault order #42 confirmed");
        assert!(message.body().contains("Total: 44.98"));
        assert_eq!(message.recipient(), "ana@example.com");
    }

    #[test]
    fn test_disabled_queue_discards() {
        assert!(!EmailQueue::disabled().enqueue(welcome()));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (sender, mut receiver) = mpsc::channel(1);
        let queue = EmailQueue {
            sender: Some(sender),
        };

        assert!(queue.enqueue(welcome()));
        assert!(!queue.enqueue(welcome()));

        assert_eq!(receiver.recv().await, Some(welcome()));
    }

    #[tokio::test]
    async fn test_closed_queue_drops() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let queue = EmailQueue {
            sender: Some(sender),
        };
        assert!(!queue.enqueue(welcome()));
    }
}
