//! SMTP mailer on lettre's blocking transport.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use super::Notifier;
use crate::config::MailConfig;
use crate::error::NotifyError;

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from_addr
            .parse()
            .map_err(|_| NotifyError::Build(format!("invalid from address '{}'", config.from_addr)))?;
        let mut builder = SmtpTransport::relay(&config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.smtp_port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Notifier for SmtpMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let to: Mailbox = to
            .parse()
            .map_err(|_| NotifyError::Build(format!("invalid recipient '{to}'")))?;
        let mail = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))?;
        self.transport
            .send(&mail)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        info!(subject, "operator mail sent");
        Ok(())
    }
}
