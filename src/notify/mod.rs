//! Operator notification. Fire-and-forget at every call site: failures are
//! logged by the caller, never propagated past dispatch.

mod mailer;

pub use mailer::SmtpMailer;

use tracing::debug;

use crate::error::NotifyError;

pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Stand-in when mail is disabled; drops notifications with a debug line.
#[derive(Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        debug!(to, subject, "mail disabled, notification dropped");
        Ok(())
    }
}
