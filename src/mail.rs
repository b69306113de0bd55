use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info, warn};

use crate::config::{MailConfig, SmtpConfig};

/// Outbound mail delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match cfg {
        MailConfig::Smtp(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "smtp mail transport");
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        MailConfig::Log => {
            warn!("log mail transport: codes are written to the log, not sent");
            Arc::new(LogNotifier)
        }
    };
    Ok(notifier)
}

#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// SMTP over implicit TLS.
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let from = cfg
            .sender
            .parse::<Mailbox>()
            .with_context(|| format!("invalid SENDER_EMAIL {:?}", cfg.sender))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let to = to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid recipient {to:?}"))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build message")?;
        let response = self.transport.send(message).await.context("smtp send")?;
        debug!(code = %response.code(), "smtp accepted message");
        Ok(())
    }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(%to, %subject, %body, "mail not sent (log transport)");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    /// Records messages; fails every send while `failing` is set.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<SentMail>>,
        pub failing: std::sync::atomic::AtomicBool,
    }

    impl RecordingNotifier {
        pub fn set_failing(&self, failing: bool) {
            self.failing
                .store(failing, std::sync::atomic::Ordering::SeqCst);
        }

        pub async fn last(&self) -> Option<SentMail> {
            self.sent.lock().await.last().cloned()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            self.sent.lock().await.push(SentMail {
                to: to.into(),
                subject: subject.into(),
                body: body.into(),
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        LogNotifier
            .send("a@x.com", "Your OTP", "This is your OTP: 123456")
            .await
            .expect("log transport never fails");
    }

    #[test]
    fn smtp_notifier_rejects_bad_sender() {
        let cfg = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 465,
            sender: "not an address".into(),
            username: "u".into(),
            password: "p".into(),
        };
        assert!(SmtpNotifier::new(&cfg).is_err());
    }
}
