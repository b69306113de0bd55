use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid APP_HOST {:?}", self.host))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_minutes: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub length: usize,
    pub ttl_seconds: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 6,
            ttl_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub username: String,
    pub password: String,
}

/// Where OTP mails go.
#[derive(Debug, Clone, Deserialize)]
pub enum MailConfig {
    Smtp(SmtpConfig),
    /// Write the message to the log instead of sending it. Local development only.
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub session: SessionConfig,
    pub otp: OtpConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: match get("APP_PORT") {
                Some(v) => v.parse().with_context(|| format!("invalid APP_PORT {v:?}"))?,
                None => 8080,
            },
        };
        let database_url = get("DATABASE_URL").context("DATABASE_URL is not set")?;

        let session = SessionConfig {
            secret: get("SESSION_SECRET").context("SESSION_SECRET is not set")?,
            issuer: get("SESSION_ISSUER").unwrap_or_else(|| "mailgate".into()),
            ttl_minutes: get("SESSION_TTL_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
            cookie_name: get("SESSION_COOKIE").unwrap_or_else(|| "session".into()),
            cookie_secure: get("SESSION_COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };

        let defaults = OtpConfig::default();
        let otp = OtpConfig {
            length: get("OTP_LENGTH")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| (4..=10).contains(n))
                .unwrap_or(defaults.length),
            ttl_seconds: get("OTP_TTL_SECONDS")
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|s| *s > 0)
                .unwrap_or(defaults.ttl_seconds),
        };

        let mail = match get("MAIL_TRANSPORT").as_deref().unwrap_or("smtp") {
            "log" => MailConfig::Log,
            "smtp" => {
                let sender = get("SENDER_EMAIL").context("SENDER_EMAIL is not set")?;
                MailConfig::Smtp(SmtpConfig {
                    host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".into()),
                    port: get("SMTP_PORT")
                        .and_then(|v| v.parse::<u16>().ok())
                        .unwrap_or(465),
                    username: get("SMTP_USERNAME").unwrap_or_else(|| sender.clone()),
                    password: get("SMTP_PASSWORD")
                        .or_else(|| get("PASSWORD"))
                        .context("SMTP_PASSWORD is not set")?,
                    sender,
                })
            }
            other => anyhow::bail!("unknown MAIL_TRANSPORT {other:?}, expected smtp or log"),
        };

        Ok(Self {
            server,
            database_url,
            session,
            otp,
            mail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/mailgate"),
            ("SESSION_SECRET", "s3cret"),
            ("MAIL_TRANSPORT", "log"),
        ]))
        .expect("config should parse");

        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.session.issuer, "mailgate");
        assert_eq!(cfg.session.ttl_minutes, 1440);
        assert_eq!(cfg.session.cookie_name, "session");
        assert!(!cfg.session.cookie_secure);
        assert_eq!(cfg.otp.length, 6);
        assert_eq!(cfg.otp.ttl_seconds, 120);
        assert!(matches!(cfg.mail, MailConfig::Log));
    }

    #[test]
    fn smtp_password_falls_back_to_legacy_var() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/mailgate"),
            ("SESSION_SECRET", "s3cret"),
            ("SENDER_EMAIL", "noreply@example.com"),
            ("PASSWORD", "app-password"),
        ]))
        .expect("config should parse");

        match cfg.mail {
            MailConfig::Smtp(smtp) => {
                assert_eq!(smtp.host, "smtp.gmail.com");
                assert_eq!(smtp.port, 465);
                assert_eq!(smtp.username, "noreply@example.com");
                assert_eq!(smtp.password, "app-password");
            }
            MailConfig::Log => panic!("expected smtp transport"),
        }
    }

    #[test]
    fn out_of_range_otp_length_is_ignored() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/mailgate"),
            ("SESSION_SECRET", "s3cret"),
            ("MAIL_TRANSPORT", "log"),
            ("OTP_LENGTH", "64"),
            ("OTP_TTL_SECONDS", "300"),
        ]))
        .expect("config should parse");
        assert_eq!(cfg.otp.length, 6);
        assert_eq!(cfg.otp.ttl_seconds, 300);
    }

    #[test]
    fn listen_address_comes_from_app_host_and_port() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("APP_HOST", "127.0.0.1"),
            ("APP_PORT", "3000"),
            ("DATABASE_URL", "postgres://localhost/mailgate"),
            ("SESSION_SECRET", "s3cret"),
            ("MAIL_TRANSPORT", "log"),
        ]))
        .expect("config should parse");
        let addr = cfg.server.socket_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[
            ("APP_PORT", "http"),
            ("DATABASE_URL", "postgres://x"),
            ("SESSION_SECRET", "s"),
            ("MAIL_TRANSPORT", "log"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET"));
    }

    #[test]
    fn unknown_transport_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SESSION_SECRET", "s"),
            ("MAIL_TRANSPORT", "carrier-pigeon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAIL_TRANSPORT"));
    }
}
