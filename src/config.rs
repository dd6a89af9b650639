// config.rs
use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::services::otp_service::{DEFAULT_LIFE_SPAN, DEFAULT_SKEW_STEPS, MAX_SKEW_STEPS};

const DEV_JWT_SECRET: &str = "insecure-local-jwt-secret-change-me";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailBackend {
    /// Writes messages to the log.
    Console,
    /// Keeps messages in an in-process outbox.
    Memory,
    SendGrid { api_key: String },
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub backend: EmailBackend,
    pub from_email: String,
    pub subject_prefix: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_name: String,
    pub jwt_secret: String,
    pub access_token_lifetime: i64,
    pub refresh_token_lifetime: i64,
    pub code_life_span: u64,
    pub code_skew_steps: u8,
    pub password_hash_cost: u32,
    pub cors_allow_all_origins: bool,
    pub mail: MailConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            environment: Environment::Local,
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: None,
            database_name: "accounts".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_lifetime: 60 * 60 * 24,
            refresh_token_lifetime: 60 * 60 * 24 * 3,
            code_life_span: DEFAULT_LIFE_SPAN,
            code_skew_steps: DEFAULT_SKEW_STEPS,
            password_hash_cost: bcrypt::DEFAULT_COST,
            cors_allow_all_origins: false,
            mail: MailConfig {
                backend: EmailBackend::Console,
                from_email: "no-reply@accounts.local".to_string(),
                subject_prefix: String::new(),
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source and validates it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let environment = match lookup("APP_ENV").as_deref() {
            None | Some("local") => Environment::Local,
            Some("production") => Environment::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_ENV",
                    value: other.to_string(),
                })
            }
        };

        let jwt_secret = match (lookup("JWT_SECRET"), environment) {
            (Some(secret), _) => secret,
            (None, Environment::Local) => defaults.jwt_secret,
            (None, Environment::Production) => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let backend = match lookup("EMAIL_BACKEND").as_deref() {
            None | Some("console") => EmailBackend::Console,
            Some("memory") => EmailBackend::Memory,
            Some("sendgrid") => EmailBackend::SendGrid {
                api_key: lookup("SENDGRID_API_KEY").ok_or(ConfigError::Missing("SENDGRID_API_KEY"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "EMAIL_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let config = AppConfig {
            environment,
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_name: lookup("DATABASE_NAME").unwrap_or(defaults.database_name),
            jwt_secret,
            access_token_lifetime: parse_var(
                &lookup,
                "ACCESS_TOKEN_LIFETIME_SECS",
                defaults.access_token_lifetime,
            )?,
            refresh_token_lifetime: parse_var(
                &lookup,
                "REFRESH_TOKEN_LIFETIME_SECS",
                defaults.refresh_token_lifetime,
            )?,
            code_life_span: parse_var(&lookup, "CODE_LIFE_SPAN", defaults.code_life_span)?,
            code_skew_steps: parse_var(&lookup, "CODE_SKEW_STEPS", defaults.code_skew_steps)?,
            password_hash_cost: parse_var(&lookup, "PASSWORD_HASH_COST", defaults.password_hash_cost)?,
            cors_allow_all_origins: parse_bool(&lookup, "CORS_ALLOW_ALL_ORIGINS", false)?,
            mail: MailConfig {
                backend,
                from_email: lookup("DEFAULT_FROM_EMAIL").unwrap_or(defaults.mail.from_email),
                subject_prefix: lookup("EMAIL_SUBJECT_PREFIX").unwrap_or_default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_life_span == 0 {
            return Err(ConfigError::Invalid {
                name: "CODE_LIFE_SPAN",
                value: self.code_life_span.to_string(),
            });
        }
        if self.code_skew_steps > MAX_SKEW_STEPS {
            return Err(ConfigError::Invalid {
                name: "CODE_SKEW_STEPS",
                value: self.code_skew_steps.to_string(),
            });
        }
        if self.access_token_lifetime <= 0 {
            return Err(ConfigError::Invalid {
                name: "ACCESS_TOKEN_LIFETIME_SECS",
                value: self.access_token_lifetime.to_string(),
            });
        }
        if self.refresh_token_lifetime <= 0 {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_LIFETIME_SECS",
                value: self.refresh_token_lifetime.to_string(),
            });
        }
        if !(4..=31).contains(&self.password_hash_cost) {
            return Err(ConfigError::Invalid {
                name: "PASSWORD_HASH_COST",
                value: self.password_hash_cost.to_string(),
            });
        }
        if self.is_production() && self.mail.backend == EmailBackend::Memory {
            return Err(ConfigError::Invalid {
                name: "EMAIL_BACKEND",
                value: "memory".to_string(),
            });
        }
        if self.jwt_secret.is_empty()
            || (self.is_production() && self.jwt_secret == DEV_JWT_SECRET)
        {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                value: "<redacted>".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_bool<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") | Some("true") | Some("True") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("False") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_local_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.environment, Environment::Local);
        assert_eq!(config.port, 8000);
        assert_eq!(config.code_life_span, 600);
        assert_eq!(config.code_skew_steps, 1);
        assert!(config.database_url.is_none());
        assert_eq!(config.mail.backend, EmailBackend::Console);
    }

    #[test]
    fn production_requires_jwt_secret() {
        let err = AppConfig::from_lookup(lookup_from(&[("APP_ENV", "production")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));

        let config = AppConfig::from_lookup(lookup_from(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "a-real-secret"),
        ]))
        .unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn production_rejects_memory_mail_backend() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("APP_ENV", "production"),
            ("JWT_SECRET", "a-real-secret"),
            ("EMAIL_BACKEND", "memory"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "EMAIL_BACKEND", .. }));

        let config = AppConfig::from_lookup(lookup_from(&[("EMAIL_BACKEND", "memory")])).unwrap();
        assert_eq!(config.mail.backend, EmailBackend::Memory);
    }

    #[test]
    fn zero_code_life_span_is_fatal() {
        let err = AppConfig::from_lookup(lookup_from(&[("CODE_LIFE_SPAN", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CODE_LIFE_SPAN", .. }));
    }

    #[test]
    fn excessive_skew_is_fatal() {
        let err = AppConfig::from_lookup(lookup_from(&[("CODE_SKEW_STEPS", "50")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CODE_SKEW_STEPS", .. }));
    }

    #[test]
    fn unparsable_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "PORT",
                value: "eighty".to_string()
            }
        );
    }

    #[test]
    fn sendgrid_backend_needs_api_key() {
        let err = AppConfig::from_lookup(lookup_from(&[("EMAIL_BACKEND", "sendgrid")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SENDGRID_API_KEY"));

        let config = AppConfig::from_lookup(lookup_from(&[
            ("EMAIL_BACKEND", "sendgrid"),
            ("SENDGRID_API_KEY", "SG.key"),
            ("EMAIL_SUBJECT_PREFIX", "[Accounts] "),
        ]))
        .unwrap();
        assert_eq!(
            config.mail.backend,
            EmailBackend::SendGrid {
                api_key: "SG.key".to_string()
            }
        );
        assert_eq!(config.mail.subject_prefix, "[Accounts] ");
    }

    #[test]
    fn cors_flag_parses_booleans() {
        let config = AppConfig::from_lookup(lookup_from(&[("CORS_ALLOW_ALL_ORIGINS", "true")])).unwrap();
        assert!(config.cors_allow_all_origins);

        assert!(AppConfig::from_lookup(lookup_from(&[("CORS_ALLOW_ALL_ORIGINS", "maybe")])).is_err());
    }
}
