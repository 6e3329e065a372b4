//! Process configuration, read once at startup and injected into the
//! routers. Every value comes from an environment variable.

use std::{env, fmt};
use thiserror::Error;

use crate::models::{DEFAULT_EXPIRY_DAYS, MAX_EXPIRY_DAYS};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub invitations: String,
    pub users: String,
    pub organizations: String,
}

#[derive(Clone)]
pub struct IdentityConfig {
    pub url: String,
    pub anon_key: String,
    /// Needed for admin calls such as deleting an orphaned identity.
    pub service_role_key: Option<String>,
    pub jwt_secret: String,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "<redacted>"),
            )
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tables: TableNames,
    pub identity: IdentityConfig,
    /// Origin of the web app, used to build invitation links.
    pub app_base_url: String,
    pub invitation_expiry_days: i64,
    /// Mount point for API Gateway stages such as `/Prod`, empty otherwise.
    pub route_prefix: String,
    pub port: Option<u16>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));
        let with_default =
            |name: &str, default: &str| optional(name).unwrap_or_else(|| default.to_string());

        let invitation_expiry_days = match optional("INVITATION_EXPIRY_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=MAX_EXPIRY_DAYS).contains(days))
                .ok_or(ConfigError::Invalid {
                    name: "INVITATION_EXPIRY_DAYS",
                    value: raw,
                })?,
            None => DEFAULT_EXPIRY_DAYS,
        };

        let port = match optional("PORT") {
            Some(raw) => Some(raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?),
            None => None,
        };

        let route_prefix = match optional("ROUTE_PREFIX") {
            Some(raw) if !raw.starts_with('/') => {
                return Err(ConfigError::Invalid {
                    name: "ROUTE_PREFIX",
                    value: raw,
                })
            }
            Some(raw) => raw.trim_end_matches('/').to_string(),
            None => String::new(),
        };

        Ok(Self {
            tables: TableNames {
                invitations: with_default("INVITATIONS_TABLE", "invitations"),
                users: with_default("USERS_TABLE", "users"),
                organizations: with_default("ORGANIZATIONS_TABLE", "organizations"),
            },
            identity: IdentityConfig {
                url: required("IDENTITY_URL")?.trim_end_matches('/').to_string(),
                anon_key: required("IDENTITY_ANON_KEY")?,
                service_role_key: optional("IDENTITY_SERVICE_ROLE_KEY"),
                jwt_secret: required("IDENTITY_JWT_SECRET")?,
            },
            app_base_url: with_default("APP_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            invitation_expiry_days,
            route_prefix,
            port,
        })
    }

    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }
}
