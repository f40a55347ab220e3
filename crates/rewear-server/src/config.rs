use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used outside debug builds.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl_days: i64,
    /// Lower-cased; signups with these emails become admins.
    pub admin_emails: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), cfg!(debug_assertions))
    }

    /// `allow_placeholder` lets debug builds start without a real secret.
    fn from_lookup(var: impl Fn(&str) -> Option<String>, allow_placeholder: bool) -> Result<Self> {
        let jwt_secret = var("REWEAR_JWT_SECRET").unwrap_or_default();
        let jwt_secret = if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            if !allow_placeholder {
                bail!("REWEAR_JWT_SECRET is unset or still a placeholder");
            }
            tracing::warn!("REWEAR_JWT_SECRET is unset or a placeholder, using the development secret");
            DEV_SECRET.to_string()
        } else {
            jwt_secret
        };

        let db_path = var("REWEAR_DB_PATH").unwrap_or_else(|| "rewear.db".into()).into();
        let host = var("REWEAR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("REWEAR_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("REWEAR_PORT must be a port number")?;
        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let token_ttl_days: i64 = match var("REWEAR_TOKEN_TTL_DAYS") {
            Some(v) => v.parse().context("REWEAR_TOKEN_TTL_DAYS must be a whole number")?,
            None => 7,
        };
        if token_ttl_days < 1 {
            bail!("REWEAR_TOKEN_TTL_DAYS must be at least 1");
        }

        let admin_emails = var("REWEAR_ADMIN_EMAILS")
            .map(|list| {
                list.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            jwt_secret,
            db_path,
            addr,
            token_ttl_days,
            admin_emails,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)], allow_placeholder: bool) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned(), allow_placeholder)
    }

    #[test]
    fn defaults() {
        let config = load(&[("REWEAR_JWT_SECRET", "s3cret")], false).unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.db_path, PathBuf::from("rewear.db"));
        assert_eq!(config.addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.token_ttl_days, 7);
        assert!(config.admin_emails.is_empty());
    }

    #[test]
    fn placeholder_secret_only_in_debug() {
        assert!(load(&[], false).is_err());
        assert!(load(&[("REWEAR_JWT_SECRET", "change-me-to-a-random-string")], false).is_err());
        assert_eq!(load(&[], true).unwrap().jwt_secret, DEV_SECRET);
    }

    #[test]
    fn overrides() {
        let config = load(
            &[
                ("REWEAR_JWT_SECRET", "s3cret"),
                ("REWEAR_HOST", "127.0.0.1"),
                ("REWEAR_PORT", "8080"),
                ("REWEAR_TOKEN_TTL_DAYS", "30"),
                ("REWEAR_ADMIN_EMAILS", " Admin@Example.com, ,ops@example.com"),
            ],
            false,
        )
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.token_ttl_days, 30);
        assert_eq!(config.admin_emails, vec!["admin@example.com", "ops@example.com"]);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(load(&[("REWEAR_JWT_SECRET", "s"), ("REWEAR_PORT", "http")], false).is_err());
        assert!(load(&[("REWEAR_JWT_SECRET", "s"), ("REWEAR_TOKEN_TTL_DAYS", "0")], false).is_err());
    }
}
