use std::env;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Token lifetimes are capped at ten years.
const TTL_MINUTES: RangeInclusive<i64> = 1..=5_256_000;
/// A fixed UTC offset must stay within a day.
const UTC_OFFSET_MINUTES: RangeInclusive<i32> = -1439..=1439;

/// Brevo transactional mail settings. Present only when `BREVO_API_KEY` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub api_key: String,
    pub base_url: String,
    pub sender_name: String,
    pub sender_email: String,
}

/// Cloudinary unsigned-upload settings. Present only when `CLOUDINARY_CLOUD_NAME` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    pub folder: Option<String>,
    pub base_url: String,
}

/// Account promoted to or created as Admin at startup. Present only when `ADMIN_EMAIL` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub jwt_ttl_minutes: i64,
    pub jwt_refresh_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    pub run_migrations: bool,
    pub mail: Option<MailConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub admin: Option<AdminConfig>,
    pub upload_dir: PathBuf,
    /// Offset used for error-log timestamps.
    pub error_log_utc_offset_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has invalid value `{}`", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, treating empty values as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mail = match get("BREVO_API_KEY") {
            Some(api_key) => Some(MailConfig {
                api_key,
                base_url: get("BREVO_BASE_URL")
                    .unwrap_or_else(|| "https://api.brevo.com".to_string()),
                sender_name: get("MAIL_SENDER_NAME").unwrap_or_else(|| "no-reply".to_string()),
                sender_email: get("MAIL_SENDER_EMAIL")
                    .unwrap_or_else(|| "no-reply@tasklane.local".to_string()),
            }),
            None => None,
        };

        let cloudinary = match get("CLOUDINARY_CLOUD_NAME") {
            Some(cloud_name) => Some(CloudinaryConfig {
                cloud_name,
                upload_preset: required("CLOUDINARY_UPLOAD_PRESET")?,
                folder: get("CLOUDINARY_UPLOAD_FOLDER"),
                base_url: get("CLOUDINARY_BASE_URL")
                    .unwrap_or_else(|| "https://api.cloudinary.com".to_string()),
            }),
            None => None,
        };

        let admin = match get("ADMIN_EMAIL") {
            Some(email) => Some(AdminConfig {
                name: get("ADMIN_NAME").unwrap_or_else(|| "Admin".to_string()),
                email: email.trim().to_string(),
                password: required("ADMIN_PASSWORD")?,
            }),
            None => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_port: parse_or(get("SERVER_PORT"), "SERVER_PORT", 8080)?,
            server_host: get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_minutes: parse_in(get("JWT_TTL_MINUTES"), "JWT_TTL_MINUTES", 60, TTL_MINUTES)?,
            jwt_refresh_ttl_minutes: parse_in(
                get("JWT_REFRESH_TTL_MINUTES"),
                "JWT_REFRESH_TTL_MINUTES",
                20160,
                TTL_MINUTES,
            )?,
            bcrypt_cost: parse_or(get("BCRYPT_COST"), "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            run_migrations: parse_or(get("RUN_MIGRATIONS"), "RUN_MIGRATIONS", false)?,
            mail,
            cloudinary,
            admin,
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            error_log_utc_offset_minutes: parse_in(
                get("ERROR_LOG_UTC_OFFSET_MINUTES"),
                "ERROR_LOG_UTC_OFFSET_MINUTES",
                330,
                UTC_OFFSET_MINUTES,
            )?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    /// Whether `DATABASE_URL` selects the in-process store.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Like `parse_or`, but also rejects values outside `range`.
fn parse_in<T>(
    value: Option<String>,
    key: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd,
{
    let raw = value.clone();
    let parsed = parse_or(value, key, default)?;
    if range.contains(&parsed) {
        Ok(parsed)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config =
            config_from(&[("DATABASE_URL", "postgres://test"), ("JWT_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.jwt_ttl_minutes, 60);
        assert_eq!(config.jwt_refresh_ttl_minutes, 20160);
        assert_eq!(config.bcrypt_cost, 12);
        assert_eq!(config.error_log_utc_offset_minutes, 330);
        assert!(!config.run_migrations);
        assert!(config.mail.is_none());
        assert!(config.cloudinary.is_none());
        assert!(config.admin.is_none());
        assert!(!config.uses_memory_store());
    }

    #[test]
    fn test_config_custom_values() {
        let config = config_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("RUN_MIGRATIONS", "true"),
            ("BREVO_API_KEY", "key"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_UPLOAD_PRESET", "unsigned"),
        ])
        .unwrap();

        assert_eq!(config.server_url(), "http://0.0.0.0:3000");
        assert!(config.run_migrations);
        assert!(config.uses_memory_store());
        assert_eq!(config.mail.unwrap().base_url, "https://api.brevo.com");
        assert_eq!(config.cloudinary.unwrap().upload_preset, "unsigned");
    }

    #[test]
    fn test_config_errors() {
        assert_eq!(
            config_from(&[("JWT_SECRET", "s3cret")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
        assert_eq!(
            config_from(&[
                ("DATABASE_URL", "postgres://test"),
                ("JWT_SECRET", "s3cret"),
                ("SERVER_PORT", "http"),
            ]),
            Err(ConfigError::Invalid {
                key: "SERVER_PORT",
                value: "http".into()
            })
        );
    }

    #[test]
    fn test_admin_bootstrap_keys() {
        let config = config_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("ADMIN_EMAIL", " root@example.com "),
            ("ADMIN_PASSWORD", "secret1"),
        ])
        .unwrap();
        assert_eq!(
            config.admin,
            Some(AdminConfig {
                name: "Admin".into(),
                email: "root@example.com".into(),
                password: "secret1".into(),
            })
        );

        assert_eq!(
            config_from(&[
                ("DATABASE_URL", "memory://"),
                ("JWT_SECRET", "s3cret"),
                ("ADMIN_EMAIL", "root@example.com"),
            ]),
            Err(ConfigError::Missing("ADMIN_PASSWORD"))
        );
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        for (key, value) in [
            ("JWT_TTL_MINUTES", "0"),
            ("JWT_TTL_MINUTES", "-5"),
            ("JWT_REFRESH_TTL_MINUTES", "9223372036854775807"),
            ("ERROR_LOG_UTC_OFFSET_MINUTES", "1440"),
            ("ERROR_LOG_UTC_OFFSET_MINUTES", "-2000000000"),
        ] {
            assert_eq!(
                config_from(&[
                    ("DATABASE_URL", "memory://"),
                    ("JWT_SECRET", "s3cret"),
                    (key, value),
                ]),
                Err(ConfigError::Invalid {
                    key,
                    value: value.into()
                }),
                "{}={}",
                key,
                value
            );
        }

        let config = config_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_TTL_MINUTES", "1"),
            ("ERROR_LOG_UTC_OFFSET_MINUTES", "-300"),
        ])
        .unwrap();
        assert_eq!(config.jwt_ttl_minutes, 1);
        assert_eq!(config.error_log_utc_offset_minutes, -300);
    }
}
