// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;
use url::Url;

/// SMTP relay settings. Absent when `SMTP_HOST` is not set.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// Trigger times for the scheduled jobs, in the scheduler's local offset.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Offset from UTC in minutes (330 = UTC+05:30).
    pub utc_offset_minutes: i32,
    pub reminder_hour: u32,
    pub reminder_minute: u32,
    pub report_day: u32,
    pub report_hour: u32,
    pub report_minute: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            utc_offset_minutes: 330,
            reminder_hour: 9,
            reminder_minute: 0,
            report_day: 1,
            report_hour: 10,
            report_minute: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub base_url: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub export_dir: String,
    pub cache_ttl_secs: u64,
    pub cache_long_ttl_secs: u64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub smtp: Option<SmtpConfig>,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Builds a configuration with defaults for everything except the
    /// database location and signing secret.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration: 86400,
            rust_log: "info".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            base_url: "http://127.0.0.1:3000".to_string(),
            admin_email: None,
            admin_password: None,
            export_dir: "exports".to_string(),
            cache_ttl_secs: 300,
            cache_long_ttl_secs: 600,
            rate_limit_per_second: 2,
            rate_limit_burst: 10,
            smtp: None,
            schedule: ScheduleConfig::default(),
        }
    }

    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let mut config = Self::new(database_url, jwt_secret);

        config.jwt_expiration = parse_or("JWT_EXPIRATION", config.jwt_expiration);
        config.rust_log = env::var("RUST_LOG").unwrap_or(config.rust_log);
        config.bind_addr = env::var("BIND_ADDR").unwrap_or(config.bind_addr);
        config.admin_email = env::var("ADMIN_EMAIL").ok();
        config.admin_password = env::var("ADMIN_PASSWORD").ok();
        config.export_dir = env::var("EXPORT_DIR").unwrap_or(config.export_dir);
        config.cache_ttl_secs = parse_or("CACHE_TTL_SECS", config.cache_ttl_secs);
        config.cache_long_ttl_secs = parse_or("CACHE_LONG_TTL_SECS", config.cache_long_ttl_secs);
        config.rate_limit_per_second =
            parse_or("RATE_LIMIT_PER_SECOND", config.rate_limit_per_second);
        config.rate_limit_burst = parse_or("RATE_LIMIT_BURST", config.rate_limit_burst);

        if let Ok(base_url) = env::var("BASE_URL") {
            match Url::parse(&base_url) {
                Ok(_) => config.base_url = base_url,
                Err(e) => tracing::warn!("Ignoring invalid BASE_URL '{}': {}", base_url, e),
            }
        }

        config.smtp = env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: parse_or("SMTP_PORT", 587),
            username: env::var("SMTP_USERNAME").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            from: env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@quizmaster.local".to_string()),
        });

        let defaults = ScheduleConfig::default();
        config.schedule = ScheduleConfig {
            enabled: parse_or("SCHEDULER_ENABLED", defaults.enabled),
            utc_offset_minutes: parse_or("SCHEDULER_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
            reminder_hour: parse_or("REMINDER_HOUR", defaults.reminder_hour),
            reminder_minute: parse_or("REMINDER_MINUTE", defaults.reminder_minute),
            report_day: parse_or("REPORT_DAY", defaults.report_day),
            report_hour: parse_or("REPORT_HOUR", defaults.report_hour),
            report_minute: parse_or("REPORT_MINUTE", defaults.report_minute),
        };

        config
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
