use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, NaiveDateTime, SubsecRound, Utc};
use dotenvy::dotenv;

use crate::geo::geofence::GeofencePolicy;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,

    // Attendance / geofencing
    pub utc_offset: FixedOffset,
    pub require_gps: bool,
    pub require_configured_location: bool,
    pub location_cache_ttl: Duration,

    /// Seeded once when the users table is empty.
    pub bootstrap_admin: Option<(String, String)>,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key}: cannot parse {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let offset_minutes: i32 = var_or("ATTENDANCE_UTC_OFFSET_MINUTES", 0)?;
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| anyhow!("ATTENDANCE_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        let rate_login_per_min: u32 = var_or("RATE_LOGIN_PER_MIN", 60)?;
        let rate_protected_per_min: u32 = var_or("RATE_PROTECTED_PER_MIN", 1000)?;
        if rate_login_per_min == 0 || rate_protected_per_min == 0 {
            return Err(anyhow!("rate limits must be greater than zero"));
        }

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(user), Ok(pass)) if !user.trim().is_empty() && !pass.is_empty() => {
                Some((user.trim().to_string(), pass))
            }
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 900)?, // default 15 min

            rate_login_per_min,
            rate_protected_per_min,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: var_or("LOG_LEVEL", tracing::Level::DEBUG)?,

            utc_offset,
            require_gps: var_or("GEOFENCE_REQUIRE_GPS", false)?,
            require_configured_location: var_or("GEOFENCE_REQUIRE_CONFIGURED", false)?,
            location_cache_ttl: Duration::from_secs(var_or("LOCATION_CACHE_TTL_SECS", 300)?),

            bootstrap_admin,
        })
    }

    pub fn geofence_policy(&self) -> GeofencePolicy {
        GeofencePolicy {
            require_configured: self.require_configured_location,
            require_gps: self.require_gps,
        }
    }

    /// Wall clock in the attendance time zone; its date is the attendance day.
    pub fn attendance_now(&self) -> NaiveDateTime {
        Utc::now()
            .with_timezone(&self.utc_offset)
            .naive_local()
            .trunc_subsecs(0)
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/test".to_string(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            rate_login_per_min: 60,
            rate_protected_per_min: 1000,
            api_prefix: "/api/v1".to_string(),
            log_dir: "logs".to_string(),
            log_level: tracing::Level::DEBUG,
            utc_offset: FixedOffset::east_opt(7 * 3600).unwrap(),
            require_gps: false,
            require_configured_location: false,
            location_cache_ttl: Duration::from_secs(300),
            bootstrap_admin: None,
        }
    }
}
