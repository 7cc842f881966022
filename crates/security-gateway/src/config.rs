//! Environment-variable configuration for the gateway binary (SPEC_FULL.md §4.10).
//!
//! `diego-security-core` itself takes already-parsed values in its constructors and never reads
//! the environment; this module is the one place `std::env::var` is called, following the
//! teacher's `OidcValidator::from_env` style.

use diego_security_core::middleware::AuthMode;
use std::time::Duration;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    env_var(name).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env_var(name).and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// One `(limit, window)` pair for a rate-limited route tier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitTier {
    pub limit: u32,
    pub window: Duration,
}

/// Rate-limit tiers recognized by the bootstrap (spec.md §4.8): `auth` endpoints are IP-keyed
/// and tight; `write`/`read` endpoints are user-or-IP-keyed and looser.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub auth: RateLimitTier,
    pub write: RateLimitTier,
    pub read: RateLimitTier,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth: RateLimitTier { limit: 5, window: Duration::from_secs(60) },
            write: RateLimitTier { limit: 30, window: Duration::from_secs(60) },
            read: RateLimitTier { limit: 120, window: Duration::from_secs(60) },
        }
    }
}

/// The options spec.md §6 recognizes, plus the rate-limiter tiers from §4.8.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub auth_mode: AuthMode,
    pub cf_api_url: Option<String>,
    pub uaa_issuer: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub cookie_secure: bool,
    pub cf_skip_ssl_validation: bool,
    pub bosh_skip_ssl_validation: bool,
    pub bosh_ca_cert: Option<String>,
    pub rate_limits: RateLimitConfig,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if `DIEGO_GATEWAY_AUTH_MODE` is set to an unrecognized value — every
    /// other option has a safe default.
    pub fn from_env() -> anyhow::Result<Self> {
        let auth_mode = match env_var("DIEGO_GATEWAY_AUTH_MODE").as_deref() {
            None | Some("optional") => AuthMode::Optional,
            Some("required") => AuthMode::Required,
            Some("disabled") => AuthMode::Disabled,
            Some(other) => anyhow::bail!("DIEGO_GATEWAY_AUTH_MODE: unrecognized mode {other:?}"),
        };

        let cors_allowed_origins = env_var("DIEGO_GATEWAY_CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bind_addr: env_var("DIEGO_GATEWAY_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            auth_mode,
            cf_api_url: env_var("DIEGO_GATEWAY_CF_API_URL"),
            uaa_issuer: env_var("DIEGO_GATEWAY_UAA_ISSUER"),
            cors_allowed_origins,
            cookie_secure: env_bool("DIEGO_GATEWAY_COOKIE_SECURE", true),
            cf_skip_ssl_validation: env_bool("DIEGO_GATEWAY_CF_SKIP_SSL_VALIDATION", false),
            bosh_skip_ssl_validation: env_bool("DIEGO_GATEWAY_BOSH_SKIP_SSL_VALIDATION", false),
            bosh_ca_cert: env_var("DIEGO_GATEWAY_BOSH_CA_CERT"),
            rate_limits: RateLimitConfig {
                auth: RateLimitTier {
                    limit: env_u32("DIEGO_GATEWAY_RATE_LIMIT_AUTH_PER_MIN", 5),
                    window: Duration::from_secs(60),
                },
                write: RateLimitTier {
                    limit: env_u32("DIEGO_GATEWAY_RATE_LIMIT_WRITE_PER_MIN", 30),
                    window: Duration::from_secs(60),
                },
                read: RateLimitTier {
                    limit: env_u32("DIEGO_GATEWAY_RATE_LIMIT_READ_PER_MIN", 120),
                    window: Duration::from_secs(60),
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_limit_tiers_match_spec_examples() {
        let tiers = RateLimitConfig::default();
        assert_eq!(tiers.auth.limit, 5);
        assert_eq!(tiers.auth.window, Duration::from_secs(60));
    }
}
