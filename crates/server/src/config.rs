//! Environment-driven configuration, resolved once at boot.

use std::str::FromStr;

use anyhow::{Context, bail};
use db::models::generated_review::ReviewProvider;
use secrecy::SecretString;
use tracing::{info, warn};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DB_PATH: &str = "reviewtap.db";
const DEFAULT_OWNER_MOBILE: &str = "081234567890";
const DEFAULT_OWNER_PASSWORD: &str = "reviewtap-owner";
const DEFAULT_TOKEN_SECRET: &str = "dev-secret-change-me";
const DEFAULT_PRIMARY_PROVIDER: &str = "gemini";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// Remote persistence is optional; both values must be present together.
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: SecretString,
}

pub struct Config {
    pub bind_addr: String,
    pub db_path: String,
    pub owner_mobile: String,
    pub owner_password: SecretString,
    pub token_secret: SecretString,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: Option<String>,
    pub openai_api_key: Option<SecretString>,
    pub openai_model: Option<String>,
    pub primary_provider: ReviewProvider,
    pub sync_interval_secs: u64,
    pub supabase: Option<SupabaseConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let token_secret = env_or("TOKEN_SECRET", DEFAULT_TOKEN_SECRET);
        if token_secret == DEFAULT_TOKEN_SECRET {
            warn!("TOKEN_SECRET is not set, using the development default");
        }

        let primary_provider = parse_primary_provider(&env_or(
            "PRIMARY_PROVIDER",
            DEFAULT_PRIMARY_PROVIDER,
        ))?;

        let sync_interval_secs = match std::env::var("REVIEW_SYNC_INTERVAL_SECS") {
            Ok(raw) => raw
                .parse()
                .context("REVIEW_SYNC_INTERVAL_SECS must be a number of seconds")?,
            Err(_) => DEFAULT_SYNC_INTERVAL_SECS,
        };

        let supabase = match (
            std::env::var("SUPABASE_URL"),
            std::env::var("SUPABASE_SERVICE_KEY"),
        ) {
            (Ok(url), Ok(key)) => Some(SupabaseConfig {
                url,
                service_key: SecretString::from(key),
            }),
            (Err(_), Err(_)) => None,
            _ => bail!("SUPABASE_URL and SUPABASE_SERVICE_KEY must be set together"),
        };

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", DEFAULT_BIND_ADDR),
            db_path: env_or("DATABASE_PATH", DEFAULT_DB_PATH),
            owner_mobile: env_or("OWNER_MOBILE", DEFAULT_OWNER_MOBILE),
            owner_password: SecretString::from(env_or("OWNER_PASSWORD", DEFAULT_OWNER_PASSWORD)),
            token_secret: SecretString::from(token_secret),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().map(SecretString::from),
            gemini_model: std::env::var("GEMINI_MODEL").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().map(SecretString::from),
            openai_model: std::env::var("OPENAI_MODEL").ok(),
            primary_provider,
            sync_interval_secs,
            supabase,
        })
    }

    /// Primary provider first, the other one as backup.
    pub fn provider_order(&self) -> [ReviewProvider; 2] {
        match self.primary_provider {
            ReviewProvider::Openai => [ReviewProvider::Openai, ReviewProvider::Gemini],
            _ => [ReviewProvider::Gemini, ReviewProvider::Openai],
        }
    }

    pub fn log_summary(&self) {
        info!(
            bind_addr = %self.bind_addr,
            db_path = %self.db_path,
            primary_provider = %self.primary_provider,
            gemini = self.gemini_api_key.is_some(),
            openai = self.openai_api_key.is_some(),
            sync_interval_secs = self.sync_interval_secs,
            supabase = self.supabase.is_some(),
            "configuration loaded"
        );
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_primary_provider(raw: &str) -> anyhow::Result<ReviewProvider> {
    let provider = ReviewProvider::from_str(raw)
        .map_err(|_| anyhow::anyhow!("unknown PRIMARY_PROVIDER '{raw}'"))?;
    if provider == ReviewProvider::Canned {
        bail!("PRIMARY_PROVIDER must be gemini or openai");
    }
    Ok(provider)
}
