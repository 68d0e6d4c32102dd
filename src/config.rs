use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

pub struct Config {
    pub port: u16,
    pub log_level: String,
    /// Server-held secret feeding the v2 vault key derivation.
    pub vault_secret: String,
    /// How long an unresolved request stays collapsible in the guard.
    pub dedup_in_flight_window: Duration,
    /// How long a resolved result is retained for late duplicates.
    pub dedup_retention: Duration,
    pub key_cache_ttl: Duration,
    pub balance_cache_ttl: Duration,
    pub confirm_attempts: u32,
    pub confirm_timeout: Duration,
    /// Company co-signer that fronts network fees for custodial wallets.
    pub fee_payer_address: String,
    /// When set, payer balance checks skip the primary source.
    pub primary_balance_unreliable: bool,
    /// Residual on-chain balance (base units) still treated as empty
    /// when deciding whether a wallet can close.
    pub close_dust_threshold: u64,
}

impl core::fmt::Debug for Config {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("vault_secret", &"<redacted>")
            .field("dedup_in_flight_window", &self.dedup_in_flight_window)
            .field("dedup_retention", &self.dedup_retention)
            .field("key_cache_ttl", &self.key_cache_ttl)
            .field("balance_cache_ttl", &self.balance_cache_ttl)
            .field("confirm_attempts", &self.confirm_attempts)
            .field("confirm_timeout", &self.confirm_timeout)
            .field("fee_payer_address", &self.fee_payer_address)
            .field("primary_balance_unreliable", &self.primary_balance_unreliable)
            .field("close_dust_threshold", &self.close_dust_threshold)
            .finish()
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        Self {
            port: env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(3000),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            vault_secret: env::var("VAULT_SECRET").unwrap_or_else(|_| "dev-vault-secret".to_string()),
            dedup_in_flight_window: Duration::from_secs(env_u64("DEDUP_IN_FLIGHT_SECS", 30)),
            dedup_retention: Duration::from_secs(env_u64("DEDUP_RETENTION_SECS", 10)),
            key_cache_ttl: Duration::from_secs(env_u64("KEY_CACHE_TTL_SECS", 300)),
            balance_cache_ttl: Duration::from_secs(env_u64("BALANCE_CACHE_TTL_SECS", 5)),
            confirm_attempts: env_u64("CONFIRM_ATTEMPTS", 3) as u32,
            confirm_timeout: Duration::from_millis(env_u64("CONFIRM_TIMEOUT_MS", 2000)),
            fee_payer_address: env::var("FEE_PAYER_ADDRESS").unwrap_or_default(),
            primary_balance_unreliable: env::var("PRIMARY_BALANCE_UNRELIABLE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            close_dust_threshold: env_u64("CLOSE_DUST_THRESHOLD", 0),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Per-service tunables, copied out of `Config` so tests can build a
/// context with their own windows instead of reading the process
/// environment.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub vault_secret: String,
    pub dedup_in_flight_window: Duration,
    pub dedup_retention: Duration,
    pub key_cache_ttl: Duration,
    pub balance_cache_ttl: Duration,
    pub confirm_attempts: u32,
    pub confirm_timeout: Duration,
    pub fee_payer_address: String,
    pub primary_balance_unreliable: bool,
    pub close_dust_threshold: u64,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        EngineSettings {
            vault_secret: config.vault_secret.clone(),
            dedup_in_flight_window: config.dedup_in_flight_window,
            dedup_retention: config.dedup_retention,
            key_cache_ttl: config.key_cache_ttl,
            balance_cache_ttl: config.balance_cache_ttl,
            confirm_attempts: config.confirm_attempts,
            confirm_timeout: config.confirm_timeout,
            fee_payer_address: config.fee_payer_address.clone(),
            primary_balance_unreliable: config.primary_balance_unreliable,
            close_dust_threshold: config.close_dust_threshold,
        }
    }
}
