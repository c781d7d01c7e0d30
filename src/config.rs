use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Where the external QR generator lives.
#[derive(Debug, Clone, Deserialize)]
pub struct QrConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// SMTP relay settings. Absent when `SMTP_HOST` is not set.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Per-tier seat prices, whole currency units.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PricingConfig {
    pub gold: i64,
    pub diamond: i64,
    pub recliner: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            gold: 200,
            diamond: 300,
            recliner: 450,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub qr: QrConfig,
    pub smtp: Option<SmtpConfig>,
    pub pricing: PricingConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "cinevibe".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "cinevibe-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let qr = QrConfig {
            base_url: std::env::var("QR_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3002".into()),
            timeout_secs: env_or("QR_TIMEOUT_SECS", 10),
        };
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: env_or("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "CineVibe <no-reply@cinevibe.local>".into()),
            }),
            _ => None,
        };
        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            gold: env_or("PRICE_GOLD", defaults.gold),
            diamond: env_or("PRICE_DIAMOND", defaults.diamond),
            recliner: env_or("PRICE_RECLINER", defaults.recliner),
        };
        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            jwt,
            qr,
            smtp,
            pricing,
        })
    }
}
