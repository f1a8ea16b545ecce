use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Tunables for `/users/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub min_query_length: usize,
    pub page_size: u32,
    pub max_page_size: u32,
    /// Lets active staff users see every match regardless of privacy settings.
    pub staff_bypass: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_query_length: 2,
            page_size: 10,
            max_page_size: 50,
            staff_bypass: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub search: SearchConfig,
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
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "edulite".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "edulite-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let defaults = SearchConfig::default();
        let search = SearchConfig {
            min_query_length: env_or("SEARCH_MIN_QUERY_LENGTH", defaults.min_query_length),
            page_size: env_or("SEARCH_PAGE_SIZE", defaults.page_size).max(1),
            max_page_size: env_or("SEARCH_MAX_PAGE_SIZE", defaults.max_page_size).max(1),
            staff_bypass: env_or("SEARCH_STAFF_BYPASS", defaults.staff_bypass),
        };

        Ok(Self {
            database_url,
            jwt,
            search,
        })
    }
}
