/// Deployment environment, read from `APP_ENV` (falling back to `NODE_ENV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }
}

/// Origins allowed to reach the API (and the realtime socket) outside production.
pub const DEV_ORIGINS: [&str; 2] = ["http://localhost:8080", "http://localhost:5173"];

/// Origin allowed to reach the API in production.
pub const PRODUCTION_ORIGINS: [&str; 1] = ["https://yourdomain.com"];

/// Default session token lifetime (7 days).
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 3600;

/// PetLink API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. When absent the in-memory store is used.
    pub database_url: Option<String>,
    /// HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    /// Secret used for `s:`-prefixed signed cookies.
    pub cookie_secret: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    pub environment: Environment,
    /// Lifetime of newly minted session tokens, in seconds.
    pub session_ttl_secs: i64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        let environment = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            jwt_secret: required_var("JWT_SECRET"),
            cookie_secret: required_var("COOKIE_SECRET"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            environment,
            session_ttl_secs: std::env::var("JWT_EXPIRES_IN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs: &i64| *secs > 0)
                .unwrap_or(DEFAULT_SESSION_TTL_SECS),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Origins accepted by CORS for both REST and the realtime upgrade.
    pub fn cors_origins(&self) -> &'static [&'static str] {
        if self.is_production() {
            &PRODUCTION_ORIGINS
        } else {
            &DEV_ORIGINS
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
