use chrono::Duration;
use dotenv::dotenv;
use std::env;
use tracing::warn;

const DEFAULT_DATABASE_URL: &str = "conduit.db";
const DEFAULT_JWT_SECRET: &str = "conduit-development-secret";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

error_chain! {
    foreign_links {
        ParseInt(::std::num::ParseIntError);
    }

    errors {
        InvalidTokenTtl(hours: i64) {
            description("token lifetime must be positive")
            display("TOKEN_TTL_HOURS must be positive, got {}", hours)
        }
    }
}

/// Application settings. Server settings (address, port, log level) are
/// left to Rocket's own configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) => {
                warn!("JWT_SECRET is not set, falling back to the development secret");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        let token_ttl_hours = match env::var("TOKEN_TTL_HOURS") {
            Ok(raw) => raw.trim().parse::<i64>()?,
            Err(_) => DEFAULT_TOKEN_TTL_HOURS,
        };
        if token_ttl_hours <= 0 {
            bail!(ErrorKind::InvalidTokenTtl(token_ttl_hours));
        }

        Ok(Config {
            database_url,
            jwt_secret,
            token_ttl_hours,
        })
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::hours(self.token_ttl_hours)
    }
}
