use std::{env, net::IpAddr, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} env var is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Staging,
    Production,
}

impl FromStr for AppEnv {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "staging" | "stage" => Ok(AppEnv::Staging),
            "production" | "prod" => Ok(AppEnv::Production),
            _ => Err(()),
        }
    }
}

/// Credentials for the admin account created on first start.
#[derive(Debug, Clone)]
pub struct SeedAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: AppEnv,
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: IpAddr,
    pub http_port: u16,

    /// HMAC key for issued tokens. Falls back to a fixed development key
    /// everywhere except production.
    pub jwt_secret: String,
    pub token_ttl_days: i64,

    /// Origin allowed by CORS, normally the Vite dev server or the deployed
    /// admin front-end.
    pub frontend_url: String,
    pub static_dir: String,

    pub bcrypt_cost: u32,
    pub seed_admin: Option<SeedAdmin>,
}

const DEV_JWT_SECRET: &str = "default_secret";

/// Entry point to load configuration
pub fn load() -> Result<Config> {
    load_dotenv();
    Config::from_env()
}

/// Load .env base, then .env.{APP_ENV}
fn load_dotenv() {
    let _ = dotenv::dotenv();

    let env_name = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
    let filename = format!(".env.{}", env_name);
    let _ = dotenv::from_filename(&filename);
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &'static str, default: &str) -> Result<T> {
    let value = var_or(name, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_flag(name: &'static str, default: bool) -> Result<bool> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        },
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let env_str = var_or("APP_ENV", "development");
        let env = AppEnv::from_str(&env_str).map_err(|_| ConfigError::Invalid {
            name: "APP_ENV",
            value: env_str.clone(),
        })?;

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if env == AppEnv::Production => return Err(ConfigError::Missing("JWT_SECRET")),
            _ => DEV_JWT_SECRET.to_string(),
        };

        let token_ttl_days: i64 = parse_var("TOKEN_TTL_DAYS", "7")?;
        if token_ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_DAYS",
                value: token_ttl_days.to_string(),
            });
        }

        let bcrypt_cost: u32 = parse_var("BCRYPT_COST", "10")?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let seed_admin = if parse_flag("SEED_ADMIN", true)? {
            Some(SeedAdmin {
                username: var_or("ADMIN_USERNAME", "admin"),
                email: var_or("ADMIN_EMAIL", "admin@galaxygrid.com"),
                password: var_or("ADMIN_PASSWORD", "admin123"),
            })
        } else {
            None
        };

        Ok(Self {
            env,
            database_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "10")?,
            bind_addr: parse_var("BIND_ADDR", "0.0.0.0")?,
            http_port: parse_var("PORT", "5000")?,
            jwt_secret,
            token_ttl_days,
            frontend_url: var_or("FRONTEND_URL", "http://localhost:5173"),
            static_dir: var_or("STATIC_DIR", "../client"),
            bcrypt_cost,
            seed_admin,
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
