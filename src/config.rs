use std::env;

use crate::filter::TextMatch;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup, immutable
/// afterwards, and pulled into handlers and the auth guard through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls fail-fast secrets and log format.
    pub env: Env,
    // Postgres connection string. `None` runs on the in-memory store (local only).
    pub db_url: Option<String>,
    // HS256 secret used to sign and verify bearer tokens.
    pub jwt_secret: String,
    // Token lifetime in seconds.
    pub jwt_expiry_secs: i64,
    // bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
    // Comparison used by free-text query parameters.
    pub text_match: TextMatch,
    // Whether `role` in a signup payload is honoured. Otherwise every signup is `regular`.
    pub allow_role_signup: bool,
    // Optional admin account created at startup if the username is still free.
    pub bootstrap_admin: Option<(String, String)>,
    pub port: u16,
}

/// Env
///
/// Runtime context: relaxed defaults locally, mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "local-development-jwt-secret";
pub const DEFAULT_JWT_EXPIRY_SECS: i64 = 3600;

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking values for test state setup: in-memory store, the cheapest bcrypt
    /// cost, and role signup enabled.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            jwt_expiry_secs: DEFAULT_JWT_EXPIRY_SECS,
            bcrypt_cost: 4,
            text_match: TextMatch::Substring,
            allow_role_signup: true,
            bootstrap_admin: None,
            port: 3000,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment and fails fast.
    ///
    /// # Panics
    /// Panics if `DATABASE_URL` or `JWT_SECRET` is missing in production, or if a numeric
    /// variable does not parse.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok(),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let jwt_expiry_secs = env::var("JWT_EXPIRY_SECS")
            .map(|v| v.parse().expect("FATAL: JWT_EXPIRY_SECS must be an integer"))
            .unwrap_or(DEFAULT_JWT_EXPIRY_SECS);

        let bcrypt_cost = env::var("BCRYPT_COST")
            .map(|v| v.parse().expect("FATAL: BCRYPT_COST must be an integer"))
            .unwrap_or(bcrypt::DEFAULT_COST);

        let text_match = match env::var("FILTER_TEXT_MATCH").as_deref() {
            Ok("exact") => TextMatch::Exact,
            _ => TextMatch::Substring,
        };

        let allow_role_signup = env::var("ALLOW_ROLE_SIGNUP")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(env == Env::Local);

        let bootstrap_admin = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) => Some((username, password)),
            _ => None,
        };

        let port = env::var("PORT")
            .map(|v| v.parse().expect("FATAL: PORT must be a port number"))
            .unwrap_or(3000);

        Self {
            env,
            db_url,
            jwt_secret,
            jwt_expiry_secs,
            bcrypt_cost,
            text_match,
            allow_role_signup,
            bootstrap_admin,
            port,
        }
    }
}
